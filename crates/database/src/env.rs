use std::env;

use trendly_common::{required_var, EnvVars};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct PostgresEnv {
    pub database_url: String,
    pub max_connections: u32,
}

impl PostgresEnv {
    pub fn from_values(database_url: String, max_connections: Option<&str>) -> anyhow::Result<Self> {
        let max_connections = match max_connections {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be a positive integer: {}", e))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than zero");
        }
        Ok(Self { database_url, max_connections })
    }
}

impl EnvVars for PostgresEnv {
    fn load() -> anyhow::Result<Self> {
        let database_url = required_var("DATABASE_URL")?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS").ok();
        Self::from_values(database_url, max_connections.as_deref())
    }

    fn get_env_var(&self, key: &str) -> Option<String> {
        match key {
            "DATABASE_URL" => Some(self.database_url.clone()),
            "DATABASE_MAX_CONNECTIONS" => Some(self.max_connections.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_max_connections() {
        let env = PostgresEnv::from_values("postgres://localhost/trendly".into(), None).unwrap();
        assert_eq!(env.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(env.get_env_var("DATABASE_URL").as_deref(), Some("postgres://localhost/trendly"));
        assert_eq!(env.get_env_var("UNKNOWN"), None);
    }

    #[test]
    fn parses_max_connections() {
        let env = PostgresEnv::from_values("postgres://x".into(), Some(" 12 ")).unwrap();
        assert_eq!(env.max_connections, 12);
    }

    #[test]
    fn rejects_bad_max_connections() {
        assert!(PostgresEnv::from_values("postgres://x".into(), Some("many")).is_err());
        assert!(PostgresEnv::from_values("postgres://x".into(), Some("0")).is_err());
    }
}
