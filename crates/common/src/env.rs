pub trait EnvVars: Sized {
    fn load() -> anyhow::Result<Self>;
    fn get_env_var(&self, key: &str) -> Option<String>;
}

/// Reads a required variable, naming it in the error.
pub fn required_var(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable not set", key))
}
