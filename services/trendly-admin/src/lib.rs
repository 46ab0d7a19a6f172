use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use trendly_discussion::Keyword;

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Loads `.env` when present; a missing file is not an error.
pub fn load_env() {
    if let Err(e) = dotenv::dotenv() {
        tracing::debug!("No .env loaded: {}", e);
    }
}

/// One entry of a keyword import file.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRecord {
    pub keyword: String,
    pub rank: i16,
    pub category: String,
    #[serde(default)]
    pub type1: serde_json::Value,
    #[serde(default)]
    pub type2: String,
    #[serde(default)]
    pub type3: String,
    #[serde(default)]
    pub references: Option<serde_json::Value>,
}

impl From<KeywordRecord> for Keyword {
    fn from(record: KeywordRecord) -> Self {
        let keyword = Keyword::new(record.keyword, record.rank, record.category, record.type1, record.type2, record.type3);
        match record.references {
            Some(references) => keyword.with_references(references),
            None => keyword,
        }
    }
}

pub fn parse_keywords(raw: &str) -> Result<Vec<Keyword>> {
    let records: Vec<KeywordRecord> = serde_json::from_str(raw).context("keyword file must be a JSON array of keyword records")?;
    Ok(records.into_iter().map(Keyword::from).collect())
}

pub fn load_keywords_file(path: impl AsRef<Path>) -> Result<Vec<Keyword>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_keywords(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_with_defaults() {
        let raw = r#"[
            {"keyword": "bitcoin", "rank": 1, "category": "finance", "type1": {"trend": "up"}, "type2": "short", "type3": "long",
             "references": [{"title": "news", "url": "https://example.com"}]},
            {"keyword": "election", "rank": 2, "category": "politics"}
        ]"#;
        let keywords = parse_keywords(raw).unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].keyword, "bitcoin");
        assert_eq!(keywords[0].type1["trend"], "up");
        assert!(keywords[0].references.is_some());
        assert_eq!(keywords[1].rank, 2);
        assert!(keywords[1].type1.is_null());
        assert!(keywords[1].references.is_none());
        assert!(keywords[1].current_discussion_room.is_none());
    }

    #[test]
    fn rejects_non_array_files() {
        assert!(parse_keywords(r#"{"keyword": "bitcoin"}"#).is_err());
        assert!(parse_keywords(r#"[{"keyword": "bitcoin"}]"#).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("trendly-keywords-{}.json", std::process::id()));
        std::fs::write(&path, r#"[{"keyword": "rust", "rank": 3, "category": "tech"}]"#).unwrap();
        let keywords = load_keywords_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(keywords[0].category, "tech");

        assert!(load_keywords_file("/nonexistent/trendly.json").is_err());
    }
}
