use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::crawler::validity::{NamePolicy, DEFAULT_MIN_NAME_LEN};
use crate::crawler::walker::WalkerConfig;

pub struct Config {
    pub origin: String,
    pub data_dir: PathBuf,
    pub bind: String,
    pub card_cap: usize,
    pub card_wait: Duration,
    pub fetch_timeout: Duration,
    pub scroll_pause: Duration,
    pub min_name_len: usize,
    pub chrome_path: Option<PathBuf>,
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid {key}={raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            origin: var_or("CATALOG_ORIGIN", "https://www.bnn.in.th".to_string())?,
            data_dir: var_or("CATALOG_DATA_DIR", PathBuf::from("data"))?,
            bind: var_or("CATALOG_BIND", "127.0.0.1:5000".to_string())?,
            card_cap: var_or("CATALOG_CARD_CAP", 30)?,
            card_wait: Duration::from_secs(var_or("CATALOG_WAIT_SECS", 15)?),
            fetch_timeout: Duration::from_secs(var_or("CATALOG_FETCH_TIMEOUT_SECS", 20)?),
            scroll_pause: Duration::from_millis(var_or("CATALOG_SCROLL_PAUSE_MS", 300)?),
            min_name_len: var_or("CATALOG_MIN_NAME_LEN", DEFAULT_MIN_NAME_LEN)?,
            chrome_path: env::var("CATALOG_CHROME_PATH").ok().map(PathBuf::from),
        })
    }

    pub fn links_dir(&self) -> PathBuf {
        self.data_dir.join("links")
    }

    pub fn details_dir(&self) -> PathBuf {
        self.data_dir.join("details")
    }

    pub fn walker(&self) -> WalkerConfig {
        WalkerConfig {
            origin: self.origin.clone(),
            card_wait: self.card_wait,
            scroll_pause: self.scroll_pause,
            card_cap: self.card_cap,
            name_policy: NamePolicy::with_min_len(self.min_name_len),
            ..WalkerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_or_falls_back_when_unset() {
        env::remove_var("CATALOG_TEST_UNSET_CAP");
        assert_eq!(var_or("CATALOG_TEST_UNSET_CAP", 30usize).unwrap(), 30);
    }

    #[test]
    fn var_or_parses_trimmed_overrides() {
        env::set_var("CATALOG_TEST_OVERRIDE_CAP", " 12 ");
        assert_eq!(var_or("CATALOG_TEST_OVERRIDE_CAP", 30usize).unwrap(), 12);
        env::set_var("CATALOG_TEST_OVERRIDE_DIR", "/var/lib/catalog");
        assert_eq!(
            var_or("CATALOG_TEST_OVERRIDE_DIR", PathBuf::from("data")).unwrap(),
            PathBuf::from("/var/lib/catalog")
        );
    }

    #[test]
    fn var_or_rejects_unparsable_values() {
        env::set_var("CATALOG_TEST_BAD_CAP", "abc");
        let err = var_or("CATALOG_TEST_BAD_CAP", 30usize).unwrap_err();
        assert!(err.to_string().contains("CATALOG_TEST_BAD_CAP"));
    }
}
