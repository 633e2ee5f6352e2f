//! Runtime Settings
//!
//! Credentials come from the process environment, backed by a local
//! `KEY=VALUE` env file (`.env.local` by default). Values already present in
//! the environment win over the file, and each setting accepts a long
//! `CLOUDFLARE_*` name and a short `CF_*` alias.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{DmarcError, Result};

pub const API_TOKEN_KEYS: &[&str] = &["CLOUDFLARE_API_TOKEN", "CF_API_TOKEN"];
pub const API_KEY_KEYS: &[&str] = &["CLOUDFLARE_API_KEY", "CF_API_KEY"];
pub const EMAIL_KEYS: &[&str] = &["CLOUDFLARE_EMAIL", "CF_EMAIL"];
pub const ACCOUNT_ID_KEYS: &[&str] = &["CLOUDFLARE_ACCOUNT_ID", "CF_ACCOUNT_ID"];

/// Layered key/value settings: process environment over env file
#[derive(Debug, Clone, Default)]
pub struct Settings {
    env: HashMap<String, String>,
    file: HashMap<String, String>,
}

impl Settings {
    /// Load the process environment and, if it exists, the env file
    pub fn load(env_file: &Path) -> Result<Self> {
        let env = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        let file = match std::fs::read_to_string(env_file) {
            Ok(content) => {
                let vars = parse_env_file(&content);
                debug!("Loaded {} variables from {}", vars.len(), env_file.display());
                vars
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Env file {} not found, using process environment only", env_file.display());
                HashMap::new()
            }
            Err(source) => {
                return Err(DmarcError::EnvFile {
                    path: env_file.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self { env, file })
    }

    /// Build settings from explicit sources
    pub fn from_sources(env: HashMap<String, String>, file: HashMap<String, String>) -> Self {
        Self { env, file }
    }

    /// Build settings from environment-style pairs only
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            file: HashMap::new(),
        }
    }

    /// Look up a single key. Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        non_empty(&self.env, key).or_else(|| non_empty(&self.file, key))
    }

    /// First set value among `keys`, in order
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn api_token(&self) -> Option<&str> {
        self.first_of(API_TOKEN_KEYS)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.first_of(API_KEY_KEYS)
    }

    pub fn email(&self) -> Option<&str> {
        self.first_of(EMAIL_KEYS)
    }

    /// Optional account filter for zone listing
    pub fn account_id(&self) -> Option<&str> {
        self.first_of(ACCOUNT_ID_KEYS)
    }
}

fn non_empty<'a>(source: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    source
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Parse `KEY=VALUE` lines.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and matching single or double quotes around the value are removed.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        vars.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    vars
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_file() {
        let content = r#"
# Cloudflare
CLOUDFLARE_API_TOKEN="abc123"
export CF_EMAIL=ops@example.com
CF_API_KEY='key=with=equals'
not a pair
=orphan
"#;
        let vars = parse_env_file(content);

        assert_eq!(vars.len(), 3);
        assert_eq!(vars["CLOUDFLARE_API_TOKEN"], "abc123");
        assert_eq!(vars["CF_EMAIL"], "ops@example.com");
        assert_eq!(vars["CF_API_KEY"], "key=with=equals");
    }

    #[test]
    fn test_environment_wins_over_file() {
        let env = HashMap::from([("CLOUDFLARE_API_TOKEN".to_string(), "from-env".to_string())]);
        let file = HashMap::from([
            ("CLOUDFLARE_API_TOKEN".to_string(), "from-file".to_string()),
            ("CF_ACCOUNT_ID".to_string(), "acct".to_string()),
        ]);
        let settings = Settings::from_sources(env, file);

        assert_eq!(settings.api_token(), Some("from-env"));
        assert_eq!(settings.account_id(), Some("acct"));
    }

    #[test]
    fn test_long_name_preferred_over_alias() {
        let settings = Settings::from_pairs([
            ("CF_API_TOKEN", "short"),
            ("CLOUDFLARE_API_TOKEN", "long"),
        ]);
        assert_eq!(settings.api_token(), Some("long"));
    }

    #[test]
    fn test_empty_value_falls_through() {
        let settings = Settings::from_pairs([("CLOUDFLARE_EMAIL", ""), ("CF_EMAIL", "a@b.c")]);
        assert_eq!(settings.email(), Some("a@b.c"));
        assert_eq!(settings.api_key(), None);
    }

    #[test]
    fn test_load_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join(".env.local"));
        assert!(settings.is_ok());
    }

    #[test]
    fn test_load_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        match Settings::load(dir.path()) {
            Err(DmarcError::EnvFile { path, .. }) => assert_eq!(path, dir.path()),
            other => panic!("expected EnvFile error, got: {other:?}"),
        }
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env.local");
        std::fs::write(&path, "CF_TEST_ONLY_SETTING=present\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.get("CF_TEST_ONLY_SETTING"), Some("present"));
    }
}
