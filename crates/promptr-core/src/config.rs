//! Runtime configuration for the Promptr gateway.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Env var pointing at an optional TOML file.
pub const CONFIG_PATH_ENV: &str = "PROMPTR_CONFIG";
/// Env var with extra `token:user_id` pairs, comma separated.
pub const ACCESS_TOKENS_ENV: &str = "PROMPTR_ACCESS_TOKENS";

const DEFAULT_CONFIG_PATH: &str = "config/promptr.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct PromptrConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub storage_path: String,
    /// Bearer token -> user id.
    #[serde(default)]
    pub access_tokens: HashMap<String, String>,
}

impl Default for PromptrConfig {
    fn default() -> Self {
        Self {
            app_name: "Promptr".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            storage_path: "./data/promptr".to_string(),
            access_tokens: HashMap::new(),
        }
    }
}

impl PromptrConfig {
    /// Defaults, then the TOML file (`PROMPTR_CONFIG` or `config/promptr.toml`) when present,
    /// then `PROMPTR__*` env vars. Tokens from `PROMPTR_ACCESS_TOKENS` are merged last.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("app_name", defaults.app_name)?
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("storage_path", defaults.storage_path)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("PROMPTR").separator("__"))
            .build()?;

        let mut cfg: Self = built.try_deserialize()?;
        if let Ok(raw) = std::env::var(ACCESS_TOKENS_ENV) {
            cfg.access_tokens.extend(parse_access_tokens(&raw));
        }
        Ok(cfg)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn user_for_token(&self, token: &str) -> Option<&str> {
        self.access_tokens.get(token.trim()).map(String::as_str)
    }
}

/// Parse `token:user,token2:user2`. Malformed pairs are skipped.
pub fn parse_access_tokens(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, user) = pair.split_once(':')?;
            let (token, user) = (token.trim(), user.trim());
            (!token.is_empty() && !user.is_empty()).then(|| (token.to_string(), user.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_pairs() {
        let tokens = parse_access_tokens(" tok-a:alice , broken, :nobody, tok-b:bob");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.get("tok-a").map(String::as_str), Some("alice"));
        assert_eq!(tokens.get("tok-b").map(String::as_str), Some("bob"));
    }

    #[test]
    fn resolves_tokens_and_addr() {
        let mut cfg = PromptrConfig::default();
        cfg.access_tokens.insert("secret".into(), "user-1".into());
        assert_eq!(cfg.user_for_token("secret"), Some("user-1"));
        assert_eq!(cfg.user_for_token("other"), None);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8000");
    }
}
