pub mod error;
pub mod options;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use options::{ErrorLocale, FailedTurnPolicy, SessionOptions};
pub use paths::PathManager;
pub use settings::Settings;

/// Environment variables checked for the Gemini API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Load environment variables from .env files.
/// Project directory values (./.env) take precedence over home directory values (~/.env),
/// and variables already present in the process environment win over both.
/// Call this before parsing CLI args to ensure env vars are available.
pub fn load_env_file() {
    // dotenv never overwrites a variable that is already set, so the
    // higher-precedence file is loaded first.
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        let home_env_path = home.join(".env");
        dotenv::from_path(home_env_path).ok();
    }
}

/// Resolve the API key from the process environment.
///
/// A missing or blank key is a startup error; no client is ever built without one.
pub fn resolve_api_key() -> Result<String, ConfigError> {
    resolve_api_key_with(|name| std::env::var(name).ok())
}

/// Resolve the API key using a custom variable lookup.
pub fn resolve_api_key_with<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or(ConfigError::MissingApiKey {
            vars: API_KEY_VARS.join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_resolve_api_key_prefers_gemini_var() {
        let lookup = lookup_from(&[("GEMINI_API_KEY", "primary"), ("API_KEY", "fallback")]);
        assert_eq!(resolve_api_key_with(lookup).unwrap(), "primary");
    }

    #[test]
    fn test_resolve_api_key_falls_back() {
        let lookup = lookup_from(&[("API_KEY", " fallback ")]);
        assert_eq!(resolve_api_key_with(lookup).unwrap(), "fallback");
    }

    #[test]
    fn test_resolve_api_key_blank_is_missing() {
        let lookup = lookup_from(&[("GEMINI_API_KEY", "   ")]);
        let err = resolve_api_key_with(lookup).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let lookup = lookup_from(&[]);
        assert!(resolve_api_key_with(lookup).is_err());
    }
}
