//! Session behaviour switches
//!
//! These collapse the historical per-build differences (streaming vs batch calls,
//! safety thresholds, fallback language) into one set of named options.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language used for the in-conversation fallback message.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLocale {
    /// Chinese when the last user text contains Han script, English otherwise
    #[default]
    Auto,
    En,
    Zh,
    /// English and Chinese in one message
    Bilingual,
}

impl FromStr for ErrorLocale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ErrorLocale::Auto),
            "en" => Ok(ErrorLocale::En),
            "zh" => Ok(ErrorLocale::Zh),
            "bilingual" => Ok(ErrorLocale::Bilingual),
            _ => Err(ConfigError::UnknownValue {
                kind: "error locale",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ErrorLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorLocale::Auto => "auto",
            ErrorLocale::En => "en",
            ErrorLocale::Zh => "zh",
            ErrorLocale::Bilingual => "bilingual",
        };
        f.write_str(name)
    }
}

/// What happens to the model context when a turn fails.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedTurnPolicy {
    /// The failed user turn stays visible but is left out of the model context
    #[default]
    Omit,
    /// The user turn is kept in context and the fallback text is committed as the reply
    Record,
}

impl FromStr for FailedTurnPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "omit" => Ok(FailedTurnPolicy::Omit),
            "record" => Ok(FailedTurnPolicy::Record),
            _ => Err(ConfigError::UnknownValue {
                kind: "failed turn policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FailedTurnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedTurnPolicy::Omit => f.write_str("omit"),
            FailedTurnPolicy::Record => f.write_str("record"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Stream model output fragment by fragment instead of waiting for the full reply
    pub streaming: bool,
    /// Send "block none" thresholds for every harm category
    pub safety_override: bool,
    pub error_locale: ErrorLocale,
    pub failed_turn: FailedTurnPolicy,
    /// Extra attempts for a call that fails before any model text is shown
    pub retry_attempts: u32,
    /// Put cleared input back after a failed send
    pub restore_input_on_failure: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            safety_override: true,
            error_locale: ErrorLocale::Auto,
            failed_turn: FailedTurnPolicy::Omit,
            retry_attempts: 0,
            restore_input_on_failure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_locale_from_str() {
        assert_eq!("AUTO".parse::<ErrorLocale>().unwrap(), ErrorLocale::Auto);
        assert_eq!("zh".parse::<ErrorLocale>().unwrap(), ErrorLocale::Zh);
        assert!("fr".parse::<ErrorLocale>().is_err());
    }

    #[test]
    fn test_failed_turn_policy_round_trips_through_display() {
        for policy in [FailedTurnPolicy::Omit, FailedTurnPolicy::Record] {
            assert_eq!(policy.to_string().parse::<FailedTurnPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_partial_session_table_uses_defaults() {
        let options: SessionOptions = toml::from_str("streaming = false\nerror_locale = \"zh\"").unwrap();
        assert!(!options.streaming);
        assert_eq!(options.error_locale, ErrorLocale::Zh);
        assert!(options.safety_override);
        assert_eq!(options.failed_turn, FailedTurnPolicy::Omit);
        assert_eq!(options.retry_attempts, 0);
    }
}
