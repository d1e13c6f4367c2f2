//! Provider kinds and their built-in presets.
//!
//! The relay talks to exactly one upstream at a time. Each [`ProviderKind`]
//! has a preset carrying the base URL, model, API-key environment variable
//! and (for Anthropic) the API version header, so a config only needs to
//! name the provider.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Parse a provider name. Matching is exact, so `Anthropic` or a name
    /// with surrounding spaces is unknown and yields `None`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    #[must_use]
    pub fn preset(self) -> &'static ProviderPreset {
        match self {
            Self::OpenAi => &OPENAI,
            Self::Anthropic => &ANTHROPIC,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ProviderPreset {
    pub base_url: &'static str,
    pub default_model: &'static str,
    pub default_api_key_env: &'static str,
    pub api_version: Option<&'static str>,
}

static OPENAI: ProviderPreset = ProviderPreset {
    base_url: "https://api.openai.com/v1",
    default_model: "gpt-3.5-turbo",
    default_api_key_env: "OPENAI_API_KEY",
    api_version: None,
};

static ANTHROPIC: ProviderPreset = ProviderPreset {
    base_url: "https://api.anthropic.com",
    default_model: "claude-3-haiku-20240307",
    default_api_key_env: "ANTHROPIC_API_KEY",
    api_version: Some("2023-06-01"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        assert_eq!(ProviderKind::from_name("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(
            ProviderKind::from_name("anthropic"),
            Some(ProviderKind::Anthropic)
        );
        assert_eq!(ProviderKind::from_name("fireworks"), None);
    }

    #[test]
    fn test_names_match_exactly() {
        assert_eq!(ProviderKind::from_name("Anthropic"), None);
        assert_eq!(ProviderKind::from_name(" anthropic"), None);
        assert_eq!(ProviderKind::from_name("OPENAI"), None);
    }

    #[test]
    fn test_display_round_trips_through_from_name() {
        for kind in [ProviderKind::OpenAi, ProviderKind::Anthropic] {
            assert_eq!(ProviderKind::from_name(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn test_only_anthropic_sends_version_header() {
        assert_eq!(
            ProviderKind::Anthropic.preset().api_version,
            Some("2023-06-01")
        );
        assert!(ProviderKind::OpenAi.preset().api_version.is_none());
    }

    #[test]
    fn test_default_models() {
        assert_eq!(ProviderKind::OpenAi.preset().default_model, "gpt-3.5-turbo");
        assert_eq!(
            ProviderKind::Anthropic.preset().default_model,
            "claude-3-haiku-20240307"
        );
    }

    #[test]
    fn test_serde_names() {
        let kind: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
        assert_eq!(serde_json::to_string(&ProviderKind::Anthropic).unwrap(), "\"anthropic\"");
    }
}
