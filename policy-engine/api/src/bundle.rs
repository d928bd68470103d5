use crate::{duration::ProtoDuration, policy::AuthorizationPolicy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A complete set of mesh authorization configuration, as loaded from disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyBundle {
    #[serde(default)]
    pub extension_providers: Vec<ExtensionProvider>,

    #[serde(default)]
    pub authorization_policies: Vec<AuthorizationPolicy>,
}

/// Configures an extension provider referenced by CUSTOM policies.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionProvider {
    pub name: String,

    #[serde(flatten)]
    pub kind: ExtensionProviderKind,

    /// Bounds each call to the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<ProtoDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_strategy: Option<FailStrategy>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ExtensionProviderKind {
    /// Returns the same verdict for every request.
    Static { allow: bool },
}

/// Determines the outcome when an extension provider fails or times out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailStrategy {
    /// Deny the request.
    #[default]
    FailClose,

    /// Continue evaluation as though the provider allowed the request.
    FailOpen,

    /// Retry the call once, then deny the request.
    FailReload,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid fail strategy {0:?}: expected one of fail-close, fail-open, fail-reload")]
pub struct InvalidFailStrategy(String);

// === impl PolicyBundle ===

impl PolicyBundle {
    /// Parses a YAML (or JSON) document.
    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}

// === impl FailStrategy ===

impl FromStr for FailStrategy {
    type Err = InvalidFailStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-close" => Ok(Self::FailClose),
            "fail-open" => Ok(Self::FailOpen),
            "fail-reload" => Ok(Self::FailReload),
            _ => Err(InvalidFailStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for FailStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailClose => f.write_str("FAIL_CLOSE"),
            Self::FailOpen => f.write_str("FAIL_OPEN"),
            Self::FailReload => f.write_str("FAIL_RELOAD"),
        }
    }
}
