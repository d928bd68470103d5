use anyhow::{anyhow, Result};
use std::{fmt, str::FromStr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// A validated `tracing-subscriber` filter directive, e.g. `mesh_authz=debug,warn`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter(String);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid log format {0:?}: expected plain or json")]
pub struct InvalidLogFormat(String);

// === impl LogFilter ===

impl LogFilter {
    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.0).map_err(|e| anyhow!("invalid log filter {:?}: {e}", self.0))
    }
}

impl FromStr for LogFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let filter = Self(s.to_string());
        filter.env_filter()?;
        Ok(filter)
    }
}

impl fmt::Display for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// === impl LogFormat ===

impl LogFormat {
    /// Installs the global subscriber. Logs are written to stderr so that
    /// stdout only carries decisions.
    pub fn try_init(self, filter: &LogFilter) -> Result<()> {
        let registry = tracing_subscriber::registry().with(filter.env_filter()?);
        let res = match self {
            Self::Plain => registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init(),
            Self::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(false)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };
        res.map_err(|e| anyhow!("failed to initialize logging: {e}"))
    }
}

impl FromStr for LogFormat {
    type Err = InvalidLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("plain") => Ok(Self::Plain),
            s if s.eq_ignore_ascii_case("json") => Ok(Self::Json),
            _ => Err(InvalidLogFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::Json => f.write_str("json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        for (s, expected) in [
            ("plain", Ok(LogFormat::Plain)),
            ("JSON", Ok(LogFormat::Json)),
            ("yaml", Err(InvalidLogFormat("yaml".to_string()))),
        ] {
            assert_eq!(s.parse::<LogFormat>(), expected, "{s}");
        }
    }

    #[test]
    fn validates_filters() {
        assert!("mesh_authz=info,warn".parse::<LogFilter>().is_ok());
        assert!("mesh_authz=loud".parse::<LogFilter>().is_err());
    }
}
