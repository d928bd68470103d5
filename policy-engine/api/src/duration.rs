use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

/// A duration in the protobuf JSON form, e.g. `0.25s`. Millisecond values
/// such as `250ms` are also accepted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProtoDuration(Duration);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("duration {0:?} must end in 's' or 'ms'")]
    NoUnit(String),

    #[error("duration {0:?} is not a non-negative number")]
    NotANumber(String),
}

impl From<Duration> for ProtoDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl From<ProtoDuration> for Duration {
    fn from(ProtoDuration(d): ProtoDuration) -> Self {
        d
    }
}

impl FromStr for ProtoDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, per_sec) = if let Some(ms) = s.strip_suffix("ms") {
            (ms, 1000.0)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, 1.0)
        } else {
            return Err(ParseError::NoUnit(s.to_string()));
        };

        value
            .parse::<f64>()
            .ok()
            .and_then(|v| Duration::try_from_secs_f64(v / per_sec).ok())
            .map(Self)
            .ok_or_else(|| ParseError::NotANumber(s.to_string()))
    }
}

impl fmt::Display for ProtoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.subsec_nanos();
        if nanos == 0 {
            return write!(f, "{}s", self.0.as_secs());
        }
        let frac = format!("{nanos:09}");
        write!(f, "{}.{}s", self.0.as_secs(), frac.trim_end_matches('0'))
    }
}

impl Serialize for ProtoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl JsonSchema for ProtoDuration {
    fn schema_name() -> String {
        "ProtoDuration".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}
