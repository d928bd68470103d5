use std::fmt;

/// A path template built from literal segments and two operators: `{*}`
/// matches exactly one non-empty segment and `{**}` matches any number of
/// segments, including none.
///
/// Operators occupy a whole segment, and `{**}` must be the last operator in
/// the template. Literal segments may follow it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    One,
    Many,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTemplate {
    #[error("path template {0:?} must begin with '/'")]
    Relative(String),

    #[error("path template {0:?} uses an operator after '{{**}}'")]
    OperatorAfterMany(String),

    #[error("path template {template:?} has an invalid segment {segment:?}")]
    Segment { template: String, segment: String },
}

// === impl PathTemplate ===

impl PathTemplate {
    /// Returns true if the path should be interpreted as a template rather
    /// than a string pattern.
    pub fn is_template(path: &str) -> bool {
        path.contains('{') || path.contains('}')
    }

    pub fn parse(template: &str) -> Result<Self, InvalidTemplate> {
        let rest = template
            .strip_prefix('/')
            .ok_or_else(|| InvalidTemplate::Relative(template.to_string()))?;

        let mut segments = Vec::new();
        let mut seen_many = false;
        for part in rest.split('/') {
            let segment = match part {
                "{*}" | "{**}" if seen_many => {
                    return Err(InvalidTemplate::OperatorAfterMany(template.to_string()));
                }
                "{*}" => Segment::One,
                "{**}" => {
                    seen_many = true;
                    Segment::Many
                }
                lit if lit.contains(['*', '{', '}']) => {
                    return Err(InvalidTemplate::Segment {
                        template: template.to_string(),
                        segment: lit.to_string(),
                    });
                }
                lit => Segment::Literal(lit.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    pub fn matches(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix('/') else {
            return false;
        };
        let parts = rest.split('/').collect::<Vec<_>>();

        let Some(many) = self.segments.iter().position(|s| *s == Segment::Many) else {
            return parts.len() == self.segments.len()
                && self.segments.iter().zip(&parts).all(|(s, p)| s.matches(p));
        };

        let (head, tail) = (&self.segments[..many], &self.segments[many + 1..]);
        parts.len() >= head.len() + tail.len()
            && head.iter().zip(&parts).all(|(s, p)| s.matches(p))
            && tail
                .iter()
                .rev()
                .zip(parts.iter().rev())
                .all(|(s, p)| s.matches(p))
    }
}

impl std::str::FromStr for PathTemplate {
    type Err = InvalidTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => write!(f, "/{lit}")?,
                Segment::One => f.write_str("/{*}")?,
                Segment::Many => f.write_str("/{**}")?,
            }
        }
        Ok(())
    }
}

// === impl Segment ===

impl Segment {
    fn matches(&self, part: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == part,
            Self::One => !part.is_empty(),
            Self::Many => true,
        }
    }
}
