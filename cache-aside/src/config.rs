use envconfig::Envconfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CacheError;

/// Environment-driven settings for a deployment of the caching layer.
///
/// `application_name` becomes the namespace prefixed onto every derived key,
/// so two applications sharing one store never collide.
#[derive(Envconfig, Clone)]
pub struct CacheConfig {
    pub application_name: String,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    pub redis_response_timeout_ms: Option<u64>,

    pub redis_connection_timeout_ms: Option<u64>,
}

impl CacheConfig {
    pub fn response_timeout(&self) -> Option<Duration> {
        self.redis_response_timeout_ms.map(Duration::from_millis)
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        self.redis_connection_timeout_ms.map(Duration::from_millis)
    }
}

/// Whether a cacheable operation produces one value or a stream of values.
///
/// The shape is fixed when the operation is declared, not discovered from the
/// running call. Single-shaped operations go through
/// [`CacheAside::get_or_load`](crate::CacheAside::get_or_load), sequence-shaped
/// ones through [`CacheAside::get_or_stream`](crate::CacheAside::get_or_stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Single,
    Sequence,
}

impl FromStr for ResultShape {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ResultShape::Single),
            "sequence" => Ok(ResultShape::Sequence),
            _ => Err(CacheError::UnsupportedResultShape(s.to_string())),
        }
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultShape::Single => write!(f, "single"),
            ResultShape::Sequence => write!(f, "sequence"),
        }
    }
}

/// A cacheable operation as the host declares it: a logical name plus the
/// declared result shape.
///
/// The name is what callers chose to tag the operation with; nothing stops
/// two operations from sharing one, which makes them share cache keys too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    shape: ResultShape,
}

impl Operation {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: ResultShape::Single,
        }
    }

    pub fn sequence(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: ResultShape::Sequence,
        }
    }

    /// Builds an operation from a textual shape declaration, for hosts that
    /// read their operation table from configuration.
    pub fn from_declaration(name: impl Into<String>, shape: &str) -> Result<Self, CacheError> {
        Ok(Self {
            name: name.into(),
            shape: shape.parse()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }
}
