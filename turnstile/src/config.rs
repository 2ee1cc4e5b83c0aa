//! Declarative limiter configuration.
//!
//! A [`LimiterConfig`] names one algorithm and its parameters. Durations are
//! written in human-readable form (`"1s"`, `"250ms"`):
//!
//! ```yaml
//! algorithm: token_bucket
//! rate_per_second: 5.0
//! capacity: 5
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::FixedWindow;
use crate::LeakyBucket;
use crate::Limiter;
use crate::SlidingWindow;
use crate::TokenBucket;
use crate::error::LimiterError;
use crate::error::Result;

/// One limiter, described by its algorithm and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterConfig {
    FixedWindow {
        limit: NonZeroUsize,
        #[serde(with = "humantime_duration")]
        window: Duration,
    },
    SlidingWindow {
        limit: NonZeroUsize,
        #[serde(with = "humantime_duration")]
        interval: Duration,
    },
    TokenBucket {
        rate_per_second: f64,
        capacity: NonZeroUsize,
    },
    LeakyBucket {
        drain_rate_per_second: f64,
        capacity: NonZeroUsize,
    },
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("failed to parse limiter config: {}", e)))
    }

    /// The algorithm name, as written in configuration.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::FixedWindow { .. } => "fixed_window",
            Self::SlidingWindow { .. } => "sliding_window",
            Self::TokenBucket { .. } => "token_bucket",
            Self::LeakyBucket { .. } => "leaky_bucket",
        }
    }

    /// Validate the parameters and construct the limiter.
    ///
    /// A leaky bucket spawns its drain task, so this must run inside a Tokio
    /// runtime for that variant.
    pub fn build(&self) -> Result<Arc<dyn Limiter>> {
        let limiter: Arc<dyn Limiter> = match *self {
            Self::FixedWindow { limit, window } => Arc::new(FixedWindow::new(limit, window)?),
            Self::SlidingWindow { limit, interval } => {
                Arc::new(SlidingWindow::new(limit, interval)?)
            }
            Self::TokenBucket {
                rate_per_second,
                capacity,
            } => Arc::new(TokenBucket::new(rate_per_second, capacity)?),
            Self::LeakyBucket {
                drain_rate_per_second,
                capacity,
            } => Arc::new(LeakyBucket::new(drain_rate_per_second, capacity)?),
        };
        Ok(limiter)
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
