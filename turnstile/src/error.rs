/// Errors raised while constructing or configuring a limiter.
///
/// Admission itself never fails; these are only produced up front.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    /// A rate was zero, negative, NaN or infinite.
    #[error("rate must be a positive, finite number of operations per second, got {rate}")]
    InvalidRate { rate: f64 },

    /// A window or interval of zero length was supplied.
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    /// A queue capacity beyond what the runtime can track.
    #[error("capacity {capacity} exceeds the maximum of {max}")]
    CapacityTooLarge { capacity: usize, max: usize },

    /// The leaky bucket could not find a Tokio runtime to run its drain task on.
    #[error("leaky bucket requires a Tokio runtime to drive its drain task")]
    NoRuntime,

    /// A limiter configuration could not be parsed.
    #[error("invalid limiter configuration: {0}")]
    Config(String),

    /// A configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for limiter construction.
pub type Result<T> = std::result::Result<T, LimiterError>;

pub(crate) fn validate_rate(rate: f64) -> Result<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(LimiterError::InvalidRate { rate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_degenerate_rates() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                validate_rate(rate),
                Err(LimiterError::InvalidRate { .. })
            ));
        }
        assert_eq!(validate_rate(0.5).unwrap(), 0.5);
    }

    #[test]
    fn test_error_messages() {
        let err = LimiterError::ZeroDuration { name: "window" };
        assert_eq!(err.to_string(), "window must be greater than zero");
    }
}
