//! Failure taxonomy for rate acquisition

use thiserror::Error;

/// Why a single source attempt did not yield a usable quote. These never
/// escape `RateProvider::resolve`; the provider recovers from all of them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RateError {
    #[error("Network error from {source_name}: {message}")]
    Network {
        source_name: String,
        message: String,
    },

    #[error("Failed to parse response from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("Implausible {currency} quote: {message}")]
    Validation { currency: String, message: String },

    #[error("{source_name} reported errors: {}", errors.join(", "))]
    Upstream {
        source_name: String,
        errors: Vec<String>,
    },
}

impl RateError {
    pub fn network(source_name: &str, message: impl ToString) -> Self {
        RateError::Network {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }

    pub fn parse(source_name: &str, message: impl ToString) -> Self {
        RateError::Parse {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_lists_all_messages() {
        let err = RateError::Upstream {
            source_name: "Kraken".to_string(),
            errors: vec!["EQuery:Unknown asset pair".to_string(), "EGeneral:Busy".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Kraken reported errors: EQuery:Unknown asset pair, EGeneral:Busy"
        );
    }
}
