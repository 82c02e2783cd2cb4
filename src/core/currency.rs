//! Quote currencies and the rate source abstraction

use crate::core::error::RateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Ticker of the base asset every quote is expressed against.
pub const BASE_ASSET: &str = "BTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Gbp,
    Eur,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Gbp, Currency::Eur];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Eur => "EUR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Gbp => "£",
            Currency::Eur => "€",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "GBP" => Ok(Currency::Gbp),
            "EUR" => Ok(Currency::Eur),
            _ => Err(anyhow::anyhow!("Unsupported currency: {}", s)),
        }
    }
}

/// Price of one BTC in each quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quotes {
    pub usd: f64,
    pub gbp: f64,
    pub eur: f64,
}

impl Quotes {
    pub fn get(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Usd => self.usd,
            Currency::Gbp => self.gbp,
            Currency::Eur => self.eur,
        }
    }

    pub fn set(&mut self, currency: Currency, value: f64) {
        match currency {
            Currency::Usd => self.usd = value,
            Currency::Gbp => self.gbp = value,
            Currency::Eur => self.eur = value,
        }
    }

    /// Fails on the first quote that is not a finite positive number.
    pub fn ensure_positive(self) -> Result<Self, RateError> {
        for currency in Currency::ALL {
            let value = self.get(currency);
            if !(value.is_finite() && value > 0.0) {
                return Err(RateError::Validation {
                    currency: currency.code().to_string(),
                    message: format!("expected a positive quote, got {value}"),
                });
            }
        }
        Ok(self)
    }
}

/// An upstream service able to quote BTC in fiat.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;

    /// All three quotes in one call.
    async fn fetch_rates(&self) -> Result<Quotes, RateError>;

    /// A single pair. Sources with a cheaper single-pair endpoint override this.
    async fn fetch_rate(&self, currency: Currency) -> Result<f64, RateError> {
        Ok(self.fetch_rates().await?.get(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parsing() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" GBP ".parse::<Currency>().unwrap(), Currency::Gbp);
        assert_eq!("Eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert!("JPY".parse::<Currency>().is_err());
    }

    #[test]
    fn test_ensure_positive_names_offending_currency() {
        let quotes = Quotes {
            usd: 100000.0,
            gbp: 75000.0,
            eur: 0.0,
        };
        match quotes.ensure_positive() {
            Err(RateError::Validation { currency, .. }) => assert_eq!(currency, "EUR"),
            other => panic!("Expected validation error, got {other:?}"),
        }

        let nan = Quotes {
            usd: f64::NAN,
            gbp: 1.0,
            eur: 1.0,
        };
        assert!(nan.ensure_positive().is_err());
    }
}
