//! Core business logic: rates, catalog and checkout

pub mod cache;
pub mod catalog;
pub mod checkout;
pub mod compare;
pub mod config;
pub mod currency;
pub mod error;
pub mod invoice;
pub mod log;
pub mod money;
pub mod rates;

// Re-export main types for cleaner imports
pub use currency::{Currency, Quotes, RateSource};
pub use error::RateError;
pub use rates::{RateProvider, RateSnapshot, RateState, RefreshHandle};
