pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::catalog::{CarFilter, Catalog};
use crate::core::checkout::InvoiceCounter;
use crate::core::config::AppConfig;
use crate::core::currency::Currency;
use crate::core::rates::{CrossRateCheck, RateProvider};
use crate::store::{CHECKOUT_COLLECTION, KeyValueStore, RATES_COLLECTION};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub use crate::cli::checkout::CheckoutArgs;

/// Commands that need a loaded configuration. `setup` is handled by the binary.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Prices {
        refresh: bool,
        currency: Option<Currency>,
    },
    Cars {
        filter: CarFilter,
        currency: Option<Currency>,
    },
    Compare {
        car_ids: Vec<u32>,
        currency: Option<Currency>,
    },
    Checkout {
        order: CheckoutArgs,
        currency: Option<Currency>,
    },
    Watch {
        currency: Option<Currency>,
    },
}

/// Everything a command needs, built once from the configuration.
pub struct AppContext {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub rates: Arc<RateProvider>,
    pub invoices: InvoiceCounter,
}

impl AppContext {
    /// Opens the on-disk store under the configured data path.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let data_path = config.default_data_path()?;
        let store = KeyValueStore::open(&data_path)?;
        Self::with_store(config, &store)
    }

    pub fn with_store(config: AppConfig, store: &KeyValueStore) -> Result<Self> {
        let client = providers::util::http_client(config.rates.request_timeout())
            .context("Failed to build HTTP client")?;

        let mut builder = RateProvider::builder(store.collection(RATES_COLLECTION)?)
            .fresh_for(config.rates.fresh_for())
            .cross_check(CrossRateCheck {
                currency: Currency::Gbp,
                ratio: config.rates.gbp_usd_ratio,
                tolerance: config.rates.gbp_tolerance,
            })
            .timezone(config.rates.timezone()?);
        for source in providers::default_sources(&config.providers, client) {
            builder = builder.source(source);
        }

        Ok(AppContext {
            catalog: Catalog::builtin()?,
            rates: Arc::new(builder.build()),
            invoices: InvoiceCounter::new(store.collection(CHECKOUT_COLLECTION)?),
            config,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Based Motors starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let ctx = AppContext::from_config(config)?;
    let display_currency = |currency: Option<Currency>| currency.unwrap_or(ctx.config.currency);

    match command {
        AppCommand::Prices { refresh, currency } => {
            cli::prices::run(&ctx, refresh, display_currency(currency)).await
        }
        AppCommand::Cars { filter, currency } => {
            cli::cars::run(&ctx, &filter, display_currency(currency)).await
        }
        AppCommand::Compare { car_ids, currency } => {
            cli::compare::run(&ctx, &car_ids, display_currency(currency)).await
        }
        AppCommand::Checkout { order, currency } => {
            cli::checkout::run(&ctx, &order, display_currency(currency)).await
        }
        AppCommand::Watch { currency } => cli::watch::run(&ctx, display_currency(currency)).await,
    }
}
