pub mod coingecko;
pub mod kraken;
pub mod util;

use crate::core::config::ProvidersConfig;
use crate::core::currency::RateSource;
use std::sync::Arc;

/// The source chain in fallback order: CoinGecko first, then Kraken.
pub fn default_sources(
    config: &ProvidersConfig,
    client: reqwest::Client,
) -> Vec<Arc<dyn RateSource>> {
    vec![
        Arc::new(coingecko::CoinGeckoSource::new(
            &config.coingecko.base_url,
            client.clone(),
        )),
        Arc::new(kraken::KrakenSource::new(&config.kraken.base_url, client)),
    ]
}
