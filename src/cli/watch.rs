use super::ui;
use crate::AppContext;
use crate::core::currency::{BASE_ASSET, Currency};
use crate::core::money::format_price;
use crate::core::rates::RateState;
use anyhow::Result;
use std::future::Future;
use tracing::debug;

/// One line per published state, e.g. `[13:00:05] 1 BTC = $103,475.55`.
pub fn update_line(state: &RateState, updated: &str, currency: Currency) -> Option<String> {
    let snapshot = state.snapshot.as_ref()?;
    Some(format!(
        "[{updated}] 1 {BASE_ASSET} = {}",
        format_price(snapshot.rate(currency), currency)
    ))
}

/// Runs the periodic refresh and prints every update until `shutdown` completes.
/// Returns the number of updates printed.
pub async fn watch_until(
    ctx: &AppContext,
    currency: Currency,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let mut updates = ctx.rates.subscribe();
    let handle = ctx.rates.start(ctx.config.rates.refresh_interval());
    tokio::pin!(shutdown);

    let mut printed = 0;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if let Some(line) = update_line(&state, &ctx.rates.last_updated_display(), currency) {
                    println!("{line}");
                    printed += 1;
                }
                if let Some(error) = &state.error {
                    println!("{}", ui::style_text(error, ui::StyleType::Error));
                }
            }
            _ = &mut shutdown => {
                debug!("Stopping rate watch");
                break;
            }
        }
    }

    handle.stop();
    Ok(printed)
}

pub async fn run(ctx: &AppContext, currency: Currency) -> Result<()> {
    println!(
        "Watching {BASE_ASSET} rates every {}s. Press Ctrl-C to stop.",
        ctx.config.rates.refresh_interval().as_secs()
    );
    watch_until(ctx, currency, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .map(|_| ())
}
