use super::ui;
use crate::AppContext;
use crate::core::currency::{BASE_ASSET, Currency};
use crate::core::money::format_price;
use crate::core::rates::RateSnapshot;
use anyhow::Result;
use comfy_table::Cell;

/// Renders one row per quote currency, marking the selected one.
pub fn rates_table(snapshot: &RateSnapshot, selected: Currency) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("1 {BASE_ASSET}")),
    ]);

    for currency in Currency::ALL {
        let price = format_price(snapshot.rate(currency), currency);
        let price_cell = if currency == selected {
            ui::best_cell(price)
        } else {
            ui::amount_cell(price)
        };
        table.add_row(vec![Cell::new(currency.code()), price_cell]);
    }
    table.to_string()
}

pub async fn run(ctx: &AppContext, refresh: bool, currency: Currency) -> Result<()> {
    let pb = ui::new_spinner("Fetching BTC rates...");
    let snapshot = ctx.rates.resolve(refresh).await;
    pb.finish_and_clear();

    println!(
        "\n{}\n",
        ui::style_text(&format!("{BASE_ASSET} Rates"), ui::StyleType::Title)
    );
    println!("{}", rates_table(&snapshot, currency));
    if snapshot.degraded && ctx.rates.error_message().is_none() {
        println!(
            "{}",
            ui::style_text("Some quotes are estimates", ui::StyleType::Subtle)
        );
    }
    ui::print_rates_footer(&ctx.rates);
    Ok(())
}
