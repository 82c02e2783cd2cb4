use super::ui;
use crate::AppContext;
use crate::core::catalog::{Car, CarFilter};
use crate::core::currency::Currency;
use crate::core::money::{fiat_price, format_btc, format_price};
use crate::core::rates::RateSnapshot;
use anyhow::Result;
use comfy_table::Cell;

pub fn cars_table(cars: &[&Car], snapshot: &RateSnapshot, currency: Currency) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Car"),
        ui::header_cell("Brand"),
        ui::header_cell("BTC"),
        ui::header_cell(&format!("Price ({currency})")),
        ui::header_cell("Battery"),
        ui::header_cell("Range"),
        ui::header_cell("0-60"),
        ui::header_cell("Top Speed"),
    ]);

    for car in cars {
        table.add_row(vec![
            Cell::new(car.id),
            Cell::new(&car.name),
            Cell::new(&car.brand),
            ui::amount_cell(format_btc(car.btc_price)),
            ui::amount_cell(format_price(
                fiat_price(car.btc_price, snapshot, currency),
                currency,
            )),
            Cell::new(&car.specs.battery),
            Cell::new(&car.specs.range),
            Cell::new(&car.specs.zero_to_sixty),
            Cell::new(&car.specs.top_speed),
        ]);
    }
    table.to_string()
}

pub async fn run(ctx: &AppContext, filter: &CarFilter, currency: Currency) -> Result<()> {
    let cars = ctx.catalog.filter(filter);
    if cars.is_empty() {
        println!("No cars match your search.");
        return Ok(());
    }

    let pb = ui::new_spinner("Fetching BTC rates...");
    let snapshot = ctx.rates.resolve(false).await;
    pb.finish_and_clear();

    println!(
        "\n{} {}\n",
        ui::style_text("Based Motors", ui::StyleType::Title),
        ui::style_text(
            &format!("{} of {} cars, sorted by {}", cars.len(), ctx.catalog.cars().len(), filter.sort),
            ui::StyleType::Subtle
        )
    );
    println!("{}", cars_table(&cars, &snapshot, currency));
    ui::print_rates_footer(&ctx.rates);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::currency::Quotes;
    use chrono::Utc;

    #[test]
    fn test_cars_table_shows_fiat_prices() {
        let catalog = Catalog::builtin().unwrap();
        let cars = catalog.filter(&CarFilter {
            brand: Some("BYD".to_string()),
            ..CarFilter::default()
        });
        let snapshot = RateSnapshot {
            quotes: Quotes {
                usd: 100000.0,
                gbp: 80000.0,
                eur: 90000.0,
            },
            fetched_at: Utc::now(),
            degraded: false,
        };

        let table = console::strip_ansi_codes(&cars_table(&cars, &snapshot, Currency::Gbp)).to_string();
        assert!(table.contains("Price (GBP)"));
        assert!(table.contains("BYD Dolphin"));
        // 0.33 BTC at £80,000
        assert!(table.contains("£26,400.00"));
        assert!(table.contains("0.5900"));
        assert!(!table.contains("Tesla"));
    }
}
