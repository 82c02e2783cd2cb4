use super::ui;
use crate::AppContext;
use crate::core::catalog::Car;
use crate::core::compare::CompareSet;
use crate::core::currency::Currency;
use crate::core::money::{fiat_price, format_btc, format_price};
use crate::core::rates::RateSnapshot;
use anyhow::Result;
use comfy_table::Cell;

/// Builds the selection in argument order; repeated ids are ignored.
pub fn selection(car_ids: &[u32]) -> Result<CompareSet> {
    let mut set = CompareSet::new();
    for &id in car_ids {
        if !set.contains(id) {
            set.toggle(id)?;
        }
    }
    if !set.is_ready() {
        anyhow::bail!("Select at least two cars to compare");
    }
    Ok(set)
}

/// Row whose best value (lowest when `lower_is_better`) is highlighted.
fn spec_row(
    label: &str,
    cars: &[&Car],
    value: impl Fn(&Car) -> f64,
    display: impl Fn(&Car) -> String,
    lower_is_better: bool,
) -> Vec<Cell> {
    let values: Vec<f64> = cars.iter().map(|c| value(c)).collect();
    let best = values.iter().copied().fold(None, |best: Option<f64>, v| match best {
        Some(b) if (lower_is_better && b <= v) || (!lower_is_better && b >= v) => Some(b),
        _ => Some(v),
    });

    let mut row = vec![ui::header_cell(label)];
    for (car, v) in cars.iter().zip(&values) {
        if Some(*v) == best {
            row.push(ui::best_cell(display(car)));
        } else {
            row.push(ui::amount_cell(display(car)));
        }
    }
    row
}

pub fn comparison_table(cars: &[&Car], snapshot: &RateSnapshot, currency: Currency) -> String {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("")];
    header.extend(cars.iter().map(|c| ui::header_cell(&c.name)));
    table.set_header(header);

    table.add_row(spec_row(
        "Price (BTC)",
        cars,
        |c| c.btc_price,
        |c| format_btc(c.btc_price),
        true,
    ));
    table.add_row(spec_row(
        &format!("Price ({currency})"),
        cars,
        |c| c.btc_price,
        |c| format_price(fiat_price(c.btc_price, snapshot, currency), currency),
        true,
    ));
    table.add_row(spec_row(
        "Battery",
        cars,
        Car::battery_kwh,
        |c| c.specs.battery.clone(),
        false,
    ));
    table.add_row(spec_row(
        "Range",
        cars,
        Car::range_miles,
        |c| c.specs.range.clone(),
        false,
    ));
    table.add_row(spec_row(
        "0-60",
        cars,
        Car::zero_to_sixty_secs,
        |c| c.specs.zero_to_sixty.clone(),
        true,
    ));
    table.add_row(spec_row(
        "Top Speed",
        cars,
        Car::top_speed_mph,
        |c| c.specs.top_speed.clone(),
        false,
    ));
    table.to_string()
}

pub async fn run(ctx: &AppContext, car_ids: &[u32], currency: Currency) -> Result<()> {
    let set = selection(car_ids)?;
    let cars = set
        .ids()
        .iter()
        .map(|&id| ctx.catalog.find(id))
        .collect::<Result<Vec<_>, _>>()?;

    let snapshot = ctx.rates.resolve(false).await;

    println!(
        "\n{}\n",
        ui::style_text("Compare Cars", ui::StyleType::Title)
    );
    println!("{}", comparison_table(&cars, &snapshot, currency));
    ui::print_rates_footer(&ctx.rates);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::compare::CompareError;
    use crate::core::rates::FALLBACK_QUOTES;
    use chrono::Utc;

    #[test]
    fn test_selection_bounds() {
        assert_eq!(selection(&[1, 4, 1]).unwrap().ids(), &[1, 4]);
        assert!(selection(&[3]).is_err());
        assert!(selection(&[3, 3]).is_err());

        let err = selection(&[1, 2, 3, 4, 5]).unwrap_err();
        assert_eq!(err.downcast_ref::<CompareError>(), Some(&CompareError::Full));
    }

    #[test]
    fn test_comparison_table_has_a_column_per_car() {
        let catalog = Catalog::builtin().unwrap();
        let cars = vec![catalog.find(1).unwrap(), catalog.find(9).unwrap()];
        let snapshot = RateSnapshot {
            quotes: FALLBACK_QUOTES,
            fetched_at: Utc::now(),
            degraded: true,
        };

        let table =
            console::strip_ansi_codes(&comparison_table(&cars, &snapshot, Currency::Usd)).to_string();
        assert!(table.contains("Tesla Model 3"));
        assert!(table.contains("Rolls-Royce Spectre"));
        assert!(table.contains("Price (USD)"));
        assert!(table.contains("4.2000"));
        assert!(table.contains("162 mph"));
    }
}
