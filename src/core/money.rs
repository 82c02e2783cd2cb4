//! Fiat conversion and locale-style formatting of prices

use crate::core::currency::Currency;
use crate::core::rates::RateSnapshot;

/// Fiat value of `btc` at the snapshot's rate.
pub fn fiat_price(btc: f64, rates: &RateSnapshot, currency: Currency) -> f64 {
    btc * rates.rate(currency)
}

fn separators(currency: Currency) -> (char, char) {
    match currency {
        // en-US and en-GB
        Currency::Usd | Currency::Gbp => (',', '.'),
        // de-DE
        Currency::Eur => ('.', ','),
    }
}

/// Two decimals with the grouping of the currency's locale: `1,234.56` or `1.234,56`.
pub fn format_amount(value: f64, currency: Currency) -> String {
    let (group, decimal) = separators(currency);
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(group);
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}{decimal}{frac_part}")
}

/// Currency style: `$1,234.56`, `£1,234.56`, `1.234,56 €`.
pub fn format_price(value: f64, currency: Currency) -> String {
    let amount = format_amount(value, currency);
    match currency {
        Currency::Eur => format!("{amount} {}", currency.symbol()),
        _ => format!("{}{amount}", currency.symbol()),
    }
}

/// Symbol-prefixed amount as printed on invoices: `€1.234,56`.
pub fn format_invoice_price(value: f64, currency: Currency) -> String {
    format!("{}{}", currency.symbol(), format_amount(value, currency))
}

pub fn format_btc(value: f64) -> String {
    format!("{value:.4}")
}
