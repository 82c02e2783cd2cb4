//! Plain text invoice for a completed checkout

use std::fmt::{self, Write};

use chrono::NaiveDate;

use crate::core::checkout::{Checkout, CheckoutForm};
use crate::core::money::{format_btc, format_invoice_price};

const SELLER: &str = "Based Motors";
const SELLER_ADDRESS: &str = "123 Crypto Lane, London, UK";
const SELLER_EMAIL: &str = "sales@basedmotors.com";
const SELLER_PHONE: &str = "+44 20 1234 5678";

/// `Based_Motors_INV_0001_Tesla_Model_3.txt`
pub fn file_name(checkout: &Checkout) -> String {
    let car = checkout.car.name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("Based_Motors_{}_{}.txt", checkout.invoice_id(), car)
}

pub fn render(
    checkout: &Checkout,
    form: &CheckoutForm,
    date: NaiveDate,
) -> Result<String, fmt::Error> {
    let mut doc = String::new();
    write_invoice(&mut doc, checkout, form, date)?;
    Ok(doc)
}

fn write_invoice(
    out: &mut impl Write,
    checkout: &Checkout,
    form: &CheckoutForm,
    date: NaiveDate,
) -> fmt::Result {
    let total = format_invoice_price(checkout.fiat_total(), checkout.currency);

    writeln!(out, "{SELLER}")?;
    writeln!(out, "{SELLER_ADDRESS}")?;
    writeln!(out, "Email: {SELLER_EMAIL}")?;
    writeln!(out, "Phone: {SELLER_PHONE}")?;
    writeln!(out)?;
    writeln!(out, "Invoice #{}", checkout.invoice_id())?;
    writeln!(out, "Date: {}", date.format("%Y-%m-%d"))?;
    writeln!(out)?;

    writeln!(out, "Bill To:")?;
    writeln!(out, "{}", form.name)?;
    writeln!(out, "{}", form.address_line1)?;
    if let Some(line2) = form.address_line2() {
        writeln!(out, "{line2}")?;
    }
    writeln!(out, "{} {}", form.postcode, form.city)?;
    writeln!(out, "{}", form.country)?;
    writeln!(out, "Email: {}", form.email)?;
    writeln!(out, "Phone: {}", form.full_phone())?;
    writeln!(out)?;

    writeln!(
        out,
        "{:<28}{:>10}{:>16}{:>18}",
        "Description", "Quantity", "Unit Price", "Total"
    )?;
    writeln!(
        out,
        "{:<28}{:>10}{:>16}{:>18}",
        checkout.car.name,
        1,
        format!("{} BTC", format_btc(checkout.car.btc_price)),
        total
    )?;
    writeln!(out)?;
    writeln!(out, "{:>54}{:>18}", "Total:", total)?;
    writeln!(out)?;

    writeln!(out, "Payment Method: {}", checkout.method)?;
    writeln!(out, "Transaction ID: {}", checkout.transaction_id)?;
    writeln!(out)?;
    writeln!(out, "Thank you for your purchase!")?;
    writeln!(out, "Terms: Payment completed via Bitcoin.")?;
    writeln!(out, "Contact us at {SELLER_EMAIL} for any queries.")
}
