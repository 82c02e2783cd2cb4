use super::ui;
use crate::AppContext;
use crate::core::checkout::{Checkout, CheckoutDelays, CheckoutForm, CheckoutStep, PaymentMethod};
use crate::core::currency::Currency;
use crate::core::invoice;
use crate::core::money::{format_btc, format_price};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CheckoutArgs {
    pub car_id: u32,
    pub method: PaymentMethod,
    pub form: CheckoutForm,
    /// Directory the invoice is written to
    pub output_dir: PathBuf,
}

/// Runs the simulated purchase and writes the invoice. Returns the invoice path.
pub async fn purchase(ctx: &AppContext, args: &CheckoutArgs, currency: Currency) -> Result<PathBuf> {
    let car = ctx.catalog.find(args.car_id)?.clone();
    args.form.validate()?;

    let rates = ctx.rates.resolve(false).await;
    let mut checkout = Checkout::open(car, args.method, currency, rates, &ctx.invoices).await;

    println!(
        "\n{} {}",
        ui::style_text("Checkout:", ui::StyleType::TotalLabel),
        checkout.car.name
    );
    println!(
        "Total: {} ({} BTC)\n",
        ui::style_text(
            &format_price(checkout.fiat_total(), currency),
            ui::StyleType::TotalValue
        ),
        format_btc(checkout.car.btc_price)
    );

    let pay_message = format!(
        "Please send {} BTC to {}  Simulating payment...",
        format_btc(checkout.car.btc_price),
        checkout.method.pay_to()
    );
    let pb = ui::new_spinner("Submitting order...");
    checkout
        .submit(
            &args.form,
            &ctx.invoices,
            CheckoutDelays::from(&ctx.config.checkout),
            |step| match step {
                CheckoutStep::Payment => pb.set_message(pay_message.clone()),
                CheckoutStep::Success => pb.finish_and_clear(),
                CheckoutStep::Form => {}
            },
        )
        .await?;

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create directory: {}", args.output_dir.display())
    })?;
    let path = args.output_dir.join(invoice::file_name(&checkout));
    let document = invoice::render(&checkout, &args.form, Utc::now().date_naive())
        .context("Failed to render invoice")?;
    std::fs::write(&path, document)
        .with_context(|| format!("Failed to write invoice to {}", path.display()))?;
    info!(path = %path.display(), "Invoice written");

    println!(
        "{}",
        ui::style_text(
            &format!("Congratulations, {}!", args.form.name),
            ui::StyleType::Title
        )
    );
    println!("You've purchased a {}!", checkout.car.name);
    println!("Transaction ID: {}", checkout.transaction_id);
    println!("Invoice {} saved to {}", checkout.invoice_id(), path.display());
    Ok(path)
}

pub async fn run(ctx: &AppContext, args: &CheckoutArgs, currency: Currency) -> Result<()> {
    purchase(ctx, args, currency).await.map(|_| ())
}
