//! Simulated purchase flow: form validation, payment steps, transaction ids
//! and the persisted invoice counter.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::cache::{KeyValueCollection, get_json, put_json};
use crate::core::catalog::Car;
use crate::core::currency::Currency;
use crate::core::money::fiat_price;
use crate::core::rates::RateSnapshot;

pub const BTC_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";
pub const LIGHTNING_INVOICE: &str =
    "lnbc1p3s7x8qpp5x9k8zv4q3j9k8zv4q3j9k8zv4q3j9k8zv4q3j9k8zv4q3j9k";

pub const DEFAULT_COUNTRY: &str = "United Kingdom";

/// Store key of the last invoice number handed out by a successful checkout
pub const INVOICE_COUNTER_KEY: &str = "lastInvoiceNumber";

const DIALLING_CODES: &[(&str, &str)] = &[
    ("Algeria", "+213"),
    ("Antarctica", "+672"),
    ("Australia", "+61"),
    ("Austria", "+43"),
    ("Belgium", "+32"),
    ("Belize", "+501"),
    ("Brazil", "+55"),
    ("Canada", "+1"),
    ("China", "+86"),
    ("Colombia", "+57"),
    ("Cuba", "+53"),
    ("Cyprus", "+357"),
    ("Dominican Republic", "+1"),
    ("Egypt", "+20"),
    ("El Salvador", "+503"),
    ("France", "+33"),
    ("Germany", "+49"),
    ("Hong Kong", "+852"),
    ("India", "+91"),
    ("Italy", "+39"),
    ("Japan", "+81"),
    ("Mexico", "+52"),
    ("Monaco", "+377"),
    ("Netherlands", "+31"),
    ("Nigeria", "+234"),
    ("North Korea", "+850"),
    ("Northern Ireland", "+44"),
    ("Norway", "+47"),
    ("Pakistan", "+92"),
    ("Peru", "+51"),
    ("Poland", "+48"),
    ("Portugal", "+351"),
    ("Qatar", "+974"),
    ("Republic of Ireland", "+353"),
    ("Romania", "+40"),
    ("Russia", "+7"),
    ("Saudi Arabia", "+966"),
    ("Singapore", "+65"),
    ("South Africa", "+27"),
    ("South Korea", "+82"),
    ("Spain", "+34"),
    ("Sweden", "+46"),
    ("Switzerland", "+41"),
    ("Taiwan", "+886"),
    ("Turkey", "+90"),
    ("Ukraine", "+380"),
    ("United Arab Emirates", "+971"),
    ("United Kingdom", "+44"),
    ("United States", "+1"),
];

pub fn dialling_code(country: &str) -> Option<&'static str> {
    DIALLING_CODES
        .iter()
        .find(|(name, _)| *name == country)
        .map(|(_, code)| *code)
}

#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("You must agree to the terms and conditions")]
    TermsNotAccepted,
    #[error("Unsupported country: {0}")]
    UnknownCountry(String),
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Checkout has already been submitted")]
    AlreadySubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Bitcoin,
    Lightning,
}

impl PaymentMethod {
    /// Where the buyer is asked to send funds
    pub fn pay_to(&self) -> &'static str {
        match self {
            PaymentMethod::Bitcoin => BTC_ADDRESS,
            PaymentMethod::Lightning => LIGHTNING_INVOICE,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Bitcoin => write!(f, "Bitcoin"),
            PaymentMethod::Lightning => write!(f, "Lightning"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(PaymentMethod::Bitcoin),
            "lightning" | "ln" => Ok(PaymentMethod::Lightning),
            _ => Err(anyhow::anyhow!("Unsupported payment method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutForm {
    pub name: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub postcode: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub phone: String,
    pub terms_agreed: bool,
    pub newsletter_opt_in: bool,
}

impl Default for CheckoutForm {
    fn default() -> Self {
        CheckoutForm {
            name: String::new(),
            address_line1: String::new(),
            address_line2: None,
            postcode: String::new(),
            city: String::new(),
            country: DEFAULT_COUNTRY.to_string(),
            email: String::new(),
            phone: String::new(),
            terms_agreed: false,
            newsletter_opt_in: false,
        }
    }
}

impl CheckoutForm {
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let required = [
            ("Name", &self.name),
            ("Address line 1", &self.address_line1),
            ("Postcode", &self.postcode),
            ("City", &self.city),
            ("Country", &self.country),
            ("Email", &self.email),
            ("Phone", &self.phone),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(CheckoutError::MissingField(*field));
        }
        if dialling_code(&self.country).is_none() {
            return Err(CheckoutError::UnknownCountry(self.country.clone()));
        }
        if !self.email.contains('@') {
            return Err(CheckoutError::InvalidEmail(self.email.clone()));
        }
        if !self.terms_agreed {
            return Err(CheckoutError::TermsNotAccepted);
        }
        Ok(())
    }

    /// Phone number prefixed with the country's dialling code
    pub fn full_phone(&self) -> String {
        format!(
            "{}{}",
            dialling_code(&self.country).unwrap_or_default(),
            self.phone
        )
    }

    pub fn address_line2(&self) -> Option<&str> {
        self.address_line2
            .as_deref()
            .filter(|line| !line.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    Form,
    Payment,
    Success,
}

/// A random `txid:xxxxxxxx-xxxxxxxx` identifier.
pub fn transaction_id() -> String {
    format!(
        "txid:{:08x}-{:08x}",
        rand::random::<u32>(),
        rand::random::<u32>()
    )
}

pub fn invoice_number(n: u32) -> String {
    format!("INV_{n:04}")
}

/// Sequential invoice numbers backed by the checkout collection.
pub struct InvoiceCounter {
    store: Arc<dyn KeyValueCollection>,
}

impl InvoiceCounter {
    pub fn new(store: Arc<dyn KeyValueCollection>) -> Self {
        Self { store }
    }

    pub async fn last(&self) -> u32 {
        get_json::<u32>(self.store.as_ref(), INVOICE_COUNTER_KEY)
            .await
            .unwrap_or(0)
    }

    /// The number the next successful checkout will use. Does not reserve it.
    pub async fn peek_next(&self) -> u32 {
        self.last().await.saturating_add(1)
    }

    pub async fn commit(&self, number: u32) {
        debug!(number, "Committing invoice number");
        put_json(self.store.as_ref(), INVOICE_COUNTER_KEY, &number).await;
    }
}

/// Timing of the simulated steps
#[derive(Debug, Clone, Copy)]
pub struct CheckoutDelays {
    pub submit: Duration,
    pub payment: Duration,
}

impl From<&crate::core::config::CheckoutConfig> for CheckoutDelays {
    fn from(config: &crate::core::config::CheckoutConfig) -> Self {
        CheckoutDelays {
            submit: config.submit_delay(),
            payment: config.payment_delay(),
        }
    }
}

/// One purchase of one car. Prices are fixed to the rates captured at `open`.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub car: Car,
    pub method: PaymentMethod,
    pub currency: Currency,
    pub rates: RateSnapshot,
    pub transaction_id: String,
    pub invoice_number: u32,
    step: CheckoutStep,
}

impl Checkout {
    pub async fn open(
        car: Car,
        method: PaymentMethod,
        currency: Currency,
        rates: RateSnapshot,
        counter: &InvoiceCounter,
    ) -> Self {
        Checkout {
            car,
            method,
            currency,
            rates,
            transaction_id: transaction_id(),
            invoice_number: counter.peek_next().await,
            step: CheckoutStep::Form,
        }
    }

    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn invoice_id(&self) -> String {
        invoice_number(self.invoice_number)
    }

    pub fn fiat_total(&self) -> f64 {
        fiat_price(self.car.btc_price, &self.rates, self.currency)
    }

    /// Validates the form, runs the payment simulation and commits the invoice
    /// number. Nothing is committed if validation fails.
    pub async fn submit(
        &mut self,
        form: &CheckoutForm,
        counter: &InvoiceCounter,
        delays: CheckoutDelays,
        mut on_step: impl FnMut(CheckoutStep),
    ) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::Form {
            return Err(CheckoutError::AlreadySubmitted);
        }
        form.validate()?;

        tokio::time::sleep(delays.submit).await;
        self.step = CheckoutStep::Payment;
        on_step(self.step);

        tokio::time::sleep(delays.payment).await;
        self.step = CheckoutStep::Success;
        counter.commit(self.invoice_number).await;
        info!(
            invoice = %self.invoice_id(),
            car = %self.car.name,
            method = %self.method,
            "Checkout completed"
        );
        on_step(self.step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::currency::Quotes;
    use crate::store::memory::MemoryCollection;
    use chrono::Utc;

    fn valid_form() -> CheckoutForm {
        CheckoutForm {
            name: "Satoshi Nakamoto".to_string(),
            address_line1: "1 Genesis Way".to_string(),
            postcode: "EC1A 1BB".to_string(),
            city: "London".to_string(),
            email: "satoshi@example.com".to_string(),
            phone: "7700900123".to_string(),
            terms_agreed: true,
            ..CheckoutForm::default()
        }
    }

    fn rates() -> RateSnapshot {
        RateSnapshot {
            quotes: Quotes {
                usd: 100000.0,
                gbp: 80000.0,
                eur: 90000.0,
            },
            fetched_at: Utc::now(),
            degraded: false,
        }
    }

    fn delays() -> CheckoutDelays {
        CheckoutDelays {
            submit: Duration::from_secs(1),
            payment: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_form_validation() {
        assert_eq!(valid_form().validate(), Ok(()));
        assert_eq!(CheckoutForm::default().country, "United Kingdom");

        let form = CheckoutForm {
            city: "   ".to_string(),
            ..valid_form()
        };
        assert_eq!(form.validate(), Err(CheckoutError::MissingField("City")));

        let form = CheckoutForm {
            terms_agreed: false,
            ..valid_form()
        };
        assert_eq!(form.validate(), Err(CheckoutError::TermsNotAccepted));

        let form = CheckoutForm {
            country: "Atlantis".to_string(),
            ..valid_form()
        };
        assert_eq!(
            form.validate(),
            Err(CheckoutError::UnknownCountry("Atlantis".to_string()))
        );

        let form = CheckoutForm {
            email: "satoshi".to_string(),
            ..valid_form()
        };
        assert!(matches!(form.validate(), Err(CheckoutError::InvalidEmail(_))));
    }

    #[test]
    fn test_phone_gets_dialling_code() {
        assert_eq!(valid_form().full_phone(), "+447700900123");
        let form = CheckoutForm {
            country: "Germany".to_string(),
            ..valid_form()
        };
        assert_eq!(form.full_phone(), "+497700900123");
        assert_eq!(DIALLING_CODES.len(), 49);
    }

    #[test]
    fn test_transaction_id_shape() {
        let id = transaction_id();
        let (prefix, rest) = id.split_once(':').unwrap();
        assert_eq!(prefix, "txid");
        let (a, b) = rest.split_once('-').unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 8);
        assert!(rest.chars().all(|c| c == '-' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("Bitcoin".parse::<PaymentMethod>().unwrap(), PaymentMethod::Bitcoin);
        assert_eq!("lightning".parse::<PaymentMethod>().unwrap(), PaymentMethod::Lightning);
        assert!("paypal".parse::<PaymentMethod>().is_err());
        assert_eq!(PaymentMethod::Bitcoin.pay_to(), BTC_ADDRESS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_walks_steps_and_commits_invoice() {
        let counter = InvoiceCounter::new(Arc::new(MemoryCollection::new()));
        let car = Catalog::builtin().unwrap().find(1).unwrap().clone();
        let mut checkout =
            Checkout::open(car, PaymentMethod::Bitcoin, Currency::Gbp, rates(), &counter).await;

        assert_eq!(checkout.invoice_id(), "INV_0001");
        assert_eq!(checkout.step(), CheckoutStep::Form);
        assert_eq!(checkout.fiat_total(), 0.515 * 80000.0);

        let start = tokio::time::Instant::now();
        let mut steps = Vec::new();
        checkout
            .submit(&valid_form(), &counter, delays(), |step| steps.push(step))
            .await
            .unwrap();

        assert_eq!(steps, vec![CheckoutStep::Payment, CheckoutStep::Success]);
        assert!(start.elapsed() >= Duration::from_secs(11));
        assert_eq!(counter.last().await, 1);
        assert_eq!(counter.peek_next().await, 2);

        let again = checkout
            .submit(&valid_form(), &counter, delays(), |_| {})
            .await;
        assert_eq!(again, Err(CheckoutError::AlreadySubmitted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_form_commits_nothing() {
        let counter = InvoiceCounter::new(Arc::new(MemoryCollection::new()));
        let car = Catalog::builtin().unwrap().find(4).unwrap().clone();
        let mut checkout =
            Checkout::open(car, PaymentMethod::Lightning, Currency::Usd, rates(), &counter).await;

        let form = CheckoutForm {
            terms_agreed: false,
            ..valid_form()
        };
        let mut steps = Vec::new();
        let result = checkout
            .submit(&form, &counter, delays(), |step| steps.push(step))
            .await;

        assert_eq!(result, Err(CheckoutError::TermsNotAccepted));
        assert!(steps.is_empty());
        assert_eq!(checkout.step(), CheckoutStep::Form);
        assert_eq!(counter.last().await, 0);
    }

    #[tokio::test]
    async fn test_abandoned_checkouts_reuse_the_number() {
        let counter = InvoiceCounter::new(Arc::new(MemoryCollection::new()));
        counter.commit(41).await;
        let car = Catalog::builtin().unwrap().find(2).unwrap().clone();

        let first =
            Checkout::open(car.clone(), PaymentMethod::Bitcoin, Currency::Usd, rates(), &counter)
                .await;
        let second =
            Checkout::open(car, PaymentMethod::Bitcoin, Currency::Usd, rates(), &counter).await;
        assert_eq!(first.invoice_id(), "INV_0042");
        assert_eq!(second.invoice_id(), "INV_0042");
        assert_ne!(first.transaction_id, second.transaction_id);
    }
}
