use anyhow::Result;
use basedmotors::core::catalog::{CarFilter, SortOrder};
use basedmotors::core::checkout::{CheckoutForm, DEFAULT_COUNTRY, PaymentMethod};
use basedmotors::core::currency::Currency;
use basedmotors::core::log::init_logging;
use basedmotors::{AppCommand, CheckoutArgs};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct CheckoutCommand {
    /// Id of the car to buy, as listed by `cars`
    car_id: u32,
    /// bitcoin or lightning
    #[arg(long, default_value = "bitcoin")]
    method: PaymentMethod,
    #[arg(long)]
    name: String,
    #[arg(long)]
    address_line1: String,
    #[arg(long)]
    address_line2: Option<String>,
    #[arg(long)]
    postcode: String,
    #[arg(long)]
    city: String,
    #[arg(long, default_value = DEFAULT_COUNTRY)]
    country: String,
    #[arg(long)]
    email: String,
    /// Phone number without the country dialling code
    #[arg(long)]
    phone: String,
    /// Agree to the terms and conditions
    #[arg(long)]
    accept_terms: bool,
    #[arg(long)]
    newsletter: bool,
    /// Directory the invoice is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    #[arg(long)]
    currency: Option<Currency>,
}

impl From<CheckoutCommand> for AppCommand {
    fn from(cmd: CheckoutCommand) -> AppCommand {
        AppCommand::Checkout {
            order: CheckoutArgs {
                car_id: cmd.car_id,
                method: cmd.method,
                form: CheckoutForm {
                    name: cmd.name,
                    address_line1: cmd.address_line1,
                    address_line2: cmd.address_line2,
                    postcode: cmd.postcode,
                    city: cmd.city,
                    country: cmd.country,
                    email: cmd.email,
                    phone: cmd.phone,
                    terms_agreed: cmd.accept_terms,
                    newsletter_opt_in: cmd.newsletter,
                },
                output_dir: cmd.output_dir,
            },
            currency: cmd.currency,
        }
    }
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Prices { refresh, currency } => AppCommand::Prices { refresh, currency },
            Commands::Cars {
                search,
                brand,
                sort,
                currency,
            } => AppCommand::Cars {
                filter: CarFilter {
                    search,
                    brand,
                    sort,
                },
                currency,
            },
            Commands::Compare { car_ids, currency } => AppCommand::Compare { car_ids, currency },
            Commands::Checkout(checkout) => checkout.into(),
            Commands::Watch { currency } => AppCommand::Watch { currency },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display current BTC rates
    Prices {
        /// Ignore cached rates younger than the freshness window
        #[arg(long)]
        refresh: bool,
        #[arg(long)]
        currency: Option<Currency>,
    },
    /// List cars with prices in the display currency
    Cars {
        /// Match against car names and tags
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long)]
        brand: Option<String>,
        /// default, price-asc, price-desc, battery-desc, battery-asc,
        /// range-desc, range-asc, top-speed-desc or top-speed-asc
        #[arg(long, default_value = "default")]
        sort: SortOrder,
        #[arg(long)]
        currency: Option<Currency>,
    },
    /// Compare two to four cars side by side
    Compare {
        #[arg(required = true, num_args = 1..)]
        car_ids: Vec<u32>,
        #[arg(long)]
        currency: Option<Currency>,
    },
    /// Buy a car with a simulated payment and write the invoice
    Checkout(CheckoutCommand),
    /// Refresh rates periodically and print each update until Ctrl-C
    Watch {
        #[arg(long)]
        currency: Option<Currency>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => basedmotors::cli::setup::setup(),
        Some(cmd) => basedmotors::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
