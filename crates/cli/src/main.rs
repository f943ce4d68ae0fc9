//! Tillbox CLI - migrations, store bootstrap and shipping quotes.
//!
//! # Usage
//!
//! ```bash
//! # Run all database migrations (schema + session table)
//! tillbox migrate
//!
//! # Create a store
//! tillbox store create --name "Harbor Goods" --slug harbor-goods --currency EUR
//!
//! # Seed a demo store with catalog and shipping setup
//! tillbox seed demo --slug demo
//!
//! # Quote shipping for a destination and cart
//! tillbox quote --store-slug demo --country US --subtotal 40 --weight-grams 800
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use tillbox_core::CurrencyCode;

mod commands;

#[derive(Parser)]
#[command(name = "tillbox")]
#[command(author, version, about = "Tillbox CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage stores
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Quote shipping for a destination
    Quote {
        /// Store slug
        #[arg(long)]
        store_slug: String,

        /// ISO 3166-1 alpha-2 country code
        #[arg(long)]
        country: String,

        /// Province or state code
        #[arg(long)]
        province: Option<String>,

        /// Cart merchandise total after discounts
        #[arg(long, default_value = "0")]
        subtotal: Decimal,

        /// Total cart weight in grams
        #[arg(long, default_value_t = 0)]
        weight_grams: i64,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Create a new store
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// URL slug (lowercase letters, digits, hyphens)
        #[arg(short, long)]
        slug: String,

        /// Currency (USD, EUR, GBP, CAD, AUD)
        #[arg(short, long, default_value = "USD")]
        currency: CurrencyCode,

        /// Contact e-mail
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Demo store with products, discounts and shipping zones
    Demo {
        /// Slug for the demo store
        #[arg(long, default_value = "demo")]
        slug: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Store { action } => match action {
            StoreAction::Create {
                name,
                slug,
                currency,
                email,
            } => {
                commands::store::create(&name, &slug, currency, email.as_deref()).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Demo { slug } => {
                commands::seed::demo(&slug).await?;
            }
        },
        Commands::Quote {
            store_slug,
            country,
            province,
            subtotal,
            weight_grams,
        } => {
            let request = commands::quote::QuoteRequest {
                store_slug,
                country,
                province,
                subtotal,
                weight_grams,
            };
            commands::quote::run(&request).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_quote() {
        let cli = Cli::try_parse_from([
            "tillbox",
            "quote",
            "--store-slug",
            "demo",
            "--country",
            "ca",
            "--subtotal",
            "42.50",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Commands::Quote {
                subtotal,
                weight_grams,
                province,
                ..
            } => {
                assert_eq!(subtotal, Decimal::new(4250, 2));
                assert_eq!(weight_grams, 0);
                assert!(province.is_none());
            }
            _ => panic!("expected quote"),
        }
    }

    #[test]
    fn test_store_create_rejects_unknown_currency() {
        let result = Cli::try_parse_from([
            "tillbox", "store", "create", "-n", "Shop", "-s", "shop", "-c", "XYZ",
        ]);
        assert!(result.is_err());
    }
}
