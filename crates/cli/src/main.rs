//! cartsync - terminal storefront.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! cartsync products --search shoe
//!
//! # Log in and shop
//! cartsync login -e crio@example.com -p learnwithcrio
//! cartsync cart add 5 --quantity 2
//! cartsync address set "12 Baker Street"
//! cartsync checkout
//!
//! # Theme survives logout
//! cartsync theme toggle
//! cartsync logout
//! ```
//!
//! # Environment Variables
//!
//! - `CARTSYNC_API_URL` - Base URL of the store service (required)
//! - `CARTSYNC_DATA_DIR` - Where the session and preferences are kept
//! - `SENTRY_DSN` - Report warnings and errors to Sentry
//! - `RUST_LOG` - Log filter (default `cartsync_storefront=info,cartsync=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartsync_core::{ProductId, ThemeMode};
use cartsync_storefront::config::StorefrontConfig;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Shop from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Repeat the password
        #[arg(short, long)]
        confirm: String,
    },
    /// End the session (keeps preferences)
    Logout,
    /// List products
    Products {
        /// Only show products whose name or category contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Inspect or change the shipping address
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Place the order for the current cart
    Checkout,
    /// List past orders
    Orders,
    /// Show the account profile
    Profile,
    /// Permanently delete the account
    DeleteAccount {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Display theme
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and total
    Show,
    /// Add a product that is not in the cart yet
    Add {
        product_id: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 removes it)
    Set { product_id: ProductId, quantity: u32 },
}

#[derive(Subcommand)]
enum AddressAction {
    Show,
    Set { address: String },
}

#[derive(Subcommand)]
enum ThemeAction {
    Show,
    Set { mode: ThemeMode },
    Toggle,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = StorefrontConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartsync_storefront=info,cartsync=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match commands::run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}
