//! Command execution.
//!
//! Every invocation opens the storefront from configuration, runs one
//! command, then prints whatever notices and navigation hints the
//! components emitted along the way.

mod account;
mod shop;

use std::io;

use thiserror::Error;

use cartsync_storefront::config::StorefrontConfig;
use cartsync_storefront::events::EventSink;
use cartsync_storefront::services::persist::PersistError;
use cartsync_storefront::{StoreError, Storefront};

use crate::output;
use crate::{Commands, ThemeAction};

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Could not save preferences: {0}")]
    Preferences(#[from] PersistError),

    #[error("Could not write output: {0}")]
    Output(#[from] io::Error),

    #[error("Refusing to delete the account without --yes")]
    ConfirmationRequired,
}

/// Run one command against the configured service.
///
/// # Errors
///
/// Returns the command's failure after its notices have been printed.
pub async fn run(command: Commands, config: &StorefrontConfig) -> Result<(), CommandError> {
    let (events, mut rx) = EventSink::channel();
    let store = Storefront::from_config(config, events)?;

    let result = execute(command, &store).await;
    store.detach();

    output::events(&mut io::stdout().lock(), &mut rx)?;
    result
}

async fn execute(command: Commands, store: &Storefront) -> Result<(), CommandError> {
    match command {
        Commands::Login { email, password } => account::login(store, &email, &password).await,
        Commands::Register {
            username,
            email,
            password,
            confirm,
        } => account::register(store, &username, &email, &password, &confirm).await,
        Commands::Logout => account::logout(store),
        Commands::Products { search } => shop::products(store, search.as_deref()).await,
        Commands::Cart { action } => shop::cart(store, action).await,
        Commands::Address { action } => shop::address(store, action).await,
        Commands::Checkout => shop::checkout(store).await,
        Commands::Orders => account::orders(store).await,
        Commands::Profile => account::profile(store).await,
        Commands::DeleteAccount { yes } => account::delete(store, yes).await,
        Commands::Theme { action } => theme(store, &action),
    }
}

fn theme(store: &Storefront, action: &ThemeAction) -> Result<(), CommandError> {
    let preferences = store.preferences();
    let mode = match action {
        ThemeAction::Show => preferences.theme(),
        ThemeAction::Set { mode } => {
            preferences.set_theme(*mode)?;
            *mode
        }
        ThemeAction::Toggle => preferences.toggle_theme()?,
    };
    output::theme(&mut io::stdout().lock(), mode)?;
    Ok(())
}
