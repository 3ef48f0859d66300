//! Account commands.

use std::io;

use cartsync_storefront::Storefront;

use super::CommandError;
use crate::output;

pub async fn login(store: &Storefront, email: &str, password: &str) -> Result<(), CommandError> {
    let session = store.account().login(email, password).await?;
    output::session(&mut io::stdout().lock(), &session)?;
    Ok(())
}

pub async fn register(
    store: &Storefront,
    username: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), CommandError> {
    store
        .account()
        .register(username, email, password, confirm)
        .await?;
    Ok(())
}

pub fn logout(store: &Storefront) -> Result<(), CommandError> {
    store.account().logout()?;
    Ok(())
}

pub async fn orders(store: &Storefront) -> Result<(), CommandError> {
    store.account().require_session()?;
    let orders = store.account().orders().await?;
    output::orders(&mut io::stdout().lock(), &orders)?;
    Ok(())
}

pub async fn profile(store: &Storefront) -> Result<(), CommandError> {
    store.account().require_session()?;
    let profile = store.account().profile().await?;
    output::profile(&mut io::stdout().lock(), &profile)?;
    Ok(())
}

pub async fn delete(store: &Storefront, confirmed: bool) -> Result<(), CommandError> {
    if !confirmed {
        return Err(CommandError::ConfirmationRequired);
    }
    store.account().require_session()?;
    store.account().delete_account().await?;
    Ok(())
}
