//! Catalog, cart and checkout commands.

use std::io;

use cartsync_storefront::Storefront;

use super::CommandError;
use crate::output;
use crate::{AddressAction, CartAction};

pub async fn products(store: &Storefront, search: Option<&str>) -> Result<(), CommandError> {
    store.search().load().await?;
    let products = store.search().submit(search.unwrap_or_default());
    output::products(&mut io::stdout().lock(), &products)?;
    Ok(())
}

pub async fn cart(store: &Storefront, action: CartAction) -> Result<(), CommandError> {
    store.account().require_session()?;
    store.bootstrap().await?;

    match action {
        CartAction::Show => {}
        CartAction::Add {
            product_id,
            quantity,
        } => store.cart().add(&product_id, quantity).await?,
        CartAction::Set {
            product_id,
            quantity,
        } => store.cart().set_quantity(&product_id, quantity).await?,
    }

    output::cart(&mut io::stdout().lock(), &store.cart().view())?;
    Ok(())
}

pub async fn address(store: &Storefront, action: AddressAction) -> Result<(), CommandError> {
    store.account().require_session()?;

    let address = match action {
        AddressAction::Show => store.checkout().load_address().await?,
        AddressAction::Set { address } => store.checkout().save_address(&address).await?,
    };
    output::address(&mut io::stdout().lock(), address.as_deref())?;
    Ok(())
}

pub async fn checkout(store: &Storefront) -> Result<(), CommandError> {
    store.account().require_session()?;
    store.bootstrap().await?;
    store.checkout().load_address().await?;

    let cart = store.cart().view();
    let receipt = store.checkout().submit().await?;
    output::receipt(&mut io::stdout().lock(), &cart, &receipt)?;
    Ok(())
}
