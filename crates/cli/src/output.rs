//! Terminal rendering.

use std::io::{self, Write};

use tokio::sync::mpsc;

use cartsync_core::{Order, Product, ThemeMode, UserProfile};
use cartsync_storefront::cart::{CartView, EMPTY_CART_MESSAGE};
use cartsync_storefront::checkout::OrderReceipt;
use cartsync_storefront::events::{NoticeLevel, Route, UiEvent};
use cartsync_storefront::models::Session;

/// Print every event emitted so far.
pub fn events(out: &mut impl Write, rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> io::Result<()> {
    while let Ok(event) = rx.try_recv() {
        match event {
            UiEvent::Notify(notice) => {
                let marker = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Info => "--",
                    NoticeLevel::Error => "!!",
                };
                writeln!(out, "[{marker}] {}", notice.message)?;
            }
            UiEvent::Navigate(route) => {
                if let Some(hint) = hint(route) {
                    writeln!(out, "     {hint}")?;
                }
            }
        }
    }
    Ok(())
}

/// Terminal equivalent of switching screens.
const fn hint(route: Route) -> Option<&'static str> {
    match route {
        Route::Login => Some("next: cartsync login -e <email> -p <password>"),
        Route::Products => Some("next: cartsync products"),
        Route::Checkout => Some("next: cartsync checkout"),
        Route::OrderConfirmation => Some("next: cartsync orders"),
        Route::Home => None,
    }
}

pub fn products(out: &mut impl Write, products: &[Product]) -> io::Result<()> {
    if products.is_empty() {
        return writeln!(out, "No products found");
    }
    for product in products {
        writeln!(
            out,
            "{:<26} {:<32} {:<14} {:>10}  {}/5",
            product.id,
            product.name,
            product.category,
            product.cost.to_string(),
            product.rating.stars()
        )?;
    }
    Ok(())
}

pub fn cart(out: &mut impl Write, view: &CartView) -> io::Result<()> {
    if view.is_empty() {
        return writeln!(out, "{EMPTY_CART_MESSAGE}");
    }
    for line in view.lines() {
        writeln!(
            out,
            "{:<26} {:<32} {:>3} x {:>10} = {:>10}",
            line.product.id,
            line.product.name,
            line.quantity,
            line.product.cost.to_string(),
            line.line_total.to_string()
        )?;
    }
    writeln!(out, "{} items, order total {}", view.item_count(), view.total())
}

pub fn address(out: &mut impl Write, address: Option<&str>) -> io::Result<()> {
    match address {
        Some(address) => writeln!(out, "Ship to: {address}"),
        None => writeln!(out, "No address saved"),
    }
}

pub fn receipt(out: &mut impl Write, cart: &CartView, receipt: &OrderReceipt) -> io::Result<()> {
    writeln!(out, "Order {} placed", receipt.attempt_id)?;
    writeln!(out, "  items:     {}", cart.item_count())?;
    writeln!(out, "  total:     {}", receipt.total)?;
    writeln!(out, "  remaining: {}", receipt.remaining_balance)
}

pub fn orders(out: &mut impl Write, orders: &[Order]) -> io::Result<()> {
    if orders.is_empty() {
        return writeln!(out, "No orders yet");
    }
    for order in orders {
        writeln!(
            out,
            "{}  {}  {} items  {}",
            order.id,
            order.created_at.format("%Y-%m-%d %H:%M"),
            order.items.iter().map(|item| item.quantity).sum::<u32>(),
            order.total()
        )?;
    }
    Ok(())
}

pub fn profile(out: &mut impl Write, profile: &UserProfile) -> io::Result<()> {
    writeln!(out, "{} <{}>", profile.name, profile.email)?;
    writeln!(out, "wallet:  {}", profile.wallet_money)?;
    address(out, profile.address.as_deref())
}

pub fn session(out: &mut impl Write, session: &Session) -> io::Result<()> {
    writeln!(
        out,
        "Logged in as {} ({}), wallet {}",
        session.username, session.email, session.wallet_balance
    )
}

pub fn theme(out: &mut impl Write, mode: ThemeMode) -> io::Result<()> {
    writeln!(out, "Theme: {mode}")
}
