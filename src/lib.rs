//! Checkout navigation interception and discovery category filters for a
//! crowdfunding client.
//!
//! Both components are synchronous state machines driven by the host's
//! event loop. The only asynchronous piece is the racing checkout poll,
//! which reports back through a [`checkout::CheckoutEvent`] channel.

pub mod analytics;
pub mod checkout;
pub mod config;
pub mod discovery;
pub mod replay;
pub mod util;
