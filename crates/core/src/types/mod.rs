//! Core types for Tillbox.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use address::{CountryCode, CountryCodeError, ShippingAddress};
pub use id::*;
pub use money::{CurrencyCode, Money, round_money};
pub use slug::{Slug, SlugError};
pub use status::*;
