//! Tillbox Core - Domain types and storefront business rules.
//!
//! This crate is shared by every Tillbox component:
//! - `storefront` - Shopper-facing catalog, cart and shipping API
//! - `admin` - Store-owner management API
//! - `cli` - Migrations, bootstrap and offline tooling
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Pricing and shipping decisions live here so that both
//! services (and the CLI) compute identical numbers.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, slugs, addresses and statuses
//! - [`validation`] - Input checks shared by the write paths
//! - [`pricing`] - Discount stacking
//! - [`shipping`] - Zone matching and rate calculation
//! - [`cart`] - Cart line arithmetic and totals
//! - [`catalog`] - Catalog entities and helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod pricing;
pub mod shipping;
pub mod types;
pub mod validation;

pub use types::*;
