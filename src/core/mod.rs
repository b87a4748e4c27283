//! Core line types, errors, and normalization tables.
//!
//! This module provides the foundational types for the REGGIS pipeline:
//! the normalized invoice line, the error taxonomy, and the fixed
//! unit/currency/legal-entity conversion tables.

pub mod currencies;
mod entity;
mod error;
mod types;
pub mod units;

pub use currencies::{CurrencyNorm, ExchangeRates, LOCAL_CURRENCY};
pub use entity::*;
pub use error::*;
pub use types::*;
