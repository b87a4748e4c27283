//! Currency normalization to Colombian pesos.
//!
//! Foreign amounts convert to COP using the document's stated exchange rate
//! when present, else a configured table rate. Currency codes outside the
//! fixed table pass through unconverted and are flagged.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The canonical currency of the export.
pub const LOCAL_CURRENCY: &str = "COP";

/// REGGIS currency column digit ("Moneda (1,2,3)").
pub fn reggis_currency_digit(currency: &str) -> &'static str {
    match currency.trim().to_uppercase().as_str() {
        "USD" => "2",
        "EUR" => "3",
        _ => "1",
    }
}

/// Configured conversion rates to COP, used when the document does not
/// state its own exchange rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub usd_to_cop: Decimal,
    pub eur_to_cop: Decimal,
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self {
            usd_to_cop: dec!(4000),
            eur_to_cop: dec!(4400),
        }
    }
}

/// Outcome of resolving the conversion for one document currency.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyNorm {
    /// Multiply source amounts by this to obtain COP.
    pub rate: Decimal,
    /// The currency was unknown and amounts pass through unconverted.
    pub verbatim: bool,
}

/// Resolve the COP conversion rate for a document currency.
///
/// `document_rate` is the invoice's own stated rate (TRM) and takes
/// precedence over the configured table for any foreign currency.
pub fn conversion(
    currency: &str,
    document_rate: Option<Decimal>,
    rates: &ExchangeRates,
) -> CurrencyNorm {
    let code = currency.trim().to_uppercase();
    match code.as_str() {
        "COP" | "" => CurrencyNorm {
            rate: dec!(1),
            verbatim: false,
        },
        "USD" => CurrencyNorm {
            rate: document_rate.unwrap_or(rates.usd_to_cop),
            verbatim: false,
        },
        "EUR" => CurrencyNorm {
            rate: document_rate.unwrap_or(rates.eur_to_cop),
            verbatim: false,
        },
        _ => CurrencyNorm {
            rate: dec!(1),
            verbatim: true,
        },
    }
}
