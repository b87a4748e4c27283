use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

/// Number of decimal places carried by every quantity and amount in the
/// REGGIS export.
pub const REGGIS_SCALE: u32 = 5;

/// Round to the REGGIS scale with round-half-up semantics, so repeated runs
/// over identical input reproduce identical output.
pub fn round_reggis(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(REGGIS_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Which side of the trade the export rows represent ("Principal V,C").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyRole {
    /// Rows exported from the seller's book ("V").
    Seller,
    /// Rows exported from the buyer's book ("C").
    Buyer,
}

impl Default for PartyRole {
    fn default() -> Self {
        PartyRole::Seller
    }
}

impl PartyRole {
    /// Single-letter REGGIS marker.
    pub fn code(&self) -> &'static str {
        match self {
            PartyRole::Seller => "V",
            PartyRole::Buyer => "C",
        }
    }
}

/// One normalized invoice line — the unit of work of the pipeline.
///
/// Quantity and price are always expressed in normalized units (kilograms)
/// and currency (COP) by the time a line exists; raw source units never
/// leak downstream. Where the source used a unit or currency the fixed
/// conversion tables do not know, the value passes through unconverted and
/// the corresponding `*_verbatim` flag is set so consumers can tell
/// normalized from verbatim values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Invoice number (document `cbc:ID`).
    pub invoice_number: String,
    /// Product name as stated on the line.
    pub product_name: String,
    /// Underlying product code, half of the material lookup key.
    pub product_code: String,
    /// Normalized unit label (`Kg`, `Un`, `Lt`) or the verbatim source code.
    pub unit: String,
    /// Quantity after normalization, 5 decimal places.
    pub quantity: Decimal,
    /// Unit price after normalization, 5 decimal places.
    pub unit_price: Decimal,
    /// Invoice issue date.
    pub issue_date: NaiveDate,
    /// Payment due date; falls back to the issue date when absent.
    pub payment_date: NaiveDate,
    /// Buyer tax ID (NIT), the client lookup key.
    pub buyer_tax_id: String,
    pub buyer_name: String,
    /// Seller tax ID (NIT) as stated on the document.
    pub seller_tax_id: String,
    pub seller_name: String,
    /// Effective legal entity for the material lookup: a brand token in the
    /// product name overrides the document seller, see
    /// [`effective_entity`](crate::core::effective_entity).
    pub effective_entity: String,
    pub role: PartyRole,
    /// Buyer municipality (exact city name).
    pub municipality: String,
    /// Stated tax rate in percent. Never inferred; 0 when absent.
    pub vat_rate: Decimal,
    /// Quantity before unit normalization, 5 decimal places.
    pub original_quantity: Decimal,
    /// Document currency code (ISO 4217).
    pub currency_code: String,
    /// quantity × price, rounded to 5 decimal places.
    pub net_total: Decimal,
    /// net × rate / 100, rounded to 5 decimal places.
    pub tax_total: Decimal,
    /// net + tax, rounded to 5 decimal places.
    pub gross_total: Decimal,
    /// The source unit code was unknown and passed through unconverted.
    pub unit_verbatim: bool,
    /// The source currency was unknown and amounts passed through unconverted.
    pub currency_verbatim: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_reggis(dec!(1.000005)), dec!(1.00001));
        assert_eq!(round_reggis(dec!(1.000004)), dec!(1.00000));
        assert_eq!(round_reggis(dec!(2.5000050)), dec!(2.50001));
    }

    #[test]
    fn role_codes() {
        assert_eq!(PartyRole::Seller.code(), "V");
        assert_eq!(PartyRole::Buyer.code(), "C");
    }
}
