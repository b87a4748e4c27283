//! Unit-of-measure normalization to kilograms.
//!
//! A fixed table of multiplicative factors converts source quantities to
//! the canonical unit (kilograms); the inverse factor is applied to the
//! unit price so line totals are invariant under conversion. Unit codes the
//! table does not know pass through unconverted and are flagged, never
//! rejected.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Unit codes → kilograms, multiplicative.
static KG_FACTORS: &[(&str, Decimal)] = &[
    ("KG", dec!(1)),
    ("KGM", dec!(1)),
    ("LBR", dec!(0.5)),
    ("GRM", dec!(0.001)),
    ("TNE", dec!(1000)),
];

/// Unit codes → REGGIS display label for units that are not mass and are
/// kept as-is (litres, pieces).
static UNIT_LABELS: &[(&str, &str)] = &[
    ("LTR", "Lt"),
    ("LT", "Lt"),
    ("NIU", "Un"),
    ("EA", "Un"),
    ("EV", "Un"),
    ("JR", "Un"),
    ("UN", "Un"),
];

/// Outcome of normalizing one quantity/unit pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Quantity in the target unit, unrounded.
    pub quantity: Decimal,
    /// Divide the source unit price by this to keep quantity × price stable.
    pub price_factor: Decimal,
    /// REGGIS unit label, or the verbatim source code when unknown.
    pub unit_label: String,
    /// The source code was not in any table; values are verbatim.
    pub verbatim: bool,
}

/// Normalize a quantity to kilograms where the fixed tables allow it.
///
/// Pack-size conversion takes priority: when the product description embeds
/// a gram weight ("500 GRAMOS", "380 GRS"), the quantity is a piece count
/// and converts as pieces × grams ÷ 1000.
pub fn normalize(quantity: Decimal, unit_code: &str, description: &str) -> Normalized {
    let code = unit_code.trim().to_uppercase();

    if let Some(grams) = pack_grams(description).filter(|g| !g.is_zero()) {
        let factor = grams / dec!(1000);
        return Normalized {
            quantity: quantity * factor,
            price_factor: factor,
            unit_label: "Kg".into(),
            verbatim: false,
        };
    }

    if let Some((_, factor)) = KG_FACTORS.iter().find(|(c, _)| *c == code) {
        return Normalized {
            quantity: quantity * factor,
            price_factor: *factor,
            unit_label: "Kg".into(),
            verbatim: false,
        };
    }

    if let Some((_, label)) = UNIT_LABELS.iter().find(|(c, _)| *c == code) {
        return Normalized {
            quantity,
            price_factor: dec!(1),
            unit_label: (*label).to_string(),
            verbatim: false,
        };
    }

    Normalized {
        quantity,
        price_factor: dec!(1),
        unit_label: unit_code.trim().to_string(),
        verbatim: true,
    }
}

/// Extract an embedded pack weight in grams from a product description.
///
/// Recognizes "<n> GRAMOS", "<n> GRAMO" and "<n> GRS", case-insensitive.
pub fn pack_grams(description: &str) -> Option<Decimal> {
    let upper = description.to_uppercase();
    for marker in ["GRAMOS", "GRAMO", "GRS"] {
        if let Some(pos) = upper.find(marker) {
            let head = upper[..pos].trim_end();
            let Some(start) = head
                .char_indices()
                .rev()
                .take_while(|(_, c)| c.is_ascii_digit())
                .last()
                .map(|(i, _)| i)
            else {
                continue;
            };
            return head[start..].parse::<Decimal>().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tonne_is_exactly_thousand_kilograms() {
        let n = normalize(dec!(1), "TNE", "CARBONATO DE CALCIO");
        assert_eq!(n.quantity, dec!(1000));
        assert_eq!(n.unit_label, "Kg");
        assert!(!n.verbatim);
    }

    #[test]
    fn pounds_halve() {
        let n = normalize(dec!(10), "LBR", "AZUCAR");
        assert_eq!(n.quantity, dec!(5.0));
        assert_eq!(n.price_factor, dec!(0.5));
    }

    #[test]
    fn price_factor_keeps_totals_stable() {
        let n = normalize(dec!(2), "TNE", "MAIZ");
        let price = dec!(1500000);
        // 2 TNE × 1 500 000/TNE == 2000 kg × 1500/kg
        assert_eq!(n.quantity * (price / n.price_factor), dec!(2) * price);
    }

    #[test]
    fn pack_weight_in_description_wins() {
        let n = normalize(dec!(12), "UN", "QUESO PARMALAT 500 GRAMOS");
        assert_eq!(n.quantity, dec!(6.000));
        assert_eq!(n.unit_label, "Kg");
    }

    #[test]
    fn grs_marker_recognized() {
        assert_eq!(pack_grams("MANTEQUILLA 380 GRS"), Some(dec!(380)));
        assert_eq!(pack_grams("mantequilla 380grs"), Some(dec!(380)));
        assert_eq!(pack_grams("SIN PESO"), None);
        assert_eq!(pack_grams("GRAMOS SIN NUMERO"), None);
    }

    #[test]
    fn litres_and_pieces_keep_quantity() {
        let n = normalize(dec!(3), "LTR", "LECHE UHT");
        assert_eq!(n.quantity, dec!(3));
        assert_eq!(n.unit_label, "Lt");
        assert!(!n.verbatim);

        let n = normalize(dec!(7), "EA", "VASO PLASTICO");
        assert_eq!(n.unit_label, "Un");
    }

    #[test]
    fn unknown_codes_pass_through_flagged() {
        let n = normalize(dec!(4), "BX", "CAJA SURTIDA");
        assert_eq!(n.quantity, dec!(4));
        assert_eq!(n.unit_label, "BX");
        assert!(n.verbatim);
    }
}
