//! Legal-entity (SOCIEDAD) canonicalization.
//!
//! Materials are registered per legal entity, identified by a canonical tax
//! ID from a small closed set. Reference imports carry free-text aliases
//! ("Parmalat", "Proleche") that must be canonicalized before storage, and
//! invoice lines carry brand tokens in the product name that override the
//! document's seller when resolving the material lookup key.

/// Tax ID of LACTALIS COLOMBIA S.A.S.
pub const LACTALIS_NIT: &str = "800245795";

/// Tax ID of PROCESADORA DE LECHES S.A. (Proleche).
pub const PROLECHE_NIT: &str = "890903711";

/// Import-time aliases → canonical tax ID, matched on the whole trimmed
/// lowercased field.
static ENTITY_ALIASES: &[(&str, &str)] = &[
    ("parmalat", LACTALIS_NIT),
    ("lactalis", LACTALIS_NIT),
    ("proleche", PROLECHE_NIT),
    ("procesadora de leches", PROLECHE_NIT),
];

/// Brand tokens → canonical tax ID, matched as a case-insensitive substring
/// of the product name. Evaluated in order; the first match wins, so the
/// rule set stays unambiguous even if two tokens could both match.
static BRAND_TOKENS: &[(&str, &str)] = &[
    ("PARMALAT", LACTALIS_NIT),
    ("LACTALIS", LACTALIS_NIT),
    ("PROLECHE", PROLECHE_NIT),
    ("PROCESADORA DE LECHES", PROLECHE_NIT),
];

/// Canonicalize a SOCIEDAD field from a reference import.
///
/// Returns the canonical tax ID for known aliases, `None` otherwise.
pub fn canonical_entity(alias: &str) -> Option<&'static str> {
    let needle = alias.trim().to_lowercase();
    ENTITY_ALIASES
        .iter()
        .find(|(a, _)| *a == needle)
        .map(|(_, nit)| *nit)
}

/// Effective legal entity for one invoice line.
///
/// A known brand token in the product name maps to a fixed entity tax ID,
/// overriding the document's seller; otherwise the seller tax ID is used.
pub fn effective_entity(product_name: &str, seller_tax_id: &str) -> String {
    let upper = product_name.to_uppercase();
    for (token, nit) in BRAND_TOKENS {
        if upper.contains(token) {
            return (*nit).to_string();
        }
    }
    seller_tax_id.to_string()
}
