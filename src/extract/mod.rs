//! Invoice extraction: one UBL 2.1 document in, normalized lines out.
//!
//! DIAN distributes invoices either as bare `Invoice` documents or wrapped
//! in an `AttachedDocument` envelope whose `cac:ExternalReference/
//! cbc:Description` carries the real invoice as CDATA. Extraction unwraps
//! one envelope level, parses the invoice, and applies unit and currency
//! normalization so the resulting [`InvoiceLine`]s carry canonical values
//! only. Credit and debit notes are skipped, not errors.

mod ubl;

use crate::core::{ExchangeRates, InvoiceLine, PartyRole, ReggisError};

/// Root document kind, by local name of the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    CreditNote,
    DebitNote,
    AttachedDocument,
    Other(String),
}

impl DocumentKind {
    fn from_local_name(name: &str) -> Self {
        match name {
            "Invoice" => DocumentKind::Invoice,
            "CreditNote" => DocumentKind::CreditNote,
            "DebitNote" => DocumentKind::DebitNote,
            "AttachedDocument" => DocumentKind::AttachedDocument,
            other => DocumentKind::Other(other.to_string()),
        }
    }
}

/// Per-run extraction settings.
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    /// Fallback conversion rates when a document states no exchange rate.
    pub rates: ExchangeRates,
    /// Which side of the trade the export represents.
    pub role: PartyRole,
}

/// Result of extracting one document.
#[derive(Debug)]
pub enum ExtractOutcome {
    /// An invoice: its normalized lines, plus the count of lines dropped
    /// for non-positive quantity or price.
    Lines {
        lines: Vec<InvoiceLine>,
        dropped: usize,
    },
    /// Not an invoice (credit note, debit note, ...). Tallied, not an error.
    Skipped(DocumentKind),
}

/// Extract one document into normalized REGGIS lines.
///
/// `origin` is the document's provenance label (file name, or
/// `archive.zip/inner.xml`) used in errors and logs.
pub fn extract_document(
    xml: &str,
    origin: &str,
    config: &ExtractConfig,
) -> Result<ExtractOutcome, ReggisError> {
    let kind = ubl::root_kind(xml, origin)?;

    let inner;
    let (invoice_xml, kind) = match kind {
        DocumentKind::AttachedDocument => {
            inner = ubl::unwrap_attached(xml, origin)?;
            let inner_kind = ubl::root_kind(&inner, origin)?;
            (inner.as_str(), inner_kind)
        }
        other => (xml, other),
    };

    match kind {
        DocumentKind::Invoice => {
            let (lines, dropped) = ubl::parse_invoice(invoice_xml, origin, config)?;
            Ok(ExtractOutcome::Lines { lines, dropped })
        }
        other => {
            tracing::debug!(origin, kind = ?other, "skipping non-invoice document");
            Ok(ExtractOutcome::Skipped(other))
        }
    }
}
