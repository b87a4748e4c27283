//! Streaming UBL 2.1 reader for DIAN invoices.
//!
//! The reader walks the event stream with an element path stack and fills a
//! flat accumulator; values are resolved into [`InvoiceLine`]s only once the
//! whole document has been read. Element names are matched by local name so
//! documents with unusual namespace prefixes still parse.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{DocumentKind, ExtractConfig};
use crate::core::{
    InvoiceLine, ReggisError, currencies, effective_entity, round_reggis, units,
};

const UBL_CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

/// Element name without its namespace prefix.
fn local(name: &[u8]) -> String {
    let s = std::str::from_utf8(name).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s).to_string()
}

fn malformed(origin: &str, message: impl Into<String>) -> ReggisError {
    ReggisError::MalformedDocument {
        origin: origin.to_string(),
        message: message.into(),
    }
}

/// Kind of the root element, by local name.
pub(super) fn root_kind(xml: &str, origin: &str) -> Result<DocumentKind, ReggisError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                return Ok(DocumentKind::from_local_name(&local(e.name().as_ref())));
            }
            Ok(Event::Eof) => return Err(malformed(origin, "no root element")),
            Err(e) => return Err(malformed(origin, format!("XML parse error: {e}"))),
            _ => {}
        }
    }
}

/// Pull the embedded invoice out of an `AttachedDocument` envelope.
///
/// DIAN puts the signed invoice XML as CDATA under
/// `cac:Attachment/cac:ExternalReference/cbc:Description`.
pub(super) fn unwrap_attached(xml: &str, origin: &str) -> Result<String, ReggisError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => path.push(local(e.name().as_ref())),
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::CData(ref e)) => {
                let in_reference = path.iter().any(|p| p == "ExternalReference");
                if in_reference && path.last().is_some_and(|p| p == "Description") {
                    let text = String::from_utf8_lossy(e).trim().to_string();
                    if text.starts_with('<') {
                        return Ok(text);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let in_reference = path.iter().any(|p| p == "ExternalReference");
                if in_reference && path.last().is_some_and(|p| p == "Description") {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if text.starts_with('<') {
                        return Ok(text);
                    }
                }
            }
            Ok(Event::Eof) => {
                return Err(malformed(origin, "attached document carries no embedded invoice"));
            }
            Err(e) => return Err(malformed(origin, format!("XML parse error: {e}"))),
            _ => {}
        }
    }
}

/// Parse one UBL `Invoice` into normalized lines.
///
/// Returns the lines plus the count of source lines dropped for
/// non-positive quantity or price.
pub(super) fn parse_invoice(
    xml: &str,
    origin: &str,
    config: &ExtractConfig,
) -> Result<(Vec<InvoiceLine>, usize), ReggisError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = ParsedDocument::default();
    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local(e.name().as_ref());

                if !saw_root {
                    saw_root = true;
                    let declares_ubl = e.attributes().flatten().any(|a| {
                        a.key.as_ref().starts_with(b"xmlns")
                            && std::str::from_utf8(&a.value).is_ok_and(|v| v == UBL_CBC_NS)
                    });
                    if !declares_ubl {
                        return Err(malformed(origin, "missing UBL 2.1 namespace declaration"));
                    }
                }

                if name == "InvoiceLine" {
                    doc.current_line = Some(ParsedLine::default());
                }
                if name == "InvoicedQuantity" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"unitCode" {
                            if let Some(line) = doc.current_line.as_mut() {
                                line.unit_code =
                                    Some(String::from_utf8_lossy(&attr.value).to_string());
                            }
                        }
                    }
                }

                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    doc.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == "InvoiceLine" {
                    if let Some(line) = doc.current_line.take() {
                        doc.lines.push(line);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(origin, format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    if !saw_root {
        return Err(malformed(origin, "no root element"));
    }

    doc.into_lines(origin, config)
}

/// Flat accumulator filled while walking the event stream.
#[derive(Default)]
struct ParsedDocument {
    number: Option<String>,
    issue_date: Option<String>,
    due_date: Option<String>,
    currency: Option<String>,
    exchange_rate: Option<String>,

    seller_tax_id: Option<String>,
    seller_alt_id: Option<String>,
    seller_name: Option<String>,
    buyer_tax_id: Option<String>,
    buyer_alt_id: Option<String>,
    buyer_name: Option<String>,
    buyer_city: Option<String>,

    lines: Vec<ParsedLine>,
    current_line: Option<ParsedLine>,
}

#[derive(Default, Clone)]
struct ParsedLine {
    description: Option<String>,
    item_name: Option<String>,
    seller_item_id: Option<String>,
    standard_item_id: Option<String>,
    quantity: Option<String>,
    unit_code: Option<String>,
    price: Option<String>,
    tax_percent: Option<String>,
}

impl ParsedDocument {
    fn handle_text(&mut self, path: &[String], text: &str) {
        let leaf = path.last().map(|s| s.as_str()).unwrap_or("");
        let in_ctx = |name: &str| path.iter().any(|p| p == name);

        if in_ctx("InvoiceLine") {
            let Some(line) = self.current_line.as_mut() else {
                return;
            };
            match leaf {
                "Description" if in_ctx("Item") && line.description.is_none() => {
                    line.description = Some(text.to_string());
                }
                "Name" if in_ctx("Item") && line.item_name.is_none() => {
                    line.item_name = Some(text.to_string());
                }
                "ID" if in_ctx("SellersItemIdentification") => {
                    line.seller_item_id = Some(text.to_string());
                }
                "ID" if in_ctx("StandardItemIdentification") => {
                    line.standard_item_id = Some(text.to_string());
                }
                "InvoicedQuantity" => line.quantity = Some(text.to_string()),
                "PriceAmount" if in_ctx("Price") => line.price = Some(text.to_string()),
                "Percent" if in_ctx("TaxSubtotal") && line.tax_percent.is_none() => {
                    line.tax_percent = Some(text.to_string());
                }
                _ => {}
            }
            return;
        }

        let in_seller = in_ctx("AccountingSupplierParty");
        let in_buyer = in_ctx("AccountingCustomerParty");

        match leaf {
            "ID" if path.len() == 2 && self.number.is_none() => {
                self.number = Some(text.to_string());
            }
            "IssueDate" if path.len() == 2 && self.issue_date.is_none() => {
                self.issue_date = Some(text.to_string());
            }
            "DueDate" | "PaymentDueDate" if self.due_date.is_none() => {
                self.due_date = Some(text.to_string());
            }
            "DocumentCurrencyCode" if self.currency.is_none() => {
                self.currency = Some(text.to_string());
            }
            "CalculationRate" if in_ctx("PaymentExchangeRate") => {
                self.exchange_rate = Some(text.to_string());
            }
            "CompanyID" if in_seller && self.seller_tax_id.is_none() => {
                self.seller_tax_id = Some(text.to_string());
            }
            "CompanyID" if in_buyer && self.buyer_tax_id.is_none() => {
                self.buyer_tax_id = Some(text.to_string());
            }
            "ID" if in_seller && in_ctx("PartyIdentification") && self.seller_alt_id.is_none() => {
                self.seller_alt_id = Some(text.to_string());
            }
            "ID" if in_buyer && in_ctx("PartyIdentification") && self.buyer_alt_id.is_none() => {
                self.buyer_alt_id = Some(text.to_string());
            }
            "RegistrationName" if in_seller && self.seller_name.is_none() => {
                self.seller_name = Some(text.to_string());
            }
            "RegistrationName" if in_buyer && self.buyer_name.is_none() => {
                self.buyer_name = Some(text.to_string());
            }
            "CityName" if in_buyer && self.buyer_city.is_none() => {
                self.buyer_city = Some(text.to_string());
            }
            _ => {}
        }
    }

    fn into_lines(
        self,
        origin: &str,
        config: &ExtractConfig,
    ) -> Result<(Vec<InvoiceLine>, usize), ReggisError> {
        let number = match self.number {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => return Err(malformed(origin, "missing invoice number")),
        };
        let issue_date = self
            .issue_date
            .as_deref()
            .and_then(parse_date)
            .ok_or_else(|| malformed(origin, "missing or unparseable issue date"))?;
        let payment_date = self
            .due_date
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(issue_date);

        let currency = self.currency.unwrap_or_default().trim().to_uppercase();
        let document_rate = self.exchange_rate.as_deref().and_then(parse_decimal);
        let cur = currencies::conversion(&currency, document_rate, &config.rates);

        let seller_tax_id = self
            .seller_tax_id
            .or(self.seller_alt_id)
            .unwrap_or_default()
            .trim()
            .to_string();
        let buyer_tax_id = self
            .buyer_tax_id
            .or(self.buyer_alt_id)
            .unwrap_or_default()
            .trim()
            .to_string();
        let seller_name = self.seller_name.unwrap_or_default();
        let buyer_name = self.buyer_name.unwrap_or_default();
        let municipality = self.buyer_city.unwrap_or_default();

        let mut lines = Vec::with_capacity(self.lines.len());
        let mut dropped = 0usize;

        for parsed in self.lines {
            let quantity = parsed.quantity.as_deref().and_then(parse_decimal);
            let price = parsed.price.as_deref().and_then(parse_decimal);
            let (Some(quantity), Some(price)) = (quantity, price) else {
                dropped += 1;
                continue;
            };
            if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
                tracing::debug!(origin, invoice = %number, "dropping non-positive line");
                dropped += 1;
                continue;
            }

            let product_name = parsed
                .description
                .or(parsed.item_name)
                .unwrap_or_default()
                .trim()
                .to_string();
            let product_code = parsed
                .seller_item_id
                .or(parsed.standard_item_id)
                .unwrap_or_default()
                .trim()
                .to_string();
            let unit_code = parsed.unit_code.unwrap_or_default();
            let vat_rate = parsed
                .tax_percent
                .as_deref()
                .and_then(parse_decimal)
                .unwrap_or(dec!(0));

            let norm = units::normalize(quantity, &unit_code, &product_name);
            let entity = effective_entity(&product_name, &seller_tax_id);
            let unit_price = price / norm.price_factor * cur.rate;

            let net = norm.quantity * unit_price;
            let tax = net * vat_rate / dec!(100);

            lines.push(InvoiceLine {
                invoice_number: number.clone(),
                product_name,
                product_code,
                unit: norm.unit_label.clone(),
                quantity: round_reggis(norm.quantity),
                unit_price: round_reggis(unit_price),
                issue_date,
                payment_date,
                buyer_tax_id: buyer_tax_id.clone(),
                buyer_name: buyer_name.clone(),
                seller_tax_id: seller_tax_id.clone(),
                seller_name: seller_name.clone(),
                effective_entity: entity,
                role: config.role,
                municipality: municipality.clone(),
                vat_rate,
                original_quantity: round_reggis(quantity),
                currency_code: if currency.is_empty() {
                    currencies::LOCAL_CURRENCY.to_string()
                } else {
                    currency.clone()
                },
                net_total: round_reggis(net),
                tax_total: round_reggis(tax),
                gross_total: round_reggis(net + tax),
                unit_verbatim: norm.verbatim,
                currency_verbatim: cur.verbatim,
            });
        }

        Ok((lines, dropped))
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Parse a decimal that may use a comma as decimal separator.
fn parse_decimal(text: &str) -> Option<Decimal> {
    let t = text.trim();
    t.parse::<Decimal>()
        .or_else(|_| t.replace(',', ".").parse::<Decimal>())
        .ok()
}
