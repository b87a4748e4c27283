//! REGGIS tabular export.
//!
//! Fixed 24-column layout, semicolon separated, CRLF line endings, comma
//! decimal separator with 5 decimal places. Text fields are quoted; numbers
//! and dates are not. The column set and order never vary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use rust_decimal::Decimal;

use crate::core::{InvoiceLine, ReggisError, currencies::reggis_currency_digit};

/// The 24 REGGIS column headers, in output order.
pub const REGGIS_HEADERS: [&str; 24] = [
    "N° Factura",
    "Nombre Producto",
    "Codigo Subyacente",
    "Unidad Medida en Kg,Un,Lt",
    "Cantidad (5 decimales - separdor coma)",
    "Precio Unitario (5 decimales - separdor coma)",
    "Fecha Factura Año-Mes-Dia",
    "Fecha Pago Año-Mes-Dia",
    "Nit Comprador (Existente)",
    "Nombre Comprador",
    "Nit Vendedor (Existente)",
    "Nombre Vendedor",
    "Principal V,C",
    "Municipio (Nombre Exacto de la Ciudad)",
    "Iva (N°%)",
    "Descripción",
    "Activa Factura",
    "Activa Bodega",
    "Incentivo",
    "Cantidad Original (5 decimales - separdor coma)",
    "Moneda (1,2,3)",
    "Total Sin IVA",
    "Total IVA",
    "Total Con IVA",
];

/// Render the full export content, header row included.
///
/// Rendering is pure: the same lines in the same order always produce
/// byte-identical output.
pub fn render(lines: &[InvoiceLine]) -> String {
    let mut out = String::new();
    out.push_str(&REGGIS_HEADERS.join(";"));
    out.push_str("\r\n");

    for line in lines {
        csv_field_str(&mut out, &line.invoice_number);
        out.push(';');
        csv_field_str(&mut out, &line.product_name);
        out.push(';');
        csv_field_str(&mut out, &line.product_code);
        out.push(';');
        csv_field_str(&mut out, &line.unit);
        out.push(';');
        csv_field_decimal(&mut out, line.quantity);
        out.push(';');
        csv_field_decimal(&mut out, line.unit_price);
        out.push(';');
        out.push_str(&line.issue_date.format("%Y-%m-%d").to_string());
        out.push(';');
        out.push_str(&line.payment_date.format("%Y-%m-%d").to_string());
        out.push(';');
        csv_field_str(&mut out, &line.buyer_tax_id);
        out.push(';');
        csv_field_str(&mut out, &line.buyer_name);
        out.push(';');
        csv_field_str(&mut out, &line.seller_tax_id);
        out.push(';');
        csv_field_str(&mut out, &line.seller_name);
        out.push(';');
        out.push_str(line.role.code());
        out.push(';');
        csv_field_str(&mut out, &line.municipality);
        out.push(';');
        // Whole percent only
        out.push_str(&line.vat_rate.trunc().to_string());
        out.push(';');
        // Descripción repeats the product name
        csv_field_str(&mut out, &line.product_name);
        out.push(';');
        out.push('1');
        out.push(';');
        out.push('1');
        out.push(';');
        // Incentivo is always empty
        out.push(';');
        csv_field_decimal(&mut out, line.original_quantity);
        out.push(';');
        out.push_str(reggis_currency_digit(&line.currency_code));
        out.push(';');
        csv_field_decimal(&mut out, line.net_total);
        out.push(';');
        csv_field_decimal(&mut out, line.tax_total);
        out.push(';');
        csv_field_decimal(&mut out, line.gross_total);
        out.push_str("\r\n");
    }
    out
}

/// Write the export as `REGGIS_<timestamp>.csv` under `dir`.
///
/// The file is created exclusively; an existing file of the same name is an
/// error rather than something to overwrite.
pub fn write_reggis(lines: &[InvoiceLine], dir: &Path) -> Result<PathBuf, ReggisError> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    write_reggis_stamped(lines, dir, &stamp)
}

/// Like [`write_reggis`] but with a caller-chosen timestamp label.
pub fn write_reggis_stamped(
    lines: &[InvoiceLine],
    dir: &Path,
    stamp: &str,
) -> Result<PathBuf, ReggisError> {
    let path = dir.join(format!("REGGIS_{stamp}.csv"));
    let unwritable = |source| ReggisError::OutputUnwritable {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(|source| ReggisError::OutputUnwritable {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut file = fs::File::create_new(&path).map_err(unwritable)?;
    file.write_all(render(lines).as_bytes()).map_err(unwritable)?;
    file.flush().map_err(unwritable)?;

    tracing::info!(path = %path.display(), rows = lines.len(), "export written");
    Ok(path)
}

fn csv_field_str(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

fn csv_field_decimal(out: &mut String, d: Decimal) {
    let s = format!("{:.5}", d);
    out.push_str(&s.replace('.', ","));
}
