//! CSV readers for reference-data imports.
//!
//! Headers must match the registered layouts exactly (after trimming); a
//! file with any other header row is rejected wholesale so a mis-picked
//! export cannot silently pollute the store.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::core::ReggisError;

pub(super) const MATERIAL_HEADERS: [&str; 3] = ["CODIGO", "DESCRIPCION", "SOCIEDAD"];
pub(super) const CLIENT_HEADERS: [&str; 3] = ["Cód.Padre", "Nombre Código Padre", "NIT"];

/// One raw materials row. `line` is the 1-based line in the source file,
/// carried through so rejections can name their origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRow {
    pub line: u64,
    pub code: String,
    pub description: String,
    pub entity: String,
}

/// One raw clients row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRow {
    pub line: u64,
    pub parent_code: String,
    pub name: String,
    pub tax_id: String,
}

/// Read a materials CSV (`CODIGO,DESCRIPCION,SOCIEDAD`).
///
/// Fully blank rows are dropped here; all other row-level problems are
/// left for the store to judge.
pub fn read_materials_csv(path: &Path) -> Result<Vec<MaterialRow>, ReggisError> {
    let file = open(path)?;
    let mut reader = csv_reader(file);
    check_headers(&mut reader, &MATERIAL_HEADERS, path)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(path, &e))?;
        let code = field(&record, 0);
        let description = field(&record, 1);
        let entity = field(&record, 2);
        if code.is_empty() && description.is_empty() && entity.is_empty() {
            continue;
        }
        rows.push(MaterialRow {
            line: i as u64 + 2,
            code,
            description,
            entity,
        });
    }
    Ok(rows)
}

/// Read a clients CSV (`Cód.Padre,Nombre Código Padre,NIT`).
pub fn read_clients_csv(path: &Path) -> Result<Vec<ClientRow>, ReggisError> {
    let file = open(path)?;
    let mut reader = csv_reader(file);
    check_headers(&mut reader, &CLIENT_HEADERS, path)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(path, &e))?;
        let parent_code = field(&record, 0);
        let name = field(&record, 1);
        let tax_id = field(&record, 2);
        if parent_code.is_empty() && name.is_empty() && tax_id.is_empty() {
            continue;
        }
        rows.push(ClientRow {
            line: i as u64 + 2,
            parent_code,
            name,
            tax_id,
        });
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<File, ReggisError> {
    File::open(path).map_err(|source| ReggisError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().flexible(true).from_reader(input)
}

fn check_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    expected: &[&str],
    path: &Path,
) -> Result<(), ReggisError> {
    let headers = reader.headers().map_err(|e| invalid(path, &e))?;
    let got: Vec<&str> = headers.iter().map(str::trim).collect();
    if got != expected {
        return Err(ReggisError::FormatInvalid(format!(
            "{}: expected header {:?}, found {:?}",
            path.display(),
            expected,
            got
        )));
    }
    Ok(())
}

fn field(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

fn invalid(path: &Path, err: &dyn std::fmt::Display) -> ReggisError {
    ReggisError::FormatInvalid(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_material_rows_and_skips_blanks() {
        let f = write_file("CODIGO,DESCRIPCION,SOCIEDAD\n1001,LECHE ENTERA,Parmalat\n,,\n1002,QUESO,890903711\n");
        let rows = read_materials_csv(f.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code, "1001");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn header_must_match_exactly() {
        let f = write_file("Codigo,Descripcion,Sociedad\n1001,LECHE,Parmalat\n");
        let err = read_materials_csv(f.path()).unwrap_err();
        assert!(matches!(err, ReggisError::FormatInvalid(_)));
    }

    #[test]
    fn reads_client_rows_with_accented_headers() {
        let f = write_file("Cód.Padre,Nombre Código Padre,NIT\nC001,TIENDA LA ESQUINA,900123456\n");
        let rows = read_clients_csv(f.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parent_code, "C001");
        assert_eq!(rows[0].tax_id, "900123456");
    }
}
