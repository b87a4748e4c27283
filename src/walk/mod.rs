//! Input discovery and document reading.
//!
//! A batch run scans one folder, non-recursively, for `.xml` files and
//! one-level `.zip` archives. Scanning is cheap and deterministic (units
//! are sorted by file name); actually reading a unit happens later, on a
//! worker, so a corrupt archive costs only its own unit.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::ReggisError;

/// What kind of input file a unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Xml,
    Zip,
}

/// One schedulable unit of input: a loose XML file or a whole archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Position in the sorted scan order; output ordering follows it.
    pub index: usize,
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// One XML document read from a unit, with its provenance label.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name, or `archive.zip/inner.xml` for archive members.
    pub origin: String,
    pub text: String,
}

/// Scan `root` for input units, sorted by file name.
///
/// Failure to enumerate the folder itself is fatal to the run.
pub fn scan(root: &Path) -> Result<Vec<SourceUnit>, ReggisError> {
    let io_err = |source| ReggisError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut paths: Vec<(PathBuf, SourceKind)> = Vec::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("xml") => paths.push((path, SourceKind::Xml)),
            Some("zip") => paths.push((path, SourceKind::Zip)),
            _ => {}
        }
    }
    paths.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, (path, kind))| SourceUnit { index, path, kind })
        .collect())
}

/// Read every XML document a unit contains.
///
/// Any failure to open or decode the unit surfaces as
/// [`ReggisError::ArchiveUnreadable`]; the caller skips the unit and the
/// batch continues.
pub fn read_unit(unit: &SourceUnit) -> Result<Vec<Document>, ReggisError> {
    let label = file_label(&unit.path);
    let unreadable = |message: String| ReggisError::ArchiveUnreadable {
        origin: label.clone(),
        message,
    };

    match unit.kind {
        SourceKind::Xml => {
            let bytes = fs::read(&unit.path).map_err(|e| unreadable(e.to_string()))?;
            Ok(vec![Document {
                origin: label.clone(),
                text: decode_text(bytes),
            }])
        }
        SourceKind::Zip => {
            let file = fs::File::open(&unit.path).map_err(|e| unreadable(e.to_string()))?;
            let mut archive =
                zip::ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;

            let mut documents = Vec::new();
            for i in 0..archive.len() {
                let mut entry = archive.by_index(i).map_err(|e| unreadable(e.to_string()))?;
                if !entry.name().to_lowercase().ends_with(".xml") {
                    continue;
                }
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| unreadable(e.to_string()))?;
                documents.push(Document {
                    origin: format!("{label}/{}", entry.name()),
                    text: decode_text(bytes),
                });
            }
            Ok(documents)
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Decode document bytes as UTF-8, falling back to Latin-1.
///
/// DIAN documents are UTF-8, but reference exports and older archives show
/// up Latin-1 encoded often enough that rejecting them would be hostile.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}
