//! Persistent reference store of registered materials and clients.
//!
//! The store is the authority the validation filter consults: a material is
//! known by its (code, legal entity) pair, a client by its tax ID. Imports
//! are additive and idempotent; an existing key is never overwritten, so
//! re-importing the same file is safe. The store persists as a JSON
//! snapshot, rewritten atomically (temp file, then rename) on save.

mod import;

pub use import::{ClientRow, MaterialRow, read_clients_csv, read_materials_csv};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{ReggisError, canonical_entity};

/// One registered material: the (code, entity) pair is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub code: String,
    pub description: String,
    /// Canonical legal-entity tax ID, or the verbatim import value when no
    /// alias matched.
    pub entity: String,
}

/// One registered client, keyed by its parent code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub parent_code: String,
    pub name: String,
    /// `None` when the import carried the bare placeholder "nit" or an
    /// empty NIT field.
    pub tax_id: Option<String>,
}

/// Outcome of one import call. Row problems never abort an import; they
/// are tallied and reported here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows inserted as new entries.
    pub inserted: usize,
    /// Rows whose key already existed; left untouched.
    pub already_existing: usize,
    /// Rows skipped by policy (placeholder tax IDs).
    pub skipped: usize,
    /// Rows rejected for missing required fields, with their file line.
    pub rejections: Vec<(u64, String)>,
}

impl ImportReport {
    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    materials: Vec<Material>,
    clients: Vec<Client>,
}

/// Tax IDs that mean "this client has no NIT"; such rows are not imported.
const CLIENT_TAX_SENTINELS: &[&str] = &["no nit", "sin nit", "nonit"];

/// The in-memory reference store plus its snapshot path.
///
/// Concurrency is the caller's concern: the pipeline holds the store in an
/// `RwLock`, taking a write lock for imports and read locks for validation.
#[derive(Debug)]
pub struct ReferenceStore {
    path: PathBuf,
    materials: HashMap<(String, String), Material>,
    clients: HashMap<String, Client>,
    client_tax_ids: HashSet<String>,
}

impl ReferenceStore {
    /// Open the store at `path`, loading the snapshot if one exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ReggisError> {
        let path = path.into();
        let snapshot = match fs::read_to_string(&path) {
            Ok(text) => {
                serde_json::from_str::<Snapshot>(&text).map_err(|e| ReggisError::StoreCorrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(source) => {
                return Err(ReggisError::Store {
                    path: path.clone(),
                    source,
                });
            }
        };

        let mut store = Self {
            path,
            materials: HashMap::new(),
            clients: HashMap::new(),
            client_tax_ids: HashSet::new(),
        };
        for m in snapshot.materials {
            store
                .materials
                .insert((m.code.clone(), m.entity.clone()), m);
        }
        for c in snapshot.clients {
            if let Some(nit) = &c.tax_id {
                store.client_tax_ids.insert(nit.clone());
            }
            store.clients.insert(c.parent_code.clone(), c);
        }
        tracing::debug!(
            path = %store.path.display(),
            materials = store.materials.len(),
            clients = store.clients.len(),
            "reference store opened"
        );
        Ok(store)
    }

    /// Persist the current contents as a JSON snapshot.
    ///
    /// Entries are written in sorted order so consecutive saves of the same
    /// contents produce identical files.
    pub fn save(&self) -> Result<(), ReggisError> {
        let mut materials: Vec<&Material> = self.materials.values().collect();
        materials.sort_by(|a, b| (&a.code, &a.entity).cmp(&(&b.code, &b.entity)));
        let mut clients: Vec<&Client> = self.clients.values().collect();
        clients.sort_by(|a, b| a.parent_code.cmp(&b.parent_code));

        #[derive(Serialize)]
        struct SnapshotRef<'a> {
            materials: Vec<&'a Material>,
            clients: Vec<&'a Client>,
        }
        let text = serde_json::to_string_pretty(&SnapshotRef { materials, clients })
            .map_err(|e| ReggisError::StoreCorrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        let store_err = |source| ReggisError::Store {
            path: self.path.clone(),
            source,
        };
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text).map_err(store_err)?;
        fs::rename(&tmp, &self.path).map_err(store_err)?;
        Ok(())
    }

    /// Import material rows, canonicalizing the SOCIEDAD field.
    ///
    /// A SOCIEDAD that is neither a known alias nor numeric is kept
    /// verbatim; such materials can still be matched if an invoice carries
    /// the same value as seller tax ID.
    pub fn import_materials(&mut self, rows: Vec<MaterialRow>) -> ImportReport {
        let mut report = ImportReport::default();
        for row in rows {
            if row.code.is_empty() {
                report.rejections.push((row.line, "missing CODIGO".into()));
                continue;
            }
            if row.entity.is_empty() {
                report.rejections.push((row.line, "missing SOCIEDAD".into()));
                continue;
            }
            let entity = match canonical_entity(&row.entity) {
                Some(nit) => nit.to_string(),
                None => {
                    if !row.entity.chars().all(|c| c.is_ascii_digit()) {
                        tracing::warn!(
                            line = row.line,
                            entity = %row.entity,
                            "unrecognized SOCIEDAD kept verbatim"
                        );
                    }
                    row.entity.clone()
                }
            };
            let key = (row.code.clone(), entity.clone());
            if self.materials.contains_key(&key) {
                report.already_existing += 1;
            } else {
                self.materials.insert(
                    key,
                    Material {
                        code: row.code,
                        description: row.description,
                        entity,
                    },
                );
                report.inserted += 1;
            }
        }
        tracing::info!(
            inserted = report.inserted,
            existing = report.already_existing,
            rejected = report.rejected(),
            "materials import finished"
        );
        report
    }

    /// Import client rows.
    ///
    /// Placeholder tax IDs ("no nit", "sin nit", "nonit") skip the row. The
    /// tax ID itself is optional: the bare placeholder "nit" and an empty
    /// NIT field both store the client with no tax ID.
    pub fn import_clients(&mut self, rows: Vec<ClientRow>) -> ImportReport {
        let mut report = ImportReport::default();
        for row in rows {
            if row.parent_code.is_empty() {
                report.rejections.push((row.line, "missing Cód.Padre".into()));
                continue;
            }
            if row.name.is_empty() {
                report
                    .rejections
                    .push((row.line, "missing Nombre Código Padre".into()));
                continue;
            }

            let lowered = row.tax_id.to_lowercase();
            if CLIENT_TAX_SENTINELS.contains(&lowered.as_str()) {
                report.skipped += 1;
                continue;
            }
            let tax_id = if row.tax_id.is_empty() || lowered == "nit" {
                None
            } else {
                Some(row.tax_id.clone())
            };

            if self.clients.contains_key(&row.parent_code) {
                report.already_existing += 1;
            } else {
                if let Some(nit) = &tax_id {
                    self.client_tax_ids.insert(nit.clone());
                }
                self.clients.insert(
                    row.parent_code.clone(),
                    Client {
                        parent_code: row.parent_code,
                        name: row.name,
                        tax_id,
                    },
                );
                report.inserted += 1;
            }
        }
        tracing::info!(
            inserted = report.inserted,
            existing = report.already_existing,
            skipped = report.skipped,
            rejected = report.rejected(),
            "clients import finished"
        );
        report
    }

    /// Read and import a materials CSV, then persist the snapshot.
    pub fn import_materials_csv(&mut self, path: &Path) -> Result<ImportReport, ReggisError> {
        let rows = read_materials_csv(path)?;
        let report = self.import_materials(rows);
        self.save()?;
        Ok(report)
    }

    /// Read and import a clients CSV, then persist the snapshot.
    pub fn import_clients_csv(&mut self, path: &Path) -> Result<ImportReport, ReggisError> {
        let rows = read_clients_csv(path)?;
        let report = self.import_clients(rows);
        self.save()?;
        Ok(report)
    }

    /// Look up a material by its (code, legal entity) pair.
    pub fn lookup_material(&self, code: &str, entity: &str) -> Option<&Material> {
        self.materials
            .get(&(code.to_string(), entity.to_string()))
    }

    /// Whether any registered client carries this tax ID.
    pub fn client_known(&self, tax_id: &str) -> bool {
        self.client_tax_ids.contains(tax_id)
    }

    /// Look up a client by its parent code.
    pub fn lookup_client(&self, parent_code: &str) -> Option<&Client> {
        self.clients.get(parent_code)
    }

    /// (materials, clients) entry counts.
    pub fn counts(&self) -> (usize, usize) {
        (self.materials.len(), self.clients.len())
    }
}
