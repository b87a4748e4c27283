//! Validation of extracted lines against the reference store.

use crate::core::{InvoiceLine, RejectReason};
use crate::store::ReferenceStore;

/// Checks lines against the registered materials and clients.
///
/// Both checks are independently switchable; with both off the filter
/// passes every line through. Rejections are policy outcomes the caller
/// tallies, never errors.
pub struct ValidationFilter<'a> {
    store: &'a ReferenceStore,
    check_materials: bool,
    check_clients: bool,
}

impl<'a> ValidationFilter<'a> {
    pub fn new(store: &'a ReferenceStore, check_materials: bool, check_clients: bool) -> Self {
        Self {
            store,
            check_materials,
            check_clients,
        }
    }

    /// Accept or reject one line. The material lookup key is the product
    /// code paired with the line's effective legal entity.
    pub fn check(&self, line: &InvoiceLine) -> Result<(), RejectReason> {
        if self.check_materials
            && self
                .store
                .lookup_material(&line.product_code, &line.effective_entity)
                .is_none()
        {
            return Err(RejectReason::UnknownMaterial {
                code: line.product_code.clone(),
                entity: line.effective_entity.clone(),
            });
        }
        if self.check_clients && !self.store.client_known(&line.buyer_tax_id) {
            return Err(RejectReason::UnknownClient {
                tax_id: line.buyer_tax_id.clone(),
            });
        }
        Ok(())
    }
}
