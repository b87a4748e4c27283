//! # reggis
//!
//! Batch conversion of Colombian DIAN electronic invoices (UBL 2.1 XML,
//! loose or inside one-level `.zip` containers) into the fixed 24-column
//! REGGIS tabular export, with optional validation of every line against a
//! persistent reference store of known materials and clients.
//!
//! All quantities and monetary values use [`rust_decimal::Decimal`] — never
//! floating point. Quantities are normalized to kilograms and amounts to
//! COP before they reach the writer; raw source units never leak into the
//! export.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::{RwLock, mpsc};
//! use reggis::pipeline::{CancelFlag, RunOptions, run_batch};
//! use reggis::store::ReferenceStore;
//!
//! let store = RwLock::new(ReferenceStore::open("refdata.json")?);
//! let (tx, rx) = mpsc::channel();
//! std::thread::spawn(move || for event in rx { println!("{event:?}"); });
//!
//! let report = run_batch(
//!     &RunOptions::new("facturas", "salida"),
//!     &store,
//!     Some(&tx),
//!     &CancelFlag::default(),
//! )?;
//! println!("{} lines accepted", report.lines_accepted);
//! # Ok::<(), reggis::ReggisError>(())
//! ```

pub mod core;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod store;
pub mod walk;

// Re-export core types at crate root for convenience
pub use crate::core::*;
