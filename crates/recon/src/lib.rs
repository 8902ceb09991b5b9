//! `gamba-recon`: shrimp count estimation and auction ledger reconciliation.
//!
//! Pure engine crate: receives file contents and pre-loaded records, returns
//! typed results. No filesystem access and no CLI dependencies.

pub mod aggregate;
pub mod classify;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod numeric;
pub mod polygon;
pub mod report;
pub mod weight;

pub use engine::{build_image_sales, reconcile};
pub use error::{LineError, ReconError};
pub use model::{
    CleanedLedger, ImageAggregate, ImageSale, Ledger, LedgerRow, MetadataRow, Parsed,
    ReconOutput, ReconSummary, ReconciledRecord,
};
