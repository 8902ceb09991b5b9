use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::LineError;

/// Detection class counted together with shrimp in `count_class_0_or_2`.
pub const CLASS_COMPANION: i64 = 0;
/// Detection class of a countable shrimp specimen.
pub const CLASS_SHRIMP: i64 = 2;

/// Parse output: the usable records plus every line that had to be skipped.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: T,
    pub skipped: Vec<LineError>,
}

// ---------------------------------------------------------------------------
// Per-image aggregation
// ---------------------------------------------------------------------------

/// One image's detections, folded.
///
/// `count_class_0_or_2 >= count_class_2`, and `mean_weight_class_2 == 0.0`
/// exactly when `individual_weights_class_2` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAggregate {
    pub image_id: String,
    pub count_class_0_or_2: usize,
    pub count_class_2: usize,
    pub mean_area_class_2: f64,
    pub individual_weights_class_2: Vec<f64>,
    pub mean_weight_class_2: f64,
}

/// One row of the image metadata table (`Imagen`, `Pes`, `Vta`).
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    /// Image name with its extension stripped.
    pub image_id: String,
    /// Declared lot weight in kg, decimal comma already normalized.
    pub declared_weight: f64,
    /// Sale number as written in the metadata.
    pub sale_id: String,
}

/// An aggregate joined with its metadata: one row per image id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSale {
    pub image_id: String,
    pub count_class_0_or_2: usize,
    pub count_class_2: usize,
    pub mean_area_class_2: f64,
    pub mean_weight_class_2: f64,
    pub declared_weight: f64,
    pub sale_id: String,
    pub estimated_count: f64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A parsed auction ledger row. `fields` keeps every raw column in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    /// 0-based data-row position in the ledger file.
    pub position: usize,
    pub sale_date: NaiveDateTime,
    pub sale_id: i64,
    pub net_weight: f64,
    pub amount: f64,
    pub quantity_code: i64,
    pub fields: Vec<String>,
}

impl LedgerRow {
    pub fn sale_day(&self) -> NaiveDate {
        self.sale_date.date()
    }

    /// Sale (`+1`) rather than return (`-1`).
    pub fn is_sale(&self) -> bool {
        self.quantity_code == 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub headers: Vec<String>,
    pub rows: Vec<LedgerRow>,
}

/// Ledger after quantity-code filtering and cancelling-pair removal.
#[derive(Debug, Clone, Default)]
pub struct CleanedLedger {
    pub headers: Vec<String>,
    /// Surviving rows in input order, returns without a counterpart included.
    pub kept: Vec<LedgerRow>,
    /// Rows removed as part of at least one cancelling pair.
    pub cancelled: Vec<LedgerRow>,
    /// Rows dropped because NUMENVAS was outside {-1, 1}.
    pub invalid_quantity: usize,
}

impl CleanedLedger {
    /// The reconciliation universe for one day: uncancelled sales.
    pub fn sales_on(&self, day: NaiveDate) -> impl Iterator<Item = &LedgerRow> {
        self.kept
            .iter()
            .filter(move |r| r.is_sale() && r.sale_day() == day)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// An image sale that survived the pre-join filters, with its extracted date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedSale {
    pub day: NaiveDate,
    pub sale: ImageSale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub sale: ImageSale,
    pub ledger: LedgerRow,
    /// `ledger.net_weight / (mean_weight_class_2 / 1000)`.
    pub estimated_shrimp_count: f64,
    /// 0-based index in the join output before full-row duplicates were dropped.
    pub join_position: usize,
}

impl ReconciledRecord {
    pub fn image_id(&self) -> &str {
        &self.sale.image_id
    }
}

/// A merged row whose image id appears more than once in the merged set.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateRow {
    /// 1-based position of the row in the join output.
    pub position: usize,
    pub record: ReconciledRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub date: Option<NaiveDate>,
    pub input_rows: usize,
    pub excluded_no_date: usize,
    pub excluded_other_date: usize,
    pub excluded_no_detections: usize,
    pub unusable_sale_id: usize,
    pub universe_rows: usize,
    pub ledger_sales: usize,
    pub merged_rows: usize,
    pub full_row_duplicates_removed: usize,
    pub duplicate_rows: usize,
    pub duplicate_images: usize,
    pub unmatched_rows: usize,
}

#[derive(Debug, Clone)]
pub struct ReconOutput {
    pub date: NaiveDate,
    pub universe: Vec<DatedSale>,
    pub merged: Vec<ReconciledRecord>,
    pub duplicates: Vec<DuplicateRow>,
    pub unmatched: Vec<DatedSale>,
    pub summary: ReconSummary,
}

/// Strip a trailing filename extension (`a.b.txt` → `a.b`). Names without a
/// dot, or whose only dot is leading, are returned unchanged.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 && !name[idx..].contains(['/', '\\']) => &name[..idx],
        _ => name,
    }
}
