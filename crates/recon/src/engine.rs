use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::classify::{drop_full_row_duplicates, find_duplicates, find_unmatched};
use crate::evidence::complete_summary;
use crate::matcher::{join_exact_key, JoinKey};
use crate::model::{
    CleanedLedger, DatedSale, ImageAggregate, ImageSale, LedgerRow, MetadataRow, ReconOutput,
    ReconSummary,
};

static DATE_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

/// First `YYYY-MM-DD` substring of an image id that is a real calendar date.
pub fn extract_image_date(image_id: &str) -> Option<NaiveDate> {
    let m = DATE_IN_NAME.find(image_id)?;
    NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok()
}

/// Image aggregates joined with their metadata rows.
#[derive(Debug, Clone, Default)]
pub struct SalesTable {
    /// One row per image id, ordered by image id.
    pub rows: Vec<ImageSale>,
    pub without_metadata: usize,
    pub without_detections: usize,
}

/// Inner-join aggregates with metadata on image id, drop images without
/// class-2 detections, and keep the first pairing per image.
///
/// The first metadata row wins for an image; the first aggregate with at
/// least one class-2 detection wins for a repeated image declaration.
pub fn build_image_sales(aggregates: &[ImageAggregate], metadata: &[MetadataRow]) -> SalesTable {
    let mut meta_by_image: HashMap<&str, &MetadataRow> = HashMap::new();
    for row in metadata {
        meta_by_image.entry(row.image_id.as_str()).or_insert(row);
    }

    let mut table = SalesTable::default();
    let mut by_image: BTreeMap<&str, ImageSale> = BTreeMap::new();

    for agg in aggregates {
        let Some(meta) = meta_by_image.get(agg.image_id.as_str()) else {
            log::debug!("{}: no metadata row", agg.image_id);
            table.without_metadata += 1;
            continue;
        };
        if agg.count_class_2 == 0 {
            log::debug!("{}: no class 2 detections, no weight estimate", agg.image_id);
            table.without_detections += 1;
            continue;
        }
        by_image.entry(agg.image_id.as_str()).or_insert_with(|| ImageSale {
            image_id: agg.image_id.clone(),
            count_class_0_or_2: agg.count_class_0_or_2,
            count_class_2: agg.count_class_2,
            mean_area_class_2: agg.mean_area_class_2,
            mean_weight_class_2: agg.mean_weight_class_2,
            declared_weight: meta.declared_weight,
            sale_id: meta.sale_id.clone(),
            estimated_count: meta.declared_weight / (agg.mean_weight_class_2 / 1000.0),
        });
    }

    table.rows = by_image.into_values().collect();
    table
}

/// Stage B filters: a parseable date equal to `date`, at least one class-2
/// detection. Rows with an unusable sale id stay in the universe (they can
/// only end up unmatched) but are counted.
pub fn prepare_universe(date: NaiveDate, sales: &[ImageSale], summary: &mut ReconSummary) -> Vec<DatedSale> {
    let mut universe = Vec::new();
    for sale in sales {
        let Some(day) = extract_image_date(&sale.image_id) else {
            log::warn!("{}: no date in image name, cannot reconcile", sale.image_id);
            summary.excluded_no_date += 1;
            continue;
        };
        if day != date {
            summary.excluded_other_date += 1;
            continue;
        }
        if sale.count_class_2 == 0 || sale.mean_weight_class_2 <= 0.0 {
            summary.excluded_no_detections += 1;
            continue;
        }
        let dated = DatedSale { day, sale: sale.clone() };
        if JoinKey::for_sale(&dated).is_none() {
            log::warn!("{}: sale id '{}' is not an integer", sale.image_id, sale.sale_id);
            summary.unusable_sale_id += 1;
        }
        universe.push(dated);
    }
    summary.universe_rows = universe.len();
    universe
}

/// Reconcile one day's image sales against the cleaned ledger.
pub fn reconcile(date: NaiveDate, sales: &[ImageSale], ledger: &CleanedLedger) -> ReconOutput {
    let mut summary = ReconSummary {
        date: Some(date),
        input_rows: sales.len(),
        ..ReconSummary::default()
    };

    let universe = prepare_universe(date, sales, &mut summary);
    let ledger_sales: Vec<&LedgerRow> = ledger.sales_on(date).collect();
    summary.ledger_sales = ledger_sales.len();

    let joined = join_exact_key(&universe, ledger_sales);
    let (merged, removed) = drop_full_row_duplicates(joined);

    let duplicates = find_duplicates(&merged);
    if !duplicates.is_empty() {
        log::warn!("{date}: {} merged rows share an image with another row", duplicates.len());
    }
    let unmatched = find_unmatched(&universe, &merged);

    let summary = complete_summary(summary, &merged, removed, &duplicates, &unmatched);
    log::info!(
        "{date}: {} images in universe, {} merged, {} duplicated, {} unmatched",
        summary.universe_rows,
        summary.merged_rows,
        summary.duplicate_rows,
        summary.unmatched_rows
    );

    ReconOutput {
        date,
        universe,
        merged,
        duplicates,
        unmatched,
        summary,
    }
}
