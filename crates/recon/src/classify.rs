use std::collections::{HashMap, HashSet};

use crate::model::{DatedSale, DuplicateRow, ReconciledRecord};

/// Drop rows identical across every output column, keeping the first.
///
/// Sale columns are a function of the image id, so (image id, raw ledger
/// fields) identifies the full output row.
pub fn drop_full_row_duplicates(joined: Vec<ReconciledRecord>) -> (Vec<ReconciledRecord>, usize) {
    let before = joined.len();
    let mut seen: HashSet<(String, Vec<String>)> = HashSet::new();
    let merged: Vec<ReconciledRecord> = joined
        .into_iter()
        .filter(|r| seen.insert((r.sale.image_id.clone(), r.ledger.fields.clone())))
        .collect();
    let removed = before - merged.len();
    (merged, removed)
}

/// Every merged row whose image id occurs more than once, in merged order.
pub fn find_duplicates(merged: &[ReconciledRecord]) -> Vec<DuplicateRow> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in merged {
        *counts.entry(r.image_id()).or_insert(0) += 1;
    }
    merged
        .iter()
        .filter(|r| counts[r.image_id()] > 1)
        .map(|r| DuplicateRow {
            position: r.join_position + 1,
            record: r.clone(),
        })
        .collect()
}

/// Universe rows whose image id never made it into the merged set.
pub fn find_unmatched(universe: &[DatedSale], merged: &[ReconciledRecord]) -> Vec<DatedSale> {
    let merged_ids: HashSet<&str> = merged.iter().map(|r| r.image_id()).collect();
    universe
        .iter()
        .filter(|d| !merged_ids.contains(d.sale.image_id.as_str()))
        .cloned()
        .collect()
}
