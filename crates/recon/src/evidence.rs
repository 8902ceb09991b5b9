use std::collections::HashSet;

use crate::model::{DatedSale, DuplicateRow, ReconSummary, ReconciledRecord};

/// Fill the post-join counters of a summary whose pre-join counters are set.
pub fn complete_summary(
    mut summary: ReconSummary,
    merged: &[ReconciledRecord],
    full_row_duplicates_removed: usize,
    duplicates: &[DuplicateRow],
    unmatched: &[DatedSale],
) -> ReconSummary {
    let duplicate_images: HashSet<&str> = duplicates.iter().map(|d| d.record.image_id()).collect();

    summary.merged_rows = merged.len();
    summary.full_row_duplicates_removed = full_row_duplicates_removed;
    summary.duplicate_rows = duplicates.len();
    summary.duplicate_images = duplicate_images.len();
    summary.unmatched_rows = unmatched.len();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageSale, LedgerRow};
    use chrono::{NaiveDate, NaiveDateTime};

    fn record(image: &str, join_position: usize) -> ReconciledRecord {
        ReconciledRecord {
            sale: ImageSale {
                image_id: image.into(),
                count_class_0_or_2: 1,
                count_class_2: 1,
                mean_area_class_2: 1.0,
                mean_weight_class_2: 1.0,
                declared_weight: 1.0,
                sale_id: "1".into(),
                estimated_count: 1000.0,
            },
            ledger: LedgerRow {
                position: 0,
                sale_date: NaiveDateTime::parse_from_str("2025-05-30 00:00:00", "%Y-%m-%d %H:%M:%S")
                    .unwrap(),
                sale_id: 1,
                net_weight: 1.0,
                amount: 1.0,
                quantity_code: 1,
                fields: vec![],
            },
            estimated_shrimp_count: 1000.0,
            join_position,
        }
    }

    #[test]
    fn summary_counts() {
        let merged = vec![record("A", 0), record("A", 1), record("B", 2)];
        let duplicates: Vec<DuplicateRow> = merged[..2]
            .iter()
            .map(|r| DuplicateRow { position: r.join_position + 1, record: r.clone() })
            .collect();
        let unmatched = vec![DatedSale {
            day: NaiveDate::from_ymd_opt(2025, 5, 30).unwrap(),
            sale: record("C", 0).sale,
        }];
        let base = ReconSummary { universe_rows: 3, ..Default::default() };
        let summary = complete_summary(base, &merged, 2, &duplicates, &unmatched);
        assert_eq!(summary.universe_rows, 3);
        assert_eq!(summary.merged_rows, 3);
        assert_eq!(summary.full_row_duplicates_removed, 2);
        assert_eq!(summary.duplicate_rows, 2);
        assert_eq!(summary.duplicate_images, 1);
        assert_eq!(summary.unmatched_rows, 1);
    }
}
