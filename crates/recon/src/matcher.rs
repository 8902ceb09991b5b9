use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{DatedSale, LedgerRow, ReconciledRecord};
use crate::numeric::{parse_integral, to_milli};

/// Composite join key: (day, sale id, weight at gram precision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinKey {
    pub day: NaiveDate,
    pub sale_id: i64,
    pub weight_milli: i64,
}

impl JoinKey {
    pub fn for_ledger(row: &LedgerRow) -> Self {
        Self {
            day: row.sale_day(),
            sale_id: row.sale_id,
            weight_milli: to_milli(row.net_weight),
        }
    }

    /// `None` when the metadata sale id is not an integer.
    pub fn for_sale(dated: &DatedSale) -> Option<Self> {
        Some(Self {
            day: dated.day,
            sale_id: parse_integral(&dated.sale.sale_id)?,
            weight_milli: to_milli(dated.sale.declared_weight),
        })
    }
}

/// Inner join of image sales against ledger sales on [`JoinKey`].
///
/// Output order follows `universe`; for each image, matching ledger rows
/// follow ledger order. Every (image, ledger row) match yields one record.
pub fn join_exact_key<'a>(
    universe: &[DatedSale],
    ledger_sales: impl IntoIterator<Item = &'a LedgerRow>,
) -> Vec<ReconciledRecord> {
    let mut index: HashMap<JoinKey, Vec<&LedgerRow>> = HashMap::new();
    for row in ledger_sales {
        index.entry(JoinKey::for_ledger(row)).or_default().push(row);
    }

    let mut joined = Vec::new();
    for dated in universe {
        let Some(key) = JoinKey::for_sale(dated) else {
            continue;
        };
        let Some(rows) = index.get(&key) else {
            continue;
        };
        for row in rows {
            joined.push(ReconciledRecord {
                sale: dated.sale.clone(),
                ledger: (*row).clone(),
                estimated_shrimp_count: row.net_weight / (dated.sale.mean_weight_class_2 / 1000.0),
                join_position: joined.len(),
            });
        }
    }
    joined
}
