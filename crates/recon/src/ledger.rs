use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{LineError, ReconError};
use crate::model::{CleanedLedger, Ledger, LedgerRow, Parsed};
use crate::numeric::{parse_decimal, parse_integral};

pub const COL_DATE: &str = "FECHA";
pub const COL_SALE_ID: &str = "NUMVENTA";
pub const COL_NET_WEIGHT: &str = "PESONETO";
pub const COL_AMOUNT: &str = "IMPORTE";
pub const COL_QUANTITY: &str = "NUMENVAS";

/// Timestamp layouts seen in ledger exports, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%m/%d/%y %H:%M:%S"];

pub fn parse_sale_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Load the auction ledger CSV. Rows with unparseable key fields are skipped
/// and reported; a missing required column is an error.
pub fn load_ledger(source: &str, csv_data: &str) -> Result<Parsed<Ledger>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Csv {
            source: source.into(),
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let idx = |name: &str| -> Result<usize, ReconError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReconError::MissingColumn {
                source: source.into(),
                column: name.into(),
            })
    };

    let date_idx = idx(COL_DATE)?;
    let sale_idx = idx(COL_SALE_ID)?;
    let weight_idx = idx(COL_NET_WEIGHT)?;
    let amount_idx = idx(COL_AMOUNT)?;
    let qty_idx = idx(COL_QUANTITY)?;

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (position, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReconError::Csv {
            source: source.into(),
            message: e.to_string(),
        })?;
        // header is line 1
        let line_no = position + 2;
        let field = |i: usize| record.get(i).unwrap_or("");
        let content = || record.iter().collect::<Vec<_>>().join(",");

        let Some(sale_date) = parse_sale_date(field(date_idx)) else {
            skipped.push(LineError::new(source, line_no, &content(), "unparseable FECHA").logged());
            continue;
        };
        let Some(sale_id) = parse_integral(field(sale_idx)) else {
            skipped.push(LineError::new(source, line_no, &content(), "invalid NUMVENTA").logged());
            continue;
        };
        let Some(net_weight) = parse_decimal(field(weight_idx)) else {
            skipped.push(LineError::new(source, line_no, &content(), "invalid PESONETO").logged());
            continue;
        };
        let Some(amount) = parse_decimal(field(amount_idx)) else {
            skipped.push(LineError::new(source, line_no, &content(), "invalid IMPORTE").logged());
            continue;
        };
        let Some(quantity_code) = parse_integral(field(qty_idx)) else {
            skipped.push(LineError::new(source, line_no, &content(), "invalid NUMENVAS").logged());
            continue;
        };

        rows.push(LedgerRow {
            position,
            sale_date,
            sale_id,
            net_weight,
            amount,
            quantity_code,
            fields: (0..headers.len()).map(|i| field(i).to_string()).collect(),
        });
    }

    log::info!("{source}: {} ledger rows loaded, {} skipped", rows.len(), skipped.len());
    Ok(Parsed {
        records: Ledger { headers, rows },
        skipped,
    })
}

/// Same |weight|, |amount| and |sale id|: the shape of a sale and its return.
fn mirrors(a: &LedgerRow, b: &LedgerRow) -> bool {
    a.net_weight.abs() == b.net_weight.abs()
        && a.amount.abs() == b.amount.abs()
        && a.sale_id.unsigned_abs() == b.sale_id.unsigned_abs()
}

/// Drop invalid quantity codes, then remove cancelling pairs day by day.
///
/// Every return row (`NUMENVAS == -1`) is compared against every other row of
/// the same day. Each mirror found marks both rows, so a return that mirrors
/// several rows removes all of them. This over-removal is kept on purpose to
/// reproduce historical outputs.
pub fn clean_ledger(ledger: Ledger) -> CleanedLedger {
    let total = ledger.rows.len();
    let valid: Vec<LedgerRow> = ledger
        .rows
        .into_iter()
        .filter(|r| r.quantity_code == 1 || r.quantity_code == -1)
        .collect();
    let invalid_quantity = total - valid.len();

    let mut by_day: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (i, row) in valid.iter().enumerate() {
        by_day.entry(row.sale_day()).or_default().push(i);
    }

    let mut remove: HashSet<usize> = HashSet::new();
    for members in by_day.values() {
        for &i in members {
            if valid[i].quantity_code != -1 {
                continue;
            }
            for &j in members {
                if i != j && mirrors(&valid[i], &valid[j]) {
                    remove.insert(i);
                    remove.insert(j);
                }
            }
        }
    }

    let mut kept = Vec::with_capacity(valid.len() - remove.len());
    let mut cancelled = Vec::with_capacity(remove.len());
    for (i, row) in valid.into_iter().enumerate() {
        if remove.contains(&i) {
            cancelled.push(row);
        } else {
            kept.push(row);
        }
    }

    log::info!(
        "ledger: {total} rows, {invalid_quantity} invalid NUMENVAS, {} cancelled, {} kept",
        cancelled.len(),
        kept.len()
    );

    CleanedLedger {
        headers: ledger.headers,
        kept,
        cancelled,
        invalid_quantity,
    }
}
