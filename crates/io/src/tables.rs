//! Tabular inputs and outputs: metadata TSV, per-date result CSVs, the
//! cleaned ledger and the reconciliation reports.

use std::path::Path;

use chrono::NaiveDate;

use gamba_recon::error::LineError;
use gamba_recon::ledger::COL_DATE;
use gamba_recon::model::{
    strip_extension, CleanedLedger, DatedSale, DuplicateRow, ImageAggregate, ImageSale, LedgerRow,
    MetadataRow, Parsed, ReconciledRecord,
};
use gamba_recon::numeric::{format_float, parse_decimal, parse_integral};

use crate::error::IoError;
use crate::text::write_text;

pub const AGGREGATE_HEADER: [&str; 5] = ["Imagen", "Num_ID_0_2", "Num_ID_2", "Area_Media_2", "Peso_Medio_2"];
pub const PROCESSED_HEADER: [&str; 8] = [
    "Imagen",
    "Num_ID_0_2",
    "Num_ID_2",
    "Area_media_2",
    "Peso_Medio_2",
    "Pes",
    "Vta",
    "num_gambas",
];
const METADATA_COLUMNS: [&str; 3] = ["Imagen", "Pes", "Vta"];
const DAY_COLUMN: &str = "Fecha_sin_hora";
const LEDGER_DATE_RENAMED: &str = "FECHA_LONJA";
const POSITION_COLUMN: &str = "Posicion";
const IMAGE_DATE_COLUMN: &str = "Fecha";

const DATETIME_OUT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_OUT: &str = "%Y-%m-%d";

// ============================================================================
// Metadata
// ============================================================================

/// Parse the tab-separated image metadata table (`Imagen`, `Pes`, `Vta`).
///
/// With `date`, only rows whose `Imagen` contains that `YYYY-MM-DD` string
/// are kept. Rows with a missing field or an unparseable `Pes` are skipped.
pub fn parse_metadata(
    source: &str,
    content: &str,
    has_header: bool,
    date: Option<NaiveDate>,
) -> Parsed<Vec<MetadataRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(content.as_bytes());

    let date_str = date.map(|d| d.format(DATE_OUT).to_string());
    let mut columns = [0usize, 1, 2];
    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let line_no = idx + 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                skipped.push(LineError::new(source, line_no, "", e.to_string()).logged());
                continue;
            }
        };
        if has_header && idx == 0 {
            for (slot, name) in columns.iter_mut().zip(METADATA_COLUMNS) {
                if let Some(pos) = record.iter().position(|h| h.trim() == name) {
                    *slot = pos;
                }
            }
            continue;
        }
        let joined = record.iter().collect::<Vec<_>>().join("\t");
        if joined.trim().is_empty() {
            continue;
        }
        let field = |i: usize| record.get(i).map(str::trim);
        let (Some(image), Some(weight_raw), Some(sale_id)) =
            (field(columns[0]), field(columns[1]), field(columns[2]))
        else {
            skipped.push(LineError::new(source, line_no, &joined, "expected Imagen, Pes and Vta").logged());
            continue;
        };
        if let Some(ref d) = date_str {
            if !image.contains(d.as_str()) {
                continue;
            }
        }
        let Some(declared_weight) = parse_decimal(weight_raw) else {
            skipped.push(LineError::new(source, line_no, &joined, "invalid Pes").logged());
            continue;
        };
        rows.push(MetadataRow {
            image_id: strip_extension(image).to_string(),
            declared_weight,
            sale_id: sale_id.to_string(),
        });
    }

    Parsed { records: rows, skipped }
}

// ============================================================================
// Writers
// ============================================================================

fn render_csv<I>(path: &Path, quote_all: bool, header: &[String], rows: I) -> Result<String, IoError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let style = if quote_all { csv::QuoteStyle::Always } else { csv::QuoteStyle::Necessary };
    let mut writer = csv::WriterBuilder::new()
        .quote_style(style)
        .from_writer(Vec::new());
    writer.write_record(header).map_err(|e| IoError::csv(path, e))?;
    for row in rows {
        writer.write_record(&row).map_err(|e| IoError::csv(path, e))?;
    }
    let bytes = writer.into_inner().map_err(|e| IoError::csv(path, e))?;
    String::from_utf8(bytes).map_err(|e| IoError::csv(path, e))
}

fn write_csv<I>(path: &Path, quote_all: bool, header: &[String], rows: I) -> Result<(), IoError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let content = render_csv(path, quote_all, header, rows)?;
    write_text(path, &content)
}

fn owned(header: &[&str]) -> Vec<String> {
    header.iter().map(|s| s.to_string()).collect()
}

pub fn write_aggregates(path: &Path, aggregates: &[ImageAggregate]) -> Result<(), IoError> {
    let rows = aggregates.iter().map(|a| {
        vec![
            a.image_id.clone(),
            a.count_class_0_or_2.to_string(),
            a.count_class_2.to_string(),
            format_float(a.mean_area_class_2),
            format_float(a.mean_weight_class_2),
        ]
    });
    write_csv(path, false, &owned(&AGGREGATE_HEADER), rows)
}

/// `Imagen: <id>` followed by one class-2 weight per line, per image.
pub fn render_weights(aggregates: &[ImageAggregate]) -> String {
    let mut out = String::new();
    for a in aggregates {
        out.push_str("Imagen: ");
        out.push_str(&a.image_id);
        out.push('\n');
        for w in &a.individual_weights_class_2 {
            out.push_str(&format_float(*w));
            out.push('\n');
        }
    }
    out
}

fn processed_cells(sale: &ImageSale, count: f64) -> Vec<String> {
    vec![
        sale.image_id.clone(),
        sale.count_class_0_or_2.to_string(),
        sale.count_class_2.to_string(),
        format_float(sale.mean_area_class_2),
        format_float(sale.mean_weight_class_2),
        format_float(sale.declared_weight),
        sale.sale_id.clone(),
        format_float(count),
    ]
}

pub fn write_processed(path: &Path, sales: &[ImageSale]) -> Result<(), IoError> {
    let rows = sales.iter().map(|s| processed_cells(s, s.estimated_count));
    write_csv(path, false, &owned(&PROCESSED_HEADER), rows)
}

/// Raw ledger columns, with the date column normalized.
fn ledger_cells(headers: &[String], row: &LedgerRow) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h == COL_DATE {
                row.sale_date.format(DATETIME_OUT).to_string()
            } else {
                row.fields.get(i).cloned().unwrap_or_default()
            }
        })
        .collect()
}

pub fn write_cleaned_ledger(path: &Path, ledger: &CleanedLedger) -> Result<(), IoError> {
    let mut header = ledger.headers.clone();
    header.push(DAY_COLUMN.to_string());
    let rows = ledger.kept.iter().map(|r| {
        let mut cells = ledger_cells(&ledger.headers, r);
        cells.push(r.sale_day().format(DATE_OUT).to_string());
        cells
    });
    write_csv(path, false, &header, rows)
}

fn merged_header(ledger_headers: &[String]) -> Vec<String> {
    let mut header = owned(&PROCESSED_HEADER);
    header.extend(ledger_headers.iter().map(|h| {
        if h == COL_DATE {
            LEDGER_DATE_RENAMED.to_string()
        } else {
            h.clone()
        }
    }));
    header.push(DAY_COLUMN.to_string());
    header
}

fn merged_cells(ledger_headers: &[String], record: &ReconciledRecord) -> Vec<String> {
    let mut cells = processed_cells(&record.sale, record.estimated_shrimp_count);
    cells.extend(ledger_cells(ledger_headers, &record.ledger));
    cells.push(record.ledger.sale_day().format(DATE_OUT).to_string());
    cells
}

pub fn write_merged(path: &Path, ledger_headers: &[String], merged: &[ReconciledRecord]) -> Result<(), IoError> {
    let rows = merged.iter().map(|r| merged_cells(ledger_headers, r));
    write_csv(path, true, &merged_header(ledger_headers), rows)
}

pub fn write_duplicates(path: &Path, ledger_headers: &[String], duplicates: &[DuplicateRow]) -> Result<(), IoError> {
    let mut header = merged_header(ledger_headers);
    header.push(POSITION_COLUMN.to_string());
    let rows = duplicates.iter().map(|d| {
        let mut cells = merged_cells(ledger_headers, &d.record);
        cells.push(d.position.to_string());
        cells
    });
    write_csv(path, true, &header, rows)
}

pub fn write_unmatched(path: &Path, unmatched: &[DatedSale]) -> Result<(), IoError> {
    let mut header = owned(&PROCESSED_HEADER);
    header.push(IMAGE_DATE_COLUMN.to_string());
    let rows = unmatched.iter().map(|d| {
        let mut cells = processed_cells(&d.sale, d.sale.estimated_count);
        cells.push(d.day.format(DATE_OUT).to_string());
        cells
    });
    write_csv(path, false, &header, rows)
}

// ============================================================================
// Processed table reader
// ============================================================================

/// Read a `resultados_procesados_<date>.csv` table back into image sales.
///
/// A missing column fails the whole table. Rows with an unreadable field are
/// skipped and reported.
pub fn read_processed(path: &Path, content: &str) -> Result<Parsed<Vec<ImageSale>>, IoError> {
    let source = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IoError::csv(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut idx = [0usize; 8];
    for (slot, name) in idx.iter_mut().zip(PROCESSED_HEADER) {
        *slot = headers.iter().position(|h| h == name).ok_or_else(|| IoError::InvalidRow {
            path: path.to_path_buf(),
            line: 1,
            message: format!("missing column {name}"),
        })?;
    }

    let mut sales = Vec::new();
    let mut skipped = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let line = n + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                skipped.push(LineError::new(&source, line, "", e.to_string()).logged());
                continue;
            }
        };
        match sale_from_record(&record, &idx) {
            Ok(sale) => sales.push(sale),
            Err(column) => {
                let joined = record.iter().collect::<Vec<_>>().join(",");
                skipped.push(LineError::new(&source, line, &joined, format!("invalid {column}")).logged());
            }
        }
    }
    Ok(Parsed { records: sales, skipped })
}

/// Name of the first unreadable column on failure.
fn sale_from_record(record: &csv::StringRecord, idx: &[usize; 8]) -> Result<ImageSale, &'static str> {
    let field = |i: usize| record.get(idx[i]).unwrap_or("");
    let count = |i: usize| {
        parse_integral(field(i))
            .and_then(|v| usize::try_from(v).ok())
            .ok_or(PROCESSED_HEADER[i])
    };
    let real = |i: usize| parse_decimal(field(i)).ok_or(PROCESSED_HEADER[i]);

    Ok(ImageSale {
        image_id: field(0).trim().to_string(),
        count_class_0_or_2: count(1)?,
        count_class_2: count(2)?,
        mean_area_class_2: real(3)?,
        mean_weight_class_2: real(4)?,
        declared_weight: real(5)?,
        sale_id: field(6).trim().to_string(),
        estimated_count: real(7)?,
    })
}
