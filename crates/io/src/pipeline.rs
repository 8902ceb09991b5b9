//! Per-date batch driver.
//!
//! Three stages, each re-runnable on its own:
//! 1. `areas`: label files → `AREAS/areas_resultados_<date>.txt`
//! 2. `weights`: area report + metadata → aggregates, weights, processed table
//! 3. `merge`: processed table + ledger → merged, duplicates, unmatched
//!
//! A missing input for one date is logged and the date is skipped. Any other
//! failure while processing a date is logged and the batch moves on to the
//! next date. Outputs a re-run no longer produces are removed, so the files of
//! a date always describe its latest run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use gamba_config::{AreaReportFormat, PipelineConfig, ResolvedPaths};
use gamba_recon::aggregate::aggregate_report;
use gamba_recon::engine::{build_image_sales, reconcile};
use gamba_recon::ledger::{clean_ledger, load_ledger};
use gamba_recon::model::{CleanedLedger, MetadataRow, Parsed, ReconSummary};
use gamba_recon::polygon::ImageFrame;
use gamba_recon::report::{parse_area_csv, parse_area_report, render_area_csv, render_area_report};

use crate::error::IoError;
use crate::labels::{build_area_report, scan_inference_dir};
use crate::tables::{
    parse_metadata, read_processed, render_weights, write_aggregates, write_cleaned_ledger,
    write_duplicates, write_merged, write_processed, write_unmatched,
};
use crate::text::{read_file_as_utf8, remove_stale, write_text};

const AREAS_PREFIX: &str = "areas_resultados_";
const AGGREGATES_PREFIX: &str = "agregados_";
const WEIGHTS_PREFIX: &str = "pesos_individuales_por_imagen_";
const PROCESSED_PREFIX: &str = "resultados_procesados_";
const CLEANED_LEDGER: &str = "archivo_lonja_filtrado.csv";
const MERGED_DIR: &str = "DATOS_GAMBA";
const MERGED_PREFIX: &str = "DATOS_GAMBA_";
const DUPLICATES_DIR: &str = "duplicados";
const DUPLICATES_PREFIX: &str = "duplicados_";
const UNMATCHED_DIR: &str = "no_merge";
const UNMATCHED_PREFIX: &str = "no_merge_";

// ============================================================================
// Date selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    All,
    Only(NaiveDate),
    /// Inclusive on both ends.
    Range { from: NaiveDate, to: NaiveDate },
}

/// Which dates a stage processes: a filter plus the configured campaign year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSelection {
    pub filter: DateFilter,
    pub year: Option<i32>,
}

impl DateSelection {
    pub fn all() -> Self {
        Self { filter: DateFilter::All, year: None }
    }

    pub fn accepts(&self, date: NaiveDate) -> bool {
        if let Some(year) = self.year {
            if date.year() != year {
                return false;
            }
        }
        match self.filter {
            DateFilter::All => true,
            DateFilter::Only(d) => d == date,
            DateFilter::Range { from, to } => from <= date && date <= to,
        }
    }

    /// Dates of `available` this selection accepts. An explicitly requested
    /// single date with no input file is warned about.
    fn pick<T>(&self, stage: &str, available: BTreeMap<NaiveDate, T>) -> Vec<(NaiveDate, T)> {
        if let DateFilter::Only(d) = self.filter {
            if !available.contains_key(&d) {
                log::warn!("{stage}: no input for {d}, skipping");
            }
        }
        available.into_iter().filter(|(d, _)| self.accepts(*d)).collect()
    }
}

/// Parse a CLI date, `YYYY-MM-DD` or `DD-MM-YYYY`.
pub fn parse_cli_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d-%m-%Y"))
        .ok()
}

// ============================================================================
// Stage summaries
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AreasSummary {
    pub date: Option<NaiveDate>,
    pub label_files: usize,
    pub detections: usize,
    pub skipped_lines: usize,
    pub report: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightsSummary {
    pub date: Option<NaiveDate>,
    pub images: usize,
    pub skipped_lines: usize,
    pub metadata_rows: usize,
    pub without_metadata: usize,
    pub without_detections: usize,
    pub processed_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub ledger_rows: usize,
    pub ledger_skipped: usize,
    pub ledger_invalid_quantity: usize,
    pub ledger_cancelled: usize,
    /// Processed-table rows that could not be read back.
    pub table_rows_skipped: usize,
    pub dates: Vec<ReconSummary>,
    /// Dates whose reconciliation failed; later dates still ran.
    pub failed_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub areas: Vec<AreasSummary>,
    pub weights: Vec<WeightsSummary>,
    pub merge: MergeReport,
}

impl MergeReport {
    pub fn unmatched_rows(&self) -> usize {
        self.dates.iter().map(|s| s.unmatched_rows).sum()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    paths: ResolvedPaths,
    frame: ImageFrame,
    prefix: String,
    area_format: AreaReportFormat,
    metadata_has_header: bool,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            paths: config.paths(),
            frame: ImageFrame {
                width: config.labels.image_width,
                height: config.labels.image_height,
            },
            prefix: config.labels.prefix.clone(),
            area_format: config.formats.area_report,
            metadata_has_header: config.formats.metadata_has_header,
        }
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    fn area_report_path(&self, date: NaiveDate) -> PathBuf {
        self.paths
            .areas_dir
            .join(format!("{AREAS_PREFIX}{date}.{}", self.area_format.extension()))
    }

    /// Stage 1: one area report per date from the label directories.
    pub fn compute_areas(&self, selection: DateSelection) -> Result<Vec<AreasSummary>, IoError> {
        let by_date = match scan_inference_dir(&self.paths.inference_dir, &self.prefix) {
            Ok(m) => m,
            Err(e) if e.is_missing_file() => {
                log::warn!("areas: {e}, nothing to do");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut summaries = Vec::new();
        for (date, files) in selection.pick("areas", by_date) {
            match self.areas_for_date(date, &files) {
                Ok(summary) => summaries.push(summary),
                Err(e) => log::error!("areas {date}: {e}, skipping date"),
            }
        }
        Ok(summaries)
    }

    fn areas_for_date(&self, date: NaiveDate, files: &[PathBuf]) -> Result<AreasSummary, IoError> {
        let parsed = build_area_report(files, self.frame)?;
        let content = match self.area_format {
            AreaReportFormat::Text => render_area_report(&parsed.records),
            AreaReportFormat::Csv => render_area_csv(&parsed.records)?,
        };
        let report = self.area_report_path(date);
        write_text(&report, &content)?;

        let summary = AreasSummary {
            date: Some(date),
            label_files: files.len(),
            detections: parsed.records.blocks.iter().map(|b| b.detections.len()).sum(),
            skipped_lines: parsed.skipped.len(),
            report,
        };
        log::info!(
            "{date}: {} label files, {} detections, {} lines skipped",
            summary.label_files,
            summary.detections,
            summary.skipped_lines
        );
        Ok(summary)
    }

    /// Stage 2: aggregates, individual weights and the processed sale table.
    pub fn compute_weights(&self, selection: DateSelection) -> Result<Vec<WeightsSummary>, IoError> {
        let ext = self.area_format.extension();
        let reports = dated_files(&self.paths.areas_dir, AREAS_PREFIX, ext)?;
        let dates = selection.pick("weights", reports);
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let metadata = match read_file_as_utf8(&self.paths.metadata_file) {
            Ok(content) => Some(MetadataSource {
                source: self.paths.metadata_file.display().to_string(),
                content,
            }),
            Err(e) if e.is_missing_file() => {
                log::warn!("weights: {e}, processed tables will not be written");
                None
            }
            Err(e) => return Err(e),
        };

        let mut summaries = Vec::new();
        for (date, report_path) in dates {
            match self.weights_for_date(date, &report_path, metadata.as_ref()) {
                Ok(summary) => summaries.push(summary),
                Err(e) => log::error!("weights {date}: {e}, skipping date"),
            }
        }
        Ok(summaries)
    }

    fn weights_for_date(
        &self,
        date: NaiveDate,
        report_path: &Path,
        metadata: Option<&MetadataSource>,
    ) -> Result<WeightsSummary, IoError> {
        let source = report_path.display().to_string();
        let content = read_file_as_utf8(report_path)?;
        let parsed = match self.area_format {
            AreaReportFormat::Text => parse_area_report(&source, &content),
            AreaReportFormat::Csv => parse_area_csv(&source, &content)?,
        };
        let aggregates = aggregate_report(&parsed.records);

        let mut summary = WeightsSummary {
            date: Some(date),
            images: aggregates.len(),
            skipped_lines: parsed.skipped.len(),
            ..WeightsSummary::default()
        };

        write_aggregates(
            &self.paths.results_dir.join(format!("{AGGREGATES_PREFIX}{date}.csv")),
            &aggregates,
        )?;
        write_text(
            &self.paths.temp_dir.join(format!("{WEIGHTS_PREFIX}{date}.txt")),
            &render_weights(&aggregates),
        )?;

        let processed_path = self.paths.results_dir.join(format!("{PROCESSED_PREFIX}{date}.csv"));
        let meta = match metadata {
            Some(m) => m.rows_for(date, self.metadata_has_header),
            None => Parsed { records: Vec::new(), skipped: Vec::new() },
        };
        summary.skipped_lines += meta.skipped.len();
        summary.metadata_rows = meta.records.len();
        if meta.records.is_empty() {
            if metadata.is_some() {
                log::warn!("{date}: no metadata rows for this date, skipping processed table");
            }
            remove_stale(&processed_path)?;
            return Ok(summary);
        }

        let table = build_image_sales(&aggregates, &meta.records);
        summary.without_metadata = table.without_metadata;
        summary.without_detections = table.without_detections;
        summary.processed_rows = table.rows.len();
        write_processed(&processed_path, &table.rows)?;
        log::info!(
            "{date}: {} images, {} with metadata and detections",
            summary.images,
            summary.processed_rows
        );
        Ok(summary)
    }

    /// Load and clean the ledger, writing the cleaned audit copy.
    /// `Ok(None)` when the ledger file does not exist.
    pub fn load_cleaned_ledger(&self) -> Result<Option<(CleanedLedger, usize)>, IoError> {
        let path = &self.paths.ledger_file;
        let content = match read_file_as_utf8(path) {
            Ok(c) => c,
            Err(e) if e.is_missing_file() => return Ok(None),
            Err(e) => return Err(e),
        };
        let parsed = load_ledger(&path.display().to_string(), &content).map_err(IoError::Ledger)?;
        let cleaned = clean_ledger(parsed.records);
        write_cleaned_ledger(&self.paths.results_dir.join(CLEANED_LEDGER), &cleaned)?;
        Ok(Some((cleaned, parsed.skipped.len())))
    }

    /// Stage 3: reconcile each processed table against the cleaned ledger.
    pub fn merge(&self, selection: DateSelection) -> Result<MergeReport, IoError> {
        let tables = dated_files(&self.paths.results_dir, PROCESSED_PREFIX, "csv")?;
        let dates = selection.pick("merge", tables);
        let mut report = MergeReport::default();
        if dates.is_empty() {
            return Ok(report);
        }

        let Some((ledger, skipped)) = self.load_cleaned_ledger()? else {
            log::warn!(
                "merge: ledger {} not found, skipping {} dates",
                self.paths.ledger_file.display(),
                dates.len()
            );
            return Ok(report);
        };
        report.ledger_rows = ledger.kept.len() + ledger.cancelled.len() + ledger.invalid_quantity;
        report.ledger_skipped = skipped;
        report.ledger_invalid_quantity = ledger.invalid_quantity;
        report.ledger_cancelled = ledger.cancelled.len();

        for (date, table_path) in dates {
            match self.merge_date(date, &table_path, &ledger) {
                Ok((summary, skipped)) => {
                    report.table_rows_skipped += skipped;
                    report.dates.push(summary);
                }
                Err(e) => {
                    log::error!("merge {date}: {e}, skipping date");
                    report.failed_dates.push(date);
                }
            }
        }
        Ok(report)
    }

    /// Reconcile one date and replace its three output files. An output with
    /// no rows is removed instead of written.
    fn merge_date(
        &self,
        date: NaiveDate,
        table_path: &Path,
        ledger: &CleanedLedger,
    ) -> Result<(ReconSummary, usize), IoError> {
        let content = read_file_as_utf8(table_path)?;
        let sales = read_processed(table_path, &content)?;
        let out = reconcile(date, &sales.records, ledger);

        let results = &self.paths.results_dir;
        let merged_path = results.join(MERGED_DIR).join(format!("{MERGED_PREFIX}{date}.csv"));
        let duplicates_path = results.join(DUPLICATES_DIR).join(format!("{DUPLICATES_PREFIX}{date}.csv"));
        let unmatched_path = results.join(UNMATCHED_DIR).join(format!("{UNMATCHED_PREFIX}{date}.csv"));

        if out.merged.is_empty() {
            log::warn!("{date}: empty merge");
            remove_stale(&merged_path)?;
        } else {
            write_merged(&merged_path, &ledger.headers, &out.merged)?;
        }
        if out.duplicates.is_empty() {
            remove_stale(&duplicates_path)?;
        } else {
            write_duplicates(&duplicates_path, &ledger.headers, &out.duplicates)?;
        }
        if out.unmatched.is_empty() {
            remove_stale(&unmatched_path)?;
        } else {
            write_unmatched(&unmatched_path, &out.unmatched)?;
        }
        Ok((out.summary, sales.skipped.len()))
    }

    /// All three stages in order.
    pub fn run(&self, selection: DateSelection) -> Result<RunReport, IoError> {
        let areas = self.compute_areas(selection)?;
        let weights = self.compute_weights(selection)?;
        let merge = self.merge(selection)?;
        Ok(RunReport { areas, weights, merge })
    }
}

/// The metadata file, read once per weights run.
struct MetadataSource {
    source: String,
    content: String,
}

impl MetadataSource {
    fn rows_for(&self, date: NaiveDate, has_header: bool) -> Parsed<Vec<MetadataRow>> {
        parse_metadata(&self.source, &self.content, has_header, Some(date))
    }
}

/// `<prefix><YYYY-MM-DD>.<ext>` files in `dir`, keyed by date. A missing
/// directory yields no dates.
fn dated_files(dir: &Path, prefix: &str, ext: &str) -> Result<BTreeMap<NaiveDate, PathBuf>, IoError> {
    let mut out = BTreeMap::new();
    if !dir.is_dir() {
        log::warn!("{} does not exist", dir.display());
        return Ok(out);
    }
    let suffix = format!(".{ext}");
    for entry in fs::read_dir(dir).map_err(|e| IoError::read(dir, e))? {
        let path = entry.map_err(|e| IoError::read(dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_prefix(prefix).and_then(|s| s.strip_suffix(suffix.as_str())) else {
            continue;
        };
        match NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
            Ok(date) => {
                out.insert(date, path);
            }
            Err(_) => log::warn!("ignoring {name}: '{stem}' is not a YYYY-MM-DD date"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn selection_filters() {
        let range = DateSelection {
            filter: DateFilter::Range { from: d("2025-05-01"), to: d("2025-05-31") },
            year: None,
        };
        assert!(range.accepts(d("2025-05-01")));
        assert!(range.accepts(d("2025-05-31")));
        assert!(!range.accepts(d("2025-06-01")));

        let year = DateSelection { filter: DateFilter::All, year: Some(2024) };
        assert!(year.accepts(d("2024-12-31")));
        assert!(!year.accepts(d("2025-01-01")));

        let only = DateSelection { filter: DateFilter::Only(d("2025-05-30")), year: None };
        assert!(only.accepts(d("2025-05-30")));
        assert!(!only.accepts(d("2025-05-29")));
    }

    #[test]
    fn cli_dates_in_both_orders() {
        assert_eq!(parse_cli_date("2025-05-30"), Some(d("2025-05-30")));
        assert_eq!(parse_cli_date("30-05-2025"), Some(d("2025-05-30")));
        assert_eq!(parse_cli_date("30/05/2025"), None);
    }

    #[test]
    fn dated_files_ignore_other_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "areas_resultados_2025-05-30.txt",
            "areas_resultados_2025-05-31.csv",
            "areas_resultados_bad.txt",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let found = dated_files(dir.path(), AREAS_PREFIX, "txt").unwrap();
        assert_eq!(found.keys().copied().collect::<Vec<_>>(), vec![d("2025-05-30")]);
        assert!(dated_files(&dir.path().join("missing"), AREAS_PREFIX, "txt").unwrap().is_empty());
    }
}
