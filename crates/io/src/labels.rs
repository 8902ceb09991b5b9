//! Label directory scanning.
//!
//! The inference stage leaves `<inference_dir>/<subdir>/labels/*.txt`, one
//! polygon file per image. Each subdirectory belongs to one auction date.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use gamba_recon::model::{strip_extension, Parsed};
use gamba_recon::polygon::{area_records, parse_label_file, ImageFrame};
use gamba_recon::report::{AreaReport, ReportBlock};

use crate::error::IoError;
use crate::text::read_file_as_utf8;

const LABELS_SUBDIR: &str = "labels";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H_%M_%S%.f";

/// Capture timestamp right after `prefix` in a label filename:
/// `OPMM_Subasta_2025-05-30_04_55_15.945_Imedea.txt` → 2025-05-30 04:55:15.945.
pub fn label_timestamp(file_name: &str, prefix: &str) -> Option<NaiveDateTime> {
    let rest = file_name.strip_prefix(prefix)?;
    let rest = rest.strip_suffix(".txt").unwrap_or(rest);
    let parts: Vec<&str> = rest.splitn(5, '_').collect();
    if parts.len() < 4 {
        return None;
    }
    let stamp = parts[..4].join("_");
    NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).ok()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<prefix>*.txt` files in `labels_dir`, ordered by embedded timestamp.
/// Names without a parseable timestamp go last, by name.
pub fn sorted_label_files(labels_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, IoError> {
    let entries = fs::read_dir(labels_dir).map_err(|e| IoError::read(labels_dir, e))?;
    let mut files: Vec<(Option<NaiveDateTime>, String, PathBuf)> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IoError::read(labels_dir, e))?.path();
        let name = file_name(&path);
        if !path.is_file() || !name.ends_with(".txt") || !name.starts_with(prefix) {
            continue;
        }
        files.push((label_timestamp(&name, prefix), name, path));
    }
    files.sort_by(|a, b| match (&a.0, &b.0) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.1.cmp(&b.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

/// Date of an inference subdirectory: the second-to-last `_` part of its
/// name, else the timestamp of its first label file.
pub fn subdir_date(name: &str, label_files: &[PathBuf], prefix: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() >= 2 {
        if let Ok(date) = NaiveDate::parse_from_str(parts[parts.len() - 2], "%Y-%m-%d") {
            return Some(date);
        }
    }
    let mut names: Vec<String> = label_files.iter().map(|p| file_name(p)).collect();
    names.sort();
    names.first().and_then(|n| label_timestamp(n, prefix)).map(|ts| ts.date())
}

/// Label files grouped by date. Subdirectories are visited by name, so files
/// of two subdirectories sharing a date keep subdirectory order.
pub fn scan_inference_dir(
    inference_dir: &Path,
    prefix: &str,
) -> Result<BTreeMap<NaiveDate, Vec<PathBuf>>, IoError> {
    if !inference_dir.is_dir() {
        return Err(IoError::MissingFile { path: inference_dir.to_path_buf() });
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(inference_dir)
        .map_err(|e| IoError::read(inference_dir, e))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();

    let mut by_date: BTreeMap<NaiveDate, Vec<PathBuf>> = BTreeMap::new();
    for subdir in subdirs {
        let labels_dir = subdir.join(LABELS_SUBDIR);
        if !labels_dir.is_dir() {
            log::warn!("no labels in {}", subdir.display());
            continue;
        }
        let files = sorted_label_files(&labels_dir, prefix)?;
        let Some(date) = subdir_date(&file_name(&subdir), &files, prefix) else {
            log::warn!("cannot determine date for {}, skipping", subdir.display());
            continue;
        };
        log::debug!("{}: {} label files for {date}", subdir.display(), files.len());
        by_date.entry(date).or_default().extend(files);
    }
    Ok(by_date)
}

/// Compute polygon areas for every label file, one report block per file.
pub fn build_area_report(files: &[PathBuf], frame: ImageFrame) -> Result<Parsed<AreaReport>, IoError> {
    let mut blocks = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    for path in files {
        let content = read_file_as_utf8(path)?;
        let name = file_name(path);
        let parsed = parse_label_file(&name, &content, frame);
        skipped.extend(parsed.skipped);
        let records = area_records(strip_extension(&name), &parsed.records);
        blocks.push(ReportBlock::from_records(name, &records));
    }
    Ok(Parsed {
        records: AreaReport { blocks },
        skipped,
    })
}
