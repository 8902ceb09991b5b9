//! Area report: per-image blocks of detection areas.
//!
//! Text layout, one block per image:
//!
//! ```text
//! Imagen: OPMM_Subasta_2025-05-30_04_55_15.945_Imedea.txt
//! Identificador: 2, Area: 1234.5
//! Identificador: 0, Area: 812.0
//!
//! ```
//!
//! The CSV variant carries the same information as headerless
//! `class_id,area,image_name` rows.

use std::fmt::Write as _;

use crate::error::{LineError, ReconError};
use crate::model::Parsed;
use crate::numeric::{format_float, parse_decimal, parse_integral};
use crate::polygon::AreaRecord;

const HEADER_PREFIX: &str = "Imagen:";
const DETECTION_PREFIX: &str = "Identificador:";
const AREA_LABEL: &str = "Area:";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: i64,
    pub area: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportBlock {
    /// Image name as declared, extension included.
    pub image_name: String,
    pub detections: Vec<Detection>,
}

impl ReportBlock {
    pub fn new(image_name: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            detections: Vec::new(),
        }
    }

    pub fn from_records(image_name: impl Into<String>, records: &[AreaRecord]) -> Self {
        Self {
            image_name: image_name.into(),
            detections: records
                .iter()
                .map(|r| Detection {
                    class_id: r.class_id,
                    area: r.area,
                })
                .collect(),
        }
    }
}

/// Blocks in declaration order. Repeated image names stay separate blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaReport {
    pub blocks: Vec<ReportBlock>,
}

enum ParserState {
    AwaitingHeader,
    InBlock(ReportBlock),
}

enum Line<'a> {
    Blank,
    Header(&'a str),
    Detection(&'a str),
    Other,
}

fn classify_line(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Line::Blank
    } else if let Some(rest) = trimmed.strip_prefix(HEADER_PREFIX) {
        Line::Header(rest.trim())
    } else if trimmed.starts_with(DETECTION_PREFIX) {
        Line::Detection(trimmed)
    } else {
        Line::Other
    }
}

/// `Identificador: <class>, Area: <area>`
///
/// The area may use a decimal comma, so the line is split on the `Area:`
/// label rather than on `,`.
pub fn parse_detection_line(line: &str) -> Result<Detection, String> {
    let (class_part, area_raw) = line.split_once(AREA_LABEL).ok_or("missing area field")?;
    let class_part = class_part.trim_end();
    let class_part = class_part.strip_suffix(',').ok_or("missing ',' before area")?;

    let class_raw = class_part
        .split_once(':')
        .map(|(_, v)| v)
        .ok_or("missing class value")?;

    let class_id = parse_integral(class_raw)
        .ok_or_else(|| format!("invalid class id '{}'", class_raw.trim()))?;
    let area = parse_decimal(area_raw)
        .ok_or_else(|| format!("invalid area '{}'", area_raw.trim()))?;

    Ok(Detection { class_id, area })
}

/// Parse the text report with an explicit two-state machine.
pub fn parse_area_report(source: &str, content: &str) -> Parsed<AreaReport> {
    let mut blocks = Vec::new();
    let mut skipped = Vec::new();
    let mut state = ParserState::AwaitingHeader;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        state = match (state, classify_line(raw)) {
            (state, Line::Blank) => state,
            (ParserState::AwaitingHeader, Line::Header(name)) => {
                ParserState::InBlock(ReportBlock::new(name))
            }
            (ParserState::InBlock(done), Line::Header(name)) => {
                blocks.push(done);
                ParserState::InBlock(ReportBlock::new(name))
            }
            (ParserState::InBlock(mut block), Line::Detection(text)) => {
                match parse_detection_line(text) {
                    Ok(det) => block.detections.push(det),
                    Err(reason) => {
                        skipped.push(LineError::new(source, line_no, raw, reason).logged())
                    }
                }
                ParserState::InBlock(block)
            }
            (ParserState::AwaitingHeader, Line::Detection(_)) => {
                skipped.push(
                    LineError::new(source, line_no, raw, "detection before any image header")
                        .logged(),
                );
                ParserState::AwaitingHeader
            }
            (state, Line::Other) => {
                skipped.push(LineError::new(source, line_no, raw, "unrecognized line").logged());
                state
            }
        };
    }

    if let ParserState::InBlock(last) = state {
        blocks.push(last);
    }

    log::debug!("{source}: parsed {} image blocks", blocks.len());
    Parsed {
        records: AreaReport { blocks },
        skipped,
    }
}

pub fn render_area_report(report: &AreaReport) -> String {
    let mut out = String::new();
    for block in &report.blocks {
        let _ = writeln!(out, "{HEADER_PREFIX} {}", block.image_name);
        for det in &block.detections {
            let _ = writeln!(
                out,
                "{DETECTION_PREFIX} {}, Area: {}",
                det.class_id,
                format_float(det.area)
            );
        }
        out.push('\n');
    }
    out
}

/// Parse the headerless CSV variant. Consecutive rows for the same image
/// form one block; images with no detections cannot be represented.
pub fn parse_area_csv(source: &str, content: &str) -> Result<Parsed<AreaReport>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut blocks: Vec<ReportBlock> = Vec::new();
    let mut skipped = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReconError::Csv {
            source: source.into(),
            message: e.to_string(),
        })?;
        let line_no = idx + 1;
        let joined = record.iter().collect::<Vec<_>>().join(",");

        if record.len() < 3 {
            skipped.push(LineError::new(source, line_no, &joined, "expected 3 fields").logged());
            continue;
        }
        let (class_raw, area_raw, image) = (&record[0], &record[1], record[2].trim());

        let class_id = match parse_integral(class_raw) {
            Some(c) => c,
            None => {
                skipped.push(LineError::new(source, line_no, &joined, "invalid class id").logged());
                continue;
            }
        };
        let area = match parse_decimal(area_raw) {
            Some(a) => a,
            None => {
                skipped.push(LineError::new(source, line_no, &joined, "invalid area").logged());
                continue;
            }
        };

        match blocks.last_mut() {
            Some(block) if block.image_name == image => {
                block.detections.push(Detection { class_id, area })
            }
            _ => {
                let mut block = ReportBlock::new(image);
                block.detections.push(Detection { class_id, area });
                blocks.push(block);
            }
        }
    }

    Ok(Parsed {
        records: AreaReport { blocks },
        skipped,
    })
}

pub fn render_area_csv(report: &AreaReport) -> Result<String, ReconError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for block in &report.blocks {
        for det in &block.detections {
            writer
                .write_record([
                    det.class_id.to_string(),
                    format_float(det.area),
                    block.image_name.clone(),
                ])
                .map_err(|e| ReconError::Csv {
                    source: "area report".into(),
                    message: e.to_string(),
                })?;
        }
    }
    let bytes = writer.into_inner().map_err(|e| ReconError::Csv {
        source: "area report".into(),
        message: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
