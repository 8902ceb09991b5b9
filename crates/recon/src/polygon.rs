use serde::Serialize;

use crate::error::LineError;
use crate::model::Parsed;
use crate::numeric::{parse_decimal, parse_integral};

/// Class token plus at least three coordinate pairs.
pub const MIN_TOKENS: usize = 7;

/// Pixel dimensions the normalized label coordinates are scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageFrame {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonRecord {
    pub class_id: i64,
    pub vertices: Vec<(i32, i32)>,
}

impl PolygonRecord {
    pub fn area(&self) -> f64 {
        contour_area(&self.vertices)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaRecord {
    pub image_id: String,
    pub class_id: i64,
    pub area: f64,
}

/// Parse one `class x1 y1 ... xn yn` line into pixel space.
///
/// Coordinates are scaled by the frame and truncated toward zero. An unpaired
/// trailing coordinate is ignored.
pub fn parse_label_line(line: &str, frame: ImageFrame) -> Result<PolygonRecord, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_TOKENS {
        return Err(format!(
            "insufficient coordinates ({} tokens, need at least {MIN_TOKENS})",
            tokens.len()
        ));
    }

    let class_id = parse_integral(tokens[0])
        .ok_or_else(|| format!("invalid class id '{}'", tokens[0]))?;

    let mut coords = Vec::with_capacity(tokens.len() - 1);
    for tok in &tokens[1..] {
        let v = parse_decimal(tok).ok_or_else(|| format!("invalid coordinate '{tok}'"))?;
        coords.push(v);
    }

    let vertices = coords
        .chunks_exact(2)
        .map(|xy| {
            (
                (xy[0] * frame.width as f64) as i32,
                (xy[1] * frame.height as f64) as i32,
            )
        })
        .collect();

    Ok(PolygonRecord { class_id, vertices })
}

/// Parse a whole label file. Malformed lines are skipped and reported.
pub fn parse_label_file(source: &str, content: &str, frame: ImageFrame) -> Parsed<Vec<PolygonRecord>> {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_label_line(line, frame) {
            Ok(polygon) => records.push(polygon),
            Err(reason) => skipped.push(LineError::new(source, idx + 1, line, reason).logged()),
        }
    }

    Parsed { records, skipped }
}

/// Unsigned area of a simple closed polygon (shoelace formula).
///
/// Vertex order may be clockwise or counter-clockwise. Fewer than three
/// vertices, or collinear vertices, give 0.
pub fn contour_area(vertices: &[(i32, i32)]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut twice: i64 = 0;
    for (i, &(x0, y0)) in vertices.iter().enumerate() {
        let (x1, y1) = vertices[(i + 1) % vertices.len()];
        twice += x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64;
    }
    twice.unsigned_abs() as f64 / 2.0
}

pub fn area_records(image_id: &str, polygons: &[PolygonRecord]) -> Vec<AreaRecord> {
    polygons
        .iter()
        .map(|p| AreaRecord {
            image_id: image_id.to_string(),
            class_id: p.class_id,
            area: p.area(),
        })
        .collect()
}
