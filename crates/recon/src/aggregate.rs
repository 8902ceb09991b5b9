use crate::model::{strip_extension, ImageAggregate, CLASS_COMPANION, CLASS_SHRIMP};
use crate::report::{AreaReport, Detection, ReportBlock};
use crate::weight::estimate_weight;

/// Running totals for the block currently being read.
#[derive(Debug, Default)]
struct BlockAccumulator {
    count_0_or_2: usize,
    count_2: usize,
    area_sum_2: f64,
    weights_2: Vec<f64>,
}

impl BlockAccumulator {
    fn observe(&mut self, image_name: &str, det: &Detection) {
        if det.class_id == CLASS_SHRIMP {
            // ln(area) is undefined for degenerate polygons
            let Some(weight) = estimate_weight(det.area) else {
                log::warn!(
                    "{image_name}: skipping class {CLASS_SHRIMP} detection with area {}",
                    det.area
                );
                return;
            };
            self.count_0_or_2 += 1;
            self.count_2 += 1;
            self.area_sum_2 += det.area;
            self.weights_2.push(weight);
        } else if det.class_id == CLASS_COMPANION {
            self.count_0_or_2 += 1;
        }
    }

    fn finish(self, image_id: String) -> ImageAggregate {
        let mean_area_class_2 = if self.count_2 > 0 {
            self.area_sum_2 / self.count_2 as f64
        } else {
            0.0
        };
        let mean_weight_class_2 = if self.weights_2.is_empty() {
            0.0
        } else {
            self.weights_2.iter().sum::<f64>() / self.weights_2.len() as f64
        };
        ImageAggregate {
            image_id,
            count_class_0_or_2: self.count_0_or_2,
            count_class_2: self.count_2,
            mean_area_class_2,
            individual_weights_class_2: self.weights_2,
            mean_weight_class_2,
        }
    }
}

pub fn aggregate_block(block: &ReportBlock) -> ImageAggregate {
    let mut acc = BlockAccumulator::default();
    for det in &block.detections {
        acc.observe(&block.image_name, det);
    }
    acc.finish(strip_extension(&block.image_name).to_string())
}

/// One aggregate per declared block, in declaration order. No dedup.
pub fn aggregate_report(report: &AreaReport) -> Vec<ImageAggregate> {
    report.blocks.iter().map(aggregate_block).collect()
}
