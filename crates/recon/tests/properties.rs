// Property-based tests for area, weight, aggregation and reconciliation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashSet;

use chrono::NaiveDate;
use proptest::prelude::*;

use gamba_recon::aggregate::aggregate_block;
use gamba_recon::engine::{build_image_sales, reconcile};
use gamba_recon::ledger::{clean_ledger, load_ledger};
use gamba_recon::model::{ImageAggregate, MetadataRow};
use gamba_recon::polygon::contour_area;
use gamba_recon::report::{Detection, ReportBlock};
use gamba_recon::weight::{estimate_weight, INTERCEPT};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_vertices() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((0i32..=640, 0i32..=640), 3..12)
}

fn arb_detection() -> impl Strategy<Value = Detection> {
    (0i64..4, prop_oneof![3 => 1.0f64..5000.0, 1 => Just(0.0)])
        .prop_map(|(class_id, area)| Detection { class_id, area })
}

/// Naive shoelace in f64, the reference the integer version must agree with.
fn shoelace(vertices: &[(i32, i32)]) -> f64 {
    let n = vertices.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x0, y0) = vertices[i];
        let (x1, y1) = vertices[(i + 1) % n];
        sum += x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
    }
    sum.abs() / 2.0
}

// ---------------------------------------------------------------------------
// Polygon area
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn area_matches_shoelace(vertices in arb_vertices()) {
        prop_assert!((contour_area(&vertices) - shoelace(&vertices)).abs() < 1e-6);
    }

    #[test]
    fn area_ignores_rotation_and_direction(vertices in arb_vertices(), shift in 0usize..12) {
        let area = contour_area(&vertices);
        let mut rotated = vertices.clone();
        rotated.rotate_left(shift % vertices.len());
        prop_assert_eq!(contour_area(&rotated), area);
        rotated.reverse();
        prop_assert_eq!(contour_area(&rotated), area);
    }

    #[test]
    fn collinear_area_is_zero(x0 in 0i32..640, dx in -5i32..5, dy in -5i32..5, n in 3usize..8) {
        let vertices: Vec<(i32, i32)> = (0..n as i32).map(|k| (x0 + k * dx, 10 + k * dy)).collect();
        prop_assert_eq!(contour_area(&vertices), 0.0);
    }
}

// ---------------------------------------------------------------------------
// Weight
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn weight_increases_with_area(a in 0.5f64..100_000.0, delta in 0.5f64..10_000.0) {
        let small = estimate_weight(a).unwrap();
        let large = estimate_weight(a + delta).unwrap();
        prop_assert!(large > small);
    }

    #[test]
    fn non_positive_area_has_no_weight(a in -1000.0f64..=0.0) {
        prop_assert!(estimate_weight(a).is_none());
    }
}

#[test]
fn unit_area_weighs_exp_intercept() {
    assert_eq!(estimate_weight(1.0), Some(INTERCEPT.exp()));
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn aggregate_counts_independent_of_order(
        detections in prop::collection::vec(arb_detection(), 0..20),
        seed in any::<u64>(),
    ) {
        let mut shuffled = detections.clone();
        // deterministic permutation from the seed
        let n = shuffled.len();
        if n > 1 {
            let mut s = seed;
            for i in (1..n).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                shuffled.swap(i, (s >> 33) as usize % (i + 1));
            }
        }

        let a = aggregate_block(&ReportBlock { image_name: "IMG.txt".into(), detections });
        let b = aggregate_block(&ReportBlock { image_name: "IMG.txt".into(), detections: shuffled });

        prop_assert_eq!(a.count_class_0_or_2, b.count_class_0_or_2);
        prop_assert_eq!(a.count_class_2, b.count_class_2);
        prop_assert!((a.mean_area_class_2 - b.mean_area_class_2).abs() < 1e-6);
        prop_assert!((a.mean_weight_class_2 - b.mean_weight_class_2).abs() < 1e-9);
        prop_assert!(a.count_class_0_or_2 >= a.count_class_2);
        prop_assert_eq!(a.mean_weight_class_2 == 0.0, a.individual_weights_class_2.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Reconciliation partition
// ---------------------------------------------------------------------------

/// (sale id, weight in kg, has ledger row) per image.
fn arb_day() -> impl Strategy<Value = Vec<(u8, u8, bool)>> {
    prop::collection::vec((1u8..6, 1u8..4, any::<bool>()), 1..12)
}

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn merged_and_unmatched_partition_the_universe(day in arb_day()) {
        let date = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
        let mut aggregates = Vec::new();
        let mut metadata = Vec::new();
        let mut ledger_csv = String::from("FECHA,NUMVENTA,PESONETO,IMPORTE,NUMENVAS\n");

        for (i, (sale_id, kg, in_ledger)) in day.iter().enumerate() {
            let image_id = format!("OPMM_Subasta_2025-05-30_{i:02}_00_00.000_Imedea");
            aggregates.push(ImageAggregate {
                image_id: image_id.clone(),
                count_class_0_or_2: 1,
                count_class_2: 1,
                mean_area_class_2: 500.0,
                individual_weights_class_2: vec![10.0],
                mean_weight_class_2: 10.0,
            });
            metadata.push(MetadataRow {
                image_id,
                declared_weight: f64::from(*kg),
                sale_id: sale_id.to_string(),
            });
            if *in_ledger {
                ledger_csv.push_str(&format!("2025-05-30 05:{i:02}:00,{sale_id},{kg}.0,{i}.5,1\n"));
            }
        }

        let sales = build_image_sales(&aggregates, &metadata).rows;
        let ledger = clean_ledger(load_ledger("ARA.csv", &ledger_csv).unwrap().records);
        let out = reconcile(date, &sales, &ledger);

        let merged: HashSet<&str> = out.merged.iter().map(|r| r.image_id()).collect();
        let unmatched: HashSet<&str> = out.unmatched.iter().map(|d| d.sale.image_id.as_str()).collect();
        let universe: HashSet<&str> = out.universe.iter().map(|d| d.sale.image_id.as_str()).collect();

        prop_assert!(merged.is_disjoint(&unmatched));
        let union: HashSet<&str> = merged.union(&unmatched).copied().collect();
        prop_assert_eq!(union, universe);
        for dup in &out.duplicates {
            prop_assert!(out.merged.iter().filter(|r| r.image_id() == dup.record.image_id()).count() > 1);
        }
    }
}
