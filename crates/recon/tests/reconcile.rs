//! Report text in, reconciliation out, through the public engine API.

use chrono::NaiveDate;

use gamba_recon::aggregate::aggregate_report;
use gamba_recon::engine::{build_image_sales, reconcile};
use gamba_recon::ledger::{clean_ledger, load_ledger};
use gamba_recon::model::MetadataRow;
use gamba_recon::report::parse_area_report;
use gamba_recon::weight::estimate_weight;

const REPORT: &str = "\
Imagen: OPMM_Subasta_2025-05-30_04_55_15.945_Imedea.txt
Identificador: 2, Area: 500.0
Identificador: 0, Area: 120.0
Identificador: 2, Area: 600.0

Imagen: OPMM_Subasta_2025-05-30_05_01_00.000_Imedea.txt
Identificador: 0, Area: 80.0

Imagen: OPMM_Subasta_2025-05-30_05_02_00.000_Imedea.txt
Identificador: 2, Area: 700.0
Identificador: x, Area: 1.0

Imagen: OPMM_Subasta_2025-05-30_05_03_00.000_Imedea.txt
Identificador: 2, Area: 400.0
";

const LEDGER: &str = "\
FECHA,NUMVENTA,PESONETO,IMPORTE,NUMENVAS,COMPRADOR
2025-05-30 05:10:00,123,450.0,3150.0,1,B1
2025-05-30 05:20:00,124,12.5,90.0,1,B2
2025-05-30 05:21:00,124,12.5,95.0,1,B3
2025-05-30 05:30:00,125,8.0,40.0,1,B4
2025-05-30 05:45:00,125,-8.0,-40.0,-1,B4
2025-05-31 05:10:00,123,450.0,3150.0,1,B1
";

fn meta(image: &str, weight: f64, sale_id: &str) -> MetadataRow {
    MetadataRow {
        image_id: image.into(),
        declared_weight: weight,
        sale_id: sale_id.into(),
    }
}

#[test]
fn report_to_reconciliation() {
    let parsed = parse_area_report("areas_resultados_2025-05-30.txt", REPORT);
    assert_eq!(parsed.skipped.len(), 1);

    let aggregates = aggregate_report(&parsed.records);
    let ids: Vec<&str> = aggregates.iter().map(|a| a.image_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "OPMM_Subasta_2025-05-30_04_55_15.945_Imedea",
            "OPMM_Subasta_2025-05-30_05_01_00.000_Imedea",
            "OPMM_Subasta_2025-05-30_05_02_00.000_Imedea",
            "OPMM_Subasta_2025-05-30_05_03_00.000_Imedea",
        ]
    );
    let first = &aggregates[0];
    assert_eq!(first.count_class_0_or_2, 3);
    assert_eq!(first.count_class_2, 2);
    assert_eq!(first.mean_area_class_2, 550.0);
    let expected = (estimate_weight(500.0).unwrap() + estimate_weight(600.0).unwrap()) / 2.0;
    assert!((first.mean_weight_class_2 - expected).abs() < 1e-12);
    assert_eq!(aggregates[1].mean_weight_class_2, 0.0);

    let metadata = vec![
        meta(&aggregates[0].image_id, 450.0, "123"),
        meta(&aggregates[1].image_id, 3.0, "200"),
        meta(&aggregates[2].image_id, 12.5, "124"),
        meta(&aggregates[3].image_id, 8.0, "125"),
    ];
    let table = build_image_sales(&aggregates, &metadata);
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.without_detections, 1);

    let ledger = clean_ledger(load_ledger("ARA.csv", LEDGER).unwrap().records);
    assert_eq!(ledger.cancelled.len(), 2);

    let date = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
    let out = reconcile(date, &table.rows, &ledger);

    // 123 once, 124 twice (ambiguous key), 125 cancelled
    assert_eq!(out.merged.len(), 3);
    assert_eq!(out.duplicates.len(), 2);
    assert!(out
        .duplicates
        .iter()
        .all(|d| d.record.image_id() == "OPMM_Subasta_2025-05-30_05_02_00.000_Imedea"));
    let positions: Vec<usize> = out.duplicates.iter().map(|d| d.position).collect();
    assert_eq!(positions, vec![2, 3]);

    assert_eq!(out.unmatched.len(), 1);
    assert_eq!(out.unmatched[0].sale.image_id, "OPMM_Subasta_2025-05-30_05_03_00.000_Imedea");

    let matched = &out.merged[0];
    assert_eq!(matched.ledger.sale_id, 123);
    assert_eq!(matched.estimated_shrimp_count, 450.0 / (first.mean_weight_class_2 / 1000.0));

    let s = &out.summary;
    assert_eq!((s.universe_rows, s.merged_rows, s.duplicate_rows, s.duplicate_images, s.unmatched_rows), (3, 3, 2, 1, 1));
    assert_eq!(s.ledger_sales, 3);

    let json = serde_json::to_value(s).unwrap();
    assert_eq!(json["date"], "2025-05-30");
    assert_eq!(json["merged_rows"], 3);
}
