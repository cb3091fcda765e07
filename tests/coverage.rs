use pagelens::coverage::{CoverageRange, CoverageType, CoverageUpdate};
use pagelens::export::export_report;
use pagelens::{CoverageAggregator, CoverageFilter, CoverageMonitor, CoverageSummary};
use std::fs::File;

fn batch(json: &str) -> Vec<CoverageUpdate> {
    serde_json::from_str(json).expect("valid batch")
}

#[test]
fn test_repeated_url_reflects_latest_batch() {
    let mut monitor = CoverageMonitor::default();

    monitor.on_update_batch(&batch(
        r#"[{"url": "https://site.test/app.js", "typeFlags": 2, "totalSize": 100, "unusedSize": 40}]"#,
    ));
    let summary = monitor.on_update_batch(&batch(
        r#"[{"url": "https://site.test/app.js", "typeFlags": 2, "totalSize": 100, "unusedSize": 10}]"#,
    ));

    assert_eq!(
        summary,
        CoverageSummary {
            used_bytes: 90,
            total_bytes: 100,
            unused_bytes: 10,
            percent_used: 90,
        }
    );
}

#[test]
fn test_extension_bindings_never_counted() {
    let updates = batch(
        r#"[
            {"url": "extensions::foo", "typeFlags": 2, "totalSize": 1000, "unusedSize": 0},
            {"url": "extensions::foo/bar.js", "typeFlags": 6, "isContentScript": true, "totalSize": 10, "unusedSize": 5}
        ]"#,
    );

    let filters = [
        CoverageFilter::default(),
        CoverageFilter::default().with_content_scripts(true),
        CoverageFilter::default().with_type_mask(CoverageType::JAVASCRIPT),
        CoverageFilter::default().with_text("foo").unwrap(),
    ];

    let mut aggregator = CoverageAggregator::new();
    aggregator.apply_update_batch(&updates);
    for filter in &filters {
        assert_eq!(aggregator.summarize(filter), CoverageSummary::default());
        assert!(aggregator.visible_entries(filter).is_empty());
    }
}

#[test]
fn test_batches_in_any_order_converge_per_url() {
    let first = batch(
        r#"[
            {"url": "https://site.test/a.css", "typeFlags": 1, "totalSize": 400, "unusedSize": 300},
            {"url": "https://site.test/b.js", "typeFlags": 4, "totalSize": 600, "unusedSize": 100}
        ]"#,
    );
    let second = batch(
        r#"[{"url": "https://site.test/c.js", "typeFlags": 2, "totalSize": 1000, "unusedSize": 500}]"#,
    );

    let mut forward = CoverageAggregator::new();
    forward.apply_update_batch(&first);
    forward.apply_update_batch(&second);

    let mut backward = CoverageAggregator::new();
    backward.apply_update_batch(&second);
    backward.apply_update_batch(&first);

    let filter = CoverageFilter::default();
    assert_eq!(forward.summarize(&filter), backward.summarize(&filter));
    assert_eq!(forward.summarize(&filter).total_bytes, 2000);
    assert_eq!(forward.summarize(&filter).percent_used, 55);
}

#[test]
fn test_navigation_clears_records() {
    let mut monitor = CoverageMonitor::new(CoverageFilter::default().with_type_mask(CoverageType::CSS));
    monitor.on_update_batch(&batch(
        r#"[{"url": "https://site.test/a.css", "typeFlags": 1, "totalSize": 10, "unusedSize": 2}]"#,
    ));
    assert_eq!(monitor.summary().total_bytes, 10);

    let summary = monitor.clear();

    assert_eq!(summary, CoverageSummary::default());
    assert!(monitor.aggregator().is_empty());
    assert_eq!(monitor.filter().type_mask, CoverageType::CSS);
}

#[test]
fn test_export_to_file() {
    let mut aggregator = CoverageAggregator::new();
    aggregator.apply_update_batch(&[CoverageUpdate {
        url: "https://site.test/app.js".to_string(),
        type_flags: CoverageType::JAVASCRIPT,
        is_content_script: false,
        total_size: 100,
        unused_size: 60,
        ranges: vec![CoverageRange { start: 0, end: 25 }, CoverageRange { start: 50, end: 65 }],
    }]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Coverage-test.json");
    let written = export_report(&aggregator, File::create(&path).unwrap()).unwrap();

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, 1);
    assert_eq!(
        exported,
        serde_json::json!([
            {"url": "https://site.test/app.js", "ranges": [{"start": 0, "end": 25}, {"start": 50, "end": 65}]}
        ])
    );
}
