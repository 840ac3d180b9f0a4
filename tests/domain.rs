use std::cmp::Ordering;

use catalog_mirror::catalog::{filter_by_theme, parse_catalog};
use catalog_mirror::domain::compare_markers;
use catalog_mirror::normalize::normalize;
use catalog_mirror::store::Store;

#[test]
fn normalize_examples() {
    assert_eq!(
        normalize("Hospital's Rating (Overall)"),
        "hospitals_rating_overall"
    );
    assert_eq!(normalize("  Multiple   Spaces "), "multiple_spaces");
    assert_eq!(normalize(""), "");
}

#[test]
fn normalize_is_idempotent() {
    for label in [
        "Hospital's Rating (Overall)",
        "Measure Start Date",
        "CMS Certification Number (CCN)",
        "  ",
    ] {
        let once = normalize(label);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn theme_filter_matches_case_insensitively_and_drops_untagged() {
    let body = r#"{"items":[
        {"id":"a","title":"A","lastModified":"2025-01-01","themes":"Hospitals, Quality"},
        {"id":"b","title":"B","lastModified":"2025-01-01"},
        {"id":"c","title":"C","lastModified":"2025-01-01","themes":"Dialysis facilities"},
        {"id":"d","title":"D","lastModified":"2025-01-01","theme":["Physician office visit costs","Hospitals"]}
    ]}"#;
    let filtered = filter_by_theme(parse_catalog(body).unwrap(), "hospitals");
    let ids = filtered.iter().map(|d| d.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["a", "d"]);
}

#[test]
fn duplicate_ids_are_dispatched_once() {
    let body = r#"{"items":[
        {"id":"a","title":"First","lastModified":"2025-01-01","themes":"Hospitals"},
        {"id":"a","title":"Second","lastModified":"2025-02-01","themes":"Hospitals"}
    ]}"#;
    let filtered = filter_by_theme(parse_catalog(body).unwrap(), "hospitals");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].title, "First");
}

#[test]
fn artifact_name_uses_id_and_normalized_title() {
    let body = r#"{"items":[{"id":"xubh-q36u","title":"Hospital General Information","lastModified":"2025-01-01","themes":"Hospitals"}]}"#;
    let descriptor = &parse_catalog(body).unwrap()[0];
    assert_eq!(
        Store::artifact_file_name(descriptor),
        "xubh-q36u_hospital_general_information.csv"
    );
}

#[test]
fn catalog_style_markers_order_correctly() {
    assert_eq!(compare_markers("2024-12-31", "2025-01-01"), Ordering::Less);
    assert_eq!(
        compare_markers("2025-01-01T00:00:00.000Z", "2025-01-01"),
        Ordering::Equal
    );
}
