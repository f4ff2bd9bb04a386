//! Delimited-text loader tests: header skip, sampling, error paths.

use ionvue_core::{RefreshContext, RefreshError};
use ionvue_io::{load_text, load_text_sampled};
use std::io::Write;
use std::path::PathBuf;

fn write_fixture(lines: &[String]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    let mut f = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    (dir, path)
}

#[test]
fn test_text_load_thousand_lines_with_header() {
    // "x y\tz\tm/c" style mixed delimiters, uniform-random values.
    let mut lines = vec![
        "# atom probe export".to_string(),
        "x y z mc".to_string(),
    ];
    let mut seed = 0x2545f491u64;
    for _ in 0..1000 {
        // xorshift; values in [0, 1)
        let mut nxt = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % 10000) as f32 / 10000.0
        };
        lines.push(format!("{} {}\t{}\t{}", nxt(), nxt(), nxt(), nxt()));
    }
    let (_dir, path) = write_fixture(&lines);

    let ions = load_text(&path, &[0, 1, 2, 3], &RefreshContext::new()).unwrap();
    assert_eq!(ions.len(), 1000);
    assert!(ions.iter().all(|i| !i.has_nan()));
}

#[test]
fn test_text_header_only_rejected() {
    let (_dir, path) = write_fixture(&[
        "just a header".to_string(),
        "another line".to_string(),
    ]);
    let err = load_text(&path, &[0, 1, 2, 3], &RefreshContext::new()).unwrap_err();
    assert_eq!(err, RefreshError::HeaderOnly);
}

#[test]
fn test_text_bad_field_mid_file_is_format_error() {
    let (_dir, path) = write_fixture(&[
        "1 2 3 4".to_string(),
        "5 6 seven 8".to_string(),
    ]);
    let err = load_text(&path, &[0, 1, 2, 3], &RefreshContext::new()).unwrap_err();
    assert_eq!(err, RefreshError::Format);
}

#[test]
fn test_text_short_line_is_field_count_error() {
    let (_dir, path) = write_fixture(&["1 2 3 4".to_string(), "5 6".to_string()]);
    let err = load_text(&path, &[0, 1, 2, 3], &RefreshContext::new()).unwrap_err();
    assert_eq!(err, RefreshError::FieldCount);
}

#[test]
fn test_text_column_selection() {
    let (_dir, path) = write_fixture(&["9 1 2 3 4".to_string()]);
    // skip the leading column
    let ions = load_text(&path, &[1, 2, 3, 4], &RefreshContext::new()).unwrap();
    assert_eq!(ions.len(), 1);
    assert_eq!(ions[0].pos.x, 1.0);
    assert_eq!(ions[0].mass_to_charge, 4.0);
}

#[test]
fn test_text_sampled_load() {
    let mut lines = vec!["header line here".to_string()];
    for i in 0..500 {
        lines.push(format!("{i} {i} {i} {i}"));
    }
    let (_dir, path) = write_fixture(&lines);

    let ions = load_text_sampled(&path, &[0, 1, 2, 3], 50, &RefreshContext::new()).unwrap();
    assert_eq!(ions.len(), 50);
    for ion in &ions {
        assert_eq!(ion.pos.x, ion.mass_to_charge);
        assert!(ion.mass_to_charge >= 0.0 && ion.mass_to_charge < 500.0);
    }

    // limit >= total falls back to the full load
    let all = load_text_sampled(&path, &[0, 1, 2, 3], 10_000, &RefreshContext::new()).unwrap();
    assert_eq!(all.len(), 500);
}
