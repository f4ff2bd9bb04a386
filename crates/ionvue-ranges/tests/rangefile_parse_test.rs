//! Whole-file parse tests across the three dialects, including the
//! fixture shapes used for acceptance: a 10-ion/6-range `.rng`, an
//! 8-ion/42-range `.rrng`, and a 1-ion/1-range `.env`.

use ionvue_ranges::{RangeFile, RangeFormat};
use std::fmt::Write as _;
use std::path::PathBuf;

fn write_fixture(name: &str, content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

fn ten_ion_rng() -> String {
    let ions = [
        ("Hydrogen", "H"),
        ("Carbon", "C"),
        ("Oxygen", "O"),
        ("Aluminium", "Al"),
        ("Silicon", "Si"),
        ("Titanium", "Ti"),
        ("Iron", "Fe"),
        ("Nickel", "Ni"),
        ("Copper", "Cu"),
        ("Gold", "Au"),
    ];
    let mut out = String::from("10 6\n");
    for (i, (long, short)) in ions.iter().enumerate() {
        let _ = writeln!(out, "{long}");
        let _ = writeln!(out, "{short} {} 0.25 0.75", i as f32 / 10.0);
    }
    out.push_str("-------------");
    for (_, short) in &ions {
        let _ = write!(out, " {short}");
    }
    out.push('\n');
    // Six one-hot ranges over six different ions.
    for (row, ion_col) in [0usize, 1, 2, 6, 8, 9].iter().enumerate() {
        let lo = 10.0 + row as f32 * 5.0;
        let _ = write!(out, ". {lo} {}", lo + 2.0);
        for col in 0..10 {
            let _ = write!(out, " {}", usize::from(col == *ion_col));
        }
        out.push('\n');
    }
    out
}

fn eight_ion_rrng() -> String {
    let ions = ["H", "C", "O", "Al", "Si", "Fe", "Ni", "Cu"];
    let mut out = String::from("[Ions]\n");
    let _ = writeln!(out, "Number={}", ions.len());
    for (i, ion) in ions.iter().enumerate() {
        let _ = writeln!(out, "Ion{}={ion}", i + 1);
    }
    out.push_str("[Ranges]\nNumber=42\n");
    for i in 0..42 {
        let ion = ions[i % ions.len()];
        let lo = 5.0 + i as f32 * 3.0;
        let _ = writeln!(
            out,
            "Range{}={lo} {} Vol:0.01 {ion}:1 Color:aa00{:02x}",
            i + 1,
            lo + 1.5,
            (i * 6) % 256
        );
    }
    out
}

const ONE_ION_ENV: &str = "\
# environment
1 1
Fe 0.5 0.25 0.125
Fe 26.0 29.0 1.0 1.0
trailing section
";

#[test]
fn test_rng_fixture_counts() {
    let (_dir, path) = write_fixture("test1.rng", &ten_ion_rng());
    let table = RangeFile::open(&path, RangeFormat::Ornl).unwrap();
    assert_eq!(table.num_ions(), 10);
    assert_eq!(table.num_ranges(), 6);
    assert!(table.is_self_consistent());
}

#[test]
fn test_rrng_fixture_counts() {
    let (_dir, path) = write_fixture("test3.rrng", &eight_ion_rrng());
    let table = RangeFile::open(&path, RangeFormat::Rrng).unwrap();
    assert_eq!(table.num_ions(), 8);
    assert_eq!(table.num_ranges(), 42);
    assert!(table.is_self_consistent());
}

#[test]
fn test_env_fixture_counts() {
    let (_dir, path) = write_fixture("test1.env", ONE_ION_ENV);
    let table = RangeFile::open(&path, RangeFormat::Env).unwrap();
    assert_eq!(table.num_ions(), 1);
    assert_eq!(table.num_ranges(), 1);
    assert_eq!(table.ion_id(27.0), Some(0));
}

#[test]
fn test_guess_format_by_extension() {
    let (_dir, path) = write_fixture("test3.rrng", &eight_ion_rrng());
    let (table, format) = RangeFile::open_guess_format(&path).unwrap();
    assert_eq!(format, RangeFormat::Rrng);
    assert_eq!(table.num_ranges(), 42);
}

#[test]
fn test_guess_format_brute_force_on_wrong_extension() {
    // RRNG content behind a .rng extension: the ORNL parse fails and the
    // brute-force pass must find the right dialect.
    let (_dir, path) = write_fixture("mislabeled.rng", &eight_ion_rrng());
    let (table, format) = RangeFile::open_guess_format(&path).unwrap();
    assert_eq!(format, RangeFormat::Rrng);
    assert_eq!(table.num_ions(), 8);
}

#[test]
fn test_guess_format_total_failure_reports_extension_error() {
    let (_dir, path) = write_fixture("garbage.env", "not a range file at all\n");
    assert!(RangeFile::open_guess_format(&path).is_err());
}

#[test]
fn test_overlapping_ranges_fail_consistency_gate() {
    let overlapping = "\
[Ions]
Number=1
Ion1=Fe
[Ranges]
Number=2
Range1=10.0 20.0 Fe:1 Color:ff0000
Range2=15.0 25.0 Fe:1 Color:ff0000
";
    let (_dir, path) = write_fixture("bad.rrng", overlapping);
    let err = RangeFile::open(&path, RangeFormat::Rrng).unwrap_err();
    assert_eq!(err, ionvue_ranges::RangeError::DataInconsistent);
}
