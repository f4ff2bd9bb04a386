//! Range-file writers.
//!
//! Each writer produces output its own reader accepts, preserving the
//! (lo, hi, short name, colour) multiset through a round trip.

use crate::error::{RangeError, Result};
use crate::rangefile::{RangeFile, RangeFormat};
use std::fmt::Write as _;
use std::path::Path;

impl RangeFile {
    /// Serialise in the given dialect.
    pub fn to_string_as(&self, format: RangeFormat) -> String {
        match format {
            RangeFormat::Ornl => self.write_ornl(),
            RangeFormat::Rrng => self.write_rrng(),
            RangeFormat::Env => self.write_env(),
        }
    }

    pub fn write_file(&self, path: &Path, format: RangeFormat) -> Result<()> {
        std::fs::write(path, self.to_string_as(format))
            .map_err(|e| RangeError::Open(format!("{}: {e}", path.display())))
    }

    fn write_ornl(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", self.ions.len(), self.ranges.len());
        for ion in &self.ions {
            let _ = writeln!(out, "{}", ion.long_name);
            let _ = writeln!(
                out,
                "{} {} {} {}",
                ion.short_name, ion.colour.r, ion.colour.g, ion.colour.b
            );
        }
        out.push_str("-------------");
        for ion in &self.ions {
            let _ = write!(out, " {}", ion.short_name);
        }
        out.push('\n');
        for range in &self.ranges {
            let _ = write!(out, ". {} {}", range.lo, range.hi);
            for col in 0..self.ions.len() {
                let _ = write!(out, " {}", usize::from(col == range.ion));
            }
            out.push('\n');
        }
        out
    }

    fn write_rrng(&self) -> String {
        let mut out = String::new();
        out.push_str("[Ions]\n");
        let _ = writeln!(out, "Number={}", self.ions.len());
        for (i, ion) in self.ions.iter().enumerate() {
            let _ = writeln!(out, "Ion{}={}", i + 1, ion.short_name);
        }
        out.push_str("[Ranges]\n");
        let _ = writeln!(out, "Number={}", self.ranges.len());
        for (i, range) in self.ranges.iter().enumerate() {
            let ion = &self.ions[range.ion];
            let _ = writeln!(
                out,
                "Range{}={} {} {}:1 Color:{}",
                i + 1,
                range.lo,
                range.hi,
                ion.short_name,
                ion.colour.to_hex()
            );
        }
        out
    }

    fn write_env(&self) -> String {
        let mut out = String::from("# written by ionvue\n");
        let _ = writeln!(out, "{} {}", self.ions.len(), self.ranges.len());
        for ion in &self.ions {
            let _ = writeln!(
                out,
                "{} {} {} {}",
                ion.short_name, ion.colour.r, ion.colour.g, ion.colour.b
            );
        }
        for range in &self.ranges {
            let _ = writeln!(
                out,
                "{} {} {}    1.0 1.0",
                self.ions[range.ion].short_name, range.lo, range.hi
            );
        }
        // Trailing section marker: the env reader requires content after
        // the range table.
        out.push_str("end\n");
        out
    }
}
