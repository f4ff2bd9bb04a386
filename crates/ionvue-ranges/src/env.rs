//! Cameca `.env` parser.
//!
//! No public specification exists for the environment format; this is a
//! best-effort reader built from example files. Structure, after `#`
//! comments and blank lines are dropped:
//!
//! ```text
//! I R
//! <name> r g b        (I lines, channels in [0,1], name alnum-or-period)
//! <name> lo hi 1.0 1.0  (range lines, 5 fields, name declared above)
//! ... trailing sections ...
//! ```
//!
//! The first 5-field line both ends the name block and is the first range
//! line. The range block ends at the first non-5-field line; a file that
//! ends during the range block is rejected, since real environment files
//! always carry sections after the ranges.

use crate::error::{RangeError, Result};
use crate::rangefile::{IonEntry, MassRange, RangeFile};
use ionvue_core::ColourRGBAf;

fn clean(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

fn valid_env_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
}

pub(crate) fn parse(content: &str) -> Result<RangeFile> {
    let mut table = RangeFile::new();
    let mut have_counts = false;
    let mut in_name_block = true;
    let mut beyond_ranges = false;

    let mut lines = content.lines();
    for raw in &mut lines {
        let line = clean(raw);
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();

        if !have_counts {
            if fields.len() != 2 {
                return Err(RangeError::Format);
            }
            let _num_ions: usize = fields[0].parse().map_err(|_| RangeError::Format)?;
            let _num_ranges: usize = fields[1].parse().map_err(|_| RangeError::Format)?;
            have_counts = true;
            continue;
        }

        if in_name_block {
            match fields.len() {
                4 => {
                    if !valid_env_name(fields[0]) {
                        return Err(RangeError::Format);
                    }
                    let mut rgb = [0.0f32; 3];
                    for (c, f) in rgb.iter_mut().zip(&fields[1..4]) {
                        *c = f.parse().map_err(|_| RangeError::Format)?;
                        if !(0.0..=1.0).contains(c) {
                            return Err(RangeError::Format);
                        }
                    }
                    // Only one name is available; it serves as both.
                    table.ions.push(IonEntry {
                        short_name: fields[0].to_string(),
                        long_name: fields[0].to_string(),
                        colour: ColourRGBAf::opaque(rgb[0], rgb[1], rgb[2]),
                    });
                    continue;
                }
                5 => in_name_block = false, // falls through as a range line
                _ => return Err(RangeError::Format),
            }
        }

        if fields.len() == 5 {
            let ion = table
                .ions
                .iter()
                .position(|i| i.short_name == fields[0])
                .ok_or(RangeError::Format)?;
            let lo: f32 = fields[1].parse().map_err(|_| RangeError::Format)?;
            let hi: f32 = fields[2].parse().map_err(|_| RangeError::Format)?;
            table.ranges.push(MassRange { lo, hi, ion });
        } else {
            beyond_ranges = true;
            break;
        }
    }

    // Environment files continue past the range table; hitting EOF first
    // means this was not really an env file.
    if !beyond_ranges {
        return Err(RangeError::Format);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = "\
# instrument environment
2 2
Fe 0.5 0.5 0.5
Cu 1.0 0.5 0.0
Fe 26.0 29.0 1.0 1.0
Cu 31.0 33.0 1.0 1.0
detector geometry follows
";

    #[test]
    fn test_basic_parse() {
        let t = parse(BASIC).unwrap();
        assert_eq!(t.num_ions(), 2);
        assert_eq!(t.num_ranges(), 2);
        assert_eq!(t.ion_id(27.5), Some(0));
        assert_eq!(t.ion_id(32.0), Some(1));
    }

    #[test]
    fn test_colour_out_of_unit_range_rejected() {
        let bad = BASIC.replace("Fe 0.5 0.5 0.5", "Fe 200 0.5 0.5");
        assert_eq!(parse(&bad), Err(RangeError::Format));
    }

    #[test]
    fn test_undeclared_range_name_rejected() {
        let bad = BASIC.replace("Cu 31.0 33.0 1.0 1.0", "Au 31.0 33.0 1.0 1.0");
        assert_eq!(parse(&bad), Err(RangeError::Format));
    }

    #[test]
    fn test_truncated_after_ranges_rejected() {
        let truncated = BASIC.replace("detector geometry follows\n", "");
        assert_eq!(parse(&truncated), Err(RangeError::Format));
    }

    #[test]
    fn test_invalid_name_characters_rejected() {
        let bad = BASIC.replace("Fe 0.5 0.5 0.5", "F@e 0.5 0.5 0.5");
        assert_eq!(parse(&bad), Err(RangeError::Format));
    }
}
