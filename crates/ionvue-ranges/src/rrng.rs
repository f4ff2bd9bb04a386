//! Imago/Cameca `.rrng` parser.
//!
//! An INI-like file with two sections. `[Ions]` declares the basic
//! constituents complex species may be formed from (it does not list the
//! file's species, which live entirely in `[Ranges]`). A range line is
//!
//! ```text
//! Range1=31.8372 32.2963 Vol:0.01521 Zn:1 Color:999999
//! ```
//!
//! with `Vol:`, basic-ion multiplicities, `Name:` and `Color:` fields in
//! any order after the mass pair. Real instrument output includes range
//! lines with neither basic-ion fields nor a `Name:`; those are skipped
//! rather than rejected. Missing colours get a random one.

use crate::error::{RangeError, Result};
use crate::rangefile::{IonEntry, MassRange, RangeFile};
use ionvue_core::ColourRGBAf;

fn random_colour() -> ColourRGBAf {
    ColourRGBAf::opaque(rand::random(), rand::random(), rand::random())
}

/// Strip a `#` comment and surrounding whitespace.
fn clean(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

enum Block {
    None,
    Ions,
    Ranges,
}

/// Find the species named `name`, creating it with `colour` when new.
fn find_or_add_ion(table: &mut RangeFile, name: &str, colour: ColourRGBAf) -> usize {
    if let Some(id) = table.ions.iter().position(|i| i.short_name == name) {
        id
    } else {
        table.ions.push(IonEntry {
            short_name: name.to_string(),
            long_name: name.to_string(),
            colour,
        });
        table.ions.len() - 1
    }
}

fn parse_range_line(value: &str, basic_ions: &[String], table: &mut RangeFile) -> Result<()> {
    let value = value.trim();
    let mut fields = value.split_whitespace();
    let lo_str = fields.next().ok_or(RangeError::Format)?;
    let hi_str = fields.next().ok_or(RangeError::Format)?;

    let mut colour = None;
    let mut formula = String::new();
    let mut name_field: Option<String> = None;

    for field in fields {
        let (key, val) = field.split_once(':').ok_or(RangeError::Format)?;
        match key.to_ascii_lowercase().as_str() {
            "vol" => {} // decomposition volume; not used by the classifier
            "name" => name_field = Some(val.to_string()),
            "color" => {
                if val.len() != 6 {
                    return Err(RangeError::Format);
                }
                colour =
                    Some(ColourRGBAf::from_hex(&val.to_ascii_lowercase())
                        .ok_or(RangeError::Format)?);
            }
            _ => {
                // A basic-ion multiplicity; the key must be declared.
                if !basic_ions.iter().any(|b| b == key) {
                    return Err(RangeError::Format);
                }
                let mult: usize = val.parse().map_err(|_| RangeError::Format)?;
                if mult == 0 {
                    return Err(RangeError::Format);
                }
                // Formula style: multiplicity elided when 1.
                formula.push_str(key);
                if mult != 1 {
                    formula.push_str(val);
                }
            }
        }
    }

    // Lines with no identity at all occur in real files; skip them.
    let species_name = if !formula.is_empty() {
        formula
    } else if let Some(name) = name_field {
        if name.is_empty() {
            return Err(RangeError::Format);
        }
        // The Name: field carries a leading charge-state digit prefix.
        let start = name
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(name.len());
        name[start..].to_string()
    } else {
        return Ok(());
    };

    let lo: f32 = lo_str.parse().map_err(|_| RangeError::Format)?;
    let hi: f32 = hi_str.parse().map_err(|_| RangeError::Format)?;

    let colour = colour.unwrap_or_else(random_colour);
    let ion = find_or_add_ion(table, &species_name, colour);
    table.ranges.push(MassRange { lo, hi, ion });
    Ok(())
}

pub(crate) fn parse(content: &str) -> Result<RangeFile> {
    let mut table = RangeFile::new();
    let mut block = Block::None;
    let mut seen_ion_block = false;
    let mut num_basic_ions = 0usize;
    let mut num_ranges = 0usize;
    let mut basic_ions: Vec<String> = Vec::new();

    for raw in content.lines() {
        let line = clean(raw);
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("[Ions]") {
            block = Block::Ions;
            continue;
        }
        if line.eq_ignore_ascii_case("[Ranges]") {
            block = Block::Ranges;
            continue;
        }

        match block {
            Block::None => {}
            Block::Ions => {
                let (key, value) = line.split_once('=').ok_or(RangeError::Format)?;
                let (key, value) = (key.trim(), value.trim());
                seen_ion_block = true;
                if key.eq_ignore_ascii_case("number") {
                    if num_basic_ions != 0 {
                        return Err(RangeError::Format);
                    }
                    num_basic_ions = value.parse().map_err(|_| RangeError::Format)?;
                    if num_basic_ions == 0 {
                        return Err(RangeError::Format);
                    }
                } else if key.len() > 3 && key[..3].eq_ignore_ascii_case("ion") {
                    basic_ions.push(value.to_string());
                    if basic_ions.len() > num_basic_ions {
                        return Err(RangeError::Format);
                    }
                } else {
                    return Err(RangeError::Format);
                }
            }
            Block::Ranges => {
                // The ranges section depends on the ion declarations; the
                // blocks are not independent.
                if !seen_ion_block {
                    return Err(RangeError::Format);
                }
                if line.len() <= 6 {
                    continue;
                }
                let (key, value) = line.split_once('=').ok_or(RangeError::Format)?;
                let key = key.trim();
                if key.len() >= 5 && key[..5].eq_ignore_ascii_case("numbe") {
                    if num_ranges != 0 {
                        return Err(RangeError::Format);
                    }
                    num_ranges = value.trim().parse().map_err(|_| RangeError::Format)?;
                    if num_ranges == 0 {
                        return Err(RangeError::Format);
                    }
                } else if key.len() >= 5 && key[..5].eq_ignore_ascii_case("range") {
                    parse_range_line(value, &basic_ions, &mut table)?;
                } else {
                    return Err(RangeError::Format);
                }
            }
        }
    }

    if !seen_ion_block || num_ranges == 0 || num_basic_ions == 0 {
        return Err(RangeError::Format);
    }
    if num_ranges != table.ranges.len() {
        return Err(RangeError::Format);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = "\
[Ions]
Number=2
Ion1=Zn
Ion2=Sb
[Ranges]
Number=3
Range1=31.8372 32.2963 Vol:0.01521 Zn:1 Color:999999
Range2=95.3100 95.5800 Vol:0.04542 Zn:1 Sb:1 Color:00ffff
Range3=47.5000 48.0000 Name:2ZnSb Color:ff0000
";

    #[test]
    fn test_basic_parse() {
        let t = parse(BASIC).unwrap();
        // Zn, ZnSb from the composed fields; the Name: row reuses ZnSb.
        assert_eq!(t.num_ions(), 2);
        assert_eq!(t.num_ranges(), 3);
        assert_eq!(t.ions()[0].short_name, "Zn");
        assert_eq!(t.ions()[1].short_name, "ZnSb");
        assert_eq!(t.ion_id(95.4), Some(1));
        assert_eq!(t.ion_id(47.7), Some(1));
    }

    #[test]
    fn test_fields_in_any_order() {
        let reordered = BASIC.replace(
            "Range1=31.8372 32.2963 Vol:0.01521 Zn:1 Color:999999",
            "Range1=31.8372 32.2963 Color:999999 Zn:1 Vol:0.01521",
        );
        let t = parse(&reordered).unwrap();
        assert_eq!(t.num_ranges(), 3);
        assert_eq!(t.ions()[0].colour.to_hex(), "999999");
    }

    #[test]
    fn test_multiplicity_in_formula() {
        let multi = "\
[Ions]
Number=1
Ion1=O
[Ranges]
Number=1
Range1=31.0 33.0 O:2 Color:0000ff
";
        let t = parse(multi).unwrap();
        assert_eq!(t.ions()[0].short_name, "O2");
    }

    #[test]
    fn test_identity_free_range_skipped_breaks_count() {
        // A range with neither ion fields nor Name: is silently ignored,
        // so the declared count no longer matches and the parse fails.
        let skipped = BASIC.replace(
            "Range3=47.5000 48.0000 Name:2ZnSb Color:ff0000",
            "Range3=47.5000 48.0000 Vol:0.04542",
        );
        assert_eq!(parse(&skipped), Err(RangeError::Format));
    }

    #[test]
    fn test_identity_free_range_skipped_with_matching_count() {
        let skipped = BASIC
            .replace("Number=3", "Number=2")
            .replace(
                "Range3=47.5000 48.0000 Name:2ZnSb Color:ff0000",
                "Range3=47.5000 48.0000 Vol:0.04542",
            );
        let t = parse(&skipped).unwrap();
        assert_eq!(t.num_ranges(), 2);
    }

    #[test]
    fn test_missing_colour_is_randomised() {
        let nocol = BASIC.replace(" Color:999999", "");
        let t = parse(&nocol).unwrap();
        assert!(t.ions()[0].colour.in_unit_range());
    }

    #[test]
    fn test_undeclared_basic_ion_rejected() {
        let bad = BASIC.replace("Zn:1 Color:999999", "Fe:1 Color:999999");
        assert_eq!(parse(&bad), Err(RangeError::Format));
    }

    #[test]
    fn test_missing_ion_block_rejected() {
        let no_ions = "\
[Ranges]
Number=1
Range1=31.0 33.0 Zn:1 Color:999999
";
        assert_eq!(parse(no_ions), Err(RangeError::Format));
    }
}
