//! ORNL `.rng` parser.
//!
//! No standard exists for this format; the reader is built to accommodate
//! the dialects seen in the wild (classic Miller-style files plus the
//! cluster-ion variant some packages emit). Layout:
//!
//! ```text
//! I R
//! LongName1
//! Short1 r g b [trailing junk]
//! ...
//! ------------- [Short1 Short2 ...]
//! [.] lo hi c1 c2 ... cI
//! ```
//!
//! The column headings on the separator line are a comment per the format
//! description; when they disagree with the declaration order a warning is
//! recorded and the declaration order wins. Rows whose frequency entries
//! sum to more than one describe composed ions: they are matched against
//! the declared ions whose own column is everywhere zero, and rows that
//! cannot be matched get a synthesised species with a flattened name and a
//! random colour.

use crate::error::{RangeError, Result};
use crate::rangefile::{IonEntry, MassRange, RangeFile};
use crate::species::{match_composed_name, NameFragment};
use ionvue_core::ColourRGBAf;
use std::collections::BTreeMap;

/// Whitespace token cursor that can also discard to end of line, matching
/// the scanf-then-gobble reading style the format needs.
struct TokenCursor<'a> {
    lines: Vec<Vec<&'a str>>,
    line: usize,
    tok: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            lines: content
                .lines()
                .map(|l| l.split_whitespace().collect())
                .collect(),
            line: 0,
            tok: 0,
        }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        while self.line < self.lines.len() {
            if self.tok < self.lines[self.line].len() {
                let t = self.lines[self.line][self.tok];
                self.tok += 1;
                return Some(t);
            }
            self.line += 1;
            self.tok = 0;
        }
        None
    }

    /// Drop any remaining tokens on the current line.
    fn skip_rest_of_line(&mut self) {
        if self.line < self.lines.len() {
            self.line += 1;
            self.tok = 0;
        }
    }

    /// The next whole line's tokens, consuming it.
    fn next_line(&mut self) -> Option<&[&'a str]> {
        // Finish a partially consumed line first.
        if self.line < self.lines.len() && self.tok > 0 {
            self.line += 1;
            self.tok = 0;
        }
        if self.line >= self.lines.len() {
            return None;
        }
        let l = &self.lines[self.line];
        self.line += 1;
        self.tok = 0;
        Some(l)
    }
}

fn random_colour() -> ColourRGBAf {
    ColourRGBAf::opaque(rand::random(), rand::random(), rand::random())
}

pub(crate) fn parse(content: &str) -> Result<RangeFile> {
    let mut cur = TokenCursor::new(content);

    let num_ions: usize = cur
        .next_token()
        .and_then(|t| t.parse().ok())
        .ok_or(RangeError::FormatHeader)?;
    let num_ranges: usize = cur
        .next_token()
        .and_then(|t| t.parse().ok())
        .ok_or(RangeError::FormatHeader)?;
    if num_ions == 0 || num_ranges == 0 {
        return Err(RangeError::Empty);
    }

    let mut table = RangeFile::new();

    // Ion declaration block: long name, short name, colour triple, then
    // anything else on the colour line is junk some programs append.
    for _ in 0..num_ions {
        let long = cur.next_token().ok_or(RangeError::FormatLongName)?;
        let short = cur.next_token().ok_or(RangeError::FormatShortName)?;
        let mut rgb = [0.0f32; 3];
        for c in &mut rgb {
            *c = cur
                .next_token()
                .and_then(|t| t.parse().ok())
                .ok_or(RangeError::FormatColour)?;
        }
        cur.skip_rest_of_line();
        table.ions.push(IonEntry {
            short_name: short.to_string(),
            long_name: long.to_string(),
            colour: ColourRGBAf::opaque(rgb[0], rgb[1], rgb[2]),
        });
    }

    // Dashed separator, optionally carrying column headings.
    let sep = cur.next_line().ok_or(RangeError::FormatTableSeparator)?;
    if sep.first().map_or(true, |t| !t.starts_with('-')) {
        return Err(RangeError::FormatTableSeparator);
    }
    if sep.len() > 1 {
        if sep.len() - 1 != num_ions {
            return Err(RangeError::FormatTableSeparator);
        }
        let order_matches = sep[1..]
            .iter()
            .zip(table.ions.iter())
            .all(|(h, ion)| *h == ion.short_name);
        if !order_matches {
            table.warnings.push(
                "Range headings do not match the order of the declared ion names. \
                 The declaration order is used when reading the range table; the \
                 heading row is a comment in this format. Check that the \
                 range-species associations match what you expect."
                    .to_string(),
            );
        }
    }

    // Range table rows: optional marker token, mass pair, one frequency
    // entry per declared ion.
    let mut mass_pairs = Vec::with_capacity(num_ranges);
    let mut freq = vec![0usize; num_ranges * num_ions];
    for row in 0..num_ranges {
        let entries = cur.next_line().ok_or(RangeError::FormatRangeTable)?;
        let offset = match entries.len() {
            n if n == num_ions + 2 => 0,
            n if n == num_ions + 3 => 1,
            _ => return Err(RangeError::FormatRangeTable),
        };

        let lo: f32 = entries[offset]
            .parse()
            .map_err(|_| RangeError::FormatMassPair)?;
        let hi: f32 = entries[offset + 1]
            .parse()
            .map_err(|_| RangeError::FormatMassPair)?;
        if lo >= hi {
            return Err(RangeError::DataFlipped);
        }
        mass_pairs.push((lo, hi));

        for (col, entry) in entries[offset + 2..].iter().enumerate() {
            freq[row * num_ions + col] =
                entry.parse().map_err(|_| RangeError::FormatTableEntry)?;
        }
    }

    if freq.iter().all(|&f| f == 0) {
        return Err(RangeError::TooManyUselessRanges);
    }

    // Ions whose column is all zeros are candidates for composed-row
    // matching: their declarations exist purely to name cluster species.
    let compose_candidates: Vec<(String, usize)> = (0..num_ions)
        .filter(|&col| (0..num_ranges).all(|row| freq[row * num_ions + col] == 0))
        .map(|col| (table.ions[col].short_name.clone(), col))
        .collect();

    // Flattened synthesised name -> rows awaiting that species.
    let mut synthesised: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut resolved: Vec<Option<usize>> = Vec::with_capacity(num_ranges);

    for row in 0..num_ranges {
        let nonzero: Vec<(usize, usize)> = (0..num_ions)
            .filter_map(|col| {
                let f = freq[row * num_ions + col];
                (f > 0).then_some((col, f))
            })
            .collect();
        let total: usize = nonzero.iter().map(|&(_, f)| f).sum();

        match total {
            0 => resolved.push(None), // row dropped below
            1 => resolved.push(Some(nonzero[0].0)),
            _ => {
                let wanted: Vec<NameFragment> = nonzero
                    .iter()
                    .map(|&(col, f)| (table.ions[col].short_name.clone(), f))
                    .collect();
                if let Some(ion) = match_composed_name(&compose_candidates, &wanted) {
                    resolved.push(Some(ion));
                } else {
                    // Flattened key in descending column order, eliding
                    // unit multiplicities: {O:3, Cu:2, Au:1} -> O3Cu2Au.
                    let mut name = String::new();
                    for &(col, f) in nonzero.iter().rev() {
                        name.push_str(&table.ions[col].short_name);
                        if f > 1 {
                            name.push_str(&f.to_string());
                        }
                    }
                    synthesised.entry(name).or_default().push(row);
                    resolved.push(None);
                }
            }
        }
    }

    // One new species per distinct flattened name.
    for (name, rows) in &synthesised {
        let id = table.ions.len();
        table.ions.push(IonEntry {
            short_name: name.clone(),
            long_name: name.clone(),
            colour: random_colour(),
        });
        for &row in rows {
            resolved[row] = Some(id);
        }
    }

    for (row, ion) in resolved.into_iter().enumerate() {
        if let Some(ion) = ion {
            let (lo, hi) = mass_pairs[row];
            table.ranges.push(MassRange { lo, hi, ion });
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = "\
2 2
Iron
Fe 1 0 0
Copper
Cu 0 1 0 trailing junk here
------------- Fe Cu
. 26.0 29.0 1 0
. 31.0 33.0 0 1
";

    #[test]
    fn test_basic_parse() {
        let t = parse(BASIC).unwrap();
        assert_eq!(t.num_ions(), 2);
        assert_eq!(t.num_ranges(), 2);
        assert_eq!(t.ions()[0].short_name, "Fe");
        assert_eq!(t.ions()[1].long_name, "Copper");
        assert_eq!(t.ion_id(27.0), Some(0));
        assert_eq!(t.ion_id(32.0), Some(1));
        assert!(t.warnings().is_empty());
    }

    #[test]
    fn test_header_order_mismatch_is_warning() {
        let swapped = BASIC.replace("------------- Fe Cu", "------------- Cu Fe");
        let t = parse(&swapped).unwrap();
        assert_eq!(t.warnings().len(), 1);
        // Declaration order wins regardless of the heading row.
        assert_eq!(t.ion_id(27.0), Some(0));
    }

    #[test]
    fn test_bare_separator_accepted() {
        let bare = BASIC.replace("------------- Fe Cu", "-------------");
        let t = parse(&bare).unwrap();
        assert_eq!(t.num_ranges(), 2);
    }

    #[test]
    fn test_flipped_mass_pair_rejected() {
        let flipped = BASIC.replace(". 26.0 29.0 1 0", ". 29.0 26.0 1 0");
        assert_eq!(parse(&flipped), Err(RangeError::DataFlipped));
    }

    #[test]
    fn test_all_zero_row_dropped() {
        let zeroed = BASIC.replace(". 31.0 33.0 0 1", ". 31.0 33.0 0 0");
        let t = parse(&zeroed).unwrap();
        assert_eq!(t.num_ranges(), 1);
    }

    #[test]
    fn test_all_zero_table_rejected() {
        let dead = BASIC
            .replace(". 26.0 29.0 1 0", ". 26.0 29.0 0 0")
            .replace(". 31.0 33.0 0 1", ". 31.0 33.0 0 0");
        assert_eq!(parse(&dead), Err(RangeError::TooManyUselessRanges));
    }

    #[test]
    fn test_composed_row_matched_to_cluster_ion() {
        // Cu2Au's own column is all zeros; the second row composes it.
        let composed = "\
3 2
Copper
Cu 0 1 0
Gold
Au 1 1 0
ClusterIon
Cu2Au 1 0 1
------------- Cu Au Cu2Au
. 10.0 12.0 1 0 0
. 60.0 64.0 2 1 0
";
        let t = parse(composed).unwrap();
        assert_eq!(t.num_ranges(), 2);
        assert_eq!(t.ion_id(62.0), Some(2));
    }

    #[test]
    fn test_unmatched_composed_row_synthesises_ion() {
        let unmatched = "\
2 2
Copper
Cu 0 1 0
Gold
Au 1 1 0
------------- Cu Au
. 10.0 12.0 1 0
. 60.0 64.0 2 1
";
        let t = parse(unmatched).unwrap();
        assert_eq!(t.num_ions(), 3);
        assert_eq!(t.num_ranges(), 2);
        // Descending column order: Au (col 1), then Cu2.
        assert_eq!(t.ions()[2].short_name, "AuCu2");
        assert_eq!(t.ion_id(62.0), Some(2));
    }

    #[test]
    fn test_missing_separator_rejected() {
        let broken = BASIC.replace("------------- Fe Cu", "not a separator");
        assert_eq!(parse(&broken), Err(RangeError::FormatTableSeparator));
    }
}
