//! The in-memory range table: ion species, colours, mass intervals.

use crate::error::{RangeError, Result};
use crate::species;
use ionvue_core::{ColourRGBAf, IonHit};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// One ion species: display names plus colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonEntry {
    pub short_name: String,
    pub long_name: String,
    pub colour: ColourRGBAf,
}

/// One classification interval. Bounds are inclusive at both ends for
/// membership tests; self-consistency forbids `lo >= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassRange {
    pub lo: f32,
    pub hi: f32,
    pub ion: usize,
}

impl MassRange {
    pub fn contains(&self, mass: f32) -> bool {
        mass >= self.lo && mass <= self.hi
    }
}

/// Which on-disk dialect a file was (or will be) stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeFormat {
    /// ORNL whitespace table format, conventionally `.rng`.
    Ornl,
    /// Imago/Cameca INI-like format, `.rrng`.
    Rrng,
    /// Cameca environment format, `.env`.
    Env,
}

impl RangeFormat {
    pub const ALL: [Self; 3] = [Self::Ornl, Self::Rrng, Self::Env];

    /// Best guess from a filename extension; unknown extensions default to
    /// the ORNL dialect, which is the oldest and most common.
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("rrng") => Self::Rrng,
            Some("env") => Self::Env,
            _ => Self::Ornl,
        }
    }
}

/// A parsed, self-consistent range table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeFile {
    pub(crate) ions: Vec<IonEntry>,
    pub(crate) ranges: Vec<MassRange>,
    /// Non-fatal oddities found during parse, surfaced by the owning
    /// filter on its next refresh.
    pub(crate) warnings: Vec<String>,
}

impl RangeFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse with an explicit dialect, then run the self-consistency gate.
    pub fn open(path: &Path, format: RangeFormat) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RangeError::Open(format!("{}: {e}", path.display())))?;
        let table = match format {
            RangeFormat::Ornl => crate::rng_format::parse(&content)?,
            RangeFormat::Rrng => crate::rrng::parse(&content)?,
            RangeFormat::Env => crate::env::parse(&content)?,
        };
        if !table.is_self_consistent() {
            return Err(RangeError::DataInconsistent);
        }
        debug!(path = %path.display(), ions = table.ions.len(),
               ranges = table.ranges.len(), "range file loaded");
        Ok(table)
    }

    /// Parse trying the extension's dialect first, then every other
    /// dialect. On total failure the error reported is the one from the
    /// extension-guessed dialect, which is the most useful to show.
    pub fn open_guess_format(path: &Path) -> Result<(Self, RangeFormat)> {
        let guessed = RangeFormat::from_extension(path);
        let first_err = match Self::open(path, guessed) {
            Ok(table) => return Ok((table, guessed)),
            Err(e) => e,
        };
        for format in RangeFormat::ALL {
            if format == guessed {
                continue;
            }
            if let Ok(table) = Self::open(path, format) {
                warn!(path = %path.display(), ?format, "range file matched a non-extension dialect");
                return Ok((table, format));
            }
        }
        Err(first_err)
    }

    // --- accessors ---

    pub fn ions(&self) -> &[IonEntry] {
        &self.ions
    }

    pub fn ranges(&self) -> &[MassRange] {
        &self.ranges
    }

    pub fn num_ions(&self) -> usize {
        self.ions.len()
    }

    pub fn num_ranges(&self) -> usize {
        self.ranges.len()
    }

    /// Number of ranges classified to one ion.
    pub fn num_ranges_of_ion(&self, ion_id: usize) -> usize {
        self.ranges.iter().filter(|r| r.ion == ion_id).count()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    // --- classification ---

    pub fn range_id(&self, mass: f32) -> Option<usize> {
        self.ranges.iter().position(|r| r.contains(mass))
    }

    pub fn ion_id(&self, mass: f32) -> Option<usize> {
        self.range_id(mass).map(|r| self.ranges[r].ion)
    }

    pub fn is_ranged(&self, ion: &IonHit) -> bool {
        self.range_id(ion.mass_to_charge).is_some()
    }

    pub fn ion_id_by_short_name(&self, short: &str) -> Option<usize> {
        self.ions.iter().position(|i| i.short_name == short)
    }

    /// Atomic number of an ion's short name when it names a plain element;
    /// 0 for composed or unknown species.
    pub fn atomic_number_of_ion(&self, ion_id: usize) -> u32 {
        self.ions
            .get(ion_id)
            .map(|i| species::atomic_number(&i.short_name))
            .unwrap_or(0)
    }

    /// Keep only the ions whose mass falls in some range.
    pub fn keep_ranged(&self, ions: &mut Vec<IonHit>) {
        ions.retain(|i| self.is_ranged(i));
    }

    // --- consistency ---

    /// Zero-width, overlapping, nested, spanning and duplicate ranges are
    /// all forbidden, and every range must point at a real ion.
    pub fn is_self_consistent(&self) -> bool {
        for (i, a) in self.ranges.iter().enumerate() {
            if a.lo >= a.hi || a.ion >= self.ions.len() {
                return false;
            }
            for (j, b) in self.ranges.iter().enumerate() {
                if i == j {
                    continue;
                }
                // endpoint inside another range
                if a.lo > b.lo && a.lo < b.hi {
                    return false;
                }
                if a.hi > b.lo && a.hi < b.hi {
                    return false;
                }
                // spanning
                if a.lo < b.lo && a.hi > b.hi {
                    return false;
                }
                // duplicate
                if a.lo == b.lo && a.hi == b.hi {
                    return false;
                }
            }
        }
        true
    }

    // --- mutation, preserving invariants ---

    /// Move one end of a range. `upper` picks the end. Rejected when the
    /// move would invert the range or collide with a sibling.
    pub fn move_range(&mut self, range_id: usize, upper: bool, new_mass: f32) -> bool {
        let target = self.ranges[range_id];
        if upper {
            if new_mass <= target.lo {
                return false;
            }
        } else if new_mass >= target.hi {
            return false;
        }

        for (i, other) in self.ranges.iter().enumerate() {
            if i == range_id {
                continue;
            }
            if upper {
                if (target.lo < other.lo && new_mass > other.lo)
                    || (target.lo < other.hi && new_mass > other.hi)
                {
                    return false;
                }
            } else if (target.hi > other.lo && new_mass < other.lo)
                || (target.hi > other.hi && new_mass < other.hi)
            {
                return false;
            }
        }

        if upper {
            self.ranges[range_id].hi = new_mass;
        } else {
            self.ranges[range_id].lo = new_mass;
        }
        debug_assert!(self.is_self_consistent());
        true
    }

    /// Move both ends at once (a drag of the whole region).
    pub fn move_both_ranges(&mut self, range_id: usize, new_lo: f32, new_hi: f32) -> bool {
        if new_lo >= new_hi {
            return false;
        }
        let target = self.ranges[range_id];
        for (i, other) in self.ranges.iter().enumerate() {
            if i == range_id {
                continue;
            }
            if (target.lo < other.lo && new_hi > other.lo)
                || (target.lo < other.hi && new_hi > other.hi)
                || (target.hi > other.lo && new_lo < other.lo)
                || (target.hi > other.hi && new_lo < other.hi)
            {
                return false;
            }
        }
        self.ranges[range_id].lo = new_lo;
        self.ranges[range_id].hi = new_hi;
        debug_assert!(self.is_self_consistent());
        true
    }

    /// Append a range; `None` when it would overlap an existing one.
    pub fn add_range(&mut self, lo: f32, hi: f32, ion_id: usize) -> Option<usize> {
        if lo >= hi || ion_id >= self.ions.len() {
            return None;
        }
        for r in &self.ranges {
            if (lo > r.lo && lo <= r.hi)
                || (hi > r.lo && hi <= r.hi)
                || (lo < r.lo && hi > r.hi)
                || (lo == r.lo && hi == r.hi)
            {
                return None;
            }
        }
        self.ranges.push(MassRange { lo, hi, ion: ion_id });
        debug_assert!(self.is_self_consistent());
        Some(self.ranges.len() - 1)
    }

    /// Append an ion; `None` when either name is already taken.
    pub fn add_ion(&mut self, short: &str, long: &str, colour: ColourRGBAf) -> Option<usize> {
        if self
            .ions
            .iter()
            .any(|i| i.short_name == short || i.long_name == long)
        {
            return None;
        }
        self.ions.push(IonEntry {
            short_name: short.to_string(),
            long_name: long.to_string(),
            colour,
        });
        Some(self.ions.len() - 1)
    }

    pub fn set_ion_id(&mut self, range_id: usize, ion_id: usize) {
        assert!(ion_id < self.ions.len());
        self.ranges[range_id].ion = ion_id;
    }

    pub fn set_colour(&mut self, ion_id: usize, colour: ColourRGBAf) {
        self.ions[ion_id].colour = colour;
    }

    pub fn set_ion_short_name(&mut self, ion_id: usize, name: &str) {
        self.ions[ion_id].short_name = name.to_string();
    }

    pub fn set_ion_long_name(&mut self, ion_id: usize, name: &str) {
        self.ions[ion_id].long_name = name.to_string();
    }
}
