//! Range classification filter.
//!
//! Owns a shared range table loaded from disk, exposes per-ion and
//! per-range enable flags, and splits incoming ion streams into one frame
//! per enabled species, coloured by the species colour. Ions that are
//! unranged, or ranged to a disabled entry, are dropped. Downstream
//! filters receive the range frame for species-aware work.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{Frame, FramePayload, IonFrame, RangeFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{IonHit, RefreshContext, RefreshError, Result, ION_RECORD_SIZE, PROGRESS_CHUNK};
use ionvue_ranges::RangeFile;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Default)]
pub struct RangeFileFilter {
    user_string: String,
    file: PathBuf,
    table: Option<Arc<RangeFile>>,
    enabled_ions: Vec<bool>,
    enabled_ranges: Vec<bool>,
    /// Parse warnings not yet surfaced on a console.
    pending_warnings: Vec<String>,
}

impl RangeFileFilter {
    /// Load the table eagerly; parse errors surface on first refresh
    /// instead when construction is deferred to `read_state`.
    pub fn from_file(path: impl Into<PathBuf>) -> ionvue_ranges::Result<Self> {
        let mut filter = Self {
            file: path.into(),
            ..Default::default()
        };
        filter.load_table()?;
        Ok(filter)
    }

    pub fn table(&self) -> Option<&Arc<RangeFile>> {
        self.table.as_ref()
    }

    fn load_table(&mut self) -> ionvue_ranges::Result<()> {
        let (mut table, _format) = RangeFile::open_guess_format(&self.file)?;
        self.pending_warnings = table.take_warnings();
        // Persisted enable flags survive a reload only while they still
        // fit the table; a changed file resets them.
        if self.enabled_ions.len() != table.num_ions() {
            self.enabled_ions = vec![true; table.num_ions()];
        }
        if self.enabled_ranges.len() != table.num_ranges() {
            self.enabled_ranges = vec![true; table.num_ranges()];
        }
        self.table = Some(Arc::new(table));
        Ok(())
    }

    fn range_frame(&self) -> Option<RangeFrame> {
        Some(RangeFrame {
            table: self.table.clone()?,
            enabled_ions: self.enabled_ions.clone(),
            enabled_ranges: self.enabled_ranges.clone(),
        })
    }
}

impl Filter for RangeFileFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::RangeFile
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            file: self.file.clone(),
            table: self.table.clone(),
            enabled_ions: self.enabled_ions.clone(),
            enabled_ranges: self.enabled_ranges.clone(),
            pending_warnings: Vec::new(),
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        if self.table.is_none() {
            self.load_table()
                .map_err(|e| RefreshError::OpenFail(e.to_string()))?;
        }
        console.append(&mut self.pending_warnings);

        let range_frame = self.range_frame().expect("table loaded above");
        let table = range_frame.table.clone();

        // One output bucket per species; only enabled species fill up.
        let mut buckets: Vec<Vec<IonHit>> = vec![Vec::new(); table.num_ions()];
        let mut processed = 0usize;
        for frame in input.iter().filter_map(Frame::as_ions) {
            for ion in &frame.data {
                if let Some(species) = range_frame.enabled_ion_of(ion.mass_to_charge) {
                    buckets[species].push(*ion);
                }
                processed += 1;
                if processed % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                    return Err(RefreshError::Aborted);
                }
            }
        }

        let mut out = vec![Frame::new(FramePayload::Range(range_frame))];
        for (species, data) in buckets.into_iter().enumerate() {
            if data.is_empty() {
                continue;
            }
            let ion = &table.ions()[species];
            out.push(Frame::new(FramePayload::Ions(IonFrame {
                data,
                colour: ion.colour,
                ..Default::default()
            })));
        }
        Ok(out)
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        n_objects * ION_RECORD_SIZE
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::IONS | StreamMask::RANGE
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS
    }

    fn properties(&self) -> Vec<PropertyValue> {
        let mut props = vec![PropertyValue::new(
            "file",
            self.file.display(),
            PropertyKind::File,
        )];
        if let Some(table) = &self.table {
            // Keys are positional; names may repeat across files.
            for (i, ion) in table.ions().iter().enumerate() {
                props.push(PropertyValue::new(
                    format!("ion:{i}"),
                    format!("{}={}", ion.short_name, bool_str(self.enabled_ions[i])),
                    PropertyKind::Bool,
                ));
            }
            for (i, range) in table.ranges().iter().enumerate() {
                props.push(PropertyValue::new(
                    format!("range:{i}"),
                    format!(
                        "{}-{}={}",
                        range.lo,
                        range.hi,
                        bool_str(self.enabled_ranges[i])
                    ),
                    PropertyKind::Bool,
                ));
            }
        }
        props
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        if key == "file" {
            self.file = PathBuf::from(value);
            self.table = None;
            return Ok(true);
        }
        if let Some(idx) = key.strip_prefix("ion:") {
            let idx: usize = idx
                .parse()
                .map_err(|_| PropertyError::UnknownKey(key.to_string()))?;
            let flag = self
                .enabled_ions
                .get_mut(idx)
                .ok_or_else(|| PropertyError::UnknownKey(key.to_string()))?;
            *flag = parse_bool(value).ok_or(PropertyError::InvalidValue("ion enable"))?;
            return Ok(true);
        }
        if let Some(idx) = key.strip_prefix("range:") {
            let idx: usize = idx
                .parse()
                .map_err(|_| PropertyError::UnknownKey(key.to_string()))?;
            let flag = self
                .enabled_ranges
                .get_mut(idx)
                .ok_or_else(|| PropertyError::UnknownKey(key.to_string()))?;
            *flag = parse_bool(value).ok_or(PropertyError::InvalidValue("range enable"))?;
            return Ok(true);
        }
        Err(PropertyError::UnknownKey(key.to_string()))
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("file", self.file.display()))
            .child(XmlElem::value_elem(
                "enabledions",
                flags_str(&self.enabled_ions),
            ))
            .child(XmlElem::value_elem(
                "enabledranges",
                flags_str(&self.enabled_ranges),
            ))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.file = PathBuf::from(elem.child_value::<String>("file")?);
        self.table = None;
        // Stored flags are reconciled against the table at first refresh;
        // they may be stale if the file changed on disk.
        if let Some(v) = elem.child_value::<String>("enabledions") {
            self.enabled_ions = parse_flags(&v)?;
        }
        if let Some(v) = elem.child_value::<String>("enabledranges") {
            self.enabled_ranges = parse_flags(&v)?;
        }
        Some(())
    }

    fn user_string(&self) -> &str {
        &self.user_string
    }

    fn set_user_string(&mut self, s: &str) {
        self.user_string = s.to_string();
    }
}
