//! Ion dataset source filter.
//!
//! Loads a POS or delimited-text file and emits one ion frame. Sampling
//! caps the load at a megabyte budget. Monitor mode watches the file's
//! mtime and size; when either changes the node's cache is declared stale
//! on the next refresh query.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{Frame, FramePayload, IonFrame, StreamMask, DEFAULT_VALUE_LABEL};
use crate::xml::XmlElem;
use ionvue_core::ion::bound_cube_of;
use ionvue_core::{ColourRGBAf, IonHit, RefreshContext, Result, ION_RECORD_SIZE};
use ionvue_io::PosColumnMap;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileKind {
    Pos,
    Text,
}

pub struct DataLoadFilter {
    user_string: String,
    file: PathBuf,
    kind: DataFileKind,
    input_cols: usize,
    /// Source column for each of x, y, z, value.
    index: [usize; 4],
    sampling: bool,
    max_mb: usize,
    colour: ColourRGBAf,
    ion_size: f32,
    value_label: String,
    enabled: bool,
    monitor: bool,
    /// (mtime, size) observed at the last successful load.
    loaded_stamp: Option<(SystemTime, u64)>,
}

impl Default for DataLoadFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            file: PathBuf::new(),
            kind: DataFileKind::Pos,
            input_cols: 4,
            index: [0, 1, 2, 3],
            sampling: true,
            max_mb: 512,
            colour: ColourRGBAf::default(),
            ion_size: 2.0,
            value_label: DEFAULT_VALUE_LABEL.to_string(),
            enabled: true,
            monitor: false,
            loaded_stamp: None,
        }
    }
}

impl DataLoadFilter {
    pub fn from_file(path: impl Into<PathBuf>, kind: DataFileKind) -> Self {
        Self {
            file: path.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn set_sampling(&mut self, enabled: bool, max_mb: usize) {
        self.sampling = enabled;
        self.max_mb = max_mb;
    }

    fn sample_limit(&self) -> usize {
        self.max_mb * 1024 * 1024 / ION_RECORD_SIZE
    }

    fn file_stamp(&self) -> Option<(SystemTime, u64)> {
        let meta = std::fs::metadata(&self.file).ok()?;
        Some((meta.modified().ok()?, meta.len()))
    }

    fn load(&self, ctx: &RefreshContext) -> Result<Vec<IonHit>> {
        let map = PosColumnMap {
            input_cols: self.input_cols,
            index: self.index,
        };
        match self.kind {
            DataFileKind::Pos => {
                if self.sampling {
                    ionvue_io::load_pos_sampled(&self.file, &map, self.sample_limit(), ctx)
                } else {
                    ionvue_io::load_pos(&self.file, &map, ctx)
                }
            }
            DataFileKind::Text => {
                if self.sampling {
                    ionvue_io::load_text_sampled(&self.file, &self.index, self.sample_limit(), ctx)
                } else {
                    ionvue_io::load_text(&self.file, &self.index, ctx)
                }
            }
        }
    }
}

impl Filter for DataLoadFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::DataLoad
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            file: self.file.clone(),
            kind: self.kind,
            input_cols: self.input_cols,
            index: self.index,
            sampling: self.sampling,
            max_mb: self.max_mb,
            colour: self.colour,
            ion_size: self.ion_size,
            value_label: self.value_label.clone(),
            enabled: self.enabled,
            monitor: self.monitor,
            loaded_stamp: None,
        })
    }

    fn refresh(
        &mut self,
        _input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        let data = self.load(ctx)?;
        debug!(file = %self.file.display(), ions = data.len(), "dataset loaded");
        self.loaded_stamp = self.file_stamp();

        if bound_cube_of(&data).is_numerically_big() {
            console.push(format!(
                "Warning: bounds of {} are suspiciously large; check the column mapping",
                self.file.display()
            ));
        }

        Ok(vec![Frame::new(FramePayload::Ions(IonFrame {
            data,
            colour: self.colour,
            ion_size: self.ion_size,
            value_label: self.value_label.clone(),
        }))])
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        n_objects * ION_RECORD_SIZE
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::IONS
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new("file", self.file.display(), PropertyKind::File),
            PropertyValue::new(
                "filetype",
                match self.kind {
                    DataFileKind::Pos => "pos",
                    DataFileKind::Text => "text",
                },
                PropertyKind::Choice,
            ),
            PropertyValue::new("columns", self.input_cols, PropertyKind::Integer),
            PropertyValue::new(
                "columnindex",
                format!(
                    "{},{},{},{}",
                    self.index[0], self.index[1], self.index[2], self.index[3]
                ),
                PropertyKind::String,
            ),
            PropertyValue::new("sample", bool_str(self.sampling), PropertyKind::Bool),
            PropertyValue::new("maxmb", self.max_mb, PropertyKind::Integer),
            PropertyValue::new("colour", colour_str(&self.colour), PropertyKind::Colour),
            PropertyValue::new("ionsize", self.ion_size, PropertyKind::Real),
            PropertyValue::new("valuelabel", &self.value_label, PropertyKind::String),
            PropertyValue::new("enabled", bool_str(self.enabled), PropertyKind::Bool),
            PropertyValue::new("monitor", bool_str(self.monitor), PropertyKind::Bool),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "file" => {
                self.file = PathBuf::from(value);
                self.loaded_stamp = None;
                Ok(true)
            }
            "filetype" => {
                self.kind = match value {
                    "pos" => DataFileKind::Pos,
                    "text" => DataFileKind::Text,
                    _ => return Err(PropertyError::InvalidValue("filetype")),
                };
                Ok(true)
            }
            "columns" => {
                let cols: usize = value
                    .parse()
                    .ok()
                    .filter(|&c| c > 0 && c <= 32)
                    .ok_or(PropertyError::InvalidValue("columns"))?;
                self.input_cols = cols;
                Ok(true)
            }
            "columnindex" => {
                let parts: Vec<usize> = value
                    .split(',')
                    .map(|p| p.trim().parse().ok())
                    .collect::<Option<_>>()
                    .ok_or(PropertyError::InvalidValue("columnindex"))?;
                let index: [usize; 4] = parts
                    .try_into()
                    .map_err(|_| PropertyError::InvalidValue("columnindex"))?;
                self.index = index;
                Ok(true)
            }
            "sample" => {
                self.sampling =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("sample"))?;
                Ok(true)
            }
            "maxmb" => {
                self.max_mb = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("maxmb"))?;
                Ok(self.sampling)
            }
            "colour" => {
                self.colour = parse_colour(value).ok_or(PropertyError::InvalidValue("colour"))?;
                Ok(true)
            }
            "ionsize" => {
                self.ion_size = value
                    .parse()
                    .ok()
                    .filter(|s: &f32| *s > 0.0)
                    .ok_or(PropertyError::InvalidValue("ionsize"))?;
                Ok(true)
            }
            "valuelabel" => {
                self.value_label = value.to_string();
                Ok(true)
            }
            "enabled" => {
                self.enabled =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("enabled"))?;
                Ok(true)
            }
            "monitor" => {
                self.monitor =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("monitor"))?;
                // Watching the file does not change current output.
                Ok(false)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("file", self.file.display()))
            .child(XmlElem::value_elem(
                "filetype",
                match self.kind {
                    DataFileKind::Pos => "pos",
                    DataFileKind::Text => "text",
                },
            ))
            .child(XmlElem::value_elem("columns", self.input_cols))
            .child(XmlElem::value_elem(
                "columnindex",
                format!(
                    "{},{},{},{}",
                    self.index[0], self.index[1], self.index[2], self.index[3]
                ),
            ))
            .child(XmlElem::value_elem("sample", bool_str(self.sampling)))
            .child(XmlElem::value_elem("maxmb", self.max_mb))
            .child(colour_elem(&self.colour))
            .child(XmlElem::value_elem("ionsize", self.ion_size))
            .child(XmlElem::value_elem("valuelabel", &self.value_label))
            .child(XmlElem::value_elem("enabled", bool_str(self.enabled)))
            .child(XmlElem::value_elem("monitor", bool_str(self.monitor)))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.file = PathBuf::from(elem.child_value::<String>("file")?);
        self.kind = match elem.child_value::<String>("filetype")?.as_str() {
            "text" => DataFileKind::Text,
            _ => DataFileKind::Pos,
        };
        if let Some(cols) = elem.child_value("columns") {
            self.input_cols = cols;
        }
        if let Some(index) = elem.get_child("columnindex").and_then(|c| c.get_attr("value")) {
            let parts: Vec<usize> = index
                .split(',')
                .map(|p| p.trim().parse().ok())
                .collect::<Option<_>>()?;
            self.index = parts.try_into().ok()?;
        }
        if let Some(v) = elem.child_value::<String>("sample") {
            self.sampling = parse_bool(&v)?;
        }
        if let Some(v) = elem.child_value("maxmb") {
            self.max_mb = v;
        }
        if let Some(c) = elem.get_child("colour") {
            self.colour = colour_from_elem(c)?;
        }
        if let Some(v) = elem.child_value("ionsize") {
            self.ion_size = v;
        }
        if let Some(v) = elem.child_value::<String>("valuelabel") {
            self.value_label = v;
        }
        if let Some(v) = elem.child_value::<String>("enabled") {
            self.enabled = parse_bool(&v)?;
        }
        if let Some(v) = elem.child_value::<String>("monitor") {
            self.monitor = parse_bool(&v)?;
        }
        Some(())
    }

    fn user_string(&self) -> &str {
        &self.user_string
    }

    fn set_user_string(&mut self, s: &str) {
        self.user_string = s.to_string();
    }

    fn monitor_stale(&self) -> bool {
        if !self.monitor {
            return false;
        }
        match (self.loaded_stamp, self.file_stamp()) {
            (Some(loaded), Some(current)) => loaded != current,
            // Never loaded, or the file vanished: force a reload attempt.
            _ => true,
        }
    }
}
