//! Mass spectrum histogram.
//!
//! Bins mass-to-charge over all incoming ions at a fixed bin width. With
//! a range stream upstream one series is produced per enabled species,
//! coloured by the species colour, and the enabled ranges appear as plot
//! region overlays; otherwise a single series in the user colour.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{Frame, FramePayload, PlotFrame, RangeFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{
    ColourRGBAf, ErrorMode, PlotRegion, PlotSeries, RefreshContext, RefreshError, Result,
    TraceType, PROGRESS_CHUNK,
};

pub struct SpectrumPlotFilter {
    user_string: String,
    bin_width: f32,
    logarithmic: bool,
    colour: ColourRGBAf,
    /// Moving-average error window; 0 disables error bars.
    error_window: u32,
}

impl Default for SpectrumPlotFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            bin_width: 0.5,
            logarithmic: true,
            colour: ColourRGBAf::default(),
            error_window: 0,
        }
    }
}

struct Histogram {
    min: f32,
    bin_width: f32,
    counts: Vec<u64>,
}

impl Histogram {
    fn new(min: f32, max: f32, bin_width: f32) -> Self {
        let bins = (((max - min) / bin_width).ceil() as usize).max(1);
        Self {
            min,
            bin_width,
            counts: vec![0; bins],
        }
    }

    fn record(&mut self, value: f32) {
        let bin = ((value - self.min) / self.bin_width) as usize;
        let last = self.counts.len() - 1;
        if let Some(c) = self.counts.get_mut(bin.min(last)) {
            *c += 1;
        }
    }

    fn xy(&self) -> Vec<(f32, f32)> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| (self.min + (i as f32 + 0.5) * self.bin_width, c as f32))
            .collect()
    }
}

impl SpectrumPlotFilter {
    fn series(&self, label: &str, colour: ColourRGBAf, hist: &Histogram) -> PlotSeries {
        let mut series = PlotSeries::new(label);
        series.x_label = "Mass-to-Charge (amu/e)".to_string();
        series.y_label = "Count".to_string();
        series.colour = colour;
        series.trace = TraceType::Steps;
        series.error_mode = if self.error_window > 0 {
            ErrorMode::MovingAverage(self.error_window)
        } else {
            ErrorMode::None
        };
        series.logarithmic = self.logarithmic;
        series.xy = hist.xy();
        series
    }
}

impl Filter for SpectrumPlotFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::SpectrumPlot
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            bin_width: self.bin_width,
            logarithmic: self.logarithmic,
            colour: self.colour,
            error_window: self.error_window,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let masses: Vec<f32> = input
            .iter()
            .filter_map(Frame::as_ions)
            .flat_map(|f| f.data.iter().map(|i| i.mass_to_charge))
            .collect();
        if masses.is_empty() {
            return Ok(Vec::new());
        }
        let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
        for &m in &masses {
            min = min.min(m);
            max = max.max(m);
        }

        let range = input.iter().find_map(Frame::as_range);
        let mut out = Vec::new();
        match range {
            Some(range) => {
                let regions = region_overlays(range);
                let table = &range.table;
                let mut hists: Vec<Histogram> = (0..table.num_ions())
                    .map(|_| Histogram::new(min, max, self.bin_width))
                    .collect();
                for (n, &m) in masses.iter().enumerate() {
                    if let Some(species) = range.enabled_ion_of(m) {
                        hists[species].record(m);
                    }
                    if n % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                        return Err(RefreshError::Aborted);
                    }
                }
                for (species, hist) in hists.iter().enumerate() {
                    if hist.counts.iter().all(|&c| c == 0) {
                        continue;
                    }
                    let ion = &table.ions()[species];
                    let mut series = self.series(&ion.short_name, ion.colour, hist);
                    series.regions = regions.clone();
                    out.push(Frame::new(FramePayload::Plot(PlotFrame { series })));
                }
            }
            None => {
                let mut hist = Histogram::new(min, max, self.bin_width);
                for (n, &m) in masses.iter().enumerate() {
                    hist.record(m);
                    if n % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                        return Err(RefreshError::Aborted);
                    }
                }
                let series = self.series("Mass spectrum", self.colour, &hist);
                out.push(Frame::new(FramePayload::Plot(PlotFrame { series })));
            }
        }
        Ok(out)
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        // Histogram size scales with span, not input; assume a modest
        // per-bin cost against the object count.
        (n_objects / 16).max(1024)
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::PLOT
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS | StreamMask::RANGE
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new("binwidth", self.bin_width, PropertyKind::Real),
            PropertyValue::new("logarithmic", bool_str(self.logarithmic), PropertyKind::Bool),
            PropertyValue::new("colour", colour_str(&self.colour), PropertyKind::Colour),
            PropertyValue::new("errorwindow", self.error_window, PropertyKind::Integer),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "binwidth" => {
                self.bin_width = value
                    .parse()
                    .ok()
                    .filter(|w: &f32| *w > 0.0)
                    .ok_or(PropertyError::InvalidValue("binwidth"))?;
                Ok(true)
            }
            "logarithmic" => {
                self.logarithmic =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("logarithmic"))?;
                Ok(true)
            }
            "colour" => {
                self.colour = parse_colour(value).ok_or(PropertyError::InvalidValue("colour"))?;
                Ok(true)
            }
            "errorwindow" => {
                self.error_window = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("errorwindow"))?;
                Ok(true)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem("binwidth", self.bin_width))
            .child(XmlElem::value_elem(
                "logarithmic",
                bool_str(self.logarithmic),
            ))
            .child(colour_elem(&self.colour))
            .child(XmlElem::value_elem("errorwindow", self.error_window))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.bin_width = elem.child_value("binwidth")?;
        if let Some(v) = elem.child_value::<String>("logarithmic") {
            self.logarithmic = parse_bool(&v)?;
        }
        if let Some(c) = elem.get_child("colour") {
            self.colour = colour_from_elem(c)?;
        }
        if let Some(v) = elem.child_value("errorwindow") {
            self.error_window = v;
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

/// Enabled ranges as draggable plot regions, id = range index.
fn region_overlays(range: &RangeFrame) -> Vec<PlotRegion> {
    range
        .table
        .ranges()
        .iter()
        .enumerate()
        .filter(|&(i, _)| range.enabled_ranges.get(i).copied().unwrap_or(false))
        .map(|(i, r)| PlotRegion {
            lo: r.lo,
            hi: r.hi,
            colour: range.table.ions()[r.ion].colour,
            region_id: i as u32,
        })
        .collect()
}
