//! Typed xy-series payloads for 1D plots.

use crate::colour::ColourRGBAf;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceType {
    Lines,
    Bars,
    Steps,
    Stem,
}

/// Error-bar treatment for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorMode {
    None,
    /// Moving average over a window of the given half-width.
    MovingAverage(u32),
}

/// A highlighted interval on the x axis, typically a mass-to-charge range.
/// `region_id` ties a dragged region edge back to the owning filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRegion {
    pub lo: f32,
    pub hi: f32,
    pub colour: ColourRGBAf,
    pub region_id: u32,
}

/// One labelled series. A plot frame carries exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub label: String,
    pub x_label: String,
    pub y_label: String,
    pub colour: ColourRGBAf,
    pub trace: TraceType,
    pub error_mode: ErrorMode,
    pub logarithmic: bool,
    pub xy: Vec<(f32, f32)>,
    pub regions: Vec<PlotRegion>,
}

impl PlotSeries {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            x_label: String::new(),
            y_label: String::new(),
            colour: ColourRGBAf::default(),
            trace: TraceType::Lines,
            error_mode: ErrorMode::None,
            logarithmic: false,
            xy: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Largest y value, or `None` for an empty series.
    pub fn max_y(&self) -> Option<f32> {
        self.xy
            .iter()
            .map(|&(_, y)| y)
            .fold(None, |m, y| Some(m.map_or(y, |m: f32| m.max(y))))
    }

    pub fn sum_y(&self) -> f32 {
        self.xy.iter().map(|&(_, y)| y).sum()
    }
}
