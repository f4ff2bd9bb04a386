//! Stream frames: the typed data packets that travel between filter
//! nodes.
//!
//! Frames are shared, immutable payloads behind `Arc`s. A consumer that
//! needs to change ion data clones the payload; pass-through costs one
//! reference count. Whether an input frame continues past a node is
//! decided by the scheduler:
//!
//! - a type named in the node's block mask never passes;
//! - a type the node uses is superseded whenever the node emitted frames
//!   of that same type this refresh (the emitted frames replace it);
//! - everything else passes untouched.
//!
//! Under that rule a node never needs to block a type it emits, which is
//! what keeps the emit and block masks disjoint.

use bitflags::bitflags;
use ionvue_core::{ColourRGBAf, DrawPrimitive, IonHit, PlotSeries, VoxelGrid};
use ionvue_ranges::RangeFile;
use std::sync::Arc;

/// Default value-axis label for freshly loaded ion data.
pub const DEFAULT_VALUE_LABEL: &str = "Mass-to-Charge (amu/e)";

bitflags! {
    /// Bitmask over the five stream frame types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StreamMask: u8 {
        const IONS  = 1;
        const PLOT  = 1 << 1;
        const DRAW  = 1 << 2;
        const RANGE = 1 << 3;
        const VOXEL = 1 << 4;
    }
}

/// Ordered ion sequence with display hints.
#[derive(Debug, Clone, PartialEq)]
pub struct IonFrame {
    pub data: Vec<IonHit>,
    pub colour: ColourRGBAf,
    pub ion_size: f32,
    pub value_label: String,
}

impl Default for IonFrame {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            colour: ColourRGBAf::default(),
            ion_size: 2.0,
            value_label: DEFAULT_VALUE_LABEL.to_string(),
        }
    }
}

/// One xy-series destined for a 1D plot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotFrame {
    pub series: PlotSeries,
}

/// Abstract scene primitives for the out-of-tree renderer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawFrame {
    pub primitives: Vec<DrawPrimitive>,
}

/// Non-owning view of a range table plus enable flags. The table is
/// shared; frames never mutate it.
#[derive(Debug, Clone)]
pub struct RangeFrame {
    pub table: Arc<RangeFile>,
    pub enabled_ions: Vec<bool>,
    pub enabled_ranges: Vec<bool>,
}

impl RangeFrame {
    pub fn all_enabled(table: Arc<RangeFile>) -> Self {
        let (ni, nr) = (table.num_ions(), table.num_ranges());
        Self {
            table,
            enabled_ions: vec![true; ni],
            enabled_ranges: vec![true; nr],
        }
    }

    /// Ion id for a mass, honouring both enable flag vectors.
    pub fn enabled_ion_of(&self, mass: f32) -> Option<usize> {
        let range = self.table.range_id(mass)?;
        if !self.enabled_ranges.get(range).copied().unwrap_or(false) {
            return None;
        }
        let ion = self.table.ranges()[range].ion;
        self.enabled_ions
            .get(ion)
            .copied()
            .unwrap_or(false)
            .then_some(ion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelRepresentation {
    PointCloud,
    IsoSurface,
}

/// Scalar grid with rendering hints.
#[derive(Debug, Clone)]
pub struct VoxelFrame {
    pub grid: VoxelGrid,
    pub representation: VoxelRepresentation,
    pub iso_level: f32,
    pub splat_size: f32,
}

/// The tagged frame payload.
#[derive(Debug, Clone)]
pub enum FramePayload {
    Ions(IonFrame),
    Plot(PlotFrame),
    Draw(DrawFrame),
    Range(RangeFrame),
    Voxel(VoxelFrame),
}

impl FramePayload {
    pub fn stream_type(&self) -> StreamMask {
        match self {
            Self::Ions(_) => StreamMask::IONS,
            Self::Plot(_) => StreamMask::PLOT,
            Self::Draw(_) => StreamMask::DRAW,
            Self::Range(_) => StreamMask::RANGE,
            Self::Voxel(_) => StreamMask::VOXEL,
        }
    }

    /// Number of basic records carried, for cache sizing and progress.
    pub fn num_basic_objects(&self) -> usize {
        match self {
            Self::Ions(f) => f.data.len(),
            Self::Plot(f) => f.series.xy.len(),
            Self::Voxel(f) => f.grid.len(),
            Self::Draw(_) | Self::Range(_) => 0,
        }
    }
}

/// A frame travelling through the tree: shared payload plus scheduler
/// bookkeeping. Cloning shares the payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub payload: Arc<FramePayload>,
    /// Node that produced the payload; used to route region-edit and
    /// selection interactions back to their owner.
    pub producer: Option<crate::tree::NodeId>,
    /// Whether the producing node retains this frame in its cache.
    pub cached: bool,
}

impl Frame {
    pub fn new(payload: FramePayload) -> Self {
        Self {
            payload: Arc::new(payload),
            producer: None,
            cached: false,
        }
    }

    pub fn stream_type(&self) -> StreamMask {
        self.payload.stream_type()
    }

    pub fn as_ions(&self) -> Option<&IonFrame> {
        match self.payload.as_ref() {
            FramePayload::Ions(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeFrame> {
        match self.payload.as_ref() {
            FramePayload::Range(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_plot(&self) -> Option<&PlotFrame> {
        match self.payload.as_ref() {
            FramePayload::Plot(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_draw(&self) -> Option<&DrawFrame> {
        match self.payload.as_ref() {
            FramePayload::Draw(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_voxel(&self) -> Option<&VoxelFrame> {
        match self.payload.as_ref() {
            FramePayload::Voxel(f) => Some(f),
            _ => None,
        }
    }
}

/// Union of the frame types present in a list.
pub fn types_present(frames: &[Frame]) -> StreamMask {
    frames
        .iter()
        .fold(StreamMask::empty(), |m, f| m | f.stream_type())
}

/// Total ion count across all ion frames in a list.
pub fn total_ions(frames: &[Frame]) -> usize {
    frames
        .iter()
        .filter_map(Frame::as_ions)
        .map(|f| f.data.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionvue_core::Point3D;

    #[test]
    fn test_types_present() {
        let frames = vec![
            Frame::new(FramePayload::Ions(IonFrame::default())),
            Frame::new(FramePayload::Draw(DrawFrame::default())),
        ];
        assert_eq!(types_present(&frames), StreamMask::IONS | StreamMask::DRAW);
    }

    #[test]
    fn test_enabled_ion_lookup_respects_flags() {
        let mut table = RangeFile::new();
        table.add_ion("Fe", "Iron", ColourRGBAf::default()).unwrap();
        table.add_range(10.0, 12.0, 0).unwrap();
        let mut frame = RangeFrame::all_enabled(Arc::new(table));

        assert_eq!(frame.enabled_ion_of(11.0), Some(0));
        frame.enabled_ranges[0] = false;
        assert_eq!(frame.enabled_ion_of(11.0), None);
        frame.enabled_ranges[0] = true;
        frame.enabled_ions[0] = false;
        assert_eq!(frame.enabled_ion_of(11.0), None);
    }

    #[test]
    fn test_frame_clone_shares_payload() {
        let frame = Frame::new(FramePayload::Ions(IonFrame {
            data: vec![IonHit::new(Point3D::ZERO, 1.0)],
            ..Default::default()
        }));
        let clone = frame.clone();
        assert!(Arc::ptr_eq(&frame.payload, &clone.payload));
    }
}
