//! The filter capability set and the closed registry of filter kinds.

use crate::stream::{Frame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::{Point3D, RefreshContext, Result, SelectionBinding};
use thiserror::Error;

/// The closed enumeration of filter kinds. The type string is the
/// canonical name used in persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    DataLoad,
    RangeFile,
    Downsample,
    Transform,
    Clip,
    SpectrumPlot,
    CompositionProfile,
    Voxelise,
    SpatialAnalysis,
    BoundingBox,
    Annotation,
}

impl FilterType {
    pub const ALL: [Self; 11] = [
        Self::DataLoad,
        Self::RangeFile,
        Self::Downsample,
        Self::Transform,
        Self::Clip,
        Self::SpectrumPlot,
        Self::CompositionProfile,
        Self::Voxelise,
        Self::SpatialAnalysis,
        Self::BoundingBox,
        Self::Annotation,
    ];

    pub fn type_string(&self) -> &'static str {
        match self {
            Self::DataLoad => "posload",
            Self::RangeFile => "rangefile",
            Self::Downsample => "iondownsample",
            Self::Transform => "transform",
            Self::Clip => "ionclip",
            Self::SpectrumPlot => "spectrumplot",
            Self::CompositionProfile => "compositionprofile",
            Self::Voxelise => "voxelise",
            Self::SpatialAnalysis => "spatialanalysis",
            Self::BoundingBox => "boundbox",
            Self::Annotation => "annotation",
        }
    }

    pub fn from_type_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_string() == s)
    }
}

/// Property value kinds, for hosts that render an editor per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Integer,
    Real,
    Point,
    Colour,
    Choice,
    String,
    File,
}

/// One exposed property: stable key, display value, editor kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub key: String,
    pub value: String,
    pub kind: PropertyKind,
}

impl PropertyValue {
    pub fn new(key: impl Into<String>, value: impl ToString, kind: PropertyKind) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
            kind,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("No such property key: {0}")]
    UnknownKey(String),

    #[error("Value not valid for property {0}")]
    InvalidValue(&'static str),
}

/// Value delivered by an actuated selection binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BindingValue {
    Scalar(f32),
    Point(Point3D),
}

/// The capability set every filter kind implements.
///
/// Caching lives with the owning tree node, not the filter: a filter
/// computes frames on demand and must give identical output for identical
/// input as long as no property changed. `set_property` reports whether
/// the change invalidates previously computed output.
pub trait Filter: Send {
    fn filter_type(&self) -> FilterType;

    /// Deep copy, never carrying cached data.
    fn clone_uncached(&self) -> Box<dyn Filter>;

    /// Consume `input`, produce output frames. Emitted frame types must
    /// stay within the emit mask. Bad records are dropped with a console
    /// note, never silently.
    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        console: &mut Vec<String>,
    ) -> Result<Vec<Frame>>;

    /// Cache admission hint: approximate bytes to retain output for
    /// `n_objects` basic records.
    fn num_bytes_for_cache(&self, n_objects: usize) -> usize;

    fn emit_mask(&self) -> StreamMask;
    fn block_mask(&self) -> StreamMask;
    fn use_mask(&self) -> StreamMask;

    fn properties(&self) -> Vec<PropertyValue>;

    /// Set a property from its string form. Returns whether the output
    /// changes (callers clear caches on `true`).
    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError>;

    /// Persisted element, named by the canonical type string.
    fn write_state(&self) -> XmlElem;

    /// Restore from a persisted element. Missing optional attributes keep
    /// their defaults; `None` means the element is unusable.
    fn read_state(&mut self, elem: &XmlElem) -> Option<()>;

    fn user_string(&self) -> &str;
    fn set_user_string(&mut self, s: &str);

    /// True when an external resource this filter loaded has changed and
    /// the cache must be considered stale (monitor mode).
    fn monitor_stale(&self) -> bool {
        false
    }

    /// Feed an actuated selection binding back into a parameter.
    /// Returns whether anything changed.
    fn set_prop_from_binding(&mut self, _binding: SelectionBinding, _value: BindingValue) -> bool {
        false
    }
}

/// Construct a default-configured filter from its canonical type string.
pub fn create_filter(type_string: &str) -> Option<Box<dyn Filter>> {
    use crate::filters::*;
    Some(match FilterType::from_type_string(type_string)? {
        FilterType::DataLoad => Box::new(DataLoadFilter::default()),
        FilterType::RangeFile => Box::new(RangeFileFilter::default()),
        FilterType::Downsample => Box::new(DownsampleFilter::default()),
        FilterType::Transform => Box::new(TransformFilter::default()),
        FilterType::Clip => Box::new(ClipFilter::default()),
        FilterType::SpectrumPlot => Box::new(SpectrumPlotFilter::default()),
        FilterType::CompositionProfile => Box::new(CompositionProfileFilter::default()),
        FilterType::Voxelise => Box::new(VoxeliseFilter::default()),
        FilterType::SpatialAnalysis => Box::new(SpatialAnalysisFilter::default()),
        FilterType::BoundingBox => Box::new(BoundingBoxFilter::default()),
        FilterType::Annotation => Box::new(AnnotationFilter::default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_string_round_trip() {
        for t in FilterType::ALL {
            assert_eq!(FilterType::from_type_string(t.type_string()), Some(t));
        }
        assert_eq!(FilterType::from_type_string("no-such-filter"), None);
    }

    #[test]
    fn test_registry_masks_are_disjoint() {
        for t in FilterType::ALL {
            let f = create_filter(t.type_string()).unwrap();
            assert_eq!(
                f.emit_mask() & f.block_mask(),
                StreamMask::empty(),
                "emit/block overlap for {t:?}"
            );
        }
    }
}
