//! Random ion downsampling.
//!
//! Either keep each ion with a fixed probability, or keep an exact count
//! chosen uniformly without replacement. With a range stream upstream the
//! filter can instead work per species, giving each species its own
//! fraction or count over its pooled ions from every input frame.

use crate::filter::{Filter, FilterType, PropertyError, PropertyKind, PropertyValue};
use crate::filters::common::*;
use crate::stream::{Frame, FramePayload, IonFrame, StreamMask};
use crate::xml::XmlElem;
use ionvue_core::sampling::random_unique_indices;
use ionvue_core::{IonHit, RefreshContext, RefreshError, Result, ION_RECORD_SIZE, PROGRESS_CHUNK};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct DownsampleFilter {
    user_string: String,
    /// Fraction mode when true, else exact-count mode.
    fraction_mode: bool,
    fraction: f32,
    count: usize,
    per_species: bool,
    /// Deterministic seed for tests; entropy-seeded when `None`.
    seed: Option<u64>,
}

impl Default for DownsampleFilter {
    fn default() -> Self {
        Self {
            user_string: String::new(),
            fraction_mode: true,
            fraction: 0.1,
            count: 10_000,
            per_species: false,
            seed: None,
        }
    }
}

impl DownsampleFilter {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn sample_pool(
        &self,
        pool: Vec<IonHit>,
        rng: &mut StdRng,
        ctx: &RefreshContext,
    ) -> Result<Vec<IonHit>> {
        if self.fraction_mode {
            let mut kept = Vec::with_capacity((pool.len() as f32 * self.fraction) as usize + 1);
            for (n, ion) in pool.into_iter().enumerate() {
                if rng.gen::<f32>() < self.fraction {
                    kept.push(ion);
                }
                if n % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
                    return Err(RefreshError::Aborted);
                }
            }
            Ok(kept)
        } else {
            if self.count >= pool.len() {
                return Ok(pool);
            }
            let chosen = random_unique_indices(self.count, pool.len(), rng, &ctx.cancel)?;
            Ok(chosen.into_iter().map(|i| pool[i]).collect())
        }
    }
}

impl Filter for DownsampleFilter {
    fn filter_type(&self) -> FilterType {
        FilterType::Downsample
    }

    fn clone_uncached(&self) -> Box<dyn Filter> {
        Box::new(Self {
            user_string: self.user_string.clone(),
            fraction_mode: self.fraction_mode,
            fraction: self.fraction,
            count: self.count,
            per_species: self.per_species,
            seed: self.seed,
        })
    }

    fn refresh(
        &mut self,
        input: &[Frame],
        ctx: &RefreshContext,
        _console: &mut Vec<String>,
    ) -> Result<Vec<Frame>> {
        let mut rng = self.rng();
        let range = input.iter().find_map(Frame::as_range);

        if self.per_species && range.is_some() {
            let range = range.expect("checked above");
            let table = &range.table;
            let mut pools: Vec<Vec<IonHit>> = vec![Vec::new(); table.num_ions()];
            for frame in input.iter().filter_map(Frame::as_ions) {
                for ion in &frame.data {
                    if let Some(species) = range.enabled_ion_of(ion.mass_to_charge) {
                        pools[species].push(*ion);
                    }
                }
            }
            let mut out = Vec::new();
            for (species, pool) in pools.into_iter().enumerate() {
                if pool.is_empty() {
                    continue;
                }
                let data = self.sample_pool(pool, &mut rng, ctx)?;
                if data.is_empty() {
                    continue;
                }
                out.push(Frame::new(FramePayload::Ions(IonFrame {
                    data,
                    colour: table.ions()[species].colour,
                    ..Default::default()
                })));
            }
            Ok(out)
        } else {
            // Whole-stream mode keeps each input frame's display hints.
            let mut out = Vec::new();
            for frame in input.iter().filter_map(Frame::as_ions) {
                let data = self.sample_pool(frame.data.clone(), &mut rng, ctx)?;
                out.push(Frame::new(FramePayload::Ions(IonFrame {
                    data,
                    colour: frame.colour,
                    ion_size: frame.ion_size,
                    value_label: frame.value_label.clone(),
                })));
            }
            Ok(out)
        }
    }

    fn num_bytes_for_cache(&self, n_objects: usize) -> usize {
        let kept = if self.fraction_mode {
            (n_objects as f32 * self.fraction) as usize
        } else {
            self.count.min(n_objects)
        };
        kept * ION_RECORD_SIZE
    }

    fn emit_mask(&self) -> StreamMask {
        StreamMask::IONS
    }

    fn block_mask(&self) -> StreamMask {
        StreamMask::empty()
    }

    fn use_mask(&self) -> StreamMask {
        StreamMask::IONS | StreamMask::RANGE
    }

    fn properties(&self) -> Vec<PropertyValue> {
        vec![
            PropertyValue::new(
                "mode",
                if self.fraction_mode { "fraction" } else { "count" },
                PropertyKind::Choice,
            ),
            PropertyValue::new("fraction", self.fraction, PropertyKind::Real),
            PropertyValue::new("count", self.count, PropertyKind::Integer),
            PropertyValue::new("perspecies", bool_str(self.per_species), PropertyKind::Bool),
        ]
    }

    fn set_property(&mut self, key: &str, value: &str) -> std::result::Result<bool, PropertyError> {
        match key {
            "mode" => {
                self.fraction_mode = match value {
                    "fraction" => true,
                    "count" => false,
                    _ => return Err(PropertyError::InvalidValue("mode")),
                };
                Ok(true)
            }
            "fraction" => {
                self.fraction = value
                    .parse()
                    .ok()
                    .filter(|f: &f32| (0.0..=1.0).contains(f))
                    .ok_or(PropertyError::InvalidValue("fraction"))?;
                Ok(self.fraction_mode)
            }
            "count" => {
                self.count = value
                    .parse()
                    .map_err(|_| PropertyError::InvalidValue("count"))?;
                Ok(!self.fraction_mode)
            }
            "perspecies" => {
                self.per_species =
                    parse_bool(value).ok_or(PropertyError::InvalidValue("perspecies"))?;
                Ok(true)
            }
            _ => Err(PropertyError::UnknownKey(key.to_string())),
        }
    }

    fn write_state(&self) -> XmlElem {
        XmlElem::new(self.filter_type().type_string())
            .child(XmlElem::value_elem("userstring", &self.user_string))
            .child(XmlElem::value_elem(
                "mode",
                if self.fraction_mode { "fraction" } else { "count" },
            ))
            .child(XmlElem::value_elem("fraction", self.fraction))
            .child(XmlElem::value_elem("count", self.count))
            .child(XmlElem::value_elem(
                "perspecies",
                bool_str(self.per_species),
            ))
    }

    fn read_state(&mut self, elem: &XmlElem) -> Option<()> {
        self.user_string = elem.child_value("userstring").unwrap_or_default();
        self.fraction_mode = elem.child_value::<String>("mode")? == "fraction";
        if let Some(v) = elem.child_value("fraction") {
            self.fraction = v;
        }
        if let Some(v) = elem.child_value("count") {
            self.count = v;
        }
        if let Some(v) = elem.child_value::<String>("perspecies") {
            self.per_species = parse_bool(&v)?;
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
