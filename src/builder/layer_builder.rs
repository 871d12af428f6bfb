//! A layer under construction: its dictionaries, scaling tables, and the
//! committed feature buffer.

use crate::builder::dictionary::{Dictionary, ValueIndex};
use crate::builder::feature_builder::{
    LinestringFeatureBuilder, PointFeatureBuilder, PolygonFeatureBuilder, SplineFeatureBuilder,
};
use crate::builder::OwnedValue;
use crate::error::{Error, Result};
use crate::layer::{
    FIELD_ATTRIBUTE_SCALINGS, FIELD_ELEVATION_SCALING, FIELD_EXTENT, FIELD_FEATURES, FIELD_KEYS, FIELD_NAME,
    FIELD_TILE_X, FIELD_TILE_Y, FIELD_TILE_Z, FIELD_V2_VALUES, FIELD_V3_DOUBLES, FIELD_V3_FLOATS, FIELD_V3_INTS,
    FIELD_V3_STRINGS, FIELD_V3_UINTS, FIELD_VERSION,
};
use crate::value::Scaling;
use crate::wire::ByteSink;

fn intern_f32(list: &mut Vec<f32>, v: f32) -> u32 {
    if let Some(i) = list.iter().position(|&e| e.to_bits() == v.to_bits()) {
        return i as u32;
    }
    list.push(v);
    (list.len() - 1) as u32
}

fn intern_f64(list: &mut Vec<f64>, v: f64) -> u32 {
    if let Some(i) = list.iter().position(|&e| e.to_bits() == v.to_bits()) {
        return i as u32;
    }
    list.push(v);
    (list.len() - 1) as u32
}

fn intern_i64(list: &mut Vec<i64>, v: i64) -> u32 {
    if let Some(i) = list.iter().position(|&e| e == v) {
        return i as u32;
    }
    list.push(v);
    (list.len() - 1) as u32
}

fn intern_u64(list: &mut Vec<u64>, v: u64) -> u32 {
    if let Some(i) = list.iter().position(|&e| e == v) {
        return i as u32;
    }
    list.push(v);
    (list.len() - 1) as u32
}

/// A layer being assembled. Dictionaries assign stable indices as callers
/// intern keys/values; nothing is visible in [`LayerBuilder::serialize`]'s
/// output until a feature builder's `commit()` pushes it into
/// `committed_features`.
pub struct LayerBuilder {
    version: u32,
    name: String,
    extent: u32,
    tile_coords: Option<(u32, u32, u32)>,
    pub(crate) keys: Dictionary<String>,
    pub(crate) values: Box<dyn ValueIndex<OwnedValue>>,
    pub(crate) strings: Dictionary<String>,
    pub(crate) floats: Vec<f32>,
    pub(crate) doubles: Vec<f64>,
    pub(crate) ints: Vec<i64>,
    pub(crate) uints: Vec<u64>,
    elevation_scaling: Scaling,
    attribute_scalings: Vec<Scaling>,
    committed_features: Vec<Vec<u8>>,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>, version: u32, extent: u32) -> Result<LayerBuilder> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::format("layer name must not be empty"));
        }
        if !(2..=3).contains(&version) {
            return Err(Error::Version(version));
        }
        if extent == 0 {
            return Err(Error::format("layer extent must be positive"));
        }
        Ok(LayerBuilder {
            version,
            name,
            extent,
            tile_coords: None,
            keys: Dictionary::new(),
            values: Box::new(Dictionary::new()),
            strings: Dictionary::new(),
            floats: Vec::new(),
            doubles: Vec::new(),
            ints: Vec::new(),
            uints: Vec::new(),
            elevation_scaling: Scaling::default(),
            attribute_scalings: Vec::new(),
            committed_features: Vec::new(),
        })
    }

    /// Swaps in an externally-supplied collaborator for the v2 value table,
    /// e.g. a caller-owned ordered map instead of the default
    /// insertion-ordered [`Dictionary`].
    pub fn with_value_index(mut self, index: Box<dyn ValueIndex<OwnedValue>>) -> Self {
        self.values = index;
        self
    }

    pub fn set_tile_coords(&mut self, z: u32, x: u32, y: u32) -> Result<()> {
        if self.version != 3 {
            return Err(Error::format("tile coordinates are a v3-only layer field"));
        }
        if z > 30 {
            return Err(Error::Version(self.version));
        }
        self.tile_coords = Some((z, x, y));
        Ok(())
    }

    pub fn set_elevation_scaling(&mut self, scaling: Scaling) {
        self.elevation_scaling = scaling;
    }

    pub fn add_attribute_scaling(&mut self, scaling: Scaling) -> u32 {
        self.attribute_scalings.push(scaling);
        (self.attribute_scalings.len() - 1) as u32
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn intern_key(&mut self, key: String) -> u32 {
        if self.version == 3 {
            self.strings.intern(key)
        } else {
            self.keys.intern(key)
        }
    }

    pub(crate) fn intern_string(&mut self, s: String) -> u32 {
        self.strings.intern(s)
    }

    pub(crate) fn intern_v2_value(&mut self, value: OwnedValue) -> u32 {
        self.values.intern(value)
    }

    pub(crate) fn intern_float(&mut self, v: f32) -> u32 {
        intern_f32(&mut self.floats, v)
    }

    pub(crate) fn intern_double(&mut self, v: f64) -> u32 {
        intern_f64(&mut self.doubles, v)
    }

    pub(crate) fn intern_int(&mut self, v: i64) -> u32 {
        intern_i64(&mut self.ints, v)
    }

    pub(crate) fn intern_uint(&mut self, v: u64) -> u32 {
        intern_u64(&mut self.uints, v)
    }

    pub(crate) fn push_committed_feature(&mut self, bytes: Vec<u8>) {
        self.committed_features.push(bytes);
    }

    pub fn num_committed_features(&self) -> usize {
        self.committed_features.len()
    }

    pub fn begin_point_feature(&mut self) -> PointFeatureBuilder<'_> {
        PointFeatureBuilder::new(self)
    }

    pub fn begin_linestring_feature(&mut self) -> LinestringFeatureBuilder<'_> {
        LinestringFeatureBuilder::new(self)
    }

    pub fn begin_polygon_feature(&mut self) -> PolygonFeatureBuilder<'_> {
        PolygonFeatureBuilder::new(self)
    }

    pub fn begin_spline_feature(&mut self) -> Result<SplineFeatureBuilder<'_>> {
        if self.version != 3 {
            return Err(Error::format("splines are a v3-only geometry kind"));
        }
        Ok(SplineFeatureBuilder::new(self))
    }

    /// Serializes this layer into a standalone `Layer` protobuf message.
    pub fn serialize(&self) -> Vec<u8> {
        let mut sink = ByteSink::new();
        sink.write_pbf_key(FIELD_NAME, 2);
        sink.write_string(&self.name);

        for feature in &self.committed_features {
            sink.write_submessage(FIELD_FEATURES, feature);
        }

        if self.version != 3 {
            for key in self.keys.iter() {
                sink.write_pbf_key(FIELD_KEYS, 2);
                sink.write_string(key);
            }
            for value in self.values.entries() {
                let bytes = serialize_v2_value(&value);
                sink.write_submessage(FIELD_V2_VALUES, &bytes);
            }
        }

        sink.write_pbf_key(FIELD_EXTENT, 0);
        sink.write_varint(u64::from(self.extent));

        if let Some((z, x, y)) = self.tile_coords {
            sink.write_pbf_key(FIELD_TILE_Z, 0);
            sink.write_varint(u64::from(z));
            sink.write_pbf_key(FIELD_TILE_X, 0);
            sink.write_varint(u64::from(x));
            sink.write_pbf_key(FIELD_TILE_Y, 0);
            sink.write_varint(u64::from(y));
        }

        if self.version == 3 {
            for s in self.strings.iter() {
                sink.write_pbf_key(FIELD_V3_STRINGS, 2);
                sink.write_string(s);
            }
            let mut floats_sink = ByteSink::new();
            for &f in &self.floats {
                floats_sink.write_f32(f);
            }
            sink.write_submessage(FIELD_V3_FLOATS, &floats_sink.into_vec());

            let mut doubles_sink = ByteSink::new();
            for &d in &self.doubles {
                doubles_sink.write_f64(d);
            }
            sink.write_submessage(FIELD_V3_DOUBLES, &doubles_sink.into_vec());

            let mut ints_sink = ByteSink::new();
            for &i in &self.ints {
                ints_sink.write_zigzag64(i);
            }
            sink.write_submessage(FIELD_V3_INTS, &ints_sink.into_vec());

            let mut uints_sink = ByteSink::new();
            for &u in &self.uints {
                uints_sink.write_varint(u);
            }
            sink.write_submessage(FIELD_V3_UINTS, &uints_sink.into_vec());

            let elevation_bytes = serialize_scaling(&self.elevation_scaling);
            sink.write_submessage(FIELD_ELEVATION_SCALING, &elevation_bytes);

            for scaling in &self.attribute_scalings {
                let bytes = serialize_scaling(scaling);
                sink.write_submessage(FIELD_ATTRIBUTE_SCALINGS, &bytes);
            }
        }

        sink.write_pbf_key(FIELD_VERSION, 0);
        sink.write_varint(u64::from(self.version));

        sink.into_vec()
    }
}

pub(crate) fn serialize_scaling(s: &Scaling) -> Vec<u8> {
    let mut sink = ByteSink::new();
    sink.write_pbf_key(1, 0);
    sink.write_zigzag64(s.offset);
    sink.write_pbf_key(2, 1);
    sink.write_f64(s.multiplier);
    sink.write_pbf_key(3, 1);
    sink.write_f64(s.base);
    sink.into_vec()
}

fn serialize_v2_value(v: &OwnedValue) -> Vec<u8> {
    let mut sink = ByteSink::new();
    match v {
        OwnedValue::String(s) => {
            sink.write_pbf_key(1, 2);
            sink.write_string(s);
        }
        OwnedValue::Float(f) => {
            sink.write_pbf_key(2, 5);
            sink.write_f32(*f);
        }
        OwnedValue::Double(d) => {
            sink.write_pbf_key(3, 1);
            sink.write_f64(*d);
        }
        OwnedValue::Int(i) => {
            sink.write_pbf_key(4, 0);
            sink.write_varint(*i as u64);
        }
        OwnedValue::UInt(u) => {
            sink.write_pbf_key(5, 0);
            sink.write_varint(*u);
        }
        OwnedValue::Sint(i) => {
            sink.write_pbf_key(6, 0);
            sink.write_zigzag64(*i);
        }
        OwnedValue::Bool(b) => {
            sink.write_pbf_key(7, 0);
            sink.write_varint(u64::from(*b));
        }
        OwnedValue::Null | OwnedValue::InlineSint(_) | OwnedValue::InlineUint(_) => {
            // v2 has no wire representation for these; callers should not
            // reach a v2 layer builder with them.
        }
    }
    sink.into_vec()
}
