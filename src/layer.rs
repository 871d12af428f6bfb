//! The layer reader: header fields, string/value/scaling tables, and the
//! feature cursor.

use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::value::{IndexValue, Scaling, Value};
use crate::wire::ByteCursor;

pub(crate) const FIELD_NAME: u32 = 1;
pub(crate) const FIELD_FEATURES: u32 = 2;
pub(crate) const FIELD_KEYS: u32 = 3;
pub(crate) const FIELD_V2_VALUES: u32 = 4;
pub(crate) const FIELD_EXTENT: u32 = 5;
pub(crate) const FIELD_TILE_Z: u32 = 6;
pub(crate) const FIELD_TILE_X: u32 = 7;
pub(crate) const FIELD_TILE_Y: u32 = 8;
pub(crate) const FIELD_V3_STRINGS: u32 = 9;
pub(crate) const FIELD_V3_FLOATS: u32 = 10;
pub(crate) const FIELD_V3_DOUBLES: u32 = 11;
pub(crate) const FIELD_V3_INTS: u32 = 12;
pub(crate) const FIELD_V3_UINTS: u32 = 13;
pub(crate) const FIELD_ELEVATION_SCALING: u32 = 14;
pub(crate) const FIELD_VERSION: u32 = 15;
pub(crate) const FIELD_ATTRIBUTE_SCALINGS: u32 = 16;

/// A parsed layer: header plus lazily-resolved string/value/scaling tables
/// and the feature list. Everything here borrows from the tile buffer.
#[derive(Debug, Default)]
pub struct Layer<'a> {
    layer_num: u32,
    version: u32,
    name: &'a str,
    extent: u32,
    tile_coords: Option<(u32, u32, u32)>,
    keys: Vec<&'a str>,
    v2_values: Vec<Value<'a>>,
    v3_strings: Vec<&'a str>,
    v3_floats: Vec<f32>,
    v3_doubles: Vec<f64>,
    v3_ints: Vec<i64>,
    v3_uints: Vec<u64>,
    elevation_scaling: Scaling,
    attribute_scalings: Vec<Scaling>,
    feature_slices: Vec<&'a [u8]>,
}

pub(crate) fn read_scaling(cursor: &mut ByteCursor) -> Result<Scaling> {
    let mut s = Scaling::default();
    let mut sub = cursor.read_submessage()?;
    while sub.has_remaining() {
        match sub.read_pbf_key()? {
            (1, 0) => s.offset = sub.read_zigzag64()?,
            (2, 1) => s.multiplier = sub.read_f64()?,
            (3, 1) => s.base = sub.read_f64()?,
            (_, w) => sub.skip_field(w)?,
        }
    }
    Ok(s)
}

fn read_packed_f32<'a>(cursor: &mut ByteCursor<'a>) -> Result<Vec<f32>> {
    let mut sub = cursor.read_submessage()?;
    let mut out = Vec::new();
    while sub.has_remaining() {
        out.push(sub.read_f32()?);
    }
    Ok(out)
}

fn read_packed_f64<'a>(cursor: &mut ByteCursor<'a>) -> Result<Vec<f64>> {
    let mut sub = cursor.read_submessage()?;
    let mut out = Vec::new();
    while sub.has_remaining() {
        out.push(sub.read_f64()?);
    }
    Ok(out)
}

fn read_packed_zigzag64(cursor: &mut ByteCursor) -> Result<Vec<i64>> {
    let mut sub = cursor.read_submessage()?;
    let mut out = Vec::new();
    while sub.has_remaining() {
        out.push(sub.read_zigzag64()?);
    }
    Ok(out)
}

fn read_packed_varint(cursor: &mut ByteCursor) -> Result<Vec<u64>> {
    let mut sub = cursor.read_submessage()?;
    let mut out = Vec::new();
    while sub.has_remaining() {
        out.push(sub.read_varint()?);
    }
    Ok(out)
}

fn read_v2_value<'a>(cursor: &mut ByteCursor<'a>) -> Result<Value<'a>> {
    let mut sub = cursor.read_submessage()?;
    let mut value = None;
    while sub.has_remaining() {
        value = Some(match sub.read_pbf_key()? {
            (1, 2) => Value::String(sub.read_string()?),
            (2, 5) => Value::Float(sub.read_f32()?),
            (3, 1) => Value::Double(sub.read_f64()?),
            (4, 0) => Value::Int(sub.read_varint()? as i64),
            (5, 0) => Value::UInt(sub.read_varint()?),
            (6, 0) => Value::Sint(sub.read_varint().map(crate::wire::zigzag_decode64)?),
            (7, 0) => Value::Bool(sub.read_varint()? != 0),
            (_, w) => {
                sub.skip_field(w)?;
                continue;
            }
        });
    }
    value.ok_or_else(|| Error::format("value submessage has no recognized field"))
}

impl<'a> Layer<'a> {
    pub(crate) fn read(mut cursor: ByteCursor<'a>, layer_num: u32) -> Result<Layer<'a>> {
        let mut layer = Layer {
            layer_num,
            version: 1,
            extent: 4096,
            elevation_scaling: Scaling::default(),
            ..Default::default()
        };
        let mut name = None;
        let (mut tz, mut tx, mut ty) = (None, None, None);

        while cursor.has_remaining() {
            let (field, wire) = cursor.read_pbf_key()?;
            match field {
                FIELD_NAME => name = Some(cursor.read_string()?),
                FIELD_FEATURES => layer.feature_slices.push(cursor.read_length_delimited()?),
                FIELD_KEYS => layer.keys.push(cursor.read_string()?),
                FIELD_V2_VALUES => layer.v2_values.push(read_v2_value(&mut cursor)?),
                FIELD_EXTENT => layer.extent = cursor.read_varint()? as u32,
                FIELD_TILE_Z => tz = Some(cursor.read_varint()? as u32),
                FIELD_TILE_X => tx = Some(cursor.read_varint()? as u32),
                FIELD_TILE_Y => ty = Some(cursor.read_varint()? as u32),
                FIELD_V3_STRINGS => layer.v3_strings.push(cursor.read_string()?),
                FIELD_V3_FLOATS => layer.v3_floats = read_packed_f32(&mut cursor)?,
                FIELD_V3_DOUBLES => layer.v3_doubles = read_packed_f64(&mut cursor)?,
                FIELD_V3_INTS => layer.v3_ints = read_packed_zigzag64(&mut cursor)?,
                FIELD_V3_UINTS => {
                    layer.v3_uints = read_packed_varint(&mut cursor)?;
                }
                FIELD_ELEVATION_SCALING => layer.elevation_scaling = read_scaling(&mut cursor)?,
                FIELD_VERSION => layer.version = cursor.read_varint()? as u32,
                FIELD_ATTRIBUTE_SCALINGS => {
                    layer.attribute_scalings.push(read_scaling(&mut cursor)?);
                }
                _ => cursor.skip_field(wire)?,
            }
        }

        layer.name = name.ok_or_else(|| Error::format("layer name is required"))?;
        if layer.name.is_empty() {
            return Err(Error::format("layer name must not be empty"));
        }
        if !(1..=3).contains(&layer.version) {
            return Err(Error::Version(layer.version));
        }
        if layer.extent == 0 {
            return Err(Error::format("layer extent must be positive"));
        }
        if let (Some(z), Some(x), Some(y)) = (tz, tx, ty) {
            if z > 30 {
                return Err(Error::Version(layer.version));
            }
            layer.tile_coords = Some((z, x, y));
        }

        Ok(layer)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    pub fn tile_coords(&self) -> Option<(u32, u32, u32)> {
        self.tile_coords
    }

    pub fn num_features(&self) -> usize {
        self.feature_slices.len()
    }

    pub fn key_table(&self) -> &[&'a str] {
        &self.keys
    }

    pub fn value_table(&self) -> &[Value<'a>] {
        &self.v2_values
    }

    pub fn string_table(&self) -> &[&'a str] {
        &self.v3_strings
    }

    pub fn float_table(&self) -> &[f32] {
        &self.v3_floats
    }

    pub fn double_table(&self) -> &[f64] {
        &self.v3_doubles
    }

    pub fn int_table(&self) -> &[i64] {
        &self.v3_ints
    }

    pub fn uint_table(&self) -> &[u64] {
        &self.v3_uints
    }

    pub fn elevation_scaling(&self) -> Scaling {
        self.elevation_scaling
    }

    pub fn attribute_scaling(&self, index: IndexValue) -> Result<Scaling> {
        if !index.is_set() {
            return Ok(Scaling::default());
        }
        self.attribute_scalings
            .get(index.raw() as usize)
            .copied()
            .ok_or_else(|| {
                Error::out_of_range(
                    u64::from(index.raw()),
                    self.attribute_scalings.len(),
                    Some(self.layer_num),
                )
            })
    }

    pub fn key(&self, index: u32) -> Result<&'a str> {
        self.keys
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.keys.len(), Some(self.layer_num)))
    }

    pub fn value(&self, index: u32) -> Result<&Value<'a>> {
        self.v2_values
            .get(index as usize)
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.v2_values.len(), Some(self.layer_num)))
    }

    pub fn string(&self, index: u32) -> Result<&'a str> {
        self.v3_strings
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.v3_strings.len(), Some(self.layer_num)))
    }

    pub fn float(&self, index: u32) -> Result<f32> {
        self.v3_floats
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.v3_floats.len(), Some(self.layer_num)))
    }

    pub fn double(&self, index: u32) -> Result<f64> {
        self.v3_doubles
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.v3_doubles.len(), Some(self.layer_num)))
    }

    pub fn int(&self, index: u32) -> Result<i64> {
        self.v3_ints
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.v3_ints.len(), Some(self.layer_num)))
    }

    pub fn uint(&self, index: u32) -> Result<u64> {
        self.v3_uints
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range(u64::from(index), self.v3_uints.len(), Some(self.layer_num)))
    }

    pub fn layer_num(&self) -> u32 {
        self.layer_num
    }

    /// Iterates features in storage order. Borrows into the feature
    /// sub-buffer recorded during the single read pass; no re-parsing of
    /// the layer header happens per call.
    pub fn features(&self) -> impl Iterator<Item = Result<Feature<'a>>> + '_ {
        self.feature_slices
            .iter()
            .map(|bytes| Feature::read(ByteCursor::new(bytes), self.layer_num))
    }

    pub fn feature_at(&self, i: usize) -> Result<Feature<'a>> {
        let bytes = self
            .feature_slices
            .get(i)
            .ok_or_else(|| Error::out_of_range(i as u64, self.feature_slices.len(), Some(self.layer_num)))?;
        Feature::read(ByteCursor::new(bytes), self.layer_num)
    }

    /// Linear scan for the first feature with the given integer id.
    pub fn get_feature_by_id(&self, id: u64) -> Result<Option<Feature<'a>>> {
        for feature in self.features() {
            let feature = feature?;
            if feature.integer_id() == Some(id) {
                return Ok(Some(feature));
            }
        }
        Ok(None)
    }
}
