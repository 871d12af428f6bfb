//! Per-geometry-kind feature builders: transactional wrappers around a
//! shared command/attribute assembly core.

use crate::attribute_decoder::{
    KIND_BOOL, KIND_DOUBLE_INDEX, KIND_FLOAT_INDEX, KIND_INLINE_SINT, KIND_INLINE_UINT, KIND_INT_INDEX, KIND_NULL,
    KIND_STRING_INDEX, KIND_UINT_INDEX,
};
use crate::builder::layer_builder::LayerBuilder;
use crate::builder::{OwnedValue, PropertyKey};
use crate::error::{Error, Result};
use crate::feature::{
    FIELD_ATTRIBUTES, FIELD_GEOMETRY, FIELD_GEOM_TYPE, FIELD_HAS_3D, FIELD_ID, FIELD_KNOTS, FIELD_STRING_ID,
};
use crate::geom::{classify_ring, GeometryType, RingRole};
use crate::value::IndexValue;
use crate::wire::{zigzag_encode64, ByteSink};

enum FeatureId {
    Integer(u64),
    Str(String),
}

/// State shared by all four geometry-kind-specific builders: the id, the
/// running delta cursor, and the in-progress command/attribute streams.
/// Nothing here is visible on the owning [`LayerBuilder`] until `commit`
/// is called on the wrapper that owns it.
struct Core<'a> {
    layer: &'a mut LayerBuilder,
    id: Option<FeatureId>,
    has_3d: bool,
    commands: ByteSink,
    knots: ByteSink,
    attrs: ByteSink,
    cx: i32,
    cy: i32,
    cz: i64,
    any_geometry: bool,
}

impl<'a> Core<'a> {
    fn new(layer: &'a mut LayerBuilder) -> Core<'a> {
        Core {
            layer,
            id: None,
            has_3d: false,
            commands: ByteSink::new(),
            knots: ByteSink::new(),
            attrs: ByteSink::new(),
            cx: 0,
            cy: 0,
            cz: 0,
            any_geometry: false,
        }
    }

    fn write_delta(&mut self, x: i32, y: i32, z: i64) {
        let dx = x - self.cx;
        let dy = y - self.cy;
        self.commands.write_zigzag32(dx);
        self.commands.write_zigzag32(dy);
        self.cx = x;
        self.cy = y;
        if self.has_3d {
            let dz = z - self.cz;
            self.commands.write_zigzag64(dz);
            self.cz = z;
        }
    }

    /// Emits a single `MoveTo(count)` command covering every point (used
    /// for `Point`/`MultiPoint` geometry, where there is no `LineTo`).
    fn write_points_command(&mut self, points: &[(i32, i32, i64)]) -> Result<()> {
        if points.is_empty() {
            return Err(Error::geometry("at least one point is required"));
        }
        let count = u32::try_from(points.len()).map_err(|_| Error::geometry("too many points"))?;
        self.commands.write_varint(u64::from((count << 3) | 1));
        for &(x, y, z) in points {
            self.write_delta(x, y, z);
        }
        self.any_geometry = true;
        Ok(())
    }

    /// Emits `MoveTo(1)` + `LineTo(n-1)` for one linestring segment. The
    /// running cursor is not reset, so a second call continues from where
    /// the previous segment ended — it does not restart at the origin.
    fn write_linestring_segment(&mut self, points: &[(i32, i32, i64)]) -> Result<()> {
        if points.len() < 2 {
            return Err(Error::geometry("a linestring needs at least 2 points"));
        }
        self.commands.write_varint(u64::from((1u32 << 3) | 1));
        self.write_delta(points[0].0, points[0].1, points[0].2);
        let rest = &points[1..];
        let lcount = u32::try_from(rest.len()).map_err(|_| Error::geometry("too many points"))?;
        self.commands.write_varint(u64::from((lcount << 3) | 2));
        for &(x, y, z) in rest {
            self.write_delta(x, y, z);
        }
        self.any_geometry = true;
        Ok(())
    }

    /// Emits `MoveTo(1)` + `LineTo(n-1)` + `ClosePath(1)` for one polygon
    /// ring, refusing to commit a ring whose signed area is zero.
    fn write_ring(&mut self, points: &[(i32, i32, i64)]) -> Result<RingRole> {
        if points.len() < 3 {
            return Err(Error::geometry("a ring needs at least 3 points"));
        }
        let flat: Vec<(i32, i32)> = points.iter().map(|&(x, y, _)| (x, y)).collect();
        let role = classify_ring(&flat);
        if role == RingRole::Invalid {
            return Err(Error::geometry("ring has zero signed area"));
        }
        self.write_linestring_segment(points)?;
        self.commands.write_varint(u64::from((1u32 << 3) | 7));
        Ok(role)
    }

    fn add_property(&mut self, key: PropertyKey, value: OwnedValue) -> Result<()> {
        let is_v3_only_kind = matches!(value, OwnedValue::Null | OwnedValue::InlineSint(_) | OwnedValue::InlineUint(_));
        if self.layer.version() != 3 && is_v3_only_kind {
            return Err(Error::format(
                "null/inline_sint/inline_uint are v3-only structured value kinds and have no v2 wire representation",
            ));
        }
        let key_idx = match key {
            PropertyKey::Index(i) => i,
            PropertyKey::Name(s) => self.layer.intern_key(s),
        };
        if self.layer.version() == 3 {
            self.attrs.write_varint(u64::from(key_idx));
            self.write_structured_value(&value);
        } else {
            let val_idx = self.layer.intern_v2_value(value);
            self.attrs.write_varint(u64::from(key_idx));
            self.attrs.write_varint(u64::from(val_idx));
        }
        Ok(())
    }

    fn write_structured_value(&mut self, value: &OwnedValue) {
        let (kind, payload): (u64, u64) = match value {
            OwnedValue::InlineSint(v) | OwnedValue::Sint(v) => (KIND_INLINE_SINT, zigzag_encode64(*v)),
            OwnedValue::InlineUint(v) => (KIND_INLINE_UINT, *v),
            OwnedValue::Bool(b) => (KIND_BOOL, u64::from(*b)),
            OwnedValue::Null => (KIND_NULL, 0),
            OwnedValue::Double(d) => (KIND_DOUBLE_INDEX, u64::from(self.layer.intern_double(*d))),
            OwnedValue::Float(f) => (KIND_FLOAT_INDEX, u64::from(self.layer.intern_float(*f))),
            OwnedValue::String(s) => (KIND_STRING_INDEX, u64::from(self.layer.intern_string(s.clone()))),
            OwnedValue::Int(i) => (KIND_INT_INDEX, u64::from(self.layer.intern_int(*i))),
            OwnedValue::UInt(u) => (KIND_UINT_INDEX, u64::from(self.layer.intern_uint(*u))),
        };
        self.attrs.write_varint((payload << 4) | kind);
    }

    fn set_knots(&mut self, scaling_index: IndexValue, deltas: &[i64]) -> Result<()> {
        let count = u64::try_from(deltas.len()).map_err(|_| Error::geometry("too many knots"))?;
        self.knots.write_varint(count);
        self.knots.write_varint(u64::from(scaling_index.raw()));
        for &d in deltas {
            self.knots.write_zigzag64(d);
        }
        Ok(())
    }

    fn commit(mut self, geometry_type: GeometryType) -> Result<()> {
        if !self.any_geometry {
            return Err(Error::geometry("feature has no geometry to commit"));
        }
        let mut sink = ByteSink::new();
        match self.id.take() {
            Some(FeatureId::Integer(v)) => {
                sink.write_pbf_key(FIELD_ID, 0);
                sink.write_varint(v);
            }
            Some(FeatureId::Str(s)) => {
                sink.write_pbf_key(FIELD_STRING_ID, 2);
                sink.write_string(&s);
            }
            None => {}
        }
        sink.write_pbf_key(FIELD_GEOM_TYPE, 0);
        sink.write_varint(geometry_type.as_u64());
        if self.has_3d {
            sink.write_pbf_key(FIELD_HAS_3D, 0);
            sink.write_varint(1);
        }
        let commands = std::mem::take(&mut self.commands).into_vec();
        sink.write_pbf_key(FIELD_GEOMETRY, 2);
        sink.write_length_delimited(&commands);

        if !self.knots.is_empty() {
            let knots = std::mem::take(&mut self.knots).into_vec();
            sink.write_pbf_key(FIELD_KNOTS, 2);
            sink.write_length_delimited(&knots);
        }

        if !self.attrs.is_empty() {
            let attrs = std::mem::take(&mut self.attrs).into_vec();
            sink.write_pbf_key(FIELD_ATTRIBUTES, 2);
            sink.write_length_delimited(&attrs);
        }

        self.layer.push_committed_feature(sink.into_vec());
        Ok(())
    }
}

/// Builds a `Point`/`MultiPoint` feature.
pub struct PointFeatureBuilder<'a>(Core<'a>);

impl<'a> PointFeatureBuilder<'a> {
    pub(crate) fn new(layer: &'a mut LayerBuilder) -> Self {
        PointFeatureBuilder(Core::new(layer))
    }

    pub fn set_id(&mut self, id: u64) {
        self.0.id = Some(FeatureId::Integer(id));
    }

    pub fn set_string_id(&mut self, id: impl Into<String>) {
        self.0.id = Some(FeatureId::Str(id.into()));
    }

    pub fn enable_3d(&mut self) {
        self.0.has_3d = true;
    }

    pub fn add_point(&mut self, x: i32, y: i32) -> Result<()> {
        self.0.write_points_command(&[(x, y, 0)])
    }

    pub fn add_point_3d(&mut self, x: i32, y: i32, z: i64) -> Result<()> {
        self.0.write_points_command(&[(x, y, z)])
    }

    pub fn add_points(&mut self, points: &[(i32, i32)]) -> Result<()> {
        let pts: Vec<_> = points.iter().map(|&(x, y)| (x, y, 0)).collect();
        self.0.write_points_command(&pts)
    }

    pub fn add_property(&mut self, key: impl Into<PropertyKey>, value: impl Into<OwnedValue>) -> Result<()> {
        self.0.add_property(key.into(), value.into())
    }

    pub fn commit(self) -> Result<()> {
        self.0.commit(GeometryType::Point)
    }

    pub fn rollback(self) {}
}

/// Builds a feature made of one or more linestrings.
pub struct LinestringFeatureBuilder<'a>(Core<'a>);

impl<'a> LinestringFeatureBuilder<'a> {
    pub(crate) fn new(layer: &'a mut LayerBuilder) -> Self {
        LinestringFeatureBuilder(Core::new(layer))
    }

    pub fn set_id(&mut self, id: u64) {
        self.0.id = Some(FeatureId::Integer(id));
    }

    pub fn set_string_id(&mut self, id: impl Into<String>) {
        self.0.id = Some(FeatureId::Str(id.into()));
    }

    pub fn enable_3d(&mut self) {
        self.0.has_3d = true;
    }

    /// Appends one linestring to the feature. Can be called more than
    /// once to build a multi-linestring; the coordinate cursor carries
    /// over between calls rather than resetting to the origin.
    pub fn add_linestring(&mut self, points: &[(i32, i32)]) -> Result<()> {
        let pts: Vec<_> = points.iter().map(|&(x, y)| (x, y, 0)).collect();
        self.0.write_linestring_segment(&pts)
    }

    pub fn add_property(&mut self, key: impl Into<PropertyKey>, value: impl Into<OwnedValue>) -> Result<()> {
        self.0.add_property(key.into(), value.into())
    }

    pub fn commit(self) -> Result<()> {
        self.0.commit(GeometryType::Linestring)
    }

    pub fn rollback(self) {}
}

/// Builds a feature made of one or more polygon rings.
pub struct PolygonFeatureBuilder<'a>(Core<'a>);

impl<'a> PolygonFeatureBuilder<'a> {
    pub(crate) fn new(layer: &'a mut LayerBuilder) -> Self {
        PolygonFeatureBuilder(Core::new(layer))
    }

    pub fn set_id(&mut self, id: u64) {
        self.0.id = Some(FeatureId::Integer(id));
    }

    pub fn set_string_id(&mut self, id: impl Into<String>) {
        self.0.id = Some(FeatureId::Str(id.into()));
    }

    pub fn enable_3d(&mut self) {
        self.0.has_3d = true;
    }

    /// Appends one ring. `points` must not repeat the first point as the
    /// last; the close is implicit. Refuses a ring whose signed area is
    /// zero (writer-side rejection is stricter than reader-side
    /// invalidity, which only flags it).
    pub fn add_ring(&mut self, points: &[(i32, i32)]) -> Result<RingRole> {
        let pts: Vec<_> = points.iter().map(|&(x, y)| (x, y, 0)).collect();
        self.0.write_ring(&pts)
    }

    pub fn add_property(&mut self, key: impl Into<PropertyKey>, value: impl Into<OwnedValue>) -> Result<()> {
        self.0.add_property(key.into(), value.into())
    }

    pub fn commit(self) -> Result<()> {
        self.0.commit(GeometryType::Polygon)
    }

    pub fn rollback(self) {}
}

/// Builds a v3 spline feature: a control-point stream plus a knot vector.
pub struct SplineFeatureBuilder<'a>(Core<'a>);

impl<'a> SplineFeatureBuilder<'a> {
    pub(crate) fn new(layer: &'a mut LayerBuilder) -> Self {
        SplineFeatureBuilder(Core::new(layer))
    }

    pub fn set_id(&mut self, id: u64) {
        self.0.id = Some(FeatureId::Integer(id));
    }

    pub fn set_string_id(&mut self, id: impl Into<String>) {
        self.0.id = Some(FeatureId::Str(id.into()));
    }

    pub fn enable_3d(&mut self) {
        self.0.has_3d = true;
    }

    pub fn add_control_points(&mut self, points: &[(i32, i32)]) -> Result<()> {
        let pts: Vec<_> = points.iter().map(|&(x, y)| (x, y, 0)).collect();
        self.0.write_linestring_segment(&pts)
    }

    pub fn set_knots(&mut self, scaling_index: IndexValue, deltas: &[i64]) -> Result<()> {
        self.0.set_knots(scaling_index, deltas)
    }

    pub fn add_property(&mut self, key: impl Into<PropertyKey>, value: impl Into<OwnedValue>) -> Result<()> {
        self.0.add_property(key.into(), value.into())
    }

    pub fn commit(self) -> Result<()> {
        self.0.commit(GeometryType::Spline)
    }

    pub fn rollback(self) {}
}
