//! The feature reader: header fields plus lazy geometry/attribute decoding.
//!
//! Construction only parses the feature's scalar header and records the
//! byte ranges of its geometry, knot, attribute, and geometric-attribute
//! sub-messages; none of those are decoded until the caller asks for them
//! with a handler.

use crate::attribute_decoder::{decode_v2_attributes, decode_v3_attributes};
use crate::error::{Error, Result};
use crate::geom::{GeometryType, Point};
use crate::geometry_decoder;
use crate::handler::{AttributeHandler, GeometryHandler};
use crate::layer::Layer;
use crate::value::{IndexValue, Scaling};
use crate::wire::ByteCursor;

pub(crate) const FIELD_ID: u32 = 1;
pub(crate) const FIELD_ATTRIBUTES: u32 = 2;
pub(crate) const FIELD_GEOM_TYPE: u32 = 3;
pub(crate) const FIELD_GEOMETRY: u32 = 4;
pub(crate) const FIELD_STRING_ID: u32 = 5;
pub(crate) const FIELD_HAS_3D: u32 = 6;
pub(crate) const FIELD_ELEVATION_SCALING_INDEX: u32 = 7;
pub(crate) const FIELD_KNOTS: u32 = 8;
pub(crate) const FIELD_GEOMETRIC_ATTRIBUTES: u32 = 9;

/// One feature's parsed header. Geometry and attributes are decoded on
/// demand via the handler protocol, never eagerly.
#[derive(Debug)]
pub struct Feature<'a> {
    #[allow(dead_code)]
    layer_num: u32,
    integer_id: Option<u64>,
    string_id: Option<&'a str>,
    geometry_type: GeometryType,
    has_3d_geometry: bool,
    elevation_scaling_index: IndexValue,
    geometry: &'a [u8],
    knots: Option<&'a [u8]>,
    attributes: Option<&'a [u8]>,
    geometric_attributes: Option<&'a [u8]>,
}

impl<'a> Feature<'a> {
    pub(crate) fn read(mut cursor: ByteCursor<'a>, layer_num: u32) -> Result<Feature<'a>> {
        let mut integer_id = None;
        let mut string_id = None;
        let mut geometry_type = GeometryType::Unknown;
        let mut has_3d_geometry = false;
        let mut elevation_scaling_index = IndexValue::NONE;
        let mut geometry: &'a [u8] = &[];
        let mut knots = None;
        let mut attributes = None;
        let mut geometric_attributes = None;

        while cursor.has_remaining() {
            let (field, wire) = cursor.read_pbf_key()?;
            match field {
                FIELD_ID => integer_id = Some(cursor.read_varint()?),
                FIELD_ATTRIBUTES => attributes = Some(cursor.read_length_delimited()?),
                FIELD_GEOM_TYPE => geometry_type = GeometryType::from(cursor.read_varint()?),
                FIELD_GEOMETRY => geometry = cursor.read_length_delimited()?,
                FIELD_STRING_ID => string_id = Some(cursor.read_string()?),
                FIELD_HAS_3D => has_3d_geometry = cursor.read_varint()? != 0,
                FIELD_ELEVATION_SCALING_INDEX => {
                    elevation_scaling_index = IndexValue::new(cursor.read_varint()? as u32);
                }
                FIELD_KNOTS => knots = Some(cursor.read_length_delimited()?),
                FIELD_GEOMETRIC_ATTRIBUTES => {
                    geometric_attributes = Some(cursor.read_length_delimited()?);
                }
                _ => cursor.skip_field(wire)?,
            }
        }

        if integer_id.is_some() && string_id.is_some() {
            return Err(Error::format("feature has both an integer and a string id"));
        }

        Ok(Feature {
            layer_num,
            integer_id,
            string_id,
            geometry_type,
            has_3d_geometry,
            elevation_scaling_index,
            geometry,
            knots,
            attributes,
            geometric_attributes,
        })
    }

    pub fn integer_id(&self) -> Option<u64> {
        self.integer_id
    }

    pub fn string_id(&self) -> Option<&'a str> {
        self.string_id
    }

    pub fn has_id(&self) -> bool {
        self.integer_id.is_some() || self.string_id.is_some()
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn has_3d_geometry(&self) -> bool {
        self.has_3d_geometry
    }

    pub fn has_attributes(&self) -> bool {
        self.attributes.is_some()
    }

    pub fn elevation_scaling_index(&self) -> IndexValue {
        self.elevation_scaling_index
    }

    /// Resolves the scaling this feature's elevation deltas should be read
    /// through: the layer's elevation scaling, unless the feature names an
    /// override index into the layer's attribute-scaling table.
    pub fn elevation_scaling(&self, layer: &Layer<'a>) -> Result<Scaling> {
        if self.elevation_scaling_index.is_set() {
            layer.attribute_scaling(self.elevation_scaling_index)
        } else {
            Ok(layer.elevation_scaling())
        }
    }

    pub fn decode_point<P: Point>(&self, handler: &mut impl GeometryHandler<P>) -> Result<()> {
        geometry_decoder::decode_point(ByteCursor::new(self.geometry), self.has_3d_geometry, handler)
    }

    pub fn decode_linestring<P: Point>(&self, handler: &mut impl GeometryHandler<P>) -> Result<()> {
        geometry_decoder::decode_linestring(ByteCursor::new(self.geometry), self.has_3d_geometry, handler)
    }

    pub fn decode_polygon<P: Point>(&self, handler: &mut impl GeometryHandler<P>) -> Result<()> {
        geometry_decoder::decode_polygon(ByteCursor::new(self.geometry), self.has_3d_geometry, handler)
    }

    pub fn decode_spline<P: Point>(&self, handler: &mut impl GeometryHandler<P>) -> Result<()> {
        let knot_cursor = self.knots.map_or_else(|| ByteCursor::new(&[][..]), ByteCursor::new);
        geometry_decoder::decode_spline(ByteCursor::new(self.geometry), knot_cursor, self.has_3d_geometry, handler)
    }

    /// Dispatches to the decoder matching this feature's geometry kind.
    pub fn decode_geometry<P: Point>(&self, handler: &mut impl GeometryHandler<P>) -> Result<()> {
        let knot_cursor = self.knots.map(ByteCursor::new);
        geometry_decoder::decode_geometry(
            self.geometry_type,
            ByteCursor::new(self.geometry),
            knot_cursor,
            self.has_3d_geometry,
            handler,
        )
    }

    pub fn decode_attributes(&self, layer: &Layer<'a>, handler: &mut impl AttributeHandler<'a>) -> Result<()> {
        let Some(bytes) = self.attributes else {
            return Ok(());
        };
        let cursor = ByteCursor::new(bytes);
        match layer.version() {
            1 | 2 => decode_v2_attributes(cursor, layer, handler),
            3 => decode_v3_attributes(cursor, layer, handler),
            v => Err(Error::Version(v)),
        }
    }

    /// Decodes the per-vertex geometric-attribute stream, using the same
    /// structured-value grammar as v3 feature attributes. A no-op if the
    /// handler declares it wants none (`max_geometric_attributes() == 0`).
    pub fn decode_geometric_attributes(&self, layer: &Layer<'a>, handler: &mut impl AttributeHandler<'a>) -> Result<()> {
        if handler.max_geometric_attributes() == 0 {
            return Ok(());
        }
        let Some(bytes) = self.geometric_attributes else {
            return Ok(());
        };
        decode_v3_attributes(ByteCursor::new(bytes), layer, handler)
    }
}
