//! The tile reader: the outermost message, a flat list of layers.

use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::wire::ByteCursor;

pub(crate) const FIELD_LAYERS: u32 = 3;

/// A parsed vector tile: the offsets of each layer submessage, recorded in
/// a single pass over the buffer. Layers are parsed lazily, one at a time,
/// from [`VectorTile::layers`], [`VectorTile::get_layer`] or
/// [`VectorTile::get_layer_by_name`].
#[derive(Debug)]
pub struct VectorTile<'a> {
    layer_slices: Vec<&'a [u8]>,
}

impl<'a> VectorTile<'a> {
    /// Parses the tile-level message. Unknown fields with the `layers`
    /// field number are never produced by a conforming encoder but unknown
    /// *other* fields are tolerated only when length-delimited; any other
    /// wire type on an unrecognized field is a format error.
    pub fn from_bytes(buf: &'a [u8]) -> Result<VectorTile<'a>> {
        let mut cursor = ByteCursor::new(buf);
        let mut layer_slices = Vec::new();
        while cursor.has_remaining() {
            let (field, wire) = cursor.read_pbf_key()?;
            if field == FIELD_LAYERS {
                layer_slices.push(cursor.read_length_delimited()?);
            } else if wire == 2 {
                log::trace!("skipping unknown tile-level field {field}");
                cursor.read_length_delimited()?;
            } else {
                return Err(Error::format(format!(
                    "unknown tile-level field {field} has non length-delimited wire type {wire}"
                )));
            }
        }
        Ok(VectorTile { layer_slices })
    }

    pub fn num_layers(&self) -> usize {
        self.layer_slices.len()
    }

    pub fn layers(&self) -> impl Iterator<Item = Result<Layer<'a>>> + '_ {
        self.layer_slices
            .iter()
            .enumerate()
            .map(|(i, bytes)| Layer::read(ByteCursor::new(bytes), i as u32))
    }

    pub fn get_layer(&self, i: usize) -> Result<Layer<'a>> {
        let bytes = self
            .layer_slices
            .get(i)
            .ok_or_else(|| Error::out_of_range(i as u64, self.layer_slices.len(), None))?;
        Layer::read(ByteCursor::new(bytes), i as u32)
    }

    /// Returns the first layer with the given name, if any.
    pub fn get_layer_by_name(&self, name: &str) -> Result<Option<Layer<'a>>> {
        for layer in self.layers() {
            let layer = layer?;
            if layer.name() == name {
                return Ok(Some(layer));
            }
        }
        Ok(None)
    }
}

/// Heuristically checks whether `buf` parses as a tile-level protobuf
/// message consisting only of known tile-level fields.
pub fn is_vector_tile(buf: &[u8]) -> bool {
    VectorTile::from_bytes(buf).is_ok()
}

/// Counts top-level layer submessages without materializing any `Layer`.
pub fn count_layers(buf: &[u8]) -> Result<usize> {
    Ok(VectorTile::from_bytes(buf)?.num_layers())
}
