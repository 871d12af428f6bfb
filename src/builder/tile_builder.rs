//! The tile assembler: a flat list of layers, serialized under the same
//! field number the reader expects.

use crate::builder::layer_builder::LayerBuilder;
use crate::tile::FIELD_LAYERS;
use crate::wire::ByteSink;

/// A tile under construction: an ordered list of layers, each serialized
/// independently and then wrapped as a `layers` submessage.
#[derive(Default)]
pub struct TileBuilder {
    layers: Vec<LayerBuilder>,
}

impl TileBuilder {
    pub fn new() -> TileBuilder {
        TileBuilder { layers: Vec::new() }
    }

    pub fn add_layer(&mut self, layer: LayerBuilder) {
        self.layers.push(layer);
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut sink = ByteSink::new();
        for layer in &self.layers {
            sink.write_submessage(FIELD_LAYERS, &layer.serialize());
        }
        sink.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::VectorTile;

    #[test]
    fn empty_tile_builder_round_trips() {
        let builder = TileBuilder::new();
        let bytes = builder.serialize();
        let tile = VectorTile::from_bytes(&bytes).unwrap();
        assert_eq!(tile.num_layers(), 0);
    }

    #[test]
    fn two_layers_round_trip_in_order() {
        let mut builder = TileBuilder::new();
        builder.add_layer(LayerBuilder::new("roads", 2, 4096).unwrap());
        builder.add_layer(LayerBuilder::new("water", 2, 4096).unwrap());
        let bytes = builder.serialize();
        let tile = VectorTile::from_bytes(&bytes).unwrap();
        assert_eq!(tile.num_layers(), 2);
        assert_eq!(tile.get_layer(0).unwrap().name(), "roads");
        assert_eq!(tile.get_layer(1).unwrap().name(), "water");
    }
}
