//! Reader and writer for the Mapbox Vector Tile (MVT) protobuf format.
//!
//! It includes modules for:
//! - `wire`: borrowed-cursor protobuf primitives (varints, zigzag, submessages).
//! - `geom`: coordinate points, geometry kinds, and ring classification.
//! - `value`: attribute value types, table indices, and integer/real scaling.
//! - `handler`: the callback protocol geometry and attribute decoding drive.
//! - `geometry_decoder`: the command-stream state machine for points, lines, polygons, splines.
//! - `attribute_decoder`: v2 flat pairs and v3's recursive structured-value grammar.
//! - `layer` / `feature` / `tile`: the borrowed reader types for each message level.
//! - `builder`: the write side — dictionaries, transactional feature builders, and assembly.
//!
//! Reading borrows from the input buffer end to end; nothing is copied until
//! a caller asks for an owned `String` or similar. Writing goes the other
//! way: builders own everything they accumulate and serialize to a fresh
//! `Vec<u8>` on demand.

mod attribute_decoder;
pub mod builder;
mod error;
mod feature;
mod geom;
mod geometry_decoder;
mod handler;
mod layer;
mod tile;
mod value;
mod wire;

pub use error::{Error, Result};
pub use feature::Feature;
pub use geom::{classify_ring, signed_area2, GeometryType, Point, Point2, Point3, RingRole};
pub use handler::{AttributeHandler, GeometryHandler, NullAttributeHandler, NullGeometryHandler};
pub use layer::Layer;
pub use tile::{count_layers, is_vector_tile, VectorTile};
pub use value::{IndexValue, Scaling, Value};
