//! The handler protocol that geometry and attribute decoding drive.
//!
//! Every decoding entry point is parameterized over a handler exposing a
//! subset of callbacks. All methods have a no-op default that returns
//! `true` ("handled, keep going"); a handler only overrides the callbacks
//! it cares about. Returning `false` from any method short-circuits the
//! current decode and the call returns `Ok(())` immediately — cancellation
//! is expressed through the return value, not through errors.

use crate::geom::{Point, RingRole};
use crate::value::{IndexValue, Value};

/// Callbacks for geometry decoding: points, linestrings, polygon rings, and
/// (v3) splines.
#[allow(unused_variables)]
pub trait GeometryHandler<P: Point> {
    fn points_begin(&mut self, count: usize) -> bool {
        true
    }
    fn points_point(&mut self, p: P) -> bool {
        true
    }
    fn points_end(&mut self) -> bool {
        true
    }

    fn linestring_begin(&mut self, count: usize) -> bool {
        true
    }
    fn linestring_point(&mut self, p: P) -> bool {
        true
    }
    fn linestring_end(&mut self) -> bool {
        true
    }

    fn ring_begin(&mut self, count: usize) -> bool {
        true
    }
    fn ring_point(&mut self, p: P) -> bool {
        true
    }
    fn ring_end(&mut self, role: RingRole) -> bool {
        true
    }

    fn controlpoints_begin(&mut self, count: usize) -> bool {
        true
    }
    fn controlpoints_point(&mut self, p: P) -> bool {
        true
    }
    fn controlpoints_end(&mut self) -> bool {
        true
    }
    fn knots_begin(&mut self, count: usize, scaling_index: IndexValue) -> bool {
        true
    }
    fn knots_value(&mut self, v: i64) -> bool {
        true
    }
    fn knots_end(&mut self) -> bool {
        true
    }

    /// Whether the caller wants 3D coordinates materialized. The decoder
    /// still reads whatever the feature's `has_3d_geometry` flag says the
    /// wire format carries; this only affects which point type is used.
    fn dimensions(&self) -> u8 {
        2
    }

    /// How many geometric (per-vertex) attribute streams the caller wants
    /// surfaced; `0` means the decoder should not bother decoding them.
    fn max_geometric_attributes(&self) -> usize {
        0
    }
}

/// Callbacks for attribute decoding: flat v2 key/value pairs, or the
/// recursive v3 structured-value grammar (scalars, lists, maps,
/// number-lists).
#[allow(unused_variables)]
pub trait AttributeHandler<'a> {
    fn key_index(&mut self, idx: u32) -> bool {
        true
    }
    fn value_index(&mut self, idx: u32) -> bool {
        true
    }

    fn attribute_key(&mut self, key: &'a str, depth: u32) -> bool {
        true
    }
    fn attribute_value(&mut self, value: Value<'a>, depth: u32) -> bool {
        true
    }

    fn start_list_attribute(&mut self, count: usize, depth: u32) -> bool {
        true
    }
    fn end_list_attribute(&mut self, depth: u32) -> bool {
        true
    }

    fn start_map_attribute(&mut self, count: usize, depth: u32) -> bool {
        true
    }
    fn end_map_attribute(&mut self, depth: u32) -> bool {
        true
    }

    fn start_number_list(&mut self, count: usize, scaling_index: IndexValue, depth: u32) -> bool {
        true
    }
    fn number_list_value(&mut self, v: i64, depth: u32) -> bool {
        true
    }
    fn number_list_null_value(&mut self, depth: u32) -> bool {
        true
    }
    fn end_number_list(&mut self, depth: u32) -> bool {
        true
    }

    fn max_geometric_attributes(&self) -> usize {
        0
    }
}

/// A no-op [`GeometryHandler`] used by callers who only want validation.
pub struct NullGeometryHandler;
impl<P: Point> GeometryHandler<P> for NullGeometryHandler {}

/// A no-op [`AttributeHandler`] used by callers who only want validation.
pub struct NullAttributeHandler;
impl<'a> AttributeHandler<'a> for NullAttributeHandler {}
