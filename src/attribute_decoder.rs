//! The attribute decoder: v2's flat key/value pairs and v3's recursive
//! structured-value stream (scalars, lists, maps, number-lists).

use crate::error::{Error, Result};
use crate::handler::AttributeHandler;
use crate::layer::Layer;
use crate::value::{IndexValue, Value};
use crate::wire::{zigzag_decode64, ByteCursor};

pub(crate) const KIND_INLINE_SINT: u64 = 0;
pub(crate) const KIND_INLINE_UINT: u64 = 1;
pub(crate) const KIND_BOOL: u64 = 2;
pub(crate) const KIND_NULL: u64 = 3;
pub(crate) const KIND_DOUBLE_INDEX: u64 = 4;
pub(crate) const KIND_FLOAT_INDEX: u64 = 5;
pub(crate) const KIND_STRING_INDEX: u64 = 6;
pub(crate) const KIND_INT_INDEX: u64 = 7;
pub(crate) const KIND_UINT_INDEX: u64 = 8;
pub(crate) const KIND_LIST: u64 = 9;
pub(crate) const KIND_MAP: u64 = 10;
pub(crate) const KIND_NUMBER_LIST: u64 = 11;

/// The reserved bit pattern marking a null entry inside a number-list.
const NUMBER_LIST_NULL: u64 = u64::MAX;

fn split_tag(raw: u64) -> (u64, u64) {
    (raw & 0xF, raw >> 4)
}

/// Decodes a v2 layer's flat `(key_index, value_index)` pairs. Both indices
/// are resolved against the layer's key and value tables before being
/// handed to the handler; depth is always `0`.
pub fn decode_v2_attributes<'a>(
    mut cursor: ByteCursor<'a>,
    layer: &Layer<'a>,
    handler: &mut impl AttributeHandler<'a>,
) -> Result<()> {
    while cursor.has_remaining() {
        let key_idx = cursor.read_varint()? as u32;
        let val_idx = cursor.read_varint()? as u32;
        handler.key_index(key_idx);
        let key = layer.key(key_idx)?;
        if !handler.attribute_key(key, 0) {
            continue;
        }
        handler.value_index(val_idx);
        let value = layer.value(val_idx)?.clone();
        if !handler.attribute_value(value, 0) {
            return Ok(());
        }
    }
    Ok(())
}

/// Decodes a v3 layer's structured-value attribute stream: repeated
/// `(key_index, structured_value)` pairs at depth `0`.
pub fn decode_v3_attributes<'a>(
    mut cursor: ByteCursor<'a>,
    layer: &Layer<'a>,
    handler: &mut impl AttributeHandler<'a>,
) -> Result<()> {
    while cursor.has_remaining() {
        let key_idx = cursor.read_varint()? as u32;
        handler.key_index(key_idx);
        let key = layer.string(key_idx)?;
        if handler.attribute_key(key, 0) {
            if !decode_structured_value(&mut cursor, layer, handler, 0)? {
                return Ok(());
            }
        } else {
            skip_structured_value(&mut cursor)?;
        }
    }
    Ok(())
}

/// Decodes one structured value, dispatching to the handler callback(s) for
/// its kind and recursing into list/map/number-list members.
///
/// Returns whether the caller should keep decoding further siblings at this
/// depth: `false` once any handler callback involved in decoding this value
/// returns `false`, per the handler protocol's short-circuit contract.
fn decode_structured_value<'a>(
    cursor: &mut ByteCursor<'a>,
    layer: &Layer<'a>,
    handler: &mut impl AttributeHandler<'a>,
    depth: u32,
) -> Result<bool> {
    let raw = cursor.read_varint()?;
    let (kind, payload) = split_tag(raw);
    let keep = match kind {
        KIND_INLINE_SINT => handler.attribute_value(Value::InlineSint(zigzag_decode64(payload)), depth),
        KIND_INLINE_UINT => handler.attribute_value(Value::InlineUint(payload), depth),
        KIND_BOOL => handler.attribute_value(Value::Bool(payload != 0), depth),
        KIND_NULL => handler.attribute_value(Value::Null, depth),
        KIND_DOUBLE_INDEX => {
            let v = layer.double(payload as u32)?;
            handler.attribute_value(Value::Double(v), depth)
        }
        KIND_FLOAT_INDEX => {
            let v = layer.float(payload as u32)?;
            handler.attribute_value(Value::Float(v), depth)
        }
        KIND_STRING_INDEX => {
            let v = layer.string(payload as u32)?;
            handler.attribute_value(Value::String(v), depth)
        }
        KIND_INT_INDEX => {
            let v = layer.int(payload as u32)?;
            handler.attribute_value(Value::Int(v), depth)
        }
        KIND_UINT_INDEX => {
            let v = layer.uint(payload as u32)?;
            handler.attribute_value(Value::UInt(v), depth)
        }
        KIND_LIST => {
            let count = payload as usize;
            if handler.start_list_attribute(count, depth) {
                let mut keep = true;
                for _ in 0..count {
                    if keep {
                        keep = decode_structured_value(cursor, layer, handler, depth + 1)?;
                    } else {
                        skip_structured_value(cursor)?;
                    }
                }
                handler.end_list_attribute(depth);
                keep
            } else {
                for _ in 0..count {
                    skip_structured_value(cursor)?;
                }
                true
            }
        }
        KIND_MAP => {
            let count = payload as usize;
            if handler.start_map_attribute(count, depth) {
                let mut keep = true;
                for _ in 0..count {
                    let key_idx = cursor.read_varint()? as u32;
                    handler.key_index(key_idx);
                    let key = layer.string(key_idx)?;
                    if keep && handler.attribute_key(key, depth + 1) {
                        keep = decode_structured_value(cursor, layer, handler, depth + 1)?;
                    } else {
                        skip_structured_value(cursor)?;
                    }
                }
                handler.end_map_attribute(depth);
                keep
            } else {
                for _ in 0..count {
                    cursor.read_varint()?;
                    skip_structured_value(cursor)?;
                }
                true
            }
        }
        KIND_NUMBER_LIST => {
            let count = payload as usize;
            let scaling_index = IndexValue::new(cursor.read_varint()? as u32);
            let mut keep = handler.start_number_list(count, scaling_index, depth);
            for _ in 0..count {
                let raw_v = cursor.read_varint()?;
                if keep {
                    keep = if raw_v == NUMBER_LIST_NULL {
                        handler.number_list_null_value(depth)
                    } else {
                        handler.number_list_value(zigzag_decode64(raw_v), depth)
                    };
                }
            }
            if keep {
                handler.end_number_list(depth);
            }
            keep
        }
        other => return Err(Error::format(format!("unknown structured value kind {other}"))),
    };
    Ok(keep)
}

/// Consumes one structured value's wire bytes without invoking any handler
/// callback, recursing into lists/maps/number-lists so the cursor stays
/// aligned with a sibling that was not skipped.
fn skip_structured_value(cursor: &mut ByteCursor) -> Result<()> {
    let raw = cursor.read_varint()?;
    let (kind, payload) = split_tag(raw);
    match kind {
        KIND_INLINE_SINT
        | KIND_INLINE_UINT
        | KIND_BOOL
        | KIND_NULL
        | KIND_DOUBLE_INDEX
        | KIND_FLOAT_INDEX
        | KIND_STRING_INDEX
        | KIND_INT_INDEX
        | KIND_UINT_INDEX => Ok(()),
        KIND_LIST => {
            for _ in 0..payload {
                skip_structured_value(cursor)?;
            }
            Ok(())
        }
        KIND_MAP => {
            for _ in 0..payload {
                cursor.read_varint()?;
                skip_structured_value(cursor)?;
            }
            Ok(())
        }
        KIND_NUMBER_LIST => {
            cursor.read_varint()?;
            for _ in 0..payload {
                cursor.read_varint()?;
            }
            Ok(())
        }
        other => Err(Error::format(format!("unknown structured value kind {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ByteSink;

    fn layer_with_tables(keys: &[&str], strings: &[&str], values: &[Value<'static>]) -> Vec<u8> {
        let mut sink = ByteSink::new();
        sink.write_pbf_key(1, 2);
        sink.write_string("l");
        for k in keys {
            sink.write_pbf_key(3, 2);
            sink.write_string(k);
        }
        for v in values {
            let mut vs = ByteSink::new();
            match v {
                Value::String(s) => {
                    vs.write_pbf_key(1, 2);
                    vs.write_string(s);
                }
                Value::Bool(b) => {
                    vs.write_pbf_key(7, 0);
                    vs.write_varint(u64::from(*b));
                }
                _ => unreachable!("test helper only covers string/bool"),
            }
            sink.write_pbf_key(4, 2);
            sink.write_length_delimited(&vs.into_vec());
        }
        for s in strings {
            sink.write_pbf_key(9, 2);
            sink.write_string(s);
        }
        sink.write_pbf_key(15, 0);
        sink.write_varint(3);
        sink.into_vec()
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl<'a> AttributeHandler<'a> for Recorder {
        fn attribute_key(&mut self, key: &'a str, depth: u32) -> bool {
            self.events.push(format!("key({key},{depth})"));
            true
        }
        fn attribute_value(&mut self, value: Value<'a>, depth: u32) -> bool {
            self.events.push(format!("value({value:?},{depth})"));
            true
        }
        fn start_list_attribute(&mut self, count: usize, depth: u32) -> bool {
            self.events.push(format!("list_begin({count},{depth})"));
            true
        }
        fn end_list_attribute(&mut self, depth: u32) -> bool {
            self.events.push(format!("list_end({depth})"));
            true
        }
        fn start_map_attribute(&mut self, count: usize, depth: u32) -> bool {
            self.events.push(format!("map_begin({count},{depth})"));
            true
        }
        fn end_map_attribute(&mut self, depth: u32) -> bool {
            self.events.push(format!("map_end({depth})"));
            true
        }
        fn start_number_list(&mut self, count: usize, scaling_index: IndexValue, depth: u32) -> bool {
            self.events
                .push(format!("numlist_begin({count},{},{depth})", scaling_index.raw()));
            true
        }
        fn number_list_value(&mut self, v: i64, depth: u32) -> bool {
            self.events.push(format!("numlist_value({v},{depth})"));
            true
        }
        fn number_list_null_value(&mut self, depth: u32) -> bool {
            self.events.push(format!("numlist_null({depth})"));
            true
        }
        fn end_number_list(&mut self, depth: u32) -> bool {
            self.events.push(format!("numlist_end({depth})"));
            true
        }
    }

    #[test]
    fn v2_pair_round_trips() {
        let layer_bytes = layer_with_tables(&["name"], &[], &[Value::String("x")]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        sink.write_varint(0);
        sink.write_varint(0);
        let attr_bytes = sink.into_vec();

        let mut r = Recorder::default();
        decode_v2_attributes(ByteCursor::new(&attr_bytes), &layer, &mut r).unwrap();
        assert_eq!(r.events, vec!["key(name,0)", "value(String(\"x\"),0)"]);
    }

    #[test]
    fn v3_inline_and_indexed_scalars() {
        let layer_bytes = layer_with_tables(&[], &["greeting"], &[]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        // key_index 0 ("greeting"), value = string_index(0)
        sink.write_varint(0);
        sink.write_varint((KIND_STRING_INDEX) | (0 << 4));
        // key_index 0 again, value = inline_uint(7)
        sink.write_varint(0);
        sink.write_varint(KIND_INLINE_UINT | (7 << 4));
        let attr_bytes = sink.into_vec();

        let mut r = Recorder::default();
        decode_v3_attributes(ByteCursor::new(&attr_bytes), &layer, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "key(greeting,0)",
                "value(String(\"greeting\"),0)",
                "key(greeting,0)",
                "value(InlineUint(7),0)",
            ]
        );
    }

    #[test]
    fn v3_number_list_with_null() {
        let layer_bytes = layer_with_tables(&[], &["elevations"], &[]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        sink.write_varint(0); // key_index
        sink.write_varint(KIND_NUMBER_LIST | (2 << 4)); // number_list, count 2
        sink.write_varint(5); // scaling_index
        sink.write_zigzag64(3);
        sink.write_varint(NUMBER_LIST_NULL);
        let attr_bytes = sink.into_vec();

        let mut r = Recorder::default();
        decode_v3_attributes(ByteCursor::new(&attr_bytes), &layer, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "key(elevations,0)",
                "numlist_begin(2,5,0)",
                "numlist_value(3,0)",
                "numlist_null(0)",
                "numlist_end(0)",
            ]
        );
    }

    #[test]
    fn v3_nested_list_of_maps() {
        let layer_bytes = layer_with_tables(&[], &["a", "b"], &[]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        sink.write_varint(0); // key_index "a"
        sink.write_varint(KIND_LIST | (1 << 4)); // list of 1
        sink.write_varint(KIND_MAP | (1 << 4)); // map of 1 pair
        sink.write_varint(1); // key_index "b"
        sink.write_varint(KIND_BOOL | (1 << 4)); // true
        let attr_bytes = sink.into_vec();

        let mut r = Recorder::default();
        decode_v3_attributes(ByteCursor::new(&attr_bytes), &layer, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "key(a,0)",
                "list_begin(1,0)",
                "map_begin(1,1)",
                "key(b,2)",
                "value(Bool(true),2)",
                "map_end(1)",
                "list_end(0)",
            ]
        );
    }

    #[test]
    fn skipped_key_still_consumes_nested_value() {
        struct RejectAll;
        impl<'a> AttributeHandler<'a> for RejectAll {
            fn attribute_key(&mut self, _key: &'a str, _depth: u32) -> bool {
                false
            }
        }

        let layer_bytes = layer_with_tables(&[], &["a"], &[]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        sink.write_varint(0);
        sink.write_varint(KIND_LIST | (2 << 4));
        sink.write_varint(KIND_INLINE_UINT | (1 << 4));
        sink.write_varint(KIND_INLINE_UINT | (2 << 4));
        // a trailing pair that must still be reachable if the cursor stayed aligned
        sink.write_varint(0);
        sink.write_varint(KIND_BOOL | (1 << 4));
        let attr_bytes = sink.into_vec();

        let mut r = RejectAll;
        decode_v3_attributes(ByteCursor::new(&attr_bytes), &layer, &mut r).unwrap();
    }

    #[test]
    fn number_list_value_false_stops_mid_list_but_keeps_the_stream_going() {
        struct StopAfterFirst {
            values: Vec<i64>,
            ended: bool,
        }
        impl<'a> AttributeHandler<'a> for StopAfterFirst {
            fn number_list_value(&mut self, v: i64, _depth: u32) -> bool {
                self.values.push(v);
                false
            }
            fn end_number_list(&mut self, _depth: u32) -> bool {
                self.ended = true;
                true
            }
        }

        let layer_bytes = layer_with_tables(&[], &["elevations", "next"], &[]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        sink.write_varint(0); // key_index "elevations"
        sink.write_varint(KIND_NUMBER_LIST | (3 << 4)); // number_list, count 3
        sink.write_varint(0); // scaling_index
        sink.write_zigzag64(1);
        sink.write_zigzag64(2);
        sink.write_zigzag64(3);
        // a trailing pair the decoder must not reach: the number list lives at
        // depth 0, so stopping mid-list there stops the whole remaining stream
        sink.write_varint(1); // key_index "next"
        sink.write_varint(KIND_BOOL | (1 << 4));
        let attr_bytes = sink.into_vec();

        let mut h = StopAfterFirst {
            values: Vec::new(),
            ended: false,
        };
        decode_v3_attributes(ByteCursor::new(&attr_bytes), &layer, &mut h).unwrap();
        assert_eq!(h.values, vec![1]);
        assert!(!h.ended);
    }

    #[test]
    fn attribute_value_false_stops_the_rest_of_the_v2_stream() {
        let layer_bytes = layer_with_tables(&["a", "b"], &[], &[Value::String("x"), Value::String("y")]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();

        let mut sink = ByteSink::new();
        sink.write_varint(0);
        sink.write_varint(0);
        sink.write_varint(1);
        sink.write_varint(1);
        let attr_bytes = sink.into_vec();

        struct StopAfterFirstValue(u32);
        impl<'a> AttributeHandler<'a> for StopAfterFirstValue {
            fn attribute_value(&mut self, _value: Value<'a>, _depth: u32) -> bool {
                self.0 += 1;
                false
            }
        }
        let mut h = StopAfterFirstValue(0);
        decode_v2_attributes(ByteCursor::new(&attr_bytes), &layer, &mut h).unwrap();
        assert_eq!(h.0, 1);
    }

    #[test]
    fn unknown_kind_is_format_error() {
        let layer_bytes = layer_with_tables(&[], &["a"], &[]);
        let layer = Layer::read(ByteCursor::new(&layer_bytes), 0).unwrap();
        let mut sink = ByteSink::new();
        sink.write_varint(0);
        sink.write_varint(13); // kind 13, no payload bits set
        let attr_bytes = sink.into_vec();
        let mut r = Recorder::default();
        let err = decode_v3_attributes(ByteCursor::new(&attr_bytes), &layer, &mut r).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
