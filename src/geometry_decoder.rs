//! The geometry command-stream state machine (MVT spec section 4.3).
//!
//! A command stream is a sequence of `(command, parameters)` groups: a
//! command integer packs a 3-bit command id and a 29-bit repeat count,
//! followed by that many zigzag-delta coordinate pairs (or triples, for
//! v3 3D features). The decoder keeps a running cursor starting at the
//! origin and advances it by each delta before handing the absolute point
//! to the caller's handler.

use crate::error::{Error, Result};
use crate::geom::{classify_ring, GeometryType, Point, RingRole};
use crate::handler::GeometryHandler;
use crate::value::IndexValue;
use crate::wire::ByteCursor;

const CMD_MOVE_TO: u8 = 1;
const CMD_LINE_TO: u8 = 2;
const CMD_CLOSE_PATH: u8 = 7;

fn read_command(cursor: &mut ByteCursor) -> Result<(u8, u32)> {
    let raw = cursor.read_varint()?;
    let v32 = u32::try_from(raw).map_err(|_| Error::geometry("command integer exceeds 32 bits"))?;
    Ok(((v32 & 0x07) as u8, v32 >> 3))
}

/// Bounds a claimed repeat count against the bytes actually remaining,
/// before any looping starts. Every varint parameter is at least one byte,
/// so `count * words_per_point` is a safe lower bound on the bytes a
/// well-formed stream must still contain; a tile that lies about its count
/// to force an enormous loop is rejected here instead of mid-iteration.
fn check_params_available(cursor: &ByteCursor, count: u32, words_per_point: u32) -> Result<()> {
    let needed = u64::from(count) * u64::from(words_per_point);
    if (cursor.remaining() as u64) < needed {
        return Err(Error::geometry(
            "command parameters exhausted (spec 4.3)",
        ));
    }
    Ok(())
}

fn read_delta_point<P: Point>(cursor: &mut ByteCursor, cx: &mut i32, cy: &mut i32, three_d: bool) -> Result<P> {
    let dx = cursor.read_zigzag32()?;
    let dy = cursor.read_zigzag32()?;
    *cx += dx;
    *cy += dy;
    let mut p = P::new(*cx, *cy);
    if three_d {
        let dz = cursor.read_zigzag64()?;
        p.add_to_z(dz);
    }
    Ok(p)
}

/// Decodes a `Point` / `MultiPoint` geometry: exactly one `MoveTo` command
/// whose count gives the number of points.
pub fn decode_point<P: Point>(
    mut cursor: ByteCursor,
    three_d: bool,
    handler: &mut impl GeometryHandler<P>,
) -> Result<()> {
    if !cursor.has_remaining() {
        return Err(Error::geometry("Expected MoveTo command (spec 4.3.4.2)"));
    }
    let (id, count) = read_command(&mut cursor)?;
    if id != CMD_MOVE_TO {
        return Err(Error::geometry("Expected MoveTo command (spec 4.3.4.2)"));
    }
    if count == 0 {
        return Err(Error::geometry("MoveTo command count is zero, spec 4.3.4.2"));
    }
    check_params_available(&cursor, count, if three_d { 3 } else { 2 })?;

    if !handler.points_begin(count as usize) {
        return Ok(());
    }
    let (mut cx, mut cy) = (0i32, 0i32);
    for _ in 0..count {
        let p: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;
        if !handler.points_point(p) {
            return Ok(());
        }
    }
    handler.points_end();

    if cursor.has_remaining() {
        return Err(Error::geometry(
            "Additional data after end of geometry, spec 4.3.4.2",
        ));
    }
    Ok(())
}

/// Decodes zero or more linestrings: each is `MoveTo(1)` followed by
/// `LineTo(n>=1)`.
pub fn decode_linestring<P: Point>(
    mut cursor: ByteCursor,
    three_d: bool,
    handler: &mut impl GeometryHandler<P>,
) -> Result<()> {
    while cursor.has_remaining() {
        let (mid, mcount) = read_command(&mut cursor)?;
        if mid != CMD_MOVE_TO {
            return Err(Error::geometry("Expected MoveTo command (spec 4.3.4.3)"));
        }
        if mcount != 1 {
            return Err(Error::geometry(
                "MoveTo command count is not 1, spec 4.3.4.3",
            ));
        }
        check_params_available(&cursor, 1, if three_d { 3 } else { 2 })?;
        let (mut cx, mut cy) = (0i32, 0i32);
        let origin: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;

        let (lid, lcount) = read_command(&mut cursor)?;
        if lid != CMD_LINE_TO {
            return Err(Error::geometry("Expected LineTo command, spec 4.3.4.3"));
        }
        if lcount == 0 {
            return Err(Error::geometry("LineTo command count is zero, spec 4.3.4.3"));
        }
        check_params_available(&cursor, lcount, if three_d { 3 } else { 2 })?;

        if !handler.linestring_begin(1 + lcount as usize) {
            return Ok(());
        }
        if !handler.linestring_point(origin) {
            return Ok(());
        }
        for _ in 0..lcount {
            let p: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;
            if !handler.linestring_point(p) {
                return Ok(());
            }
        }
        handler.linestring_end();
    }
    Ok(())
}

/// Decodes zero or more polygon rings: `MoveTo(1)`, `LineTo(n>=1)`,
/// `ClosePath(1)`. Ring role is derived from the shoelace signed area.
pub fn decode_polygon<P: Point>(
    mut cursor: ByteCursor,
    three_d: bool,
    handler: &mut impl GeometryHandler<P>,
) -> Result<()> {
    while cursor.has_remaining() {
        let (mid, mcount) = read_command(&mut cursor)?;
        if mid != CMD_MOVE_TO {
            return Err(Error::geometry("Expected MoveTo command (spec 4.3.4.4)"));
        }
        if mcount != 1 {
            return Err(Error::geometry(
                "MoveTo command count is not 1, spec 4.3.4.4",
            ));
        }
        check_params_available(&cursor, 1, if three_d { 3 } else { 2 })?;
        let (mut cx, mut cy) = (0i32, 0i32);
        let origin: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;

        let (lid, lcount) = read_command(&mut cursor)?;
        if lid != CMD_LINE_TO {
            return Err(Error::geometry("Expected LineTo command, spec 4.3.4.4"));
        }
        if lcount == 0 {
            return Err(Error::geometry("LineTo command count is zero, spec 4.3.4.4"));
        }
        check_params_available(&cursor, lcount, if three_d { 3 } else { 2 })?;

        let mut ring_points: Vec<P> = Vec::with_capacity(lcount as usize + 2);
        let mut flat: Vec<(i32, i32)> = Vec::with_capacity(lcount as usize + 1);
        ring_points.push(origin);
        flat.push((origin.x(), origin.y()));
        for _ in 0..lcount {
            let p: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;
            flat.push((p.x(), p.y()));
            ring_points.push(p);
        }

        let (cid, ccount) = read_command(&mut cursor)?;
        if cid != CMD_CLOSE_PATH {
            return Err(Error::geometry("Expected ClosePath command, spec 4.3.4.4"));
        }
        if ccount != 1 {
            return Err(Error::geometry(
                "ClosePath command count is not 1, spec 4.3.4.4",
            ));
        }
        ring_points.push(origin);

        let role = classify_ring(&flat);

        if !handler.ring_begin(ring_points.len()) {
            return Ok(());
        }
        for p in &ring_points {
            if !handler.ring_point(*p) {
                return Ok(());
            }
        }
        handler.ring_end(role);
    }
    Ok(())
}

/// Decodes a v3 spline: a control-point stream with the linestring grammar,
/// followed by a knot vector read from a separate sub-message.
///
/// Knot deltas are zigzag-decoded but emitted to the handler exactly as
/// read — they are not accumulated into a running cursor, since the knot
/// vector is a sequence of deltas between consecutive knot values, not a
/// sequence of absolute positions.
pub fn decode_spline<P: Point>(
    control_cursor: ByteCursor,
    mut knot_cursor: ByteCursor,
    three_d: bool,
    handler: &mut impl GeometryHandler<P>,
) -> Result<()> {
    decode_control_points(control_cursor, three_d, handler)?;

    if !knot_cursor.has_remaining() {
        return Ok(());
    }
    let count = knot_cursor.read_varint()?;
    let scaling_index = IndexValue::new(knot_cursor.read_varint()? as u32);
    let count = usize::try_from(count).map_err(|_| Error::geometry("knot count too large"))?;

    if !handler.knots_begin(count, scaling_index) {
        return Ok(());
    }
    for _ in 0..count {
        let delta = knot_cursor.read_zigzag64()?;
        if !handler.knots_value(delta) {
            return Ok(());
        }
    }
    if knot_cursor.has_remaining() {
        return Err(Error::geometry(
            "Additional data after end of knot vector, spec 4.3",
        ));
    }
    handler.knots_end();
    Ok(())
}

fn decode_control_points<P: Point>(
    mut cursor: ByteCursor,
    three_d: bool,
    handler: &mut impl GeometryHandler<P>,
) -> Result<()> {
    while cursor.has_remaining() {
        let (mid, mcount) = read_command(&mut cursor)?;
        if mid != CMD_MOVE_TO {
            return Err(Error::geometry("Expected MoveTo command (spec 4.3.4.3)"));
        }
        if mcount != 1 {
            return Err(Error::geometry(
                "MoveTo command count is not 1, spec 4.3.4.3",
            ));
        }
        check_params_available(&cursor, 1, if three_d { 3 } else { 2 })?;
        let (mut cx, mut cy) = (0i32, 0i32);
        let origin: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;

        let (lid, lcount) = read_command(&mut cursor)?;
        if lid != CMD_LINE_TO {
            return Err(Error::geometry("Expected LineTo command, spec 4.3.4.3"));
        }
        if lcount == 0 {
            return Err(Error::geometry("LineTo command count is zero, spec 4.3.4.3"));
        }
        check_params_available(&cursor, lcount, if three_d { 3 } else { 2 })?;

        if !handler.controlpoints_begin(1 + lcount as usize) {
            return Ok(());
        }
        if !handler.controlpoints_point(origin) {
            return Ok(());
        }
        for _ in 0..lcount {
            let p: P = read_delta_point(&mut cursor, &mut cx, &mut cy, three_d)?;
            if !handler.controlpoints_point(p) {
                return Ok(());
            }
        }
        handler.controlpoints_end();
    }
    Ok(())
}

/// Dispatches to the right decoder based on `geometry_type`.
pub fn decode_geometry<P: Point>(
    geometry_type: GeometryType,
    cursor: ByteCursor,
    knot_cursor: Option<ByteCursor>,
    three_d: bool,
    handler: &mut impl GeometryHandler<P>,
) -> Result<()> {
    match geometry_type {
        GeometryType::Unknown => Ok(()),
        GeometryType::Point => decode_point(cursor, three_d, handler),
        GeometryType::Linestring => decode_linestring(cursor, three_d, handler),
        GeometryType::Polygon => decode_polygon(cursor, three_d, handler),
        GeometryType::Spline => decode_spline(
            cursor,
            knot_cursor.unwrap_or_else(|| ByteCursor::new(&[])),
            three_d,
            handler,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point2;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl GeometryHandler<Point2> for Recorder {
        fn points_begin(&mut self, count: usize) -> bool {
            self.events.push(format!("points_begin({count})"));
            true
        }
        fn points_point(&mut self, p: Point2) -> bool {
            self.events.push(format!("points_point({},{})", p.x, p.y));
            true
        }
        fn points_end(&mut self) -> bool {
            self.events.push("points_end".into());
            true
        }
        fn linestring_begin(&mut self, count: usize) -> bool {
            self.events.push(format!("linestring_begin({count})"));
            true
        }
        fn linestring_point(&mut self, p: Point2) -> bool {
            self.events
                .push(format!("linestring_point({},{})", p.x, p.y));
            true
        }
        fn linestring_end(&mut self) -> bool {
            self.events.push("linestring_end".into());
            true
        }
        fn ring_begin(&mut self, count: usize) -> bool {
            self.events.push(format!("ring_begin({count})"));
            true
        }
        fn ring_point(&mut self, p: Point2) -> bool {
            self.events.push(format!("ring_point({},{})", p.x, p.y));
            true
        }
        fn ring_end(&mut self, role: RingRole) -> bool {
            self.events.push(format!("ring_end({role:?})"));
            true
        }
    }

    fn words(words: &[u32]) -> Vec<u8> {
        let mut sink = crate::wire::ByteSink::new();
        for w in words {
            sink.write_varint(u64::from(*w));
        }
        sink.into_vec()
    }

    /// scenario 1
    #[test]
    fn decode_point_single() {
        let bytes = words(&[9, 50, 34]);
        let mut r = Recorder::default();
        decode_point(ByteCursor::new(&bytes), false, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec!["points_begin(1)", "points_point(25,17)", "points_end"]
        );
    }

    /// scenario 2
    #[test]
    fn decode_multipoint() {
        let bytes = words(&[17, 10, 14, 3, 9]);
        let mut r = Recorder::default();
        decode_point(ByteCursor::new(&bytes), false, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "points_begin(2)",
                "points_point(5,7)",
                "points_point(3,2)",
                "points_end"
            ]
        );
    }

    /// scenario 3
    #[test]
    fn decode_linestring_basic() {
        let bytes = words(&[9, 4, 4, 18, 0, 16, 16, 0]);
        let mut r = Recorder::default();
        decode_linestring(ByteCursor::new(&bytes), false, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "linestring_begin(3)",
                "linestring_point(2,2)",
                "linestring_point(2,10)",
                "linestring_point(10,10)",
                "linestring_end",
            ]
        );
    }

    /// scenario 4
    #[test]
    fn decode_polygon_basic() {
        let bytes = words(&[9, 6, 12, 18, 10, 12, 24, 44, 15]);
        let mut r = Recorder::default();
        decode_polygon(ByteCursor::new(&bytes), false, &mut r).unwrap();
        assert_eq!(r.events[0], "ring_begin(4)");
        assert_eq!(r.events[1], "ring_point(3,6)");
        assert_eq!(r.events[2], "ring_point(8,12)");
        assert_eq!(r.events[3], "ring_point(20,34)");
        assert_eq!(r.events[4], "ring_point(3,6)");
        assert!(r.events[5].starts_with("ring_end"));
    }

    /// scenario 5
    #[test]
    fn linestring_fed_to_point_decoder_is_geometry_error() {
        let bytes = words(&[9, 4, 4, 18, 0, 16, 16, 0]);
        let mut r = Recorder::default();
        let err = decode_point(ByteCursor::new(&bytes), false, &mut r).unwrap_err();
        match err {
            Error::Geometry(msg) => assert!(msg.contains("Additional data")),
            other => panic!("expected geometry error, got {other:?}"),
        }
    }

    /// scenario 6
    #[test]
    fn empty_input_linestring_succeeds_point_fails() {
        let bytes: [u8; 0] = [];
        let mut r = Recorder::default();
        decode_linestring(ByteCursor::new(&bytes), false, &mut r).unwrap();
        assert!(r.events.is_empty());

        let mut r2 = Recorder::default();
        let err = decode_point(ByteCursor::new(&bytes), false, &mut r2).unwrap_err();
        match err {
            Error::Geometry(msg) => assert!(msg.contains("Expected MoveTo")),
            other => panic!("expected geometry error, got {other:?}"),
        }
    }

    #[test]
    fn zero_count_moveto_is_error() {
        let bytes = words(&[1]); // MoveTo, count 0
        let mut r = Recorder::default();
        let err = decode_point(ByteCursor::new(&bytes), false, &mut r).unwrap_err();
        assert!(matches!(err, Error::Geometry(_)));
    }

    #[test]
    fn zero_count_lineto_is_error() {
        let bytes = words(&[9, 4, 4, 2]); // MoveTo(1), LineTo count 0
        let mut r = Recorder::default();
        let err = decode_linestring(ByteCursor::new(&bytes), false, &mut r).unwrap_err();
        assert!(matches!(err, Error::Geometry(_)));
    }

    #[test]
    fn handler_false_short_circuits_linestring() {
        struct StopAfterBegin(u32);
        impl GeometryHandler<Point2> for StopAfterBegin {
            fn linestring_begin(&mut self, _count: usize) -> bool {
                self.0 += 1;
                false
            }
        }
        let bytes = words(&[9, 4, 4, 18, 0, 16, 16, 0, 9, 100, 100, 18, 2, 2]);
        let mut h = StopAfterBegin(0);
        decode_linestring(ByteCursor::new(&bytes), false, &mut h).unwrap();
        assert_eq!(h.0, 1);
    }

    #[test]
    fn huge_count_without_data_is_rejected_before_looping() {
        // count = (2^29 - 1), far exceeding the single byte of data present.
        let bytes = words(&[(0x1FFF_FFFF << 3) | 1, 0]);
        let mut r = Recorder::default();
        let err = decode_point(ByteCursor::new(&bytes), false, &mut r).unwrap_err();
        assert!(matches!(err, Error::Geometry(_)));
        assert!(r.events.is_empty());
    }
}
