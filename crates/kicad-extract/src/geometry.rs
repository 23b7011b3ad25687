//! Geometry shared by the schematic and board extractors.

use crate::types::{Arc, Point, Shape};
use std::f64::consts::PI;

/// Below this circumcircle determinant the three arc points count as colinear.
const COLINEAR_EPSILON: f64 = 1e-10;

/// Rotate `local` by `angle_deg` and translate to `origin`.
///
/// KiCad documents are Y-down, so a positive angle turns counter-clockwise
/// as seen on screen.
pub fn rotate_and_translate(local: Point, origin: Point, angle_deg: f64) -> Point {
    if angle_deg == 0.0 {
        return Point::new(local.x + origin.x, local.y + origin.y);
    }
    let angle_rad = -angle_deg * PI / 180.0;
    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();
    let rx = local.x * cos_a - local.y * sin_a;
    let ry = local.x * sin_a + local.y * cos_a;
    Point::new(rx + origin.x, ry + origin.y)
}

/// Circumscribed arc through `start`, `mid` and `end`.
///
/// Returns `None` when the points are colinear. `clockwise` is the on-screen
/// sense (Y-down), taken from the sign of `(mid - start) x (end - start)`.
pub fn arc_from_three_points(start: Point, mid: Point, end: Point) -> Option<Arc> {
    let (ax, ay) = (start.x, start.y);
    let (bx, by) = (mid.x, mid.y);
    let (cx, cy) = (end.x, end.y);

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < COLINEAR_EPSILON {
        return None;
    }

    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
    let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
    let center = Point::new(ux, uy);

    let cross = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);

    Some(Arc {
        start,
        mid,
        end,
        center,
        radius: start.distance(center),
        start_angle: (ay - uy).atan2(ax - ux) * 180.0 / PI,
        end_angle: (cy - uy).atan2(cx - ux) * 180.0 / PI,
        clockwise: cross > 0.0,
    })
}

/// Arc through three points, or the straight `start`-`end` segment when
/// they are colinear.
pub fn arc_or_line(start: Point, mid: Point, end: Point) -> Shape {
    match arc_from_three_points(start, mid, end) {
        Some(arc) => Shape::Arc(arc),
        None => {
            log::trace!("colinear arc points, drawing a line instead");
            Shape::Line { start, end }
        }
    }
}

/// Older arc grammar: centre, start point and a sweep in degrees
/// (positive is clockwise on screen).
pub fn arc_from_center(center: Point, start: Point, sweep_deg: f64) -> Shape {
    let sweep = |deg: f64| {
        let rad = deg * PI / 180.0;
        let (dx, dy) = (start.x - center.x, start.y - center.y);
        Point::new(
            center.x + dx * rad.cos() - dy * rad.sin(),
            center.y + dx * rad.sin() + dy * rad.cos(),
        )
    };
    arc_or_line(start, sweep(sweep_deg / 2.0), sweep(sweep_deg))
}

/// Split an axis-aligned rectangle into its four edges, clockwise from `start`.
pub fn rect_edges(start: Point, end: Point) -> [Shape; 4] {
    let corners = [
        start,
        Point::new(end.x, start.y),
        end,
        Point::new(start.x, end.y),
    ];
    [0, 1, 2, 3].map(|i| Shape::Line {
        start: corners[i],
        end: corners[(i + 1) % 4],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rotate_and_translate() {
        let p = rotate_and_translate(Point::new(1.0, 0.0), Point::new(10.0, 20.0), 90.0);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 19.0, epsilon = 1e-9);

        let p = rotate_and_translate(Point::new(1.0, 2.0), Point::new(3.0, 4.0), 0.0);
        assert_eq!(p, Point::new(4.0, 6.0));
    }

    #[test]
    fn test_arc_through_quarter_circle() {
        let arc = arc_from_three_points(
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(-1.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(arc.center.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(arc.center.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(arc.radius, 1.0, epsilon = 1e-9);
        assert_relative_eq!(arc.start_angle, 0.0, epsilon = 1e-9);
        assert_relative_eq!(arc.end_angle, 180.0, epsilon = 1e-9);
        assert!(arc.clockwise);
    }

    #[test]
    fn test_arc_direction_flips_with_mid() {
        let arc = arc_from_three_points(
            Point::new(1.0, 0.0),
            Point::new(0.0, -1.0),
            Point::new(-1.0, 0.0),
        )
        .unwrap();
        assert!(!arc.clockwise);
    }

    #[test]
    fn test_colinear_points_become_line() {
        let shape = arc_or_line(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        );
        assert_eq!(
            shape,
            Shape::Line {
                start: Point::new(0.0, 0.0),
                end: Point::new(2.0, 2.0),
            }
        );
    }

    #[test]
    fn test_legacy_arc_from_center() {
        let Shape::Arc(arc) = arc_from_center(Point::new(0.0, 0.0), Point::new(2.0, 0.0), 90.0)
        else {
            panic!("expected an arc");
        };
        assert_relative_eq!(arc.radius, 2.0, epsilon = 1e-9);
        assert_relative_eq!(arc.end.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(arc.end.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rect_edges_close_the_loop() {
        let edges = rect_edges(Point::new(0.0, 0.0), Point::new(4.0, 3.0));
        assert_eq!(edges.len(), 4);
        let Shape::Line { start, .. } = &edges[0] else {
            panic!("expected a line");
        };
        let Shape::Line { end, .. } = &edges[3] else {
            panic!("expected a line");
        };
        assert_eq!(start, end);
    }
}
