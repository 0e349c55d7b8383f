//! Shared geometry utilities for the path analyzer.

use kurbo::{Point, Vec2};

/// Sign of an f64 as -1, 0 or 1.
pub(crate) fn fsign(x: f64) -> i32 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Twice the signed area of the triangle (p0, p1, p2):
/// cross(p1 - p0, p2 - p0).
pub(crate) fn dpara(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1 - p0).cross(p2 - p0)
}

/// cross(p1 - p0, p3 - p2).
pub(crate) fn cprod(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    (p1 - p0).cross(p3 - p2)
}

/// dot(p1 - p0, p2 - p0).
pub(crate) fn iprod(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1 - p0).dot(p2 - p0)
}

/// dot(p1 - p0, p3 - p2).
pub(crate) fn iprod1(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    (p1 - p0).dot(p3 - p2)
}

pub(crate) fn ddist(p: Point, q: Point) -> f64 {
    p.distance(q)
}

/// Point at parameter `lambda` on the segment from `a` to `b`.
pub(crate) fn interval(lambda: f64, a: Point, b: Point) -> Point {
    a.lerp(b, lambda)
}

/// Direction from p0 to p2 rotated 90° CCW and snapped to the grid axes.
pub(crate) fn dorth_infty(p0: Point, p2: Point) -> Vec2 {
    Vec2::new(-fsign(p2.y - p0.y) as f64, fsign(p2.x - p0.x) as f64)
}

/// Denominator used by the smoothing stage: the axis-snapped orthogonal
/// projection of p2 - p0.
pub(crate) fn ddenom(p0: Point, p2: Point) -> f64 {
    let r = dorth_infty(p0, p2);
    r.y * (p2.x - p0.x) - r.x * (p2.y - p0.y)
}

/// Evaluate the cubic Bezier (p0, p1, p2, p3) at `t`.
pub(crate) fn bezier(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let s = 1.0 - t;
    // Bernstein weights spelled out; this sits on the optimizer's
    // innermost sampling loop.
    let w0 = s * s * s;
    let w1 = 3.0 * s * s * t;
    let w2 = 3.0 * t * t * s;
    let w3 = t * t * t;
    Point::new(
        w0 * p0.x + w1 * p1.x + w2 * p2.x + w3 * p3.x,
        w0 * p0.y + w1 * p1.y + w2 * p2.y + w3 * p3.y,
    )
}

/// Parameter in [0, 1] where the cubic (p0..p3) is tangent to the
/// direction q1 - q0, or -1.0 when no such parameter exists.
pub(crate) fn tangent(p0: Point, p1: Point, p2: Point, p3: Point, q0: Point, q1: Point) -> f64 {
    let big_a = cprod(p0, p1, q0, q1);
    let big_b = cprod(p1, p2, q0, q1);
    let big_c = cprod(p2, p3, q0, q1);

    // The derivative's cross product with q1-q0 is a quadratic in t.
    let a = big_a - 2.0 * big_b + big_c;
    let b = -2.0 * big_a + 2.0 * big_b;
    let c = big_a;

    let d = b * b - 4.0 * a * c;
    if a == 0.0 || d < 0.0 {
        return -1.0;
    }
    let s = d.sqrt();
    let r1 = (-b + s) / (2.0 * a);
    let r2 = (-b - s) / (2.0 * a);
    if (0.0..=1.0).contains(&r1) {
        r1
    } else if (0.0..=1.0).contains(&r2) {
        r2
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpara_is_twice_triangle_area() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(4.0, 0.0);
        let c = Point::new(0.0, 3.0);
        assert_eq!(dpara(a, b, c), 12.0);
        assert_eq!(dpara(a, c, b), -12.0);
    }

    #[test]
    fn bezier_hits_endpoints() {
        let p0 = Point::new(0.0, 0.0);
        let p1 = Point::new(1.0, 2.0);
        let p2 = Point::new(3.0, 2.0);
        let p3 = Point::new(4.0, 0.0);
        assert_eq!(bezier(0.0, p0, p1, p2, p3), p0);
        assert_eq!(bezier(1.0, p0, p1, p2, p3), p3);
    }

    #[test]
    fn tangent_finds_the_horizontal_of_an_arch() {
        let p0 = Point::new(0.0, 0.0);
        let p1 = Point::new(1.0, 2.0);
        let p2 = Point::new(3.0, 1.0);
        let p3 = Point::new(4.0, 0.0);
        let t = tangent(p0, p1, p2, p3, Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((0.0..=1.0).contains(&t), "t = {}", t);
        // The curve is flat there: y barely moves around t.
        let eps = 1e-6;
        let before = bezier(t - eps, p0, p1, p2, p3).y;
        let after = bezier(t + eps, p0, p1, p2, p3).y;
        assert!((after - before).abs() < 1e-9);
    }

    #[test]
    fn tangent_unreachable_direction() {
        let p0 = Point::new(0.0, 0.0);
        let p1 = Point::new(1.0, 0.0);
        let p2 = Point::new(2.0, 0.0);
        let p3 = Point::new(3.0, 0.0);
        // A straight horizontal cubic is never tangent to the vertical.
        let t = tangent(p0, p1, p2, p3, Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert_eq!(t, -1.0);
    }
}
