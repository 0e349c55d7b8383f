//! Curve construction from adjusted polygon vertices.
//!
//! Smoothing classifies every vertex as a corner or a curve point from
//! its local curvature parameter alpha and lays down one segment per
//! vertex, each ending at the midpoint towards the next vertex. The
//! optional optimization pass then replaces maximal runs of curve
//! segments with single fitted cubics where that stays within tolerance.

use kurbo::Point;

use crate::geom::{
    bezier, cprod, ddenom, ddist, dpara, fsign, interval, iprod, iprod1, tangent,
};

/// cos of the widest tangent angle (≈179.91°) the optimizer will bridge.
const TANGENT_COS_LIMIT: f64 = -0.999847695156;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    Corner,
    Curve,
}

/// One curve segment: tag, three control points (the third is the
/// on-curve endpoint), the polygon vertex it belongs to and the
/// smoothing parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segment {
    pub kind: SegmentKind,
    pub c: [Point; 3],
    pub vertex: Point,
    pub alpha: f64,
    pub alpha0: f64,
    pub beta: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Curve {
    pub segments: Vec<Segment>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

/// Build the smoothed curve for a closed vertex loop.
///
/// For each vertex, alpha measures how far it bulges from the chord
/// between its neighbors, normalized by the axis-snapped orthogonal
/// extent and rescaled by 1/0.75. At or above `alpha_max` the vertex
/// stays a corner; below, alpha is clamped to [0.55, 1] and the control
/// points interpolate from the neighbors towards the vertex.
pub(crate) fn smooth(vertices: &[Point], alpha_max: f64) -> Curve {
    let m = vertices.len();
    let mut segments = Vec::with_capacity(m);

    for j in 0..m {
        let i = (j + m - 1) % m;
        let k = (j + 1) % m;

        let denom = ddenom(vertices[i], vertices[k]);
        let mut alpha = if denom != 0.0 {
            let dd = (dpara(vertices[i], vertices[j], vertices[k]) / denom).abs();
            let raw = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
            raw / 0.75
        } else {
            4.0 / 3.0
        };
        let alpha0 = alpha;
        let endpoint = interval(0.5, vertices[k], vertices[j]);

        let segment = if alpha >= alpha_max {
            Segment {
                kind: SegmentKind::Corner,
                c: [vertices[j], vertices[j], endpoint],
                vertex: vertices[j],
                alpha,
                alpha0,
                beta: 0.5,
            }
        } else {
            alpha = alpha.clamp(0.55, 1.0);
            let c0 = interval(0.5 + 0.5 * alpha, vertices[i], vertices[j]);
            let c1 = interval(0.5 + 0.5 * alpha, vertices[k], vertices[j]);
            Segment {
                kind: SegmentKind::Curve,
                c: [c0, c1, endpoint],
                vertex: vertices[j],
                alpha,
                alpha0,
                beta: 0.5,
            }
        };
        segments.push(segment);
    }

    Curve { segments }
}

/// A candidate replacement for the run (i..j): fitted inner control
/// points, its penalty, and the chord parameters the fit used.
#[derive(Debug, Clone, Copy)]
struct Opti {
    pen: f64,
    c: [Point; 2],
    t: f64,
    s: f64,
    alpha: f64,
}

/// Penalty of replacing segments i..j (cyclic, exclusive of j's tail)
/// with one cubic, or `None` when no admissible fit exists.
#[allow(clippy::too_many_arguments)]
fn opti_penalty(
    curve: &Curve,
    i: usize,
    j: usize,
    tolerance: f64,
    convexity: &[i32],
    areas: &[f64],
) -> Option<Opti> {
    let m = curve.len();
    let segs = &curve.segments;
    if i == j {
        return None;
    }

    let i1 = (i + 1) % m;
    let mut k1 = (i + 1) % m;
    let conv = convexity[k1];
    if conv == 0 {
        return None;
    }

    // Every inner vertex must keep the run's convexity and no tangent
    // may turn past the angle limit.
    let d = ddist(segs[i].vertex, segs[i1].vertex);
    let mut k = k1;
    while k != j {
        k1 = (k + 1) % m;
        let k2 = (k + 2) % m;
        if convexity[k1] != conv {
            return None;
        }
        if fsign(cprod(
            segs[i].vertex,
            segs[i1].vertex,
            segs[k1].vertex,
            segs[k2].vertex,
        )) != conv
        {
            return None;
        }
        if iprod1(
            segs[i].vertex,
            segs[i1].vertex,
            segs[k1].vertex,
            segs[k2].vertex,
        ) < d * ddist(segs[k1].vertex, segs[k2].vertex) * TANGENT_COS_LIMIT
        {
            return None;
        }
        k = k1;
    }

    let p0 = segs[i % m].c[2];
    let mut p1 = segs[(i + 1) % m].vertex;
    let mut p2 = segs[j % m].vertex;
    let p3 = segs[j % m].c[2];

    // Area enclosed by the original run, from the prefix table.
    let mut area = areas[j] - areas[i];
    area -= dpara(segs[0].vertex, segs[i].c[2], segs[j].c[2]) / 2.0;
    if i >= j {
        area += areas[m];
    }

    // Fit a cubic whose signed area matches, via the three cross areas.
    let a1 = dpara(p0, p1, p2);
    let a2 = dpara(p0, p1, p3);
    let a3 = dpara(p0, p2, p3);
    let a4 = a1 + a3 - a2;
    if a2 == a1 {
        return None;
    }
    let t = a3 / (a3 - a4);
    let s = a2 / (a2 - a1);
    if !t.is_finite() || !s.is_finite() {
        return None;
    }
    let big_a = a2 * t / 2.0;
    if big_a == 0.0 {
        return None;
    }
    let relative = area / big_a;
    let discriminant = 4.0 - relative / 0.3;
    if discriminant < 0.0 {
        return None;
    }
    let alpha = 2.0 - discriminant.sqrt();

    let c0 = interval(t * alpha, p0, p1);
    let c1 = interval(s * alpha, p3, p2);
    let mut result = Opti {
        pen: 0.0,
        c: [c0, c1],
        t,
        s,
        alpha,
    };
    p1 = c0;
    p2 = c1;

    // Check the fit against every original vertex chord...
    let mut k = (i + 1) % m;
    while k != j {
        let k1 = (k + 1) % m;
        let t = tangent(p0, p1, p2, p3, segs[k].vertex, segs[k1].vertex);
        if t < -0.5 {
            return None;
        }
        let pt = bezier(t, p0, p1, p2, p3);
        let d = ddist(segs[k].vertex, segs[k1].vertex);
        if d == 0.0 {
            return None;
        }
        let d1 = dpara(segs[k].vertex, segs[k1].vertex, pt) / d;
        if d1.abs() > tolerance {
            return None;
        }
        if iprod(segs[k].vertex, segs[k1].vertex, pt) < 0.0
            || iprod(segs[k1].vertex, segs[k].vertex, pt) < 0.0
        {
            return None;
        }
        result.pen += d1 * d1;
        k = k1;
    }

    // ...and against every original control polygon edge.
    let mut k = i;
    while k != j {
        let k1 = (k + 1) % m;
        let t = tangent(p0, p1, p2, p3, segs[k].c[2], segs[k1].c[2]);
        if t < -0.5 {
            return None;
        }
        let pt = bezier(t, p0, p1, p2, p3);
        let d = ddist(segs[k].c[2], segs[k1].c[2]);
        if d == 0.0 {
            return None;
        }
        let mut d1 = dpara(segs[k].c[2], segs[k1].c[2], pt) / d;
        let mut d2 = dpara(segs[k].c[2], segs[k1].c[2], segs[k1].vertex) / d;
        d2 *= 0.75 * segs[k1].alpha;
        if d2 < 0.0 {
            d1 = -d1;
            d2 = -d2;
        }
        if d1 < d2 - tolerance {
            return None;
        }
        if d1 < d2 {
            result.pen += (d1 - d2) * (d1 - d2);
        }
        k = k1;
    }

    Some(result)
}

/// Replace maximal runs of curve segments with single fitted cubics.
///
/// The DP walks segment endpoints 1..=m, minimizing segment count first
/// and cumulative penalty second; back-pointers reconstruct the
/// optimized curve and the chord parameters give the new beta values.
pub(crate) fn optimize(curve: &Curve, tolerance: f64) -> Curve {
    let m = curve.len();
    if m == 0 {
        return curve.clone();
    }
    let segs = &curve.segments;

    // Convexity per segment: turn direction at curve vertices, 0 at
    // corners (corners are never absorbed into a run).
    let convexity: Vec<i32> = (0..m)
        .map(|i| {
            if segs[i].kind == SegmentKind::Curve {
                fsign(dpara(
                    segs[(i + m - 1) % m].vertex,
                    segs[i].vertex,
                    segs[(i + 1) % m].vertex,
                ))
            } else {
                0
            }
        })
        .collect();

    // Prefix areas of the smoothed curve relative to its first vertex.
    let mut areas = vec![0.0f64; m + 1];
    let mut area = 0.0;
    let origin = segs[0].vertex;
    for i in 0..m {
        let i1 = (i + 1) % m;
        if segs[i1].kind == SegmentKind::Curve {
            let alpha = segs[i1].alpha;
            area += 0.3 * alpha * (4.0 - alpha)
                * dpara(segs[i].c[2], segs[i1].vertex, segs[i1].c[2])
                / 2.0;
            area += dpara(origin, segs[i].c[2], segs[i1].c[2]) / 2.0;
        }
        areas[i + 1] = area;
    }

    let mut pt = vec![-1isize; m + 1];
    let mut pen = vec![0.0f64; m + 1];
    let mut len = vec![0usize; m + 1];
    let mut opt: Vec<Option<Opti>> = vec![None; m + 1];

    for j in 1..=m {
        pt[j] = j as isize - 1;
        pen[j] = pen[j - 1];
        len[j] = len[j - 1] + 1;
        opt[j] = None;
        let mut i = j as isize - 2;
        while i >= 0 {
            let iu = i as usize;
            match opti_penalty(curve, iu, j % m, tolerance, &convexity, &areas) {
                None => break,
                Some(o) => {
                    if len[j] > len[iu] + 1
                        || (len[j] == len[iu] + 1 && pen[j] > pen[iu] + o.pen)
                    {
                        pt[j] = i;
                        pen[j] = pen[iu] + o.pen;
                        len[j] = len[iu] + 1;
                        opt[j] = Some(o);
                    }
                }
            }
            i -= 1;
        }
    }

    let om = len[m];
    let mut segments = vec![segs[0]; om];
    let mut s_params = vec![0.0f64; om];
    let mut t_params = vec![0.0f64; om];

    let mut j = m as isize;
    for i in (0..om).rev() {
        let ju = j as usize;
        let src = segs[ju % m];
        if pt[ju] == j - 1 {
            segments[i] = src;
            s_params[i] = 1.0;
            t_params[i] = 1.0;
        } else {
            // A fitted run: keep the endpoint, substitute the fitted
            // handles, and move the vertex onto the chord.
            let o = opt[ju].unwrap_or(Opti {
                pen: 0.0,
                c: [src.c[0], src.c[1]],
                t: 1.0,
                s: 1.0,
                alpha: src.alpha,
            });
            segments[i] = Segment {
                kind: SegmentKind::Curve,
                c: [o.c[0], o.c[1], src.c[2]],
                vertex: interval(o.s, src.c[2], src.vertex),
                alpha: o.alpha,
                alpha0: o.alpha,
                beta: 0.5,
            };
            s_params[i] = o.s;
            t_params[i] = o.t;
        }
        j = pt[ju];
    }

    for i in 0..om {
        let i1 = (i + 1) % om;
        let denom = s_params[i] + t_params[i1];
        segments[i].beta = if denom != 0.0 { s_params[i] / denom } else { 0.5 };
    }

    Curve { segments }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_vertices() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ]
    }

    #[test]
    fn square_corners_become_curves_at_default_alpha_max() {
        // Right-angle corners carry alpha 2/3 / ... ≈ 0.667, below the
        // default alpha_max of 1.0, so they round off into curves.
        let curve = smooth(&square_vertices(), 1.0);
        assert_eq!(curve.len(), 4);
        for seg in &curve.segments {
            assert_eq!(seg.kind, SegmentKind::Curve);
            assert!((seg.alpha - 2.0 / 3.0).abs() < 1e-9, "alpha {}", seg.alpha);
            assert_eq!(seg.beta, 0.5);
        }
    }

    #[test]
    fn square_corners_stay_corners_at_low_alpha_max() {
        let curve = smooth(&square_vertices(), 0.5);
        for seg in &curve.segments {
            assert_eq!(seg.kind, SegmentKind::Corner);
            // A corner collapses onto its vertex and the midpoint out.
            assert_eq!(seg.c[1], seg.vertex);
        }
    }

    #[test]
    fn segment_endpoints_are_midpoints() {
        let v = square_vertices();
        let curve = smooth(&v, 1.0);
        for j in 0..4 {
            let k = (j + 1) % 4;
            let mid = Point::new((v[j].x + v[k].x) / 2.0, (v[j].y + v[k].y) / 2.0);
            assert_eq!(curve.segments[j].c[2], mid);
        }
    }

    #[test]
    fn collinear_vertex_is_flat() {
        let v = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let curve = smooth(&v, 1.0);
        // The middle of the bottom edge does not bulge at all.
        assert_eq!(curve.segments[1].alpha0, 0.0);
    }

    #[test]
    fn optimize_never_grows_the_curve() {
        // A dense regular polygon approximating a circle: lots of
        // shallow curve segments the optimizer can merge.
        let m = 24;
        let vertices: Vec<Point> = (0..m)
            .map(|i| {
                let theta = i as f64 / m as f64 * std::f64::consts::TAU;
                Point::new(50.0 + 30.0 * theta.cos(), 50.0 + 30.0 * theta.sin())
            })
            .collect();
        let curve = smooth(&vertices, 1.0);
        let optimized = optimize(&curve, 0.2);
        assert!(optimized.len() <= curve.len());
        assert!(!optimized.segments.is_empty());
        // Betas stay within the unit interval.
        for seg in &optimized.segments {
            assert!((0.0..=1.0).contains(&seg.beta), "beta {}", seg.beta);
        }
    }

    #[test]
    fn optimize_keeps_corners() {
        let curve = smooth(&square_vertices(), 0.5);
        let optimized = optimize(&curve, 0.2);
        assert_eq!(optimized.len(), curve.len());
        for seg in &optimized.segments {
            assert_eq!(seg.kind, SegmentKind::Corner);
        }
    }
}
