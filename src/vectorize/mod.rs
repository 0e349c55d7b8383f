//! Per-contour analysis pipeline: contour → polygon → smoothed curve.
//!
//! Stages run in a fixed order per contour (sums → lon → optimal polygon
//! → vertex adjustment → reverse → smooth → optimize). Contours are
//! independent, so the stage fan-out runs on rayon while collecting in
//! input order to keep output deterministic.

pub(crate) mod curve;
pub(crate) mod decompose;
pub(crate) mod polygon;

use rayon::prelude::*;

use curve::Curve;
use decompose::{Contour, Sign};

/// The geometry parameters the analyzer needs from the tracer options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnalysisParams {
    pub alpha_max: f64,
    pub opt_curve: bool,
    pub opt_tolerance: f64,
}

/// Analyze every contour into its final curve.
pub(crate) fn analyze_contours(contours: &[Contour], params: &AnalysisParams) -> Vec<Curve> {
    contours
        .par_iter()
        .map(|contour| analyze(contour, params))
        .collect()
}

fn analyze(contour: &Contour, params: &AnalysisParams) -> Curve {
    let pt = &contour.points;
    let sums = polygon::calc_sums(pt);
    let lon = polygon::calc_lon(pt);
    let po = polygon::best_polygon(pt, &lon, &sums);
    let mut vertices = polygon::adjust_vertices(pt, &po, &sums);

    // Holes run backwards so the evenodd fill rule carves them out.
    if contour.sign == Sign::Negative {
        vertices.reverse();
    }

    let smoothed = curve::smooth(&vertices, params.alpha_max);
    if params.opt_curve {
        curve::optimize(&smoothed, params.opt_tolerance)
    } else {
        smoothed
    }
}
