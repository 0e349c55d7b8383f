//! SVG string assembly.
//!
//! Everything here is plain string building: per-curve path data,
//! `<path>` tags, full documents and `<symbol>` wrappers, plus the small
//! attribute editor the posterizer uses to inject `fill-opacity`.

use crate::vectorize::curve::{Curve, SegmentKind};

/// Per-axis output scaling applied while rendering coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    pub fn identity() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

/// Format a coordinate with 3 decimals, stripping a whole-number tail.
pub(crate) fn fixed(n: f64) -> String {
    let s = format!("{:.3}", n);
    match s.strip_suffix(".000") {
        Some(stripped) => stripped.to_string(),
        None => s,
    }
}

/// Path data for one closed curve.
///
/// Opens with `M` at the last segment's endpoint (the curve's starting
/// vertex), then one `C` per curve segment or an `L` pair per corner.
fn render_curve(curve: &Curve, scale: Scale) -> String {
    let segments = &curve.segments;
    let n = segments.len();
    if n == 0 {
        return String::new();
    }

    let start = segments[n - 1].c[2];
    let mut parts = vec![format!(
        "M {} {}",
        fixed(start.x * scale.x),
        fixed(start.y * scale.y)
    )];
    for segment in segments {
        match segment.kind {
            SegmentKind::Curve => parts.push(format!(
                "C {} {}, {} {}, {} {}",
                fixed(segment.c[0].x * scale.x),
                fixed(segment.c[0].y * scale.y),
                fixed(segment.c[1].x * scale.x),
                fixed(segment.c[1].y * scale.y),
                fixed(segment.c[2].x * scale.x),
                fixed(segment.c[2].y * scale.y)
            )),
            SegmentKind::Corner => parts.push(format!(
                "L {} {} {} {}",
                fixed(segment.c[1].x * scale.x),
                fixed(segment.c[1].y * scale.y),
                fixed(segment.c[2].x * scale.x),
                fixed(segment.c[2].y * scale.y)
            )),
        }
    }
    parts.join(" ")
}

/// Combined `d` attribute for a list of curves.
pub(crate) fn path_data(curves: &[Curve], scale: Scale) -> String {
    curves
        .iter()
        .map(|c| render_curve(c, scale))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A `<path>` tag; `fill: None` omits the fill attribute (symbol form).
pub(crate) fn path_tag(d: &str, fill: Option<&str>) -> String {
    match fill {
        Some(fill) => format!(
            "<path d=\"{}\" stroke=\"none\" fill=\"{}\" fill-rule=\"evenodd\"/>",
            d, fill
        ),
        None => format!("<path d=\"{}\" stroke=\"none\" fill-rule=\"evenodd\"/>", d),
    }
}

/// Assemble a complete SVG document around the given layer tags.
pub(crate) fn document(
    width: u32,
    height: u32,
    background: Option<&str>,
    layers: &[String],
) -> String {
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
         viewBox=\"0 0 {w} {h}\" version=\"1.1\">\n",
        w = width,
        h = height
    );
    if let Some(background) = background {
        svg.push_str(&format!(
            "\t<rect x=\"0\" y=\"0\" width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
            background
        ));
    }
    for layer in layers {
        svg.push('\t');
        svg.push_str(layer);
        svg.push('\n');
    }
    svg.push_str("</svg>");
    svg
}

/// A `<symbol>` wrapper; carries the viewBox but no background or fill.
pub(crate) fn symbol(id: &str, width: u32, height: u32, body: &str) -> String {
    format!(
        "<symbol viewBox=\"0 0 {} {}\" id=\"{}\">{}</symbol>",
        width, height, id, body
    )
}

/// Set an attribute on the first tag of `html`: replaces the value when
/// the attribute exists, otherwise inserts it right after the tag name.
pub(crate) fn set_html_attribute(html: &str, name: &str, value: &str) -> String {
    let needle = format!(" {}=\"", name);
    if let Some(pos) = html.find(&needle) {
        let value_start = pos + needle.len();
        let value_end = html[value_start..]
            .find('"')
            .map(|i| value_start + i)
            .unwrap_or(html.len());
        format!("{}{}{}", &html[..value_start], value, &html[value_end..])
    } else if let Some(end) = html.find(|c: char| c == ' ' || c == '>') {
        format!("{} {}=\"{}\"{}", &html[..end], name, value, &html[end..])
    } else {
        html.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorize::curve::{Segment, SegmentKind};
    use kurbo::Point;

    #[test]
    fn fixed_strips_whole_number_tails() {
        assert_eq!(fixed(2.0), "2");
        assert_eq!(fixed(0.0), "0");
        assert_eq!(fixed(-3.0), "-3");
        assert_eq!(fixed(1.5), "1.500");
        assert_eq!(fixed(1.25), "1.250");
        assert_eq!(fixed(-0.0001), "-0");
        assert_eq!(fixed(12.625), "12.625");
    }

    fn segment(kind: SegmentKind, c0: Point, c1: Point, c2: Point) -> Segment {
        Segment {
            kind,
            c: [c0, c1, c2],
            vertex: c1,
            alpha: 1.0,
            alpha0: 1.0,
            beta: 0.5,
        }
    }

    #[test]
    fn corner_renders_as_a_single_l_with_two_pairs() {
        let curve = Curve {
            segments: vec![
                segment(
                    SegmentKind::Corner,
                    Point::new(0.0, 0.0),
                    Point::new(4.0, 0.0),
                    Point::new(4.0, 2.0),
                ),
                segment(
                    SegmentKind::Corner,
                    Point::new(4.0, 2.0),
                    Point::new(0.0, 4.0),
                    Point::new(0.0, 0.0),
                ),
            ],
        };
        let d = path_data(&[curve], Scale::identity());
        assert_eq!(d, "M 0 0 L 4 0 4 2 L 0 4 0 0");
    }

    #[test]
    fn curve_command_separates_pairs_with_commas() {
        let curve = Curve {
            segments: vec![segment(
                SegmentKind::Curve,
                Point::new(1.0, 0.5),
                Point::new(2.0, 1.5),
                Point::new(3.0, 2.0),
            )],
        };
        let d = path_data(&[curve], Scale::identity());
        assert_eq!(d, "M 3 2 C 1 0.500, 2 1.500, 3 2");
    }

    #[test]
    fn scaling_applies_per_axis() {
        let curve = Curve {
            segments: vec![segment(
                SegmentKind::Corner,
                Point::new(0.0, 0.0),
                Point::new(2.0, 1.0),
                Point::new(4.0, 2.0),
            )],
        };
        let d = path_data(&[curve], Scale { x: 2.0, y: 0.5 });
        assert_eq!(d, "M 8 1 L 4 0.500 8 1");
    }

    #[test]
    fn document_with_and_without_background() {
        let layers = vec![path_tag("M 0 0", Some("black"))];
        let with_bg = document(10, 20, Some("white"), &layers);
        assert!(with_bg.contains("<rect x=\"0\" y=\"0\" width=\"100%\" height=\"100%\" fill=\"white\"/>"));
        assert!(with_bg.contains("viewBox=\"0 0 10 20\""));
        let without = document(10, 20, None, &layers);
        assert!(!without.contains("<rect"));
        assert!(without.ends_with("</svg>"));
    }

    #[test]
    fn symbol_has_no_fill_or_background() {
        let tag = path_tag("M 0 0", None);
        let sym = symbol("glyph", 8, 8, &tag);
        assert_eq!(
            sym,
            "<symbol viewBox=\"0 0 8 8\" id=\"glyph\">\
             <path d=\"M 0 0\" stroke=\"none\" fill-rule=\"evenodd\"/></symbol>"
        );
    }

    #[test]
    fn set_attribute_inserts_then_replaces() {
        let tag = "<path d=\"M 0 0\" fill=\"black\"/>";
        let inserted = set_html_attribute(tag, "fill-opacity", "0.500");
        assert_eq!(
            inserted,
            "<path fill-opacity=\"0.500\" d=\"M 0 0\" fill=\"black\"/>"
        );
        let replaced = set_html_attribute(&inserted, "fill-opacity", "1.000");
        assert_eq!(
            replaced,
            "<path fill-opacity=\"1.000\" d=\"M 0 0\" fill=\"black\"/>"
        );
        // `fill` is matched as a whole attribute name, not as a prefix
        // of `fill-opacity`.
        let recolored = set_html_attribute(&replaced, "fill", "red");
        assert!(recolored.contains("fill=\"red\""));
        assert!(recolored.contains("fill-opacity=\"1.000\""));
    }
}
