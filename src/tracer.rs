//! Single-threshold tracing facade.
//!
//! A `Tracer` moves through three states: unloaded, loaded (luminance
//! bitmap installed) and processed (curves cached). Geometry parameter
//! changes drop back to loaded; rendering-only parameters leave the
//! processed curves alone. The first output request after an
//! invalidation reruns the pipeline.

use log::debug;

use crate::bitmap::Bitmap;
use crate::config::{Color, Threshold, TracerOptions};
use crate::error::TraceError;
use crate::histogram::Histogram;
use crate::svg::{self, Scale};
use crate::vectorize::curve::Curve;
use crate::vectorize::{self, decompose, AnalysisParams};

/// Handle for an in-flight image load. Completing a load with a stale
/// token fails with `Superseded`; this is the synchronous hook an async
/// decoder adapter uses to discard results that lost the race.
#[derive(Debug)]
pub struct LoadToken(u64);

pub struct Tracer {
    options: TracerOptions,
    luminance: Option<Bitmap>,
    histogram: Option<Histogram>,
    curves: Option<Vec<Curve>>,
    load_generation: u64,
}

impl Tracer {
    pub fn new(options: TracerOptions) -> Result<Self, TraceError> {
        options.validate()?;
        Ok(Self {
            options,
            luminance: None,
            histogram: None,
            curves: None,
            load_generation: 0,
        })
    }

    pub fn options(&self) -> &TracerOptions {
        &self.options
    }

    /// Replace the parameter set. Geometry changes invalidate processed
    /// curves; color, background and output size never do.
    pub fn set_parameters(&mut self, options: TracerOptions) -> Result<(), TraceError> {
        options.validate()?;
        if !options.geometry_eq(&self.options) {
            self.curves = None;
        }
        self.options = options;
        Ok(())
    }

    /// Begin a load, invalidating every earlier in-flight token.
    pub fn begin_load(&mut self) -> LoadToken {
        self.load_generation += 1;
        LoadToken(self.load_generation)
    }

    /// Complete a load begun with `begin_load`. A token that is no
    /// longer current means a newer load has started; the bitmap is
    /// dropped and `Superseded` returned.
    pub fn finish_load(&mut self, token: LoadToken, bitmap: Bitmap) -> Result<(), TraceError> {
        if token.0 != self.load_generation {
            return Err(TraceError::Superseded);
        }
        self.install(bitmap);
        Ok(())
    }

    /// Install a luminance bitmap, discarding prior processed data.
    pub fn load_image(&mut self, bitmap: Bitmap) {
        self.load_generation += 1;
        self.install(bitmap);
    }

    fn install(&mut self, bitmap: Bitmap) {
        debug!("loaded {}x{} luminance bitmap", bitmap.width(), bitmap.height());
        self.luminance = Some(bitmap);
        self.histogram = None;
        self.curves = None;
    }

    /// Source dimensions of the loaded image.
    pub(crate) fn dimensions(&self) -> Option<(u32, u32)> {
        self.luminance.as_ref().map(|b| (b.width(), b.height()))
    }

    /// Histogram of the loaded luminance bitmap, built once per load.
    pub fn histogram(&mut self) -> Result<&Histogram, TraceError> {
        if self.luminance.is_none() {
            return Err(TraceError::NotLoaded);
        }
        if self.histogram.is_none() {
            self.histogram = self.luminance.as_ref().map(Bitmap::histogram);
        }
        self.histogram.as_ref().ok_or(TraceError::NotLoaded)
    }

    /// The binarization cutoff actually used: the fixed value, or Otsu
    /// over the full range with a fallback of 128 for degenerate
    /// histograms.
    pub(crate) fn effective_threshold(&mut self) -> Result<u8, TraceError> {
        match self.options.threshold {
            Threshold::Fixed(t) => Ok(t),
            Threshold::Auto => {
                let auto = self.histogram()?.auto_threshold(0, 255)?;
                Ok(auto.unwrap_or(128))
            }
        }
    }

    /// Run binarize → decompose → analyze, unless already cached.
    fn process(&mut self) -> Result<(), TraceError> {
        if self.curves.is_some() {
            return Ok(());
        }
        let threshold = self.effective_threshold()?;
        let black_on_white = self.options.black_on_white;
        let luminance = self.luminance.as_ref().ok_or(TraceError::NotLoaded)?;

        debug!(
            "binarizing at threshold {} ({} foreground)",
            threshold,
            if black_on_white { "dark" } else { "light" }
        );
        let binary = luminance.copy_map(|l| {
            let background = if black_on_white { l > threshold } else { l < threshold };
            if background {
                0
            } else {
                1
            }
        });

        let contours = decompose::decompose(&binary, self.options.turn_policy, self.options.turd_size);
        let params = AnalysisParams {
            alpha_max: self.options.alpha_max,
            opt_curve: self.options.opt_curve,
            opt_tolerance: self.options.opt_tolerance,
        };
        let curves = vectorize::analyze_contours(&contours, &params);
        debug!(
            "analyzed {} contours into {} segments",
            curves.len(),
            curves.iter().map(Curve::len).sum::<usize>()
        );
        self.curves = Some(curves);
        Ok(())
    }

    fn rendered_path_data(&mut self, scale: Scale) -> Result<String, TraceError> {
        self.process()?;
        let curves = self.curves.as_ref().ok_or(TraceError::NotLoaded)?;
        Ok(svg::path_data(curves, scale))
    }

    fn document_fill(&self) -> String {
        match &self.options.color {
            Color::Auto => {
                if self.options.black_on_white {
                    "black".to_string()
                } else {
                    "white".to_string()
                }
            }
            Color::Transparent => "transparent".to_string(),
            Color::Css(css) => css.clone(),
        }
    }

    fn document_background(&self) -> Option<String> {
        match &self.options.background {
            Color::Auto | Color::Transparent => None,
            Color::Css(css) => Some(css.clone()),
        }
    }

    /// `<path>` tag at the given output scale, with the document fill.
    pub(crate) fn document_path_tag(&mut self, scale: Scale) -> Result<String, TraceError> {
        let fill = self.document_fill();
        let d = self.rendered_path_data(scale)?;
        Ok(svg::path_tag(&d, Some(&fill)))
    }

    /// `<path>` tag without a fill attribute, for symbol output.
    pub(crate) fn symbol_path_tag(&mut self, scale: Scale) -> Result<String, TraceError> {
        let d = self.rendered_path_data(scale)?;
        Ok(svg::path_tag(&d, None))
    }

    /// The trace as a single `<path>` tag at source scale. `fill_override`
    /// replaces the configured color.
    pub fn get_path_tag(&mut self, fill_override: Option<&str>) -> Result<String, TraceError> {
        let fill = match fill_override {
            Some(fill) => fill.to_string(),
            None => self.document_fill(),
        };
        let d = self.rendered_path_data(Scale::identity())?;
        Ok(svg::path_tag(&d, Some(&fill)))
    }

    /// The trace as a `<symbol>` reusable from other documents.
    pub fn get_symbol(&mut self, id: &str) -> Result<String, TraceError> {
        let (width, height) = self.dimensions().ok_or(TraceError::NotLoaded)?;
        let tag = self.symbol_path_tag(Scale::identity())?;
        Ok(svg::symbol(id, width, height, &tag))
    }

    /// The trace as a complete SVG document.
    pub fn get_svg(&mut self) -> Result<String, TraceError> {
        let (source_w, source_h) = self.dimensions().ok_or(TraceError::NotLoaded)?;
        let width = self.options.width.unwrap_or(source_w);
        let height = self.options.height.unwrap_or(source_h);
        let scale = Scale {
            x: width as f64 / source_w as f64,
            y: height as f64 / source_h as f64,
        };
        let tag = self.document_path_tag(scale)?;
        // An all-background image traces to nothing; the document then
        // carries no path elements at all.
        let layers = if tag.contains(" d=\"\"") {
            Vec::new()
        } else {
            vec![tag]
        };
        Ok(svg::document(width, height, self.document_background().as_deref(), &layers))
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self {
            options: TracerOptions::default(),
            luminance: None,
            histogram: None,
            curves: None,
            load_generation: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TurnPolicy;

    fn rgba_image(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Bitmap {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&pixel(x, y));
            }
        }
        Bitmap::from_rgba(width, height, &data).unwrap()
    }

    fn black_square_on_white(size: u32, from: u32, to: u32) -> Bitmap {
        rgba_image(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
    }

    #[test]
    fn unloaded_tracer_refuses_output() {
        let mut tracer = Tracer::default();
        assert!(matches!(tracer.get_svg(), Err(TraceError::NotLoaded)));
        assert!(matches!(tracer.get_path_tag(None), Err(TraceError::NotLoaded)));
        assert!(matches!(tracer.get_symbol("x"), Err(TraceError::NotLoaded)));
    }

    #[test]
    fn all_black_image_is_one_black_path() {
        let mut tracer = Tracer::default();
        tracer.load_image(rgba_image(2, 2, |_, _| [0, 0, 0, 255]));
        let svg = tracer.get_svg().unwrap();
        assert!(svg.contains("width=\"2\" height=\"2\" viewBox=\"0 0 2 2\""));
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains("fill=\"black\""));
        assert!(svg.contains("fill-rule=\"evenodd\""));
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn all_white_image_has_no_paths() {
        let mut tracer = Tracer::default();
        tracer.load_image(rgba_image(2, 2, |_, _| [255, 255, 255, 255]));
        let svg = tracer.get_svg().unwrap();
        assert_eq!(svg.matches("<path").count(), 0);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
    }

    #[test]
    fn white_on_black_flips_the_trace() {
        let mut tracer = Tracer::new(TracerOptions {
            black_on_white: false,
            ..TracerOptions::default()
        })
        .unwrap();
        tracer.load_image(rgba_image(2, 2, |_, _| [0, 0, 0, 255]));
        let svg = tracer.get_svg().unwrap();
        assert_eq!(svg.matches("<path").count(), 0);

        tracer.load_image(rgba_image(2, 2, |_, _| [255, 255, 255, 255]));
        let svg = tracer.get_svg().unwrap();
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains("fill=\"white\""));
    }

    #[test]
    fn rendering_is_deterministic_and_cached() {
        let mut tracer = Tracer::default();
        tracer.load_image(black_square_on_white(40, 10, 30));
        let first = tracer.get_svg().unwrap();
        let second = tracer.get_svg().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn setting_identical_parameters_is_a_noop_for_output() {
        let mut tracer = Tracer::default();
        tracer.load_image(black_square_on_white(40, 10, 30));
        let before = tracer.get_svg().unwrap();
        let options = tracer.options().clone();
        tracer.set_parameters(options).unwrap();
        assert_eq!(tracer.get_svg().unwrap(), before);
    }

    #[test]
    fn geometry_change_reprocesses() {
        let mut tracer = Tracer::default();
        tracer.load_image(black_square_on_white(40, 10, 30));
        let smooth = tracer.get_svg().unwrap();
        tracer
            .set_parameters(TracerOptions {
                alpha_max: 0.0,
                ..tracer.options().clone()
            })
            .unwrap();
        let angular = tracer.get_svg().unwrap();
        assert_ne!(smooth, angular);
        // alpha_max 0 marks every vertex a corner: no curve commands.
        assert!(!angular.contains("C "));
    }

    #[test]
    fn turd_size_culls_and_is_monotonic() {
        // 10x10 black square: enclosed area 100.
        let image = black_square_on_white(20, 5, 15);
        let mut tracer = Tracer::new(TracerOptions {
            threshold: Threshold::Fixed(128),
            ..TracerOptions::default()
        })
        .unwrap();
        tracer.load_image(image.clone());
        assert_eq!(tracer.get_svg().unwrap().matches("<path").count(), 1);

        tracer
            .set_parameters(TracerOptions {
                turd_size: 99,
                ..tracer.options().clone()
            })
            .unwrap();
        tracer.load_image(image.clone());
        assert_eq!(tracer.get_svg().unwrap().matches("<path").count(), 1);

        tracer
            .set_parameters(TracerOptions {
                turd_size: 100,
                ..tracer.options().clone()
            })
            .unwrap();
        tracer.load_image(image);
        assert_eq!(tracer.get_svg().unwrap().matches("<path").count(), 0);
    }

    #[test]
    fn custom_dimensions_scale_the_viewbox() {
        let mut tracer = Tracer::new(TracerOptions {
            width: Some(100),
            height: Some(50),
            ..TracerOptions::default()
        })
        .unwrap();
        tracer.load_image(black_square_on_white(10, 2, 8));
        let svg = tracer.get_svg().unwrap();
        assert!(svg.contains("width=\"100\" height=\"50\" viewBox=\"0 0 100 50\""));
    }

    #[test]
    fn background_rect_only_when_opaque() {
        let mut tracer = Tracer::new(TracerOptions {
            background: Color::Css("#fff".to_string()),
            ..TracerOptions::default()
        })
        .unwrap();
        tracer.load_image(black_square_on_white(10, 2, 8));
        let svg = tracer.get_svg().unwrap();
        assert!(svg.contains("<rect x=\"0\" y=\"0\" width=\"100%\" height=\"100%\" fill=\"#fff\"/>"));
    }

    #[test]
    fn stale_load_token_is_superseded() {
        let mut tracer = Tracer::default();
        let stale = tracer.begin_load();
        let fresh = tracer.begin_load();
        assert!(matches!(
            tracer.finish_load(stale, Bitmap::new(2, 2)),
            Err(TraceError::Superseded)
        ));
        assert!(tracer.finish_load(fresh, Bitmap::new(2, 2)).is_ok());
        // A direct load_image also invalidates outstanding tokens.
        let token = tracer.begin_load();
        tracer.load_image(Bitmap::new(2, 2));
        assert!(matches!(
            tracer.finish_load(token, Bitmap::new(2, 2)),
            Err(TraceError::Superseded)
        ));
    }

    #[test]
    fn fill_override_and_symbol_form() {
        let mut tracer = Tracer::default();
        tracer.load_image(black_square_on_white(10, 2, 8));
        let tag = tracer.get_path_tag(Some("#123456")).unwrap();
        assert!(tag.contains("fill=\"#123456\""));
        let symbol = tracer.get_symbol("glyph").unwrap();
        assert!(symbol.starts_with("<symbol viewBox=\"0 0 10 10\" id=\"glyph\">"));
        assert!(!symbol.contains("fill=\""));
        assert!(!symbol.contains("<rect"));
    }

    #[test]
    fn turn_policies_trace_a_checkerboard_without_diverging_areas() {
        // A fine checkerboard is all diagonal ambiguities.
        let image = rgba_image(8, 8, |x, y| {
            if (x + y) % 2 == 0 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        for policy in [TurnPolicy::Left, TurnPolicy::Right, TurnPolicy::Minority, TurnPolicy::Majority] {
            let mut tracer = Tracer::new(TracerOptions {
                turn_policy: policy,
                turd_size: 0,
                threshold: Threshold::Fixed(128),
                ..TracerOptions::default()
            })
            .unwrap();
            tracer.load_image(image.clone());
            let svg = tracer.get_svg().unwrap();
            assert!(svg.contains("<path"), "policy {:?} produced no path", policy);
        }
    }
}
