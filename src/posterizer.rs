//! Multi-layer posterization.
//!
//! Runs the tracer once per tonal range and stacks the results with
//! decreasing fill opacities so the layers composite back towards the
//! original tones. Threshold stops come from an explicit list, an even
//! spacing, or multilevel Otsu; each range then picks a representative
//! color through the configured fill strategy.

use log::debug;

use crate::bitmap::Bitmap;
use crate::config::{
    FillStrategy, PosterizerOptions, RangeDistribution, Steps, Threshold, TracerOptions,
};
use crate::error::TraceError;
use crate::svg::{self, Scale};
use crate::tracer::{LoadToken, Tracer};

/// One tonal layer: the trace threshold and the normalized intensity of
/// its fill (0 = invisible, 1 = fully saturated).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RangeStop {
    pub value: f64,
    pub color_intensity: f64,
}

pub struct Posterizer {
    tracer: Tracer,
    options: PosterizerOptions,
    /// Cached effective threshold; dropped on parameter or image change.
    calculated_threshold: Option<f64>,
}

impl Posterizer {
    pub fn new(options: PosterizerOptions) -> Result<Self, TraceError> {
        options.validate()?;
        let tracer = Tracer::new(options.tracer.clone())?;
        Ok(Self {
            tracer,
            options,
            calculated_threshold: None,
        })
    }

    pub fn options(&self) -> &PosterizerOptions {
        &self.options
    }

    pub fn set_parameters(&mut self, options: PosterizerOptions) -> Result<(), TraceError> {
        options.validate()?;
        self.tracer.set_parameters(options.tracer.clone())?;
        self.options = options;
        self.calculated_threshold = None;
        Ok(())
    }

    pub fn load_image(&mut self, bitmap: Bitmap) {
        self.tracer.load_image(bitmap);
        self.calculated_threshold = None;
    }

    pub fn begin_load(&mut self) -> LoadToken {
        self.tracer.begin_load()
    }

    pub fn finish_load(&mut self, token: LoadToken, bitmap: Bitmap) -> Result<(), TraceError> {
        self.tracer.finish_load(token, bitmap)?;
        self.calculated_threshold = None;
        Ok(())
    }

    /// The posterization as a complete SVG document.
    pub fn get_svg(&mut self) -> Result<String, TraceError> {
        let (source_w, source_h) = self.tracer.dimensions().ok_or(TraceError::NotLoaded)?;
        let width = self.options.tracer.width.unwrap_or(source_w);
        let height = self.options.tracer.height.unwrap_or(source_h);
        let scale = Scale {
            x: width as f64 / source_w as f64,
            y: height as f64 / source_h as f64,
        };
        let layers = self.path_tags(false, scale)?;
        let background = match &self.options.tracer.background {
            crate::config::Color::Css(css) => Some(css.clone()),
            _ => None,
        };
        Ok(svg::document(width, height, background.as_deref(), &layers))
    }

    /// The posterization as a `<symbol>`: no background, fills cleared,
    /// opacities kept.
    pub fn get_symbol(&mut self, id: &str) -> Result<String, TraceError> {
        let (width, height) = self.tracer.dimensions().ok_or(TraceError::NotLoaded)?;
        let layers = self.path_tags(true, Scale::identity())?;
        Ok(svg::symbol(id, width, height, &layers.concat()))
    }

    /// Render one `<path>` per non-empty range with its computed
    /// `fill-opacity`, processing ranges least-saturated first.
    fn path_tags(&mut self, no_fill: bool, scale: Scale) -> Result<Vec<String>, TraceError> {
        let mut ranges = self.ranges()?;
        if ranges.len() >= 10 {
            self.add_extra_color_stop(&mut ranges)?;
        }
        debug!(
            "posterizing {} ranges: {:?}",
            ranges.len(),
            ranges.iter().map(|r| r.value).collect::<Vec<_>>()
        );

        let mut actual_prev = 0.0f64;
        let mut tags = Vec::new();
        for stop in &ranges {
            let intensity = stop.color_intensity;
            if intensity == 0.0 {
                continue;
            }
            // One-pass compositing: each layer adds just enough opacity
            // on top of the stack built so far to reach its target.
            let opacity = if actual_prev == 0.0 || intensity == 1.0 {
                intensity
            } else {
                (actual_prev - intensity) / (actual_prev - 1.0)
            };
            let opacity = ((opacity * 1000.0).round() / 1000.0).clamp(0.0, 1.0);
            actual_prev += (1.0 - actual_prev) * opacity;

            let threshold = stop.value.round().clamp(0.0, 255.0) as u8;
            self.tracer.set_parameters(TracerOptions {
                threshold: Threshold::Fixed(threshold),
                ..self.options.tracer.clone()
            })?;
            let tag = if no_fill {
                self.tracer.symbol_path_tag(scale)?
            } else {
                self.tracer.document_path_tag(scale)?
            };
            let tag = svg::set_html_attribute(&tag, "fill-opacity", &format!("{:.3}", opacity));
            if opacity == 0.0 || tag.contains(" d=\"\"") {
                continue;
            }
            tags.push(tag);
        }
        Ok(tags)
    }

    /// The effective global threshold: explicit, or the saturated stop of
    /// a two-level Otsu split (falling back to 128).
    fn param_threshold(&mut self) -> Result<f64, TraceError> {
        if let Some(cached) = self.calculated_threshold {
            return Ok(cached);
        }
        let value = match self.options.tracer.threshold {
            Threshold::Fixed(t) => t as f64,
            Threshold::Auto => {
                let stops = self.tracer.histogram()?.multilevel_thresholding(2, 0, 255)?;
                let pick = if self.options.tracer.black_on_white {
                    stops.get(1)
                } else {
                    stops.first()
                };
                pick.map(|&t| t as f64).unwrap_or(128.0)
            }
        };
        self.calculated_threshold = Some(value);
        Ok(value)
    }

    /// Resolve the number of layers when `steps` is not an explicit list.
    fn param_step_count(&mut self) -> Result<usize, TraceError> {
        if let Steps::Manual(stops) = &self.options.steps {
            return Ok(stops.len());
        }
        if self.options.steps == Steps::Auto && self.options.tracer.threshold == Threshold::Auto {
            return Ok(4);
        }
        let threshold = self.param_threshold()?;
        let usable = if self.options.tracer.black_on_white {
            threshold
        } else {
            255.0 - threshold
        };
        Ok(match self.options.steps {
            Steps::Auto => {
                if usable > 200.0 {
                    4
                } else {
                    3
                }
            }
            Steps::Count(n) => (n.max(2) as usize).min(usable as usize),
            Steps::Manual(_) => unreachable!("handled above"),
        })
    }

    /// Threshold stops with their color intensities, ordered
    /// least-saturated first.
    fn ranges(&mut self) -> Result<Vec<RangeStop>, TraceError> {
        match self.options.steps.clone() {
            Steps::Manual(stops) => self.ranges_manual(&stops),
            _ => match self.options.range_distribution {
                RangeDistribution::Auto => self.ranges_auto(),
                RangeDistribution::Equal => self.ranges_equal(),
            },
        }
    }

    /// Preprocess an explicit stop list: dedupe, sort towards saturation,
    /// and make sure the effective threshold caps the stack.
    fn ranges_manual(&mut self, steps: &[u8]) -> Result<Vec<RangeStop>, TraceError> {
        let threshold = self.param_threshold()?;
        let black_on_white = self.options.tracer.black_on_white;

        let mut stops: Vec<f64> = Vec::new();
        for &step in steps {
            let value = step as f64;
            if !stops.contains(&value) {
                stops.push(value);
            }
        }
        if stops.is_empty() {
            stops.push(threshold);
        }
        stops.sort_by(|a, b| {
            if black_on_white {
                b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
            }
        });
        if black_on_white && stops[0] < threshold {
            stops.insert(0, threshold);
        } else if !black_on_white && stops[stops.len() - 1] < threshold {
            stops.push(threshold);
        }
        self.color_intensities(stops)
    }

    /// Otsu-driven stops over the usable range, with the explicit
    /// threshold injected at the saturated end when one is set.
    fn ranges_auto(&mut self) -> Result<Vec<RangeStop>, TraceError> {
        let count = self.param_step_count()?;
        let black_on_white = self.options.tracer.black_on_white;

        let mut stops: Vec<f64> = if self.options.tracer.threshold == Threshold::Auto {
            self.tracer
                .histogram()?
                .multilevel_thresholding(count as u32, 0, 255)?
                .into_iter()
                .map(f64::from)
                .collect()
        } else {
            let threshold = self.param_threshold()?;
            let bound = threshold.round().clamp(0.0, 255.0) as u8;
            let inner = if black_on_white {
                self.tracer
                    .histogram()?
                    .multilevel_thresholding(count.saturating_sub(1) as u32, 0, bound)?
            } else {
                self.tracer
                    .histogram()?
                    .multilevel_thresholding(count.saturating_sub(1) as u32, bound, 255)?
            };
            let mut stops: Vec<f64> = inner.into_iter().map(f64::from).collect();
            if black_on_white {
                stops.push(threshold);
            } else {
                stops.insert(0, threshold);
            }
            stops
        };

        if black_on_white {
            stops.reverse();
        }
        self.color_intensities(stops)
    }

    /// Evenly spaced stops across the usable half of the palette.
    fn ranges_equal(&mut self) -> Result<Vec<RangeStop>, TraceError> {
        let threshold = self.param_threshold()?;
        let black_on_white = self.options.tracer.black_on_white;
        let usable = if black_on_white { threshold } else { 255.0 - threshold };
        let count = self.param_step_count()?;
        let step_size = usable / count as f64;

        let mut stops = Vec::with_capacity(count);
        for i in (0..count).rev() {
            let distance = usable.min((i + 1) as f64 * step_size);
            stops.push(if black_on_white { distance } else { 255.0 - distance });
        }
        self.color_intensities(stops)
    }

    /// Attach a color intensity to every stop per the fill strategy.
    fn color_intensities(&mut self, stops: Vec<f64>) -> Result<Vec<RangeStop>, TraceError> {
        let black_on_white = self.options.tracer.black_on_white;
        let strategy = self.options.fill_strategy;
        let full_range = (self.param_threshold()? - if black_on_white { 0.0 } else { 255.0 }).abs();
        let count = stops.len();

        let mut ranges = Vec::with_capacity(count);
        for (index, &threshold) in stops.iter().enumerate() {
            let next = if index + 1 == count {
                if black_on_white {
                    -1.0
                } else {
                    256.0
                }
            } else {
                stops[index + 1]
            };
            let range_start = (if black_on_white { next + 1.0 } else { threshold }).round();
            let range_end = (if black_on_white { threshold } else { next - 1.0 }).round();
            let interval_size = range_end - range_start;
            let factor = if count > 1 {
                index as f64 / (count - 1) as f64
            } else {
                1.0
            };

            let start_bin = range_start.clamp(0.0, 255.0) as u8;
            let end_bin = range_end.clamp(0.0, 255.0) as u8;

            let stats = if strategy == FillStrategy::Spread {
                None
            } else {
                Some(self.tracer.histogram()?.stats(start_bin, end_bin)?)
            };
            if let Some(stats) = &stats {
                if stats.pixels == 0 {
                    // Nothing to paint in this range.
                    ranges.push(RangeStop {
                        value: threshold,
                        color_intensity: 0.0,
                    });
                    continue;
                }
            }

            let mut color = match (strategy, &stats) {
                (FillStrategy::Spread, _) => {
                    let towards = if black_on_white { range_start } else { range_end };
                    let direction = if black_on_white { 1.0 } else { -1.0 };
                    towards + direction * interval_size * (full_range / 255.0).max(0.5) * factor
                }
                (FillStrategy::Dominant, _) => {
                    let tolerance = interval_size.clamp(1.0, 5.0).round() as u32;
                    self.tracer
                        .histogram()?
                        .dominant_color(start_bin, end_bin, tolerance)? as f64
                }
                (FillStrategy::Mean, Some(stats)) => stats.levels.mean,
                (FillStrategy::Median, Some(stats)) => stats.levels.median as f64,
                // stats are always present for mean/median (checked above).
                (FillStrategy::Mean | FillStrategy::Median, None) => -1.0,
            };

            // Keep layer colors off the less-saturated range boundary so
            // adjacent layers stay distinguishable.
            if index != 0 && color >= 0.0 {
                let guard = (interval_size * 0.1).round();
                color = if black_on_white {
                    color.clamp(range_start, (range_end - guard).max(range_start))
                } else {
                    color.clamp((range_start + guard).min(range_end), range_end)
                };
            }

            ranges.push(RangeStop {
                value: threshold,
                color_intensity: if color < 0.0 {
                    0.0
                } else if black_on_white {
                    (255.0 - color) / 255.0
                } else {
                    color / 255.0
                },
            });
        }
        Ok(ranges)
    }

    /// Deep posterizations can leave the most saturated range too wide;
    /// add one near-extreme stop recovered from its statistics.
    fn add_extra_color_stop(&mut self, ranges: &mut Vec<RangeStop>) -> Result<(), TraceError> {
        let black_on_white = self.options.tracer.black_on_white;
        let last = match ranges.last() {
            Some(last) => *last,
            None => return Ok(()),
        };
        let (from, to) = if black_on_white {
            (0.0, last.value)
        } else {
            (last.value, 255.0)
        };
        if to - from <= 25.0 || last.color_intensity == 1.0 {
            return Ok(());
        }

        let levels = self
            .tracer
            .histogram()?
            .stats(from.round() as u8, to.round() as u8)?
            .levels;
        let mean = levels.mean;
        let std_dev = levels.std_dev;

        // Pick a stop within 25 units of the saturated extreme.
        let stop = if black_on_white {
            if mean + std_dev <= 25.0 {
                mean + std_dev
            } else if mean - std_dev <= 25.0 {
                mean - std_dev
            } else {
                25.0
            }
        } else if mean - std_dev >= 230.0 {
            mean - std_dev
        } else if mean + std_dev >= 230.0 {
            mean + std_dev
        } else {
            230.0
        };

        let bin = stop.round().clamp(0.0, 255.0) as u8;
        let stats = if black_on_white {
            self.tracer.histogram()?.stats(0, bin)?
        } else {
            self.tracer.histogram()?.stats(bin, 255)?
        };
        let color = stats.levels.mean;
        let intensity = if stats.pixels == 0 {
            0.0
        } else if black_on_white {
            (255.0 - color) / 255.0
        } else {
            color / 255.0
        };
        ranges.push(RangeStop {
            value: stop,
            color_intensity: intensity,
        });
        Ok(())
    }
}
