//! Contour extraction from a binary bitmap.
//!
//! Walks the boundary between foreground and background on the pixel
//! corner grid, keeping foreground on the left, and XOR-fills each traced
//! interior so the raster scan discovers nested contours (holes, islands
//! inside holes) as fresh foreground. Ambiguous diagonal crossings are
//! resolved by the configured turn policy.

use log::debug;

use crate::bitmap::Bitmap;
use crate::config::TurnPolicy;

/// Orientation of a contour relative to the original image: `Positive`
/// contours started on a foreground pixel, `Negative` ones are holes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sign {
    Positive,
    Negative,
}

/// A closed contour on the pixel corner grid. Consecutive points differ
/// by a unit step along exactly one axis; the first point implicitly
/// repeats at the end.
#[derive(Debug, Clone)]
pub(crate) struct Contour {
    pub points: Vec<(i32, i32)>,
    pub sign: Sign,
    /// Enclosed area in pixels; positive for every traversal.
    pub area: i64,
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

/// Decompose a binary bitmap (1 = foreground) into closed contours,
/// dropping any that enclose no more than `turd_size` pixels.
pub(crate) fn decompose(binary: &Bitmap, policy: TurnPolicy, turd_size: u32) -> Vec<Contour> {
    let mut decomposer = Decomposer::new(binary, policy);
    let mut contours = Vec::new();
    while let Some(start) = decomposer.find_next() {
        let contour = decomposer.find_path(start);
        decomposer.xor_path(&contour);
        if contour.area > turd_size as i64 {
            contours.push(contour);
        }
    }
    debug!(
        "decomposed {} contours (turd_size {})",
        contours.len(),
        turd_size
    );
    contours
}

/// Edge-following state: the original map (for sign detection), the
/// working copy that gets XOR-ed as contours are consumed, and the raster
/// scan cursor.
struct Decomposer<'a> {
    original: &'a Bitmap,
    work: Bitmap,
    policy: TurnPolicy,
    cursor: usize,
}

impl<'a> Decomposer<'a> {
    fn new(binary: &'a Bitmap, policy: TurnPolicy) -> Self {
        Self {
            original: binary,
            work: binary.clone(),
            policy,
            cursor: 0,
        }
    }

    /// Next foreground pixel in row-major order, or `None` when the
    /// working bitmap has been fully consumed.
    fn find_next(&mut self) -> Option<(i32, i32)> {
        let size = self.work.len();
        while self.cursor < size && self.work.byte(self.cursor) != 1 {
            self.cursor += 1;
        }
        if self.cursor < size {
            Some(self.work.index_to_point(self.cursor))
        } else {
            None
        }
    }

    /// Majority color in expanding square neighborhoods around `(x, y)`.
    fn majority(&self, x: i32, y: i32) -> bool {
        for i in 2..5 {
            let mut tally = 0i32;
            for a in -i + 1..=i - 1 {
                tally += if self.work.get(x + a, y + i - 1) != 0 { 1 } else { -1 };
                tally += if self.work.get(x + i - 1, y + a - 1) != 0 { 1 } else { -1 };
                tally += if self.work.get(x + a - 1, y - i) != 0 { 1 } else { -1 };
                tally += if self.work.get(x - i, y + a) != 0 { 1 } else { -1 };
            }
            if tally > 0 {
                return true;
            } else if tally < 0 {
                return false;
            }
        }
        false
    }

    /// Follow one closed boundary starting at `start`, heading down.
    fn find_path(&self, start: (i32, i32)) -> Contour {
        let sign = if self.original.get(start.0, start.1) != 0 {
            Sign::Positive
        } else {
            Sign::Negative
        };

        let (mut x, mut y) = start;
        let (mut dirx, mut diry) = (0i32, 1i32);
        let mut points = Vec::new();
        let mut area = 0i64;
        let (mut min_x, mut min_y) = start;
        let (mut max_x, mut max_y) = start;

        loop {
            points.push((x, y));
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            x += dirx;
            y += diry;
            area -= x as i64 * diry as i64;

            if (x, y) == start {
                break;
            }

            // The two pixels flanking the edge ahead. The (dir ± dir - 1)/2
            // offsets map each of the four headings onto the pixel to the
            // left (`l`) and right (`r`) of travel.
            let l = self.work.get(x + (dirx + diry - 1) / 2, y + (diry - dirx - 1) / 2);
            let r = self.work.get(x + (dirx - diry - 1) / 2, y + (diry + dirx - 1) / 2);

            if r != 0 && l == 0 {
                // Diagonal crossing: both turns keep foreground on the
                // left, so the policy decides.
                let turn_right = match self.policy {
                    TurnPolicy::Right => true,
                    TurnPolicy::Left => false,
                    TurnPolicy::Black => sign == Sign::Positive,
                    TurnPolicy::White => sign == Sign::Negative,
                    TurnPolicy::Majority => self.majority(x, y),
                    TurnPolicy::Minority => !self.majority(x, y),
                };
                if turn_right {
                    let t = dirx;
                    dirx = -diry;
                    diry = t;
                } else {
                    let t = dirx;
                    dirx = diry;
                    diry = -t;
                }
            } else if r != 0 {
                let t = dirx;
                dirx = -diry;
                diry = t;
            } else if l == 0 {
                let t = dirx;
                dirx = diry;
                diry = -t;
            }
        }

        Contour {
            points,
            sign,
            area,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Toggle the contour's interior in the working bitmap. Every
    /// vertical step flips its row from the step's column out to the
    /// contour's right edge; toggles cancel pairwise outside the
    /// interior.
    fn xor_path(&mut self, contour: &Contour) {
        let points = &contour.points;
        if points.is_empty() {
            return;
        }
        let mut y_prev = points[0].1;
        for &(x, y) in &points[1..] {
            if y != y_prev {
                let row = y_prev.min(y);
                for column in x..contour.max_x {
                    self.work.flip(column, row);
                }
                y_prev = y;
            }
        }
    }
}
