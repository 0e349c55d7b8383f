//! Flat byte grid holding luminance (0-255) or binary (0/1) pixels.
//!
//! The same container backs both pipeline stages: the luminance image a
//! trace starts from, and the binary map the decomposer walks. Reads
//! outside the grid return 0, which the contour follower relies on to
//! treat everything beyond the image edge as background.

use image::RgbaImage;

use crate::error::TraceError;
use crate::histogram::Histogram;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Zero-filled bitmap of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize)],
        }
    }

    /// Build a luminance bitmap from an RGBA byte buffer.
    ///
    /// Each pixel is composited over white by its alpha (a fully
    /// transparent pixel reads as 255) and converted with the Rec. 709
    /// weights `0.2126 R + 0.7153 G + 0.0721 B`, rounded.
    pub fn from_rgba(width: u32, height: u32, data: &[u8]) -> Result<Self, TraceError> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(TraceError::InvalidParameter {
                field: "data",
                reason: format!(
                    "RGBA buffer holds {} bytes, {}x{} needs {}",
                    data.len(),
                    width,
                    height,
                    expected
                ),
            });
        }
        let mut bitmap = Bitmap::new(width, height);
        for (i, px) in data.chunks_exact(4).enumerate() {
            let alpha = px[3] as f64 / 255.0;
            let r = 255.0 + (px[0] as f64 - 255.0) * alpha;
            let g = 255.0 + (px[1] as f64 - 255.0) * alpha;
            let b = 255.0 + (px[2] as f64 - 255.0) * alpha;
            bitmap.data[i] = (0.2126 * r + 0.7153 * g + 0.0721 * b).round().clamp(0.0, 255.0) as u8;
        }
        Ok(bitmap)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(x, y)`; out-of-range reads yield 0 (background).
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Set the value at `(x, y)`; out-of-range writes are ignored.
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        self.data[y as usize * self.width as usize + x as usize] = value;
    }

    /// Toggle a binary pixel between 0 and 1 (used by the XOR fill).
    pub(crate) fn flip(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = if self.data[idx] == 0 { 1 } else { 0 };
    }

    pub(crate) fn byte(&self, index: usize) -> u8 {
        self.data[index]
    }

    pub(crate) fn index_to_point(&self, index: usize) -> (i32, i32) {
        let w = self.width as usize;
        ((index % w) as i32, (index / w) as i32)
    }

    /// Same-sized bitmap with every value passed through `map`. This is
    /// the binarization primitive: thresholding is a `copy_map` from
    /// luminance bytes to 0/1.
    pub fn copy_map(&self, map: impl Fn(u8) -> u8) -> Bitmap {
        Bitmap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| map(v)).collect(),
        }
    }

    /// 256-bin distribution of the pixel values.
    pub fn histogram(&self) -> Histogram {
        Histogram::from_pixels(&self.data)
    }
}

impl From<&RgbaImage> for Bitmap {
    fn from(image: &RgbaImage) -> Self {
        Bitmap::from_rgba(image.width(), image.height(), image.as_raw())
            .expect("RgbaImage backing buffer is always width*height*4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reads_are_background() {
        let mut bm = Bitmap::new(3, 2);
        bm.set(2, 1, 7);
        assert_eq!(bm.get(2, 1), 7);
        assert_eq!(bm.get(-1, 0), 0);
        assert_eq!(bm.get(0, -1), 0);
        assert_eq!(bm.get(3, 0), 0);
        assert_eq!(bm.get(0, 2), 0);
    }

    #[test]
    fn luminance_weights() {
        // One pure-red, one pure-green, one pure-blue, one white pixel.
        let data = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 0, 255, 255, //
            255, 255, 255, 255,
        ];
        let bm = Bitmap::from_rgba(4, 1, &data).unwrap();
        assert_eq!(bm.get(0, 0), 54); // round(0.2126 * 255)
        assert_eq!(bm.get(1, 0), 182); // round(0.7153 * 255)
        assert_eq!(bm.get(2, 0), 18); // round(0.0721 * 255)
        assert_eq!(bm.get(3, 0), 255);
    }

    #[test]
    fn transparent_pixels_read_as_white() {
        let data = [0, 0, 0, 0, 0, 0, 0, 128];
        let bm = Bitmap::from_rgba(2, 1, &data).unwrap();
        assert_eq!(bm.get(0, 0), 255);
        // Half-transparent black composites to mid gray.
        let v = bm.get(1, 0);
        assert!((126..=129).contains(&v), "got {}", v);
    }

    #[test]
    fn rgba_length_mismatch_is_rejected() {
        assert!(matches!(
            Bitmap::from_rgba(2, 2, &[0; 15]),
            Err(TraceError::InvalidParameter { field: "data", .. })
        ));
    }

    #[test]
    fn copy_map_preserves_dimensions() {
        let mut bm = Bitmap::new(2, 2);
        bm.set(0, 0, 200);
        let bin = bm.copy_map(|v| if v > 128 { 1 } else { 0 });
        assert_eq!(bin.width(), 2);
        assert_eq!(bin.height(), 2);
        assert_eq!(bin.get(0, 0), 1);
        assert_eq!(bin.get(1, 1), 0);
    }
}
