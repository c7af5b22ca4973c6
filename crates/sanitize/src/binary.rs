use image::{GrayImage, Luma};

const ON: Luma<u8> = Luma([255u8]);
const OFF: Luma<u8> = Luma([0u8]);

/// Two-level image of foreground pixels.
///
/// Stored as a `GrayImage` holding only 0 and 255 so it can be handed
/// straight to `imageproc` morphology and labelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pixels: GrayImage,
}

impl BinaryMask {
    /// An all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        Self {
            pixels: GrayImage::from_fn(width, height, |x, y| if f(x, y) { ON } else { OFF }),
        }
    }

    /// Wrap a grayscale image, treating any non-zero pixel as foreground.
    pub fn from_luma(image: GrayImage) -> Self {
        let mut pixels = image;
        for p in pixels.pixels_mut() {
            if p[0] != 0 {
                *p = ON;
            }
        }
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y)[0] != 0
    }

    pub(crate) fn set(&mut self, x: u32, y: u32, on: bool) {
        self.pixels.put_pixel(x, y, if on { ON } else { OFF });
    }

    pub fn as_luma(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn into_luma(self) -> GrayImage {
        self.pixels
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.pixels.pixels().filter(|p| p[0] != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.pixels.pixels().any(|p| p[0] != 0)
    }

    /// Coordinates of all foreground pixels in row-major order.
    pub fn foreground(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.pixels
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(x, y, _)| (x, y))
    }

    pub fn invert(&self) -> Self {
        let (w, h) = self.dimensions();
        Self::from_fn(w, h, |x, y| !self.get(x, y))
    }

    pub fn union(&self, other: &Self) -> Self {
        let (w, h) = self.dimensions();
        Self::from_fn(w, h, |x, y| self.get(x, y) || other.get(x, y))
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let (w, h) = self.dimensions();
        Self::from_fn(w, h, |x, y| self.get(x, y) && other.get(x, y))
    }

    /// Foreground count per column.
    pub fn column_profile(&self) -> Vec<u32> {
        let mut profile = vec![0u32; self.width() as usize];
        for (x, _) in self.foreground() {
            profile[x as usize] += 1;
        }
        profile
    }

    /// Foreground count per row.
    pub fn row_profile(&self) -> Vec<u32> {
        let mut profile = vec![0u32; self.height() as usize];
        for (_, y) in self.foreground() {
            profile[y as usize] += 1;
        }
        profile
    }
}
