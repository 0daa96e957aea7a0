//! Marker tracking: color segmentation, morphology and blob extraction.

pub mod blob;
pub mod morph;
pub mod segment;

pub use blob::Blob;
pub use segment::{HsvRange, BLUE_RANGE, GREEN_RANGE};

/// Binary image: one byte per pixel, 0 or 255, frame dimensions.
#[derive(Debug, Clone)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Mask {
    /// All-zero mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height) as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize] != 0
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32) {
        self.data[(y * self.width + x) as usize] = 255;
    }

    /// Number of set pixels.
    pub fn set_count(&self) -> usize {
        self.data.iter().filter(|&&p| p != 0).count()
    }
}
