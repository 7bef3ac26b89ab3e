use ndarray::{s, ArrayView3};

use crate::shared::error::{FaceIdError, Result};
use crate::shared::facial_area::FacialArea;

/// A decoded source image: contiguous interleaved bytes in row-major order.
///
/// Decoding happens at the imaging boundary; matching and enrollment treat
/// pixel data as opaque apart from cropping.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .map_err(|e| FaceIdError::Image(format!("frame data does not match dimensions: {e}")))
    }

    /// Copies the given area out of the frame.
    ///
    /// The area must lie fully inside the frame and be non-empty.
    pub fn crop(&self, area: &FacialArea) -> Result<Frame> {
        let inside = area.x >= 0
            && area.y >= 0
            && area.w > 0
            && area.h > 0
            && i64::from(area.x) + i64::from(area.w) <= i64::from(self.width)
            && i64::from(area.y) + i64::from(area.h) <= i64::from(self.height);
        if !inside {
            return Err(FaceIdError::Image(format!(
                "crop {area:?} outside {}x{} frame",
                self.width, self.height
            )));
        }

        let (x, y, w, h) = (
            area.x as usize,
            area.y as usize,
            area.w as usize,
            area.h as usize,
        );
        let src = self.as_ndarray()?;
        let view = src.slice(s![y..y + h, x..x + w, ..]);
        let data: Vec<u8> = view.iter().copied().collect();

        Ok(Frame::new(data, w as u32, h as u32, self.channels))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
