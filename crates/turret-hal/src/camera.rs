//! Generic `Camera` trait and the grayscale center crop.
//!
//! Sensors deliver frames wider than they are tall (CIF is 352×288).  The
//! detection core only ever sees a square single-channel image, so every
//! frame goes through [`CameraFrame::center_crop_gray`] before it is stored.

use turret_types::TurretError;

/// Pixel layout of a [`CameraFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    Grayscale,
    /// Two bytes per pixel, little-endian `RRRRRGGGGGGBBBBB`.
    Rgb565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Grayscale => 1,
            PixelFormat::Rgb565 => 2,
        }
    }
}

/// A raw image frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    pub format: PixelFormat,
    /// Raw pixel data, row-major.
    pub data: Vec<u8>,
}

/// A single-channel 8-bit image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    /// A frame filled with `level`.
    pub fn filled(width: u32, height: u32, level: u8) -> Self {
        Self {
            width,
            height,
            data: vec![level; width as usize * height as usize],
        }
    }

    /// Copy out the pixels of `region`, row by row.  Returns `None` when the
    /// region does not fit inside the frame.
    pub fn copy_region(&self, region: turret_types::Region) -> Option<Vec<u8>> {
        if !region.fits_within(self.width, self.height)
            || self.data.len() != self.width as usize * self.height as usize
        {
            return None;
        }
        let stride = self.width as usize;
        let (x, w) = (region.x as usize, region.width as usize);
        let mut out = Vec::with_capacity(region.area() as usize);
        for row in region.y as usize..(region.y + region.height) as usize {
            let start = row * stride + x;
            out.extend_from_slice(&self.data[start..start + w]);
        }
        Some(out)
    }
}

/// Luma of one RGB565 pixel using the integer weights 30/59/11.
pub fn rgb565_to_gray(pixel: u16) -> u8 {
    let r = u32::from((pixel >> 11) & 0x1F) << 3;
    let g = u32::from((pixel >> 5) & 0x3F) << 2;
    let b = u32::from(pixel & 0x1F) << 3;
    ((r * 30 + g * 59 + b * 11) / 100) as u8
}

impl CameraFrame {
    /// Crop a `size × size` square from the middle of the frame and convert
    /// it to grayscale.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::CaptureUnavailable`] when the frame is smaller
    /// than `size` or its buffer does not match the declared geometry.
    pub fn center_crop_gray(&self, size: u32) -> Result<GrayFrame, TurretError> {
        if size == 0 || self.width < size || self.height < size {
            return Err(TurretError::CaptureUnavailable(format!(
                "{}x{} frame cannot be cropped to {size}x{size}",
                self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        let expected = self.width as usize * self.height as usize * bpp;
        if self.data.len() != expected {
            return Err(TurretError::CaptureUnavailable(format!(
                "frame buffer holds {} bytes, expected {expected}",
                self.data.len()
            )));
        }

        let x0 = ((self.width - size) / 2) as usize;
        let y0 = ((self.height - size) / 2) as usize;
        let stride = self.width as usize * bpp;
        let side = size as usize;
        let mut data = Vec::with_capacity(side * side);

        for row in y0..y0 + side {
            let line = &self.data[row * stride..(row + 1) * stride];
            match self.format {
                PixelFormat::Grayscale => data.extend_from_slice(&line[x0..x0 + side]),
                PixelFormat::Rgb565 => data.extend(
                    line[x0 * 2..(x0 + side) * 2]
                        .chunks_exact(2)
                        .map(|px| rgb565_to_gray(u16::from_le_bytes([px[0], px[1]]))),
                ),
            }
        }

        Ok(GrayFrame {
            width: size,
            height: size,
            data,
        })
    }
}

/// A camera or image-capture device.
pub trait Camera: Send + Sync {
    /// Stable identifier for this camera, e.g. `"turret_cam"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::CaptureUnavailable`] if the frame cannot be
    /// captured (device disconnected, buffer unavailable).
    fn capture(&mut self) -> Result<CameraFrame, TurretError>;
}

/// A camera that returns the same frame forever.  Used to replay an image
/// file through the detection loop.
pub struct StillCamera {
    id: String,
    frame: CameraFrame,
}

impl StillCamera {
    pub fn new(id: impl Into<String>, frame: CameraFrame) -> Self {
        Self {
            id: id.into(),
            frame,
        }
    }

    /// Wrap an already-cropped grayscale frame.
    pub fn from_gray(id: impl Into<String>, frame: GrayFrame) -> Self {
        Self::new(
            id,
            CameraFrame {
                width: frame.width,
                height: frame.height,
                format: PixelFormat::Grayscale,
                data: frame.data,
            },
        )
    }
}

impl Camera for StillCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, TurretError> {
        Ok(self.frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_types::Region;

    struct MockCamera {
        id: String,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<CameraFrame, TurretError> {
            Err(TurretError::CaptureUnavailable("no frame buffer".to_string()))
        }
    }

    #[test]
    fn mock_camera_reports_unavailable() {
        let mut cam = MockCamera {
            id: "turret_cam".to_string(),
        };
        assert_eq!(cam.id(), "turret_cam");
        assert!(matches!(
            cam.capture(),
            Err(TurretError::CaptureUnavailable(_))
        ));
    }

    #[test]
    fn rgb565_extremes() {
        assert_eq!(rgb565_to_gray(0x0000), 0);
        // 248*30 + 252*59 + 248*11 = 25036 -> 250
        assert_eq!(rgb565_to_gray(0xFFFF), 250);
        // Pure red: 248 * 30 / 100 = 74
        assert_eq!(rgb565_to_gray(0xF800), 74);
    }

    #[test]
    fn center_crop_grayscale_takes_middle() {
        // 6×4 frame, values = column index.
        let data: Vec<u8> = (0..4).flat_map(|_| 0u8..6).collect();
        let frame = CameraFrame {
            width: 6,
            height: 4,
            format: PixelFormat::Grayscale,
            data,
        };
        let crop = frame.center_crop_gray(2).unwrap();
        assert_eq!(crop.width, 2);
        assert_eq!(crop.data, vec![2, 3, 2, 3]);
    }

    #[test]
    fn center_crop_rgb565_converts() {
        let white = 0xFFFFu16.to_le_bytes();
        let data: Vec<u8> = std::iter::repeat(white).take(9).flatten().collect();
        let frame = CameraFrame {
            width: 3,
            height: 3,
            format: PixelFormat::Rgb565,
            data,
        };
        let crop = frame.center_crop_gray(1).unwrap();
        assert_eq!(crop.data, vec![250]);
    }

    #[test]
    fn center_crop_rejects_small_or_short_frames() {
        let frame = CameraFrame {
            width: 4,
            height: 4,
            format: PixelFormat::Grayscale,
            data: vec![0; 16],
        };
        assert!(frame.center_crop_gray(5).is_err());

        let short = CameraFrame {
            data: vec![0; 10],
            ..frame
        };
        assert!(short.center_crop_gray(2).is_err());
    }

    #[test]
    fn gray_frame_copy_region() {
        let mut frame = GrayFrame::filled(4, 4, 0);
        frame.data[5] = 9; // (1, 1)
        assert_eq!(frame.copy_region(Region::new(1, 1, 2, 1)), Some(vec![9, 0]));
        assert_eq!(frame.copy_region(Region::new(3, 3, 2, 2)), None);
    }

    #[test]
    fn still_camera_repeats() {
        let mut cam = StillCamera::from_gray("replay", GrayFrame::filled(2, 2, 7));
        let a = cam.capture().unwrap();
        let b = cam.capture().unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.format, PixelFormat::Grayscale);
    }
}
