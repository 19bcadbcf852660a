//! Binary PGM (`P5`) frame persistence.
//!
//! The capture side writes each cropped frame as `P5\n{w} {h}\n255\n`
//! followed by the raw raster.  Region reads seek row by row, so a 96×96
//! read touches 96 short spans of the file instead of loading all 288×288
//! pixels.
//!
//! # Example
//!
//! ```rust,no_run
//! use turret_hal::camera::GrayFrame;
//! use turret_hal::frame_store::RegionReader;
//! use turret_hal::pgm::PgmStore;
//! use turret_types::Region;
//!
//! let mut store = PgmStore::new("/tmp/capture.pgm");
//! let image = store.write_frame(&GrayFrame::filled(288, 288, 0)).unwrap();
//! let mut reader = store.reader();
//! let pixels = reader.read_region(&image, Region::new(96, 96, 96, 96)).unwrap();
//! assert_eq!(pixels.len(), 96 * 96);
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::debug;
use turret_types::{ImageDescriptor, Region, TurretError};

use crate::camera::GrayFrame;
use crate::frame_store::{FrameSink, RegionReader};

/// Parsed PGM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgmHeader {
    pub width: u32,
    pub height: u32,
    pub max_value: u32,
    /// Byte offset of the first raster byte.
    pub data_offset: u64,
}

/// Writes frames to a single PGM file, overwriting it on every capture.
pub struct PgmStore {
    path: PathBuf,
    next_frame_id: u64,
}

impl PgmStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            next_frame_id: 1,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A reader handle over the same file.
    pub fn reader(&self) -> PgmRegionReader {
        PgmRegionReader::new(self.path.clone())
    }

    /// Write `frame` as binary PGM.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::CaptureUnavailable`] when the file cannot be
    /// written or the frame buffer does not match its geometry.
    pub fn write_frame(&mut self, frame: &GrayFrame) -> Result<ImageDescriptor, TurretError> {
        if frame.data.len() != frame.width as usize * frame.height as usize {
            return Err(TurretError::CaptureUnavailable(format!(
                "frame buffer holds {} bytes for a {}x{} frame",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }
        let fail = |e: std::io::Error| {
            TurretError::CaptureUnavailable(format!("writing {}: {e}", self.path.display()))
        };
        let mut file = File::create(&self.path).map_err(fail)?;
        write!(file, "P5\n{} {}\n255\n", frame.width, frame.height).map_err(fail)?;
        file.write_all(&frame.data).map_err(fail)?;
        file.flush().map_err(fail)?;

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        debug!(path = %self.path.display(), frame_id, "frame written");
        Ok(ImageDescriptor::new(frame.width, frame.height, frame_id))
    }
}

impl FrameSink for PgmStore {
    fn store(&mut self, frame: GrayFrame) -> Result<ImageDescriptor, TurretError> {
        self.write_frame(&frame)
    }
}

/// Serves region reads from a PGM file written by [`PgmStore`].
#[derive(Debug, Clone)]
pub struct PgmRegionReader {
    path: PathBuf,
}

impl PgmRegionReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RegionReader for PgmRegionReader {
    fn read_region(
        &mut self,
        image: &ImageDescriptor,
        region: Region,
    ) -> Result<Vec<u8>, TurretError> {
        let fail = |details: String| TurretError::RegionReadFailure { region, details };

        let file = File::open(&self.path)
            .map_err(|e| fail(format!("opening {}: {e}", self.path.display())))?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader).map_err(fail)?;

        if header.max_value > 255 {
            return Err(fail(format!("unsupported max value {}", header.max_value)));
        }
        if (header.width, header.height) != (image.width, image.height) {
            return Err(fail(format!(
                "file holds a {}x{} image, expected {}x{}",
                header.width, header.height, image.width, image.height
            )));
        }
        if !region.fits_within(header.width, header.height) {
            return Err(fail("region exceeds stored image".to_string()));
        }

        let row_len = region.width as usize;
        let mut out = vec![0u8; row_len * region.height as usize];
        for (i, chunk) in out.chunks_exact_mut(row_len).enumerate() {
            let row = u64::from(region.y) + i as u64;
            let offset = header.data_offset + row * u64::from(header.width) + u64::from(region.x);
            reader
                .seek(SeekFrom::Start(offset))
                .and_then(|_| reader.read_exact(chunk))
                .map_err(|e| fail(format!("row {row}: {e}")))?;
        }
        if header.max_value < 255 {
            rescale_to_u8(&mut out, header.max_value);
        }
        Ok(out)
    }
}

/// Stretch samples in `0..=max_value` to the full `0..=255` range, rounding
/// to nearest.  Out-of-range samples saturate.
fn rescale_to_u8(pixels: &mut [u8], max_value: u32) {
    let max = max_value.max(1);
    for p in pixels {
        *p = ((u32::from(*p).min(max) * 255 + max / 2) / max) as u8;
    }
}

/// Parse a `P5` header: magic, width, height and max value separated by
/// whitespace, with `#` comments allowed between fields.  Exactly one
/// whitespace byte separates the max value from the raster.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<PgmHeader, String> {
    let mut consumed = 0u64;
    let magic = next_token(reader, &mut consumed)?;
    if magic != "P5" {
        return Err(format!("unsupported PGM magic {magic:?}"));
    }
    let mut fields = [0u32; 3];
    for field in &mut fields {
        let token = next_token(reader, &mut consumed)?;
        *field = token
            .parse()
            .map_err(|_| format!("invalid PGM header field {token:?}"))?;
    }
    let [width, height, max_value] = fields;
    if width == 0 || height == 0 || max_value == 0 {
        return Err("PGM header has a zero field".to_string());
    }
    Ok(PgmHeader {
        width,
        height,
        max_value,
        data_offset: consumed,
    })
}

fn next_byte<R: Read>(reader: &mut R, consumed: &mut u64) -> Result<Option<u8>, String> {
    let mut byte = [0u8; 1];
    match reader.read(&mut byte) {
        Ok(0) => Ok(None),
        Ok(_) => {
            *consumed += 1;
            Ok(Some(byte[0]))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn next_token<R: Read>(reader: &mut R, consumed: &mut u64) -> Result<String, String> {
    let mut token = String::new();
    loop {
        let Some(b) = next_byte(reader, consumed)? else {
            return Err("truncated PGM header".to_string());
        };
        if b == b'#' && token.is_empty() {
            loop {
                match next_byte(reader, consumed)? {
                    Some(b'\n') => break,
                    Some(_) => {}
                    None => return Err("truncated PGM header".to_string()),
                }
            }
            continue;
        }
        if b.is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            return Ok(token);
        }
        token.push(char::from(b));
    }
}

/// Load any image file the `image` crate understands, convert it to
/// grayscale and center-crop it to `size × size`.  Images smaller than
/// `size` on either axis are scaled up first.
///
/// # Errors
///
/// Returns [`TurretError::CaptureUnavailable`] when the file cannot be
/// decoded.
pub fn load_image_file(path: &Path, size: u32) -> Result<GrayFrame, TurretError> {
    let decoded = image::open(path).map_err(|e| {
        TurretError::CaptureUnavailable(format!("decoding {}: {e}", path.display()))
    })?;
    let mut gray = decoded.to_luma8();

    let (w, h) = gray.dimensions();
    if w < size || h < size {
        let scale = f64::from(size) / f64::from(w.min(h).max(1));
        let nw = ((f64::from(w) * scale).ceil() as u32).max(size);
        let nh = ((f64::from(h) * scale).ceil() as u32).max(size);
        gray = image::imageops::resize(&gray, nw, nh, FilterType::Triangle);
    }

    let (w, h) = gray.dimensions();
    let cropped =
        image::imageops::crop_imm(&gray, (w - size) / 2, (h - size) / 2, size, size).to_image();
    Ok(GrayFrame {
        width: size,
        height: size,
        data: cropped.into_raw(),
    })
}
