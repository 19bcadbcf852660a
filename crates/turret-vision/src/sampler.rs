//! Region Sampler: turns any in-bounds region into a 96×96 classifier input.
//!
//! The bounds check runs before the reader is touched, so an invalid region
//! never causes a partial read.  The resize uses half-pixel-center mapping
//! with edge clamping, which keeps every source index inside the region.

use turret_hal::frame_store::RegionReader;
use turret_types::{
    ImageDescriptor, MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH, Region, SampleBuffer, TurretError,
};

/// Read `region` from `reader` and resize it to the classifier input.
///
/// # Errors
///
/// - [`TurretError::OutOfBounds`] when `region` is empty or does not fit in
///   `image`.  No read is issued.
/// - [`TurretError::RegionReadFailure`] when the reader fails or returns a
///   buffer whose length is not `width * height`.
pub fn sample<R: RegionReader + ?Sized>(
    reader: &mut R,
    image: &ImageDescriptor,
    region: Region,
) -> Result<SampleBuffer, TurretError> {
    if !image.contains(&region) {
        return Err(TurretError::OutOfBounds {
            region,
            image_width: image.width,
            image_height: image.height,
        });
    }

    let pixels = reader.read_region(image, region)?;
    let expected = region.area() as usize;
    if pixels.len() != expected {
        return Err(TurretError::RegionReadFailure {
            region,
            details: format!("reader returned {} bytes, expected {expected}", pixels.len()),
        });
    }

    Ok(resize_bilinear(&pixels, region.width, region.height))
}

/// Bilinear resize of a `width × height` row-major buffer to 96×96.
///
/// Only reachable through [`sample`], which has already checked that both
/// dimensions are non-zero and that `src` holds `width * height` bytes.
pub(crate) fn resize_bilinear(src: &[u8], width: u32, height: u32) -> SampleBuffer {
    debug_assert!(width > 0 && height > 0 && src.len() == width as usize * height as usize);
    let mut out = SampleBuffer::zeroed();
    let (w, h) = (width as usize, height as usize);
    let x_ratio = width as f32 / MODEL_INPUT_WIDTH as f32;
    let y_ratio = height as f32 / MODEL_INPUT_HEIGHT as f32;

    let dst = out.as_mut_slice();
    for y in 0..MODEL_INPUT_HEIGHT as usize {
        let src_y = (y as f32 + 0.5) * y_ratio - 0.5;
        let (y0, y1, dy) = neighbours(src_y, h);

        for x in 0..MODEL_INPUT_WIDTH as usize {
            let src_x = (x as f32 + 0.5) * x_ratio - 0.5;
            let (x0, x1, dx) = neighbours(src_x, w);

            let p00 = f32::from(src[y0 * w + x0]);
            let p10 = f32::from(src[y0 * w + x1]);
            let p01 = f32::from(src[y1 * w + x0]);
            let p11 = f32::from(src[y1 * w + x1]);

            let top = p00 * (1.0 - dx) + p10 * dx;
            let bottom = p01 * (1.0 - dx) + p11 * dx;
            let value = top * (1.0 - dy) + bottom * dy;

            dst[y * MODEL_INPUT_WIDTH as usize + x] = (value + 0.5).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Clamped integer neighbours of a source coordinate and the interpolation
/// weight of the second one.
///
/// The weight is measured from the clamped lower neighbour.  Where clamping
/// happens both neighbours are the same pixel, so the weight has no effect.
fn neighbours(src: f32, len: usize) -> (usize, usize, f32) {
    let floor = src.floor() as i64;
    let last = len as i64 - 1;
    let lo = floor.max(0);
    let hi = (floor + 1).min(last);
    let lo = lo.min(last);
    let hi = hi.max(0);
    (lo as usize, hi as usize, src - lo as f32)
}
