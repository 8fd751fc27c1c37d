//! Batched raster tensors and the resampling primitives built on them.
//!
//! Images are 4-dimensional arrays with fixed axis order
//! (batch, height, width, channel); masks drop the channel axis. Elements are
//! `f32` conventionally normalized to `[0, 1]`. Resampling runs per
//! batch/channel plane through [`image`]'s resize filters, so images get the
//! same Lanczos quality the rest of the ecosystem uses while masks keep hard
//! edges via nearest-neighbor.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use ndarray::{s, Array2, Array3, Array4, ArrayView2};

/// A batched multi-channel image, axes (batch, height, width, channel).
pub type ImageTensor = Array4<f32>;

/// A batched single-channel mask, axes (batch, height, width).
pub type MaskTensor = Array3<f32>;

/// Axis index of the height (vertical) axis in both tensor kinds.
pub const HEIGHT_AXIS: usize = 1;

/// Axis index of the width (horizontal) axis in both tensor kinds.
pub const WIDTH_AXIS: usize = 2;

/// Resample every plane of a batched image to `height` x `width`.
///
/// Each (batch, channel) plane is resampled independently with `filter`.
/// A zero target or source extent short-circuits to a zero-filled tensor of
/// the requested shape.
#[must_use]
pub fn resize(image: &ImageTensor, width: usize, height: usize, filter: FilterType) -> ImageTensor {
    let (batch, src_h, src_w, channels) = image.dim();
    let mut out = ImageTensor::zeros((batch, height, width, channels));
    if width == 0 || height == 0 || src_h == 0 || src_w == 0 {
        return out;
    }
    for b in 0..batch {
        for c in 0..channels {
            let plane = resize_plane(image.slice(s![b, .., .., c]), width, height, filter);
            out.slice_mut(s![b, .., .., c]).assign(&plane);
        }
    }
    out
}

/// Resample a batched mask to `height` x `width` with nearest-neighbor.
///
/// Masks are never smoothed; nearest-neighbor keeps their edges hard.
#[must_use]
pub fn resize_mask(mask: &MaskTensor, width: usize, height: usize) -> MaskTensor {
    let (batch, src_h, src_w) = mask.dim();
    let mut out = MaskTensor::zeros((batch, height, width));
    if width == 0 || height == 0 || src_h == 0 || src_w == 0 {
        return out;
    }
    for b in 0..batch {
        let plane = resize_plane(mask.slice(s![b, .., ..]), width, height, FilterType::Nearest);
        out.slice_mut(s![b, .., ..]).assign(&plane);
    }
    out
}

/// Resample one 2D plane via an `image` gray buffer.
///
/// # Panics
///
/// Never in practice: the raw buffers are constructed with matching lengths.
#[allow(clippy::cast_possible_truncation)]
fn resize_plane(
    plane: ArrayView2<'_, f32>,
    width: usize,
    height: usize,
    filter: FilterType,
) -> Array2<f32> {
    let (src_h, src_w) = plane.dim();
    let raw: Vec<f32> = plane.iter().copied().collect();
    let src: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(src_w as u32, src_h as u32, raw)
            .expect("plane buffer matches its dimensions");
    let resized = imageops::resize(&src, width as u32, height as u32, filter);
    Array2::from_shape_vec((height, width), resized.into_raw())
        .expect("resized buffer matches its dimensions")
}

/// Pad a batched image on its spatial axes with a constant fill value.
#[must_use]
pub fn pad(
    image: &ImageTensor,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
    fill: f32,
) -> ImageTensor {
    let (batch, h, w, channels) = image.dim();
    let mut out = ImageTensor::from_elem((batch, top + h + bottom, left + w + right, channels), fill);
    out.slice_mut(s![.., top..top + h, left..left + w, ..])
        .assign(image);
    out
}

/// Pad a batched mask on its spatial axes with a constant fill value.
#[must_use]
pub fn pad_mask(
    mask: &MaskTensor,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
    fill: f32,
) -> MaskTensor {
    let (batch, h, w) = mask.dim();
    let mut out = MaskTensor::from_elem((batch, top + h + bottom, left + w + right), fill);
    out.slice_mut(s![.., top..top + h, left..left + w])
        .assign(mask);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_places_content_and_fill() {
        let image = ImageTensor::from_elem((1, 2, 2, 3), 0.5);
        let padded = pad(&image, 1, 2, 3, 4, 0.0);
        assert_eq!(padded.dim(), (1, 5, 9, 3));
        assert_eq!(padded[[0, 1, 3, 0]], 0.5);
        assert_eq!(padded[[0, 2, 4, 2]], 0.5);
        assert_eq!(padded[[0, 0, 0, 0]], 0.0);
        assert_eq!(padded[[0, 4, 8, 1]], 0.0);
    }

    #[test]
    fn pad_mask_keeps_fill_value() {
        let mask = MaskTensor::zeros((2, 3, 3));
        let padded = pad_mask(&mask, 0, 1, 1, 0, 1.0);
        assert_eq!(padded.dim(), (2, 4, 4));
        assert_eq!(padded[[0, 3, 0]], 1.0);
        assert_eq!(padded[[1, 0, 0]], 1.0);
        assert_eq!(padded[[0, 0, 1]], 0.0);
    }

    #[test]
    fn resize_mask_nearest_replicates_pixels() {
        let mut mask = MaskTensor::zeros((1, 1, 2));
        mask[[0, 0, 1]] = 1.0;
        let resized = resize_mask(&mask, 4, 1);
        assert_eq!(resized.dim(), (1, 1, 4));
        assert_eq!(resized[[0, 0, 0]], 0.0);
        assert_eq!(resized[[0, 0, 1]], 0.0);
        assert_eq!(resized[[0, 0, 2]], 1.0);
        assert_eq!(resized[[0, 0, 3]], 1.0);
    }

    #[test]
    fn resize_constant_image_stays_constant() {
        let image = ImageTensor::from_elem((1, 8, 8, 3), 0.25);
        let resized = resize(&image, 16, 16, FilterType::Lanczos3);
        assert_eq!(resized.dim(), (1, 16, 16, 3));
        for &v in &resized {
            assert!((v - 0.25).abs() < 1e-4, "expected 0.25, got {v}");
        }
    }

    #[test]
    fn resize_to_zero_extent_yields_empty_tensor() {
        let image = ImageTensor::from_elem((2, 4, 4, 1), 1.0);
        let resized = resize(&image, 0, 4, FilterType::Lanczos3);
        assert_eq!(resized.dim(), (2, 4, 0, 1));
    }
}
