//! Alignment helpers shared by the stitch pipelines.
//!
//! Before two pieces can be concatenated they must agree on every axis except
//! the stitched one: batch counts are equalized by repeating the last frame,
//! the perpendicular extent is equalized by resampling or padding, and image
//! channel counts are equalized by appending opaque channels. Separator
//! blocks are built here too, since their extents derive from the aligned
//! pieces.

use image::imageops::FilterType;
use ndarray::{concatenate, s, Array, Axis, Dimension, RemoveAxis, Slice};

use crate::error::{Error, Result};
use crate::stitch::{Direction, SpacingColor};
use crate::tensor::{self, ImageTensor, MaskTensor};

/// Equalize batch counts by repeating the last batch element of the shorter
/// tensor. Never truncates or reorders; equal batches are a no-op.
pub(crate) fn align_batch<D>(a: &Array<f32, D>, b: &Array<f32, D>) -> (Array<f32, D>, Array<f32, D>)
where
    D: Dimension + RemoveAxis,
{
    let b1 = a.len_of(Axis(0));
    let b2 = b.len_of(Axis(0));
    let max = b1.max(b2);
    (repeat_last(a, max - b1), repeat_last(b, max - b2))
}

/// Append `extra` copies of the last batch element.
fn repeat_last<D>(tensor: &Array<f32, D>, extra: usize) -> Array<f32, D>
where
    D: Dimension + RemoveAxis,
{
    if extra == 0 {
        return tensor.clone();
    }
    let count = tensor.len_of(Axis(0));
    let last = tensor.slice_axis(Axis(0), Slice::from(count - 1..));
    let mut parts = Vec::with_capacity(extra + 1);
    parts.push(tensor.view());
    for _ in 0..extra {
        parts.push(last.clone());
    }
    concatenate(Axis(0), &parts).expect("batch slices share non-batch extents")
}

/// Equalize image channel counts by appending `1.0`-filled (opaque) channels
/// to whichever image has fewer. Masks have no channel axis and are never
/// touched by this step.
pub(crate) fn align_channels(
    img1: &ImageTensor,
    img2: &ImageTensor,
) -> (ImageTensor, ImageTensor) {
    let c1 = img1.len_of(Axis(3));
    let c2 = img2.len_of(Axis(3));
    let max = c1.max(c2);
    (extend_channels(img1, max), extend_channels(img2, max))
}

fn extend_channels(img: &ImageTensor, target: usize) -> ImageTensor {
    let (batch, h, w, c) = img.dim();
    if c >= target {
        return img.clone();
    }
    let opaque = ImageTensor::from_elem((batch, h, w, target - c), 1.0);
    concatenate(Axis(3), &[img.view(), opaque.view()])
        .expect("channel extension shares spatial extents")
}

/// Resample `img` so its perpendicular extent matches the reference piece,
/// scaling the stitched-axis extent proportionally from its own aspect ratio.
///
/// # Errors
///
/// Returns [`Error::ZeroExtent`] when `img` has a zero height or width, which
/// would make the proportional scale undefined.
pub(crate) fn resize_to_match(
    img: &ImageTensor,
    reference: &ImageTensor,
    direction: Direction,
) -> Result<ImageTensor> {
    let (_, ref_h, ref_w, _) = reference.dim();
    let (_, h, w, _) = img.dim();
    if h == 0 || w == 0 {
        return Err(Error::ZeroExtent {
            height: h,
            width: w,
        });
    }
    let (target_w, target_h) = if direction.is_horizontal() {
        (ref_h * w / h, ref_h)
    } else {
        (ref_w, ref_w * h / w)
    };
    Ok(tensor::resize(img, target_w, target_h, FilterType::Lanczos3))
}

/// Zero-pad both pieces along the perpendicular axis to the larger extent.
pub(crate) fn pad_to_match(
    img1: &ImageTensor,
    img2: &ImageTensor,
    direction: Direction,
) -> (ImageTensor, ImageTensor) {
    let (_, h1, w1, _) = img1.dim();
    let (_, h2, w2, _) = img2.dim();
    if direction.is_horizontal() {
        let target = h1.max(h2);
        let (top1, bottom1) = split_pad(h1, target);
        let (top2, bottom2) = split_pad(h2, target);
        (
            tensor::pad(img1, top1, bottom1, 0, 0, 0.0),
            tensor::pad(img2, top2, bottom2, 0, 0, 0.0),
        )
    } else {
        let target = w1.max(w2);
        let (left1, right1) = split_pad(w1, target);
        let (left2, right2) = split_pad(w2, target);
        (
            tensor::pad(img1, 0, 0, left1, right1, 0.0),
            tensor::pad(img2, 0, 0, left2, right2, 0.0),
        )
    }
}

/// Zero-pad a mask to its image's spatial extents, splitting like the image.
pub(crate) fn pad_mask_to_match(
    mask: &MaskTensor,
    target_h: usize,
    target_w: usize,
) -> MaskTensor {
    let (_, h, w) = mask.dim();
    let (top, bottom) = split_pad(h, target_h);
    let (left, right) = split_pad(w, target_w);
    tensor::pad_mask(mask, top, bottom, left, right, 0.0)
}

/// Split padding as evenly as possible; the odd remainder pixel goes to the
/// end (bottom/right).
fn split_pad(current: usize, target: usize) -> (usize, usize) {
    let diff = target - current;
    (diff / 2, diff - diff / 2)
}

/// Build a solid-fill separator block.
///
/// The thickness lies along the stitched axis; the perpendicular extent and
/// batch/channel counts come from the already-aligned pieces. Channel 3, when
/// present, is always fully opaque regardless of the fill color.
pub(crate) fn spacing_block(
    batch: usize,
    perpendicular: usize,
    thickness: usize,
    channels: usize,
    color: SpacingColor,
    direction: Direction,
) -> ImageTensor {
    let (h, w) = if direction.is_horizontal() {
        (perpendicular, thickness)
    } else {
        (thickness, perpendicular)
    };
    let mut block = ImageTensor::zeros((batch, h, w, channels));
    for c in 0..channels {
        let value = if c == 3 { 1.0 } else { color.channel_value(c) };
        block.slice_mut(s![.., .., .., c]).fill(value);
    }
    block
}

/// Build the zero-filled mask counterpart of a separator block.
pub(crate) fn spacing_mask(
    batch: usize,
    perpendicular: usize,
    thickness: usize,
    direction: Direction,
) -> MaskTensor {
    let (h, w) = if direction.is_horizontal() {
        (perpendicular, thickness)
    } else {
        (thickness, perpendicular)
    };
    MaskTensor::zeros((batch, h, w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_batch_replicates_last_frame() {
        let mut short = ImageTensor::zeros((2, 2, 2, 3));
        short.slice_mut(s![1, .., .., ..]).fill(0.7);
        let long = ImageTensor::zeros((5, 2, 2, 3));

        let (a, b) = align_batch(&short, &long);
        assert_eq!(a.dim(), (5, 2, 2, 3));
        assert_eq!(b.dim(), (5, 2, 2, 3));
        // Frames 2..5 are copies of frame 1.
        for frame in 2..5 {
            assert_eq!(a[[frame, 0, 0, 0]], 0.7);
            assert_eq!(a[[frame, 1, 1, 2]], 0.7);
        }
        assert_eq!(a[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn align_batch_repeats_mask_frame_several_times() {
        let mut short = MaskTensor::zeros((1, 2, 2));
        short[[0, 1, 1]] = 1.0;
        let long = MaskTensor::zeros((4, 2, 2));

        let (a, b) = align_batch(&short, &long);
        assert_eq!(a.dim(), (4, 2, 2));
        assert_eq!(b.dim(), (4, 2, 2));
        for frame in 0..4 {
            assert_eq!(a[[frame, 1, 1]], 1.0);
            assert_eq!(a[[frame, 0, 0]], 0.0);
        }
    }

    #[test]
    fn align_batch_equal_counts_is_noop() {
        let x = MaskTensor::from_elem((3, 4, 4), 0.5);
        let y = MaskTensor::zeros((3, 4, 4));
        let (a, b) = align_batch(&x, &y);
        assert_eq!(a, x);
        assert_eq!(b, y);
    }

    #[test]
    fn align_channels_appends_opaque_channels() {
        let rgb = ImageTensor::from_elem((1, 2, 2, 3), 0.2);
        let rgba = ImageTensor::from_elem((1, 2, 2, 4), 0.9);
        let (a, b) = align_channels(&rgb, &rgba);
        assert_eq!(a.dim(), (1, 2, 2, 4));
        assert_eq!(b.dim(), (1, 2, 2, 4));
        assert_eq!(a[[0, 0, 0, 2]], 0.2);
        assert_eq!(a[[0, 0, 0, 3]], 1.0);
        assert_eq!(b, rgba);
    }

    #[test]
    fn split_pad_sends_odd_remainder_to_end() {
        assert_eq!(split_pad(4, 4), (0, 0));
        assert_eq!(split_pad(3, 8), (2, 3));
        assert_eq!(split_pad(4, 9), (2, 3));
    }

    #[test]
    fn pad_to_match_equalizes_heights_for_horizontal_stitch() {
        let img1 = ImageTensor::from_elem((1, 3, 2, 3), 1.0);
        let img2 = ImageTensor::from_elem((1, 6, 2, 3), 1.0);
        let (a, b) = pad_to_match(&img1, &img2, Direction::Right);
        assert_eq!(a.dim(), (1, 6, 2, 3));
        assert_eq!(b.dim(), (1, 6, 2, 3));
        // img1 grew by 3 rows: 1 on top, 2 on the bottom, zero filled.
        assert_eq!(a[[0, 0, 0, 0]], 0.0);
        assert_eq!(a[[0, 1, 0, 0]], 1.0);
        assert_eq!(a[[0, 3, 0, 0]], 1.0);
        assert_eq!(a[[0, 4, 0, 0]], 0.0);
    }

    #[test]
    fn resize_to_match_scales_proportionally() {
        let reference = ImageTensor::zeros((1, 64, 10, 3));
        let img = ImageTensor::from_elem((1, 32, 64, 3), 1.0);
        let resized = resize_to_match(&img, &reference, Direction::Right).unwrap();
        assert_eq!(resized.dim(), (1, 64, 128, 3));

        let resized = resize_to_match(&img, &reference, Direction::Down).unwrap();
        // Width matches the reference, height scales by 10 * 32 / 64 = 5.
        assert_eq!(resized.dim(), (1, 5, 10, 3));
    }

    #[test]
    fn resize_to_match_rejects_zero_extent() {
        let reference = ImageTensor::zeros((1, 64, 64, 3));
        let img = ImageTensor::zeros((1, 0, 64, 3));
        let err = resize_to_match(&img, &reference, Direction::Right).unwrap_err();
        assert!(matches!(err, Error::ZeroExtent { height: 0, width: 64 }));
    }

    #[test]
    fn spacing_block_fills_red_with_opaque_alpha() {
        let block = spacing_block(2, 5, 3, 4, SpacingColor::Red, Direction::Right);
        assert_eq!(block.dim(), (2, 5, 3, 4));
        assert_eq!(block[[0, 0, 0, 0]], 1.0);
        assert_eq!(block[[1, 4, 2, 1]], 0.0);
        assert_eq!(block[[1, 4, 2, 2]], 0.0);
        assert_eq!(block[[0, 2, 1, 3]], 1.0);
    }

    #[test]
    fn spacing_block_orients_by_direction() {
        let horizontal = spacing_block(1, 7, 2, 3, SpacingColor::White, Direction::Left);
        assert_eq!(horizontal.dim(), (1, 7, 2, 3));
        let vertical = spacing_block(1, 7, 2, 3, SpacingColor::White, Direction::Up);
        assert_eq!(vertical.dim(), (1, 2, 7, 3));
        assert_eq!(vertical[[0, 1, 6, 0]], 1.0);
    }

    #[test]
    fn spacing_mask_is_all_zero() {
        let mask = spacing_mask(1, 4, 2, Direction::Down);
        assert_eq!(mask.dim(), (1, 2, 4));
        assert!(mask.iter().all(|&v| v == 0.0));
    }
}
