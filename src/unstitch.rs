//! Inverse transform: recover one original piece from a stitched tensor.
//!
//! Unstitching depends only on the [`StitchMetadata`] record and the combined
//! tensor(s). The stored `shape1` gives the first piece's extent along the
//! stitched axis; everything else is arithmetic on the combined extent. The
//! raw stored `spacing_width` is trusted as-is, so odd-width separators
//! inserted by [`crate::stitch_images`] (which rounds up to even) recover the
//! second piece one pixel long, carrying one separator column with it.

use ndarray::{Axis, Slice};

use crate::error::{Error, Result};
use crate::stitch::StitchMetadata;
use crate::tensor::{ImageTensor, MaskTensor};

/// Which original piece an unstitch call returns, 1-based like the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The first (origin) piece.
    First,
    /// The second (appended) piece.
    Second,
}

impl Selection {
    /// The 1-based host-facing index.
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

impl TryFrom<u32> for Selection {
    type Error = Error;

    fn try_from(index: u32) -> Result<Self> {
        match index {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(Error::InvalidSelection(other)),
        }
    }
}

/// Half-open slice ranges of both pieces along the stitched axis.
fn slice_ranges(
    metadata: &StitchMetadata,
    total: usize,
) -> Result<((usize, usize), (usize, usize))> {
    let spacing = metadata.spacing_width() as usize;
    let orig1 = metadata.orig1_extent();
    let required = orig1 + spacing;
    if total < required {
        return Err(Error::CombinedTooSmall { total, required });
    }
    let orig2 = total - orig1 - spacing;
    if metadata.direction().origin_first() {
        Ok(((0, orig1), (orig1 + spacing, orig1 + spacing + orig2)))
    } else {
        Ok(((total - orig1, total), (spacing, spacing + orig2)))
    }
}

fn slice_range(metadata: &StitchMetadata, total: usize, selection: Selection) -> Result<(usize, usize)> {
    let (first, second) = slice_ranges(metadata, total)?;
    Ok(match selection {
        Selection::First => first,
        Selection::Second => second,
    })
}

/// Recover one original piece from a stitched image.
///
/// Slices the combined tensor along the stitched axis only; all other axes
/// pass through unchanged. With the pad policy the recovered piece has its
/// exact post-alignment extents; with resize-to-match the second piece's
/// pre-resize content is not recoverable since resampling is lossy.
///
/// # Errors
///
/// Returns [`Error::CombinedTooSmall`] when the combined tensor is shorter
/// along the stitched axis than `shape1` plus the spacing implies.
pub fn unstitch_images(
    metadata: &StitchMetadata,
    image: &ImageTensor,
    selection: Selection,
) -> Result<ImageTensor> {
    let axis = metadata.direction().axis();
    let total = image.len_of(Axis(axis));
    let (start, end) = slice_range(metadata, total, selection)?;
    Ok(image
        .slice_axis(Axis(axis), Slice::from(start..end))
        .to_owned())
}

/// Recover one original piece and its mask from a stitched pair.
///
/// The mask is sliced with the identical range as the image.
///
/// # Errors
///
/// Everything [`unstitch_images`] returns, plus
/// [`Error::MaskShapeMismatch`] when the combined mask disagrees with the
/// combined image's batch/height/width.
pub fn unstitch_images_with_masks(
    metadata: &StitchMetadata,
    image: &ImageTensor,
    mask: &MaskTensor,
    selection: Selection,
) -> Result<(ImageTensor, MaskTensor)> {
    let (b, h, w, _) = image.dim();
    if mask.dim() != (b, h, w) {
        let (mb, mh, mw) = mask.dim();
        return Err(Error::MaskShapeMismatch {
            image: [b, h, w],
            mask: [mb, mh, mw],
        });
    }

    let axis = metadata.direction().axis();
    let total = image.len_of(Axis(axis));
    let (start, end) = slice_range(metadata, total, selection)?;
    let range = Slice::from(start..end);
    Ok((
        image.slice_axis(Axis(axis), range).to_owned(),
        mask.slice_axis(Axis(axis), range).to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stitch::{stitch_images, Direction, StitchOptions};

    fn filled(batch: usize, h: usize, w: usize, value: f32) -> ImageTensor {
        ImageTensor::from_elem((batch, h, w, 3), value)
    }

    #[test]
    fn selection_from_host_index() {
        assert_eq!(Selection::try_from(1).unwrap(), Selection::First);
        assert_eq!(Selection::try_from(2).unwrap(), Selection::Second);
        assert!(matches!(
            Selection::try_from(3),
            Err(Error::InvalidSelection(3))
        ));
        assert_eq!(Selection::Second.index(), 2);
    }

    #[test]
    fn right_stitch_slices_from_origin() {
        let image1 = filled(1, 4, 6, 0.1);
        let image2 = filled(1, 4, 10, 0.9);
        let options = StitchOptions {
            match_size: false,
            ..StitchOptions::default()
        };
        let (combined, metadata) = stitch_images(&image1, Some(&image2), &options).unwrap();

        let first = unstitch_images(&metadata, &combined, Selection::First).unwrap();
        assert_eq!(first.dim(), (1, 4, 6, 3));
        assert!(first.iter().all(|&v| (v - 0.1).abs() < f32::EPSILON));

        let second = unstitch_images(&metadata, &combined, Selection::Second).unwrap();
        assert_eq!(second.dim(), (1, 4, 10, 3));
        assert!(second.iter().all(|&v| (v - 0.9).abs() < f32::EPSILON));
    }

    #[test]
    fn up_stitch_slices_first_piece_from_the_end() {
        let image1 = filled(1, 6, 4, 0.1);
        let image2 = filled(1, 3, 4, 0.9);
        let options = StitchOptions {
            direction: Direction::Up,
            match_size: false,
            ..StitchOptions::default()
        };
        let (combined, metadata) = stitch_images(&image1, Some(&image2), &options).unwrap();
        assert_eq!(combined.dim(), (1, 9, 4, 3));

        let first = unstitch_images(&metadata, &combined, Selection::First).unwrap();
        assert_eq!(first.dim(), (1, 6, 4, 3));
        assert!(first.iter().all(|&v| (v - 0.1).abs() < f32::EPSILON));

        let second = unstitch_images(&metadata, &combined, Selection::Second).unwrap();
        assert_eq!(second.dim(), (1, 3, 4, 3));
        assert!(second.iter().all(|&v| (v - 0.9).abs() < f32::EPSILON));
    }

    #[test]
    fn rejects_combined_tensor_shorter_than_metadata_implies() {
        let image1 = filled(1, 4, 6, 0.0);
        let (_, metadata) =
            stitch_images(&image1, None, &StitchOptions::default()).unwrap();
        let truncated = filled(1, 4, 3, 0.0);
        let err = unstitch_images(&metadata, &truncated, Selection::First).unwrap_err();
        assert!(matches!(
            err,
            Error::CombinedTooSmall {
                total: 3,
                required: 6
            }
        ));
    }

    #[test]
    fn mask_must_match_combined_image() {
        let image1 = filled(1, 4, 6, 0.0);
        let (_, metadata) =
            stitch_images(&image1, None, &StitchOptions::default()).unwrap();
        let mask = MaskTensor::zeros((1, 4, 5));
        let err =
            unstitch_images_with_masks(&metadata, &image1, &mask, Selection::First).unwrap_err();
        assert!(matches!(err, Error::MaskShapeMismatch { .. }));
    }
}
