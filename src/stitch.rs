//! Stitching pipelines and the metadata that makes them invertible.
//!
//! Two parallel pipelines share the same skeleton: record the input shapes,
//! align batches, apply the size policy, align channels, insert an optional
//! separator, and concatenate along the stitched axis. [`stitch_images`]
//! handles bare images; [`stitch_images_with_masks`] carries a per-pixel mask
//! through every step using nearest-neighbor resampling so mask edges stay
//! hard. Both return a [`StitchMetadata`] record that
//! [`crate::unstitch_images`] consumes to recover either original piece.

use std::fmt;
use std::str::FromStr;

use ndarray::{concatenate, Axis};

use crate::align;
use crate::error::{Error, Result};
use crate::tensor::{self, ImageTensor, MaskTensor, HEIGHT_AXIS, WIDTH_AXIS};

/// Largest accepted separator thickness, matching the host-facing range.
pub const MAX_SPACING_WIDTH: u32 = 1024;

/// The edge along which the second piece is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Append the second piece to the right of the first.
    Right,
    /// Append the second piece below the first.
    Down,
    /// Prepend the second piece to the left of the first.
    Left,
    /// Prepend the second piece above the first.
    Up,
}

impl Direction {
    /// Whether the stitched axis is the width axis.
    #[must_use]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }

    /// Tensor axis index along which pieces are concatenated.
    #[must_use]
    pub fn axis(self) -> usize {
        if self.is_horizontal() {
            WIDTH_AXIS
        } else {
            HEIGHT_AXIS
        }
    }

    /// Whether the first piece keeps the leading position in the output.
    pub(crate) fn origin_first(self) -> bool {
        matches!(self, Self::Right | Self::Down)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Down => "down",
            Self::Left => "left",
            Self::Up => "up",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "right" => Ok(Self::Right),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "up" => Ok(Self::Up),
            other => Err(Error::UnknownDirection(other.to_string())),
        }
    }
}

/// Solid fill color of the separator block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SpacingColor {
    /// All color channels `1.0`.
    White,
    /// All color channels `0.0`.
    Black,
    /// Channel 0 at `1.0`, other color channels `0.0`.
    Red,
    /// Channel 1 at `1.0`, other color channels `0.0`.
    Green,
    /// Channel 2 at `1.0`, other color channels `0.0`.
    Blue,
}

impl SpacingColor {
    /// Fill value for one color channel. The alpha channel is handled by the
    /// block constructor, which keeps it opaque for every color.
    pub(crate) fn channel_value(self, channel: usize) -> f32 {
        let lit = match self {
            Self::White => return 1.0,
            Self::Black => return 0.0,
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        };
        if channel == lit {
            1.0
        } else {
            0.0
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }
}

impl fmt::Display for SpacingColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpacingColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            "red" => Ok(Self::Red),
            "green" => Ok(Self::Green),
            "blue" => Ok(Self::Blue),
            other => Err(Error::UnknownColor(other.to_string())),
        }
    }
}

/// Options controlling a stitch call.
#[derive(Debug, Clone)]
pub struct StitchOptions {
    /// Edge along which the second piece is appended.
    pub direction: Direction,
    /// Resize the second piece to match (`true`) or zero-pad both (`false`).
    pub match_size: bool,
    /// Separator thickness in pixels along the stitched axis; `0` for none.
    pub spacing_width: u32,
    /// Separator fill color.
    pub spacing_color: SpacingColor,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Right,
            match_size: true,
            spacing_width: 0,
            spacing_color: SpacingColor::White,
        }
    }
}

/// Immutable record of one stitch call, consumed by exactly one unstitch.
///
/// `shape1` is always the untouched shape of the first input as received; it
/// is the ground truth the unstitch side uses to recover exact extents,
/// independent of any resizing applied to the second piece. Treat the record
/// as read-only while it is threaded through the surrounding graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StitchMetadata {
    direction: Direction,
    match_size: bool,
    spacing_width: u32,
    spacing_color: SpacingColor,
    shape1: [usize; 4],
    shape2: Option<[usize; 4]>,
}

impl StitchMetadata {
    fn new(options: &StitchOptions, shape1: [usize; 4], shape2: Option<[usize; 4]>) -> Self {
        Self {
            direction: options.direction,
            match_size: options.match_size,
            spacing_width: options.spacing_width,
            spacing_color: options.spacing_color,
            shape1,
            shape2,
        }
    }

    /// Edge along which the second piece was appended.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether resize-to-match was used instead of pad-to-match.
    #[must_use]
    pub fn match_size(&self) -> bool {
        self.match_size
    }

    /// Requested separator thickness in pixels.
    #[must_use]
    pub fn spacing_width(&self) -> u32 {
        self.spacing_width
    }

    /// Separator fill color.
    #[must_use]
    pub fn spacing_color(&self) -> SpacingColor {
        self.spacing_color
    }

    /// Shape of the first input before any alignment, (batch, height, width,
    /// channel).
    #[must_use]
    pub fn shape1(&self) -> [usize; 4] {
        self.shape1
    }

    /// Shape of the second input before any alignment, absent when no second
    /// piece was supplied.
    #[must_use]
    pub fn shape2(&self) -> Option<[usize; 4]> {
        self.shape2
    }

    /// First piece's original extent along the stitched axis.
    pub(crate) fn orig1_extent(&self) -> usize {
        if self.direction.is_horizontal() {
            self.shape1[WIDTH_AXIS]
        } else {
            self.shape1[HEIGHT_AXIS]
        }
    }
}

fn shape4(image: &ImageTensor) -> [usize; 4] {
    let (b, h, w, c) = image.dim();
    [b, h, w, c]
}

fn validate_options(options: &StitchOptions) -> Result<()> {
    if options.spacing_width > MAX_SPACING_WIDTH {
        return Err(Error::SpacingTooWide {
            spacing: options.spacing_width,
            max: MAX_SPACING_WIDTH,
        });
    }
    Ok(())
}

fn validate_image(image: &ImageTensor) -> Result<()> {
    let (batch, _, _, channels) = image.dim();
    if batch == 0 {
        return Err(Error::EmptyBatch);
    }
    if !matches!(channels, 1 | 3 | 4) {
        return Err(Error::InvalidChannelCount(channels));
    }
    Ok(())
}

fn validate_mask(image: &ImageTensor, mask: &MaskTensor) -> Result<()> {
    let (b, h, w, _) = image.dim();
    let (mb, mh, mw) = mask.dim();
    if (b, h, w) != (mb, mh, mw) {
        return Err(Error::MaskShapeMismatch {
            image: [b, h, w],
            mask: [mb, mh, mw],
        });
    }
    Ok(())
}

/// Perpendicular extent of the separator: max over the two aligned pieces.
fn perpendicular_extent(a: &ImageTensor, b: &ImageTensor, direction: Direction) -> usize {
    let axis = if direction.is_horizontal() {
        HEIGHT_AXIS
    } else {
        WIDTH_AXIS
    };
    a.len_of(Axis(axis)).max(b.len_of(Axis(axis)))
}

fn concat_images(pieces: &[ImageTensor], axis: usize) -> ImageTensor {
    let views: Vec<_> = pieces.iter().map(ImageTensor::view).collect();
    concatenate(Axis(axis), &views).expect("aligned pieces share non-stitched extents")
}

fn concat_masks(pieces: &[MaskTensor], axis: usize) -> MaskTensor {
    let views: Vec<_> = pieces.iter().map(MaskTensor::view).collect();
    concatenate(Axis(axis), &views).expect("aligned pieces share non-stitched extents")
}

/// Stitch two batched images along `options.direction`.
///
/// With no second image the first is passed through unchanged and the
/// metadata records an absent `shape2`. Otherwise batches are aligned by
/// repeating the last frame, the size policy resizes or pads the pieces to a
/// common perpendicular extent, channel counts are equalized with opaque
/// fill, and the pieces (plus an optional separator) are concatenated.
///
/// The separator thickness is rounded up to an even pixel count here, while
/// the metadata records the requested width and
/// [`stitch_images_with_masks`] inserts the width as-is; unstitching an
/// odd-width separator stitched by this function therefore recovers the
/// second piece one pixel long, with a leftover separator column attached.
///
/// # Errors
///
/// [`Error::SpacingTooWide`] above [`MAX_SPACING_WIDTH`];
/// [`Error::EmptyBatch`] or [`Error::InvalidChannelCount`] for malformed
/// inputs; [`Error::ZeroExtent`] when resize-to-match meets a second piece
/// with a zero extent.
pub fn stitch_images(
    image1: &ImageTensor,
    image2: Option<&ImageTensor>,
    options: &StitchOptions,
) -> Result<(ImageTensor, StitchMetadata)> {
    validate_options(options)?;
    validate_image(image1)?;
    let metadata = StitchMetadata::new(options, shape4(image1), image2.map(shape4));

    let Some(image2) = image2 else {
        return Ok((image1.clone(), metadata));
    };
    validate_image(image2)?;

    let (mut img1, mut img2) = align::align_batch(image1, image2);
    if options.match_size {
        img2 = align::resize_to_match(&img2, &img1, options.direction)?;
    } else {
        (img1, img2) = align::pad_to_match(&img1, &img2, options.direction);
    }
    let (img1, img2) = align::align_channels(&img1, &img2);

    let mut pieces = if options.direction.origin_first() {
        vec![img1, img2]
    } else {
        vec![img2, img1]
    };
    if options.spacing_width > 0 {
        // Rounded up to even; the mask-aware variant uses the raw width.
        let thickness = (options.spacing_width + options.spacing_width % 2) as usize;
        let block = align::spacing_block(
            pieces[0].len_of(Axis(0)),
            perpendicular_extent(&pieces[0], &pieces[1], options.direction),
            thickness,
            pieces[0].len_of(Axis(3)),
            options.spacing_color,
            options.direction,
        );
        pieces.insert(1, block);
    }

    Ok((concat_images(&pieces, options.direction.axis()), metadata))
}

/// Stitch two batched images together with their per-pixel masks.
///
/// Missing masks default to all-zero tensors matching their image. Masks
/// follow every alignment step their image takes: batch alignment is applied
/// identically, resize-to-match resamples each mask to its own image's
/// resulting extent with nearest-neighbor, and pad-to-match pads them with
/// the same split. The separator's mask counterpart is zero-filled, and the
/// separator thickness is inserted exactly as requested (no even rounding,
/// unlike [`stitch_images`]).
///
/// # Errors
///
/// Everything [`stitch_images`] returns, plus [`Error::MaskShapeMismatch`]
/// when a supplied mask disagrees with its image's batch/height/width.
pub fn stitch_images_with_masks(
    image1: &ImageTensor,
    mask1: Option<&MaskTensor>,
    image2: Option<&ImageTensor>,
    mask2: Option<&MaskTensor>,
    options: &StitchOptions,
) -> Result<(ImageTensor, MaskTensor, StitchMetadata)> {
    validate_options(options)?;
    validate_image(image1)?;
    let metadata = StitchMetadata::new(options, shape4(image1), image2.map(shape4));

    let (b1, h1, w1, _) = image1.dim();
    let mask1 = match mask1 {
        Some(m) => {
            validate_mask(image1, m)?;
            m.clone()
        }
        None => MaskTensor::zeros((b1, h1, w1)),
    };

    let Some(image2) = image2 else {
        return Ok((image1.clone(), mask1, metadata));
    };
    validate_image(image2)?;
    let (b2, h2, w2, _) = image2.dim();
    let mask2 = match mask2 {
        Some(m) => {
            validate_mask(image2, m)?;
            m.clone()
        }
        None => MaskTensor::zeros((b2, h2, w2)),
    };

    let (mut img1, mut img2) = align::align_batch(image1, image2);
    let (mut m1, mut m2) = align::align_batch(&mask1, &mask2);

    if options.match_size {
        img2 = align::resize_to_match(&img2, &img1, options.direction)?;
        let (_, th1, tw1, _) = img1.dim();
        let (_, th2, tw2, _) = img2.dim();
        m1 = tensor::resize_mask(&m1, tw1, th1);
        m2 = tensor::resize_mask(&m2, tw2, th2);
    } else {
        (img1, img2) = align::pad_to_match(&img1, &img2, options.direction);
        let (_, th1, tw1, _) = img1.dim();
        let (_, th2, tw2, _) = img2.dim();
        m1 = align::pad_mask_to_match(&m1, th1, tw1);
        m2 = align::pad_mask_to_match(&m2, th2, tw2);
    }
    let (img1, img2) = align::align_channels(&img1, &img2);

    let origin_first = options.direction.origin_first();
    let mut image_pieces = if origin_first {
        vec![img1, img2]
    } else {
        vec![img2, img1]
    };
    let mut mask_pieces = if origin_first {
        vec![m1, m2]
    } else {
        vec![m2, m1]
    };
    if options.spacing_width > 0 {
        let thickness = options.spacing_width as usize;
        let batch = image_pieces[0].len_of(Axis(0));
        let perpendicular =
            perpendicular_extent(&image_pieces[0], &image_pieces[1], options.direction);
        let block = align::spacing_block(
            batch,
            perpendicular,
            thickness,
            image_pieces[0].len_of(Axis(3)),
            options.spacing_color,
            options.direction,
        );
        image_pieces.insert(1, block);
        mask_pieces.insert(
            1,
            align::spacing_mask(batch, perpendicular, thickness, options.direction),
        );
    }

    let axis = options.direction.axis();
    Ok((
        concat_images(&image_pieces, axis),
        concat_masks(&mask_pieces, axis),
        metadata,
    ))
}
