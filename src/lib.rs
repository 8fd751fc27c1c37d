//! Invertible stitching and unstitching of batched image and mask tensors.
//!
//! Stitching combines two batched images (and optionally their per-pixel
//! masks) along a chosen edge, optionally inserting a solid-color separator,
//! while recording exactly enough metadata to invert the operation.
//! Unstitching consumes that metadata plus the combined tensor(s) and
//! recovers either original piece.
//!
//! Tensors are [`ndarray`] arrays with fixed axis order
//! (batch, height, width, channel) for images and (batch, height, width) for
//! masks, with `f32` elements conventionally in `[0, 1]`.
//!
//! # Quick Start
//!
//! ```
//! use raster_stitch::{stitch_images, unstitch_images, ImageTensor, Selection, StitchOptions};
//!
//! let a = ImageTensor::zeros((1, 64, 64, 3));
//! let b = ImageTensor::from_elem((1, 32, 64, 3), 1.0);
//!
//! let (combined, metadata) = stitch_images(&a, Some(&b), &StitchOptions::default()).unwrap();
//! let recovered = unstitch_images(&metadata, &combined, Selection::First).unwrap();
//! assert_eq!(recovered, a);
//! ```
//!
//! # Round trips
//!
//! With the pad policy (`match_size: false`) unstitching reproduces both
//! pieces' post-alignment extents exactly. Resize-to-match is lossy for the
//! second piece, by design. All operations are synchronous pure functions;
//! independent calls may be parallelized freely by the host.

#![deny(missing_docs)]

mod align;
pub mod error;
mod stitch;
pub mod tensor;
mod unstitch;

pub use error::{Error, Result};
pub use stitch::{
    stitch_images, stitch_images_with_masks, Direction, SpacingColor, StitchMetadata,
    StitchOptions, MAX_SPACING_WIDTH,
};
pub use tensor::{ImageTensor, MaskTensor};
pub use unstitch::{unstitch_images, unstitch_images_with_masks, Selection};
