//! Error types for the raster-stitch crate.

/// Errors that can occur while stitching or unstitching tensors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A direction string did not name one of `right`, `down`, `left`, `up`.
    #[error("unknown stitch direction: {0:?}")]
    UnknownDirection(String),

    /// A spacing color string did not name a supported color.
    #[error("unknown spacing color: {0:?}")]
    UnknownColor(String),

    /// An unstitch selection index outside {1, 2}.
    #[error("invalid selection {0} (expected 1 or 2)")]
    InvalidSelection(u32),

    /// Spacing width above the host-enforced range.
    #[error("spacing width {spacing} exceeds maximum {max}")]
    SpacingTooWide {
        /// Requested spacing width in pixels.
        spacing: u32,
        /// Largest accepted spacing width.
        max: u32,
    },

    /// Proportional resize would divide by a zero extent of the second piece.
    #[error("cannot resize-to-match a {height}x{width} piece with a zero extent")]
    ZeroExtent {
        /// Height of the offending piece.
        height: usize,
        /// Width of the offending piece.
        width: usize,
    },

    /// An image tensor whose channel count is not 1, 3, or 4.
    #[error("unsupported channel count {0} (expected 1, 3, or 4)")]
    InvalidChannelCount(usize),

    /// An input tensor with an empty batch axis.
    #[error("input tensor has an empty batch axis")]
    EmptyBatch,

    /// A mask whose shape disagrees with its paired image.
    #[error("mask shape {mask:?} does not match image shape {image:?}")]
    MaskShapeMismatch {
        /// (batch, height, width) of the image.
        image: [usize; 3],
        /// (batch, height, width) of the mask.
        mask: [usize; 3],
    },

    /// A combined tensor too short along the stitched axis for its metadata.
    #[error(
        "combined tensor extent {total} is smaller than the {required} pixels \
         implied by the stitch metadata"
    )]
    CombinedTooSmall {
        /// Extent of the combined tensor along the stitched axis.
        total: usize,
        /// Minimum extent the metadata requires (`orig1 + spacing`).
        required: usize,
    },
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
