use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use ndarray::{concatenate, s, Array3, Array4, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use raster_stitch::{
    stitch_images, stitch_images_with_masks, unstitch_images, unstitch_images_with_masks,
    Direction, ImageTensor, MaskTensor, Selection, SpacingColor, StitchMetadata, StitchOptions,
};

#[derive(Parser)]
#[command(
    name = "raster-stitch",
    about = "Stitch two images (or frame batches) along an edge, invertibly",
    version,
    after_help = "A positional path that is a directory is decoded as an ordered frame\n\
                  batch; batched outputs are written as numbered frames."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stitch two images into one, writing recovery metadata
    Stitch {
        /// First image file or frame directory
        image1: PathBuf,

        /// Second image file or frame directory (omit to pass through)
        image2: Option<PathBuf>,

        /// Edge along which the second image is appended: right, down, left, up
        #[arg(short, long, default_value = "right")]
        direction: String,

        /// Zero-pad both pieces to a common extent instead of resizing the second
        #[arg(long)]
        pad: bool,

        /// Separator thickness in pixels (0 for none)
        #[arg(short, long, default_value_t = 0)]
        spacing: u32,

        /// Separator color: white, black, red, green, blue
        #[arg(short, long, default_value = "white")]
        color: String,

        /// Mask for the first image (switches to mask-aware stitching)
        #[arg(long)]
        mask1: Option<PathBuf>,

        /// Mask for the second image
        #[arg(long)]
        mask2: Option<PathBuf>,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Combined mask output path (mask-aware only)
        #[arg(long)]
        mask_output: Option<PathBuf>,

        /// Where to write the stitch metadata JSON
        #[arg(short, long)]
        metadata: PathBuf,
    },
    /// Recover one original piece from a stitched image
    Unstitch {
        /// Stitched image file or frame directory
        image: PathBuf,

        /// Stitch metadata JSON produced by the stitch subcommand
        #[arg(short, long)]
        metadata: PathBuf,

        /// Which piece to recover: 1 (first) or 2 (second)
        #[arg(short, long, default_value_t = 1)]
        select: u32,

        /// Stitched mask to slice alongside the image
        #[arg(long)]
        mask: Option<PathBuf>,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Recovered mask output path
        #[arg(long)]
        mask_output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        command @ Command::Stitch { .. } => run_stitch(command),
        command @ Command::Unstitch { .. } => run_unstitch(command),
    };
    if let Err(message) = result {
        eprintln!("[FAIL] {message}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run_stitch(command: Command) -> Result<(), String> {
    let Command::Stitch {
        image1,
        image2,
        direction,
        pad,
        spacing,
        color,
        mask1,
        mask2,
        output,
        mask_output,
        metadata,
    } = command
    else {
        unreachable!("dispatched from main");
    };

    let options = StitchOptions {
        direction: Direction::from_str(&direction).map_err(|e| e.to_string())?,
        match_size: !pad,
        spacing_width: spacing,
        spacing_color: SpacingColor::from_str(&color).map_err(|e| e.to_string())?,
    };

    let tensor1 = load_image_tensor(&image1)?;
    let tensor2 = image2.as_deref().map(load_image_tensor).transpose()?;

    let mask_aware = mask1.is_some() || mask2.is_some() || mask_output.is_some();
    let (combined, combined_mask, info) = if mask_aware {
        let mask1 = mask1.as_deref().map(load_mask_tensor).transpose()?;
        let mask2 = mask2.as_deref().map(load_mask_tensor).transpose()?;
        let (image, mask, info) = stitch_images_with_masks(
            &tensor1,
            mask1.as_ref(),
            tensor2.as_ref(),
            mask2.as_ref(),
            &options,
        )
        .map_err(|e| e.to_string())?;
        (image, Some(mask), info)
    } else {
        let (image, info) =
            stitch_images(&tensor1, tensor2.as_ref(), &options).map_err(|e| e.to_string())?;
        (image, None, info)
    };

    save_image_tensor(&combined, &output)?;
    if let (Some(mask), Some(path)) = (combined_mask.as_ref(), mask_output.as_ref()) {
        save_mask_tensor(mask, path)?;
    }
    write_metadata(&info, &metadata)?;

    let (b, h, w, c) = combined.dim();
    eprintln!("[OK] {} ({b}x{h}x{w}x{c})", output.display());
    Ok(())
}

fn run_unstitch(command: Command) -> Result<(), String> {
    let Command::Unstitch {
        image,
        metadata,
        select,
        mask,
        output,
        mask_output,
    } = command
    else {
        unreachable!("dispatched from main");
    };

    let info = read_metadata(&metadata)?;
    let selection = Selection::try_from(select).map_err(|e| e.to_string())?;
    let combined = load_image_tensor(&image)?;

    let (piece, piece_mask) = if let Some(mask_path) = mask {
        let combined_mask = load_mask_tensor(&mask_path)?;
        let (piece, piece_mask) =
            unstitch_images_with_masks(&info, &combined, &combined_mask, selection)
                .map_err(|e| e.to_string())?;
        (piece, Some(piece_mask))
    } else {
        let piece = unstitch_images(&info, &combined, selection).map_err(|e| e.to_string())?;
        (piece, None)
    };

    save_image_tensor(&piece, &output)?;
    if let (Some(piece_mask), Some(path)) = (piece_mask.as_ref(), mask_output.as_ref()) {
        save_mask_tensor(piece_mask, path)?;
    }

    let (b, h, w, c) = piece.dim();
    eprintln!(
        "[OK] piece {} -> {} ({b}x{h}x{w}x{c})",
        selection.index(),
        output.display()
    );
    Ok(())
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Ordered list of frame files when `path` is a directory.
fn frame_paths(path: &Path) -> Result<Vec<PathBuf>, String> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(|e| format!("failed to read directory {}: {e}", path.display()))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(format!("no supported frames in {}", path.display()));
    }
    Ok(files)
}

/// Load a file or frame directory as a batched image tensor.
///
/// Directory frames are decoded in parallel and stacked in filename order;
/// every frame must share the same dimensions and channel count.
fn load_image_tensor(path: &Path) -> Result<ImageTensor, String> {
    if !path.is_dir() {
        let img = image::open(path)
            .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
        return Ok(frame_to_tensor(&img));
    }

    let frames: Vec<ImageTensor> = frame_paths(path)?
        .par_iter()
        .map(|p| {
            image::open(p)
                .map(|img| frame_to_tensor(&img))
                .map_err(|e| format!("failed to load {}: {e}", p.display()))
        })
        .collect::<Result<_, _>>()?;
    let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
    concatenate(Axis(0), &views)
        .map_err(|_| format!("frames in {} differ in size or channels", path.display()))
}

/// Load a file or frame directory as a batched mask tensor (luma).
fn load_mask_tensor(path: &Path) -> Result<MaskTensor, String> {
    if !path.is_dir() {
        let img = image::open(path)
            .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
        return Ok(frame_to_mask(&img));
    }

    let frames: Vec<MaskTensor> = frame_paths(path)?
        .par_iter()
        .map(|p| {
            image::open(p)
                .map(|img| frame_to_mask(&img))
                .map_err(|e| format!("failed to load {}: {e}", p.display()))
        })
        .collect::<Result<_, _>>()?;
    let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
    concatenate(Axis(0), &views)
        .map_err(|_| format!("frames in {} differ in size", path.display()))
}

/// Decode one frame, keeping alpha when the source carries it.
fn frame_to_tensor(img: &DynamicImage) -> ImageTensor {
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        let data: Vec<f32> = rgba.into_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
        Array4::from_shape_vec((1, h as usize, w as usize, 4), data)
            .expect("decoded buffer matches its dimensions")
    } else {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        let data: Vec<f32> = rgb.into_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
        Array4::from_shape_vec((1, h as usize, w as usize, 3), data)
            .expect("decoded buffer matches its dimensions")
    }
}

fn frame_to_mask(img: &DynamicImage) -> MaskTensor {
    let luma = img.to_luma8();
    let (w, h) = luma.dimensions();
    let data: Vec<f32> = luma.into_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
    Array3::from_shape_vec((1, h as usize, w as usize), data)
        .expect("decoded buffer matches its dimensions")
}

/// Write a batched tensor: a single frame goes to `path` directly, larger
/// batches are written as `stem_0000.ext` numbered frames.
fn save_image_tensor(tensor: &ImageTensor, path: &Path) -> Result<(), String> {
    let batch = tensor.len_of(Axis(0));
    if batch == 1 {
        return save_frame(tensor.slice(s![0, .., .., ..]), path);
    }
    for b in 0..batch {
        save_frame(tensor.slice(s![b, .., .., ..]), &numbered_path(path, b))?;
    }
    Ok(())
}

fn save_mask_tensor(mask: &MaskTensor, path: &Path) -> Result<(), String> {
    let batch = mask.len_of(Axis(0));
    if batch == 1 {
        return save_mask_frame(mask.slice(s![0, .., ..]), path);
    }
    for b in 0..batch {
        save_mask_frame(mask.slice(s![b, .., ..]), &numbered_path(path, b))?;
    }
    Ok(())
}

fn numbered_path(path: &Path, index: usize) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let parent = path.parent().unwrap_or(Path::new("."));
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => parent.join(format!("{stem}_{index:04}.{ext}")),
        None => parent.join(format!("{stem}_{index:04}")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_bytes<'a>(values: impl Iterator<Item = &'a f32>) -> Vec<u8> {
    values
        .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn save_frame(frame: ArrayView3<'_, f32>, path: &Path) -> Result<(), String> {
    let (h, w, channels) = frame.dim();
    let bytes = to_bytes(frame.iter());
    let (w, h) = (w as u32, h as u32);
    let saved = match channels {
        1 => GrayImage::from_raw(w, h, bytes)
            .ok_or_else(|| "frame buffer size mismatch".to_string())?
            .save(path),
        3 => RgbImage::from_raw(w, h, bytes)
            .ok_or_else(|| "frame buffer size mismatch".to_string())?
            .save(path),
        4 => RgbaImage::from_raw(w, h, bytes)
            .ok_or_else(|| "frame buffer size mismatch".to_string())?
            .save(path),
        other => return Err(format!("cannot encode {other}-channel frame")),
    };
    saved.map_err(|e| format!("failed to save {}: {e}", path.display()))
}

#[allow(clippy::cast_possible_truncation)]
fn save_mask_frame(frame: ArrayView2<'_, f32>, path: &Path) -> Result<(), String> {
    let (h, w) = frame.dim();
    let bytes = to_bytes(frame.iter());
    GrayImage::from_raw(w as u32, h as u32, bytes)
        .ok_or_else(|| "mask buffer size mismatch".to_string())?
        .save(path)
        .map_err(|e| format!("failed to save {}: {e}", path.display()))
}

fn write_metadata(metadata: &StitchMetadata, path: &Path) -> Result<(), String> {
    let file = File::create(path)
        .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
    serde_json::to_writer_pretty(file, metadata)
        .map_err(|e| format!("failed to write metadata: {e}"))
}

fn read_metadata(path: &Path) -> Result<StitchMetadata, String> {
    let file =
        File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    serde_json::from_reader(file).map_err(|e| format!("failed to parse metadata: {e}"))
}
