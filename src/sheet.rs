//! Contact sheet export: every image as a thumbnail on one JPEG.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::SheetError;
use crate::loader::make_thumbnail;

pub const SHEET_CELL: u32 = 200;
const SHEET_QUALITY: u8 = 95;

/// Smallest square grid that holds `n` cells.
pub fn grid_side(n: usize) -> u32 {
    (n as f64).sqrt().ceil() as u32
}

pub fn sheet_file_name() -> String {
    format!("contact_sheet_{}.jpg", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Compose the sheet in memory. Images that fail to load leave a black cell.
pub fn build_contact_sheet(images: &[PathBuf], cell: u32) -> Result<RgbImage, SheetError> {
    if images.is_empty() {
        return Err(SheetError::NoImages);
    }
    let side = grid_side(images.len());
    let mut sheet = RgbImage::new(side * cell, side * cell);

    let thumbs: Vec<Option<RgbImage>> = images
        .par_iter()
        .map(|path| match image::open(path) {
            Ok(img) => Some(make_thumbnail(img, cell).to_rgb8()),
            Err(e) => {
                log::warn!("Skipping {} on contact sheet: {}", path.display(), e);
                None
            }
        })
        .collect();

    for (i, thumb) in thumbs.iter().enumerate() {
        let Some(thumb) = thumb else { continue };
        let (w, h) = thumb.dimensions();
        let col = i as u32 % side;
        let row = i as u32 / side;
        let x = col * cell + (cell - w) / 2;
        let y = row * cell + (cell - h) / 2;
        image::imageops::replace(&mut sheet, thumb, x as i64, y as i64);
    }
    Ok(sheet)
}

/// Write a timestamped sheet into `out_dir` and return its path.
pub fn save_contact_sheet(images: &[PathBuf], out_dir: &Path, cell: u32) -> Result<PathBuf, SheetError> {
    let sheet = build_contact_sheet(images, cell)?;
    let path = out_dir.join(sheet_file_name());

    let file = File::create(&path).map_err(|source| SheetError::Io {
        path: path.clone(),
        source,
    })?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), SHEET_QUALITY);
    encoder.encode_image(&sheet)?;

    log::info!(
        "Contact sheet with {} images saved as {}",
        images.len(),
        path.display()
    );
    Ok(path)
}
