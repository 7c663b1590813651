use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ViewerConfig;
use crate::effects::EffectPicker;
use crate::error::{DecodeError, FileOpError, ScanError};
use crate::loader::{decode_image, DecodedImage, ImageSource, Transform, Variant};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tga", "tiff", "tif", "webp", "ico", "pnm", "pbm",
    "pgm", "ppm", "pam", "dds", "hdr", "exr", "ff", "qoi",
];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Header-only check that the file is an image we can read.
fn validate_image(path: &Path) -> bool {
    image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|r| r.into_dimensions())
        .is_ok()
}

// ---------------------------------------------------------------------------
// Folder scanning
// ---------------------------------------------------------------------------

/// Sorted, validated image files under `dir`.
pub fn scan_folder(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.exists() {
        return Err(ScanError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let start_time = Instant::now();
    let mut candidates = Vec::new();
    collect_candidates(dir, recursive, &mut candidates)?;
    candidates.sort();

    let found = candidates.len();
    let images: Vec<PathBuf> = candidates
        .into_par_iter()
        .filter(|p| validate_image(p))
        .collect();

    log::info!(
        "Scanned {:?} in {:.2}s: {} images ({} unreadable skipped)",
        dir,
        start_time.elapsed().as_secs_f64(),
        images.len(),
        found - images.len()
    );
    Ok(images)
}

fn collect_candidates(dir: &Path, recursive: bool, dest: &mut Vec<PathBuf>) -> Result<(), ScanError> {
    let entries = fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut subdirs = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(ft) = entry.file_type() else {
            continue;
        };
        let p = entry.path();
        if p.is_file() && is_image_file(&p) {
            dest.push(p);
        } else if recursive && p.is_dir() {
            // linked folders can point back at an ancestor
            if ft.is_symlink() {
                log::debug!("Not following linked folder {}", p.display());
                continue;
            }
            subdirs.push(p);
        }
    }

    subdirs.sort();
    for sub in subdirs {
        // unreadable subfolders are skipped, only the root must be readable
        if let Err(e) = collect_candidates(&sub, true, dest) {
            log::warn!("{}", e);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Image source over a folder
// ---------------------------------------------------------------------------

pub struct FolderSource {
    images: Vec<PathBuf>,
    thumbnail_size: u32,
    picker: Mutex<EffectPicker>,
}

impl FolderSource {
    pub fn open(config: &ViewerConfig) -> Result<Self, ScanError> {
        let images = scan_folder(&config.folder, config.recursive)?;
        let picker = match config.effect_seed {
            Some(seed) => EffectPicker::seeded(seed),
            None => EffectPicker::from_time(),
        };
        Ok(Self::with_images(images, config.thumbnail_size, picker))
    }

    pub fn with_images(images: Vec<PathBuf>, thumbnail_size: u32, picker: EffectPicker) -> Self {
        Self {
            images,
            thumbnail_size,
            picker: Mutex::new(picker),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageSource for FolderSource {
    fn list(&self) -> Vec<PathBuf> {
        self.images.clone()
    }

    fn decode(&self, id: &Path, variant: Variant) -> Result<DecodedImage, DecodeError> {
        let transform = match variant {
            Variant::Full => Transform::None,
            Variant::Thumb => Transform::Thumbnail(self.thumbnail_size),
            Variant::Art(_) => Transform::Effect(self.picker.lock().pick()),
        };
        decode_image(id, transform)
    }
}

// ---------------------------------------------------------------------------
// File operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Move,
    Copy,
}

impl TransferMode {
    pub fn toggled(self) -> Self {
        match self {
            TransferMode::Move => TransferMode::Copy,
            TransferMode::Copy => TransferMode::Move,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransferMode::Move => "MOVE",
            TransferMode::Copy => "COPY",
        }
    }
}

pub trait FileOps {
    fn move_or_copy(&self, src: &Path, dst: &Path, mode: TransferMode) -> Result<(), FileOpError>;

    fn delete(&self, path: &Path) -> Result<(), FileOpError>;
}

/// Plain filesystem implementation.
pub struct FsFileOps;

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> FileOpError + 'a {
    move |source| FileOpError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

impl FileOps for FsFileOps {
    fn move_or_copy(&self, src: &Path, dst: &Path, mode: TransferMode) -> Result<(), FileOpError> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(io_err("create directory", parent))?;
        }
        match mode {
            TransferMode::Copy => {
                fs::copy(src, dst).map_err(io_err("copy", src))?;
            }
            TransferMode::Move => {
                if let Err(e) = fs::rename(src, dst) {
                    // rename cannot cross filesystems
                    log::debug!("rename {} failed ({}), copying instead", src.display(), e);
                    fs::copy(src, dst).map_err(io_err("move", src))?;
                    fs::remove_file(src).map_err(io_err("move", src))?;
                }
            }
        }
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), FileOpError> {
        fs::remove_file(path).map_err(io_err("delete", path))
    }
}
