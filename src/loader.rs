use image::{DynamicImage, GenericImageView};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::effects::ArtEffect;
use crate::error::DecodeError;

/// Decoded pixels are always RGBA8.
pub const BYTES_PER_PIXEL: u64 = 4;

// ---------------------------------------------------------------------------
// Decoded image data (CPU side, ready to blit)
// ---------------------------------------------------------------------------

/// Immutable RGBA8 pixel buffer. Shared read-only through `Arc` once cached.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn new(rgba_bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba_bytes,
            width,
            height,
        }
    }

    /// Solid-colour image, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut bytes = Vec::with_capacity(pixels * BYTES_PER_PIXEL as usize);
        for _ in 0..pixels {
            bytes.extend_from_slice(&rgba);
        }
        Self::new(bytes, width, height)
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.to_rgba8().into_raw(), width, height)
    }

    /// Memory cost charged against the cache budget.
    pub fn footprint(&self) -> u64 {
        self.width as u64 * self.height as u64 * BYTES_PER_PIXEL
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("footprint", &self.footprint())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

/// Rendering transform of a source image. Each variant is cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Full,
    Thumb,
    /// Art effect; the generation changes every time art mode is entered.
    Art(u64),
}

impl Variant {
    pub fn is_art(&self) -> bool {
        matches!(self, Variant::Art(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub id: Arc<Path>,
    pub variant: Variant,
}

impl CacheKey {
    pub fn new(id: impl Into<Arc<Path>>, variant: Variant) -> Self {
        Self {
            id: id.into(),
            variant,
        }
    }

    pub fn full(id: &Path) -> Self {
        Self::new(id, Variant::Full)
    }

    pub fn thumb(id: &Path) -> Self {
        Self::new(id, Variant::Thumb)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Variant::Full => write!(f, "{}", self.id.display()),
            Variant::Thumb => write!(f, "{} [thumb]", self.id.display()),
            Variant::Art(generation) => write!(f, "{} [art #{}]", self.id.display(), generation),
        }
    }
}

// ---------------------------------------------------------------------------
// Image source boundary
// ---------------------------------------------------------------------------

/// Where image identifiers come from and how they become pixels.
///
/// The viewer core never opens files itself; everything goes through this.
pub trait ImageSource: Send + Sync + 'static {
    /// Identifiers in display order.
    fn list(&self) -> Vec<PathBuf>;

    fn decode(&self, id: &Path, variant: Variant) -> Result<DecodedImage, DecodeError>;
}

// ---------------------------------------------------------------------------
// Decoding from disk
// ---------------------------------------------------------------------------

/// What to do to a freshly decoded image before it is cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    None,
    Thumbnail(u32),
    Effect(ArtEffect),
}

pub fn decode_image(path: &Path, transform: Transform) -> Result<DecodedImage, DecodeError> {
    let img = image::open(path).map_err(|source| DecodeError::Image {
        path: path.to_path_buf(),
        source,
    })?;

    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(DecodeError::Empty {
            path: path.to_path_buf(),
        });
    }

    let final_img = match transform {
        Transform::None => img,
        Transform::Thumbnail(edge) => make_thumbnail(img, edge),
        Transform::Effect(effect) => crate::effects::apply_effect(img, effect),
    };

    Ok(DecodedImage::from_dynamic(final_img))
}

/// Fit inside an `edge`×`edge` square, keeping aspect ratio, never upscaling.
pub fn make_thumbnail(img: DynamicImage, edge: u32) -> DynamicImage {
    let edge = edge.max(1);
    let (w, h) = img.dimensions();
    if w <= edge && h <= edge {
        img
    } else {
        img.thumbnail(edge, edge)
    }
}
