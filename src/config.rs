use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_BUDGET;
use crate::error::ConfigError;
use crate::files::TransferMode;
use crate::prefetch::DEFAULT_PREFETCH_WORKERS;

pub const DEFAULT_LOOK_AHEAD: usize = 2;
pub const DEFAULT_LOOK_BEHIND: usize = 1;
pub const DEFAULT_SLIDESHOW_DELAY_MS: u64 = 3000;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 200;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 4.0;
pub const ZOOM_STEP: f32 = 1.1;

/// Static settings for one viewing session.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub folder: PathBuf,
    pub recursive: bool,
    pub cache_budget: u64,
    pub prefetch_workers: usize,
    pub look_ahead: usize,
    pub look_behind: usize,
    pub slideshow_delay: Duration,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
    pub thumbnail_size: u32,
    pub transfer_mode: TransferMode,
    /// Fixes the art-effect sequence when set.
    pub effect_seed: Option<u64>,
    /// Where contact sheets go; the viewed folder when unset.
    pub sheet_dir: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            recursive: false,
            cache_budget: DEFAULT_CACHE_BUDGET,
            prefetch_workers: DEFAULT_PREFETCH_WORKERS,
            look_ahead: DEFAULT_LOOK_AHEAD,
            look_behind: DEFAULT_LOOK_BEHIND,
            slideshow_delay: Duration::from_millis(DEFAULT_SLIDESHOW_DELAY_MS),
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            zoom_step: ZOOM_STEP,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            transfer_mode: TransferMode::Move,
            effect_seed: None,
            sheet_dir: None,
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.prefetch_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= 1.0 && self.max_zoom >= 1.0) {
            return Err(ConfigError::ZoomBounds {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        Ok(())
    }

    pub fn sheet_dir(&self) -> &Path {
        self.sheet_dir.as_deref().unwrap_or(&self.folder)
    }
}
