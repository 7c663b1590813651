use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    ViewerConfig, DEFAULT_LOOK_AHEAD, DEFAULT_LOOK_BEHIND, DEFAULT_SLIDESHOW_DELAY_MS,
    DEFAULT_THUMBNAIL_SIZE,
};
use crate::error::ConfigError;
use crate::files::TransferMode;
use crate::prefetch::DEFAULT_PREFETCH_WORKERS;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Left / Right  : Previous / next image
  + / - / Wheel : Zoom in / out
  Drag          : Pan
  r             : Reset zoom and pan
  a             : Toggle art mode
  m             : Toggle mosaic view
  Space         : Toggle slideshow
  1-9           : Move / copy image to numbered subfolder
  CapsLock      : Switch between move and copy
  Delete        : Delete image
  c             : Save contact sheet
  h             : Show this help
  q / Esc       : Quit
";

#[derive(Parser)]
#[command(name = "fotoview", about = "Browse a folder of images", after_help = HELP_KEYS)]
pub struct Cli {
    /// Folder to view (defaults to the current directory)
    pub folder: Option<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Memory budget for the image cache (e.g. 512MB, 2GB). Default: 500MB.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Background decode threads
    #[arg(short, long, default_value_t = DEFAULT_PREFETCH_WORKERS)]
    pub workers: usize,

    /// Images to prefetch after the current one
    #[arg(long, default_value_t = DEFAULT_LOOK_AHEAD)]
    pub ahead: usize,

    /// Images to prefetch before the current one
    #[arg(long, default_value_t = DEFAULT_LOOK_BEHIND)]
    pub behind: usize,

    /// Slideshow delay in milliseconds
    #[arg(long, default_value_t = DEFAULT_SLIDESHOW_DELAY_MS)]
    pub slideshow_delay: u64,

    /// Mosaic thumbnail edge in pixels
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE)]
    pub thumbnail_size: u32,

    /// Start with 1-9 copying instead of moving
    #[arg(long)]
    pub copy: bool,

    /// Seed for art-mode effects (random when unset)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output folder for contact sheets (defaults to the viewed folder)
    #[arg(long, value_name = "DIR")]
    pub sheet_dir: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> Result<ViewerConfig, ConfigError> {
        let defaults = ViewerConfig::default();
        let cache_budget = match &self.memory {
            Some(s) => parse_memory_budget(s)?,
            None => defaults.cache_budget,
        };
        let config = ViewerConfig {
            folder: self.folder.unwrap_or(defaults.folder),
            recursive: self.recursive,
            cache_budget,
            prefetch_workers: self.workers,
            look_ahead: self.ahead,
            look_behind: self.behind,
            slideshow_delay: Duration::from_millis(self.slideshow_delay),
            thumbnail_size: self.thumbnail_size,
            transfer_mode: if self.copy { TransferMode::Copy } else { TransferMode::Move },
            effect_seed: self.seed,
            sheet_dir: self.sheet_dir,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

/// "2GB", "512MB", "64KB" or a bare number of megabytes.
pub fn parse_memory_budget(s: &str) -> Result<u64, ConfigError> {
    let upper = s.trim().to_uppercase();
    let (num, unit) = if let Some(num) = upper.strip_suffix("GB") {
        (num, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(num) = upper.strip_suffix("MB") {
        (num, 1024.0 * 1024.0)
    } else if let Some(num) = upper.strip_suffix("KB") {
        (num, 1024.0)
    } else {
        (upper.as_str(), 1024.0 * 1024.0)
    };
    match num.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok((n * unit) as u64),
        _ => Err(ConfigError::MemorySize(s.to_string())),
    }
}

/// Warn when the cache may grow past physical memory.
pub fn check_budget_against_ram(budget: u64) {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total > 0 && budget > total {
        log::warn!(
            "Cache budget of {} MB exceeds physical memory ({} MB)",
            budget / (1024 * 1024),
            total / (1024 * 1024)
        );
    }
}
