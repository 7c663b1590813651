use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::ViewerConfig;
use crate::loader::{CacheKey, Variant};

// ---------------------------------------------------------------------------
// Input events
// ---------------------------------------------------------------------------

/// Discrete user intents, already decoupled from keys and mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Navigate(isize),
    /// Multiplicative zoom factor.
    Zoom(f32),
    Pan(i32, i32),
    ResetView,
    ToggleArt,
    ToggleMosaic,
    ToggleSlideshow,
    ToggleTransferMode,
    Delete,
    MoveToSlot(u8),
    ContactSheet,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Single,
    Mosaic,
}

// ---------------------------------------------------------------------------
// Viewport state
// ---------------------------------------------------------------------------

/// Which image is shown and how.
///
/// Art mode, mosaic mode and the slideshow are independent flags, except that
/// mosaic mode freezes navigation, zoom, pan and slideshow advancing. The only
/// terminal state is an empty image list, reached through `remove_current`.
#[derive(Debug, Clone)]
pub struct ViewportState {
    images: Vec<PathBuf>,
    current_index: usize,
    zoom: f32,
    pan: (i32, i32),
    art_mode: bool,
    art_generation: u64,
    mode: ViewMode,
    slideshow_active: bool,
    slideshow_deadline: Option<Instant>,
    slideshow_delay: Duration,
    min_zoom: f32,
    max_zoom: f32,
}

impl ViewportState {
    pub fn new(images: Vec<PathBuf>, config: &ViewerConfig) -> Self {
        Self {
            images,
            current_index: 0,
            zoom: 1.0,
            pan: (0, 0),
            art_mode: false,
            art_generation: 0,
            mode: ViewMode::Single,
            slideshow_active: false,
            slideshow_deadline: None,
            slideshow_delay: config.slideshow_delay,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.images.get(self.current_index).map(PathBuf::as_path)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> (i32, i32) {
        self.pan
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn art_mode(&self) -> bool {
        self.art_mode
    }

    pub fn mosaic_mode(&self) -> bool {
        self.mode == ViewMode::Mosaic
    }

    pub fn slideshow_active(&self) -> bool {
        self.slideshow_active
    }

    pub fn slideshow_deadline(&self) -> Option<Instant> {
        self.slideshow_deadline
    }

    /// When the slideshow next needs a frame, if it can advance at all.
    pub fn next_wakeup(&self) -> Option<Instant> {
        if self.slideshow_active && !self.mosaic_mode() {
            self.slideshow_deadline
        } else {
            None
        }
    }

    /// Variant used for the single-image view.
    pub fn current_variant(&self) -> Variant {
        if self.art_mode {
            Variant::Art(self.art_generation)
        } else {
            Variant::Full
        }
    }

    pub fn current_key(&self) -> Option<CacheKey> {
        self.current_path()
            .map(|p| CacheKey::new(p, self.current_variant()))
    }

    /// Keys for `ahead` following then `behind` preceding images, wrapping,
    /// without the current image and without repeats.
    pub fn neighbor_keys(&self, ahead: usize, behind: usize) -> Vec<CacheKey> {
        let n = self.images.len();
        if n < 2 {
            return Vec::new();
        }
        let forward = (1..=ahead).map(|d| (self.current_index + d % n) % n);
        let backward = (1..=behind).map(|d| (self.current_index + n - d % n) % n);

        let mut seen = Vec::with_capacity(ahead + behind);
        for idx in forward.chain(backward) {
            if idx != self.current_index && !seen.contains(&idx) {
                seen.push(idx);
            }
        }
        let variant = self.current_variant();
        seen.into_iter()
            .map(|idx| CacheKey::new(self.images[idx].as_path(), variant))
            .collect()
    }

    /// Thumbnail keys for every image, in grid order.
    pub fn grid_keys(&self) -> Vec<CacheKey> {
        self.images.iter().map(|p| CacheKey::thumb(p)).collect()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Step through the list with wrap-around. Single-image mode only.
    pub fn navigate(&mut self, step: isize) -> bool {
        if self.is_empty() || self.mosaic_mode() {
            return false;
        }
        let n = self.images.len() as isize;
        let next = (self.current_index as isize + step).rem_euclid(n) as usize;
        let moved = next != self.current_index;
        self.current_index = next;
        moved
    }

    /// Multiply the zoom by `factor`, clamped to the configured bounds.
    pub fn set_zoom(&mut self, factor: f32) -> bool {
        if self.mosaic_mode() || factor.is_nan() {
            return false;
        }
        self.zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        true
    }

    pub fn pan_by(&mut self, dx: i32, dy: i32) -> bool {
        if self.mosaic_mode() {
            return false;
        }
        self.pan = (self.pan.0.saturating_add(dx), self.pan.1.saturating_add(dy));
        true
    }

    pub fn reset_view(&mut self) {
        self.zoom = 1.0;
        self.pan = (0, 0);
    }

    /// Flip art mode. Each toggle starts a new art generation so art images
    /// decoded before the toggle are never shown again.
    pub fn toggle_art_mode(&mut self) -> bool {
        self.art_mode = !self.art_mode;
        self.art_generation += 1;
        self.art_mode
    }

    pub fn toggle_mosaic_mode(&mut self) -> bool {
        self.mode = match self.mode {
            ViewMode::Single => {
                self.reset_view();
                ViewMode::Mosaic
            }
            ViewMode::Mosaic => ViewMode::Single,
        };
        self.mosaic_mode()
    }

    pub fn toggle_slideshow(&mut self, now: Instant) -> bool {
        self.slideshow_active = !self.slideshow_active;
        self.slideshow_deadline = if self.slideshow_active {
            Some(now + self.slideshow_delay)
        } else {
            None
        };
        self.slideshow_active
    }

    /// Advance the slideshow if its deadline has passed. Returns true if the
    /// current image changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.next_wakeup() {
            Some(deadline) if now >= deadline => {
                self.slideshow_deadline = Some(now + self.slideshow_delay);
                self.navigate(1)
            }
            _ => false,
        }
    }

    /// Drop the current image from the list. The index stays in place (so
    /// the next image slides under it) and wraps to 0 past the end.
    pub fn remove_current(&mut self) -> Option<PathBuf> {
        if self.is_empty() {
            return None;
        }
        let removed = self.images.remove(self.current_index);
        if self.images.is_empty() {
            self.current_index = 0;
            self.slideshow_active = false;
            self.slideshow_deadline = None;
        } else {
            self.current_index %= self.images.len();
        }
        Some(removed)
    }
}
