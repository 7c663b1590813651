//! One viewing session: the context object every component hangs off.
//!
//! The session owns the viewport state, the cache, the prefetcher and the
//! external collaborators. The front end feeds it `InputEvent`s and asks it
//! to render frames; nothing in here is global.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ImageCache;
use crate::cli::HELP_KEYS;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::files::{FileOps, TransferMode};
use crate::loader::{CacheKey, DecodedImage, ImageSource};
use crate::prefetch::{Prefetcher, ReadyNotifier};
use crate::sheet::{grid_side, save_contact_sheet, SHEET_CELL};
use crate::ui::render::Renderer;
use crate::ui::state::{InputEvent, ViewMode, ViewportState};

// ---------------------------------------------------------------------------
// Shutdown signal
// ---------------------------------------------------------------------------

/// Cooperative stop flag, checked at the start of each frame and of each
/// background task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn on_off(flag: bool) -> &'static str {
    if flag { "On" } else { "Off" }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<S: ImageSource> {
    config: ViewerConfig,
    viewport: ViewportState,
    source: Arc<S>,
    cache: Arc<ImageCache>,
    prefetcher: Prefetcher<S>,
    file_ops: Box<dyn FileOps>,
    transfer_mode: TransferMode,
    shutdown: ShutdownSignal,
    status: Option<String>,
}

impl<S: ImageSource> Session<S> {
    pub fn new(
        config: ViewerConfig,
        source: Arc<S>,
        file_ops: Box<dyn FileOps>,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        let shutdown = ShutdownSignal::new();
        let cache = Arc::new(ImageCache::new(config.cache_budget));
        let prefetcher = Prefetcher::new(
            config.prefetch_workers,
            Arc::clone(&source),
            Arc::clone(&cache),
            shutdown.clone(),
        )?;
        let viewport = ViewportState::new(source.list(), &config);
        Ok(Self {
            transfer_mode: config.transfer_mode,
            config,
            viewport,
            source,
            cache,
            prefetcher,
            file_ops,
            shutdown,
            status: None,
        })
    }

    pub fn with_notifier(mut self, notify: ReadyNotifier) -> Self {
        self.prefetcher.set_notifier(notify);
        self
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    pub fn prefetcher(&self) -> &Prefetcher<S> {
        &self.prefetcher
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    /// Last user-facing message (file operation results and the like).
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.shutdown.is_triggered() || self.viewport.is_empty()
    }

    /// When the next frame is due without any input.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.viewport.next_wakeup()
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    /// Advance the slideshow, render the current view and queue prefetches.
    pub fn frame(&mut self, now: Instant, renderer: &mut dyn Renderer) -> Flow {
        if self.is_finished() {
            return Flow::Exit;
        }
        self.viewport.tick(now);

        match self.viewport.mode() {
            ViewMode::Mosaic => self.render_mosaic(renderer),
            ViewMode::Single => {
                let Some(image) = self.current_image() else {
                    log::info!("No images left.");
                    return Flow::Exit;
                };
                renderer.draw(&image, self.viewport.zoom(), self.viewport.pan());
                self.prefetch_neighbors();
            }
        }
        Flow::Continue
    }

    /// Cache-aside lookup of the current image. Images that fail to decode
    /// are dropped from the list and the next one is tried.
    fn current_image(&mut self) -> Option<Arc<DecodedImage>> {
        loop {
            let key = self.viewport.current_key()?;
            if let Some(img) = self.cache.get(&key) {
                return Some(img);
            }
            match self.source.decode(&key.id, key.variant) {
                Ok(decoded) => {
                    let img = Arc::new(decoded);
                    self.cache.put(key, Arc::clone(&img));
                    return Some(img);
                }
                Err(e) => {
                    log::warn!("{}; removing it from the list", e);
                    self.remove_current();
                }
            }
        }
    }

    fn prefetch_neighbors(&self) {
        let keys = self
            .viewport
            .neighbor_keys(self.config.look_ahead, self.config.look_behind);
        self.prefetcher.schedule(keys);
    }

    /// Grid of every image. Missing thumbnails are queued on the prefetcher
    /// so the grid never waits on a decode. Thumbnails that already failed
    /// stay empty and are not queued again.
    fn render_mosaic(&self, renderer: &mut dyn Renderer) {
        let keys = self.viewport.grid_keys();
        let cells: Vec<Option<Arc<DecodedImage>>> = keys.iter().map(|k| self.cache.get(k)).collect();

        let missing = keys
            .into_iter()
            .zip(&cells)
            .filter(|(key, cell)| cell.is_none() && !self.prefetcher.has_failed(key))
            .map(|(key, _)| key);
        self.prefetcher.schedule(missing);

        let side = grid_side(cells.len()).max(1);
        let (w, h) = renderer.size();
        renderer.draw_grid(&cells, (w / side, h / side));
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub fn handle(&mut self, event: InputEvent, now: Instant) -> Flow {
        match event {
            InputEvent::Navigate(step) => {
                self.viewport.navigate(step);
            }
            InputEvent::Zoom(factor) => {
                self.viewport.set_zoom(factor);
            }
            InputEvent::Pan(dx, dy) => {
                self.viewport.pan_by(dx, dy);
            }
            InputEvent::ResetView => self.viewport.reset_view(),
            InputEvent::ToggleArt => {
                let on = self.viewport.toggle_art_mode();
                let dropped = self.cache.invalidate(|k| k.variant.is_art());
                log::info!("Art mode: {} ({} art images dropped from cache)", on_off(on), dropped);
            }
            InputEvent::ToggleMosaic => {
                let on = self.viewport.toggle_mosaic_mode();
                log::info!("Mosaic view: {}", on_off(on));
            }
            InputEvent::ToggleSlideshow => {
                let on = self.viewport.toggle_slideshow(now);
                log::info!("Slideshow: {}", on_off(on));
            }
            InputEvent::ToggleTransferMode => {
                self.transfer_mode = self.transfer_mode.toggled();
                log::info!("Mode changed to: {}", self.transfer_mode.label());
            }
            InputEvent::Delete => self.delete_current(),
            InputEvent::MoveToSlot(slot) => self.transfer_current(slot),
            InputEvent::ContactSheet => self.export_contact_sheet(),
            InputEvent::Help => {
                for line in HELP_KEYS.lines() {
                    log::info!("{}", line);
                }
            }
            InputEvent::Quit => self.shutdown.trigger(),
        }

        if self.is_finished() {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn report(&mut self, message: String) {
        log::error!("{}", message);
        self.status = Some(message);
    }

    /// Drop the current image from the session and every cached variant of it.
    fn remove_current(&mut self) -> Option<PathBuf> {
        let removed = self.viewport.remove_current()?;
        self.cache.invalidate(|k| *k.id == *removed);
        Some(removed)
    }

    fn delete_current(&mut self) {
        let Some(path) = self.viewport.current_path().map(PathBuf::from) else {
            return;
        };
        match self.file_ops.delete(&path) {
            Ok(()) => {
                log::info!("Deleted {}", path.display());
                self.status = Some(format!("deleted {}", path.display()));
                self.remove_current();
            }
            Err(e) => self.report(e.to_string()),
        }
    }

    fn transfer_current(&mut self, slot: u8) {
        let Some(path) = self.viewport.current_path().map(PathBuf::from) else {
            return;
        };
        let Some(name) = path.file_name() else {
            return;
        };
        let dst = self.config.folder.join(slot.to_string()).join(name);
        let mode = self.transfer_mode;

        match self.file_ops.move_or_copy(&path, &dst, mode) {
            Ok(()) => {
                log::info!("{} {} -> {}", mode.label(), path.display(), dst.display());
                self.status = Some(format!("{} to {}", mode.label().to_lowercase(), slot));
                if mode == TransferMode::Move {
                    self.remove_current();
                }
            }
            Err(e) => self.report(e.to_string()),
        }
    }

    fn export_contact_sheet(&mut self) {
        match save_contact_sheet(self.viewport.images(), self.config.sheet_dir(), SHEET_CELL) {
            Ok(path) => self.status = Some(format!("contact sheet saved as {}", path.display())),
            Err(e) => self.report(e.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Status line
    // -----------------------------------------------------------------------

    pub fn status_line(&self) -> String {
        let Some(path) = self.viewport.current_path() else {
            return "no images".to_string();
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut flags = vec![self.transfer_mode.label()];
        if self.viewport.art_mode() {
            flags.push("art");
        }
        if self.viewport.mosaic_mode() {
            flags.push("mosaic");
        }
        if self.viewport.slideshow_active() {
            flags.push("slideshow");
        }

        let mb = |b: u64| b as f64 / (1024.0 * 1024.0);
        let mut line = format!(
            "[{}/{}] {} | {:.0}% | {} | cache {:.0}/{:.0} MB",
            self.viewport.current_index() + 1,
            self.viewport.len(),
            name,
            self.viewport.zoom() * 100.0,
            flags.join(" "),
            mb(self.cache.used_bytes()),
            mb(self.cache.budget()),
        );
        if let Some(status) = &self.status {
            line.push_str(" | ");
            line.push_str(status);
        }
        line
    }

    pub fn current_key(&self) -> Option<CacheKey> {
        self.viewport.current_key()
    }
}
