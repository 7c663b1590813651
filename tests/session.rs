use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fotoview::config::ViewerConfig;
use fotoview::error::{ConfigError, DecodeError, FileOpError, ViewerError};
use fotoview::files::{FileOps, TransferMode};
use fotoview::loader::{CacheKey, DecodedImage, ImageSource, Variant};
use fotoview::session::{Flow, Session};
use fotoview::ui::render::Renderer;
use fotoview::ui::state::InputEvent;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// In-memory images. The full variant of image `i` is `i + 1` pixels wide so
/// the renderer can tell them apart; names containing "broken" never decode.
struct MemorySource {
    images: Vec<PathBuf>,
    decodes: Mutex<HashMap<(PathBuf, bool), usize>>,
}

impl MemorySource {
    fn new(names: &[&str]) -> Self {
        Self {
            images: names.iter().map(|n| Path::new("/pics").join(n)).collect(),
            decodes: Mutex::new(HashMap::new()),
        }
    }

    /// Foreground plus background decodes of the full or art variant.
    fn decode_count(&self, name: &str) -> usize {
        let key = (Path::new("/pics").join(name), false);
        self.decodes.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    fn thumb_decode_count(&self, name: &str) -> usize {
        let key = (Path::new("/pics").join(name), true);
        self.decodes.lock().unwrap().get(&key).copied().unwrap_or(0)
    }
}

impl ImageSource for MemorySource {
    fn list(&self) -> Vec<PathBuf> {
        self.images.clone()
    }

    fn decode(&self, id: &Path, variant: Variant) -> Result<DecodedImage, DecodeError> {
        let thumb = variant == Variant::Thumb;
        *self
            .decodes
            .lock()
            .unwrap()
            .entry((id.to_path_buf(), thumb))
            .or_insert(0) += 1;

        if id.to_string_lossy().contains("broken") {
            return Err(DecodeError::Empty {
                path: id.to_path_buf(),
            });
        }
        let index = self.images.iter().position(|p| p == id).unwrap_or(0) as u32;
        if thumb {
            Ok(DecodedImage::filled(2, 2, [0, 0, 255, 255]))
        } else {
            Ok(DecodedImage::filled(index + 1, 1, [255, 0, 0, 255]))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Drawn {
    Image { width: u32, zoom: f32, pan: (i32, i32) },
    Grid { loaded: usize, total: usize },
}

#[derive(Default)]
struct RecordingRenderer {
    drawn: Vec<Drawn>,
}

impl RecordingRenderer {
    fn last(&self) -> Option<&Drawn> {
        self.drawn.last()
    }
}

impl Renderer for RecordingRenderer {
    fn size(&self) -> (u32, u32) {
        (300, 300)
    }

    fn draw(&mut self, image: &DecodedImage, zoom: f32, pan: (i32, i32)) {
        self.drawn.push(Drawn::Image {
            width: image.width,
            zoom,
            pan,
        });
    }

    fn draw_grid(&mut self, cells: &[Option<Arc<DecodedImage>>], _cell_size: (u32, u32)) {
        self.drawn.push(Drawn::Grid {
            loaded: cells.iter().filter(|c| c.is_some()).count(),
            total: cells.len(),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Transfer(PathBuf, PathBuf, TransferMode),
    Delete(PathBuf),
}

/// Records every call; fails all of them when `fail` is set.
#[derive(Clone, Default)]
struct ScriptedFileOps {
    calls: Arc<Mutex<Vec<Call>>>,
    fail: bool,
}

impl ScriptedFileOps {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn outcome(&self, op: &'static str, path: &Path) -> Result<(), FileOpError> {
        if self.fail {
            Err(FileOpError::Io {
                op,
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        } else {
            Ok(())
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl FileOps for ScriptedFileOps {
    fn move_or_copy(&self, src: &Path, dst: &Path, mode: TransferMode) -> Result<(), FileOpError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Transfer(src.to_path_buf(), dst.to_path_buf(), mode));
        self.outcome("move", src)
    }

    fn delete(&self, path: &Path) -> Result<(), FileOpError> {
        self.calls.lock().unwrap().push(Call::Delete(path.to_path_buf()));
        self.outcome("delete", path)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> ViewerConfig {
    ViewerConfig {
        folder: PathBuf::from("/pics"),
        cache_budget: 1024 * 1024,
        ..ViewerConfig::default()
    }
}

fn session(names: &[&str], ops: ScriptedFileOps) -> (Session<MemorySource>, Arc<MemorySource>) {
    session_with(config(), names, ops)
}

fn session_with(
    config: ViewerConfig,
    names: &[&str],
    ops: ScriptedFileOps,
) -> (Session<MemorySource>, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::new(names));
    let session = Session::new(config, Arc::clone(&source), Box::new(ops)).unwrap();
    (session, source)
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn wait_idle(s: &Session<MemorySource>) {
    wait_for("prefetch to finish", || s.prefetcher().is_idle());
}

fn full(name: &str) -> CacheKey {
    CacheKey::full(&Path::new("/pics").join(name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_first_frame_draws_current_and_warms_neighbors() {
    let (mut s, source) = session(&["a", "b", "c", "d"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    assert_eq!(s.frame(Instant::now(), &mut r), Flow::Continue);
    assert_eq!(
        r.last(),
        Some(&Drawn::Image { width: 1, zoom: 1.0, pan: (0, 0) })
    );

    // two ahead, one behind (wrapping to the last image)
    wait_for("neighbors to be cached", || {
        let cache = s.cache();
        cache.contains(&full("b")) && cache.contains(&full("c")) && cache.contains(&full("d"))
    });
    wait_idle(&s);

    s.handle(InputEvent::Navigate(1), Instant::now());
    s.frame(Instant::now(), &mut r);
    assert_eq!(
        r.last(),
        Some(&Drawn::Image { width: 2, zoom: 1.0, pan: (0, 0) })
    );
    // served from the cache, not decoded again
    assert_eq!(source.decode_count("b"), 1);
    assert_eq!(source.decode_count("a"), 1);
}

#[test]
fn test_zoom_and_pan_reach_the_renderer() {
    let (mut s, _) = session(&["a", "b"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();
    let now = Instant::now();

    s.handle(InputEvent::Zoom(2.0), now);
    s.handle(InputEvent::Pan(10, -4), now);
    s.frame(now, &mut r);
    assert_eq!(
        r.last(),
        Some(&Drawn::Image { width: 1, zoom: 2.0, pan: (10, -4) })
    );

    s.handle(InputEvent::ResetView, now);
    s.frame(now, &mut r);
    assert_eq!(
        r.last(),
        Some(&Drawn::Image { width: 1, zoom: 1.0, pan: (0, 0) })
    );
}

#[test]
fn test_undecodable_image_is_dropped() {
    let (mut s, _) = session(&["a", "broken", "c"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    s.handle(InputEvent::Navigate(1), Instant::now());
    assert_eq!(s.frame(Instant::now(), &mut r), Flow::Continue);

    // "c" slid into the broken image's slot
    assert_eq!(s.viewport().len(), 2);
    assert_eq!(s.viewport().current_path(), Some(Path::new("/pics/c")));
    assert_eq!(
        r.last(),
        Some(&Drawn::Image { width: 3, zoom: 1.0, pan: (0, 0) })
    );
}

#[test]
fn test_nothing_decodable_exits() {
    let (mut s, _) = session(&["broken1", "broken2"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    assert_eq!(s.frame(Instant::now(), &mut r), Flow::Exit);
    assert!(s.viewport().is_empty());
    assert!(r.drawn.is_empty());
}

#[test]
fn test_deleting_last_image_ends_session() {
    let ops = ScriptedFileOps::default();
    let (mut s, _) = session(&["only"], ops.clone());
    let mut r = RecordingRenderer::default();

    s.frame(Instant::now(), &mut r);
    assert_eq!(s.handle(InputEvent::Delete, Instant::now()), Flow::Exit);
    assert_eq!(ops.calls(), vec![Call::Delete(PathBuf::from("/pics/only"))]);
    assert!(s.cache().is_empty());
    assert_eq!(s.frame(Instant::now(), &mut r), Flow::Exit);
}

#[test]
fn test_move_to_slot_removes_image() {
    let ops = ScriptedFileOps::default();
    let (mut s, _) = session(&["a.png", "b.png"], ops.clone());

    assert_eq!(s.handle(InputEvent::MoveToSlot(3), Instant::now()), Flow::Continue);
    assert_eq!(
        ops.calls(),
        vec![Call::Transfer(
            PathBuf::from("/pics/a.png"),
            PathBuf::from("/pics/3/a.png"),
            TransferMode::Move
        )]
    );
    assert_eq!(s.viewport().len(), 1);
    assert_eq!(s.viewport().current_path(), Some(Path::new("/pics/b.png")));
}

#[test]
fn test_copy_to_slot_keeps_image() {
    let ops = ScriptedFileOps::default();
    let (mut s, _) = session(&["a.png", "b.png"], ops.clone());

    s.handle(InputEvent::ToggleTransferMode, Instant::now());
    assert_eq!(s.transfer_mode(), TransferMode::Copy);
    s.handle(InputEvent::MoveToSlot(9), Instant::now());

    assert_eq!(
        ops.calls(),
        vec![Call::Transfer(
            PathBuf::from("/pics/a.png"),
            PathBuf::from("/pics/9/a.png"),
            TransferMode::Copy
        )]
    );
    assert_eq!(s.viewport().len(), 2);
    assert_eq!(s.viewport().current_index(), 0);
}

#[test]
fn test_file_error_is_reported_and_session_continues() {
    let (mut s, _) = session(&["a", "b"], ScriptedFileOps::failing());
    let mut r = RecordingRenderer::default();

    assert_eq!(s.handle(InputEvent::Delete, Instant::now()), Flow::Continue);
    assert_eq!(s.viewport().len(), 2);
    let status = s.status().unwrap_or_default();
    assert!(status.contains("delete failed"), "status was {:?}", status);
    assert!(s.status_line().contains("delete failed"));

    assert_eq!(s.frame(Instant::now(), &mut r), Flow::Continue);
}

#[test]
fn test_art_toggle_invalidates_only_art_images() {
    let (mut s, _) = session(&["a", "b"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    s.frame(Instant::now(), &mut r);
    wait_idle(&s);
    assert!(s.cache().contains(&full("a")));

    s.handle(InputEvent::ToggleArt, Instant::now());
    s.frame(Instant::now(), &mut r);
    wait_idle(&s);
    let art_key = s.current_key().unwrap();
    assert!(art_key.variant.is_art());
    assert!(s.cache().contains(&art_key));

    s.handle(InputEvent::ToggleArt, Instant::now());
    let keys = s.cache().keys_lru_first();
    assert!(keys.iter().all(|k| !k.variant.is_art()), "left {:?}", keys);
    assert!(s.cache().contains(&full("a")));
    assert!(s.cache().contains(&full("b")));

    // turning art back on never shows the earlier art image
    s.handle(InputEvent::ToggleArt, Instant::now());
    assert_ne!(s.current_key(), Some(art_key));
}

#[test]
fn test_mosaic_fills_in_from_prefetch() {
    let (mut s, source) = session(&["a", "b", "c"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    s.handle(InputEvent::ToggleMosaic, Instant::now());
    s.frame(Instant::now(), &mut r);
    match r.last() {
        Some(Drawn::Grid { total, .. }) => assert_eq!(*total, 3),
        other => panic!("expected a grid, got {:?}", other),
    }
    // the grid itself never decodes a full image
    assert_eq!(source.decode_count("a"), 0);

    wait_for("thumbnails", || {
        s.viewport()
            .grid_keys()
            .iter()
            .all(|k| s.cache().contains(k))
    });
    s.frame(Instant::now(), &mut r);
    assert_eq!(r.last(), Some(&Drawn::Grid { loaded: 3, total: 3 }));

    // navigation is frozen in the grid
    s.handle(InputEvent::Navigate(1), Instant::now());
    assert_eq!(s.viewport().current_index(), 0);

    s.handle(InputEvent::ToggleMosaic, Instant::now());
    s.frame(Instant::now(), &mut r);
    assert!(matches!(r.last(), Some(Drawn::Image { width: 1, .. })));
}

#[test]
fn test_broken_thumbnail_is_not_retried() {
    let (mut s, source) = session(&["a", "broken", "c"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    s.handle(InputEvent::ToggleMosaic, Instant::now());
    for _ in 0..10 {
        s.frame(Instant::now(), &mut r);
        wait_idle(&s);
    }

    assert_eq!(source.thumb_decode_count("broken"), 1);
    assert_eq!(source.thumb_decode_count("a"), 1);
    assert_eq!(r.last(), Some(&Drawn::Grid { loaded: 2, total: 3 }));
}

#[test]
fn test_invalid_config_is_rejected() {
    let bad_zoom = ViewerConfig {
        min_zoom: 2.0,
        max_zoom: 0.5,
        ..config()
    };
    let source = Arc::new(MemorySource::new(&["a"]));
    let result = Session::new(bad_zoom, Arc::clone(&source), Box::new(ScriptedFileOps::default()));
    assert!(matches!(
        result,
        Err(ViewerError::Config(ConfigError::ZoomBounds { .. }))
    ));

    let nan_zoom = ViewerConfig {
        max_zoom: f32::NAN,
        ..config()
    };
    let result = Session::new(nan_zoom, source, Box::new(ScriptedFileOps::default()));
    assert!(matches!(
        result,
        Err(ViewerError::Config(ConfigError::ZoomBounds { .. }))
    ));
}

#[test]
fn test_slideshow_advances_on_frames() {
    let config = ViewerConfig {
        slideshow_delay: Duration::from_millis(50),
        ..config()
    };
    let (mut s, _) = session_with(config, &["a", "b", "c"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();
    let t0 = Instant::now();

    s.handle(InputEvent::ToggleSlideshow, t0);
    assert_eq!(s.next_wakeup(), Some(t0 + Duration::from_millis(50)));

    s.frame(t0 + Duration::from_millis(10), &mut r);
    assert_eq!(s.viewport().current_index(), 0);

    s.frame(t0 + Duration::from_millis(60), &mut r);
    assert_eq!(s.viewport().current_index(), 1);
    assert!(matches!(r.last(), Some(Drawn::Image { width: 2, .. })));

    s.handle(InputEvent::ToggleSlideshow, t0 + Duration::from_millis(70));
    assert_eq!(s.next_wakeup(), None);
    s.frame(t0 + Duration::from_secs(10), &mut r);
    assert_eq!(s.viewport().current_index(), 1);
}

#[test]
fn test_quit_stops_everything() {
    let (mut s, _) = session(&["a", "b"], ScriptedFileOps::default());
    let mut r = RecordingRenderer::default();

    assert_eq!(s.handle(InputEvent::Quit, Instant::now()), Flow::Exit);
    assert!(s.shutdown_signal().is_triggered());
    assert_eq!(s.frame(Instant::now(), &mut r), Flow::Exit);
    assert!(r.drawn.is_empty());
}

#[test]
fn test_status_line_shows_position_and_modes() {
    let (mut s, _) = session(&["a.png", "b.png"], ScriptedFileOps::default());

    s.handle(InputEvent::Navigate(1), Instant::now());
    s.handle(InputEvent::ToggleArt, Instant::now());
    let line = s.status_line();
    assert!(line.starts_with("[2/2] b.png | 100% | MOVE art"), "got {}", line);
}
