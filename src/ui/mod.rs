use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use softbuffer::Surface;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::loader::{CacheKey, ImageSource};
use crate::session::{Flow, Session};
use crate::ui::render::FrameRenderer;
use crate::ui::state::InputEvent;

pub mod render;
pub mod state;

// ---------------------------------------------------------------------------
// User event for waking the UI from worker threads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UserEvent {
    ImageReady(CacheKey),
}

// ---------------------------------------------------------------------------
// Key mapping
// ---------------------------------------------------------------------------

/// Translate a key press into a viewer intent.
pub fn map_key(key: &Key, zoom_step: f32) -> Option<InputEvent> {
    match key {
        Key::Named(named) => match named {
            NamedKey::ArrowRight => Some(InputEvent::Navigate(1)),
            NamedKey::ArrowLeft => Some(InputEvent::Navigate(-1)),
            NamedKey::Space => Some(InputEvent::ToggleSlideshow),
            NamedKey::Delete => Some(InputEvent::Delete),
            NamedKey::CapsLock => Some(InputEvent::ToggleTransferMode),
            NamedKey::Escape => Some(InputEvent::Quit),
            _ => None,
        },
        Key::Character(s) => {
            let c = s.chars().next()?;
            match c.to_ascii_lowercase() {
                'q' => Some(InputEvent::Quit),
                'r' => Some(InputEvent::ResetView),
                'a' => Some(InputEvent::ToggleArt),
                'm' => Some(InputEvent::ToggleMosaic),
                'c' => Some(InputEvent::ContactSheet),
                'h' => Some(InputEvent::Help),
                ' ' => Some(InputEvent::ToggleSlideshow),
                '+' | '=' => Some(InputEvent::Zoom(zoom_step)),
                '-' => Some(InputEvent::Zoom(1.0 / zoom_step)),
                '1'..='9' => Some(InputEvent::MoveToSlot(c as u8 - b'0')),
                _ => None,
            }
        }
        _ => None,
    }
}

/// How long to sleep given the next timed wake-up. The flag asks for a
/// redraw right away because the deadline has already passed.
///
/// Prefetched thumbnails do not need polling: each one arrives as an
/// `ImageReady` user event.
pub fn wait_plan(now: Instant, wakeup: Option<Instant>) -> (ControlFlow, bool) {
    match wakeup {
        Some(when) if now >= when => (ControlFlow::Wait, true),
        Some(when) => (ControlFlow::WaitUntil(when), false),
        None => (ControlFlow::Wait, false),
    }
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App<S: ImageSource> {
    pub session: Session<S>,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    zoom_step: f32,
}

impl<S: ImageSource> App<S> {
    pub fn new(session: Session<S>, zoom_step: f32) -> Self {
        Self {
            session,
            window: None,
            context: None,
            surface: None,
            dragging: false,
            last_cursor: None,
            zoom_step,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn apply(&mut self, event_loop: &ActiveEventLoop, event: InputEvent) {
        if self.session.handle(event, Instant::now()) == Flow::Exit {
            event_loop.exit();
            return;
        }
        self.request_redraw();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let Some(ref mut surface) = self.surface else {
            return;
        };
        let size = window.inner_size();
        let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) else {
            return;
        };
        if let Err(e) = surface.resize(w, h) {
            log::warn!("Failed to resize surface: {}", e);
            return;
        }
        let (fb_w, fb_h) = (w.get(), h.get());

        let flow = match surface.buffer_mut() {
            Ok(mut buffer) => {
                let flow = {
                    let mut renderer = FrameRenderer::new(&mut buffer, fb_w, fb_h);
                    self.session.frame(Instant::now(), &mut renderer)
                };
                if let Err(e) = buffer.present() {
                    log::warn!("Failed to present frame: {}", e);
                }
                flow
            }
            Err(e) => {
                log::warn!("Failed to get frame buffer: {}", e);
                Flow::Continue
            }
        };

        if flow == Flow::Exit {
            event_loop.exit();
            return;
        }
        window.set_title(&format!("fotoview - {}", self.session.status_line()));
    }
}

impl<S: ImageSource> ApplicationHandler<UserEvent> for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("fotoview")
            .with_inner_size(LogicalSize::new(1280u32, 720u32))
            .with_fullscreen(Some(Fullscreen::Borderless(None)));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Could not create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let context = match softbuffer::Context::new(Arc::clone(&window)) {
            Ok(context) => context,
            Err(e) => {
                log::error!("Could not create drawing context: {}", e);
                event_loop.exit();
                return;
            }
        };
        let surface = match Surface::new(&context, Arc::clone(&window)) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Could not create drawing surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ImageReady(key) => {
                log::trace!("[ui] prefetched {}", key);
                // thumbnails show up in the grid as they land
                if self.session.viewport().mosaic_mode() {
                    self.request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.session.shutdown_signal().trigger();
                event_loop.exit();
            }

            // the surface follows the window size on the next redraw
            WindowEvent::Resized(_) => self.request_redraw(),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let Some(input) = map_key(&event.logical_key, self.zoom_step) {
                        self.apply(event_loop, input);
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.dragging = state == ElementState::Pressed;
                }
            }

            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                let previous = self.last_cursor.replace((x, y));
                if let (true, Some((px, py))) = (self.dragging, previous) {
                    let dx = (x - px).round() as i32;
                    let dy = (y - py).round() as i32;
                    if dx != 0 || dy != 0 {
                        self.apply(event_loop, InputEvent::Pan(dx, dy));
                    }
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => y as f32 / 40.0,
                };
                if y.abs() > 0.1 {
                    let factor = if y > 0.0 { self.zoom_step } else { 1.0 / self.zoom_step };
                    self.apply(event_loop, InputEvent::Zoom(factor));
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let (flow, redraw_now) = wait_plan(Instant::now(), self.session.next_wakeup());
        if redraw_now {
            self.request_redraw();
        }
        event_loop.set_control_flow(flow);
    }
}
