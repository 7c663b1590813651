use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use winit::event_loop::EventLoop;

use fotoview::cli::{check_budget_against_ram, Cli};
use fotoview::error::ViewerError;
use fotoview::files::{FolderSource, FsFileOps};
use fotoview::loader::CacheKey;
use fotoview::session::Session;
use fotoview::ui::{App, UserEvent};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    if let Err(e) = run(Cli::parse()) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ViewerError> {
    let config = cli.into_config()?;
    check_budget_against_ram(config.cache_budget);

    let source = Arc::new(FolderSource::open(&config)?);
    if source.is_empty() {
        log::error!("No images found in {}", config.folder.display());
        return Ok(());
    }

    let event_loop = EventLoop::<UserEvent>::with_user_event().build()?;
    // proxies are Send but not Sync on every platform
    let proxy = Mutex::new(event_loop.create_proxy());

    let zoom_step = config.zoom_step;
    let session = Session::new(config, source, Box::new(FsFileOps))?.with_notifier(Arc::new(
        move |key: &CacheKey| {
            // the loop may already be gone during shutdown
            let _ = proxy.lock().send_event(UserEvent::ImageReady(key.clone()));
        },
    ));

    let mut app = App::new(session, zoom_step);
    event_loop.run_app(&mut app)?;

    app.session.shutdown_signal().trigger();
    log::info!("Goodbye.");
    Ok(())
}
