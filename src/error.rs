use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// An image could not be turned into pixels.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("could not decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} has no pixels", path.display())]
    Empty { path: PathBuf },
}

/// Errors while listing the images of a folder.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("folder '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A move, copy or delete failed. Reported to the user, never fatal.
#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("no images to put on a contact sheet")]
    NoImages,

    #[error("could not encode contact sheet: {0}")]
    Image(#[from] image::ImageError),

    #[error("could not write contact sheet {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cache budget must be greater than zero")]
    ZeroBudget,

    #[error("prefetch worker count must be at least 1")]
    NoWorkers,

    #[error("invalid zoom bounds [{min}, {max}]")]
    ZoomBounds { min: f32, max: f32 },

    #[error("could not parse memory size '{0}'")]
    MemorySize(String),
}

/// Startup failures of the viewer binary.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("could not start prefetch workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
