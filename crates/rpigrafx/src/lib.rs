// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! rpigrafx for Rust
//!
//! Builds and drives the fixed-topology camera pipeline of the Raspberry Pi
//! multimedia stack (MMAL): every used camera sensor feeds a video splitter,
//! and every splitter output feeds an ISP that converts the shared opaque
//! stream into the resolution and pixel format one client asked for.
//!
//! ```text
//!                       ┌── ISP[0] ──► FrameExchange (camera, 0) ──► fetch_frame
//!  Camera ──► Splitter ─┼── ISP[1] ──► FrameExchange (camera, 1) ──► fetch_frame
//!                       └── ISP[2] ──► FrameExchange (camera, 2) ──► fetch_frame
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use rpigrafx::{ClientRequest, Encoding, MmalBackend, Rpigrafx};
//!
//! let mut ctx = Rpigrafx::new(MmalBackend::new()?);
//! ctx.init()?;
//!
//! let preview = ctx.register_client(0, ClientRequest::new(640, 480, Encoding::RGB24))?;
//! let full = ctx.register_client(0, ClientRequest::new(1920, 1080, Encoding::I420))?;
//! ctx.build()?;
//!
//! let frame = ctx.fetch_frame(&preview)?;
//! println!("preview frame: {} bytes", frame.len());
//! drop(frame); // hands the buffer back to the ISP
//! # let _ = full;
//! # Ok::<(), rpigrafx::Error>(())
//! ```
//!
//! # Simulation
//!
//! [`sim::SimBackend`] implements the same [`Backend`] trait in software so
//! the whole pipeline can be exercised without camera hardware.

use rpigrafx_sys as ffi;
use std::{error, fmt};

/// Hardware-defined maximum number of camera sensors.
pub const MAX_CAMERAS: usize = ffi::MMAL_PARAMETER_CAMERA_INFO_MAX_CAMERAS;

/// Number of splitter outputs, the fan-out limit of one camera.
pub const FANOUT_LIMIT: usize = 4;

/// Clients one camera can serve.
pub const MAX_CLIENTS: usize = FANOUT_LIMIT - 1;

/// Error type for rpigrafx operations
#[derive(Debug)]
pub enum Error {
    /// The MMAL userland libraries could not be loaded at runtime
    LibraryNotLoaded(ffi::libloading::Error),

    /// Camera id is not below the discovered camera count
    InvalidCamera { camera: usize, count: usize },

    /// Requested frame is empty or larger than the sensor's native resolution
    OversizeRequest {
        camera: usize,
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// The camera already serves the maximum number of clients
    Capacity { camera: usize, limit: usize },

    /// The pipeline was already built (or a build failed) for this context
    AlreadyBuilt,

    /// Camera discovery failed
    Init(registry::InitError),

    /// A hardware call failed while building the pipeline
    Build(builder::BuildError),

    /// A frame could not be fetched
    Frame(exchange::FrameError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Library,
    Validation,
    Capacity,
    State,
    Init,
    Build,
    Frame,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LibraryNotLoaded(_) => ErrorKind::Library,
            Error::InvalidCamera { .. } | Error::OversizeRequest { .. } => ErrorKind::Validation,
            Error::Capacity { .. } => ErrorKind::Capacity,
            Error::AlreadyBuilt => ErrorKind::State,
            Error::Init(_) => ErrorKind::Init,
            Error::Build(_) => ErrorKind::Build,
            Error::Frame(_) => ErrorKind::Frame,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::LibraryNotLoaded(err) => {
                write!(f, "MMAL libraries could not be loaded: {}", err)
            }
            Error::InvalidCamera { camera, count } => {
                write!(f, "camera {} exceeds camera count ({})", camera, count)
            }
            Error::OversizeRequest {
                camera,
                width,
                height,
                max_width,
                max_height,
            } => write!(
                f,
                "{}x{} is not within 1x1..={}x{} of camera {}",
                width, height, max_width, max_height, camera
            ),
            Error::Capacity { camera, limit } => {
                write!(f, "camera {} already has {} splitter clients", camera, limit)
            }
            Error::AlreadyBuilt => write!(f, "pipeline has already been built"),
            Error::Init(err) => write!(f, "camera discovery failed: {}", err),
            Error::Build(err) => write!(f, "pipeline build failed: {}", err),
            Error::Frame(err) => write!(f, "frame fetch failed: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::LibraryNotLoaded(err) => Some(err),
            Error::Init(err) => Some(err),
            Error::Build(err) => Some(err),
            Error::Frame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ffi::libloading::Error> for Error {
    fn from(err: ffi::libloading::Error) -> Self {
        Error::LibraryNotLoaded(err)
    }
}

impl From<registry::InitError> for Error {
    fn from(err: registry::InitError) -> Self {
        Error::Init(err)
    }
}

impl From<builder::BuildError> for Error {
    fn from(err: builder::BuildError) -> Self {
        Error::Build(err)
    }
}

impl From<exchange::FrameError> for Error {
    fn from(err: exchange::FrameError) -> Self {
        Error::Frame(err)
    }
}

/// The backend module defines the hardware abstraction the pipeline drives.
pub mod backend;

/// The status module provides hardware status codes.
pub mod status;

/// The encoding module provides portable handling of MMAL fourcc encodings.
pub mod encoding;

/// The lifecycle module provides reference-counted init/finalize.
pub mod lifecycle;

/// The registry module discovers camera sensors and their limits.
pub mod registry;

/// The config module collects client requests before any hardware exists.
pub mod config;

/// The builder module creates, wires and enables the hardware chain.
pub mod builder;

/// The exchange module hands ISP output buffers to the application.
pub mod exchange;

/// The mmal module implements the backend on the MMAL userland libraries.
pub mod mmal;

/// The sim module implements the backend in software.
pub mod sim;

mod context;

pub use backend::{Backend, HardwareBuffer};
pub use builder::{BuildError, BuildStage};
pub use config::{CameraPort, ClientRequest, FrameHandle};
pub use context::Rpigrafx;
pub use encoding::Encoding;
pub use exchange::{ExchangeStats, Frame, FrameError};
pub use mmal::MmalBackend;
pub use registry::{InitError, SensorLimits};
pub use status::Status;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::InvalidCamera { camera: 4, count: 1 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::Capacity { camera: 0, limit: MAX_CLIENTS }.kind(),
            ErrorKind::Capacity
        );
        assert_eq!(Error::AlreadyBuilt.kind(), ErrorKind::State);
        assert_eq!(Error::Init(InitError::NoCameras).kind(), ErrorKind::Init);
    }

    #[test]
    fn test_error_display() {
        let err = Error::OversizeRequest {
            camera: 0,
            width: 4000,
            height: 3000,
            max_width: 3280,
            max_height: 2464,
        };
        assert_eq!(
            err.to_string(),
            "4000x3000 is not within 1x1..=3280x2464 of camera 0"
        );
    }
}
