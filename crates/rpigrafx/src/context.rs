// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    backend::Backend,
    builder::{CameraChain, PipelineBuilder},
    config::{CameraPort, ClientRequest, FrameHandle, PipelineConfig},
    exchange::{ExchangeStats, Frame, FrameError, FrameExchange},
    lifecycle::Lifecycle,
    registry::{CameraRegistry, SensorLimits},
    Error, MAX_CAMERAS,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Configuring,
    Built,
    Failed,
}

/// Entry point of the library: owns a backend and the pipeline state built
/// on it.
///
/// Configuration and [`Rpigrafx::build`] take `&mut self`; once built,
/// [`Rpigrafx::fetch_frame`] takes `&self` and may be called from several
/// threads, one caller per slot at a time.
pub struct Rpigrafx<B: Backend> {
    backend: Arc<B>,
    lifecycle: Lifecycle,
    registry: CameraRegistry,
    config: PipelineConfig,
    chains: [Option<CameraChain<B>>; MAX_CAMERAS],
    state: BuildState,
}

impl<B: Backend> Rpigrafx<B> {
    pub fn new(backend: B) -> Self {
        Rpigrafx {
            backend: Arc::new(backend),
            lifecycle: Lifecycle::new(),
            registry: CameraRegistry::new(),
            config: PipelineConfig::new(),
            chains: Default::default(),
            state: BuildState::Configuring,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Discovers the attached cameras on the first call; later calls only
    /// count.
    pub fn init(&mut self) -> Result<(), Error> {
        let backend = self.backend.as_ref();
        let registry = &mut self.registry;
        self.lifecycle.acquire(|| {
            let count = registry.discover(backend)?;
            log::info!("found {} cameras", count);
            Ok::<(), Error>(())
        })
    }

    /// Undoes one [`Rpigrafx::init`]. The last call forgets the cameras, the
    /// registered clients and the built chains.
    ///
    /// Hardware objects are not destroyed.
    pub fn finalize(&mut self) {
        let registry = &mut self.registry;
        let config = &mut self.config;
        let chains = &mut self.chains;
        let state = &mut self.state;
        let released = self.lifecycle.release(|| {
            registry.reset();
            config.reset();
            *chains = Default::default();
            *state = BuildState::Configuring;
        });
        if released {
            log::info!("finalized");
        }
    }

    pub fn camera_count(&self) -> usize {
        self.registry.count()
    }

    pub fn camera_limits(&self, camera: usize) -> Result<SensorLimits, Error> {
        self.registry
            .limits(camera)
            .ok_or(Error::InvalidCamera {
                camera,
                count: self.registry.count(),
            })
    }

    /// Adds a client of `camera`. Slots are handed out in registration order.
    pub fn register_client(
        &mut self,
        camera: usize,
        request: ClientRequest,
    ) -> Result<FrameHandle, Error> {
        if self.state != BuildState::Configuring {
            return Err(Error::AlreadyBuilt);
        }
        self.config.register_client(&self.registry, camera, request)
    }

    pub fn configure_camera_port(&mut self, camera: usize, port: CameraPort) -> Result<(), Error> {
        if self.state != BuildState::Configuring {
            return Err(Error::AlreadyBuilt);
        }
        self.config.set_camera_port(&self.registry, camera, port)
    }

    /// Creates and enables the hardware for every used camera.
    ///
    /// A failure leaves already created objects live and the context refuses
    /// any further build.
    pub fn build(&mut self) -> Result<(), Error> {
        if self.state != BuildState::Configuring {
            return Err(Error::AlreadyBuilt);
        }

        let result = PipelineBuilder::new(&self.backend, &self.config).build(&mut self.chains);
        match result {
            Ok(()) => {
                self.state = BuildState::Built;
                Ok(())
            }
            Err(err) => {
                self.state = BuildState::Failed;
                Err(err.into())
            }
        }
    }

    pub fn is_built(&self) -> bool {
        self.state == BuildState::Built
    }

    /// Waits for the next frame of `handle`'s slot.
    ///
    /// Fails at once for a camera whose chain was not built. Otherwise blocks
    /// without timeout until a buffer arrives and no earlier frame of the
    /// slot is still held.
    pub fn fetch_frame(&self, handle: &FrameHandle) -> Result<Frame<'_, B::Buffer>, Error> {
        let exchange = self.exchange(handle).ok_or_else(|| {
            log::error!("{} was not built", handle);
            FrameError::NotBuilt(*handle)
        })?;
        Ok(exchange.fetch()?)
    }

    pub fn frame_stats(&self, handle: &FrameHandle) -> Option<ExchangeStats> {
        self.exchange(handle).map(FrameExchange::stats)
    }

    /// Camera and splitter size of a built camera.
    pub fn negotiated_size(&self, camera: usize) -> Option<(u32, u32)> {
        self.chain(camera).map(CameraChain::negotiated_size)
    }

    fn chain(&self, camera: usize) -> Option<&CameraChain<B>> {
        self.chains.get(camera).and_then(Option::as_ref)
    }

    fn exchange(&self, handle: &FrameHandle) -> Option<&FrameExchange<B::Buffer>> {
        self.chain(handle.camera())
            .and_then(|chain| chain.slot(handle.slot()))
            .map(|slot| slot.exchange())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encoding::Encoding, sim::SimBackend, ErrorKind};

    #[test]
    fn test_register_before_init() {
        let mut ctx = Rpigrafx::new(SimBackend::default());
        let err = ctx
            .register_client(0, ClientRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCamera { camera: 0, count: 0 }));
    }

    #[test]
    fn test_build_then_register() {
        let mut ctx = Rpigrafx::new(SimBackend::default());
        ctx.init().unwrap();
        ctx.register_client(0, ClientRequest::new(320, 240, Encoding::RGBA))
            .unwrap();
        ctx.build().unwrap();
        assert!(ctx.is_built());

        let err = ctx
            .register_client(0, ClientRequest::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(ctx.build().unwrap_err().kind(), ErrorKind::State);
        assert_eq!(ctx.negotiated_size(0), Some((320, 240)));
    }

    #[test]
    fn test_finalize_forgets_pipeline() {
        let mut ctx = Rpigrafx::new(SimBackend::default());
        ctx.init().unwrap();
        let handle = ctx.register_client(0, ClientRequest::default()).unwrap();
        ctx.build().unwrap();
        ctx.finalize();

        assert_eq!(ctx.camera_count(), 0);
        assert!(ctx.frame_stats(&handle).is_none());
        assert!(matches!(
            ctx.fetch_frame(&handle),
            Err(Error::Frame(FrameError::NotBuilt(_)))
        ));
    }
}
