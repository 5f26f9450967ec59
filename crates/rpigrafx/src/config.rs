// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Client requests collected before any hardware object exists.

use crate::{encoding::Encoding, registry::CameraRegistry, Error, MAX_CAMERAS, MAX_CLIENTS};
use std::fmt;

/// Resolution, pixel format and zero-copy choice of one splitter client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRequest {
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
    pub zero_copy: bool,
}

impl ClientRequest {
    /// New request with zero-copy enabled.
    pub fn new(width: u32, height: u32, encoding: Encoding) -> Self {
        ClientRequest {
            width,
            height,
            encoding,
            zero_copy: true,
        }
    }

    pub fn with_zero_copy(mut self, zero_copy: bool) -> Self {
        self.zero_copy = zero_copy;
        self
    }
}

impl Default for ClientRequest {
    fn default() -> Self {
        ClientRequest::new(640, 480, Encoding::RGB24)
    }
}

/// Address of one ISP output: a camera and the client slot on its splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    camera: usize,
    slot: usize,
}

impl FrameHandle {
    pub(crate) fn new(camera: usize, slot: usize) -> Self {
        FrameHandle { camera, slot }
    }

    pub fn camera(&self) -> usize {
        self.camera
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "camera {} slot {}", self.camera, self.slot)
    }
}

/// Camera output that feeds the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPort {
    #[default]
    Preview,
    Video,
    Capture,
}

impl CameraPort {
    /// Output port index on the camera component.
    pub fn index(self) -> u32 {
        match self {
            CameraPort::Preview => 0,
            CameraPort::Video => 1,
            CameraPort::Capture => 2,
        }
    }
}

impl fmt::Display for CameraPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraPort::Preview => write!(f, "preview"),
            CameraPort::Video => write!(f, "video"),
            CameraPort::Capture => write!(f, "capture"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CameraConfig {
    used: bool,
    port: CameraPort,
    next_slot: usize,
    clients: [ClientRequest; MAX_CLIENTS],
}

/// Per-camera client tables.
#[derive(Debug, Default)]
pub struct PipelineConfig {
    cameras: [CameraConfig; MAX_CAMERAS],
}

impl PipelineConfig {
    pub fn new() -> Self {
        PipelineConfig::default()
    }

    /// Validates and records a client request, returning its handle.
    ///
    /// Checks run in order: camera range, then capacity, then size. A failed
    /// registration changes nothing.
    pub fn register_client(
        &mut self,
        registry: &CameraRegistry,
        camera: usize,
        request: ClientRequest,
    ) -> Result<FrameHandle, Error> {
        let limits = registry.limits(camera).ok_or_else(|| {
            log::error!("camera {} exceeds camera count ({})", camera, registry.count());
            Error::InvalidCamera {
                camera,
                count: registry.count(),
            }
        })?;

        let entry = &mut self.cameras[camera];
        if entry.next_slot >= MAX_CLIENTS {
            log::error!("camera {} already has {} splitter clients", camera, MAX_CLIENTS);
            return Err(Error::Capacity {
                camera,
                limit: MAX_CLIENTS,
            });
        }

        if !limits.admits(request.width, request.height) {
            log::error!(
                "{}x{} is not within 1x1..={}x{} of camera {}",
                request.width,
                request.height,
                limits.max_width,
                limits.max_height,
                camera
            );
            return Err(Error::OversizeRequest {
                camera,
                width: request.width,
                height: request.height,
                max_width: limits.max_width,
                max_height: limits.max_height,
            });
        }

        let slot = entry.next_slot;
        entry.clients[slot] = request;
        entry.next_slot += 1;
        entry.used = true;

        log::debug!(
            "camera {} slot {}: {}x{} {} zero_copy={}",
            camera,
            slot,
            request.width,
            request.height,
            request.encoding,
            request.zero_copy
        );
        Ok(FrameHandle::new(camera, slot))
    }

    pub fn set_camera_port(
        &mut self,
        registry: &CameraRegistry,
        camera: usize,
        port: CameraPort,
    ) -> Result<(), Error> {
        if camera >= registry.count() {
            return Err(Error::InvalidCamera {
                camera,
                count: registry.count(),
            });
        }
        self.cameras[camera].port = port;
        Ok(())
    }

    pub fn camera_port(&self, camera: usize) -> CameraPort {
        self.cameras.get(camera).map(|c| c.port).unwrap_or_default()
    }

    pub fn is_used(&self, camera: usize) -> bool {
        self.cameras.get(camera).is_some_and(|c| c.used)
    }

    /// Registered clients of `camera` in slot order.
    pub fn clients(&self, camera: usize) -> &[ClientRequest] {
        match self.cameras.get(camera) {
            Some(c) => &c.clients[..c.next_slot],
            None => &[],
        }
    }

    /// Largest width and height across the camera's clients.
    pub fn negotiated_size(&self, camera: usize) -> Option<(u32, u32)> {
        let clients = self.clients(camera);
        if clients.is_empty() {
            return None;
        }
        let width = clients.iter().map(|c| c.width).max().unwrap_or(0);
        let height = clients.iter().map(|c| c.height).max().unwrap_or(0);
        Some((width, height))
    }

    /// Ids of cameras with at least one client, ascending.
    pub fn used_cameras(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CAMERAS).filter(|&camera| self.cameras[camera].used)
    }

    pub fn reset(&mut self) {
        self.cameras = [CameraConfig::default(); MAX_CAMERAS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registry::SensorLimits, sim::SimBackend, ErrorKind};

    fn registry(sensors: Vec<SensorLimits>) -> CameraRegistry {
        let mut registry = CameraRegistry::new();
        registry.discover(&SimBackend::new(sensors)).unwrap();
        registry
    }

    #[test]
    fn test_slots_in_registration_order() {
        let registry = registry(vec![SensorLimits::new(3280, 2464)]);
        let mut config = PipelineConfig::new();

        for expected in 0..MAX_CLIENTS {
            let handle = config
                .register_client(&registry, 0, ClientRequest::default())
                .unwrap();
            assert_eq!(handle.camera(), 0);
            assert_eq!(handle.slot(), expected);
        }
        assert!(config.is_used(0));
    }

    #[test]
    fn test_capacity_checked_before_size() {
        let registry = registry(vec![SensorLimits::new(1920, 1080)]);
        let mut config = PipelineConfig::new();
        for _ in 0..MAX_CLIENTS {
            config
                .register_client(&registry, 0, ClientRequest::default())
                .unwrap();
        }

        let oversize = ClientRequest::new(4000, 4000, Encoding::RGB24);
        let err = config.register_client(&registry, 0, oversize).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn test_rejected_request_changes_nothing() {
        let registry = registry(vec![SensorLimits::new(1920, 1080); 2]);
        let mut config = PipelineConfig::new();

        let err = config
            .register_client(&registry, 1, ClientRequest::new(1921, 1080, Encoding::I420))
            .unwrap_err();
        assert!(matches!(err, Error::OversizeRequest { camera: 1, .. }));
        assert!(!config.is_used(1));
        assert!(config.clients(1).is_empty());

        let err = config
            .register_client(&registry, 1, ClientRequest::new(0, 480, Encoding::I420))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let handle = config
            .register_client(&registry, 1, ClientRequest::default())
            .unwrap();
        assert_eq!(handle.slot(), 0);
    }

    #[test]
    fn test_invalid_camera() {
        let registry = registry(vec![SensorLimits::new(1920, 1080)]);
        let mut config = PipelineConfig::new();
        assert!(matches!(
            config.register_client(&registry, 1, ClientRequest::default()),
            Err(Error::InvalidCamera { camera: 1, count: 1 })
        ));
        assert!(config.set_camera_port(&registry, 3, CameraPort::Video).is_err());
    }

    #[test]
    fn test_negotiated_size() {
        let registry = registry(vec![SensorLimits::new(3280, 2464)]);
        let mut config = PipelineConfig::new();
        assert_eq!(config.negotiated_size(0), None);

        config
            .register_client(&registry, 0, ClientRequest::new(640, 720, Encoding::RGB24))
            .unwrap();
        config
            .register_client(&registry, 0, ClientRequest::new(1920, 480, Encoding::I420))
            .unwrap();
        assert_eq!(config.negotiated_size(0), Some((1920, 720)));
    }

    #[test]
    fn test_camera_port() {
        let registry = registry(vec![SensorLimits::new(3280, 2464)]);
        let mut config = PipelineConfig::new();
        assert_eq!(config.camera_port(0), CameraPort::Preview);
        config
            .set_camera_port(&registry, 0, CameraPort::Capture)
            .unwrap();
        assert_eq!(config.camera_port(0).index(), 2);
        config.reset();
        assert_eq!(config.camera_port(0), CameraPort::Preview);
    }
}
