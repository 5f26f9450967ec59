// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    backend::{Backend, ComponentKind, PortKind},
    status::Status,
    MAX_CAMERAS,
};
use std::{error, fmt};

/// Native resolution limit of one camera sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorLimits {
    pub max_width: u32,
    pub max_height: u32,
}

impl SensorLimits {
    pub const fn new(max_width: u32, max_height: u32) -> Self {
        SensorLimits {
            max_width,
            max_height,
        }
    }

    /// True when `width`x`height` is non-empty and fits the sensor.
    pub fn admits(&self, width: u32, height: u32) -> bool {
        width > 0 && height > 0 && width <= self.max_width && height <= self.max_height
    }
}

/// Step of camera discovery that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    CreateQuery,
    ControlPort,
    ReadCameraInfo,
    DestroyQuery,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InitStage::CreateQuery => write!(f, "creating the camera info component"),
            InitStage::ControlPort => write!(f, "looking up the camera info control port"),
            InitStage::ReadCameraInfo => write!(f, "reading the camera info parameter"),
            InitStage::DestroyQuery => write!(f, "destroying the camera info component"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The query succeeded but reported zero sensors
    NoCameras,

    /// A hardware call of the query failed
    Query { stage: InitStage, status: Status },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InitError::NoCameras => write!(f, "no cameras found"),
            InitError::Query { stage, status } => write!(f, "{}: {}", stage, status),
        }
    }
}

impl error::Error for InitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            InitError::Query { status, .. } => Some(status),
            InitError::NoCameras => None,
        }
    }
}

/// Cameras found at startup and their native limits.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    count: usize,
    limits: [SensorLimits; MAX_CAMERAS],
}

impl CameraRegistry {
    pub fn new() -> Self {
        CameraRegistry::default()
    }

    /// Queries the attached sensors through a transient camera-info component.
    ///
    /// On failure the registry is left empty.
    pub fn discover<B: Backend>(&mut self, backend: &B) -> Result<usize, InitError> {
        self.reset();

        let query = backend
            .create_component(ComponentKind::CameraInfo)
            .map_err(|status| {
                log::error!("failed to create {}: {}", ComponentKind::CameraInfo.name(), status);
                InitError::Query {
                    stage: InitStage::CreateQuery,
                    status,
                }
            })?;

        let sensors = match read_sensors(backend, query) {
            Ok(sensors) => sensors,
            Err(err) => {
                if let Err(status) = backend.destroy_component(query) {
                    log::warn!("failed to destroy camera info after error: {}", status);
                }
                return Err(err);
            }
        };

        backend.destroy_component(query).map_err(|status| {
            log::error!("failed to destroy {}: {}", ComponentKind::CameraInfo.name(), status);
            InitError::Query {
                stage: InitStage::DestroyQuery,
                status,
            }
        })?;

        if sensors.is_empty() {
            log::error!("no cameras found");
            return Err(InitError::NoCameras);
        }

        if sensors.len() > MAX_CAMERAS {
            log::warn!(
                "camera info reported {} cameras, only the first {} are usable",
                sensors.len(),
                MAX_CAMERAS
            );
        }

        for (slot, sensor) in self.limits.iter_mut().zip(sensors.iter()) {
            *slot = *sensor;
        }
        self.count = sensors.len().min(MAX_CAMERAS);

        for (id, limits) in self.limits[..self.count].iter().enumerate() {
            log::info!(
                "camera {}: max {}x{}",
                id,
                limits.max_width,
                limits.max_height
            );
        }

        Ok(self.count)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn limits(&self, camera: usize) -> Option<SensorLimits> {
        if camera < self.count {
            Some(self.limits[camera])
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.limits = [SensorLimits::default(); MAX_CAMERAS];
    }
}

fn read_sensors<B: Backend>(
    backend: &B,
    query: B::Component,
) -> Result<Vec<SensorLimits>, InitError> {
    let control = backend
        .port(query, PortKind::Control, 0)
        .ok_or_else(|| {
            log::error!("camera info has no control port");
            InitError::Query {
                stage: InitStage::ControlPort,
                status: Status::ENXIO,
            }
        })?;

    backend.camera_info(control).map_err(|status| {
        log::error!("failed to read camera info: {}", status);
        InitError::Query {
            stage: InitStage::ReadCameraInfo,
            status,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Event, SimBackend};

    #[test]
    fn test_discover_default_sensor() {
        let sim = SimBackend::default();
        let mut registry = CameraRegistry::new();

        assert_eq!(registry.discover(&sim), Ok(1));
        assert_eq!(registry.limits(0), Some(SensorLimits::new(3280, 2464)));
        assert_eq!(registry.limits(1), None);

        let events = sim.events();
        assert!(matches!(events.first(), Some(Event::Create { component: crate::sim::SimComponent { kind: ComponentKind::CameraInfo, .. } })));
        assert!(matches!(events.last(), Some(Event::Destroy { .. })));
    }

    #[test]
    fn test_discover_clamps_to_max() {
        let sim = SimBackend::new(vec![SensorLimits::new(640, 480); MAX_CAMERAS + 2]);
        let mut registry = CameraRegistry::new();
        assert_eq!(registry.discover(&sim), Ok(MAX_CAMERAS));
    }

    #[test]
    fn test_discover_no_cameras() {
        let sim = SimBackend::new(Vec::new());
        let mut registry = CameraRegistry::new();
        assert_eq!(registry.discover(&sim), Err(InitError::NoCameras));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_query_failure_destroys_component() {
        let sim = SimBackend::default();
        sim.fail_when(Status::EIO, |event| matches!(event, Event::QueryCameraInfo { .. }));

        let mut registry = CameraRegistry::new();
        assert_eq!(
            registry.discover(&sim),
            Err(InitError::Query {
                stage: InitStage::ReadCameraInfo,
                status: Status::EIO,
            })
        );
        assert!(sim.events().iter().any(|e| matches!(e, Event::Destroy { .. })));
    }

    #[test]
    fn test_admits() {
        let limits = SensorLimits::new(3280, 2464);
        assert!(limits.admits(3280, 2464));
        assert!(!limits.admits(3281, 2464));
        assert!(!limits.admits(0, 480));
    }
}
