// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Hardware abstraction for the multimedia stack.
//!
//! [`Backend`] is the narrow set of component, port, pool and connection
//! operations the pipeline needs. Every call reports a [`Status`]; the
//! pipeline treats any failure as fatal for that call and never retries.
//!
//! Handles (`Component`, `Port`, `Pool`, `Connection`) are small `Copy`
//! values owned by the backend. Hardware objects are never destroyed once the
//! pipeline is built, so a handle stays valid for the life of the process.

use crate::{encoding::Encoding, registry::SensorLimits, status::Status};
use std::fmt;

/// Component types the pipeline instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Transient query object reporting the attached sensors
    CameraInfo,
    Camera,
    Splitter,
    Isp,
}

impl ComponentKind {
    /// Name the component is registered under in MMAL.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::CameraInfo => "vc.camera_info",
            ComponentKind::Camera => "vc.ril.camera",
            ComponentKind::Splitter => "vc.ril.video_splitter",
            ComponentKind::Isp => "vc.ril.isp",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComponentKind::CameraInfo => write!(f, "camera_info"),
            ComponentKind::Camera => write!(f, "camera"),
            ComponentKind::Splitter => write!(f, "splitter"),
            ComponentKind::Isp => write!(f, "isp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Control,
    Input,
    Output,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortKind::Control => write!(f, "control"),
            PortKind::Input => write!(f, "input"),
            PortKind::Output => write!(f, "output"),
        }
    }
}

/// Video format committed to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortFormat {
    pub encoding: Encoding,
    pub width: u32,
    pub height: u32,
}

impl PortFormat {
    pub fn new(encoding: Encoding, width: u32, height: u32) -> Self {
        PortFormat {
            encoding,
            width,
            height,
        }
    }

    /// Format used between camera, splitter and ISP inputs.
    pub fn opaque(width: u32, height: u32) -> Self {
        PortFormat::new(Encoding::OPAQUE, width, height)
    }
}

impl fmt::Display for PortFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.encoding)
    }
}

/// Buffer count and size a port negotiated for its current format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRequirements {
    pub num: u32,
    pub size: u32,
}

/// A buffer header delivered by a port callback.
///
/// Dropping the value releases the header back to the pool it came from.
pub trait HardwareBuffer: Send {
    /// Valid payload bytes.
    fn data(&self) -> &[u8];

    /// Outcome of the transfer that filled this buffer.
    fn status(&self) -> Status;

    /// Presentation timestamp in microseconds, when the producer set one.
    fn pts(&self) -> Option<i64>;
}

/// Callback installed on an enabled port. Runs on a driver thread.
pub type BufferSink<T> = Box<dyn Fn(T) + Send + Sync + 'static>;

/// Operations of the multimedia stack used to build and run the pipeline.
pub trait Backend: Send + Sync + 'static {
    type Component: Copy + fmt::Debug + Send + Sync + 'static;
    type Port: Copy + fmt::Debug + Send + Sync + 'static;
    type Pool: Copy + fmt::Debug + Send + Sync + 'static;
    type Connection: Copy + fmt::Debug + Send + Sync + 'static;
    type Buffer: HardwareBuffer + 'static;

    fn create_component(&self, kind: ComponentKind) -> Result<Self::Component, Status>;

    fn destroy_component(&self, component: Self::Component) -> Result<(), Status>;

    fn enable_component(&self, component: Self::Component) -> Result<(), Status>;

    /// Looks up a port; `None` when the component has no such port.
    fn port(&self, component: Self::Component, kind: PortKind, index: u32) -> Option<Self::Port>;

    /// Reads the attached sensors from a camera-info control port.
    fn camera_info(&self, control: Self::Port) -> Result<Vec<SensorLimits>, Status>;

    /// Binds a camera component to a physical sensor through its control port.
    fn set_camera_num(&self, control: Self::Port, num: u32) -> Result<(), Status>;

    /// Sets and commits a video format on a port.
    fn set_format(&self, port: Self::Port, format: &PortFormat) -> Result<(), Status>;

    fn set_zero_copy(&self, port: Self::Port, enable: bool) -> Result<(), Status>;

    fn buffer_requirements(&self, port: Self::Port) -> BufferRequirements;

    /// Creates a pool of `num` buffers of `size` bytes for `port`.
    fn create_pool(&self, port: Self::Port, num: u32, size: u32) -> Result<Self::Pool, Status>;

    /// Enables a port, installing `sink` as its buffer callback.
    fn enable_port(&self, port: Self::Port, sink: BufferSink<Self::Buffer>) -> Result<(), Status>;

    /// Hands every buffer currently free in `pool` to `port`. Returns how
    /// many were sent.
    fn send_buffers(&self, port: Self::Port, pool: Self::Pool) -> Result<usize, Status>;

    /// Creates a tunnelled connection from an output port to an input port.
    fn connect(&self, output: Self::Port, input: Self::Port) -> Result<Self::Connection, Status>;

    fn enable_connection(&self, connection: Self::Connection) -> Result<(), Status>;
}
