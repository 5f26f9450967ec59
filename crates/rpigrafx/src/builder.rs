// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Creation, wiring and enablement of the per-camera hardware chain.
//!
//! For every used camera the builder creates one camera, one splitter and one
//! ISP per client, tunnels camera → splitter → ISPs, arms the ISP outputs and
//! finally enables the connections, downstream first. The first failing call
//! stops the build; objects created so far stay live.

use crate::{
    backend::{Backend, BufferSink, ComponentKind, HardwareBuffer, PortFormat, PortKind},
    config::{CameraPort, ClientRequest, FrameHandle, PipelineConfig},
    exchange::FrameExchange,
    status::Status,
    MAX_CAMERAS, MAX_CLIENTS,
};
use std::{
    error, fmt,
    sync::{Arc, Weak},
};

/// Step of the build that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    CreateCamera,
    SetCameraNum,
    EnableCameraControl,
    ConfigureCameraOutput,
    EnableCamera,
    CreateSplitter,
    EnableSplitterControl,
    ConfigureSplitterInput,
    ConfigureSplitterOutput,
    EnableSplitter,
    CreateIsp,
    EnableIspControl,
    ConfigureIspInput,
    ConfigureIspOutput,
    CreateIspPool,
    EnableIsp,
    ConnectCameraSplitter,
    ConnectSplitterIsp,
    ArmIspOutput,
    PrimeIspOutput,
    EnableSplitterIspConnection,
    EnableCameraSplitterConnection,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            BuildStage::CreateCamera => "creating camera",
            BuildStage::SetCameraNum => "selecting camera sensor",
            BuildStage::EnableCameraControl => "enabling camera control port",
            BuildStage::ConfigureCameraOutput => "configuring camera output",
            BuildStage::EnableCamera => "enabling camera",
            BuildStage::CreateSplitter => "creating splitter",
            BuildStage::EnableSplitterControl => "enabling splitter control port",
            BuildStage::ConfigureSplitterInput => "configuring splitter input",
            BuildStage::ConfigureSplitterOutput => "configuring splitter output",
            BuildStage::EnableSplitter => "enabling splitter",
            BuildStage::CreateIsp => "creating ISP",
            BuildStage::EnableIspControl => "enabling ISP control port",
            BuildStage::ConfigureIspInput => "configuring ISP input",
            BuildStage::ConfigureIspOutput => "configuring ISP output",
            BuildStage::CreateIspPool => "creating ISP output pool",
            BuildStage::EnableIsp => "enabling ISP",
            BuildStage::ConnectCameraSplitter => "connecting camera to splitter",
            BuildStage::ConnectSplitterIsp => "connecting splitter to ISP",
            BuildStage::ArmIspOutput => "enabling ISP output port",
            BuildStage::PrimeIspOutput => "sending buffers to ISP output",
            BuildStage::EnableSplitterIspConnection => "enabling splitter to ISP connection",
            BuildStage::EnableCameraSplitterConnection => "enabling camera to splitter connection",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildError {
    pub camera: usize,
    /// Client slot for per-client stages
    pub slot: Option<usize>,
    pub stage: BuildStage,
    pub status: Status,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.slot {
            Some(slot) => write!(
                f,
                "camera {} slot {}: {}: {}",
                self.camera, slot, self.stage, self.status
            ),
            None => write!(f, "camera {}: {}: {}", self.camera, self.stage, self.status),
        }
    }
}

impl error::Error for BuildError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.status)
    }
}

/// Where in the chain a call is made, for tagging failures.
#[derive(Clone, Copy)]
struct Site {
    camera: usize,
    slot: Option<usize>,
}

impl Site {
    fn camera(camera: usize) -> Self {
        Site { camera, slot: None }
    }

    fn slot(camera: usize, slot: usize) -> Self {
        Site {
            camera,
            slot: Some(slot),
        }
    }

    fn run<T>(self, stage: BuildStage, result: Result<T, Status>) -> Result<T, BuildError> {
        result.map_err(|status| {
            let err = BuildError {
                camera: self.camera,
                slot: self.slot,
                stage,
                status,
            };
            log::error!("{}", err);
            err
        })
    }
}

/// One client's slot of a built camera.
pub struct Slot<B: Backend> {
    request: ClientRequest,
    exchange: Arc<FrameExchange<B::Buffer>>,
}

impl<B: Backend> Slot<B> {
    pub fn request(&self) -> &ClientRequest {
        &self.request
    }

    pub fn exchange(&self) -> &FrameExchange<B::Buffer> {
        &self.exchange
    }
}

/// A camera whose chain completed every build step.
///
/// Hardware objects live for the rest of the process; the chain keeps what
/// frame fetching needs.
pub struct CameraChain<B: Backend> {
    width: u32,
    height: u32,
    port: CameraPort,
    slots: [Option<Slot<B>>; MAX_CLIENTS],
}

impl<B: Backend> CameraChain<B> {
    /// Camera and splitter size, the maximum over all clients.
    pub fn negotiated_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn camera_port(&self) -> CameraPort {
        self.port
    }

    pub fn slot(&self, slot: usize) -> Option<&Slot<B>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }
}

/// Hardware objects of one ISP stage before its output is armed.
struct IspParts<B: Backend> {
    input: B::Port,
    output: B::Port,
    pool: B::Pool,
    request: ClientRequest,
}

pub struct PipelineBuilder<'a, B: Backend> {
    backend: &'a Arc<B>,
    config: &'a PipelineConfig,
}

impl<'a, B: Backend> PipelineBuilder<'a, B> {
    pub fn new(backend: &'a Arc<B>, config: &'a PipelineConfig) -> Self {
        PipelineBuilder { backend, config }
    }

    /// Builds every used camera in ascending id order, storing each complete
    /// chain in `chains`.
    pub fn build(
        &self,
        chains: &mut [Option<CameraChain<B>>; MAX_CAMERAS],
    ) -> Result<(), BuildError> {
        for camera in self.config.used_cameras() {
            let chain = self.build_camera(camera)?;
            log::info!(
                "camera {}: built {}x{} from {} output with {} clients",
                camera,
                chain.width,
                chain.height,
                chain.port,
                self.config.clients(camera).len()
            );
            chains[camera] = Some(chain);
        }
        Ok(())
    }

    fn build_camera(&self, camera: usize) -> Result<CameraChain<B>, BuildError> {
        let backend = self.backend.as_ref();
        let site = Site::camera(camera);
        let clients = self.config.clients(camera);
        let (width, height) = self.config.negotiated_size(camera).unwrap_or((0, 0));
        let opaque = PortFormat::opaque(width, height);
        let selected = self.config.camera_port(camera);

        log::debug!(
            "camera {}: negotiated {}x{} for {} clients",
            camera,
            width,
            height,
            clients.len()
        );

        // Camera
        let cam = site.run(
            BuildStage::CreateCamera,
            backend.create_component(ComponentKind::Camera),
        )?;
        let control = site.run(
            BuildStage::SetCameraNum,
            lookup(backend, cam, PortKind::Control, 0),
        )?;
        site.run(
            BuildStage::SetCameraNum,
            backend.set_camera_num(control, camera as u32),
        )?;
        site.run(
            BuildStage::EnableCameraControl,
            backend.enable_port(control, release_only()),
        )?;
        let cam_out = site.run(
            BuildStage::ConfigureCameraOutput,
            lookup(backend, cam, PortKind::Output, selected.index()),
        )?;
        site.run(
            BuildStage::ConfigureCameraOutput,
            configure(backend, cam_out, &opaque, true),
        )?;
        site.run(BuildStage::EnableCamera, backend.enable_component(cam))?;

        // Splitter
        let splitter = site.run(
            BuildStage::CreateSplitter,
            backend.create_component(ComponentKind::Splitter),
        )?;
        let control = site.run(
            BuildStage::EnableSplitterControl,
            lookup(backend, splitter, PortKind::Control, 0),
        )?;
        site.run(
            BuildStage::EnableSplitterControl,
            backend.enable_port(control, release_only()),
        )?;
        let split_in = site.run(
            BuildStage::ConfigureSplitterInput,
            lookup(backend, splitter, PortKind::Input, 0),
        )?;
        site.run(
            BuildStage::ConfigureSplitterInput,
            configure(backend, split_in, &opaque, true),
        )?;
        let mut split_outs: [Option<B::Port>; MAX_CLIENTS] = [None; MAX_CLIENTS];
        for slot in 0..clients.len() {
            let site = Site::slot(camera, slot);
            let port = site.run(
                BuildStage::ConfigureSplitterOutput,
                lookup(backend, splitter, PortKind::Output, slot as u32),
            )?;
            site.run(
                BuildStage::ConfigureSplitterOutput,
                configure(backend, port, &opaque, true),
            )?;
            split_outs[slot] = Some(port);
        }
        site.run(BuildStage::EnableSplitter, backend.enable_component(splitter))?;

        // ISPs
        let mut isps: [Option<IspParts<B>>; MAX_CLIENTS] = std::array::from_fn(|_| None);
        for (slot, request) in clients.iter().enumerate() {
            isps[slot] = Some(self.build_isp(camera, slot, request, &opaque)?);
        }

        // Tunnels
        let head = site.run(
            BuildStage::ConnectCameraSplitter,
            backend.connect(cam_out, split_in),
        )?;
        let mut tails: [Option<B::Connection>; MAX_CLIENTS] = [None; MAX_CLIENTS];
        for (slot, (out, isp)) in split_outs.iter().zip(isps.iter()).enumerate() {
            if let (Some(out), Some(isp)) = (out, isp) {
                tails[slot] = Some(Site::slot(camera, slot).run(
                    BuildStage::ConnectSplitterIsp,
                    backend.connect(*out, isp.input),
                )?);
            }
        }

        // Arm every ISP output before any data can flow.
        let mut slots: [Option<Slot<B>>; MAX_CLIENTS] = std::array::from_fn(|_| None);
        for (slot, isp) in isps.iter().enumerate() {
            if let Some(isp) = isp {
                slots[slot] = Some(self.arm(FrameHandle::new(camera, slot), isp)?);
            }
        }

        // Downstream connections first, the camera last.
        for (slot, tail) in tails.iter().enumerate() {
            if let Some(tail) = tail {
                Site::slot(camera, slot).run(
                    BuildStage::EnableSplitterIspConnection,
                    backend.enable_connection(*tail),
                )?;
            }
        }
        site.run(
            BuildStage::EnableCameraSplitterConnection,
            backend.enable_connection(head),
        )?;

        Ok(CameraChain {
            width,
            height,
            port: selected,
            slots,
        })
    }

    fn build_isp(
        &self,
        camera: usize,
        slot: usize,
        request: &ClientRequest,
        opaque: &PortFormat,
    ) -> Result<IspParts<B>, BuildError> {
        let backend = self.backend.as_ref();
        let site = Site::slot(camera, slot);

        let isp = site.run(
            BuildStage::CreateIsp,
            backend.create_component(ComponentKind::Isp),
        )?;
        let control = site.run(
            BuildStage::EnableIspControl,
            lookup(backend, isp, PortKind::Control, 0),
        )?;
        site.run(
            BuildStage::EnableIspControl,
            backend.enable_port(control, release_only()),
        )?;

        let input = site.run(
            BuildStage::ConfigureIspInput,
            lookup(backend, isp, PortKind::Input, 0),
        )?;
        site.run(
            BuildStage::ConfigureIspInput,
            configure(backend, input, opaque, true),
        )?;

        let output = site.run(
            BuildStage::ConfigureIspOutput,
            lookup(backend, isp, PortKind::Output, 0),
        )?;
        let format = PortFormat::new(request.encoding, request.width, request.height);
        site.run(
            BuildStage::ConfigureIspOutput,
            configure(backend, output, &format, request.zero_copy),
        )?;

        let req = backend.buffer_requirements(output);
        log::debug!(
            "camera {} slot {}: {} output wants {} buffers of {} bytes",
            camera,
            slot,
            format,
            req.num,
            req.size
        );
        let pool = site.run(
            BuildStage::CreateIspPool,
            backend.create_pool(output, req.num, req.size),
        )?;
        site.run(BuildStage::EnableIsp, backend.enable_component(isp))?;

        Ok(IspParts {
            input,
            output,
            pool,
            request: *request,
        })
    }

    /// Installs the slot's exchange on the ISP output and hands it the pool.
    fn arm(&self, handle: FrameHandle, isp: &IspParts<B>) -> Result<Slot<B>, BuildError> {
        let backend = self.backend.as_ref();
        let site = Site::slot(handle.camera(), handle.slot());

        let exchange = Arc::new(FrameExchange::new(
            handle,
            refill(Arc::downgrade(self.backend), isp.output, isp.pool),
        ));

        let sink_exchange = exchange.clone();
        let sink: BufferSink<B::Buffer> =
            Box::new(move |buffer: B::Buffer| sink_exchange.on_buffer_ready(buffer));
        site.run(BuildStage::ArmIspOutput, backend.enable_port(isp.output, sink))?;

        let sent = site.run(
            BuildStage::PrimeIspOutput,
            backend.send_buffers(isp.output, isp.pool),
        )?;
        log::debug!("{}: primed with {} buffers", handle, sent);

        Ok(Slot {
            request: isp.request,
            exchange,
        })
    }
}

fn lookup<B: Backend>(
    backend: &B,
    component: B::Component,
    kind: PortKind,
    index: u32,
) -> Result<B::Port, Status> {
    backend.port(component, kind, index).ok_or_else(|| {
        log::error!("{:?} has no {} port {}", component, kind, index);
        Status::ENXIO
    })
}

fn configure<B: Backend>(
    backend: &B,
    port: B::Port,
    format: &PortFormat,
    zero_copy: bool,
) -> Result<(), Status> {
    backend.set_format(port, format)?;
    backend.set_zero_copy(port, zero_copy)
}

/// Control port handler that returns every event buffer unread.
fn release_only<T: HardwareBuffer>() -> BufferSink<T> {
    Box::new(|buffer: T| drop(buffer))
}

fn refill<B: Backend>(
    backend: Weak<B>,
    port: B::Port,
    pool: B::Pool,
) -> crate::exchange::Refill {
    Box::new(move || {
        if let Some(backend) = backend.upgrade() {
            if let Err(status) = backend.send_buffers(port, pool) {
                log::warn!("failed to refill {:?}: {}", port, status);
            }
        }
    })
}
