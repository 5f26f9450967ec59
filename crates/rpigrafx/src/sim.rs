// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Software implementation of [`Backend`].
//!
//! [`SimBackend`] keeps components, ports, pools and connections in plain
//! tables and records every successful call as an [`Event`]. Frames only move
//! when the owner asks: [`SimBackend::deliver`] pushes one buffer along a
//! camera → splitter → ISP route, and only if every stage and connection on
//! that route is enabled and the ISP output holds a buffer.
//!
//! Failures are injected with [`SimBackend::fail_when`].

use crate::{
    backend::{
        Backend, BufferRequirements, BufferSink, ComponentKind, HardwareBuffer, PortFormat,
        PortKind,
    },
    config::FrameHandle,
    registry::SensorLimits,
    status::Status,
};
use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

/// Buffers a port asks for when no other count is configured.
pub const DEFAULT_BUFFER_NUM: u32 = 3;

/// Buffer size reported for opaque ports.
const OPAQUE_BUFFER_SIZE: u32 = 128;

/// Control buffers available to [`SimBackend::control_event`].
const CONTROL_BUFFERS: usize = 4;

/// Microseconds between simulated frames (30 fps).
pub const FRAME_INTERVAL_US: i64 = 33_333;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimComponent {
    pub id: usize,
    pub kind: ComponentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimPort {
    pub component: SimComponent,
    pub kind: PortKind,
    pub index: u32,
}

impl SimPort {
    /// True for the `kind` port `index` of any component of type `component`.
    pub fn is(&self, component: ComponentKind, kind: PortKind, index: u32) -> bool {
        self.component.kind == component && self.kind == kind && self.index == index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimPool(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimConnection(usize);

/// A backend call as observed by the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Create { component: SimComponent },
    Destroy { component: SimComponent },
    EnableComponent { component: SimComponent },
    QueryCameraInfo { port: SimPort },
    SetCameraNum { port: SimPort, num: u32 },
    SetFormat { port: SimPort, format: PortFormat },
    SetZeroCopy { port: SimPort, enable: bool },
    CreatePool { port: SimPort, num: u32, size: u32 },
    EnablePort { port: SimPort },
    SendBuffers { port: SimPort },
    Connect { from: SimPort, to: SimPort },
    EnableConnection { from: SimPort, to: SimPort },
}

type FreeList = Arc<Mutex<Vec<Vec<u8>>>>;

type Predicate = Box<dyn Fn(&Event) -> bool + Send + Sync + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Buffer handed to a sink by the simulation.
///
/// Dropping it puts the storage back on the free list of its pool.
pub struct SimBuffer {
    data: Vec<u8>,
    status: Status,
    pts: Option<i64>,
    free: FreeList,
}

impl HardwareBuffer for SimBuffer {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn status(&self) -> Status {
        self.status
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }
}

impl Drop for SimBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        lock(&self.free).push(data);
    }
}

struct PortState {
    kind: PortKind,
    index: u32,
    format: Option<PortFormat>,
    zero_copy: bool,
    sink: Option<Arc<BufferSink<SimBuffer>>>,
    queued: VecDeque<(Vec<u8>, FreeList)>,
    sequence: u64,
}

impl PortState {
    fn new(kind: PortKind, index: u32) -> Self {
        PortState {
            kind,
            index,
            format: None,
            zero_copy: false,
            sink: None,
            queued: VecDeque::new(),
            sequence: 0,
        }
    }
}

struct ComponentState {
    kind: ComponentKind,
    enabled: bool,
    destroyed: bool,
    camera_num: Option<u32>,
    ports: Vec<PortState>,
}

impl ComponentState {
    fn new(kind: ComponentKind) -> Self {
        let (inputs, outputs) = match kind {
            ComponentKind::CameraInfo => (0, 0),
            ComponentKind::Camera => (0, 3),
            ComponentKind::Splitter => (1, crate::FANOUT_LIMIT as u32),
            ComponentKind::Isp => (1, 1),
        };

        let mut ports = vec![PortState::new(PortKind::Control, 0)];
        ports.extend((0..inputs).map(|i| PortState::new(PortKind::Input, i)));
        ports.extend((0..outputs).map(|i| PortState::new(PortKind::Output, i)));

        ComponentState {
            kind,
            enabled: false,
            destroyed: false,
            camera_num: None,
            ports,
        }
    }

    fn position(&self, kind: PortKind, index: u32) -> Option<usize> {
        self.ports
            .iter()
            .position(|p| p.kind == kind && p.index == index)
    }
}

struct ConnectionState {
    from: SimPort,
    to: SimPort,
    enabled: bool,
}

/// An ISP output reachable from an enabled camera.
struct Route {
    camera: usize,
    slot: usize,
    component: usize,
    port: usize,
}

#[derive(Default)]
struct SimState {
    components: Vec<ComponentState>,
    pools: Vec<FreeList>,
    connections: Vec<ConnectionState>,
    events: Vec<Event>,
    failures: Vec<(Status, Predicate)>,
    hidden: HashSet<(ComponentKind, PortKind, u32)>,
}

impl SimState {
    /// Records `event` unless an injected failure matches it.
    fn record(&mut self, event: Event) -> Result<(), Status> {
        if let Some((status, _)) = self.failures.iter().find(|(_, matches)| matches(&event)) {
            log::debug!("sim: injecting {} for {:?}", status, event);
            return Err(*status);
        }
        log::trace!("sim: {:?}", event);
        self.events.push(event);
        Ok(())
    }

    fn component(&mut self, component: SimComponent) -> Result<&mut ComponentState, Status> {
        match self.components.get_mut(component.id) {
            Some(state) if !state.destroyed => Ok(state),
            _ => Err(Status::EINVAL),
        }
    }

    fn port(&mut self, port: SimPort) -> Result<&mut PortState, Status> {
        let component = self.component(port.component)?;
        let position = component
            .position(port.kind, port.index)
            .ok_or(Status::ENXIO)?;
        Ok(&mut component.ports[position])
    }

    fn routes(&self) -> Vec<Route> {
        let mut routes = Vec::new();

        for tail in self.connections.iter().filter(|c| c.enabled) {
            if tail.from.component.kind != ComponentKind::Splitter
                || tail.to.component.kind != ComponentKind::Isp
            {
                continue;
            }

            let Some(head) = self
                .connections
                .iter()
                .find(|c| c.enabled && c.to.component == tail.from.component)
            else {
                continue;
            };
            if head.from.component.kind != ComponentKind::Camera {
                continue;
            }

            let camera = &self.components[head.from.component.id];
            let splitter = &self.components[tail.from.component.id];
            let isp = &self.components[tail.to.component.id];
            if !(camera.enabled && splitter.enabled && isp.enabled) {
                continue;
            }

            let (Some(num), Some(port)) = (camera.camera_num, isp.position(PortKind::Output, 0))
            else {
                continue;
            };
            if isp.ports[port].sink.is_none() {
                continue;
            }

            routes.push(Route {
                camera: num as usize,
                slot: tail.from.index as usize,
                component: tail.to.component.id,
                port,
            });
        }

        routes
    }
}

/// Simulated multimedia stack with a fixed set of sensors.
pub struct SimBackend {
    sensors: Vec<SensorLimits>,
    buffer_num: u32,
    control_pool: FreeList,
    state: Mutex<SimState>,
}

impl Default for SimBackend {
    /// One 8 MP sensor.
    fn default() -> Self {
        SimBackend::new(vec![SensorLimits::new(3280, 2464)])
    }
}

impl SimBackend {
    pub fn new(sensors: Vec<SensorLimits>) -> Self {
        SimBackend {
            sensors,
            buffer_num: DEFAULT_BUFFER_NUM,
            control_pool: Arc::new(Mutex::new(vec![vec![0; 64]; CONTROL_BUFFERS])),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Sets how many buffers output ports ask for.
    pub fn with_buffer_num(mut self, num: u32) -> Self {
        self.buffer_num = num;
        self
    }

    /// Makes every `component` of this type report no such port.
    pub fn hide_port(&self, component: ComponentKind, kind: PortKind, index: u32) {
        lock(&self.state).hidden.insert((component, kind, index));
    }

    /// Fails every later call whose event matches `predicate` with `status`.
    pub fn fail_when<F>(&self, status: Status, predicate: F)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        lock(&self.state).failures.push((status, Box::new(predicate)));
    }

    /// Successful calls so far, in call order.
    pub fn events(&self) -> Vec<Event> {
        lock(&self.state).events.clone()
    }

    /// Format last committed to the `kind` port `index` of the `nth`
    /// component of type `component`.
    pub fn port_format(
        &self,
        component: ComponentKind,
        nth: usize,
        kind: PortKind,
        index: u32,
    ) -> Option<PortFormat> {
        let state = lock(&self.state);
        let target = state
            .components
            .iter()
            .filter(|c| c.kind == component)
            .nth(nth)?;
        let position = target.position(kind, index)?;
        target.ports[position].format
    }

    /// Zero-copy flag of the same port [`SimBackend::port_format`] addresses.
    pub fn port_zero_copy(
        &self,
        component: ComponentKind,
        nth: usize,
        kind: PortKind,
        index: u32,
    ) -> Option<bool> {
        let state = lock(&self.state);
        let target = state
            .components
            .iter()
            .filter(|c| c.kind == component)
            .nth(nth)?;
        let position = target.position(kind, index)?;
        Some(target.ports[position].zero_copy)
    }

    /// Completes one buffer on the ISP output that serves `handle`.
    ///
    /// Returns false when no live route exists or the output has no buffer.
    pub fn deliver(&self, handle: &FrameHandle) -> bool {
        self.deliver_with_status(handle, Status::SUCCESS)
    }

    /// Like [`SimBackend::deliver`], marking the buffer with `status`.
    pub fn deliver_with_status(&self, handle: &FrameHandle, status: Status) -> bool {
        let ready = {
            let mut state = lock(&self.state);
            let route = state
                .routes()
                .into_iter()
                .find(|r| r.camera == handle.camera() && r.slot == handle.slot());
            match route {
                Some(route) => fill(&mut state, &route, status),
                None => None,
            }
        };

        match ready {
            Some((sink, buffer)) => {
                sink(buffer);
                true
            }
            None => false,
        }
    }

    /// Completes one buffer on every live route. Returns how many were
    /// delivered.
    pub fn tick(&self) -> usize {
        let ready: Vec<_> = {
            let mut state = lock(&self.state);
            let routes = state.routes();
            routes
                .iter()
                .filter_map(|route| fill(&mut state, route, Status::SUCCESS))
                .collect()
        };

        let count = ready.len();
        for (sink, buffer) in ready {
            sink(buffer);
        }
        count
    }

    /// Sends an event buffer to the enabled control port of every live
    /// component of type `kind`. Returns how many were sent.
    pub fn control_event(&self, kind: ComponentKind) -> usize {
        let ready: Vec<_> = {
            let state = lock(&self.state);
            state
                .components
                .iter()
                .filter(|c| c.kind == kind && !c.destroyed)
                .filter_map(|c| c.ports.iter().find(|p| p.kind == PortKind::Control))
                .filter_map(|p| p.sink.clone())
                .filter_map(|sink| {
                    let data = lock(&self.control_pool).pop()?;
                    let buffer = SimBuffer {
                        data,
                        status: Status::SUCCESS,
                        pts: None,
                        free: self.control_pool.clone(),
                    };
                    Some((sink, buffer))
                })
                .collect()
        };

        let count = ready.len();
        for (sink, buffer) in ready {
            sink(buffer);
        }
        count
    }

    /// Control buffers not currently held by a sink.
    pub fn control_buffers_free(&self) -> usize {
        lock(&self.control_pool).len()
    }
}

/// Takes the oldest queued buffer of the route's ISP output and stamps it
/// with the port's next sequence number.
fn fill(
    state: &mut SimState,
    route: &Route,
    status: Status,
) -> Option<(Arc<BufferSink<SimBuffer>>, SimBuffer)> {
    let port = &mut state.components[route.component].ports[route.port];
    let sink = port.sink.clone()?;
    let (mut data, free) = port.queued.pop_front()?;

    port.sequence += 1;
    let sequence = port.sequence;
    if data.len() >= 8 {
        data[..8].copy_from_slice(&sequence.to_le_bytes());
    }

    Some((
        sink,
        SimBuffer {
            data,
            status,
            pts: Some(sequence as i64 * FRAME_INTERVAL_US),
            free,
        },
    ))
}

impl Backend for SimBackend {
    type Component = SimComponent;
    type Port = SimPort;
    type Pool = SimPool;
    type Connection = SimConnection;
    type Buffer = SimBuffer;

    fn create_component(&self, kind: ComponentKind) -> Result<SimComponent, Status> {
        let mut state = lock(&self.state);
        let component = SimComponent {
            id: state.components.len(),
            kind,
        };
        state.record(Event::Create { component })?;
        state.components.push(ComponentState::new(kind));
        Ok(component)
    }

    fn destroy_component(&self, component: SimComponent) -> Result<(), Status> {
        let mut state = lock(&self.state);
        state.component(component)?;
        state.record(Event::Destroy { component })?;
        let target = state.component(component)?;
        target.destroyed = true;
        target.enabled = false;
        Ok(())
    }

    fn enable_component(&self, component: SimComponent) -> Result<(), Status> {
        let mut state = lock(&self.state);
        state.component(component)?;
        state.record(Event::EnableComponent { component })?;
        state.component(component)?.enabled = true;
        Ok(())
    }

    fn port(&self, component: SimComponent, kind: PortKind, index: u32) -> Option<SimPort> {
        let state = lock(&self.state);
        if state.hidden.contains(&(component.kind, kind, index)) {
            return None;
        }
        let target = state.components.get(component.id)?;
        target.position(kind, index)?;
        Some(SimPort {
            component,
            kind,
            index,
        })
    }

    fn camera_info(&self, control: SimPort) -> Result<Vec<SensorLimits>, Status> {
        let mut state = lock(&self.state);
        if control.component.kind != ComponentKind::CameraInfo || control.kind != PortKind::Control
        {
            return Err(Status::EINVAL);
        }
        state.port(control)?;
        state.record(Event::QueryCameraInfo { port: control })?;
        Ok(self.sensors.clone())
    }

    fn set_camera_num(&self, control: SimPort, num: u32) -> Result<(), Status> {
        let mut state = lock(&self.state);
        if control.component.kind != ComponentKind::Camera || num as usize >= self.sensors.len() {
            return Err(Status::EINVAL);
        }
        state.port(control)?;
        state.record(Event::SetCameraNum { port: control, num })?;
        state.component(control.component)?.camera_num = Some(num);
        Ok(())
    }

    fn set_format(&self, port: SimPort, format: &PortFormat) -> Result<(), Status> {
        let mut state = lock(&self.state);
        if format.width == 0 || format.height == 0 {
            return Err(Status::EINVAL);
        }
        state.port(port)?;
        state.record(Event::SetFormat {
            port,
            format: *format,
        })?;
        state.port(port)?.format = Some(*format);
        Ok(())
    }

    fn set_zero_copy(&self, port: SimPort, enable: bool) -> Result<(), Status> {
        let mut state = lock(&self.state);
        state.port(port)?;
        state.record(Event::SetZeroCopy { port, enable })?;
        state.port(port)?.zero_copy = enable;
        Ok(())
    }

    fn buffer_requirements(&self, port: SimPort) -> BufferRequirements {
        let mut state = lock(&self.state);
        let format = match state.port(port) {
            Ok(target) => target.format,
            Err(_) => return BufferRequirements::default(),
        };

        let size = format
            .and_then(|f| f.encoding.frame_size(f.width, f.height))
            .unwrap_or(OPAQUE_BUFFER_SIZE);
        BufferRequirements {
            num: self.buffer_num,
            size,
        }
    }

    fn create_pool(&self, port: SimPort, num: u32, size: u32) -> Result<SimPool, Status> {
        let mut state = lock(&self.state);
        if num == 0 {
            return Err(Status::EINVAL);
        }
        state.port(port)?;
        state.record(Event::CreatePool { port, num, size })?;

        let pool = SimPool(state.pools.len());
        let buffers = (0..num).map(|_| vec![0; size as usize]).collect();
        state.pools.push(Arc::new(Mutex::new(buffers)));
        Ok(pool)
    }

    fn enable_port(&self, port: SimPort, sink: BufferSink<SimBuffer>) -> Result<(), Status> {
        let mut state = lock(&self.state);
        if state.port(port)?.sink.is_some() {
            return Err(Status::EISCONN);
        }
        state.record(Event::EnablePort { port })?;
        state.port(port)?.sink = Some(Arc::new(sink));
        Ok(())
    }

    fn send_buffers(&self, port: SimPort, pool: SimPool) -> Result<usize, Status> {
        let mut state = lock(&self.state);
        if state.port(port)?.sink.is_none() {
            return Err(Status::EINVAL);
        }
        let free = state.pools.get(pool.0).cloned().ok_or(Status::EINVAL)?;
        state.record(Event::SendBuffers { port })?;

        let buffers: Vec<_> = lock(&free).drain(..).collect();
        let count = buffers.len();
        let target = state.port(port)?;
        target
            .queued
            .extend(buffers.into_iter().map(|data| (data, free.clone())));
        Ok(count)
    }

    fn connect(&self, output: SimPort, input: SimPort) -> Result<SimConnection, Status> {
        let mut state = lock(&self.state);
        if output.kind != PortKind::Output || input.kind != PortKind::Input {
            return Err(Status::EINVAL);
        }
        state.port(output)?;
        state.port(input)?;
        if state.connections.iter().any(|c| c.from == output || c.to == input) {
            return Err(Status::EISCONN);
        }
        state.record(Event::Connect {
            from: output,
            to: input,
        })?;

        let connection = SimConnection(state.connections.len());
        state.connections.push(ConnectionState {
            from: output,
            to: input,
            enabled: false,
        });
        Ok(connection)
    }

    fn enable_connection(&self, connection: SimConnection) -> Result<(), Status> {
        let mut state = lock(&self.state);
        let (from, to) = match state.connections.get(connection.0) {
            Some(c) => (c.from, c.to),
            None => return Err(Status::EINVAL),
        };
        state.record(Event::EnableConnection { from, to })?;
        state.connections[connection.0].enabled = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Encoding;

    #[test]
    fn test_port_layout() {
        let sim = SimBackend::default();
        let splitter = sim.create_component(ComponentKind::Splitter).unwrap();
        assert!(sim.port(splitter, PortKind::Input, 0).is_some());
        assert!(sim.port(splitter, PortKind::Input, 1).is_none());
        assert!(sim.port(splitter, PortKind::Output, 3).is_some());
        assert!(sim.port(splitter, PortKind::Output, 4).is_none());

        let isp = sim.create_component(ComponentKind::Isp).unwrap();
        sim.hide_port(ComponentKind::Isp, PortKind::Output, 0);
        assert!(sim.port(isp, PortKind::Output, 0).is_none());
    }

    #[test]
    fn test_send_requires_enabled_port() {
        let sim = SimBackend::default();
        let isp = sim.create_component(ComponentKind::Isp).unwrap();
        let output = sim.port(isp, PortKind::Output, 0).unwrap();
        sim.set_format(output, &PortFormat::new(Encoding::RGB24, 64, 48))
            .unwrap();

        let req = sim.buffer_requirements(output);
        assert_eq!(req, BufferRequirements { num: 3, size: 64 * 48 * 3 });

        let pool = sim.create_pool(output, req.num, req.size).unwrap();
        assert_eq!(sim.send_buffers(output, pool), Err(Status::EINVAL));

        sim.enable_port(output, Box::new(|buffer: SimBuffer| drop(buffer)))
            .unwrap();
        assert_eq!(sim.send_buffers(output, pool), Ok(3));
        assert_eq!(sim.send_buffers(output, pool), Ok(0));
    }

    #[test]
    fn test_fail_when() {
        let sim = SimBackend::default();
        sim.fail_when(Status::ENOMEM, |e| {
            matches!(e, Event::Create { component } if component.kind == ComponentKind::Isp)
        });

        assert!(sim.create_component(ComponentKind::Camera).is_ok());
        assert_eq!(sim.create_component(ComponentKind::Isp), Err(Status::ENOMEM));
        assert_eq!(sim.events().len(), 1);
    }

    #[test]
    fn test_control_event_returns_buffer() {
        let sim = SimBackend::default();
        let camera = sim.create_component(ComponentKind::Camera).unwrap();
        let control = sim.port(camera, PortKind::Control, 0).unwrap();
        sim.enable_port(control, Box::new(|buffer: SimBuffer| drop(buffer)))
            .unwrap();

        assert_eq!(sim.control_event(ComponentKind::Camera), 1);
        assert_eq!(sim.control_buffers_free(), CONTROL_BUFFERS);
    }
}
