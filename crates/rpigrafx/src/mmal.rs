// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! [`Backend`] on the MMAL userland libraries.
//!
//! Component, port, pool and connection handles are raw MMAL pointers. They
//! are never freed by this crate once the pipeline is built, so the handles
//! stay valid for the life of the process.

use crate::{
    backend::{
        Backend, BufferRequirements, BufferSink, ComponentKind, HardwareBuffer, PortFormat,
        PortKind,
    },
    registry::SensorLimits,
    status::Status,
    Error,
};
use rpigrafx_sys::{self as ffi, MmalLibrary};
use std::{
    mem,
    os::raw::c_int,
    panic::{self, AssertUnwindSafe},
    ptr::{self, NonNull},
    slice,
};

macro_rules! handle {
    ($name:ident, $raw:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(NonNull<$raw>);

        // SAFETY: MMAL objects are internally synchronised and may be used
        // from any thread.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            pub fn as_ptr(&self) -> *mut $raw {
                self.0.as_ptr()
            }
        }
    };
}

handle!(MmalComponent, ffi::MMAL_COMPONENT_T);
handle!(MmalPort, ffi::MMAL_PORT_T);
handle!(MmalPool, ffi::MMAL_POOL_T);
handle!(MmalConnection, ffi::MMAL_CONNECTION_T);

type Sink = BufferSink<MmalBuffer>;

/// A buffer header received on a port callback.
pub struct MmalBuffer {
    header: NonNull<ffi::MMAL_BUFFER_HEADER_T>,
    lib: &'static MmalLibrary,
}

// SAFETY: the header is owned by this value until it is released in drop.
unsafe impl Send for MmalBuffer {}

impl MmalBuffer {
    fn header(&self) -> &ffi::MMAL_BUFFER_HEADER_T {
        // SAFETY: the header stays valid until this value releases it.
        unsafe { self.header.as_ref() }
    }
}

impl HardwareBuffer for MmalBuffer {
    fn data(&self) -> &[u8] {
        let header = self.header();
        if header.data.is_null() || header.length == 0 {
            return &[];
        }
        // SAFETY: MMAL guarantees offset + length lies within the payload.
        unsafe {
            slice::from_raw_parts(
                header.data.add(header.offset as usize),
                header.length as usize,
            )
        }
    }

    fn status(&self) -> Status {
        let header = self.header();
        if header.flags & ffi::MMAL_BUFFER_HEADER_FLAG_TRANSMISSION_FAILED != 0 {
            Status::EIO
        } else if header.flags & ffi::MMAL_BUFFER_HEADER_FLAG_CORRUPTED != 0 {
            Status::ECORRUPT
        } else if header.cmd != 0 {
            // An event where a data buffer was expected.
            Status::EINVAL
        } else {
            Status::SUCCESS
        }
    }

    fn pts(&self) -> Option<i64> {
        match self.header().pts {
            ffi::MMAL_TIME_UNKNOWN => None,
            pts => Some(pts),
        }
    }
}

impl Drop for MmalBuffer {
    fn drop(&mut self) {
        // SAFETY: releasing hands the header back to its pool exactly once.
        unsafe { self.lib.mmal_buffer_header_release(self.header.as_ptr()) }
    }
}

/// Port callback shared by every enabled port. The port's userdata holds the
/// boxed sink installed by [`MmalBackend::enable_port`].
unsafe extern "C" fn port_callback(
    port: *mut ffi::MMAL_PORT_T,
    header: *mut ffi::MMAL_BUFFER_HEADER_T,
) {
    let (Some(lib), Some(header)) = (ffi::try_library(), NonNull::new(header)) else {
        return;
    };
    let buffer = MmalBuffer { header, lib };

    // SAFETY: MMAL passes the port the callback was registered on.
    let sink = unsafe { (*port).userdata } as *const Sink;
    if sink.is_null() {
        return;
    }

    // SAFETY: the sink was leaked in enable_port and is never freed while the
    // port is enabled.
    let sink = unsafe { &*sink };
    if panic::catch_unwind(AssertUnwindSafe(|| sink(buffer))).is_err() {
        log::error!("buffer callback panicked");
    }
}

/// The MMAL implementation of [`Backend`].
#[derive(Clone, Copy)]
pub struct MmalBackend {
    lib: &'static MmalLibrary,
}

impl std::fmt::Debug for MmalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmalBackend").finish_non_exhaustive()
    }
}

impl MmalBackend {
    /// Loads the MMAL libraries (once per process) and initialises the host.
    pub fn new() -> Result<Self, Error> {
        let lib = ffi::init()?;
        Ok(MmalBackend { lib })
    }
}

fn component_name(kind: ComponentKind) -> &'static [u8] {
    match kind {
        ComponentKind::CameraInfo => ffi::MMAL_COMPONENT_DEFAULT_CAMERA_INFO,
        ComponentKind::Camera => ffi::MMAL_COMPONENT_DEFAULT_CAMERA,
        ComponentKind::Splitter => ffi::MMAL_COMPONENT_DEFAULT_VIDEO_SPLITTER,
        ComponentKind::Isp => ffi::MMAL_COMPONENT_DEFAULT_ISP,
    }
}

fn port_type(kind: PortKind) -> ffi::MMAL_PORT_TYPE_T {
    match kind {
        PortKind::Control => ffi::MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_CONTROL,
        PortKind::Input => ffi::MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_INPUT,
        PortKind::Output => ffi::MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_OUTPUT,
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

impl Backend for MmalBackend {
    type Component = MmalComponent;
    type Port = MmalPort;
    type Pool = MmalPool;
    type Connection = MmalConnection;
    type Buffer = MmalBuffer;

    fn create_component(&self, kind: ComponentKind) -> Result<MmalComponent, Status> {
        let mut component = ptr::null_mut();
        let name = component_name(kind);
        // SAFETY: name is NUL-terminated and component is a valid out pointer.
        Status(unsafe { self.lib.mmal_component_create(name.as_ptr().cast(), &mut component) })
            .check()?;
        log::debug!("created {}", kind.name());
        NonNull::new(component)
            .map(MmalComponent)
            .ok_or(Status::ENOMEM)
    }

    fn destroy_component(&self, component: MmalComponent) -> Result<(), Status> {
        // SAFETY: the component came from create_component and is destroyed once.
        Status(unsafe { self.lib.mmal_component_destroy(component.as_ptr()) }).check()
    }

    fn enable_component(&self, component: MmalComponent) -> Result<(), Status> {
        // SAFETY: valid component handle.
        Status(unsafe { self.lib.mmal_component_enable(component.as_ptr()) }).check()
    }

    fn port(&self, component: MmalComponent, kind: PortKind, index: u32) -> Option<MmalPort> {
        // SAFETY: valid component handle; MMAL returns NULL for a bad index.
        let port = unsafe {
            self.lib
                .mmal_util_get_port(component.as_ptr(), port_type(kind), index as c_int)
        };
        NonNull::new(port).map(MmalPort)
    }

    fn camera_info(&self, control: MmalPort) -> Result<Vec<SensorLimits>, Status> {
        // SAFETY: the parameter struct is plain data and valid when zeroed.
        let mut info: ffi::MMAL_PARAMETER_CAMERA_INFO_T = unsafe { mem::zeroed() };
        info.hdr.id = ffi::MMAL_PARAMETER_CAMERA_INFO;
        info.hdr.size = mem::size_of::<ffi::MMAL_PARAMETER_CAMERA_INFO_T>() as u32;

        // SAFETY: hdr heads a buffer of hdr.size bytes.
        Status(unsafe { self.lib.mmal_port_parameter_get(control.as_ptr(), &mut info.hdr) })
            .check()?;

        let reported = info.num_cameras as usize;
        if reported > info.cameras.len() {
            log::warn!(
                "camera info reports {} cameras but holds {}",
                reported,
                info.cameras.len()
            );
        }
        Ok(info
            .cameras
            .iter()
            .take(reported)
            .map(|camera| SensorLimits::new(camera.max_width, camera.max_height))
            .collect())
    }

    fn set_camera_num(&self, control: MmalPort, num: u32) -> Result<(), Status> {
        let num = i32::try_from(num).map_err(|_| Status::EINVAL)?;
        // SAFETY: valid port handle.
        Status(unsafe {
            self.lib.mmal_port_parameter_set_int32(
                control.as_ptr(),
                ffi::MMAL_PARAMETER_CAMERA_NUM,
                num,
            )
        })
        .check()
    }

    fn set_format(&self, port: MmalPort, format: &PortFormat) -> Result<(), Status> {
        let width = i32::try_from(format.width).map_err(|_| Status::EINVAL)?;
        let height = i32::try_from(format.height).map_err(|_| Status::EINVAL)?;

        // SAFETY: every MMAL port owns a format with a video-specific part.
        unsafe {
            let es_format = (*port.as_ptr()).format;
            if es_format.is_null() || (*es_format).es.is_null() {
                return Err(Status::EFAULT);
            }
            (*es_format).type_ = ffi::MMAL_ES_TYPE_T_MMAL_ES_TYPE_VIDEO;
            (*es_format).encoding = u32::from(format.encoding);
            (*es_format).encoding_variant = 0;

            let video = &mut (*(*es_format).es).video;
            video.width = align_up(format.width, 32);
            video.height = align_up(format.height, 16);
            video.crop = ffi::MMAL_RECT_T {
                x: 0,
                y: 0,
                width,
                height,
            };

            Status(self.lib.mmal_port_format_commit(port.as_ptr())).check()
        }
    }

    fn set_zero_copy(&self, port: MmalPort, enable: bool) -> Result<(), Status> {
        let value = if enable { ffi::MMAL_TRUE } else { ffi::MMAL_FALSE };
        // SAFETY: valid port handle.
        Status(unsafe {
            self.lib
                .mmal_port_parameter_set_boolean(port.as_ptr(), ffi::MMAL_PARAMETER_ZERO_COPY, value)
        })
        .check()
    }

    fn buffer_requirements(&self, port: MmalPort) -> BufferRequirements {
        // SAFETY: valid port handle.
        let port = unsafe { &*port.as_ptr() };
        BufferRequirements {
            num: port.buffer_num_recommended.max(port.buffer_num_min),
            size: port.buffer_size_recommended.max(port.buffer_size_min),
        }
    }

    fn create_pool(&self, port: MmalPort, num: u32, size: u32) -> Result<MmalPool, Status> {
        // SAFETY: valid port handle, not yet enabled.
        let pool = unsafe {
            (*port.as_ptr()).buffer_num = num;
            (*port.as_ptr()).buffer_size = size;
            self.lib.mmal_port_pool_create(port.as_ptr(), num, size)
        };
        NonNull::new(pool).map(MmalPool).ok_or(Status::ENOMEM)
    }

    fn enable_port(&self, port: MmalPort, sink: BufferSink<MmalBuffer>) -> Result<(), Status> {
        let sink: *mut Sink = Box::into_raw(Box::new(sink));

        // SAFETY: the sink outlives the port; it is only reclaimed if enabling
        // fails and the callback can never run.
        unsafe {
            (*port.as_ptr()).userdata = sink.cast();
            let status = Status(self.lib.mmal_port_enable(port.as_ptr(), Some(port_callback)));
            if let Err(status) = status.check() {
                (*port.as_ptr()).userdata = ptr::null_mut();
                drop(Box::from_raw(sink));
                return Err(status);
            }
        }
        Ok(())
    }

    fn send_buffers(&self, port: MmalPort, pool: MmalPool) -> Result<usize, Status> {
        let mut sent = 0;
        loop {
            // SAFETY: valid pool handle; the queue belongs to the pool.
            let header = unsafe { self.lib.mmal_queue_get((*pool.as_ptr()).queue) };
            if header.is_null() {
                return Ok(sent);
            }
            // SAFETY: the header was just taken from the pool queue.
            let status = Status(unsafe { self.lib.mmal_port_send_buffer(port.as_ptr(), header) });
            if let Err(status) = status.check() {
                unsafe { self.lib.mmal_buffer_header_release(header) };
                return Err(status);
            }
            sent += 1;
        }
    }

    fn connect(&self, output: MmalPort, input: MmalPort) -> Result<MmalConnection, Status> {
        let mut connection = ptr::null_mut();
        // SAFETY: valid port handles and out pointer.
        Status(unsafe {
            self.lib.mmal_connection_create(
                &mut connection,
                output.as_ptr(),
                input.as_ptr(),
                ffi::MMAL_CONNECTION_FLAG_TUNNELLING,
            )
        })
        .check()?;
        NonNull::new(connection)
            .map(MmalConnection)
            .ok_or(Status::ENOMEM)
    }

    fn enable_connection(&self, connection: MmalConnection) -> Result<(), Status> {
        // SAFETY: valid connection handle.
        Status(unsafe { self.lib.mmal_connection_enable(connection.as_ptr()) }).check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registry::CameraRegistry, ClientRequest, Encoding, Rpigrafx};
    use serial_test::serial;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(640, 32), 640);
        assert_eq!(align_up(1080, 16), 1088);
        assert_eq!(align_up(1, 32), 32);
    }

    #[test]
    #[ignore = "requires Raspberry Pi camera hardware"]
    #[serial]
    fn test_discover() {
        let backend = MmalBackend::new().unwrap();
        let mut registry = CameraRegistry::new();
        let count = registry.discover(&backend).unwrap();
        assert!(count >= 1);
        assert!(registry.limits(0).unwrap().max_width > 0);
    }

    #[test]
    #[ignore = "requires Raspberry Pi camera hardware"]
    #[serial]
    fn test_capture() {
        let mut ctx = Rpigrafx::new(MmalBackend::new().unwrap());
        ctx.init().unwrap();
        let handle = ctx
            .register_client(0, ClientRequest::new(640, 480, Encoding::RGB24))
            .unwrap();
        ctx.build().unwrap();

        for _ in 0..5 {
            let frame = ctx.fetch_frame(&handle).unwrap();
            assert!(frame.len() >= 640 * 480 * 3);
        }
    }
}
