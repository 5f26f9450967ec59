// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

// Hand-maintained subset of the MMAL userland headers (interface/mmal/*.h)
// covering the component, port, buffer, pool and connection APIs.

use std::os::raw::{c_char, c_int, c_void};

pub type MMAL_STATUS_T = u32;
pub const MMAL_STATUS_T_MMAL_SUCCESS: MMAL_STATUS_T = 0;
pub const MMAL_STATUS_T_MMAL_ENOMEM: MMAL_STATUS_T = 1;
pub const MMAL_STATUS_T_MMAL_ENOSPC: MMAL_STATUS_T = 2;
pub const MMAL_STATUS_T_MMAL_EINVAL: MMAL_STATUS_T = 3;
pub const MMAL_STATUS_T_MMAL_ENOSYS: MMAL_STATUS_T = 4;
pub const MMAL_STATUS_T_MMAL_ENOENT: MMAL_STATUS_T = 5;
pub const MMAL_STATUS_T_MMAL_ENXIO: MMAL_STATUS_T = 6;
pub const MMAL_STATUS_T_MMAL_EIO: MMAL_STATUS_T = 7;
pub const MMAL_STATUS_T_MMAL_ESPIPE: MMAL_STATUS_T = 8;
pub const MMAL_STATUS_T_MMAL_ECORRUPT: MMAL_STATUS_T = 9;
pub const MMAL_STATUS_T_MMAL_ENOTREADY: MMAL_STATUS_T = 10;
pub const MMAL_STATUS_T_MMAL_ECONFIG: MMAL_STATUS_T = 11;
pub const MMAL_STATUS_T_MMAL_EISCONN: MMAL_STATUS_T = 12;
pub const MMAL_STATUS_T_MMAL_ENOTCONN: MMAL_STATUS_T = 13;
pub const MMAL_STATUS_T_MMAL_EAGAIN: MMAL_STATUS_T = 14;
pub const MMAL_STATUS_T_MMAL_EFAULT: MMAL_STATUS_T = 15;

pub type MMAL_BOOL_T = i32;
pub const MMAL_FALSE: MMAL_BOOL_T = 0;
pub const MMAL_TRUE: MMAL_BOOL_T = 1;

pub type MMAL_FOURCC_T = u32;

pub type MMAL_PORT_TYPE_T = u32;
pub const MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_CONTROL: MMAL_PORT_TYPE_T = 1;
pub const MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_INPUT: MMAL_PORT_TYPE_T = 2;
pub const MMAL_PORT_TYPE_T_MMAL_PORT_TYPE_OUTPUT: MMAL_PORT_TYPE_T = 3;

pub type MMAL_ES_TYPE_T = u32;
pub const MMAL_ES_TYPE_T_MMAL_ES_TYPE_VIDEO: MMAL_ES_TYPE_T = 3;

pub const MMAL_PARAMETER_GROUP_COMMON: u32 = 0;
pub const MMAL_PARAMETER_GROUP_CAMERA: u32 = 1 << 16;
pub const MMAL_PARAMETER_ZERO_COPY: u32 = MMAL_PARAMETER_GROUP_COMMON + 4;
pub const MMAL_PARAMETER_CAMERA_NUM: u32 = MMAL_PARAMETER_GROUP_CAMERA + 0x10;
pub const MMAL_PARAMETER_CAMERA_INFO: u32 = MMAL_PARAMETER_GROUP_CAMERA + 0x1c;

pub const MMAL_PARAMETER_CAMERA_INFO_MAX_CAMERAS: usize = 4;
pub const MMAL_PARAMETER_CAMERA_INFO_MAX_FLASHES: usize = 2;
pub const MMAL_PARAMETER_CAMERA_INFO_MAX_STR_LEN: usize = 16;

pub const MMAL_CONNECTION_FLAG_TUNNELLING: u32 = 0x1;

/// Value of `pts`/`dts` when the producer set no timestamp.
pub const MMAL_TIME_UNKNOWN: i64 = i64::MIN;

pub const MMAL_BUFFER_HEADER_FLAG_CORRUPTED: u32 = 1 << 9;
pub const MMAL_BUFFER_HEADER_FLAG_TRANSMISSION_FAILED: u32 = 1 << 10;

pub const MMAL_COMPONENT_DEFAULT_CAMERA_INFO: &[u8] = b"vc.camera_info\0";
pub const MMAL_COMPONENT_DEFAULT_CAMERA: &[u8] = b"vc.ril.camera\0";
pub const MMAL_COMPONENT_DEFAULT_VIDEO_SPLITTER: &[u8] = b"vc.ril.video_splitter\0";
pub const MMAL_COMPONENT_DEFAULT_ISP: &[u8] = b"vc.ril.isp\0";

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_RECT_T {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_RATIONAL_T {
    pub num: i32,
    pub den: i32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_VIDEO_FORMAT_T {
    pub width: u32,
    pub height: u32,
    pub crop: MMAL_RECT_T,
    pub frame_rate: MMAL_RATIONAL_T,
    pub par: MMAL_RATIONAL_T,
    pub color_space: MMAL_FOURCC_T,
}

/// `MMAL_ES_SPECIFIC_FORMAT_T` is a union whose video member sits at offset 0;
/// only that member is ever accessed.
#[repr(C)]
pub struct MMAL_ES_SPECIFIC_FORMAT_T {
    pub video: MMAL_VIDEO_FORMAT_T,
}

#[repr(C)]
pub struct MMAL_ES_FORMAT_T {
    pub type_: MMAL_ES_TYPE_T,
    pub encoding: MMAL_FOURCC_T,
    pub encoding_variant: MMAL_FOURCC_T,
    pub es: *mut MMAL_ES_SPECIFIC_FORMAT_T,
    pub bitrate: u32,
    pub flags: u32,
    pub extradata_size: u32,
    pub extradata: *mut u8,
}

#[repr(C)]
pub struct MMAL_PORT_PRIVATE_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_PORT_USERDATA_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_COMPONENT_PRIVATE_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_COMPONENT_USERDATA_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_BUFFER_HEADER_PRIVATE_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_BUFFER_HEADER_TYPE_SPECIFIC_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_QUEUE_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_CONNECTION_T {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct MMAL_PORT_T {
    pub priv_: *mut MMAL_PORT_PRIVATE_T,
    pub name: *const c_char,
    pub type_: MMAL_PORT_TYPE_T,
    pub index: u16,
    pub index_all: u16,
    pub is_enabled: u32,
    pub format: *mut MMAL_ES_FORMAT_T,
    pub buffer_num_min: u32,
    pub buffer_size_min: u32,
    pub buffer_alignment_min: u32,
    pub buffer_num_recommended: u32,
    pub buffer_size_recommended: u32,
    pub buffer_num: u32,
    pub buffer_size: u32,
    pub component: *mut MMAL_COMPONENT_T,
    pub userdata: *mut MMAL_PORT_USERDATA_T,
    pub capabilities: u32,
}

#[repr(C)]
pub struct MMAL_COMPONENT_T {
    pub priv_: *mut MMAL_COMPONENT_PRIVATE_T,
    pub userdata: *mut MMAL_COMPONENT_USERDATA_T,
    pub name: *const c_char,
    pub is_enabled: u32,
    pub control: *mut MMAL_PORT_T,
    pub input_num: u32,
    pub input: *mut *mut MMAL_PORT_T,
    pub output_num: u32,
    pub output: *mut *mut MMAL_PORT_T,
    pub clock_num: u32,
    pub clock: *mut *mut MMAL_PORT_T,
    pub port_num: u32,
    pub port: *mut *mut MMAL_PORT_T,
    pub id: u32,
}

#[repr(C)]
pub struct MMAL_BUFFER_HEADER_T {
    pub next: *mut MMAL_BUFFER_HEADER_T,
    pub priv_: *mut MMAL_BUFFER_HEADER_PRIVATE_T,
    pub cmd: u32,
    pub data: *mut u8,
    pub alloc_size: u32,
    pub length: u32,
    pub offset: u32,
    pub flags: u32,
    pub pts: i64,
    pub dts: i64,
    pub type_: *mut MMAL_BUFFER_HEADER_TYPE_SPECIFIC_T,
    pub user_data: *mut c_void,
}

#[repr(C)]
pub struct MMAL_POOL_T {
    pub queue: *mut MMAL_QUEUE_T,
    pub headers_num: u32,
    pub header: *mut *mut MMAL_BUFFER_HEADER_T,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_PARAMETER_HEADER_T {
    pub id: u32,
    pub size: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_PARAMETER_CAMERA_INFO_CAMERA_T {
    pub port_id: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub lens_present: MMAL_BOOL_T,
    pub camera_name: [c_char; MMAL_PARAMETER_CAMERA_INFO_MAX_STR_LEN],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_PARAMETER_CAMERA_INFO_FLASH_T {
    pub flash_type: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct MMAL_PARAMETER_CAMERA_INFO_T {
    pub hdr: MMAL_PARAMETER_HEADER_T,
    pub num_cameras: u32,
    pub num_flashes: u32,
    pub cameras: [MMAL_PARAMETER_CAMERA_INFO_CAMERA_T; MMAL_PARAMETER_CAMERA_INFO_MAX_CAMERAS],
    pub flashes: [MMAL_PARAMETER_CAMERA_INFO_FLASH_T; MMAL_PARAMETER_CAMERA_INFO_MAX_FLASHES],
}

pub type MMAL_PORT_BH_CB_T =
    Option<unsafe extern "C" fn(port: *mut MMAL_PORT_T, buffer: *mut MMAL_BUFFER_HEADER_T)>;

/// Build a FourCC the same way `MMAL_FOURCC(a,b,c,d)` does.
pub const fn MMAL_FOURCC(code: &[u8; 4]) -> MMAL_FOURCC_T {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

pub const MMAL_ENCODING_OPAQUE: MMAL_FOURCC_T = MMAL_FOURCC(b"OPQV");
pub const MMAL_ENCODING_I420: MMAL_FOURCC_T = MMAL_FOURCC(b"I420");
pub const MMAL_ENCODING_RGB24: MMAL_FOURCC_T = MMAL_FOURCC(b"RGB3");
pub const MMAL_ENCODING_BGR24: MMAL_FOURCC_T = MMAL_FOURCC(b"BGR3");
pub const MMAL_ENCODING_RGBA: MMAL_FOURCC_T = MMAL_FOURCC(b"RGBA");

/// Function table resolved from the MMAL userland libraries.
///
/// The libraries are kept open for the lifetime of this value so every
/// resolved function pointer stays valid.
pub struct MmalLibrary {
    _vcos: ::libloading::Library,
    _bcm_host: ::libloading::Library,
    _core: ::libloading::Library,
    _util: ::libloading::Library,
    _vc_client: ::libloading::Library,

    bcm_host_init: unsafe extern "C" fn(),

    mmal_component_create:
        unsafe extern "C" fn(name: *const c_char, component: *mut *mut MMAL_COMPONENT_T) -> MMAL_STATUS_T,
    mmal_component_destroy: unsafe extern "C" fn(component: *mut MMAL_COMPONENT_T) -> MMAL_STATUS_T,
    mmal_component_enable: unsafe extern "C" fn(component: *mut MMAL_COMPONENT_T) -> MMAL_STATUS_T,
    mmal_port_enable:
        unsafe extern "C" fn(port: *mut MMAL_PORT_T, cb: MMAL_PORT_BH_CB_T) -> MMAL_STATUS_T,
    mmal_port_format_commit: unsafe extern "C" fn(port: *mut MMAL_PORT_T) -> MMAL_STATUS_T,
    mmal_port_parameter_get:
        unsafe extern "C" fn(port: *mut MMAL_PORT_T, param: *mut MMAL_PARAMETER_HEADER_T) -> MMAL_STATUS_T,
    mmal_port_send_buffer:
        unsafe extern "C" fn(port: *mut MMAL_PORT_T, buffer: *mut MMAL_BUFFER_HEADER_T) -> MMAL_STATUS_T,
    mmal_port_pool_create:
        unsafe extern "C" fn(port: *mut MMAL_PORT_T, headers: u32, payload_size: u32) -> *mut MMAL_POOL_T,
    mmal_buffer_header_release: unsafe extern "C" fn(header: *mut MMAL_BUFFER_HEADER_T),
    mmal_queue_get: unsafe extern "C" fn(queue: *mut MMAL_QUEUE_T) -> *mut MMAL_BUFFER_HEADER_T,

    mmal_util_get_port: unsafe extern "C" fn(
        component: *mut MMAL_COMPONENT_T,
        type_: MMAL_PORT_TYPE_T,
        index: c_int,
    ) -> *mut MMAL_PORT_T,
    mmal_port_parameter_set_boolean:
        unsafe extern "C" fn(port: *mut MMAL_PORT_T, id: u32, value: MMAL_BOOL_T) -> MMAL_STATUS_T,
    mmal_port_parameter_set_int32:
        unsafe extern "C" fn(port: *mut MMAL_PORT_T, id: u32, value: i32) -> MMAL_STATUS_T,
    mmal_connection_create: unsafe extern "C" fn(
        connection: *mut *mut MMAL_CONNECTION_T,
        out: *mut MMAL_PORT_T,
        in_: *mut MMAL_PORT_T,
        flags: u32,
    ) -> MMAL_STATUS_T,
    mmal_connection_enable: unsafe extern "C" fn(connection: *mut MMAL_CONNECTION_T) -> MMAL_STATUS_T,
}

unsafe fn open_library(
    dir: Option<&::std::path::Path>,
    name: &str,
) -> Result<::libloading::Library, ::libloading::Error> {
    use ::libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};

    let path = match dir {
        Some(dir) => dir.join(name).into_os_string(),
        None => name.into(),
    };
    // Components register themselves with mmal_core from library constructors,
    // so every library must share one global symbol namespace.
    Ok(Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL)?.into())
}

macro_rules! resolve {
    ($lib:expr, $name:ident) => {
        *$lib.get(concat!(stringify!($name), "\0").as_bytes())?
    };
}

impl MmalLibrary {
    /// Opens the MMAL libraries, optionally from `dir`, and resolves every
    /// function used by this crate.
    pub unsafe fn new(dir: Option<&::std::path::Path>) -> Result<Self, ::libloading::Error> {
        let vcos = open_library(dir, "libvcos.so")?;
        let bcm_host = open_library(dir, "libbcm_host.so")?;
        let core = open_library(dir, "libmmal_core.so")?;
        let util = open_library(dir, "libmmal_util.so")?;
        let vc_client = open_library(dir, "libmmal_vc_client.so")?;

        Ok(MmalLibrary {
            bcm_host_init: resolve!(bcm_host, bcm_host_init),
            mmal_component_create: resolve!(core, mmal_component_create),
            mmal_component_destroy: resolve!(core, mmal_component_destroy),
            mmal_component_enable: resolve!(core, mmal_component_enable),
            mmal_port_enable: resolve!(core, mmal_port_enable),
            mmal_port_format_commit: resolve!(core, mmal_port_format_commit),
            mmal_port_parameter_get: resolve!(core, mmal_port_parameter_get),
            mmal_port_send_buffer: resolve!(core, mmal_port_send_buffer),
            mmal_port_pool_create: resolve!(core, mmal_port_pool_create),
            mmal_buffer_header_release: resolve!(core, mmal_buffer_header_release),
            mmal_queue_get: resolve!(core, mmal_queue_get),
            mmal_util_get_port: resolve!(util, mmal_util_get_port),
            mmal_port_parameter_set_boolean: resolve!(util, mmal_port_parameter_set_boolean),
            mmal_port_parameter_set_int32: resolve!(util, mmal_port_parameter_set_int32),
            mmal_connection_create: resolve!(util, mmal_connection_create),
            mmal_connection_enable: resolve!(util, mmal_connection_enable),
            _vcos: vcos,
            _bcm_host: bcm_host,
            _core: core,
            _util: util,
            _vc_client: vc_client,
        })
    }

    pub unsafe fn bcm_host_init(&self) {
        (self.bcm_host_init)()
    }

    pub unsafe fn mmal_component_create(
        &self,
        name: *const c_char,
        component: *mut *mut MMAL_COMPONENT_T,
    ) -> MMAL_STATUS_T {
        (self.mmal_component_create)(name, component)
    }

    pub unsafe fn mmal_component_destroy(&self, component: *mut MMAL_COMPONENT_T) -> MMAL_STATUS_T {
        (self.mmal_component_destroy)(component)
    }

    pub unsafe fn mmal_component_enable(&self, component: *mut MMAL_COMPONENT_T) -> MMAL_STATUS_T {
        (self.mmal_component_enable)(component)
    }

    pub unsafe fn mmal_port_enable(&self, port: *mut MMAL_PORT_T, cb: MMAL_PORT_BH_CB_T) -> MMAL_STATUS_T {
        (self.mmal_port_enable)(port, cb)
    }

    pub unsafe fn mmal_port_format_commit(&self, port: *mut MMAL_PORT_T) -> MMAL_STATUS_T {
        (self.mmal_port_format_commit)(port)
    }

    pub unsafe fn mmal_port_parameter_get(
        &self,
        port: *mut MMAL_PORT_T,
        param: *mut MMAL_PARAMETER_HEADER_T,
    ) -> MMAL_STATUS_T {
        (self.mmal_port_parameter_get)(port, param)
    }

    pub unsafe fn mmal_port_send_buffer(
        &self,
        port: *mut MMAL_PORT_T,
        buffer: *mut MMAL_BUFFER_HEADER_T,
    ) -> MMAL_STATUS_T {
        (self.mmal_port_send_buffer)(port, buffer)
    }

    pub unsafe fn mmal_port_pool_create(
        &self,
        port: *mut MMAL_PORT_T,
        headers: u32,
        payload_size: u32,
    ) -> *mut MMAL_POOL_T {
        (self.mmal_port_pool_create)(port, headers, payload_size)
    }

    pub unsafe fn mmal_buffer_header_release(&self, header: *mut MMAL_BUFFER_HEADER_T) {
        (self.mmal_buffer_header_release)(header)
    }

    pub unsafe fn mmal_queue_get(&self, queue: *mut MMAL_QUEUE_T) -> *mut MMAL_BUFFER_HEADER_T {
        (self.mmal_queue_get)(queue)
    }

    pub unsafe fn mmal_util_get_port(
        &self,
        component: *mut MMAL_COMPONENT_T,
        type_: MMAL_PORT_TYPE_T,
        index: c_int,
    ) -> *mut MMAL_PORT_T {
        (self.mmal_util_get_port)(component, type_, index)
    }

    pub unsafe fn mmal_port_parameter_set_boolean(
        &self,
        port: *mut MMAL_PORT_T,
        id: u32,
        value: MMAL_BOOL_T,
    ) -> MMAL_STATUS_T {
        (self.mmal_port_parameter_set_boolean)(port, id, value)
    }

    pub unsafe fn mmal_port_parameter_set_int32(
        &self,
        port: *mut MMAL_PORT_T,
        id: u32,
        value: i32,
    ) -> MMAL_STATUS_T {
        (self.mmal_port_parameter_set_int32)(port, id, value)
    }

    pub unsafe fn mmal_connection_create(
        &self,
        connection: *mut *mut MMAL_CONNECTION_T,
        out: *mut MMAL_PORT_T,
        in_: *mut MMAL_PORT_T,
        flags: u32,
    ) -> MMAL_STATUS_T {
        (self.mmal_connection_create)(connection, out, in_, flags)
    }

    pub unsafe fn mmal_connection_enable(&self, connection: *mut MMAL_CONNECTION_T) -> MMAL_STATUS_T {
        (self.mmal_connection_enable)(connection)
    }
}
