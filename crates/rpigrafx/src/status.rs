// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

use rpigrafx_sys as ffi;
use std::fmt;

/// Status code returned by every hardware call (`MMAL_STATUS_T`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u32);

impl Status {
    pub const SUCCESS: Status = Status(ffi::MMAL_STATUS_T_MMAL_SUCCESS);
    pub const ENOMEM: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENOMEM);
    pub const ENOSPC: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENOSPC);
    pub const EINVAL: Status = Status(ffi::MMAL_STATUS_T_MMAL_EINVAL);
    pub const ENOSYS: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENOSYS);
    pub const ENOENT: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENOENT);
    pub const ENXIO: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENXIO);
    pub const EIO: Status = Status(ffi::MMAL_STATUS_T_MMAL_EIO);
    pub const ESPIPE: Status = Status(ffi::MMAL_STATUS_T_MMAL_ESPIPE);
    pub const ECORRUPT: Status = Status(ffi::MMAL_STATUS_T_MMAL_ECORRUPT);
    pub const ENOTREADY: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENOTREADY);
    pub const ECONFIG: Status = Status(ffi::MMAL_STATUS_T_MMAL_ECONFIG);
    pub const EISCONN: Status = Status(ffi::MMAL_STATUS_T_MMAL_EISCONN);
    pub const ENOTCONN: Status = Status(ffi::MMAL_STATUS_T_MMAL_ENOTCONN);
    pub const EAGAIN: Status = Status(ffi::MMAL_STATUS_T_MMAL_EAGAIN);
    pub const EFAULT: Status = Status(ffi::MMAL_STATUS_T_MMAL_EFAULT);

    pub fn is_success(self) -> bool {
        self == Status::SUCCESS
    }

    /// Converts the raw code into a `Result`, keeping failures as `Err`.
    pub fn check(self) -> Result<(), Status> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::SUCCESS => "MMAL_SUCCESS",
            Status::ENOMEM => "MMAL_ENOMEM",
            Status::ENOSPC => "MMAL_ENOSPC",
            Status::EINVAL => "MMAL_EINVAL",
            Status::ENOSYS => "MMAL_ENOSYS",
            Status::ENOENT => "MMAL_ENOENT",
            Status::ENXIO => "MMAL_ENXIO",
            Status::EIO => "MMAL_EIO",
            Status::ESPIPE => "MMAL_ESPIPE",
            Status::ECORRUPT => "MMAL_ECORRUPT",
            Status::ENOTREADY => "MMAL_ENOTREADY",
            Status::ECONFIG => "MMAL_ECONFIG",
            Status::EISCONN => "MMAL_EISCONN",
            Status::ENOTCONN => "MMAL_ENOTCONN",
            Status::EAGAIN => "MMAL_EAGAIN",
            Status::EFAULT => "MMAL_EFAULT",
            _ => "MMAL_UNKNOWN",
        }
    }
}

impl From<u32> for Status {
    fn from(val: u32) -> Status {
        Status(val)
    }
}

impl From<Status> for u32 {
    fn from(val: Status) -> Self {
        val.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08x})", self.name(), self.0)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Status").field(&self.name()).finish()
    }
}

impl std::error::Error for Status {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert_eq!(Status::SUCCESS.check(), Ok(()));
        assert_eq!(Status::ENOMEM.check(), Err(Status::ENOMEM));
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::EINVAL.to_string(), "MMAL_EINVAL (0x00000003)");
        assert_eq!(Status(0x42).to_string(), "MMAL_UNKNOWN (0x00000042)");
    }
}
