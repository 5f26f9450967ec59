// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Camera missing or discovery failed
    CameraNotFound(String),
    /// Pipeline construction failed
    Build(String),
    /// Frame delivery failed
    Frame(String),
    /// General error from the rpigrafx library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::CameraNotFound(msg) => write!(f, "Camera not found: {}", msg),
            CliError::Build(msg) => write!(f, "Pipeline build failed: {}", msg),
            CliError::Frame(msg) => write!(f, "Frame error: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::InvalidArgs(_) => ExitCode::from(2),
            CliError::CameraNotFound(_) => ExitCode::from(3),
            CliError::Build(_) => ExitCode::from(4),
            CliError::Frame(_) => ExitCode::from(5),
            CliError::General(_) => ExitCode::from(1),
        }
    }
}

/// Map rpigrafx::Error to CliError with appropriate exit codes
impl From<rpigrafx::Error> for CliError {
    fn from(err: rpigrafx::Error) -> Self {
        use rpigrafx::{Error, ErrorKind};

        match err.kind() {
            ErrorKind::Validation => match err {
                Error::InvalidCamera { .. } => CliError::CameraNotFound(err.to_string()),
                _ => CliError::InvalidArgs(err.to_string()),
            },
            ErrorKind::Capacity => CliError::InvalidArgs(err.to_string()),
            ErrorKind::Init => CliError::CameraNotFound(err.to_string()),
            ErrorKind::Build => CliError::Build(err.to_string()),
            ErrorKind::Frame => CliError::Frame(err.to_string()),
            ErrorKind::Library => CliError::General(format!("Failed to load library: {}", err)),
            ErrorKind::State => CliError::General(err.to_string()),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpigrafx::{Error, InitError, MAX_CLIENTS};

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::InvalidArgs("test".into()).exit_code(),
            ExitCode::from(2)
        );
        assert_eq!(
            CliError::CameraNotFound("test".into()).exit_code(),
            ExitCode::from(3)
        );
        assert_eq!(CliError::Build("test".into()).exit_code(), ExitCode::from(4));
        assert_eq!(CliError::Frame("test".into()).exit_code(), ExitCode::from(5));
        assert_eq!(
            CliError::General("test".into()).exit_code(),
            ExitCode::from(1)
        );
    }

    #[test]
    fn test_library_error_mapping() {
        let err = CliError::from(Error::InvalidCamera { camera: 2, count: 1 });
        assert!(matches!(err, CliError::CameraNotFound(_)));

        let err = CliError::from(Error::Capacity {
            camera: 0,
            limit: MAX_CLIENTS,
        });
        assert!(matches!(err, CliError::InvalidArgs(_)));

        let err = CliError::from(Error::Init(InitError::NoCameras));
        assert_eq!(err.to_string(), "Camera not found: camera discovery failed: no cameras found");

        assert!(matches!(
            CliError::from(Error::AlreadyBuilt),
            CliError::General(_)
        ));
    }
}
