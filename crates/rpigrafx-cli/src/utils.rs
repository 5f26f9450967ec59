// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use rpigrafx::Encoding;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse an encoding name (`rgb24`, `i420`, ...) or a literal FOURCC
pub fn parse_encoding(s: &str) -> Result<Encoding, CliError> {
    s.parse::<Encoding>()
        .map_err(|e| CliError::InvalidArgs(e.to_string()))
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
/// Check this flag periodically in your main loop to exit gracefully.
///
/// A second Ctrl+C while the flag is already set terminates the process with
/// exit code 1, which is the only way out of a `fetch_frame` that never
/// receives a buffer.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    // Registered first so it sees the flag before this signal sets it.
    flag::register_conditional_shutdown(SIGINT, 1, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;
    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_valid() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("640x480").unwrap(), (640, 480));
        assert_eq!(parse_resolution("3280x2464").unwrap(), (3280, 2464));

        // Alternative separator
        assert_eq!(parse_resolution("1920*1080").unwrap(), (1920, 1080));
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("1920x").is_err());
        assert!(parse_resolution("x1080").is_err());
        assert!(parse_resolution("1920x1080x60").is_err());
        assert!(parse_resolution("widthxheight").is_err());
        assert!(parse_resolution("0x0").is_err());
        assert!(parse_resolution("-1920x1080").is_err());
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!(parse_encoding("RGB3").unwrap(), Encoding::RGB24);
        assert_eq!(parse_encoding("rgb24").unwrap(), Encoding::RGB24);
        assert_eq!(parse_encoding("i420").unwrap(), Encoding::I420);
        assert!(matches!(
            parse_encoding("RGB"),
            Err(CliError::InvalidArgs(_))
        ));
    }
}
