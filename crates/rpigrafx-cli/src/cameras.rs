// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Camera discovery listing.

use crate::error::CliError;
use clap::Args as ClapArgs;
use rpigrafx::{sim::SimBackend, Backend, MmalBackend, Rpigrafx};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {}

#[derive(Debug, Serialize)]
struct CamerasOutput {
    cameras: Vec<CameraInfo>,
}

#[derive(Debug, Serialize)]
struct CameraInfo {
    id: usize,
    max_width: u32,
    max_height: u32,
}

pub fn execute(_args: Args, json: bool, simulate: bool) -> Result<(), CliError> {
    let cameras = if simulate {
        discover(Rpigrafx::new(SimBackend::default()))?
    } else {
        discover(Rpigrafx::new(MmalBackend::new()?))?
    };

    if json {
        let output = CamerasOutput { cameras };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
        println!("{}", text);
    } else {
        println!("{} camera(s)", cameras.len());
        for camera in &cameras {
            println!(
                "  camera {}: {}x{} native",
                camera.id, camera.max_width, camera.max_height
            );
        }
    }

    Ok(())
}

fn discover<B: Backend>(mut ctx: Rpigrafx<B>) -> Result<Vec<CameraInfo>, CliError> {
    ctx.init()?;

    let cameras = (0..ctx.camera_count())
        .map(|id| {
            let limits = ctx.camera_limits(id)?;
            Ok(CameraInfo {
                id,
                max_width: limits.max_width,
                max_height: limits.max_height,
            })
        })
        .collect::<Result<Vec<_>, rpigrafx::Error>>();

    ctx.finalize();
    Ok(cameras?)
}
