// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::utils;
use clap::{Args as ClapArgs, ValueEnum};
use rpigrafx::{
    sim::{SimBackend, FRAME_INTERVAL_US},
    Backend, CameraPort, ClientRequest, FrameHandle, MmalBackend, Rpigrafx, MAX_CLIENTS,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Port {
    Preview,
    Video,
    Capture,
}

impl From<Port> for CameraPort {
    fn from(port: Port) -> Self {
        match port {
            Port::Preview => CameraPort::Preview,
            Port::Video => CameraPort::Video,
            Port::Capture => CameraPort::Capture,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Camera id
    #[arg(short, long, default_value = "0")]
    camera: usize,

    /// Camera output feeding the splitter
    #[arg(long, value_enum, default_value = "preview")]
    port: Port,

    /// Resolution in WxH format
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Pixel encoding name or FOURCC
    #[arg(long, default_value = "RGB3")]
    encoding: String,

    /// Number of frames to fetch from each client
    #[arg(short = 'n', long, default_value = "20")]
    frames: u64,

    /// Number of clients with the same request on the camera
    #[arg(long, default_value = "1")]
    clients: usize,

    /// Copy ISP output buffers instead of sharing them
    #[arg(long)]
    no_zero_copy: bool,
}

pub fn execute(args: Args, json: bool, simulate: bool) -> Result<(), CliError> {
    log::debug!("Capture parameters: {:?}", args);

    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let encoding = utils::parse_encoding(&args.encoding)?;
    if args.clients == 0 || args.clients > MAX_CLIENTS {
        return Err(CliError::InvalidArgs(format!(
            "--clients must be within 1..={}: {}",
            MAX_CLIENTS, args.clients
        )));
    }

    let request = ClientRequest::new(width, height, encoding).with_zero_copy(!args.no_zero_copy);
    let term = utils::install_signal_handler()?;

    let mut metrics = if simulate {
        let mut ctx = Rpigrafx::new(SimBackend::default());
        let handles = prepare(&mut ctx, &args, request)?;

        let sim = ctx.backend();
        let stop = AtomicBool::new(false);
        let interval = Duration::from_micros(FRAME_INTERVAL_US as u64);
        let result = thread::scope(|scope| {
            scope.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    sim.tick();
                    thread::sleep(interval);
                }
            });
            let result = capture(&ctx, &handles, args.frames, &term);
            stop.store(true, Ordering::Relaxed);
            result
        });
        ctx.finalize();
        result?
    } else {
        let mut ctx = Rpigrafx::new(MmalBackend::new()?);
        let handles = prepare(&mut ctx, &args, request)?;
        let result = capture(&ctx, &handles, args.frames, &term);
        ctx.finalize();
        result?
    };

    if json {
        metrics
            .print_json()
            .map_err(|e| CliError::General(format!("JSON serialization failed: {}", e)))?;
    } else {
        println!(
            "Camera {} ({} port), {} client(s) at {}x{} {}",
            args.camera, CameraPort::from(args.port), args.clients, width, height, encoding
        );
        metrics.print_text();
    }

    Ok(())
}

/// Registers the clients and builds the pipeline.
fn prepare<B: Backend>(
    ctx: &mut Rpigrafx<B>,
    args: &Args,
    request: ClientRequest,
) -> Result<Vec<FrameHandle>, CliError> {
    ctx.init()?;
    ctx.configure_camera_port(args.camera, args.port.into())?;

    let handles = (0..args.clients)
        .map(|_| ctx.register_client(args.camera, request))
        .collect::<Result<Vec<_>, _>>()?;

    ctx.build()?;
    if let Some((width, height)) = ctx.negotiated_size(args.camera) {
        log::info!("camera {} negotiated {}x{}", args.camera, width, height);
    }
    Ok(handles)
}

/// Fetches `frames` frames from each handle in turn until done or `term` is
/// raised.
fn capture<B: Backend>(
    ctx: &Rpigrafx<B>,
    handles: &[FrameHandle],
    frames: u64,
    term: &AtomicBool,
) -> Result<MetricsCollector, CliError> {
    let mut metrics = MetricsCollector::new();

    'rounds: for round in 0..frames {
        for handle in handles {
            if term.load(Ordering::Relaxed) {
                log::info!("Interrupted after {} rounds", round);
                break 'rounds;
            }

            let start = Instant::now();
            let frame = ctx.fetch_frame(handle)?;
            let wait_us = start.elapsed().as_micros() as u64;
            log::trace!("{}: {} bytes pts {:?}", handle, frame.len(), frame.pts());
            metrics.record_frame(wait_us, frame.len());
        }
    }

    for handle in handles {
        if let Some(stats) = ctx.frame_stats(handle) {
            metrics.record_dropped(stats.dropped);
        }
    }
    Ok(metrics)
}
