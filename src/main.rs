use std::{env, process::ExitCode, time::Instant};

use log::{debug, error, info};
use wgpu_fractal::{
    escape::is_escaped, screen, ComputeDispatcher, EscapeImage, FractalConfiguration, Settings,
    Viewport,
};

const RAMP: &[u8] = b".:-=+*#%@";

fn parse_size(argument: &str) -> Option<screen::Size> {
    let (width, height) = argument.split_once('x')?;
    let size = screen::Size::new(width.parse().ok()?, height.parse().ok()?);
    (size.width > 0 && size.height > 0).then_some(size)
}

/// One character per pixel, escape values bucketed against the iteration cap.
fn preview(image: &EscapeImage) -> String {
    let cap = f64::from(image.iteration_cap.max(1));
    let mut text = String::new();
    for row in image.values.chunks(image.size.width as usize) {
        for value in row {
            text.push(if is_escaped(*value) {
                let bucket = ((value / cap).sqrt() * (RAMP.len() - 1) as f64) as usize;
                RAMP[bucket.min(RAMP.len() - 1)] as char
            } else {
                ' '
            });
        }
        text.push('\n');
    }
    text
}

fn main() -> ExitCode {
    env_logger::init();

    let size = match env::args().nth(1) {
        None => screen::Size::new(80, 40),
        Some(argument) => match parse_size(&argument) {
            Some(size) => size,
            None => {
                error!("expected WIDTHxHEIGHT, got {:?}", argument);
                return ExitCode::FAILURE;
            }
        },
    };

    let settings = Settings::from_env();
    debug!("{:?}", settings);
    let dispatcher = ComputeDispatcher::from_settings(&settings);

    let config = FractalConfiguration::default().with_smoothing(false);
    let start = Instant::now();
    match dispatcher.compute_blocking(&config, &Viewport::default(), size) {
        Ok(image) => {
            if let Some(backend) = dispatcher.active_backend() {
                info!(
                    "rendered {}x{} on {} in {:?}",
                    size.width,
                    size.height,
                    backend,
                    start.elapsed()
                );
            }
            print!("{}", preview(&image));
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{}", error);
            ExitCode::FAILURE
        }
    }
}
