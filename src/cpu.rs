/*!
Multi-threaded CPU engine.

The image is split into `P` contiguous column ranges, one per worker. Each
worker fills a private column-major block for its range, so workers never
share an output index; the blocks are scattered into the row-major result
after the join.

Buddha mode writes wherever trajectories land, so every worker gets its own
full-size hit plane instead, the way the buddhabrot renderers keep one plane
per thread. The planes are summed after the join.
*/

use std::{ops::Range, time::Instant};

use log::debug;

use crate::{
    backend::{validate_request, Backend, BackendKind},
    cancel::CancelToken,
    config::{FractalConfiguration, OutputMode},
    error::EngineError,
    escape::{allocate, EscapeImage},
    iteration::PixelKernel,
    screen,
    viewport::Viewport,
};

pub struct CpuEngine {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl CpuEngine {
    /// An engine with one worker per logical CPU.
    pub fn new() -> Result<Self, EngineError> {
        Self::with_workers(num_cpus::get())
    }

    pub fn with_workers(workers: usize) -> Result<Self, EngineError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("fractal-cpu-{}", index))
            .build()
            .map_err(|error| EngineError::BackendUnavailable(error.to_string()))?;
        debug!("CPU engine with {} workers", workers);
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn compute(
        &self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError> {
        validate_request(config, viewport, size)?;
        cancel.check()?;

        let start = Instant::now();
        let kernel = PixelKernel::new(config, viewport, size);
        let values = match kernel.mode() {
            OutputMode::Buddha => self.accumulate(&kernel, cancel)?,
            _ => self.escape_values(&kernel, cancel)?,
        };
        debug!(
            "CPU {} / {} {}x{} took {:?}",
            config.variant(),
            kernel.mode(),
            size.width,
            size.height,
            start.elapsed()
        );

        Ok(EscapeImage {
            values,
            size,
            iteration_cap: config.iteration_cap(),
        })
    }

    fn escape_values(
        &self,
        kernel: &PixelKernel,
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, EngineError> {
        let size = kernel.size();
        let height = size.height as usize;
        let mut columns = allocate(size, 0.0)?;

        self.pool.scope(|scope| {
            let mut rest = columns.as_mut_slice();
            for id in 0..self.workers {
                let range = column_range(id, self.workers, size.width);
                let (block, tail) =
                    std::mem::take(&mut rest).split_at_mut(range.len() * height);
                rest = tail;
                scope.spawn(move |_| {
                    for (offset, x) in range.enumerate() {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let column = &mut block[offset * height..(offset + 1) * height];
                        for (y, value) in column.iter_mut().enumerate() {
                            *value = kernel.escape_value(x, y as u32);
                        }
                    }
                });
            }
        });
        cancel.check()?;

        let mut values = allocate(size, 0.0)?;
        for (x, column) in columns.chunks_exact(height).enumerate() {
            for (y, value) in column.iter().enumerate() {
                values[y * size.width as usize + x] = *value;
            }
        }
        Ok(values)
    }

    fn accumulate(
        &self,
        kernel: &PixelKernel,
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, EngineError> {
        let size = kernel.size();
        let mut planes = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            planes.push(allocate::<u64>(size, 0)?);
        }

        self.pool.scope(|scope| {
            for (id, plane) in planes.iter_mut().enumerate() {
                let range = column_range(id, self.workers, size.width);
                scope.spawn(move |_| {
                    let mut total = 0;
                    for x in range.clone() {
                        if cancel.is_cancelled() {
                            return;
                        }
                        for y in 0..size.height {
                            total += kernel.trace(x, y, plane);
                        }
                    }
                    debug!("worker {} traced columns {:?}: {} hits", id, range, total);
                });
            }
        });
        cancel.check()?;

        let mut values = allocate(size, 0.0)?;
        for plane in &planes {
            for (value, hits) in values.iter_mut().zip(plane) {
                *value += *hits as f64;
            }
        }
        Ok(values)
    }
}

impl Backend for CpuEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn compute(
        &mut self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError> {
        CpuEngine::compute(self, config, viewport, size, cancel)
    }
}

/// Columns `[id * width / workers, (id + 1) * width / workers)`.
pub fn column_range(id: usize, workers: usize, width: u32) -> Range<u32> {
    let width = width as u64;
    let workers = workers as u64;
    let id = id as u64;
    let start = id * width / workers;
    let end = (id + 1) * width / workers;
    start as u32..end as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Variant, escape::NEVER_ESCAPED};

    #[test]
    fn column_ranges_tile_the_image() {
        for (workers, width) in [(1, 16), (3, 16), (8, 5), (4, 1000)] {
            let mut next = 0;
            for id in 0..workers {
                let range = column_range(id, workers, width);
                assert_eq!(range.start, next);
                next = range.end;
            }
            assert_eq!(next, width);
        }
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(CpuEngine::with_workers(0).unwrap().workers(), 1);
    }

    #[test]
    fn result_is_independent_of_worker_count() {
        let config = FractalConfiguration::default().with_variant(Variant::BurningShip);
        let viewport = Viewport::default();
        let size = screen::Size::new(13, 7);
        let cancel = CancelToken::new();
        let one = CpuEngine::with_workers(1)
            .unwrap()
            .compute(&config, &viewport, size, &cancel)
            .unwrap();
        let many = CpuEngine::with_workers(5)
            .unwrap()
            .compute(&config, &viewport, size, &cancel)
            .unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn values_are_row_major() {
        let config = FractalConfiguration::default().with_smoothing(false);
        let viewport = Viewport::default();
        let size = screen::Size::new(16, 8);
        let image = CpuEngine::with_workers(3)
            .unwrap()
            .compute(&config, &viewport, size, &CancelToken::new())
            .unwrap();
        let kernel = PixelKernel::new(&config, &viewport, size);
        for (x, y) in [(0, 0), (15, 0), (0, 7), (9, 3)] {
            assert_eq!(image.get(x, y), kernel.escape_value(x, y));
        }
        assert_eq!(image.get(8, 4), NEVER_ESCAPED);
    }

    #[test]
    fn buddha_planes_sum_without_losing_hits() {
        let config = FractalConfiguration::default()
            .with_buddha(true)
            .with_iteration_cap(40);
        let viewport = Viewport::default();
        let size = screen::Size::new(12, 10);
        let image = CpuEngine::with_workers(4)
            .unwrap()
            .compute(&config, &viewport, size, &CancelToken::new())
            .unwrap();

        let kernel = PixelKernel::new(&config, &viewport, size);
        let mut hits = vec![0; 120];
        let mut expected = 0;
        for y in 0..size.height {
            for x in 0..size.width {
                expected += kernel.trace(x, y, &mut hits);
            }
        }
        assert_eq!(image.sum(), expected as f64);
        let sequential: Vec<f64> = hits.into_iter().map(|hits| hits as f64).collect();
        assert_eq!(image.values, sequential);
    }

    #[test]
    fn cancelled_token_yields_no_image() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = CpuEngine::with_workers(2).unwrap().compute(
            &FractalConfiguration::default(),
            &Viewport::default(),
            screen::Size::new(8, 8),
            &cancel,
        );
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
