/*!
Backend selection and single-flight invocation.

A [`ComputeDispatcher`] holds an ordered list of backend factories. The first
computation tries them in order; a factory failing with
[`EngineError::BackendUnavailable`] is logged and skipped, and the first
backend that comes up is kept for every later call.

At most one computation runs at a time. The in-flight flag is held by a guard
that lives as long as the computation, including on the background thread
started by [`ComputeDispatcher::compute_async`]. A call made while another is
in flight fails with [`EngineError::Busy`]. Queries about the chosen backend
are answered from a record taken at selection time and never wait for the
flag.
*/

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use log::{info, warn};

use crate::{
    backend::{Backend, BackendKind},
    cancel::CancelToken,
    config::{FractalConfiguration, Variant},
    cpu::CpuEngine,
    error::EngineError,
    escape::EscapeImage,
    gpu::GpuEngine,
    screen,
    settings::{BackendPreference, Settings},
    viewport::Viewport,
};

pub type BackendFactory =
    Box<dyn Fn() -> Result<Box<dyn Backend>, EngineError> + Send + Sync + 'static>;

pub fn gpu_factory() -> BackendFactory {
    Box::new(|| Ok(Box::new(GpuEngine::new()?) as Box<dyn Backend>))
}

pub fn cpu_factory(workers: usize) -> BackendFactory {
    Box::new(move || Ok(Box::new(CpuEngine::with_workers(workers)?) as Box<dyn Backend>))
}

/// What the selected backend reported about itself when it was chosen.
struct Selection {
    kind: BackendKind,
    variants: Vec<Variant>,
}

struct Shared {
    factories: Vec<BackendFactory>,
    backend: Mutex<Option<Box<dyn Backend>>>,
    selection: Mutex<Option<Selection>>,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag when dropped.
struct FlightGuard {
    shared: Arc<Shared>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ComputeDispatcher {
    shared: Arc<Shared>,
}

impl ComputeDispatcher {
    /// A dispatcher trying `factories` in order.
    pub fn new(factories: Vec<BackendFactory>) -> Self {
        Self {
            shared: Arc::new(Shared {
                factories,
                backend: Mutex::new(None),
                selection: Mutex::new(None),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let factories = match settings.backend {
            BackendPreference::Auto => vec![gpu_factory(), cpu_factory(settings.workers)],
            BackendPreference::Gpu => vec![gpu_factory()],
            BackendPreference::Cpu => vec![cpu_factory(settings.workers)],
        };
        Self::new(factories)
    }

    /// The backend chosen so far, if any computation or query has selected one.
    pub fn active_backend(&self) -> Option<BackendKind> {
        lock(&self.shared.selection)
            .as_ref()
            .map(|selection| selection.kind)
    }

    /**
    Variants the active backend implements.

    Once a backend is chosen this is answered even while a computation is in
    flight. Before that it selects a backend first, which needs the in-flight
    flag like a computation does.
    */
    pub fn implemented_variants(&self) -> Result<Vec<Variant>, EngineError> {
        if let Some(selection) = lock(&self.shared.selection).as_ref() {
            return Ok(selection.variants.clone());
        }
        let _guard = self.acquire()?;
        let mut backend = lock(&self.shared.backend);
        Ok(select(&self.shared, &mut backend)?.implemented_variants())
    }

    pub fn compute_blocking(
        &self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
    ) -> Result<EscapeImage, EngineError> {
        self.compute_blocking_with_cancel(config, viewport, size, &CancelToken::new())
    }

    pub fn compute_blocking_with_cancel(
        &self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError> {
        let guard = self.acquire()?;
        run(&guard.shared, config, viewport, size, cancel)
    }

    /**
    Starts the computation on a background thread and calls `on_complete` with
    its result there. Returns the thread's handle, or [`EngineError::Busy`]
    without starting anything if a computation is already in flight.

    The configuration and viewport are copied; later changes by the caller do
    not affect the running computation.
    */
    pub fn compute_async<F>(
        &self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: CancelToken,
        on_complete: F,
    ) -> Result<JoinHandle<()>, EngineError>
    where
        F: FnOnce(Result<EscapeImage, EngineError>) + Send + 'static,
    {
        let guard = self.acquire()?;
        let config = *config;
        let viewport = *viewport;
        thread::Builder::new()
            .name("fractal-dispatch".into())
            .spawn(move || {
                let result = run(&guard.shared, &config, &viewport, size, &cancel);
                // Free the flag before the callback so it may start the next frame.
                drop(guard);
                on_complete(result);
            })
            .map_err(|error| EngineError::BackendUnavailable(error.to_string()))
    }

    fn acquire(&self) -> Result<FlightGuard, EngineError> {
        self.shared
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| EngineError::Busy)?;
        Ok(FlightGuard {
            shared: Arc::clone(&self.shared),
        })
    }
}

impl Default for ComputeDispatcher {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

fn lock<A>(mutex: &Mutex<A>) -> MutexGuard<'_, A> {
    // A panicking backend leaves nothing half-written that later calls read.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run(
    shared: &Shared,
    config: &FractalConfiguration,
    viewport: &Viewport,
    size: screen::Size,
    cancel: &CancelToken,
) -> Result<EscapeImage, EngineError> {
    let mut backend = lock(&shared.backend);
    select(shared, &mut backend)?.compute(config, viewport, size, cancel)
}

/// The remembered backend, or the first factory that succeeds.
fn select<'a>(
    shared: &Shared,
    backend: &'a mut Option<Box<dyn Backend>>,
) -> Result<&'a mut Box<dyn Backend>, EngineError> {
    if backend.is_none() {
        let mut reasons = Vec::new();
        for factory in &shared.factories {
            match factory() {
                Ok(created) => {
                    info!("using the {} backend", created.kind());
                    *lock(&shared.selection) = Some(Selection {
                        kind: created.kind(),
                        variants: created.implemented_variants(),
                    });
                    *backend = Some(created);
                    break;
                }
                Err(error) if error.is_backend_unavailable() => {
                    warn!("backend unavailable, trying the next one: {}", error);
                    reasons.push(error.to_string());
                }
                Err(error) => return Err(error),
            }
        }
        if backend.is_none() {
            return Err(EngineError::BackendUnavailable(if reasons.is_empty() {
                "no backends configured".into()
            } else {
                reasons.join("; ")
            }));
        }
    }
    backend
        .as_mut()
        .ok_or_else(|| EngineError::BackendUnavailable("no backend selected".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::AtomicUsize, mpsc};

    fn failing_factory(attempts: Arc<AtomicUsize>) -> BackendFactory {
        Box::new(move || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::BackendUnavailable("no device".into()))
        })
    }

    #[test]
    fn falls_back_and_remembers_the_choice() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            ComputeDispatcher::new(vec![failing_factory(attempts.clone()), cpu_factory(2)]);
        assert_eq!(dispatcher.active_backend(), None);

        let size = screen::Size::new(8, 8);
        let config = FractalConfiguration::default();
        dispatcher
            .compute_blocking(&config, &Viewport::default(), size)
            .unwrap();
        dispatcher
            .compute_blocking(&config, &Viewport::default(), size)
            .unwrap();

        assert_eq!(dispatcher.active_backend(), Some(BackendKind::Cpu));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_working_backend_is_unavailable() {
        let dispatcher =
            ComputeDispatcher::new(vec![failing_factory(Arc::new(AtomicUsize::new(0)))]);
        let result = dispatcher.compute_blocking(
            &FractalConfiguration::default(),
            &Viewport::default(),
            screen::Size::new(4, 4),
        );
        assert!(matches!(result, Err(EngineError::BackendUnavailable(_))));
    }

    #[test]
    fn variants_come_from_the_active_backend() {
        let dispatcher = ComputeDispatcher::new(vec![cpu_factory(1)]);
        assert_eq!(dispatcher.implemented_variants().unwrap(), Variant::ALL.to_vec());
        assert_eq!(dispatcher.active_backend(), Some(BackendKind::Cpu));
    }

    #[test]
    fn second_call_while_in_flight_is_busy() {
        let dispatcher = ComputeDispatcher::new(vec![cpu_factory(1)]);
        let guard = dispatcher.acquire().unwrap();
        let result = dispatcher.compute_blocking(
            &FractalConfiguration::default(),
            &Viewport::default(),
            screen::Size::new(4, 4),
        );
        assert!(matches!(result, Err(EngineError::Busy)));
        drop(guard);
        assert!(dispatcher
            .compute_blocking(
                &FractalConfiguration::default(),
                &Viewport::default(),
                screen::Size::new(4, 4),
            )
            .is_ok());
    }

    #[test]
    fn async_result_arrives_through_the_callback() {
        let dispatcher = ComputeDispatcher::new(vec![cpu_factory(2)]);
        let (sender, receiver) = mpsc::channel();
        let handle = dispatcher
            .compute_async(
                &FractalConfiguration::default(),
                &Viewport::default(),
                screen::Size::new(6, 4),
                CancelToken::new(),
                move |result| sender.send(result).unwrap(),
            )
            .unwrap();
        handle.join().unwrap();
        let image = receiver.recv().unwrap().unwrap();
        assert_eq!(image.values.len(), 24);
        assert_eq!(image.iteration_cap, 100);
    }
}
