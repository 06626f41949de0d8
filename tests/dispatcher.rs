//! Dispatcher behaviour with stand-in backends.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
};

use wgpu_fractal::{
    backend::{Backend, BackendKind},
    dispatcher::{cpu_factory, BackendFactory},
    screen, CancelToken, ComputeDispatcher, EngineError, EscapeImage, FractalConfiguration,
    Variant, Viewport,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Blocks every computation until released, after announcing it started.
struct GateBackend {
    started: Arc<Mutex<mpsc::Sender<()>>>,
    release: Arc<Mutex<mpsc::Receiver<()>>>,
}

impl Backend for GateBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn implemented_variants(&self) -> Vec<Variant> {
        vec![Variant::Mandelbrot]
    }

    fn compute(
        &mut self,
        config: &FractalConfiguration,
        _viewport: &Viewport,
        size: screen::Size,
        _cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError> {
        self.started.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        EscapeImage::filled(size, config.iteration_cap(), 0.0)
    }
}

fn gate() -> (BackendFactory, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (started_sender, started) = mpsc::channel();
    let (release, release_receiver) = mpsc::channel();
    let started_sender = Arc::new(Mutex::new(started_sender));
    let release_receiver = Arc::new(Mutex::new(release_receiver));
    let factory: BackendFactory = Box::new(move || {
        Ok(Box::new(GateBackend {
            started: started_sender.clone(),
            release: release_receiver.clone(),
        }) as Box<dyn Backend>)
    });
    (factory, started, release)
}

fn request() -> (FractalConfiguration, Viewport, screen::Size) {
    (
        FractalConfiguration::default(),
        Viewport::default(),
        screen::Size::new(4, 3),
    )
}

#[test]
fn concurrent_calls_are_rejected_while_in_flight() {
    init_logging();
    let (factory, started, release) = gate();
    let dispatcher = ComputeDispatcher::new(vec![factory]);
    let (config, viewport, size) = request();

    let (results, finished) = mpsc::channel();
    let handle = dispatcher
        .compute_async(&config, &viewport, size, CancelToken::new(), move |result| {
            results.send(result).unwrap()
        })
        .unwrap();
    started.recv().unwrap();

    assert!(matches!(
        dispatcher.compute_blocking(&config, &viewport, size),
        Err(EngineError::Busy)
    ));
    assert!(matches!(
        dispatcher.compute_async(&config, &viewport, size, CancelToken::new(), |_| {}),
        Err(EngineError::Busy)
    ));
    // The backend was chosen before the computation started.
    assert_eq!(
        dispatcher.clone().implemented_variants().unwrap(),
        vec![Variant::Mandelbrot]
    );
    assert_eq!(dispatcher.active_backend(), Some(BackendKind::Gpu));

    release.send(()).unwrap();
    handle.join().unwrap();
    let image = finished.recv().unwrap().unwrap();
    assert_eq!(image.values.len(), 12);

    // The flag is released once the background computation is done.
    release.send(()).unwrap();
    assert!(dispatcher.compute_blocking(&config, &viewport, size).is_ok());
    assert_eq!(dispatcher.implemented_variants().unwrap(), vec![Variant::Mandelbrot]);
}

#[test]
fn variants_are_answered_during_a_render() {
    init_logging();
    let (factory, started, release) = gate();
    let dispatcher = ComputeDispatcher::new(vec![factory]);
    assert_eq!(dispatcher.implemented_variants().unwrap(), vec![Variant::Mandelbrot]);

    let (config, viewport, size) = request();
    let handle = dispatcher
        .compute_async(&config, &viewport, size, CancelToken::new(), |_| {})
        .unwrap();
    started.recv().unwrap();
    for _ in 0..3 {
        assert_eq!(dispatcher.implemented_variants().unwrap(), vec![Variant::Mandelbrot]);
    }
    release.send(()).unwrap();
    handle.join().unwrap();
}

#[test]
fn unavailable_backends_fall_through_in_order() {
    init_logging();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = attempts.clone();
    let failing: BackendFactory = Box::new(move || {
        counted.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::BackendUnavailable("no adapter".into()))
    });
    let dispatcher = ComputeDispatcher::new(vec![failing, cpu_factory(2)]);
    let (config, viewport, size) = request();

    for _ in 0..3 {
        dispatcher.compute_blocking(&config, &viewport, size).unwrap();
    }
    assert_eq!(dispatcher.active_backend(), Some(BackendKind::Cpu));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.implemented_variants().unwrap(), Variant::ALL.to_vec());
}

#[test]
fn other_factory_errors_are_not_swallowed() {
    init_logging();
    let broken: BackendFactory =
        Box::new(|| Err(EngineError::InvalidConfiguration("bad worker count".into())));
    let dispatcher = ComputeDispatcher::new(vec![broken, cpu_factory(1)]);
    let (config, viewport, size) = request();
    assert!(matches!(
        dispatcher.compute_blocking(&config, &viewport, size),
        Err(EngineError::InvalidConfiguration(_))
    ));
}

#[test]
fn invalid_requests_fail_fast() {
    init_logging();
    let dispatcher = ComputeDispatcher::new(vec![cpu_factory(1)]);
    let (config, viewport, size) = request();
    assert!(matches!(
        dispatcher.compute_blocking(&config.with_iteration_cap(0), &viewport, size),
        Err(EngineError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        dispatcher.compute_blocking(&config, &Viewport::new(1.0, 1.0, 0.0, 1.0), size),
        Err(EngineError::InvalidConfiguration(_))
    ));
    // The failed calls released the flag.
    assert!(dispatcher.compute_blocking(&config, &viewport, size).is_ok());
}

#[test]
fn cancelled_requests_return_no_image() {
    init_logging();
    let dispatcher = ComputeDispatcher::new(vec![cpu_factory(2)]);
    let (config, viewport, size) = request();
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(matches!(
        dispatcher.compute_blocking_with_cancel(&config, &viewport, size, &cancel),
        Err(EngineError::Cancelled)
    ));
}
