//! The main run loop
//!
//! [`run`] takes over the calling thread, which becomes the only thread
//! allowed to touch the primary native window. The application body runs on a
//! thread of its own and reaches the window through a [`Window`] handle.
//!
//! Startup order: native library, primary window and loader context,
//! renderer, loader thread, forced property application, application thread.
//! Teardown runs in reverse and happens exactly once, whether the loop ends on
//! a close request or on a panic in the application body. Main-thread work
//! still queued at that point is dropped.

use crate::config::{ConfigError, LoopConfig};
use crate::device::{Backend, Bounds, Device, DeviceError, Renderer};
use crate::dispatch::{self, DispatchQueue};
use crate::loader::{LoaderError, SharedLoader};
use crate::native::{
    LoaderContext, NativeError, NativeLibrary, NativeWindow, Platform, RawEvent, Surfaces,
};
use crate::props::Props;
use crate::translate::Translator;
use crate::window::{Shared, Window};
use crossbeam_channel::{bounded, never, select, tick, Receiver};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Application thread name
pub const APP_THREAD_NAME: &str = "rust_window-app";

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Errors ending a run
#[derive(Error, Debug)]
pub enum RunError {
    /// The native library or window failed to start
    #[error("Native library error: {0}")]
    Native(#[from] NativeError),

    /// The renderer could not be created
    #[error("Rendering device error: {0}")]
    Device(#[from] DeviceError),

    /// The loader failed to start or to shut down cleanly
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    /// Invalid loop configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The application thread could not be started
    #[error("Failed to spawn application thread: {0}")]
    Spawn(String),
}

/// Run loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopState {
    Running,
    Draining,
    Terminated,
}

enum Exit {
    Shutdown,
    Panicked(PanicPayload),
}

/// Open a window and run `app` against it until the window closes
///
/// `props` defaults to [`Props::default`]. Blocks the calling thread, which
/// must be the thread the native library expects (the process main thread for
/// GLFW on macOS). A panic in `app` or in a job it submits to the renderer is
/// resumed here after the native library has been shut down.
pub fn run<P, B, F>(platform: P, backend: B, props: Option<Props>, app: F) -> Result<(), RunError>
where
    P: Platform,
    B: Backend,
    F: FnOnce(Window, Arc<B::Renderer>) + Send + 'static,
{
    run_with_config(platform, backend, props, &LoopConfig::default(), app)
}

/// [`run`] with explicit loop tuning
pub fn run_with_config<P, B, F>(
    platform: P,
    backend: B,
    props: Option<Props>,
    config: &LoopConfig,
    app: F,
) -> Result<(), RunError>
where
    P: Platform,
    B: Backend,
    F: FnOnce(Window, Arc<B::Renderer>) + Send + 'static,
{
    config.validate()?;
    let props = props.unwrap_or_default();
    let mut run_loop = RunLoop::start(platform, backend, &props, config)?;

    let (failure_tx, failure_rx) = bounded::<PanicPayload>(1);
    let window = Window::new(Arc::clone(&run_loop.shared));
    let renderer = Arc::clone(&run_loop.renderer);
    let spawned = thread::Builder::new()
        .name(APP_THREAD_NAME.to_string())
        .spawn(move || match panic::catch_unwind(AssertUnwindSafe(move || app(window, renderer))) {
            Ok(()) => log::debug!("Application body returned"),
            Err(payload) => {
                log::error!("Application body panicked, shutting down");
                let _ = failure_tx.send(payload);
            }
        });
    if let Err(err) = spawned {
        if let Err(teardown_err) = run_loop.teardown() {
            log::warn!("Teardown after failed start: {teardown_err}");
        }
        return Err(RunError::Spawn(err.to_string()));
    }

    let exit = run_loop.pump(&failure_rx);
    let result = run_loop.teardown();

    if let Exit::Panicked(payload) = exit {
        if let Err(err) = result {
            log::warn!("Teardown after application panic: {err}");
        }
        panic::resume_unwind(payload);
    }
    result
}

struct RunLoop<P: Platform, B: Backend> {
    library: NativeLibrary<P>,
    native: P::Window,
    renderer: Arc<B::Renderer>,
    loader: SharedLoader,
    queue: DispatchQueue,
    shared: Arc<Shared>,
    shutdown: Receiver<()>,
    config: LoopConfig,
    events: Vec<RawEvent>,
    state: LoopState,
}

impl<P: Platform, B: Backend> RunLoop<P, B> {
    fn start(platform: P, backend: B, props: &Props, config: &LoopConfig) -> Result<Self, RunError> {
        log::info!("Starting window run loop");

        // Dropping the library on an early return terminates it.
        let mut library = NativeLibrary::new(platform);
        let Surfaces { window: mut native, loader: context } =
            library.ensure_initialized()?.create_surfaces(props)?;

        let backend = Arc::new(backend);
        let renderer = match backend.create_renderer(Bounds::from_size(props.size.0, props.size.1)) {
            Ok(renderer) => Arc::new(renderer),
            Err(err) => {
                if let Err(destroy_err) = context.destroy() {
                    log::warn!("Failed to destroy loader context: {destroy_err}");
                }
                destroy_window(native);
                return Err(err.into());
            }
        };

        let loader = match SharedLoader::spawn(context, backend) {
            Ok(loader) => loader,
            Err(err) => {
                release_renderer(renderer.as_ref());
                destroy_window(native);
                return Err(err.into());
            }
        };

        let (dispatcher, queue) = dispatch::channel(config.dispatch_capacity);
        queue.bind_current_thread();
        let (shutdown_tx, shutdown) = bounded(1);
        let shared_renderer: Arc<dyn Renderer> = renderer.clone();
        let shared = Arc::new(Shared::new(
            props.clone(),
            dispatcher,
            shared_renderer,
            loader.handle(),
            shutdown_tx,
        ));
        shared.reconcile(&mut native, props, true);

        Ok(Self {
            library,
            native,
            renderer,
            loader,
            queue,
            shared,
            shutdown,
            config: config.clone(),
            events: Vec::new(),
            state: LoopState::Running,
        })
    }

    fn enter(&mut self, next: LoopState) {
        log::info!("Run loop {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Serve the loop until shutdown or a panic in the application or a render job
    fn pump(&mut self, failures: &Receiver<PanicPayload>) -> Exit {
        let title_ticks = tick(self.config.title_refresh());
        let poll_ticks = tick(self.config.poll_interval());
        let work = self.queue.receiver().clone();
        let jobs = self.renderer.exec_queue();
        let no_jobs = never();
        let no_failures = never();
        let mut jobs_open = true;
        let mut app_running = true;
        let translator = Translator::new(&self.shared);

        loop {
            let job_rx = if jobs_open { &jobs } else { &no_jobs };
            let failure_rx = if app_running { failures } else { &no_failures };

            select! {
                recv(title_ticks) -> _ => self.shared.refresh_title(&mut self.native),
                recv(poll_ticks) -> _ => poll(&mut self.native, &mut self.events, &translator),
                recv(self.shutdown) -> _ => break Exit::Shutdown,
                recv(failure_rx) -> payload => match payload {
                    Ok(payload) => break Exit::Panicked(payload),
                    Err(_) => app_running = false,
                },
                recv(work) -> item => match item {
                    Ok(item) => item(&mut self.native),
                    Err(_) => break Exit::Shutdown,
                },
                recv(job_rx) -> job => match job {
                    Ok(job) => match panic::catch_unwind(AssertUnwindSafe(job)) {
                        Ok(true) => {
                            self.native.swap_buffers();
                            poll(&mut self.native, &mut self.events, &translator);
                        }
                        Ok(false) => {}
                        Err(payload) => {
                            log::error!("Render job panicked, shutting down");
                            break Exit::Panicked(payload);
                        }
                    },
                    Err(_) => jobs_open = false,
                },
            }
        }
    }

    /// Release everything in reverse order of creation
    fn teardown(mut self) -> Result<(), RunError> {
        self.enter(LoopState::Draining);
        let Self { mut library, native, renderer, loader, queue, shared, .. } = self;

        let dropped = queue.close();
        if dropped > 0 {
            log::debug!("Dropped {dropped} pending main-thread work items");
        }

        let loader_result = loader.shutdown();
        release_renderer(renderer.as_ref());
        destroy_window(native);
        library.shutdown();
        drop(shared);

        log::info!("Run loop {:?}", LoopState::Terminated);
        loader_result.map_err(RunError::from)
    }
}

fn poll<W: NativeWindow>(native: &mut W, buffer: &mut Vec<RawEvent>, translator: &Translator<'_>) {
    native.poll_events(buffer);
    translator.dispatch_all(buffer.drain(..));
}

fn release_renderer<R: Renderer + ?Sized>(renderer: &R) {
    if let Err(err) = renderer.release() {
        log::warn!("Renderer release failed: {err}");
    }
}

fn destroy_window<W: NativeWindow>(native: W) {
    if let Err(err) = native.destroy() {
        log::warn!("Failed to destroy window: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::QueueBackend;
    use crate::event::{Event, EventMask};
    use crate::input::Key;
    use crate::native::headless::{HeadlessPlatform, LifecycleEvent};
    use crate::native::{Action, NativeOp};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config() -> LoopConfig {
        LoopConfig { title_refresh_ms: 10, poll_hz: 500, ..LoopConfig::default() }
    }

    #[test]
    fn test_full_lifecycle_order() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();

        run(platform, QueueBackend::default(), None, |window, _| window.close()).unwrap();

        assert_eq!(
            probe.lifecycle(),
            vec![
                LifecycleEvent::Initialized,
                LifecycleEvent::SurfacesCreated,
                LifecycleEvent::LoaderAttached,
                LifecycleEvent::LoaderDetached,
                LifecycleEvent::LoaderDestroyed,
                LifecycleEvent::WindowDestroyed,
                LifecycleEvent::Terminated,
            ]
        );
        assert_eq!(probe.ops().first(), Some(&NativeOp::SetTitle("rust_window - 0FPS".to_string())));
    }

    #[test]
    fn test_app_panic_terminates_once_then_resumes() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run(platform, QueueBackend::default(), None, |_, _| panic!("app failed"))
        }));

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"app failed"));
        assert_eq!(probe.count(&LifecycleEvent::Terminated), 1);
        assert_eq!(probe.lifecycle().last(), Some(&LifecycleEvent::Terminated));
    }

    #[test]
    fn test_render_job_panic_tears_down_in_order() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run(platform, QueueBackend::default(), None, |_, renderer| {
                renderer.render(|| panic!("frame failed")).unwrap();
            })
        }));

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"frame failed"));
        assert_eq!(
            probe.lifecycle(),
            vec![
                LifecycleEvent::Initialized,
                LifecycleEvent::SurfacesCreated,
                LifecycleEvent::LoaderAttached,
                LifecycleEvent::LoaderDetached,
                LifecycleEvent::LoaderDestroyed,
                LifecycleEvent::WindowDestroyed,
                LifecycleEvent::Terminated,
            ]
        );
    }

    #[test]
    fn test_loader_context_released_during_handoff() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let app_probe = probe.clone();
        let (result_tx, result_rx) = bounded(1);

        run(platform, QueueBackend::default(), None, move |window, _| {
            let inside = window.without_loader_context(|| app_probe.lifecycle().last().cloned());
            let _ = result_tx.send(inside);
            window.close();
        })
        .unwrap();

        assert_eq!(result_rx.recv().unwrap(), Ok(Some(LifecycleEvent::LoaderDetached)));
        assert_eq!(probe.count(&LifecycleEvent::LoaderAttached), 2);
        assert_eq!(probe.count(&LifecycleEvent::LoaderDetached), 2);
    }

    #[test]
    fn test_init_failure_aborts_before_window_exists() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        probe.fail_init(true);
        let started = Arc::new(AtomicBool::new(false));
        let app_started = Arc::clone(&started);

        let result = run(platform, QueueBackend::default(), None, move |_, _| {
            app_started.store(true, Ordering::SeqCst);
        });

        assert!(matches!(result, Err(RunError::Native(NativeError::InitializationFailed(_)))));
        assert!(probe.lifecycle().is_empty());
        assert!(!started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LoopConfig { poll_hz: 0, ..LoopConfig::default() };
        let result = run_with_config(HeadlessPlatform::new(), QueueBackend::default(), None, &config, |_, _| {});
        assert!(matches!(result, Err(RunError::Config(_))));
    }

    #[test]
    fn test_key_event_reaches_subscriber_with_watcher_updated() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let (result_tx, result_rx) = bounded(1);

        run_with_config(platform, QueueBackend::default(), None, &fast_config(), move |window, _| {
            let (tx, rx) = bounded(16);
            window.notify(&tx, EventMask::KEYBOARD);
            probe.inject(RawEvent::Key { key: Key::Space, scancode: 57, action: Action::Press });

            let event = rx.recv_timeout(WAIT).ok();
            let _ = result_tx.send((event, window.keyboard().is_down(Key::Space)));
            window.close();
        })
        .unwrap();

        let (event, down) = result_rx.recv().unwrap();
        assert!(matches!(event, Some(Event::KeyState { key: Key::Space, raw: 57, .. })));
        assert!(down);
    }

    #[test]
    fn test_close_event_when_app_decides() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let mut props = Props::default();
        props.should_close = false;
        let (result_tx, result_rx) = bounded(1);

        run_with_config(platform, QueueBackend::default(), Some(props), &fast_config(), move |window, _| {
            let (tx, rx) = bounded(4);
            window.notify(&tx, EventMask::CLOSE);
            probe.inject(RawEvent::Close);

            let _ = result_tx.send(rx.recv_timeout(WAIT).ok());
            window.close();
        })
        .unwrap();

        assert!(matches!(result_rx.recv().unwrap(), Some(Event::Close { .. })));
    }

    #[test]
    fn test_native_close_ends_run() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let app_probe = probe.clone();

        run_with_config(platform, QueueBackend::default(), None, &fast_config(), move |_, _| {
            app_probe.inject(RawEvent::Close);
        })
        .unwrap();

        assert_eq!(probe.count(&LifecycleEvent::WindowDestroyed), 1);
    }

    #[test]
    fn test_rendered_frames_swap_buffers() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();

        run(platform, QueueBackend::default(), None, |window, renderer| {
            let (done_tx, done_rx) = bounded(1);
            for _ in 0..3 {
                renderer.render(|| {}).unwrap();
            }
            renderer
                .execute(move || {
                    let _ = done_tx.send(());
                })
                .unwrap();
            done_rx.recv_timeout(WAIT).unwrap();
            window.close();
        })
        .unwrap();

        assert_eq!(probe.swaps(), 3);
    }

    #[test]
    fn test_requests_applied_in_order_before_sync_call_returns() {
        let platform = HeadlessPlatform::new();
        let probe = platform.probe();

        run(platform, QueueBackend::default(), None, |window, _| {
            let props = window.props().with_size(1024, 768);
            window.request(props).unwrap();
            window.set_clipboard("hello").unwrap();
            assert_eq!(window.clipboard(), Ok("hello".to_string()));
            window.close();
        })
        .unwrap();

        let ops = probe.ops();
        let resize = ops.iter().position(|op| *op == NativeOp::SetSize { width: 1024, height: 768 });
        let copy = ops.iter().position(|op| *op == NativeOp::SetClipboard("hello".to_string()));
        assert!(resize.is_some() && resize < copy);
    }
}
