//! Shared-context loader thread
//!
//! Resource preparation (texture uploads, shader compilation) runs on its own
//! OS thread with a secondary context that shares objects with the primary
//! window. A context can be current on at most one thread, so anything that
//! needs the loader context elsewhere asks the loader to let go of it first:
//!
//! 1. the requester sends a release request and blocks;
//! 2. the loader detaches its context and acknowledges;
//! 3. the requester does its work, then signals resume;
//! 4. the loader re-attaches and carries on with its job queue.
//!
//! At exit the loader releases its device while the context is still current,
//! detaches, destroys the context and reports the outcome to whoever asked it
//! to stop.

use crate::device::{Backend, Device, DeviceError};
use crate::native::{LoaderContext, NativeError};
use crossbeam_channel::{bounded, never, select, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use thiserror::Error;

/// Loader thread name
pub const LOADER_THREAD_NAME: &str = "rust_window-loader";

/// Loader errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The native context could not be attached or destroyed
    #[error("Loader context error: {0}")]
    Native(#[from] NativeError),

    /// The loader device failed
    #[error("Loader device error: {0}")]
    Device(#[from] DeviceError),

    /// The loader thread is gone
    #[error("Loader thread has exited")]
    Disconnected,

    /// The loader thread panicked
    #[error("Loader thread panicked")]
    Panicked,

    /// The loader thread could not be started
    #[error("Failed to spawn loader thread: {0}")]
    Spawn(String),

    /// A handoff was requested from the loader thread itself
    #[error("Context handoff requested from the loader thread")]
    OnLoaderThread,
}

enum Control {
    Release { ack: Sender<()>, resume: Receiver<()> },
    Exit { done: Sender<Result<(), LoaderError>> },
}

/// Lets the loader re-attach when dropped, including during unwinding
struct ResumeGuard(Sender<()>);

impl Drop for ResumeGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Cloneable handle for context handoffs
#[derive(Clone)]
pub struct LoaderHandle {
    control: Option<Sender<Control>>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl LoaderHandle {
    /// Handle with no loader behind it; handoffs run immediately
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self { control: None, owner: Arc::new(OnceLock::new()) }
    }

    /// Run `f` while the loader context is current nowhere
    ///
    /// Blocks until the loader has detached. The loader waits for `f` to
    /// return (or unwind) before re-attaching.
    pub fn without_context<F, R>(&self, f: F) -> Result<R, LoaderError>
    where
        F: FnOnce() -> R,
    {
        let Some(control) = &self.control else {
            return Ok(f());
        };
        if self.owner.get() == Some(&thread::current().id()) {
            return Err(LoaderError::OnLoaderThread);
        }

        let (ack_tx, ack_rx) = bounded(1);
        let (resume_tx, resume_rx) = bounded(1);
        control
            .send(Control::Release { ack: ack_tx, resume: resume_rx })
            .map_err(|_| LoaderError::Disconnected)?;
        ack_rx.recv().map_err(|_| LoaderError::Disconnected)?;

        let _resume = ResumeGuard(resume_tx);
        Ok(f())
    }
}

/// The loader thread and its control channel
pub struct SharedLoader {
    control: Sender<Control>,
    owner: Arc<OnceLock<ThreadId>>,
    thread: Option<JoinHandle<()>>,
}

impl SharedLoader {
    /// Start the loader thread with `context` and a device from `backend`
    ///
    /// Returns once the device exists, or with the error that prevented it. On
    /// failure the context has already been destroyed.
    pub fn spawn<C, B>(context: C, backend: Arc<B>) -> Result<Self, LoaderError>
    where
        C: LoaderContext,
        B: Backend,
    {
        let (control_tx, control_rx) = bounded(1);
        let (ready_tx, ready_rx) = bounded(1);
        let owner = Arc::new(OnceLock::new());
        let thread_owner = Arc::clone(&owner);

        let thread = thread::Builder::new()
            .name(LOADER_THREAD_NAME.to_string())
            .spawn(move || {
                let _ = thread_owner.set(thread::current().id());
                loader_main(context, backend.as_ref(), &control_rx, &ready_tx);
            })
            .map_err(|err| LoaderError::Spawn(err.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { control: control_tx, owner, thread: Some(thread) }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(LoaderError::Panicked)
            }
        }
    }

    /// Handle for context handoffs
    pub fn handle(&self) -> LoaderHandle {
        LoaderHandle { control: Some(self.control.clone()), owner: Arc::clone(&self.owner) }
    }

    /// Stop the loader and wait for it to destroy its context
    pub fn shutdown(mut self) -> Result<(), LoaderError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), LoaderError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let (done_tx, done_rx) = bounded(1);
        let result = match self.control.send(Control::Exit { done: done_tx }) {
            Ok(()) => done_rx.recv().unwrap_or(Err(LoaderError::Panicked)),
            Err(_) => Err(LoaderError::Disconnected),
        };

        if thread.join().is_err() {
            return Err(LoaderError::Panicked);
        }
        log::info!("Loader thread stopped");
        result
    }
}

impl Drop for SharedLoader {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::warn!("Loader shutdown failed: {err}");
        }
    }
}

fn loader_main<C, B>(
    mut context: C,
    backend: &B,
    control: &Receiver<Control>,
    ready: &Sender<Result<(), LoaderError>>,
) where
    C: LoaderContext,
    B: Backend,
{
    if let Err(err) = context.make_current() {
        if let Err(destroy_err) = context.destroy() {
            log::warn!("Failed to destroy loader context: {destroy_err}");
        }
        let _ = ready.send(Err(err.into()));
        return;
    }

    let device = match backend.create_loader() {
        Ok(device) => device,
        Err(err) => {
            context.detach();
            if let Err(destroy_err) = context.destroy() {
                log::warn!("Failed to destroy loader context: {destroy_err}");
            }
            let _ = ready.send(Err(err.into()));
            return;
        }
    };

    let _ = ready.send(Ok(()));
    log::info!("Loader thread started");

    let jobs = device.exec_queue();
    let idle = never();
    let mut jobs_open = true;

    let done = loop {
        let job_rx = if jobs_open { &jobs } else { &idle };
        select! {
            recv(control) -> msg => match msg {
                Ok(Control::Release { ack, resume }) => {
                    context.detach();
                    let _ = ack.send(());
                    // A dropped resume sender also means the requester is done.
                    let _ = resume.recv();
                    if let Err(err) = context.make_current() {
                        log::error!("Loader failed to re-attach its context: {err}");
                    }
                }
                Ok(Control::Exit { done }) => break Some(done),
                Err(_) => break None,
            },
            recv(job_rx) -> job => match job {
                Ok(job) => {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Loader job panicked");
                    }
                }
                Err(_) => jobs_open = false,
            },
        }
    };

    drop(jobs);
    let result = finish(context, device);
    match done {
        Some(done) => {
            let _ = done.send(result);
        }
        None => {
            if let Err(err) = result {
                log::warn!("Loader exited with error: {err}");
            }
        }
    }
}

fn finish<C: LoaderContext, D: Device>(mut context: C, device: D) -> Result<(), LoaderError> {
    let released = device.release();
    drop(device);
    context.detach();
    let destroyed = context.destroy();
    released?;
    destroyed?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Bounds, QueueBackend};
    use crate::native::headless::{HeadlessPlatform, HeadlessProbe, LifecycleEvent};
    use crate::native::Platform;
    use crate::props::Props;
    use std::time::Duration;

    fn start() -> (SharedLoader, Arc<QueueBackend>, HeadlessProbe) {
        let mut platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let context = platform.create_surfaces(&Props::default()).unwrap().loader;
        let backend = Arc::new(QueueBackend::new(4));
        let loader = SharedLoader::spawn(context, Arc::clone(&backend)).unwrap();
        (loader, backend, probe)
    }

    #[test]
    fn test_handoff_detaches_then_reattaches() {
        let (loader, _backend, probe) = start();

        let inside = loader
            .handle()
            .without_context(|| probe.lifecycle().last().cloned())
            .unwrap();
        assert_eq!(inside, Some(LifecycleEvent::LoaderDetached));

        loader.shutdown().unwrap();
        assert_eq!(
            probe.lifecycle(),
            vec![
                LifecycleEvent::SurfacesCreated,
                LifecycleEvent::LoaderAttached,
                LifecycleEvent::LoaderDetached,
                LifecycleEvent::LoaderAttached,
                LifecycleEvent::LoaderDetached,
                LifecycleEvent::LoaderDestroyed,
            ]
        );
    }

    #[test]
    fn test_load_jobs_run_on_loader_thread() {
        let (loader, backend, _probe) = start();
        let renderer = backend.create_renderer(Bounds::default()).unwrap();
        let (tx, rx) = bounded(1);

        renderer
            .load(move || {
                let _ = tx.send(thread::current().name().map(str::to_string));
            })
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(LOADER_THREAD_NAME));
        loader.shutdown().unwrap();
    }

    #[test]
    fn test_handoff_after_shutdown_is_disconnected() {
        let (loader, _backend, _probe) = start();
        let handle = loader.handle();
        loader.shutdown().unwrap();

        assert_eq!(handle.without_context(|| ()), Err(LoaderError::Disconnected));
    }

    #[test]
    fn test_handoff_from_loader_thread_is_refused() {
        let (loader, backend, _probe) = start();
        let renderer = backend.create_renderer(Bounds::default()).unwrap();
        let handle = loader.handle();
        let (tx, rx) = bounded(1);

        renderer
            .load(move || {
                let _ = tx.send(handle.without_context(|| ()));
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Err(LoaderError::OnLoaderThread));
        loader.shutdown().unwrap();
    }

    #[test]
    fn test_panicking_handoff_still_resumes() {
        let (loader, _backend, probe) = start();
        let handle = loader.handle();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            handle.without_context(|| panic!("handoff body failed"))
        }));
        assert!(result.is_err());

        loader.shutdown().unwrap();
        assert_eq!(probe.count(&LifecycleEvent::LoaderAttached), 2);
        assert_eq!(probe.count(&LifecycleEvent::LoaderDestroyed), 1);
    }
}
