//! Test fixtures shared by the unit tests

use crate::device::{Backend, Bounds, QueueBackend, QueueRenderer};
use crate::dispatch::{self, DispatchQueue};
use crate::loader::LoaderHandle;
use crate::native::headless::{HeadlessPlatform, HeadlessProbe, HeadlessWindow};
use crate::native::Platform;
use crate::props::Props;
use crate::translate::Translator;
use crate::window::{Shared, Window};
use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// Window state wired to a headless window, with the test thread standing in
/// for the main loop
pub(crate) struct Fixture {
    pub(crate) shared: Arc<Shared>,
    pub(crate) queue: DispatchQueue,
    pub(crate) native: HeadlessWindow,
    pub(crate) probe: HeadlessProbe,
    pub(crate) renderer: Arc<QueueRenderer>,
    pub(crate) shutdown: Receiver<()>,
}

impl Fixture {
    /// Fixture whose native window already matches `props`; the journal starts empty
    pub(crate) fn new(props: Props) -> Self {
        let mut platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let mut native = platform.create_surfaces(&props).unwrap().window;

        let renderer = Arc::new(
            QueueBackend::new(8)
                .create_renderer(Bounds::from_size(props.size.0, props.size.1))
                .unwrap(),
        );
        let (dispatcher, queue) = dispatch::channel(8);
        let (shutdown_tx, shutdown) = bounded(1);
        let shared = Arc::new(Shared::new(
            props.clone(),
            dispatcher,
            renderer.clone(),
            LoaderHandle::detached(),
            shutdown_tx,
        ));

        shared.reconcile(&mut native, &props, true);
        probe.take_ops();

        Self { shared, queue, native, probe, renderer, shutdown }
    }

    pub(crate) fn window(&self) -> Window {
        Window::new(Arc::clone(&self.shared))
    }

    pub(crate) fn translator(&self) -> Translator<'_> {
        Translator::new(&self.shared)
    }

    /// Run queued main-thread work
    pub(crate) fn run_pending(&mut self) -> usize {
        self.queue.run_pending(&mut self.native)
    }

    /// Wait for one work item and run it
    pub(crate) fn run_next(&mut self) {
        let work = self.queue.receiver().recv_timeout(Duration::from_secs(5)).unwrap();
        work(&mut self.native);
    }
}
