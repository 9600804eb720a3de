//! The application-facing window handle
//!
//! [`Window`] is a cheap, cloneable handle usable from any thread. Everything
//! that touches the native window goes through the main-thread dispatcher;
//! everything else (property reads, subscriptions, input state) is answered
//! from shared state directly.

use crate::dispatch::{DispatchError, Dispatcher};
use crate::event::{Event, EventMask};
use crate::input::{KeyboardWatcher, MouseWatcher};
use crate::loader::{LoaderError, LoaderHandle};
use crate::native::{NativeOp, NativeWindow};
use crate::notify::NotificationRegistry;
use crate::props::{PropertyState, Props};
use crate::reconcile;
use crate::device::Renderer;
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;

/// State shared between the run loop, the translator and window handles
pub(crate) struct Shared {
    pub(crate) state: RwLock<PropertyState>,
    pub(crate) registry: NotificationRegistry,
    pub(crate) keyboard: KeyboardWatcher,
    pub(crate) mouse: MouseWatcher,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) loader: LoaderHandle,
    shutdown: Sender<()>,
}

impl Shared {
    pub(crate) fn new(
        props: Props,
        dispatcher: Dispatcher,
        renderer: Arc<dyn Renderer>,
        loader: LoaderHandle,
        shutdown: Sender<()>,
    ) -> Self {
        Self {
            state: RwLock::new(PropertyState::new(props)),
            registry: NotificationRegistry::new(),
            keyboard: KeyboardWatcher::new(),
            mouse: MouseWatcher::new(),
            dispatcher,
            renderer,
            loader,
            shutdown,
        }
    }

    /// Signal the run loop to shut down; repeated requests collapse into one
    pub(crate) fn request_close(&self) {
        match self.shutdown.try_send(()) {
            Ok(()) => log::debug!("Window close requested"),
            Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => log::trace!("Close requested after shutdown"),
        }
    }

    /// Bring the native window in line with `props`; main thread only
    pub(crate) fn reconcile(&self, native: &mut dyn NativeWindow, props: &Props, force: bool) {
        let frame_rate = self.renderer.frame_rate();
        let mut state = self.state.write();
        let previous = state.last.clone();
        let previous_title = state.applied_title.clone();
        let ops = reconcile::plan(&mut state, props, force, native, frame_rate);
        let failed = reconcile::apply(native, &ops);
        if !failed.is_empty() {
            log::debug!("{} of {} property changes failed", failed.len(), ops.len());
            reconcile::revert(&mut state, &previous, previous_title, &failed);
        }
    }

    /// Re-render the title with the current frame rate; main thread only
    pub(crate) fn refresh_title(&self, native: &mut dyn NativeWindow) {
        let frame_rate = self.renderer.frame_rate();
        let mut state = self.state.write();
        let previous = state.last.clone();
        let previous_title = state.applied_title.clone();
        let ops = [reconcile::title_op(&mut state, frame_rate)];
        let failed = reconcile::apply(native, &ops);
        reconcile::revert(&mut state, &previous, previous_title, &failed);
    }
}

/// Handle to the running window
///
/// Clone it freely; every clone refers to the same window. Calls that need the
/// native library return [`DispatchError::Closed`] once the run loop has shut
/// down.
#[derive(Clone)]
pub struct Window {
    shared: Arc<Shared>,
}

impl Window {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Current window properties
    ///
    /// Reflects the last request plus any change reported by the native window
    /// since, such as a user resize.
    pub fn props(&self) -> Props {
        self.shared.state.read().requested.clone()
    }

    /// Ask for the window to take on `props`
    ///
    /// Returns once the request is queued. Fields that can only be chosen at
    /// creation are recorded but otherwise ignored.
    pub fn request(&self, props: Props) -> Result<(), DispatchError> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .dispatcher
            .run(move |native| shared.reconcile(native, &props, false))
    }

    /// Keyboard state
    pub fn keyboard(&self) -> &KeyboardWatcher {
        &self.shared.keyboard
    }

    /// Mouse button state
    pub fn mouse(&self) -> &MouseWatcher {
        &self.shared.mouse
    }

    /// Replace the clipboard contents
    pub fn set_clipboard(&self, text: impl Into<String>) -> Result<(), DispatchError> {
        let op = NativeOp::SetClipboard(text.into());
        self.shared.dispatcher.run(move |native| {
            let _ = reconcile::apply(native, &[op]);
        })
    }

    /// Current clipboard contents; empty when the clipboard holds no text
    ///
    /// Blocks until the main thread answers.
    pub fn clipboard(&self) -> Result<String, DispatchError> {
        self.shared
            .dispatcher
            .call(|native| native.clipboard().unwrap_or_default())
    }

    /// Send events matching `mask` to `queue`
    ///
    /// Subscribing the same queue twice delivers matching events twice.
    /// [`EventMask::NO_EVENTS`] removes every subscription of `queue`. Delivery
    /// never blocks; events that don't fit in `queue` are lost.
    pub fn notify(&self, queue: &Sender<Event>, mask: EventMask) {
        self.shared.registry.subscribe(queue, mask);
    }

    /// Close the window; `run` returns once teardown completes
    pub fn close(&self) {
        self.shared.request_close();
    }

    /// Run `f` with the loader context released from the loader thread
    ///
    /// The loader re-attaches as soon as `f` returns or unwinds.
    pub fn without_loader_context<F, R>(&self, f: F) -> Result<R, LoaderError>
    where
        F: FnOnce() -> R,
    {
        self.shared.loader.without_context(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crossbeam_channel::bounded;

    #[test]
    fn test_request_is_applied_on_main_thread() {
        let mut fixture = Fixture::new(Props::default());
        let window = fixture.window();

        let props = window.props().with_size(1024, 768);
        window.request(props.clone()).unwrap();
        assert_eq!(window.props().size, (800, 450));

        fixture.run_pending();
        assert_eq!(window.props(), props);
        assert_eq!(fixture.probe.ops(), vec![NativeOp::SetSize { width: 1024, height: 768 }]);
    }

    #[test]
    fn test_rejected_resize_is_retried() {
        let mut fixture = Fixture::new(Props::default());
        let window = fixture.window();
        let props = window.props().with_size(1024, 768);

        fixture.probe.fail_ops(true);
        window.request(props.clone()).unwrap();
        fixture.run_pending();
        assert_eq!(fixture.shared.state.read().last.size, (800, 450));

        fixture.probe.fail_ops(false);
        fixture.probe.take_ops();
        window.request(props).unwrap();
        fixture.run_pending();
        assert_eq!(fixture.shared.state.read().last.size, (1024, 768));
        assert_eq!(fixture.probe.ops(), vec![NativeOp::SetSize { width: 1024, height: 768 }]);
    }

    #[test]
    fn test_clipboard_round_trips_through_main_thread() {
        let mut fixture = Fixture::new(Props::default());
        let window = fixture.window();

        window.set_clipboard("copied").unwrap();
        fixture.run_pending();
        assert_eq!(fixture.probe.clipboard(), Some("copied".to_string()));

        let reader = std::thread::spawn(move || window.clipboard());
        fixture.run_next();
        assert_eq!(reader.join().unwrap(), Ok("copied".to_string()));
    }

    #[test]
    fn test_close_signals_shutdown_once() {
        let fixture = Fixture::new(Props::default());
        let window = fixture.window();

        window.close();
        window.close();

        assert!(fixture.shutdown.try_recv().is_ok());
        assert!(fixture.shutdown.try_recv().is_err());
    }

    #[test]
    fn test_notify_subscribes_and_unsubscribes() {
        let fixture = Fixture::new(Props::default());
        let window = fixture.window();
        let (tx, _rx) = bounded(4);

        window.notify(&tx, EventMask::KEYBOARD);
        assert_eq!(fixture.shared.registry.len(), 1);
        window.notify(&tx, EventMask::NO_EVENTS);
        assert!(fixture.shared.registry.is_empty());
    }

    #[test]
    fn test_requests_fail_after_queue_closes() {
        let fixture = Fixture::new(Props::default());
        let window = fixture.window();
        fixture.queue.close();

        assert_eq!(window.request(Props::default()), Err(DispatchError::Closed));
        assert_eq!(window.clipboard(), Err(DispatchError::Closed));
    }
}
