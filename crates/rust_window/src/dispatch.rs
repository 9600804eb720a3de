//! Main-thread dispatch
//!
//! The native library may only be called from the thread running the main
//! loop. Any other thread reaches it by enqueuing a [`Work`] item through a
//! [`Dispatcher`]; the run loop is the single consumer of the matching
//! [`DispatchQueue`] and lends the native window to each item in turn.
//!
//! Items from one thread run in the order that thread enqueued them. Nothing
//! is promised across threads. Items still queued at shutdown are dropped
//! without running.

use crate::native::NativeWindow;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use thiserror::Error;

/// A unit of work for the main thread
pub type Work = Box<dyn FnOnce(&mut dyn NativeWindow) + Send + 'static>;

/// Dispatch errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The main loop has shut down; the work did not (or will not) run
    #[error("Main loop has shut down")]
    Closed,

    /// A synchronous call was made from the main thread itself
    #[error("Synchronous dispatch from the main thread would deadlock")]
    WouldDeadlock,
}

/// Create a dispatcher and its queue with room for `capacity` pending items
pub fn channel(capacity: usize) -> (Dispatcher, DispatchQueue) {
    let (tx, rx) = bounded(capacity);
    let owner = Arc::new(OnceLock::new());
    (
        Dispatcher { tx, owner: Arc::clone(&owner) },
        DispatchQueue { rx, owner },
    )
}

/// Producer side; cheap to clone and usable from any thread
#[derive(Clone)]
pub struct Dispatcher {
    tx: Sender<Work>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl Dispatcher {
    /// Run `f` on the main thread without waiting for it
    ///
    /// Blocks only while the queue is full.
    pub fn run<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut dyn NativeWindow) + Send + 'static,
    {
        self.tx.send(Box::new(f)).map_err(|_| DispatchError::Closed)
    }

    /// Run `f` on the main thread and wait for its result
    ///
    /// This is the only way to get a value back from a native call made off
    /// the main thread.
    pub fn call<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut dyn NativeWindow) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.owner.get() == Some(&thread::current().id()) {
            return Err(DispatchError::WouldDeadlock);
        }

        let (done_tx, done_rx) = bounded(1);
        self.run(move |native| {
            let _ = done_tx.send(f(native));
        })?;

        // A dropped item drops `done_tx` with it.
        done_rx.recv().map_err(|_| DispatchError::Closed)
    }
}

/// Consumer side, owned by the run loop
pub struct DispatchQueue {
    rx: Receiver<Work>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl DispatchQueue {
    /// Mark the calling thread as the one executing work
    pub fn bind_current_thread(&self) {
        let _ = self.owner.set(thread::current().id());
    }

    /// Receiver for use in `select!`
    pub fn receiver(&self) -> &Receiver<Work> {
        &self.rx
    }

    /// Run every item queued right now
    pub fn run_pending(&self, native: &mut dyn NativeWindow) -> usize {
        let mut count = 0;
        while let Ok(work) = self.rx.try_recv() {
            work(native);
            count += 1;
        }
        count
    }

    /// Close the queue, dropping pending items unexecuted
    ///
    /// Waiting synchronous callers are released with [`DispatchError::Closed`].
    pub fn close(self) -> usize {
        self.rx.try_iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::headless::HeadlessPlatform;
    use crate::native::{NativeOp, Platform};
    use crate::props::Props;
    use std::time::Duration;

    #[test]
    fn test_call_returns_value_from_main_thread() {
        let (dispatcher, queue) = channel(4);
        queue.bind_current_thread();
        let mut platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let mut native = platform.create_surfaces(&Props::default()).unwrap().window;
        probe.set_video_mode(None);

        let caller = thread::spawn(move || dispatcher.call(|native| native.primary_video_mode()));

        let work = queue.receiver().recv_timeout(Duration::from_secs(5)).unwrap();
        work(&mut native);

        assert_eq!(caller.join().unwrap(), Ok(None));
    }

    #[test]
    fn test_same_thread_order_is_preserved() {
        let (dispatcher, queue) = channel(8);
        let mut platform = HeadlessPlatform::new();
        let probe = platform.probe();
        let mut native = platform.create_surfaces(&Props::default()).unwrap().window;

        for i in 0..5 {
            dispatcher
                .run(move |native| {
                    let _ = native.apply(&NativeOp::SetTitle(i.to_string()));
                })
                .unwrap();
        }
        assert_eq!(queue.run_pending(&mut native), 5);

        let titles: Vec<NativeOp> = (0..5).map(|i| NativeOp::SetTitle(i.to_string())).collect();
        assert_eq!(probe.ops(), titles);
    }

    #[test]
    fn test_closed_queue_releases_callers() {
        let (dispatcher, queue) = channel(4);
        let waiting = {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || dispatcher.call(|_| 7))
        };

        // Wait until the item is queued, then shut down without running it.
        while queue.receiver().is_empty() {
            thread::yield_now();
        }
        assert_eq!(queue.close(), 1);

        assert_eq!(waiting.join().unwrap(), Err(DispatchError::Closed));
        assert_eq!(dispatcher.run(|_| {}), Err(DispatchError::Closed));
    }

    #[test]
    fn test_call_from_main_thread_is_refused() {
        let (dispatcher, queue) = channel(4);
        queue.bind_current_thread();
        assert_eq!(dispatcher.call(|_| ()), Err(DispatchError::WouldDeadlock));
    }
}
