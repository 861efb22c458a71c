//! IPC Thread State
//!
//! Each thread owns a queue of outgoing commands that have not been sent yet.
//! Reference releases are batched here instead of being dispatched the moment
//! they happen; [`flush_commands`] sends everything queued on the calling
//! thread synchronously.
//!
//! Delivery is best effort: a command that fails is logged and dropped.
//! Whatever is still queued when a thread exits is sent from the thread-local
//! destructor.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use crate::error::StatusError;

type SendFn = Box<dyn FnOnce() -> Result<(), StatusError> + Send>;

/// A queued outgoing command
pub struct PendingCommand {
    label: String,
    send: SendFn,
}

impl PendingCommand {
    /// Create a command with a label used in logs
    pub fn new<F>(label: impl Into<String>, send: F) -> Self
    where
        F: FnOnce() -> Result<(), StatusError> + Send + 'static,
    {
        Self {
            label: label.into(),
            send: Box::new(send),
        }
    }

    /// Label used in logs
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn dispatch(self) -> Result<(), StatusError> {
        (self.send)()
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct ThreadState {
    out: VecDeque<PendingCommand>,
}

impl Drop for ThreadState {
    // The thread is exiting; nothing will flush this queue again.
    fn drop(&mut self) {
        let mut delivered = 0;
        for command in self.out.drain(..) {
            if deliver(command, "thread exit") {
                delivered += 1;
            }
        }
        if delivered > 0 {
            tracing::trace!(commands = delivered, "IPC queue flushed at thread exit");
        }
    }
}

/// Send one command, logging the outcome; returns whether it was delivered
fn deliver(command: PendingCommand, during: &str) -> bool {
    let label = command.label.clone();
    match command.dispatch() {
        Ok(()) => {
            tracing::trace!(command = %label, "IPC command sent");
            true
        }
        Err(e) => {
            tracing::debug!(command = %label, error = %e, during, "IPC command failed");
            false
        }
    }
}

thread_local! {
    static THREAD_STATE: RefCell<ThreadState> = RefCell::new(ThreadState::default());
}

/// Queue a command on the current thread
///
/// If the thread is tearing down and its queue is gone, the command is sent
/// immediately instead.
pub fn queue_command(command: PendingCommand) {
    let mut slot = Some(command);
    let _ = THREAD_STATE.try_with(|state| {
        if let Some(command) = slot.take() {
            state.borrow_mut().out.push_back(command);
        }
    });

    if let Some(command) = slot {
        deliver(command, "thread teardown");
    }
}

/// Number of commands waiting on the current thread
#[must_use]
pub fn pending_commands() -> usize {
    THREAD_STATE
        .try_with(|state| state.borrow().out.len())
        .unwrap_or(0)
}

/// Send every command queued on the current thread
///
/// Commands queued while flushing (a delivery that drops another reference)
/// are sent in the same call. Failures are logged and suppressed.
///
/// Returns the number of commands delivered successfully.
pub fn flush_commands() -> usize {
    let mut delivered = 0;

    loop {
        let batch = THREAD_STATE
            .try_with(|state| std::mem::take(&mut state.borrow_mut().out))
            .unwrap_or_default();
        if batch.is_empty() {
            break;
        }

        for command in batch {
            if deliver(command, "flush") {
                delivered += 1;
            }
        }
    }

    delivered
}
