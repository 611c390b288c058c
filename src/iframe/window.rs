//! The parent window's message bus.
//!
//! A [`MessageWindow`] stands in for the browser window that receives `postMessage` events.
//! It holds a single slot: the installed listener together with the session it serves.
//! Installing a listener replaces whatever was there in the same critical section and hands
//! the replaced session back, so there is never a moment with two listeners, never one where
//! a replaced listener can still fire, and never a session that outlives its slot unnoticed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::iframe::channel::IframeSession;

/// A message posted to the parent window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Origin of the sender as reported by the browser, e.g. `https://3cities.xyz`.
    pub origin: String,
    /// The message `data`, as JSON text.
    pub data: String,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            data: data.into(),
        }
    }
}

/// What the installed listener did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    NoListener,
    /// Origin did not match the session; dropped.
    UntrustedOrigin,
    /// Data was not a recognizable event; logged and dropped.
    Malformed,
    /// A known event that requires no action, or an unknown kind.
    Ignored,
    /// The event changed the session (payment signed, iframe closed).
    Handled,
}

pub type MessageHandler = Arc<dyn Fn(&InboundMessage) -> DispatchOutcome + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry<S> {
    id: ListenerId,
    /// `None` once the listener stopped listening while its session stays open.
    handler: Option<MessageHandler>,
    session: S,
}

pub struct MessageWindow<S = IframeSession> {
    slot: Mutex<Option<Entry<S>>>,
    next_id: AtomicU64,
}

impl<S> Default for MessageWindow<S> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<S> MessageWindow<S> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Entry<S>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Installs the listener and session built by `make`, replacing the current ones.
    ///
    /// `make` receives the id the listener is installed under, so the handler can later
    /// remove itself. Returns that id and the session that was replaced, if any.
    pub fn install<F>(&self, make: F) -> (ListenerId, Option<S>)
    where
        F: FnOnce(ListenerId) -> (MessageHandler, S),
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (handler, session) = make(id);
        let replaced = self.slot().replace(Entry {
            id,
            handler: Some(handler),
            session,
        });
        let replaced = replaced.map(|previous| {
            tracing::debug!(previous = ?previous.id, current = ?id, "Replaced message listener");
            previous.session
        });
        (id, replaced)
    }

    /// Stops `id` from listening and runs `f` on its session, which stays in place.
    ///
    /// Returns `None` when `id` is not the listening entry.
    pub fn detach<R>(&self, id: ListenerId, f: impl FnOnce(&S) -> R) -> Option<R> {
        let mut slot = self.slot();
        let entry = slot
            .as_mut()
            .filter(|entry| entry.id == id && entry.handler.is_some())?;
        entry.handler = None;
        Some(f(&entry.session))
    }

    /// Removes the entry and hands back its session if `id` is still the installed one.
    pub fn remove(&self, id: ListenerId) -> Option<S> {
        let mut slot = self.slot();
        match slot.as_ref() {
            Some(entry) if entry.id == id => slot.take().map(|entry| entry.session),
            _ => None,
        }
    }

    pub fn listener_count(&self) -> usize {
        usize::from(self.slot().as_ref().is_some_and(|e| e.handler.is_some()))
    }

    /// True while `id` is installed and listening.
    pub fn is_installed(&self, id: ListenerId) -> bool {
        matches!(self.slot().as_ref(), Some(e) if e.id == id && e.handler.is_some())
    }

    /// True while the session installed with `id` holds the slot, listening or not.
    pub fn is_current(&self, id: ListenerId) -> bool {
        matches!(self.slot().as_ref(), Some(e) if e.id == id)
    }

    /// Delivers `message` to the installed listener, if any.
    ///
    /// The slot lock is released before the handler runs, so a handler may remove itself.
    pub fn dispatch(&self, message: &InboundMessage) -> DispatchOutcome {
        let handler = self
            .slot()
            .as_ref()
            .and_then(|entry| entry.handler.clone());
        match handler {
            Some(handler) => handler(message),
            None => DispatchOutcome::NoListener,
        }
    }
}
