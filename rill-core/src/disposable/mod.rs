//! Disposables
//!
//! A disposable is a one-way cancellation token. It starts active and becomes
//! disposed exactly once; every later `dispose()` call is a no-op.
//!
//! # Kinds
//!
//! - [`Disposable::empty`]: a bare flag that can be queried with
//!   `is_disposed()`.
//! - [`Disposable::new`]: runs an action the first time it is disposed.
//! - [`CompoundDisposable`]: owns a set of children and disposes all of them.
//! - [`SerialDisposable`]: owns a single child that can be swapped out.
//!
//! All kinds share one representation, so a compound or serial disposable can
//! be stored as a child of another compound without boxing.
//!
//! # Thread Safety
//!
//! The payload (action or children) sits behind a mutex. The disposed flag is
//! flipped while holding that mutex, and the payload is taken out before the
//! lock is released, so:
//!
//! - two threads racing to dispose run the payload exactly once,
//! - a child added to an already-disposed compound is disposed on the spot,
//! - an action that disposes its own disposable sees the flag already set and
//!   returns instead of re-entering the lock.

mod compound;
mod serial;

pub use compound::CompoundDisposable;
pub use serial::SerialDisposable;

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

/// Unique identifier for a disposable.
///
/// Compound disposables key their children by id so a child can be detached
/// without comparing trait objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisposableId(u64);

impl DisposableId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What gets torn down on disposal.
pub(crate) enum Payload {
    Flag,
    Action(Box<dyn FnOnce() + Send>),
    Compound(IndexMap<DisposableId, Disposable>),
    Serial(Option<Disposable>),
}

struct Inner {
    id: DisposableId,
    disposed: AtomicBool,
    payload: Mutex<Payload>,
}

/// A cancellation token.
///
/// Cloning a `Disposable` yields another handle to the same token.
#[derive(Clone)]
pub struct Disposable {
    inner: Arc<Inner>,
}

impl Disposable {
    /// Create a disposable that runs `action` when first disposed.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_payload(Payload::Action(Box::new(action)))
    }

    /// Create a disposable with no action; only its state is observable.
    pub fn empty() -> Self {
        Self::with_payload(Payload::Flag)
    }

    pub(crate) fn with_payload(payload: Payload) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: DisposableId::next(),
                disposed: AtomicBool::new(false),
                payload: Mutex::new(payload),
            }),
        }
    }

    /// Get the disposable's unique ID.
    pub fn id(&self) -> DisposableId {
        self.inner.id
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Dispose the receiver, running its action or disposing its children.
    ///
    /// Safe to call any number of times, from any thread.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }

        let payload = {
            let mut payload = self.inner.payload.lock();
            if self.inner.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::replace(&mut *payload, Payload::Flag)
        };

        trace!(disposable = self.inner.id.0, "disposing");

        match payload {
            Payload::Flag => {}
            Payload::Action(action) => action(),
            Payload::Compound(children) => {
                for child in children.into_values() {
                    child.dispose();
                }
            }
            Payload::Serial(child) => {
                if let Some(child) = child {
                    child.dispose();
                }
            }
        }
    }

    /// Create a non-owning handle to this disposable.
    pub fn downgrade(&self) -> WeakDisposable {
        WeakDisposable {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Wrap the receiver so it is disposed when the wrapper is dropped.
    pub fn scoped(self) -> ScopedDisposable {
        ScopedDisposable {
            disposable: self,
            armed: true,
        }
    }

    /// Run `f` on the payload while the disposable is still active.
    ///
    /// Returns `None` without calling `f` once disposed. The disposed flag is
    /// only ever set under this lock, so `f` never observes a payload that is
    /// being torn down.
    pub(crate) fn with_active_payload<R>(&self, f: impl FnOnce(&mut Payload) -> R) -> Option<R> {
        let mut payload = self.inner.payload.lock();
        if self.is_disposed() {
            return None;
        }
        Some(f(&mut payload))
    }

    /// Detach a child from a compound payload without disposing it.
    pub(crate) fn remove_child(&self, id: DisposableId) -> Option<Disposable> {
        self.with_active_payload(|payload| match payload {
            Payload::Compound(children) => children.shift_remove(&id),
            _ => None,
        })
        .flatten()
    }

    pub(crate) fn ptr_eq(&self, other: &Disposable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Disposable {
    fn default() -> Self {
        Self::empty()
    }
}

impl Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("id", &self.inner.id.0)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A non-owning reference to a [`Disposable`].
///
/// Subscribers use this to point back at the tree tracking their
/// subscription without keeping that tree alive.
#[derive(Clone)]
pub struct WeakDisposable {
    inner: Weak<Inner>,
}

impl WeakDisposable {
    /// Get a strong handle if the disposable is still alive.
    pub fn upgrade(&self) -> Option<Disposable> {
        self.inner.upgrade().map(|inner| Disposable { inner })
    }
}

impl Debug for WeakDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakDisposable")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Disposes the wrapped disposable when dropped.
#[derive(Debug)]
pub struct ScopedDisposable {
    disposable: Disposable,
    armed: bool,
}

impl ScopedDisposable {
    /// Release the wrapped disposable without disposing it.
    pub fn into_inner(mut self) -> Disposable {
        self.armed = false;
        self.disposable.clone()
    }
}

impl std::ops::Deref for ScopedDisposable {
    type Target = Disposable;

    fn deref(&self) -> &Disposable {
        &self.disposable
    }
}

impl Drop for ScopedDisposable {
    fn drop(&mut self) {
        if self.armed {
            self.disposable.dispose();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
