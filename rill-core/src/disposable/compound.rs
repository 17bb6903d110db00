//! Compound disposables: the interior nodes of the cancellation tree.

use std::fmt::Debug;

use indexmap::IndexMap;

use super::{Disposable, DisposableId, Payload, WeakDisposable};

/// A disposable that owns a set of child disposables.
///
/// Disposing the compound disposes every child it holds at that moment.
/// Children added afterwards are disposed immediately instead of being kept.
#[derive(Clone)]
pub struct CompoundDisposable(Disposable);

impl CompoundDisposable {
    /// Create an empty compound disposable.
    pub fn new() -> Self {
        Self(Disposable::with_payload(Payload::Compound(IndexMap::new())))
    }

    /// Get the compound's unique ID.
    pub fn id(&self) -> DisposableId {
        self.0.id()
    }

    /// Whether the compound has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.0.is_disposed()
    }

    /// Dispose the compound and all of its children.
    pub fn dispose(&self) {
        self.0.dispose();
    }

    /// Add a child.
    ///
    /// If the compound is already disposed, `child` is disposed right away.
    pub fn add(&self, child: impl Into<Disposable>) {
        let child = child.into();
        if child.ptr_eq(&self.0) {
            return;
        }

        let rejected = self
            .0
            .with_active_payload(|payload| match payload {
                Payload::Compound(children) => {
                    children.insert(child.id(), child.clone());
                    false
                }
                _ => true,
            })
            .unwrap_or(true);

        if rejected {
            child.dispose();
        }
    }

    /// Detach a child without disposing it.
    ///
    /// Used when a child's lifetime ended on its own (for example, an inner
    /// subscription completed) so long-lived compounds do not grow forever.
    pub fn remove(&self, id: DisposableId) -> Option<Disposable> {
        self.0.remove_child(id)
    }

    /// Number of children currently held.
    pub fn len(&self) -> usize {
        self.0
            .with_active_payload(|payload| match payload {
                Payload::Compound(children) => children.len(),
                _ => 0,
            })
            .unwrap_or(0)
    }

    /// Whether the compound currently holds no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a non-owning handle to this compound.
    pub fn downgrade(&self) -> WeakDisposable {
        self.0.downgrade()
    }

    /// Borrow the compound as a plain disposable.
    pub fn as_disposable(&self) -> &Disposable {
        &self.0
    }
}

impl Default for CompoundDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Disposable> for CompoundDisposable {
    fn from_iter<I: IntoIterator<Item = Disposable>>(iter: I) -> Self {
        let compound = Self::new();
        for child in iter {
            compound.add(child);
        }
        compound
    }
}

impl From<CompoundDisposable> for Disposable {
    fn from(compound: CompoundDisposable) -> Self {
        compound.0
    }
}

impl Debug for CompoundDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundDisposable")
            .field("id", &self.id().raw())
            .field("children", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
