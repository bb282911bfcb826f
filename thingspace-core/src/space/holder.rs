//! Retention keys.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(u64);

impl HolderId {
    /// Generate a new unique holder ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for HolderId {
    fn default() -> Self {
        Self::new()
    }
}

/// How strongly a holder's Things should survive eviction once released.
///
/// Only breaks ties between Things nobody retains anymore; a retained Thing
/// is never evicted whatever the priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum HolderPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A retention key. Things remembered under a holder stay in the Space
/// until that holder forgets them.
///
/// Holders compare by identity: two holders created with the same name are
/// still distinct.
#[derive(Clone)]
pub struct Holder {
    id: HolderId,
    name: Arc<str>,
    priority: HolderPriority,
}

impl Holder {
    pub fn new(name: impl Into<Arc<str>>, priority: HolderPriority) -> Self {
        Self {
            id: HolderId::new(),
            name: name.into(),
            priority,
        }
    }

    /// A normal priority holder.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, HolderPriority::Normal)
    }

    pub fn id(&self) -> HolderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> HolderPriority {
        self.priority
    }
}

impl PartialEq for Holder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Holder {}

impl std::hash::Hash for Holder {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Holder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("id", &self.id.0)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}
