//! Capacity group interning.
//!
//! Maps (factory, package type) pairs to dense integer IDs so the capacity
//! ledger can index groups by position instead of hashing string pairs.

use rustc_hash::FxHashMap;
use std::fmt;

/// Interned capacity group ID (dense, assigned in first-seen order).
pub type GroupId = u32;

/// Identity of a capacity group: orders sharing a factory and package type
/// draw from the same daily capacity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub factory: String,
    pub package_type: String,
}

impl GroupKey {
    pub fn new(factory: impl Into<String>, package_type: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            package_type: package_type.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.factory, self.package_type)
    }
}

/// Interner from [`GroupKey`] to [`GroupId`].
#[derive(Debug, Clone)]
pub struct GroupInterner {
    to_int: FxHashMap<GroupKey, GroupId>,
    from_int: Vec<GroupKey>,
}

impl GroupInterner {
    /// Create a new interner with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_int: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_int: Vec::with_capacity(capacity),
        }
    }

    /// Intern a group key, returning its ID.
    /// If already interned, returns the existing ID.
    pub fn intern(&mut self, key: &GroupKey) -> GroupId {
        if let Some(&id) = self.to_int.get(key) {
            return id;
        }
        let id = self.from_int.len() as GroupId;
        self.from_int.push(key.clone());
        self.to_int.insert(key.clone(), id);
        id
    }

    #[inline]
    pub fn get(&self, key: &GroupKey) -> Option<GroupId> {
        self.to_int.get(key).copied()
    }

    /// Get the key for an ID.
    #[inline]
    pub fn resolve(&self, id: GroupId) -> Option<&GroupKey> {
        self.from_int.get(id as usize)
    }

    /// Iterate over (id, key) pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &GroupKey)> {
        self.from_int
            .iter()
            .enumerate()
            .map(|(id, key)| (id as GroupId, key))
    }

    pub fn len(&self) -> usize {
        self.from_int.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_int.is_empty()
    }
}

impl Default for GroupInterner {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
