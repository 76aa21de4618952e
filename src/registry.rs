//! Bidirectional registry between native types and CBOR tag-number chains.
//!
//! A [`TagSet`] is built once and then frozen inside a profile. A
//! [`SharedTagSet`] wraps one behind a lock so independent components can
//! keep registering after the profiles that reference it were built.
//! Encoders wrap registered types in their chain (outermost number first);
//! decoders verify the chain according to the per-item [`DecTagMode`].

use std::any::TypeId;
use std::sync::{Arc, PoisonError, RwLock};

use crate::Error;

/// Encode-side behavior for a registered tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncTagMode {
    /// Do not emit the tag chain when encoding the registered type.
    #[default]
    None,
    /// Always emit the tag chain.
    Required,
}

/// Decode-side behavior for a registered tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecTagMode {
    /// Accept and discard any tag chain without checking it.
    #[default]
    Ignored,
    /// Verify the chain when present; accept untagged content.
    Optional,
    /// Require the full registered chain.
    Required,
}

/// Per-registration behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagOptions {
    /// Encode-side behavior.
    pub enc: EncTagMode,
    /// Decode-side behavior.
    pub dec: DecTagMode,
}

impl TagOptions {
    /// Tag is emitted on encode and required on decode.
    #[must_use]
    pub const fn required() -> Self {
        Self {
            enc: EncTagMode::Required,
            dec: DecTagMode::Required,
        }
    }
}

/// One registered tag-chain ↔ type association.
#[derive(Debug, Clone)]
pub struct TagItem {
    type_id: TypeId,
    type_name: &'static str,
    nums: Vec<u64>,
    opts: TagOptions,
}

impl TagItem {
    /// The tag-number chain, outermost first.
    #[must_use]
    pub fn nums(&self) -> &[u64] {
        &self.nums
    }

    /// Name of the registered native type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The registration's behavior flags.
    #[must_use]
    pub const fn options(&self) -> TagOptions {
        self.opts
    }
}

/// Tag numbers with built-in semantics that cannot be re-registered.
fn is_reserved(num: u64) -> bool {
    matches!(num, 0..=3 | 55799)
}

/// A frozen set of tag registrations.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    items: Vec<TagItem>,
}

impl TagSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under the given tag-number chain (outermost first).
    ///
    /// # Errors
    ///
    /// Returns `Config` if the chain is empty, uses a reserved number
    /// (0–3, 55799), or collides with an existing registration by type or
    /// by chain.
    pub fn register<T: 'static>(
        &mut self,
        nums: impl Into<Vec<u64>>,
        opts: TagOptions,
    ) -> Result<(), Error> {
        let nums = nums.into();
        if nums.is_empty() {
            return Err(Error::Config("tag chain must not be empty".to_owned()));
        }
        for num in &nums {
            if is_reserved(*num) {
                return Err(Error::Config(format!(
                    "tag number {num} is reserved for built-in semantics"
                )));
            }
        }
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        if self.items.iter().any(|item| item.type_id == type_id) {
            return Err(Error::Config(format!(
                "type {type_name} is already registered"
            )));
        }
        if self.items.iter().any(|item| item.nums == nums) {
            return Err(Error::Config(format!(
                "tag chain {nums:?} is already registered"
            )));
        }
        self.items.push(TagItem {
            type_id,
            type_name,
            nums,
            opts,
        });
        Ok(())
    }

    /// Look up the registration for a native type.
    #[must_use]
    pub fn get_by_type(&self, type_id: TypeId) -> Option<&TagItem> {
        self.items.iter().find(|item| item.type_id == type_id)
    }

    /// Find the registration whose chain is the longest prefix of `chain`.
    #[must_use]
    pub fn get_by_nums(&self, chain: &[u64]) -> Option<&TagItem> {
        self.items
            .iter()
            .filter(|item| {
                item.nums.len() <= chain.len() && chain[..item.nums.len()] == item.nums[..]
            })
            .max_by_key(|item| item.nums.len())
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no registrations exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A tag set that stays registrable after profiles were built from it.
///
/// Cloning shares the underlying set. Registration from any number of
/// threads is serialized by the lock; lookups made by in-flight
/// encode/decode calls take the read side.
#[derive(Debug, Clone, Default)]
pub struct SharedTagSet {
    inner: Arc<RwLock<TagSet>>,
}

impl SharedTagSet {
    /// Create an empty shared set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under the given tag-number chain (outermost first).
    ///
    /// # Errors
    ///
    /// Same rules as [`TagSet::register`].
    pub fn register<T: 'static>(
        &self,
        nums: impl Into<Vec<u64>>,
        opts: TagOptions,
    ) -> Result<(), Error> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register::<T>(nums, opts)
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&TagSet) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// The tag lookup side of a profile.
#[derive(Debug, Clone, Default)]
pub(crate) enum TagSource {
    #[default]
    None,
    Frozen(Arc<TagSet>),
    Shared(SharedTagSet),
}

/// An owned snapshot of one registration, cheap enough to clone out of the
/// shared set's lock.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredTags {
    pub nums: Vec<u64>,
    pub opts: TagOptions,
}

impl TagSource {
    pub(crate) fn for_type(&self, type_id: TypeId) -> Option<RegisteredTags> {
        let snapshot = |item: &TagItem| RegisteredTags {
            nums: item.nums.clone(),
            opts: item.opts,
        };
        match self {
            Self::None => None,
            Self::Frozen(set) => set.get_by_type(type_id).map(snapshot),
            Self::Shared(set) => set.with(|set| set.get_by_type(type_id).map(snapshot)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TagOptions, TagSet};

    struct Cid([u8; 4]);
    struct Other(u8);

    #[test]
    fn reserved_numbers_are_rejected() {
        let mut set = TagSet::new();
        for num in [0u64, 1, 2, 3, 55799] {
            let err = set.register::<Cid>([num], TagOptions::required()).unwrap_err();
            assert!(err.to_string().contains("reserved"), "tag {num}: {err}");
        }
    }

    #[test]
    fn duplicate_registrations_are_rejected() {
        let mut set = TagSet::new();
        set.register::<Cid>([42], TagOptions::required()).unwrap();
        assert!(set.register::<Cid>([43], TagOptions::required()).is_err());
        assert!(set.register::<Other>([42], TagOptions::required()).is_err());
        set.register::<Other>([42, 99], TagOptions::required())
            .unwrap();
    }

    #[test]
    fn longest_prefix_wins() {
        let mut set = TagSet::new();
        set.register::<Cid>([42], TagOptions::required()).unwrap();
        set.register::<Other>([42, 99], TagOptions::required())
            .unwrap();

        let hit = set.get_by_nums(&[42, 99, 7]).unwrap();
        assert_eq!(hit.nums(), &[42, 99]);
        let hit = set.get_by_nums(&[42, 7]).unwrap();
        assert_eq!(hit.nums(), &[42]);
        assert!(set.get_by_nums(&[41]).is_none());
    }
}
