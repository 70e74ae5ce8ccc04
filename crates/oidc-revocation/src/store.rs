//! Grant persistence.
//!
//! The store is accessed through get/put/compare-and-swap operations only.
//! All updates to a grant go through [`GrantStore::compare_and_swap`] so a
//! revocation and a concurrent refresh of the same grant serialize.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::error::{RevocationError, RevocationResult};
use crate::grant::Grant;

/// Grant storage provider.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Stores a new grant and indexes its token hashes.
    async fn insert(&self, grant: Grant) -> RevocationResult<()>;

    /// Loads a grant by id.
    async fn load(&self, id: Uuid) -> RevocationResult<Option<Grant>>;

    /// Returns the id of the grant holding the token with `hash`.
    async fn find_by_token_hash(&self, hash: &str) -> RevocationResult<Option<Uuid>>;

    /// Replaces the stored grant if its version still equals
    /// `grant.version`, then bumps the version. Hashes of records no longer
    /// in the grant leave the token index.
    ///
    /// Returns `false` when another writer got there first.
    async fn compare_and_swap(&self, grant: Grant) -> RevocationResult<bool>;

    /// Removes a grant and its token index entries. Removing an absent
    /// grant is not an error.
    async fn remove(&self, id: Uuid) -> RevocationResult<()>;
}

/// In-process grant store backed by [`DashMap`].
///
/// The shard lock taken by `get_mut` makes each compare-and-swap atomic per
/// grant.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    grants: DashMap<Uuid, Grant>,
    token_index: DashMap<String, Uuid>,
}

impl InMemoryGrantStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Returns whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    fn index(&self, grant: &Grant) {
        for record in &grant.tokens {
            self.token_index.insert(record.hash.clone(), grant.id);
        }
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn insert(&self, grant: Grant) -> RevocationResult<()> {
        match self.grants.entry(grant.id) {
            Entry::Occupied(_) => Err(RevocationError::Storage(format!(
                "grant {} already exists",
                grant.id
            ))),
            Entry::Vacant(slot) => {
                self.index(&grant);
                slot.insert(grant);
                Ok(())
            }
        }
    }

    async fn load(&self, id: Uuid) -> RevocationResult<Option<Grant>> {
        Ok(self.grants.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_token_hash(&self, hash: &str) -> RevocationResult<Option<Uuid>> {
        Ok(self.token_index.get(hash).map(|entry| *entry.value()))
    }

    async fn compare_and_swap(&self, mut grant: Grant) -> RevocationResult<bool> {
        let Some(mut current) = self.grants.get_mut(&grant.id) else {
            return Err(RevocationError::Storage(format!(
                "grant {} does not exist",
                grant.id
            )));
        };
        if current.version != grant.version {
            return Ok(false);
        }
        grant.version += 1;
        for record in &current.tokens {
            if grant.token(&record.hash).is_none() {
                self.token_index.remove(&record.hash);
            }
        }
        self.index(&grant);
        *current = grant;
        Ok(true)
    }

    async fn remove(&self, id: Uuid) -> RevocationResult<()> {
        if let Some((_, grant)) = self.grants.remove(&id) {
            for record in &grant.tokens {
                self.token_index.remove(&record.hash);
            }
        }
        Ok(())
    }
}
