//! Application context

use std::path::PathBuf;

use crate::storage::{FileMedium, VersionedStore};
use crate::task::TaskRepository;
use crate::user::UserRepository;
use crate::Result;

/// Application-wide data context.
///
/// Bundles the versioned store with the repositories built on top of it,
/// so callers thread one value through instead of reaching for globals.
/// Both repositories share the store's underlying medium.
pub struct AppContext {
    pub storage: VersionedStore,
    pub tasks: TaskRepository,
    pub users: UserRepository,
}

impl AppContext {
    /// Build the context from an existing store.
    pub fn new(storage: VersionedStore) -> Self {
        let tasks = TaskRepository::new(storage.clone());
        let users = UserRepository::new(storage.clone());

        Self {
            storage,
            tasks,
            users,
        }
    }

    /// Open a file-backed context at the given path.
    pub fn open(app_name: &str, version: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let medium = FileMedium::open(path)?;
        Ok(Self::new(VersionedStore::new(app_name, version, medium)))
    }
}
