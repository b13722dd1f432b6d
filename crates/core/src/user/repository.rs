//! In-memory user repository backed by a versioned store

use indexmap::IndexMap;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::storage::{LoadReport, SkippedRecord, VersionedStore};
use crate::{Error, Result};

use super::model::{CreateUserRequest, PreferencesPatch, User};

/// Entity slot the user collection persists under.
const USERS_SLOT: &str = "users";

/// In-memory user collection keyed by id, with username uniqueness
/// enforced at creation time. Persisted as a whole after every mutation.
pub struct UserRepository {
    store: VersionedStore,
    users: IndexMap<Uuid, User>,
    load_report: LoadReport,
}

impl UserRepository {
    /// Load the persisted collection eagerly. Each record has its username
    /// and email re-normalized; records that fail to deserialize or
    /// normalize are skipped.
    pub fn new(store: VersionedStore) -> Self {
        let snapshots: Vec<serde_json::Value> = store.load(USERS_SLOT, Vec::new());

        let mut users = IndexMap::new();
        let mut skipped = Vec::new();

        for (index, snapshot) in snapshots.into_iter().enumerate() {
            let mut user: User = match serde_json::from_value(snapshot) {
                Ok(user) => user,
                Err(e) => {
                    warn!("Skipping user record {}: {}", index, e);
                    skipped.push(SkippedRecord {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if let Err(e) = user.normalize() {
                warn!("Skipping invalid user record {}: {}", index, e);
                skipped.push(SkippedRecord {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
            users.insert(user.id, user);
        }

        let load_report = LoadReport {
            loaded: users.len(),
            skipped,
        };
        debug!(
            "Loaded {} users ({} skipped)",
            load_report.loaded,
            load_report.skipped.len()
        );

        Self {
            store,
            users,
            load_report,
        }
    }

    /// Outcome of the eager load performed at construction.
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Create a validated account and persist the collection. Usernames
    /// are unique after normalization.
    pub fn create(&mut self, request: CreateUserRequest) -> Result<User> {
        let user = match User::new(request) {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to create user: {}", e);
                return Err(e);
            }
        };

        if self
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            let e = Error::Validation(format!("Username '{}' already exists", user.username));
            error!("Failed to create user: {}", e);
            return Err(e);
        }

        self.users.insert(user.id, user.clone());
        self.persist();
        debug!("Created user {}", user.id);
        Ok(user)
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).cloned()
    }

    /// Lookup by username; the query is normalized the same way stored
    /// usernames are.
    pub fn find_by_username(&self, username: &str) -> Option<User> {
        let needle = username.trim().to_lowercase();
        self.users
            .values()
            .find(|user| user.username == needle)
            .cloned()
    }

    /// All users in insertion order.
    pub fn find_all(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    pub fn find_active(&self) -> Vec<User> {
        self.users
            .values()
            .filter(|user| user.is_active)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring match over username, full name, or email.
    pub fn search(&self, query: &str) -> Vec<User> {
        let needle = query.to_lowercase();
        self.users
            .values()
            .filter(|user| {
                user.username.contains(&needle)
                    || user.full_name.to_lowercase().contains(&needle)
                    || user.email.contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Change full name and/or email of one account. An unknown id
    /// returns `Ok(None)`; a validation failure leaves the stored record
    /// untouched.
    pub fn update_profile(
        &mut self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        let Some(current) = self.users.get(&id) else {
            return Ok(None);
        };

        let mut next = current.clone();
        if let Err(e) = next.update_profile(full_name, email) {
            error!("Failed to update user {}: {}", id, e);
            return Err(e);
        }

        self.users.insert(id, next.clone());
        self.persist();
        debug!("Updated user {}", id);
        Ok(Some(next))
    }

    /// Merge a preference patch into one account.
    pub fn update_preferences(&mut self, id: Uuid, patch: &PreferencesPatch) -> Option<User> {
        self.modify(id, |user| user.update_preferences(patch))
    }

    /// Stamp the account with the current login time.
    pub fn record_login(&mut self, id: Uuid) -> Option<User> {
        self.modify(id, User::record_login)
    }

    /// Activate or deactivate one account.
    pub fn set_active(&mut self, id: Uuid, active: bool) -> Option<User> {
        self.modify(id, |user| {
            if active {
                user.activate();
            } else {
                user.deactivate();
            }
        })
    }

    /// Remove an account. Returns whether it existed.
    pub fn delete(&mut self, id: Uuid) -> bool {
        if self.users.shift_remove(&id).is_none() {
            return false;
        }
        self.persist();
        debug!("Deleted user {}", id);
        true
    }

    fn modify(&mut self, id: Uuid, apply: impl FnOnce(&mut User)) -> Option<User> {
        let mut next = self.users.get(&id)?.clone();
        apply(&mut next);

        self.users.insert(id, next.clone());
        self.persist();
        debug!("Updated user {}", id);
        Some(next)
    }

    fn persist(&self) {
        let snapshot: Vec<&User> = self.users.values().collect();
        if !self.store.save(USERS_SLOT, &snapshot) {
            warn!("User collection not persisted; keeping in-memory state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryMedium;
    use crate::task::TaskCategory;
    use serde_json::json;

    fn create_test_store() -> VersionedStore {
        VersionedStore::new("testapp", "1.0", MemoryMedium::new())
    }

    fn create_test_repository() -> UserRepository {
        UserRepository::new(create_test_store())
    }

    fn request(username: &str) -> CreateUserRequest {
        CreateUserRequest::new(username, format!("{}@example.com", username))
    }

    #[test]
    fn test_create_inserts_and_persists() {
        let store = create_test_store();
        let mut repository = UserRepository::new(store.clone());

        let created = repository
            .create(request("alice").with_full_name("Alice A"))
            .unwrap();
        assert_eq!(created.username, "alice");

        let reloaded = UserRepository::new(store);
        assert_eq!(reloaded.find_all().len(), 1);
        assert_eq!(
            reloaded.find_by_id(created.id).unwrap().full_name,
            "Alice A"
        );
    }

    #[test]
    fn test_create_rejects_duplicate_username_after_normalization() {
        let mut repository = create_test_repository();

        repository.create(request("Alice")).unwrap();
        let result = repository.create(CreateUserRequest::new("  ALICE ", "second@example.com"));

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(repository.find_all().len(), 1);
    }

    #[test]
    fn test_create_validation_failure_adds_nothing() {
        let store = create_test_store();
        let mut repository = UserRepository::new(store.clone());

        let result = repository.create(CreateUserRequest::new("bob", "not-an-email"));
        assert!(result.is_err());
        assert!(repository.find_all().is_empty());
        assert!(!store.exists("users"));
    }

    #[test]
    fn test_find_by_username_normalizes_the_lookup() {
        let mut repository = create_test_repository();
        let created = repository.create(request("alice")).unwrap();

        let found = repository.find_by_username("  ALICE  ").unwrap();
        assert_eq!(found.id, created.id);
        assert!(repository.find_by_username("nobody").is_none());
    }

    #[test]
    fn test_find_active_excludes_deactivated_accounts() {
        let mut repository = create_test_repository();

        let active = repository.create(request("active")).unwrap();
        let dormant = repository.create(request("dormant")).unwrap();
        repository.set_active(dormant.id, false).unwrap();

        let found = repository.find_active();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, active.id);
    }

    #[test]
    fn test_search_matches_username_full_name_and_email() {
        let mut repository = create_test_repository();

        repository
            .create(request("jdoe").with_full_name("Jane Doe"))
            .unwrap();
        repository
            .create(CreateUserRequest::new("other", "jane.work@corp.example"))
            .unwrap();

        assert_eq!(repository.search("JDOE").len(), 1);
        assert_eq!(repository.search("doe").len(), 1);
        assert_eq!(repository.search("jane").len(), 2);
        assert_eq!(repository.search("missing").len(), 0);
    }

    #[test]
    fn test_update_profile_persists_and_validates() {
        let store = create_test_store();
        let mut repository = UserRepository::new(store.clone());
        let created = repository.create(request("alice")).unwrap();

        let updated = repository
            .update_profile(created.id, Some("Alice Cooper"), None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.full_name, "Alice Cooper");

        let reloaded = UserRepository::new(store);
        assert_eq!(
            reloaded.find_by_id(created.id).unwrap().full_name,
            "Alice Cooper"
        );

        let result = repository.update_profile(created.id, None, Some("broken"));
        assert!(result.is_err());
        assert_eq!(
            repository.find_by_id(created.id).unwrap().email,
            "alice@example.com"
        );
    }

    #[test]
    fn test_update_preferences_merges_and_persists() {
        let store = create_test_store();
        let mut repository = UserRepository::new(store.clone());
        let created = repository.create(request("alice")).unwrap();

        let updated = repository
            .update_preferences(
                created.id,
                &PreferencesPatch {
                    theme: Some("dark".to_string()),
                    ..PreferencesPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.preferences.theme, "dark");
        assert_eq!(updated.preferences.default_category, TaskCategory::Personal);

        let reloaded = UserRepository::new(store);
        assert_eq!(
            reloaded.find_by_id(created.id).unwrap().preferences.theme,
            "dark"
        );
    }

    #[test]
    fn test_record_login_sets_timestamp() {
        let mut repository = create_test_repository();
        let created = repository.create(request("alice")).unwrap();
        assert!(created.last_login_at.is_none());

        let updated = repository.record_login(created.id).unwrap();
        assert!(updated.last_login_at.is_some());
    }

    #[test]
    fn test_mutations_on_unknown_id_do_nothing() {
        let store = create_test_store();
        let mut repository = UserRepository::new(store.clone());
        let unknown = Uuid::new_v4();

        assert!(repository
            .update_profile(unknown, Some("x"), None)
            .unwrap()
            .is_none());
        assert!(repository
            .update_preferences(unknown, &PreferencesPatch::default())
            .is_none());
        assert!(repository.record_login(unknown).is_none());
        assert!(repository.set_active(unknown, false).is_none());
        assert!(!store.exists("users"));
    }

    #[test]
    fn test_delete_removes_account() {
        let mut repository = create_test_repository();
        let created = repository.create(request("alice")).unwrap();

        assert!(repository.delete(created.id));
        assert!(!repository.delete(created.id));
        assert!(repository.find_all().is_empty());
    }

    #[test]
    fn test_load_normalizes_stored_username_and_email() {
        let store = create_test_store();

        let seeded = User::new(CreateUserRequest::new("alice", "alice@example.com")).unwrap();
        let mut snapshot = serde_json::to_value(&seeded).unwrap();
        snapshot["username"] = json!("  Alice  ");
        snapshot["email"] = json!("Alice@Example.COM");
        assert!(store.save("users", &vec![snapshot]));

        let mut repository = UserRepository::new(store);
        assert_eq!(repository.load_report().loaded, 1);
        assert!(repository.load_report().skipped.is_empty());

        let found = repository.find_by_username("alice").unwrap();
        assert_eq!(found.id, seeded.id);
        assert_eq!(found.username, "alice");
        assert_eq!(found.email, "alice@example.com");
        assert_eq!(repository.search("alice").len(), 1);

        let duplicate = repository.create(CreateUserRequest::new("ALICE", "other@example.com"));
        assert!(matches!(duplicate, Err(Error::Validation(_))));
    }

    #[test]
    fn test_load_skips_corrupt_records_and_reports_them() {
        let store = create_test_store();

        let valid = User::new(CreateUserRequest::new("alice", "alice@example.com")).unwrap();
        let mut broken_email = serde_json::to_value(&valid).unwrap();
        broken_email["id"] = json!(Uuid::new_v4());
        broken_email["username"] = json!("bob");
        broken_email["email"] = json!("not-an-email");

        let snapshots = vec![
            serde_json::to_value(&valid).unwrap(),
            json!({ "id": "not-a-uuid" }),
            broken_email,
        ];
        assert!(store.save("users", &snapshots));

        let repository = UserRepository::new(store);
        assert_eq!(repository.find_all().len(), 1);
        assert_eq!(repository.find_by_username("alice").unwrap().id, valid.id);

        let report = repository.load_report();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[1].index, 2);
    }
}
