use crate::domains::user::types::{DirectoryEntry, RegisteredUser, User};
use crate::errors::DomainResult;
use crate::store::{keys, RecordStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All registered accounts.
    async fn list_registered(&self) -> DomainResult<Vec<RegisteredUser>>;

    /// Find a registered account by email.
    async fn find_registered_by_email(&self, email: &str) -> DomainResult<Option<RegisteredUser>>;

    /// Append a newly registered account.
    async fn create_registered(&self, account: RegisteredUser) -> DomainResult<()>;

    /// Replace the registered account matching the user's id or email.
    async fn update_registered(&self, user: &User) -> DomainResult<()>;

    /// The admin-facing user directory.
    async fn list_directory(&self) -> DomainResult<Vec<DirectoryEntry>>;

    /// Upsert a directory entry for `user`, marking it active and refreshing
    /// `last_login`. An existing entry keeps its original `created_at`.
    async fn touch_directory(&self, user: &User) -> DomainResult<()>;

    /// Merge profile fields into an existing directory entry, or insert a
    /// fresh active one when the user was never seen before.
    async fn update_directory_profile(&self, user: &User) -> DomainResult<()>;

    /// Flip the activity flag on a directory entry.
    async fn set_directory_active(&self, user_id: &str, active: bool) -> DomainResult<()>;

    /// Current session user, if logged in.
    async fn current_session(&self) -> DomainResult<Option<User>>;

    async fn set_session(&self, user: &User) -> DomainResult<()>;

    async fn clear_session(&self) -> DomainResult<()>;
}

/// Record-store implementation of UserRepository
pub struct LocalUserRepository {
    store: Arc<RecordStore>,
}

impl LocalUserRepository {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    fn directory_index(entries: &[DirectoryEntry], id: &str, email: &str) -> Option<usize> {
        entries
            .iter()
            .position(|e| e.id == id || e.email == email)
    }
}

#[async_trait]
impl UserRepository for LocalUserRepository {
    async fn list_registered(&self) -> DomainResult<Vec<RegisteredUser>> {
        self.store.read_list(keys::REGISTERED_USERS).await
    }

    async fn find_registered_by_email(&self, email: &str) -> DomainResult<Option<RegisteredUser>> {
        let registered = self.list_registered().await?;
        Ok(registered.into_iter().find(|r| r.user.email == email))
    }

    async fn create_registered(&self, account: RegisteredUser) -> DomainResult<()> {
        let mut registered = self.list_registered().await?;
        registered.push(account);
        self.store.write_list(keys::REGISTERED_USERS, &registered).await
    }

    async fn update_registered(&self, user: &User) -> DomainResult<()> {
        let mut registered = self.list_registered().await?;
        if let Some(entry) = registered
            .iter_mut()
            .find(|r| r.user.id == user.id || r.user.email == user.email)
        {
            entry.user = user.clone();
            self.store.write_list(keys::REGISTERED_USERS, &registered).await?;
        }
        Ok(())
    }

    async fn list_directory(&self) -> DomainResult<Vec<DirectoryEntry>> {
        self.store.read_list(keys::USERS).await
    }

    async fn touch_directory(&self, user: &User) -> DomainResult<()> {
        let now = Utc::now();
        let mut entries = self.list_directory().await?;

        match Self::directory_index(&entries, &user.id, &user.email) {
            Some(idx) => {
                let created_at = entries[idx].created_at;
                let last_logout = entries[idx].last_logout;
                let mut entry = DirectoryEntry::from_user(user, now);
                entry.created_at = created_at;
                entry.last_logout = last_logout;
                entries[idx] = entry;
            }
            None => entries.push(DirectoryEntry::from_user(user, now)),
        }

        self.store.write_list(keys::USERS, &entries).await
    }

    async fn update_directory_profile(&self, user: &User) -> DomainResult<()> {
        let mut entries = self.list_directory().await?;

        match Self::directory_index(&entries, &user.id, &user.email) {
            Some(idx) => {
                let entry = &mut entries[idx];
                entry.full_name = user.full_name.clone();
                entry.email = user.email.clone();
                entry.phone_number = user.phone_number.clone();
                entry.village = user.village.clone();
                entry.specialization = user.specialization.clone();
                entry.license_number = user.license_number.clone();
            }
            None => entries.push(DirectoryEntry::from_user(user, Utc::now())),
        }

        self.store.write_list(keys::USERS, &entries).await
    }

    async fn set_directory_active(&self, user_id: &str, active: bool) -> DomainResult<()> {
        let mut entries = self.list_directory().await?;

        if let Some(entry) = entries.iter_mut().find(|e| e.id == user_id) {
            entry.is_active = active;
            if !active {
                entry.last_logout = Some(Utc::now());
            }
            self.store.write_list(keys::USERS, &entries).await?;
        }

        Ok(())
    }

    async fn current_session(&self) -> DomainResult<Option<User>> {
        self.store.read_value(keys::CURRENT_USER).await
    }

    async fn set_session(&self, user: &User) -> DomainResult<()> {
        self.store.write_value(keys::CURRENT_USER, user).await
    }

    async fn clear_session(&self) -> DomainResult<()> {
        self.store.remove(keys::CURRENT_USER).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_user, test_store};
    use crate::types::UserRole;

    #[tokio::test]
    async fn test_touch_directory_preserves_created_at() {
        let store = test_store().await;
        let repo = LocalUserRepository::new(store);
        let user = sample_user("v1", UserRole::Villager);

        repo.touch_directory(&user).await.unwrap();
        let first = repo.list_directory().await.unwrap();
        let original_created = first[0].created_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.touch_directory(&user).await.unwrap();

        let entries = repo.list_directory().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].created_at, original_created);
        assert!(entries[0].is_active);
    }

    #[tokio::test]
    async fn test_set_directory_active_flips_flags() {
        let store = test_store().await;
        let repo = LocalUserRepository::new(store);
        let user = sample_user("d1", UserRole::Doctor);

        repo.touch_directory(&user).await.unwrap();
        repo.set_directory_active("d1", false).await.unwrap();

        let entries = repo.list_directory().await.unwrap();
        assert!(!entries[0].is_active);
        assert!(entries[0].last_logout.is_some());
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = test_store().await;
        let repo = LocalUserRepository::new(store);
        let user = sample_user("v1", UserRole::Villager);

        assert!(repo.current_session().await.unwrap().is_none());

        repo.set_session(&user).await.unwrap();
        let session = repo.current_session().await.unwrap().unwrap();
        assert_eq!(session.id, "v1");

        repo.clear_session().await.unwrap();
        assert!(repo.current_session().await.unwrap().is_none());
    }
}
