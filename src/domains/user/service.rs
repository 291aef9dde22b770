use crate::auth::{AuthContext, AuthService};
use crate::domains::user::repository::UserRepository;
use crate::domains::user::types::{
    Credentials, DirectoryEntry, NewUser, RegisteredUser, UpdateProfile, User, UserStats,
};
use crate::errors::{ServiceError, ServiceResult, ValidationError};
use crate::events::{self, EventBus};
use crate::types::{Permission, UserRole};
use crate::validation::Validate;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Service for account, session, and directory operations
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    auth_service: Arc<AuthService>,
    bus: Arc<EventBus>,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        auth_service: Arc<AuthService>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repo,
            auth_service,
            bus,
        }
    }

    /// Register a new account and open a session for it.
    pub async fn register(&self, new_user: NewUser) -> ServiceResult<User> {
        new_user.validate().map_err(ServiceError::Domain)?;

        if self
            .repo
            .find_registered_by_email(&new_user.email)
            .await
            .map_err(ServiceError::Domain)?
            .is_some()
        {
            return Err(ServiceError::Domain(
                ValidationError::unique("email").into(),
            ));
        }

        self.auth_service.simulate_network_delay().await;

        let password_hash = self.auth_service.hash_password(&new_user.password)?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: new_user.email,
            full_name: new_user.full_name,
            phone_number: new_user.phone_number,
            role: new_user.role,
            created_at: Utc::now(),
            village: new_user.village.filter(|v| !v.is_empty()),
            specialization: new_user.specialization.filter(|s| !s.is_empty()),
            license_number: new_user.license_number.filter(|l| !l.is_empty()),
            gender: None,
            date_of_birth: None,
            address: None,
            medical_history: None,
        };

        self.repo
            .create_registered(RegisteredUser {
                user: user.clone(),
                password_hash,
            })
            .await
            .map_err(ServiceError::Domain)?;

        self.open_session(&user).await?;
        Ok(user)
    }

    /// Authenticate against the registered accounts and open a session.
    pub async fn login(&self, credentials: Credentials) -> ServiceResult<User> {
        credentials.validate().map_err(ServiceError::Domain)?;

        self.auth_service.simulate_network_delay().await;

        let account = self
            .repo
            .find_registered_by_email(&credentials.email)
            .await
            .map_err(ServiceError::Domain)?
            .ok_or_else(|| {
                ServiceError::Authentication("Invalid email or password".to_string())
            })?;

        self.auth_service
            .verify_password(&credentials.password, &account.password_hash)?;

        self.open_session(&account.user).await?;
        Ok(account.user)
    }

    /// Close the current session and mark the directory entry inactive.
    pub async fn logout(&self) -> ServiceResult<()> {
        if let Some(user) = self.repo.current_session().await.map_err(ServiceError::Domain)? {
            self.repo
                .set_directory_active(&user.id, false)
                .await
                .map_err(ServiceError::Domain)?;
            self.bus.emit(events::USERS_UPDATED, json!({ "userId": user.id }));
        }

        self.repo.clear_session().await.map_err(ServiceError::Domain)?;
        Ok(())
    }

    /// Reload a stored session (e.g. after a restart) and re-mark the
    /// directory entry active so admin views reflect it.
    pub async fn restore_session(&self) -> ServiceResult<Option<User>> {
        let session = self.repo.current_session().await.map_err(ServiceError::Domain)?;

        if let Some(user) = &session {
            self.repo
                .set_directory_active(&user.id, true)
                .await
                .map_err(ServiceError::Domain)?;
            self.bus.emit(events::USERS_UPDATED, json!({ "userId": user.id }));
        }

        Ok(session)
    }

    /// The currently logged-in user, if any.
    pub async fn current_user(&self) -> ServiceResult<Option<User>> {
        self.repo.current_session().await.map_err(ServiceError::Domain)
    }

    /// Merge profile updates into the session, the registered account, and
    /// the directory entry.
    pub async fn update_profile(&self, updates: UpdateProfile) -> ServiceResult<User> {
        let mut user = self
            .repo
            .current_session()
            .await
            .map_err(ServiceError::Domain)?
            .ok_or_else(|| ServiceError::Authentication("No active session".to_string()))?;

        if updates.is_empty_update() {
            return Ok(user);
        }

        updates.apply_to(&mut user);

        self.repo.set_session(&user).await.map_err(ServiceError::Domain)?;
        self.repo
            .update_registered(&user)
            .await
            .map_err(ServiceError::Domain)?;
        self.repo
            .update_directory_profile(&user)
            .await
            .map_err(ServiceError::Domain)?;
        self.bus.emit(events::USERS_UPDATED, json!({ "userId": user.id }));

        Ok(user)
    }

    /// Admin: full user directory.
    pub async fn list_users(&self, auth: &AuthContext) -> ServiceResult<Vec<DirectoryEntry>> {
        auth.authorize(Permission::ManageUsers)?;
        self.repo.list_directory().await.map_err(ServiceError::Domain)
    }

    /// Admin: flip a user's activity flag.
    pub async fn set_user_active(
        &self,
        auth: &AuthContext,
        user_id: &str,
        active: bool,
    ) -> ServiceResult<()> {
        auth.authorize(Permission::ManageUsers)?;

        self.repo
            .set_directory_active(user_id, active)
            .await
            .map_err(ServiceError::Domain)?;
        self.bus.emit(events::USERS_UPDATED, json!({ "userId": user_id }));
        Ok(())
    }

    /// Admin: user counts by role and activity.
    pub async fn user_stats(&self, auth: &AuthContext) -> ServiceResult<UserStats> {
        auth.authorize(Permission::ViewSystemStats)?;

        let entries = self.repo.list_directory().await.map_err(ServiceError::Domain)?;
        let mut stats = UserStats {
            total: entries.len(),
            ..Default::default()
        };

        for entry in &entries {
            if entry.is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            match entry.role {
                UserRole::Villager => stats.villagers += 1,
                UserRole::Doctor => stats.doctors += 1,
                UserRole::Admin => stats.admins += 1,
            }
        }

        Ok(stats)
    }

    /// Seed one demo account per role, skipping any email already registered.
    pub async fn initialize_default_accounts(&self) -> ServiceResult<()> {
        let defaults = [
            NewUser {
                email: "villager@test.com".to_string(),
                password: "Villager123!".to_string(),
                full_name: "Ram Kumar".to_string(),
                phone_number: "+91-9876543210".to_string(),
                role: UserRole::Villager,
                specialization: None,
                license_number: None,
                village: Some("Rampur".to_string()),
            },
            NewUser {
                email: "doctor@test.com".to_string(),
                password: "Doctor123!".to_string(),
                full_name: "Dr. Priya Sharma".to_string(),
                phone_number: "+91-9876543211".to_string(),
                role: UserRole::Doctor,
                specialization: Some("General Medicine".to_string()),
                license_number: Some("MED12345".to_string()),
                village: None,
            },
            NewUser {
                email: "admin@test.com".to_string(),
                password: "Admin123!".to_string(),
                full_name: "Admin User".to_string(),
                phone_number: "+91-9876543212".to_string(),
                role: UserRole::Admin,
                specialization: None,
                license_number: None,
                village: None,
            },
        ];

        for account in defaults {
            if self
                .repo
                .find_registered_by_email(&account.email)
                .await
                .map_err(ServiceError::Domain)?
                .is_some()
            {
                continue;
            }

            let password_hash = self.auth_service.hash_password(&account.password)?;
            let user = User {
                id: Uuid::new_v4().to_string(),
                email: account.email,
                full_name: account.full_name,
                phone_number: account.phone_number,
                role: account.role,
                created_at: Utc::now(),
                village: account.village,
                specialization: account.specialization,
                license_number: account.license_number,
                gender: None,
                date_of_birth: None,
                address: None,
                medical_history: None,
            };
            self.repo
                .create_registered(RegisteredUser {
                    user,
                    password_hash,
                })
                .await
                .map_err(ServiceError::Domain)?;
        }

        log::info!("Initialized default villager, doctor, and admin accounts");
        Ok(())
    }

    async fn open_session(&self, user: &User) -> ServiceResult<()> {
        self.repo.set_session(user).await.map_err(ServiceError::Domain)?;
        self.repo
            .touch_directory(user)
            .await
            .map_err(ServiceError::Domain)?;
        self.bus.emit(events::USERS_UPDATED, json!({ "userId": user.id }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::user::repository::LocalUserRepository;
    use crate::test_support::test_store;

    async fn service() -> UserService {
        let store = test_store().await;
        UserService::new(
            Arc::new(LocalUserRepository::new(store)),
            Arc::new(AuthService::default()),
            Arc::new(EventBus::new()),
        )
    }

    fn anita() -> NewUser {
        NewUser {
            email: "anita@example.com".to_string(),
            password: "secret1".to_string(),
            full_name: "Anita Devi".to_string(),
            phone_number: "+91-9876543210".to_string(),
            role: UserRole::Villager,
            specialization: None,
            license_number: None,
            village: Some("Rampur".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_opens_session_and_directory_entry() {
        let service = service().await;
        let user = service.register(anita()).await.unwrap();

        let session = service.current_user().await.unwrap().unwrap();
        assert_eq!(session.id, user.id);

        let admin = AuthContext::new("a1", "Admin", UserRole::Admin);
        let directory = service.list_users(&admin).await.unwrap();
        assert_eq!(directory.len(), 1);
        assert!(directory[0].is_active);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let service = service().await;
        service.register(anita()).await.unwrap();

        let err = service.register(anita()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(_)));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let service = service().await;
        service.register(anita()).await.unwrap();
        service.logout().await.unwrap();

        let err = service
            .login(Credentials {
                email: "anita@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_logout_marks_directory_inactive() {
        let service = service().await;
        service.register(anita()).await.unwrap();
        service.logout().await.unwrap();

        assert!(service.current_user().await.unwrap().is_none());

        let admin = AuthContext::new("a1", "Admin", UserRole::Admin);
        let directory = service.list_users(&admin).await.unwrap();
        assert!(!directory[0].is_active);
        assert!(directory[0].last_logout.is_some());
    }

    #[tokio::test]
    async fn test_update_profile_propagates_everywhere() {
        let service = service().await;
        service.register(anita()).await.unwrap();

        let updated = service
            .update_profile(UpdateProfile {
                village: Some("Gobardanga".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.village.as_deref(), Some("Gobardanga"));

        // Login again to prove the registered account was updated too.
        service.logout().await.unwrap();
        let user = service
            .login(Credentials {
                email: "anita@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.village.as_deref(), Some("Gobardanga"));
    }

    #[tokio::test]
    async fn test_default_accounts_seed_once() {
        let service = service().await;
        service.initialize_default_accounts().await.unwrap();
        service.initialize_default_accounts().await.unwrap();

        let doctor = service
            .login(Credentials {
                email: "doctor@test.com".to_string(),
                password: "Doctor123!".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(doctor.role, UserRole::Doctor);
    }

    #[tokio::test]
    async fn test_user_stats_counts_roles() {
        let service = service().await;
        service.register(anita()).await.unwrap();

        let admin = AuthContext::new("a1", "Admin", UserRole::Admin);
        let stats = service.user_stats(&admin).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.villagers, 1);
        assert_eq!(stats.active, 1);
    }
}
