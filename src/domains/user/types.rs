use crate::errors::{DomainResult, ValidationError};
use crate::types::UserRole;
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Core User entity - the shape stored in the session record and (with the
/// password hash attached) in the registered-accounts collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    // Extended profile fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
}

impl User {
    pub fn is_doctor(&self) -> bool {
        matches!(self.role, UserRole::Doctor)
    }
}

/// A registered account: the user plus their credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    #[serde(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Entry in the admin-facing `users` directory. Activity flags are flipped on
/// every login/logout; entries are never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_logout: Option<DateTime<Utc>>,
}

impl DirectoryEntry {
    pub fn from_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
            phone_number: user.phone_number.clone(),
            village: user.village.clone(),
            specialization: user.specialization.clone(),
            license_number: user.license_number.clone(),
            is_active: true,
            created_at: now,
            last_login: Some(now),
            last_logout: None,
        }
    }
}

/// NewUser DTO - used at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: UserRole,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub village: Option<String>,
}

impl Validate for NewUser {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;

        ValidationBuilder::new("password", Some(self.password.clone()))
            .required()
            .min_length(6)
            .validate()?;

        ValidationBuilder::new("full_name", Some(self.full_name.clone()))
            .required()
            .min_length(2)
            .max_length(80)
            .validate()?;

        ValidationBuilder::new("phone_number", Some(self.phone_number.clone()))
            .required()
            .phone()
            .validate()?;

        // Role-specific required fields
        match self.role {
            UserRole::Doctor => {
                if self.specialization.as_deref().unwrap_or("").is_empty()
                    || self.license_number.as_deref().unwrap_or("").is_empty()
                {
                    return Err(ValidationError::custom(
                        "Specialization and license number are required for doctors",
                    )
                    .into());
                }
            }
            UserRole::Villager => {
                if self.village.as_deref().unwrap_or("").is_empty() {
                    return Err(
                        ValidationError::custom("Village name is required for villagers").into(),
                    );
                }
            }
            UserRole::Admin => {}
        }

        Ok(())
    }
}

/// Credentials DTO - used for login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for Credentials {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;

        ValidationBuilder::new("password", Some(self.password.clone()))
            .required()
            .validate()?;

        Ok(())
    }
}

/// Partial profile update applied to the session user, the registered
/// account, and the directory entry together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub village: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
}

impl UpdateProfile {
    /// Check whether the update payload carries any field changes.
    pub fn is_empty_update(&self) -> bool {
        self.full_name.is_none()
            && self.phone_number.is_none()
            && self.village.is_none()
            && self.specialization.is_none()
            && self.license_number.is_none()
            && self.gender.is_none()
            && self.date_of_birth.is_none()
            && self.address.is_none()
            && self.medical_history.is_none()
    }

    pub fn apply_to(&self, user: &mut User) {
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(phone_number) = &self.phone_number {
            user.phone_number = phone_number.clone();
        }
        if let Some(village) = &self.village {
            user.village = Some(village.clone());
        }
        if let Some(specialization) = &self.specialization {
            user.specialization = Some(specialization.clone());
        }
        if let Some(license_number) = &self.license_number {
            user.license_number = Some(license_number.clone());
        }
        if let Some(gender) = &self.gender {
            user.gender = Some(gender.clone());
        }
        if let Some(date_of_birth) = &self.date_of_birth {
            user.date_of_birth = Some(date_of_birth.clone());
        }
        if let Some(address) = &self.address {
            user.address = Some(address.clone());
        }
        if let Some(medical_history) = &self.medical_history {
            user.medical_history = Some(medical_history.clone());
        }
    }
}

/// Provides a summary of user counts by role and status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub villagers: usize,
    pub doctors: usize,
    pub admins: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_new_user(role: UserRole) -> NewUser {
        NewUser {
            email: "anita@example.com".to_string(),
            password: "secret1".to_string(),
            full_name: "Anita Devi".to_string(),
            phone_number: "+91-9876543210".to_string(),
            role,
            specialization: None,
            license_number: None,
            village: None,
        }
    }

    #[test]
    fn test_doctor_requires_specialization_and_license() {
        let mut doctor = base_new_user(UserRole::Doctor);
        assert!(doctor.validate().is_err());

        doctor.specialization = Some("General Medicine".to_string());
        doctor.license_number = Some("MED12345".to_string());
        assert!(doctor.validate().is_ok());
    }

    #[test]
    fn test_villager_requires_village() {
        let mut villager = base_new_user(UserRole::Villager);
        assert!(villager.validate().is_err());

        villager.village = Some("Rampur".to_string());
        assert!(villager.validate().is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        let mut user = base_new_user(UserRole::Admin);
        user.password = "abc".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_registered_user_flattens_into_user_shape() {
        let registered = RegisteredUser {
            user: User {
                id: "v1".to_string(),
                email: "anita@example.com".to_string(),
                full_name: "Anita Devi".to_string(),
                phone_number: "+91-9876543210".to_string(),
                role: UserRole::Villager,
                created_at: Utc::now(),
                village: Some("Rampur".to_string()),
                specialization: None,
                license_number: None,
                gender: None,
                date_of_birth: None,
                address: None,
                medical_history: None,
            },
            password_hash: "hash".to_string(),
        };

        let json = serde_json::to_value(&registered).unwrap();
        assert_eq!(json["id"], "v1");
        assert_eq!(json["fullName"], "Anita Devi");
        assert_eq!(json["passwordHash"], "hash");
    }
}
