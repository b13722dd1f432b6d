//! User account model with profile and preference handling

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::task::TaskCategory;
use crate::Result;

fn default_theme() -> String {
    "light".to_string()
}

fn default_preferred_category() -> TaskCategory {
    TaskCategory::Personal
}

const fn default_email_notifications() -> bool {
    true
}

const fn default_is_active() -> bool {
    true
}

/// Access level of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(Error::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Per-account settings merged field by field from a patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_preferred_category")]
    pub default_category: TaskCategory,
    #[serde(default = "default_email_notifications")]
    pub email_notifications: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            default_category: default_preferred_category(),
            email_notifications: default_email_notifications(),
        }
    }
}

/// Partial preference update; unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category: Option<TaskCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<bool>,
}

/// An account record.
///
/// Username and email are stored normalized (trimmed and lowercased).
/// Records missing `preferences` deserialize with the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub preferences: UserPreferences,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build a validated account from a creation request.
    pub fn new(request: CreateUserRequest) -> Result<Self> {
        let username = normalize_username(&request.username)?;
        let email = normalize_email(&request.email)?;
        let full_name = request
            .full_name
            .map(|name| name.trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            id: Uuid::new_v4(),
            username,
            email,
            full_name,
            role: request.role.unwrap_or_default(),
            is_active: true,
            preferences: UserPreferences::default(),
            created_at: Utc::now(),
            last_login_at: None,
        })
    }

    /// Change full name and/or email; unset parts keep their current value.
    pub fn update_profile(&mut self, full_name: Option<&str>, email: Option<&str>) -> Result<()> {
        if let Some(email) = email {
            self.email = normalize_email(email)?;
        }
        if let Some(full_name) = full_name {
            self.full_name = full_name.trim().to_string();
        }
        Ok(())
    }

    /// Merge a partial preference update into the current settings.
    pub fn update_preferences(&mut self, patch: &PreferencesPatch) {
        if let Some(theme) = &patch.theme {
            self.preferences.theme = theme.clone();
        }
        if let Some(default_category) = patch.default_category {
            self.preferences.default_category = default_category;
        }
        if let Some(email_notifications) = patch.email_notifications {
            self.preferences.email_notifications = email_notifications;
        }
    }

    pub fn record_login(&mut self) {
        self.last_login_at = Some(Utc::now());
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Re-apply username and email normalization to a deserialized record.
    /// Lookups and the uniqueness check expect both fields stored lowercase.
    pub fn normalize(&mut self) -> Result<()> {
        self.username = normalize_username(&self.username)?;
        self.email = normalize_email(&self.email)?;
        Ok(())
    }
}

/// Input for creating an account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

impl CreateUserRequest {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            full_name: None,
            role: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }
}

fn normalize_username(username: &str) -> Result<String> {
    let normalized = username.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(Error::Validation("Username cannot be empty".to_string()));
    }
    Ok(normalized)
}

fn normalize_email(email: &str) -> Result<String> {
    let normalized = email.trim().to_lowercase();
    let valid = matches!(
        normalized.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty()
    );
    if !valid {
        return Err(Error::Validation(format!(
            "Invalid email address: '{}'",
            email.trim()
        )));
    }
    Ok(normalized)
}
