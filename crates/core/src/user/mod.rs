//! User module
//!
//! This module contains account-related types and logic.

mod model;
mod repository;

pub use model::{CreateUserRequest, PreferencesPatch, User, UserPreferences, UserRole};
pub use repository::UserRepository;
