//! Core library for TaskVault
//!
//! This crate contains the client-side data layer, including:
//! - Versioned, namespaced key-value storage
//! - Task management with filtering, search, and statistics
//! - User accounts and preferences

pub mod app;
pub mod error;
pub mod storage;
pub mod task;
pub mod user;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
