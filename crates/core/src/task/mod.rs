//! Task module
//!
//! This module contains task-related types and logic.

mod model;
mod repository;

pub use model::*;
pub use repository::{
    CategoryCount, CategoryStats, SortDirection, SortField, TaskFilter, TaskRepository, TaskStats,
};
