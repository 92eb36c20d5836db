//! Core types, config, and errors for StudySnap.

pub mod config;
pub mod error;
pub mod types;
