//! Core domain types and logic.

pub mod analyzer;
pub mod bar;
pub mod condition;
pub mod config_validation;
pub mod error;
pub mod orchestrator;
pub mod portfolio;
pub mod preprocess;
pub mod report;
pub mod scan_config;
pub mod scanner;
pub mod series;
pub mod signal;
pub mod task_queue;
pub mod universe;
