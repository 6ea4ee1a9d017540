//! StudyVault CLI - portable export and transactional import of study data
//!
//! This crate provides the core functionality for the `sv` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Period, Subject, Evaluation, FlashcardDeck, Flashcard, UserConfiguration)
//! - [`storage`] - SQLite database layer
//! - [`portability`] - Package export, validation, import and reconciliation
//! - [`config`] - Path resolution, tunables and the preference surface
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod portability;
pub mod storage;

pub use error::{Error, Result};
