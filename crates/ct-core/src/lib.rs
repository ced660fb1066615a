//! CalmTube Core Library
//!
//! This crate provides the feature-application engine for the CalmTube
//! content blocker. It hides distracting regions of a video-sharing
//! single-page application according to the user's settings, and replaces
//! the home feed with a custom view.
//!
//! # Architecture
//!
//! The engine never touches browser APIs itself. A host implements the
//! [`Dom`] and [`Timers`] traits and forwards its events (mutation batches,
//! navigation, timers, storage changes); the engine answers with hide,
//! reveal and overlay calls. Everything runs on the host's single thread.
//!
//! # Modules
//!
//! - `types`: Feature-ids, page categories and category masks
//! - `settings`: Versioned settings record, patches and migration
//! - `store`: Preference store over a chain of storage backends
//! - `classify`: Page classification from the current location
//! - `catalog`: Static region selectors and availability table
//! - `controller`: Per-feature hide/show state machine
//! - `orchestrator`: Apply passes, navigation watch and overlay
//! - `engine`: Store and orchestrator wired for one surface
//! - `commands`: Keyboard command toggles
//! - `memory`: In-memory host for simulation and tests

pub mod catalog;
pub mod classify;
pub mod commands;
pub mod config;
pub mod controller;
pub mod dom;
pub mod engine;
pub mod memory;
pub mod orchestrator;
pub mod settings;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use catalog::{is_available, selectors_for};
pub use classify::classify;
pub use commands::{run_command, Command, CommandOutcome};
pub use config::EngineConfig;
pub use controller::{FeatureController, RetryPolicy};
pub use dom::{Dom, DomError, OverlayView, TimerId, TimerTask, Timers};
pub use engine::Engine;
pub use orchestrator::{Orchestrator, PassSummary};
pub use settings::{EffectiveSettings, FeatureMap, SettingsError, SettingsPatch, SettingsRecord};
pub use store::{PreferenceStore, StorageBackend, StorageError};
pub use types::{CategoryMask, FeatureId, PageCategory};
