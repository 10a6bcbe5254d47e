//! Controller layer on top of entity lists.
//!
//! # Responsibility
//! - Orchestrate list mutations into user-level operations with history and
//!   change events.
//! - Persist list data and view settings.
//! - Keep the set of controllers in an explicit registry instead of globals.

pub mod list_controller;
pub mod registry;
pub mod settings;

pub use list_controller::{
    ConfirmationPrompt, ControllerEvent, ControllerState, Editor, ListController,
};
pub use registry::{ControllerRegistry, DataController, RegistryError};
pub use settings::{ListSettings, SettingsError};
