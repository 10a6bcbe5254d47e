//! Registry of the data controllers an application works with.

use crate::model::{AsAny, Entity, LoadStatus};
use crate::service::list_controller::ListController;
use crate::xml::{XmlElement, XmlError, XmlResult};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

static CONTROLLER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid controller name regex"));

/// Type-erased persistence surface of one controller.
pub trait DataController: AsAny {
    fn name(&self) -> &str;
    fn file_name(&self) -> String;
    fn is_modified(&self) -> bool;
    fn is_system(&self) -> bool;
    fn load(&mut self, element: Option<&XmlElement>) -> LoadStatus;
    fn save(&mut self, parent: Option<&mut XmlElement>);
    fn load_file(&mut self, path: &Path) -> XmlResult<LoadStatus>;
    fn save_file(&mut self, path: &Path) -> XmlResult<()>;
}

impl<E: Entity> DataController for ListController<E> {
    fn name(&self) -> &str {
        ListController::name(self)
    }

    fn file_name(&self) -> String {
        ListController::file_name(self)
    }

    fn is_modified(&self) -> bool {
        ListController::is_modified(self)
    }

    fn is_system(&self) -> bool {
        ListController::is_system(self)
    }

    fn load(&mut self, element: Option<&XmlElement>) -> LoadStatus {
        ListController::load(self, element)
    }

    fn save(&mut self, parent: Option<&mut XmlElement>) {
        ListController::save(self, parent);
    }

    fn load_file(&mut self, path: &Path) -> XmlResult<LoadStatus> {
        ListController::load_file(self, path)
    }

    fn save_file(&mut self, path: &Path) -> XmlResult<()> {
        ListController::save_file(self, path)
    }
}

/// Controller registration/lookup errors.
#[derive(Debug)]
pub enum RegistryError {
    InvalidName(String),
    DuplicateName(String),
    NotFound(String),
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
    Persist {
        name: String,
        source: XmlError,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "controller name is invalid: `{value}`"),
            Self::DuplicateName(value) => write!(f, "controller already registered: {value}"),
            Self::NotFound(value) => write!(f, "controller not found: {value}"),
            Self::TypeMismatch { name, expected } => {
                write!(f, "controller `{name}` is not a {expected}")
            }
            Self::Persist { name, source } => write!(f, "controller `{name}`: {source}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persist { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Explicit, name-keyed set of controllers, built once at startup and passed
/// to whoever needs cross-list lookups.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: BTreeMap<String, Box<dyn DataController>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one controller under its own name.
    ///
    /// # Errors
    /// - `InvalidName` when the name cannot serve as an XML element and file
    ///   name.
    /// - `DuplicateName` when the name is already taken.
    pub fn register(&mut self, controller: impl DataController) -> Result<(), RegistryError> {
        let name = controller.name().to_string();
        if !CONTROLLER_NAME_RE.is_match(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.controllers.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        info!(
            "event=controller_register module=service status=ok controller={} system={}",
            name,
            controller.is_system()
        );
        self.controllers.insert(name, Box::new(controller));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.controllers.keys().cloned().collect()
    }

    pub fn is_modified(&self) -> bool {
        self.controllers.values().any(|controller| controller.is_modified())
    }

    pub fn get(&self, name: &str) -> Result<&(dyn DataController + 'static), RegistryError> {
        self.controllers
            .get(name.trim())
            .map(|controller| &**controller)
            .ok_or_else(|| RegistryError::NotFound(name.trim().to_string()))
    }

    pub fn get_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut (dyn DataController + 'static), RegistryError> {
        match self.controllers.get_mut(name.trim()) {
            Some(controller) => Ok(&mut **controller),
            None => Err(RegistryError::NotFound(name.trim().to_string())),
        }
    }

    /// Typed access to a list controller.
    pub fn controller<E: Entity>(&self, name: &str) -> Result<&ListController<E>, RegistryError> {
        self.get(name)?
            .as_any()
            .downcast_ref::<ListController<E>>()
            .ok_or_else(|| type_mismatch::<E>(name))
    }

    pub fn controller_mut<E: Entity>(
        &mut self,
        name: &str,
    ) -> Result<&mut ListController<E>, RegistryError> {
        self.get_mut(name)?
            .as_any_mut()
            .downcast_mut::<ListController<E>>()
            .ok_or_else(|| type_mismatch::<E>(name))
    }

    /// Loads every controller from `<dir>/<name>.xml`; missing files load as
    /// empty lists.
    ///
    /// # Errors
    /// - `Persist` for the first file that exists but cannot be read or parsed.
    pub fn load_all(&mut self, dir: impl AsRef<Path>) -> Result<(), RegistryError> {
        let dir = dir.as_ref();
        for (name, controller) in &mut self.controllers {
            let path = dir.join(controller.file_name());
            controller
                .load_file(&path)
                .map_err(|source| RegistryError::Persist {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Saves every modified controller to `<dir>/<name>.xml`; returns how many
    /// files were written.
    ///
    /// # Errors
    /// - `Persist` for the first file that cannot be written.
    pub fn save_all(&mut self, dir: impl AsRef<Path>) -> Result<usize, RegistryError> {
        let dir = dir.as_ref();
        let mut saved = 0;
        for (name, controller) in &mut self.controllers {
            if !controller.is_modified() {
                continue;
            }
            let path = dir.join(controller.file_name());
            controller
                .save_file(&path)
                .map_err(|source| RegistryError::Persist {
                    name: name.clone(),
                    source,
                })?;
            saved += 1;
        }
        Ok(saved)
    }
}

fn type_mismatch<E: Entity>(name: &str) -> RegistryError {
    RegistryError::TypeMismatch {
        name: name.trim().to_string(),
        expected: std::any::type_name::<ListController<E>>(),
    }
}
