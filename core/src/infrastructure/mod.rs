//! Infrastructure backends: the external stores the reconcilers mutate.
//!
//! Each store is a narrow trait. Production implementations shell out to the
//! host tool through a `CommandRunner`; `mock::MockDesktop` is an in-memory
//! stand-in for all of them.

pub mod env;
pub mod extensions;
pub mod flatpak;
pub mod gsettings;
pub mod mock;
pub mod runner;

pub use runner::{CommandOutput, CommandRunner};

/// Key-value desktop settings store.
pub trait SettingsBackend {
    fn get(&self, schema: &str, key: &str) -> Result<CommandOutput, String>;

    fn set(&self, schema: &str, key: &str, value: &str) -> Result<CommandOutput, String>;

    /// Schemas the backend knows about.
    fn list_available_capabilities(&self) -> Result<Vec<String>, String>;
}

/// Desktop-shell extension manager.
pub trait ExtensionManager {
    fn is_installed(&self, uuid: &str) -> bool;

    fn is_enabled(&self, uuid: &str) -> bool;

    fn enable(&self, uuid: &str) -> Result<CommandOutput, String>;
}

/// Remote application catalog plus the local installation it feeds.
pub trait AppCatalog {
    fn has_remote(&self, name: &str) -> bool;

    fn add_remote(&self, name: &str, url: &str) -> Result<CommandOutput, String>;

    fn remove_remote(&self, name: &str) -> Result<CommandOutput, String>;

    /// Connectivity probe: ask the remote about one application.
    fn query_remote(&self, remote: &str, app: &str) -> Result<CommandOutput, String>;

    fn is_installed(&self, app: &str) -> bool;

    fn install(&self, remote: &str, app: &str) -> Result<CommandOutput, String>;
}

/// Read-only view of the process environment used by readiness probes.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    fn path_exists(&self, path: &str) -> bool;

    /// Entry names directly under `dir`, sorted; empty when unreadable.
    fn list_dir(&self, dir: &str) -> Vec<String>;

    fn uid(&self) -> u32;
}

impl<E: Environment + ?Sized> Environment for std::rc::Rc<E> {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }

    fn path_exists(&self, path: &str) -> bool {
        (**self).path_exists(path)
    }

    fn list_dir(&self, dir: &str) -> Vec<String> {
        (**self).list_dir(dir)
    }

    fn uid(&self) -> u32 {
        (**self).uid()
    }
}
