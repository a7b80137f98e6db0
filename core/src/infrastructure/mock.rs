//! In-memory desktop for testing.
//!
//! Implements every backend trait over plain collections, records each
//! mutating call, and fails the way the real tools do (same stderr wording)
//! so diagnosis can be exercised end to end.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use super::runner::CommandOutput;
use super::{AppCatalog, ExtensionManager, SettingsBackend};

/// A test double standing in for gsettings, gnome-extensions and flatpak.
#[derive(Default)]
pub struct MockDesktop {
    /// Installed schemas. A set against any other schema fails.
    pub schemas: HashSet<String>,
    values: RefCell<HashMap<(String, String), String>>,
    /// Keys whose writes fail with the given stderr, keyed by `"schema key"`.
    pub failing_keys: HashMap<String, String>,

    pub installed_extensions: HashSet<String>,
    enabled_extensions: RefCell<HashSet<String>>,

    remotes: RefCell<HashMap<String, String>>,
    /// Applications the remotes can serve.
    pub available_apps: HashSet<String>,
    installed_apps: RefCell<HashSet<String>>,
    /// Remaining connectivity probes that fail; `u32::MAX` never recovers.
    query_failures: Cell<u32>,

    calls: RefCell<Vec<String>>,
}

impl MockDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas(mut self, schemas: &[&str]) -> Self {
        self.schemas.extend(schemas.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_failing_key(mut self, schema: &str, key: &str, stderr: &str) -> Self {
        self.failing_keys
            .insert(format!("{} {}", schema, key), stderr.to_string());
        self
    }

    pub fn with_extensions(mut self, uuids: &[&str]) -> Self {
        self.installed_extensions
            .extend(uuids.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_enabled_extension(self, uuid: &str) -> Self {
        self.enabled_extensions.borrow_mut().insert(uuid.to_string());
        self
    }

    pub fn with_remote(self, name: &str, url: &str) -> Self {
        self.remotes
            .borrow_mut()
            .insert(name.to_string(), url.to_string());
        self
    }

    pub fn with_available_apps(mut self, apps: &[&str]) -> Self {
        self.available_apps.extend(apps.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_installed_apps(self, apps: &[&str]) -> Self {
        self.installed_apps
            .borrow_mut()
            .extend(apps.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_query_failures(self, count: u32) -> Self {
        self.query_failures.set(count);
        self
    }

    pub fn value(&self, schema: &str, key: &str) -> Option<String> {
        self.values
            .borrow()
            .get(&(schema.to_string(), key.to_string()))
            .cloned()
    }

    pub fn app_installed(&self, app: &str) -> bool {
        self.installed_apps.borrow().contains(app)
    }

    pub fn remote_url(&self, name: &str) -> Option<String> {
        self.remotes.borrow().get(name).cloned()
    }

    /// Every mutating call so far, e.g. `"set org.gnome.mutter dynamic-workspaces"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn log(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl SettingsBackend for MockDesktop {
    fn get(&self, schema: &str, key: &str) -> Result<CommandOutput, String> {
        if !self.schemas.contains(schema) {
            return Ok(CommandOutput::failed(1, &format!("No such schema “{}”\n", schema)));
        }
        let value = self.value(schema, key).unwrap_or_default();
        Ok(CommandOutput::ok(&format!("{}\n", value)))
    }

    fn set(&self, schema: &str, key: &str, value: &str) -> Result<CommandOutput, String> {
        self.log(format!("set {} {}", schema, key));
        if !self.schemas.contains(schema) {
            return Ok(CommandOutput::failed(1, &format!("No such schema “{}”\n", schema)));
        }
        if let Some(stderr) = self.failing_keys.get(&format!("{} {}", schema, key)) {
            return Ok(CommandOutput::failed(1, stderr));
        }
        self.values
            .borrow_mut()
            .insert((schema.to_string(), key.to_string()), value.to_string());
        Ok(CommandOutput::ok(""))
    }

    fn list_available_capabilities(&self) -> Result<Vec<String>, String> {
        let mut schemas: Vec<String> = self.schemas.iter().cloned().collect();
        schemas.sort();
        Ok(schemas)
    }
}

impl ExtensionManager for MockDesktop {
    fn is_installed(&self, uuid: &str) -> bool {
        self.installed_extensions.contains(uuid)
    }

    fn is_enabled(&self, uuid: &str) -> bool {
        self.enabled_extensions.borrow().contains(uuid)
    }

    fn enable(&self, uuid: &str) -> Result<CommandOutput, String> {
        self.log(format!("enable {}", uuid));
        if !self.installed_extensions.contains(uuid) {
            return Ok(CommandOutput::failed(
                2,
                &format!("Extension “{}” does not exist\n", uuid),
            ));
        }
        self.enabled_extensions.borrow_mut().insert(uuid.to_string());
        Ok(CommandOutput::ok(""))
    }
}

impl AppCatalog for MockDesktop {
    fn has_remote(&self, name: &str) -> bool {
        self.remotes.borrow().contains_key(name)
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<CommandOutput, String> {
        self.log(format!("remote-add {}", name));
        self.remotes
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| url.to_string());
        Ok(CommandOutput::ok(""))
    }

    fn remove_remote(&self, name: &str) -> Result<CommandOutput, String> {
        self.log(format!("remote-delete {}", name));
        self.remotes.borrow_mut().remove(name);
        Ok(CommandOutput::ok(""))
    }

    fn query_remote(&self, remote: &str, app: &str) -> Result<CommandOutput, String> {
        self.log(format!("remote-info {} {}", remote, app));
        let remaining = self.query_failures.get();
        if remaining > 0 {
            if remaining != u32::MAX {
                self.query_failures.set(remaining - 1);
            }
            return Ok(CommandOutput::failed(
                1,
                &format!(
                    "error: Unable to load summary from remote {}: Could not resolve hostname\n",
                    remote
                ),
            ));
        }
        if !self.has_remote(remote) {
            return Ok(CommandOutput::failed(
                1,
                &format!("error: Remote \"{}\" not found\n", remote),
            ));
        }
        if !self.available_apps.contains(app) {
            return Ok(CommandOutput::failed(
                1,
                &format!("error: Nothing matches {} in remote {}\n", app, remote),
            ));
        }
        Ok(CommandOutput::ok(&format!("Ref: app/{}/x86_64/stable\n", app)))
    }

    fn is_installed(&self, app: &str) -> bool {
        self.installed_apps.borrow().contains(app)
    }

    fn install(&self, remote: &str, app: &str) -> Result<CommandOutput, String> {
        self.log(format!("install {} {}", remote, app));
        if !self.has_remote(remote) {
            return Ok(CommandOutput::failed(
                1,
                &format!("error: No remote refs found similar to ‘{}’\n", remote),
            ));
        }
        if !self.available_apps.contains(app) {
            return Ok(CommandOutput::failed(
                1,
                &format!("error: Nothing matches {} in remote {}\n", app, remote),
            ));
        }
        self.installed_apps.borrow_mut().insert(app.to_string());
        Ok(CommandOutput::ok(&format!("Installing {}... done\n", app)))
    }
}
