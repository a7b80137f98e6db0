use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use super::Environment;

/// The real process environment.
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn path_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn list_dir(&self, dir: &str) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn uid(&self) -> u32 {
        unsafe { libc::getuid() }
    }
}

/// Fixed environment for tests. Paths can be added after construction to
/// model sockets that appear while a watcher is polling.
#[derive(Debug, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
    paths: RefCell<Vec<String>>,
    uid: u32,
}

impl Default for MapEnv {
    fn default() -> Self {
        MapEnv {
            vars: HashMap::new(),
            paths: RefCell::new(Vec::new()),
            uid: 1000,
        }
    }
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_path(self, path: &str) -> Self {
        self.add_path(path);
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    pub fn add_path(&self, path: &str) {
        self.paths.borrow_mut().push(path.to_string());
    }
}

impl Environment for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn path_exists(&self, path: &str) -> bool {
        self.paths.borrow().iter().any(|p| p == path)
    }

    fn list_dir(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .paths
            .borrow()
            .iter()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn uid(&self) -> u32 {
        self.uid
    }
}
