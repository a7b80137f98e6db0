//! `gnome-extensions` backend.

use super::runner::{CommandOutput, CommandRunner};
use super::ExtensionManager;

pub const GNOME_EXTENSIONS: &str = "gnome-extensions";

pub struct GnomeExtensions<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GnomeExtensions<R> {
    pub fn new(runner: R) -> Self {
        GnomeExtensions { runner }
    }

    fn listed(&self, args: &[&str], uuid: &str) -> bool {
        match self.runner.run(GNOME_EXTENSIONS, args) {
            Ok(out) if out.success() => out.stdout.lines().any(|l| l.trim() == uuid),
            _ => false,
        }
    }
}

impl<R: CommandRunner> ExtensionManager for GnomeExtensions<R> {
    fn is_installed(&self, uuid: &str) -> bool {
        self.listed(&["list"], uuid)
    }

    fn is_enabled(&self, uuid: &str) -> bool {
        self.listed(&["list", "--enabled"], uuid)
    }

    fn enable(&self, uuid: &str) -> Result<CommandOutput, String> {
        self.runner.run(GNOME_EXTENSIONS, &["enable", uuid])
    }
}
