//! `flatpak` catalog backend, system-wide installation.

use super::runner::{CommandOutput, CommandRunner};
use super::AppCatalog;

pub const FLATPAK: &str = "flatpak";

pub struct Flatpak<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> Flatpak<R> {
    pub fn new(runner: R) -> Self {
        Flatpak { runner }
    }
}

impl<R: CommandRunner> AppCatalog for Flatpak<R> {
    fn has_remote(&self, name: &str) -> bool {
        match self
            .runner
            .run(FLATPAK, &["remotes", "--system", "--columns=name"])
        {
            Ok(out) if out.success() => out.stdout.lines().any(|l| l.trim() == name),
            _ => false,
        }
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<CommandOutput, String> {
        self.runner
            .run(FLATPAK, &["remote-add", "--system", "--if-not-exists", name, url])
    }

    fn remove_remote(&self, name: &str) -> Result<CommandOutput, String> {
        self.runner
            .run(FLATPAK, &["remote-delete", "--system", "--force", name])
    }

    fn query_remote(&self, remote: &str, app: &str) -> Result<CommandOutput, String> {
        self.runner
            .run(FLATPAK, &["remote-info", "--system", remote, app])
    }

    fn is_installed(&self, app: &str) -> bool {
        matches!(
            self.runner.run(FLATPAK, &["info", "--system", app]),
            Ok(out) if out.success()
        )
    }

    fn install(&self, remote: &str, app: &str) -> Result<CommandOutput, String> {
        self.runner.run(
            FLATPAK,
            &["install", "--system", "--noninteractive", "-y", remote, app],
        )
    }
}
