//! `gsettings` command-line settings backend.

use super::runner::{CommandOutput, CommandRunner};
use super::SettingsBackend;

pub const GSETTINGS: &str = "gsettings";

pub struct Gsettings<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> Gsettings<R> {
    pub fn new(runner: R) -> Self {
        Gsettings { runner }
    }
}

impl<R: CommandRunner> SettingsBackend for Gsettings<R> {
    fn get(&self, schema: &str, key: &str) -> Result<CommandOutput, String> {
        self.runner.run(GSETTINGS, &["get", schema, key])
    }

    fn set(&self, schema: &str, key: &str, value: &str) -> Result<CommandOutput, String> {
        self.runner.run(GSETTINGS, &["set", schema, key, value])
    }

    fn list_available_capabilities(&self) -> Result<Vec<String>, String> {
        let out = self.runner.run(GSETTINGS, &["list-schemas"])?;
        if !out.success() {
            return Err(out.stderr.trim().to_string());
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;

    #[test]
    fn set_passes_value_as_single_argument() {
        let g = Gsettings::new(MockRunner::new());
        g.set("org.gnome.desktop.wm.preferences", "button-layout", "'appmenu:minimize,close'")
            .unwrap();
        assert_eq!(
            g.runner.executed_commands(),
            vec!["gsettings set org.gnome.desktop.wm.preferences button-layout 'appmenu:minimize,close'"]
        );
    }

    #[test]
    fn list_schemas_parses_lines() {
        let g = Gsettings::new(MockRunner::with_responses(vec![Ok(CommandOutput::ok(
            "org.gnome.desktop.interface\norg.gnome.mutter\n\n",
        ))]));
        let schemas = g.list_available_capabilities().unwrap();
        assert_eq!(schemas, vec!["org.gnome.desktop.interface", "org.gnome.mutter"]);
    }

    #[test]
    fn list_schemas_failure_is_err() {
        let g = Gsettings::new(MockRunner::with_responses(vec![Ok(CommandOutput::failed(
            1,
            "Cannot autolaunch D-Bus\n",
        ))]));
        assert_eq!(g.list_available_capabilities().unwrap_err(), "Cannot autolaunch D-Bus");
    }
}
