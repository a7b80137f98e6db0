//! The reconcilers this binary ships: `gnome-config` and `flatpak-install`.
//!
//! Each profile owns its compiled-in operation list, readiness probes and
//! default timings. `Profile::build` wires the production backends.

pub mod flatpak;
pub mod gnome;

use std::path::PathBuf;

use crate::config;
use crate::error::ProvisionError;
use crate::infrastructure::Environment;
use crate::reconciler::Reconciler;
use crate::state::{resolve_state_dir, running_as_root, StatePaths};
use crate::types::config::ReconcilerConfig;
use crate::types::Operation;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    GnomeConfig,
    FlatpakInstall,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::GnomeConfig, Profile::FlatpakInstall];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::GnomeConfig => gnome::NAME,
            Profile::FlatpakInstall => flatpak::NAME,
        }
    }

    pub fn from_name(name: &str) -> Result<Profile, ProvisionError> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == name)
            .ok_or_else(|| ProvisionError::UnknownReconciler(name.to_string()))
    }

    pub fn default_config(&self) -> ReconcilerConfig {
        match self {
            Profile::GnomeConfig => gnome::default_config(),
            Profile::FlatpakInstall => flatpak::default_config(),
        }
    }

    pub fn operations(&self) -> Vec<Operation> {
        match self {
            Profile::GnomeConfig => gnome::operations(),
            Profile::FlatpakInstall => flatpak::operations(),
        }
    }

    /// Host commands whose absence is fatal.
    pub fn required_commands(&self) -> &'static [&'static str] {
        match self {
            Profile::GnomeConfig => gnome::REQUIRED_COMMANDS,
            Profile::FlatpakInstall => flatpak::REQUIRED_COMMANDS,
        }
    }

    pub fn paths(&self, state_dir: &std::path::Path) -> StatePaths {
        StatePaths::new(state_dir, self.name())
    }

    /// Production reconciler with host backends and the config override applied.
    pub fn build(&self, host: &HostDirs) -> Result<Reconciler, ProvisionError> {
        let config = config::load(self.default_config(), &host.config_dir)?;
        let paths = self.paths(&host.state_dir);
        let reconciler = match self {
            Profile::GnomeConfig => gnome::build(config, paths),
            Profile::FlatpakInstall => flatpak::build(config, paths),
        };
        Ok(self
            .required_commands()
            .iter()
            .fold(reconciler, |r, program| r.requires(program)))
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}


/// Where a host keeps reconciler state and config overrides.
#[derive(Debug, Clone)]
pub struct HostDirs {
    pub state_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl HostDirs {
    pub fn from_env(env: &dyn Environment) -> Self {
        HostDirs {
            state_dir: resolve_state_dir(env, running_as_root()),
            config_dir: config::resolve_config_dir(env),
        }
    }
}
