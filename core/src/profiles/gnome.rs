//! `gnome-config`: desktop settings and shell extensions for the first user
//! session.

use std::rc::Rc;

use crate::convergence::executor::Backends;
use crate::convergence::retry::RetryPolicy;
use crate::infrastructure::env::ProcessEnv;
use crate::infrastructure::extensions::{GnomeExtensions, GNOME_EXTENSIONS};
use crate::infrastructure::gsettings::{Gsettings, GSETTINGS};
use crate::infrastructure::runner::ProcessRunner;
use crate::infrastructure::SettingsBackend;
use crate::readiness::probes::{SessionProbe, SettingsProbe};
use crate::reconciler::Reconciler;
use crate::state::StatePaths;
use crate::types::config::{BackoffStrategy, MarkerPolicy, ReconcilerConfig};
use crate::types::{Operation, Precondition};


pub const NAME: &str = "gnome-config";
pub const REQUIRED_COMMANDS: &[&str] = &[GSETTINGS, GNOME_EXTENSIONS];

const INTERFACE: &str = "org.gnome.desktop.interface";
const WM: &str = "org.gnome.desktop.wm.preferences";
const DASH_TO_DOCK: &str = "dash-to-dock@micxgx.gmail.com";
const DASH_TO_DOCK_SCHEMA: &str = "org.gnome.shell.extensions.dash-to-dock";
const APPINDICATOR: &str = "appindicatorsupport@rgcjonas.gmail.com";


pub fn default_config() -> ReconcilerConfig {
    ReconcilerConfig {
        name: NAME.into(),
        readiness: RetryPolicy::new(12, BackoffStrategy::Fixed, 10_000, 10_000),
        poll_interval_secs: 30,
        marker_policy: MarkerPolicy::Always,
        adopt_timeout_ms: 10_000,
    }
}


pub fn operations() -> Vec<Operation> {
    vec![
        Operation::set(INTERFACE, "color-scheme", "'prefer-dark'"),
        Operation::set(INTERFACE, "gtk-theme", "'Adwaita-dark'"),
        Operation::set(INTERFACE, "clock-show-weekday", "true"),
        Operation::set(INTERFACE, "enable-hot-corners", "false"),
        Operation::set(WM, "button-layout", "'appmenu:minimize,maximize,close'"),
        Operation::set("org.gnome.mutter", "dynamic-workspaces", "false"),
        Operation::set(WM, "num-workspaces", "4"),
        Operation::set("org.gnome.desktop.peripherals.touchpad", "tap-to-click", "true"),
        Operation::set("org.gnome.settings-daemon.plugins.power", "sleep-inactive-ac-type", "'nothing'"),
        Operation::set(
            "org.gnome.shell",
            "favorite-apps",
            "['org.mozilla.firefox.desktop', 'org.gnome.Nautilus.desktop', 'org.gnome.Console.desktop']",
        ),
        Operation::enable(APPINDICATOR).when(Precondition::ExtensionInstalled(APPINDICATOR.into())),
        Operation::enable(DASH_TO_DOCK).when(Precondition::ExtensionInstalled(DASH_TO_DOCK.into())),
        Operation::set(DASH_TO_DOCK_SCHEMA, "dock-position", "'BOTTOM'")
            .when(Precondition::SchemaAvailable(DASH_TO_DOCK_SCHEMA.into())),
        Operation::set(DASH_TO_DOCK_SCHEMA, "dash-max-icon-size", "40")
            .when(Precondition::SchemaAvailable(DASH_TO_DOCK_SCHEMA.into())),
        Operation::set(DASH_TO_DOCK_SCHEMA, "dock-fixed", "false")
            .when(Precondition::ExtensionEnabled(DASH_TO_DOCK.into())),
    ]
}


pub fn build(config: ReconcilerConfig, paths: StatePaths) -> Reconciler {
    let settings: Rc<dyn SettingsBackend> = Rc::new(Gsettings::new(ProcessRunner));
    let extensions = Rc::new(GnomeExtensions::new(ProcessRunner));
    Reconciler::new(config, paths, operations())
        .with_probe(Box::new(SessionProbe::new(ProcessEnv)))
        .with_probe(Box::new(SettingsProbe::new(settings.clone(), INTERFACE, "color-scheme")))
        .with_backends(Backends {
            settings: Some(settings),
            extensions: Some(extensions),
            catalog: None,
        })
}
