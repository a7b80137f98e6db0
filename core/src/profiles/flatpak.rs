//! `flatpak-install`: system-wide applications from Flathub.

use std::rc::Rc;
use std::time::Duration;

use crate::convergence::executor::Backends;
use crate::convergence::retry::RetryPolicy;
use crate::infrastructure::flatpak::{Flatpak, FLATPAK};
use crate::infrastructure::runner::ProcessRunner;
use crate::infrastructure::AppCatalog;
use crate::readiness::probes::NetworkProbe;
use crate::readiness::CatalogPreflight;
use crate::reconciler::Reconciler;
use crate::state::StatePaths;
use crate::types::config::{BackoffStrategy, MarkerPolicy, ReconcilerConfig};
use crate::types::Operation;


pub const NAME: &str = "flatpak-install";
pub const REQUIRED_COMMANDS: &[&str] = &[FLATPAK];

pub const REMOTE: &str = "flathub";
pub const REMOTE_URL: &str = "https://dl.flathub.org/repo/flathub.flatpakrepo";
const CATALOG_HOST: &str = "dl.flathub.org";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const APPS: &[&str] = &[
    "org.mozilla.firefox",
    "org.gnome.Calculator",
    "org.gnome.TextEditor",
    "org.gnome.Loupe",
    "com.github.tchx84.Flatseal",
    "org.videolan.VLC",
    "org.libreoffice.LibreOffice",
];


pub fn default_config() -> ReconcilerConfig {
    ReconcilerConfig {
        name: NAME.into(),
        readiness: RetryPolicy::new(30, BackoffStrategy::Exponential, 2_000, 60_000),
        poll_interval_secs: 60,
        marker_policy: MarkerPolicy::Always,
        adopt_timeout_ms: 10_000,
    }
}


pub fn operations() -> Vec<Operation> {
    APPS.iter().map(|app| Operation::install(REMOTE, app)).collect()
}


pub fn build(config: ReconcilerConfig, paths: StatePaths) -> Reconciler {
    let catalog: Rc<dyn AppCatalog> = Rc::new(Flatpak::new(ProcessRunner));
    Reconciler::new(config, paths, operations())
        .with_probe(Box::new(NetworkProbe::new(CATALOG_HOST, 443, CONNECT_TIMEOUT)))
        .with_preflight(Box::new(CatalogPreflight::new(
            catalog.clone(),
            REMOTE,
            REMOTE_URL,
            APPS[0],
        )))
        .with_backends(Backends {
            settings: None,
            extensions: None,
            catalog: Some(catalog),
        })
}
