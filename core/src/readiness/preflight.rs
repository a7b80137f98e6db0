//! Catalog preflight — make sure the remote is registered and answering
//! before any install is attempted.
//!
//! Unlike a `Probe`, a preflight may mutate: it registers a missing remote
//! and, when the connectivity check fails, makes exactly one repair attempt
//! (remove and re-add) before giving up for this poll.

use std::rc::Rc;

use tracing::{info, warn};

use super::ReadinessState;
use crate::infrastructure::{AppCatalog, CommandOutput};


pub trait Preflight {
    fn name(&self) -> &str;

    fn prepare(&self) -> ReadinessState;
}


pub struct CatalogPreflight {
    catalog: Rc<dyn AppCatalog>,
    remote: String,
    url: String,
    /// Application used for the connectivity query.
    probe_app: String,
}

impl CatalogPreflight {
    pub fn new(catalog: Rc<dyn AppCatalog>, remote: &str, url: &str, probe_app: &str) -> Self {
        CatalogPreflight {
            catalog,
            remote: remote.to_string(),
            url: url.to_string(),
            probe_app: probe_app.to_string(),
        }
    }

    fn ensure_remote(&self) -> Result<(), String> {
        if self.catalog.has_remote(&self.remote) {
            return Ok(());
        }
        info!(remote = %self.remote, url = %self.url, "registering catalog remote");
        check(self.catalog.add_remote(&self.remote, &self.url))
    }

    fn query(&self) -> Result<(), String> {
        check(self.catalog.query_remote(&self.remote, &self.probe_app))
    }

    fn repair(&self) -> Result<(), String> {
        warn!(remote = %self.remote, "remote unreachable; re-registering once");
        // A missing remote makes the delete fail; the re-add is what matters.
        let _ = self.catalog.remove_remote(&self.remote);
        check(self.catalog.add_remote(&self.remote, &self.url))?;
        self.query()
    }
}

impl Preflight for CatalogPreflight {
    fn name(&self) -> &str {
        "catalog remote"
    }

    fn prepare(&self) -> ReadinessState {
        if let Err(e) = self.ensure_remote() {
            return ReadinessState::not_ready(format!("cannot add remote {}: {}", self.remote, e));
        }
        let first = match self.query() {
            Ok(()) => return ReadinessState::ready(format!("remote {} reachable", self.remote)),
            Err(e) => e,
        };
        match self.repair() {
            Ok(()) => ReadinessState::ready(format!("remote {} reachable after repair", self.remote)),
            Err(e) => ReadinessState::not_ready(format!(
                "remote {} unreachable after repair: {} (before repair: {})",
                self.remote, e, first
            )),
        }
    }
}

fn check(outcome: Result<CommandOutput, String>) -> Result<(), String> {
    match outcome {
        Ok(out) if out.success() => Ok(()),
        Ok(out) => Err(out.stderr.trim().to_string()),
        Err(e) => Err(e),
    }
}
