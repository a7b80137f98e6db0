//! Concrete readiness probes.

use std::cell::Cell;
use std::net::{TcpStream, ToSocketAddrs};
use std::rc::Rc;
use std::time::Duration;

use super::{Probe, ReadinessState};
use crate::infrastructure::{Environment, SettingsBackend};


// ---------------------------------------------------------------------------
// Desktop session
// ---------------------------------------------------------------------------

const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";

/// A graphical session with a reachable session bus exists.
///
/// Environment variables are consulted first. A process started before the
/// session (such as the background watcher) never sees them change, so the
/// compositor sockets under the runtime directory and the X11 socket
/// directory are listed on every probe as well.
pub struct SessionProbe<E: Environment> {
    env: E,
}

/// Display address plus the session type it implies.
struct Display {
    address: String,
    kind: &'static str,
}

impl<E: Environment> SessionProbe<E> {
    pub fn new(env: E) -> Self {
        SessionProbe { env }
    }

    fn runtime_dir(&self) -> String {
        self.env
            .var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|| format!("/run/user/{}", self.env.uid()))
    }

    fn display(&self) -> Option<Display> {
        if let Some(address) = self.env.var("WAYLAND_DISPLAY") {
            return Some(Display { address, kind: "wayland" });
        }
        if let Some(address) = self.env.var("DISPLAY") {
            return Some(Display { address, kind: "x11" });
        }
        let wayland = self
            .env
            .list_dir(&self.runtime_dir())
            .into_iter()
            .find(|n| n.starts_with("wayland-") && !n.ends_with(".lock"));
        if let Some(address) = wayland {
            return Some(Display { address, kind: "wayland" });
        }
        self.env
            .list_dir(X11_SOCKET_DIR)
            .into_iter()
            .find_map(|n| {
                let num = n.strip_prefix('X')?;
                num.parse::<u32>().ok()?;
                Some(Display { address: format!(":{}", num), kind: "x11" })
            })
    }

    fn bus_available(&self) -> bool {
        self.env.var("DBUS_SESSION_BUS_ADDRESS").is_some()
            || self.env.path_exists(&format!("{}/bus", self.runtime_dir()))
    }
}

impl<E: Environment> Probe for SessionProbe<E> {
    fn name(&self) -> &str {
        "desktop session"
    }

    fn probe(&self) -> ReadinessState {
        let display = match self.display() {
            Some(d) => d,
            None => return ReadinessState::not_ready("no display server address"),
        };
        if !self.bus_available() {
            return ReadinessState::not_ready("no session bus address");
        }
        let kind = self
            .env
            .var("XDG_SESSION_TYPE")
            .or_else(|| self.env.var("XDG_CURRENT_DESKTOP"))
            .unwrap_or_else(|| display.kind.to_string());
        ReadinessState::ready(format!("{} session on {}", kind, display.address))
    }
}


// ---------------------------------------------------------------------------
// Settings backend
// ---------------------------------------------------------------------------

/// The settings backend answers a read of a well-known key.
pub struct SettingsProbe {
    settings: Rc<dyn SettingsBackend>,
    schema: String,
    key: String,
}

impl SettingsProbe {
    pub fn new(settings: Rc<dyn SettingsBackend>, schema: &str, key: &str) -> Self {
        SettingsProbe {
            settings,
            schema: schema.to_string(),
            key: key.to_string(),
        }
    }
}

impl Probe for SettingsProbe {
    fn name(&self) -> &str {
        "settings backend"
    }

    fn probe(&self) -> ReadinessState {
        match self.settings.get(&self.schema, &self.key) {
            Ok(out) if out.success() => ReadinessState::ready("settings backend responsive"),
            Ok(out) => ReadinessState::not_ready(out.stderr.trim().to_string()),
            Err(e) => ReadinessState::not_ready(e),
        }
    }
}


// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// A TCP connection to `host:port` can be opened.
pub struct NetworkProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl NetworkProbe {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        NetworkProbe {
            host: host.to_string(),
            port,
            timeout,
        }
    }
}

impl Probe for NetworkProbe {
    fn name(&self) -> &str {
        "network"
    }

    fn probe(&self) -> ReadinessState {
        let addrs = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(a) => a.collect::<Vec<_>>(),
            Err(e) => return ReadinessState::not_ready(format!("cannot resolve {}: {}", self.host, e)),
        };
        let mut last_err = format!("{} resolved to no addresses", self.host);
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => {
                    return ReadinessState::ready(format!("{}:{} reachable", self.host, self.port))
                }
                Err(e) => last_err = format!("{}: {}", addr, e),
            }
        }
        ReadinessState::not_ready(last_err)
    }
}


// ---------------------------------------------------------------------------
// Scripted (tests)
// ---------------------------------------------------------------------------

/// Answers from a fixed script, repeating the last answer once exhausted.
pub struct ScriptedProbe {
    name: String,
    script: Vec<bool>,
    calls: Rc<Cell<u32>>,
}

impl ScriptedProbe {
    pub fn new(name: &str, script: Vec<bool>) -> Self {
        ScriptedProbe {
            name: name.to_string(),
            script,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn always(name: &str, ready: bool) -> Self {
        Self::new(name, vec![ready])
    }

    /// Shared call counter, readable after the probe is boxed away.
    pub fn calls(&self) -> Rc<Cell<u32>> {
        self.calls.clone()
    }
}

impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> ReadinessState {
        let n = self.calls.get();
        self.calls.set(n + 1);
        let ready = self
            .script
            .get(n as usize)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(false);
        if ready {
            ReadinessState::ready("scripted ready")
        } else {
            ReadinessState::not_ready("scripted not ready")
        }
    }
}
