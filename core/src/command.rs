//! Command — the typed interface for every `firstboot` invocation.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `gnome-config`, `flatpak-install` | Foreground run of that reconciler |
//! | `status [<name>] [--json]` | Marker, lock and last-run summary |
//! | `reset <name>` | Remove the completion marker |
//! | `help` | Usage |
//! | `__watch <name>` | Background watcher (started by the binary itself) |


#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a reconciler in the foreground.
    Run { name: String },

    /// Report state for one reconciler, or all of them.
    Status { name: Option<String>, json: bool },

    /// Invalidate the completion marker so the next boot runs again.
    Reset { name: String },

    Help,

    /// Detached background watcher. Not meant to be typed by hand.
    Watch { name: String },
}
