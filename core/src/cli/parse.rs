use crate::command::Command;
use crate::profiles::Profile;
use crate::reschedule::WATCH_SUBCOMMAND;


/// Parse CLI arguments into a typed Command enum.
///
/// Arguments are expected WITHOUT the program name (i.e., `args` should
/// be `["gnome-config"]`, not `["firstboot", "gnome-config"]`).
pub fn parse_args(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command specified. Run 'firstboot help' for usage.".into());
    }

    match args[0] {
        "status" => parse_status(args),
        "reset" => parse_reset(args),
        "help" | "--help" | "-h" => Ok(Command::Help),
        WATCH_SUBCOMMAND => parse_watch(args),
        name if is_reconciler(name) => parse_run(args),
        _ => Err(format!("Unknown command: '{}'", args[0])),
    }
}


pub fn usage() -> String {
    let names: Vec<&str> = Profile::ALL.iter().map(|p| p.name()).collect();
    format!(
        "Usage:\n  firstboot <{}>\n  firstboot status [<name>] [--json]\n  firstboot reset <name>\n  firstboot help\n",
        names.join("|")
    )
}


// ---------------------------------------------------------------------------
// Sub-parsers
// ---------------------------------------------------------------------------

/// `firstboot <name>` (no further arguments)
fn parse_run(args: &[&str]) -> Result<Command, String> {
    if args.len() > 1 {
        return Err(format!("'{}' takes no arguments", args[0]));
    }
    Ok(Command::Run {
        name: args[0].into(),
    })
}

/// `firstboot status [<name>] [--json]`
fn parse_status(args: &[&str]) -> Result<Command, String> {
    let mut name = None;
    let mut json = false;
    for arg in &args[1..] {
        match *arg {
            "--json" => json = true,
            n if is_reconciler(n) && name.is_none() => name = Some(n.to_string()),
            other => return Err(format!("Unknown argument for status: '{}'", other)),
        }
    }
    Ok(Command::Status { name, json })
}

/// `firstboot reset <name>`
fn parse_reset(args: &[&str]) -> Result<Command, String> {
    match args {
        [_, name] if is_reconciler(name) => Ok(Command::Reset {
            name: name.to_string(),
        }),
        [_, name] => Err(format!("Unknown reconciler: '{}'", name)),
        _ => Err("Usage: firstboot reset <name>".into()),
    }
}

/// `firstboot __watch <name>`
fn parse_watch(args: &[&str]) -> Result<Command, String> {
    match args {
        [_, name] if is_reconciler(name) => Ok(Command::Watch {
            name: name.to_string(),
        }),
        _ => Err(format!("Usage: firstboot {} <name>", WATCH_SUBCOMMAND)),
    }
}

fn is_reconciler(name: &str) -> bool {
    Profile::from_name(name).is_ok()
}
