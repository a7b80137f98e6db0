//! firstboot — command-line entry point for first-boot provisioning.
//!
//! # Usage
//!
//! ```text
//! firstboot gnome-config
//! firstboot flatpak-install
//! firstboot status [<name>] [--json]
//! firstboot reset <name>
//! ```
//!
//! Exit status: 0 for success or a no-op (already done, already running,
//! handed to the background watcher), the failed-operation count (capped at
//! 125) otherwise, 127 when a required host command is missing, 1 for any
//! other error.

use std::process;

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use firstboot_core::cli::{parse_args, usage};
use firstboot_core::command::Command;
use firstboot_core::error::ProvisionError;
use firstboot_core::infrastructure::env::ProcessEnv;
use firstboot_core::profiles::{HostDirs, Profile};
use firstboot_core::reconciler::RunOutcome;
use firstboot_core::report::RunReporter;
use firstboot_core::reschedule::ProcessScheduler;
use firstboot_core::status::StatusReport;
use firstboot_core::types::config::MarkerPolicy;


fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let arg_refs: Vec<&str> = args.iter().skip(1).map(|s| s.as_str()).collect();

    let cmd = match parse_args(&arg_refs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("firstboot: {}", e);
            eprint!("{}", usage());
            process::exit(1);
        }
    };

    let host = HostDirs::from_env(&ProcessEnv);
    let code = match execute(&host, cmd) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };
    process::exit(code);
}


fn init_tracing() {
    // stderr keeps stdout clean for `status --json`; the watcher's stderr is
    // its watch log.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}


fn execute(host: &HostDirs, cmd: Command) -> Result<i32, ProvisionError> {
    match cmd {
        Command::Help => {
            print!("{}", usage());
            Ok(0)
        }
        Command::Run { name } => {
            let reconciler = Profile::from_name(&name)?.build(host)?;
            let scheduler = ProcessScheduler::current()?;
            let outcome = reconciler.run(&scheduler)?;
            print_outcome(&name, &outcome);
            Ok(outcome.exit_code())
        }
        Command::Watch { name } => {
            let reconciler = Profile::from_name(&name)?.build(host)?;
            let outcome = reconciler.watch()?;
            print_outcome(&name, &outcome);
            Ok(outcome.exit_code())
        }
        Command::Status { name, json } => {
            let profiles = match name {
                Some(n) => vec![Profile::from_name(&n)?],
                None => Profile::ALL.to_vec(),
            };
            let reports = profiles
                .iter()
                .map(|p| StatusReport::collect(&p.paths(&host.state_dir)))
                .collect::<Result<Vec<_>, _>>()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for r in &reports {
                    print!("{}", r.render());
                }
            }
            Ok(0)
        }
        Command::Reset { name } => {
            let profile = Profile::from_name(&name)?;
            let reporter = RunReporter::new(profile.paths(&host.state_dir), MarkerPolicy::default());
            if reporter.invalidate()? {
                println!("{}: completion marker removed; next invocation runs again", name);
            } else {
                println!("{}: no completion marker", name);
            }
            Ok(0)
        }
    }
}


fn print_outcome(name: &str, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => print!("{}", summary.render()),
        RunOutcome::AlreadyLocked { owner } => println!("{}: {} (pid {})", name, outcome.label(), owner),
        other => println!("{}: {}", name, other.label()),
    }
}
