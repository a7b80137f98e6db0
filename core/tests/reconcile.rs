//! End-to-end reconciler runs against the in-memory desktop.

use std::cell::Cell;
use std::path::Path;
use std::process::Command as Process;
use std::rc::Rc;
use std::time::Duration;

use firstboot_core::convergence::executor::Backends;
use firstboot_core::convergence::retry::RetryPolicy;
use firstboot_core::infrastructure::env::MapEnv;
use firstboot_core::infrastructure::mock::MockDesktop;
use firstboot_core::infrastructure::runner::MockRunner;
use firstboot_core::lock::{self, LockAttempt};
use firstboot_core::readiness::probes::{ScriptedProbe, SessionProbe};
use firstboot_core::readiness::{CatalogPreflight, RecordingSleeper, Sleeper};
use firstboot_core::reconciler::{Reconciler, RunOutcome};
use firstboot_core::report::MAX_FAILURE_EXIT;
use firstboot_core::reschedule::RecordingScheduler;
use firstboot_core::state::StatePaths;
use firstboot_core::types::config::{BackoffStrategy, MarkerPolicy, ReconcilerConfig};
use firstboot_core::types::{Operation, Precondition, RunSummary};

const INTERFACE: &str = "org.gnome.desktop.interface";
const FLATHUB_URL: &str = "https://dl.flathub.org/repo/flathub.flatpakrepo";


fn config(name: &str, policy: MarkerPolicy) -> ReconcilerConfig {
    ReconcilerConfig {
        name: name.into(),
        readiness: RetryPolicy::new(4, BackoffStrategy::Exponential, 1_000, 4_000),
        poll_interval_secs: 60,
        marker_policy: policy,
        adopt_timeout_ms: 0,
    }
}

fn all_backends(desktop: &Rc<MockDesktop>) -> Backends {
    Backends {
        settings: Some(desktop.clone()),
        extensions: Some(desktop.clone()),
        catalog: Some(desktop.clone()),
    }
}

fn reconciler(
    dir: &Path,
    name: &str,
    policy: MarkerPolicy,
    ops: Vec<Operation>,
    desktop: &Rc<MockDesktop>,
) -> Reconciler {
    Reconciler::new(config(name, policy), StatePaths::new(dir, name), ops)
        .with_probe(Box::new(ScriptedProbe::always("ready", true)))
        .with_runner(Box::new(MockRunner::new()))
        .with_sleeper(Box::new(RecordingSleeper::new()))
        .with_backends(all_backends(desktop))
}

fn completed(outcome: RunOutcome) -> RunSummary {
    match outcome {
        RunOutcome::Completed(s) => s,
        other => panic!("expected a completed run, got {:?}", other),
    }
}


#[test]
fn mixed_batch_succeeds_and_skips() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(
        MockDesktop::new()
            .with_schemas(&[INTERFACE])
            .with_remote("flathub", FLATHUB_URL)
            .with_installed_apps(&["app.Y"]),
    );
    let ops = vec![
        Operation::set(INTERFACE, "color-scheme", "'prefer-dark'"),
        Operation::enable("ext-X").when(Precondition::ExtensionInstalled("ext-X".into())),
        Operation::install("flathub", "app.Y"),
    ];
    let r = reconciler(dir.path(), "mixed", MarkerPolicy::Always, ops, &desktop);

    let outcome = r.run(&RecordingScheduler::new()).unwrap();
    assert_eq!(outcome.exit_code(), 0);
    let summary = completed(outcome);
    assert_eq!((summary.succeeded, summary.failed, summary.skipped), (1, 0, 2));
    assert!(summary.failures.is_empty());
    assert!(summary.completed_at.is_some());
    // The installed app was never reinstalled.
    assert!(!desktop.calls().iter().any(|c| c.starts_with("install")));

    let text = std::fs::read_to_string(r.paths().summary()).unwrap();
    assert!(text.contains("1 succeeded"));
    let last = r.reporter().load_last().unwrap().unwrap();
    assert_eq!(last, summary);
}


#[test]
fn failures_do_not_stop_the_batch_and_set_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(
        MockDesktop::new()
            .with_schemas(&[INTERFACE])
            .with_failing_key(INTERFACE, "gtk-theme", "GLib-GIO-CRITICAL: Failed to connect to D-Bus session bus"),
    );
    let ops = vec![
        Operation::set("org.absent.schema", "k", "1"),
        Operation::set(INTERFACE, "gtk-theme", "'Adwaita-dark'"),
        Operation::set(INTERFACE, "color-scheme", "'prefer-dark'"),
    ];
    let r = reconciler(dir.path(), "partial", MarkerPolicy::OnSuccess, ops, &desktop);

    let outcome = r.run(&RecordingScheduler::new()).unwrap();
    assert_eq!(outcome.exit_code(), 2);
    let summary = completed(outcome);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures.len(), 2);
    assert_eq!(desktop.value(INTERFACE, "color-scheme").as_deref(), Some("'prefer-dark'"));

    // on_success: no marker, so the next invocation tries again.
    assert!(!r.paths().marker().exists());
    let again = completed(r.run(&RecordingScheduler::new()).unwrap());
    assert_eq!(again.failed, 2);
}


#[test]
fn failure_exit_code_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(MockDesktop::new());
    let ops: Vec<Operation> = (0..200)
        .map(|i| Operation::set("org.absent", &format!("k{}", i), "1"))
        .collect();
    let r = reconciler(dir.path(), "many", MarkerPolicy::Always, ops, &desktop);
    let outcome = r.run(&RecordingScheduler::new()).unwrap();
    assert_eq!(outcome.exit_code(), MAX_FAILURE_EXIT);
}


#[test]
fn reset_then_rerun_skips_what_is_installed() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(
        MockDesktop::new()
            .with_schemas(&[INTERFACE])
            .with_remote("flathub", FLATHUB_URL)
            .with_available_apps(&["org.gnome.Calculator", "org.videolan.VLC"]),
    );
    let ops = vec![
        Operation::set(INTERFACE, "color-scheme", "'prefer-dark'"),
        Operation::install("flathub", "org.gnome.Calculator"),
        Operation::install("flathub", "org.videolan.VLC"),
    ];
    let r = reconciler(dir.path(), "apps", MarkerPolicy::Always, ops, &desktop);

    let first = completed(r.run(&RecordingScheduler::new()).unwrap());
    assert_eq!((first.succeeded, first.skipped), (3, 0));

    // Marker present: nothing touched.
    desktop.clear_calls();
    assert_eq!(r.run(&RecordingScheduler::new()).unwrap(), RunOutcome::AlreadyCompleted);
    assert!(desktop.calls().is_empty());

    assert!(r.reporter().invalidate().unwrap());
    let second = completed(r.run(&RecordingScheduler::new()).unwrap());
    assert_eq!((second.succeeded, second.skipped, second.failed), (1, 2, 0));
    assert!(!desktop.calls().iter().any(|c| c.starts_with("install")));
}


#[test]
fn lock_held_by_live_process_then_reclaimed_when_it_dies() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(MockDesktop::new().with_schemas(&[INTERFACE]));
    let ops = vec![Operation::set(INTERFACE, "color-scheme", "'prefer-dark'")];
    let r = reconciler(dir.path(), "contended", MarkerPolicy::Always, ops, &desktop);

    let mut holder = Process::new("sleep").arg("30").spawn().unwrap();
    std::fs::write(r.paths().lock(), lock::lock_content(holder.id())).unwrap();

    let outcome = r.run(&RecordingScheduler::new()).unwrap();
    assert_eq!(outcome, RunOutcome::AlreadyLocked { owner: holder.id() });
    assert_eq!(outcome.exit_code(), 0);
    assert!(desktop.calls().is_empty());

    holder.kill().unwrap();
    holder.wait().unwrap();

    let summary = completed(r.run(&RecordingScheduler::new()).unwrap());
    assert_eq!(summary.succeeded, 1);
    assert!(!r.paths().lock().exists());
}


#[test]
fn unreachable_catalog_backgrounds_then_watcher_installs() {
    let dir = tempfile::tempdir().unwrap();
    let apps = ["org.mozilla.firefox", "org.gnome.TextEditor"];
    // Two failed queries in the foreground (probe + repair), two more on the
    // first watcher poll, then the remote answers.
    let desktop = Rc::new(
        MockDesktop::new()
            .with_available_apps(&apps)
            .with_query_failures(4),
    );
    let ops = apps.iter().map(|a| Operation::install("flathub", a)).collect();
    let sleeper = Rc::new(RecordingSleeper::new());
    let r = Reconciler::new(
        config("flatpak-install", MarkerPolicy::Always),
        StatePaths::new(dir.path(), "flatpak-install"),
        ops,
    )
    .with_probe(Box::new(ScriptedProbe::always("network", true)))
    .with_preflight(Box::new(CatalogPreflight::new(
        desktop.clone(),
        "flathub",
        FLATHUB_URL,
        apps[0],
    )))
    .with_runner(Box::new(MockRunner::new()))
    .with_sleeper(Box::new(sleeper.clone()))
    .with_backends(all_backends(&desktop));

    let sched = RecordingScheduler::new();
    let outcome = r.run(&sched).unwrap();
    assert_eq!(outcome, RunOutcome::Backgrounded);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(sched.detached(), vec!["flatpak-install"]);
    assert!(!desktop.app_installed(apps[0]));
    assert!(!r.paths().marker().exists());

    // What the detached watcher does once it holds the lock.
    let held = match lock::acquire(&r.paths().lock()).unwrap() {
        LockAttempt::Acquired(h) => h,
        LockAttempt::AlreadyLocked { owner } => panic!("lock held by {}", owner),
    };
    let summary = completed(r.watch_with(held).unwrap());
    assert_eq!(summary.succeeded, 2);
    assert!(apps.iter().all(|a| desktop.app_installed(a)));
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(60); 2]);
    assert!(r.paths().marker().exists());
    assert!(!r.paths().lock().exists());
}


/// Brings the compositor and session bus up on the `after`-th sleep.
struct SessionStartsAfter {
    env: Rc<MapEnv>,
    sleeps: Cell<u32>,
    after: u32,
}

impl Sleeper for SessionStartsAfter {
    fn sleep(&self, _: Duration) {
        let n = self.sleeps.get() + 1;
        self.sleeps.set(n);
        if n == self.after {
            self.env.add_path("/run/user/1000/wayland-0");
            self.env.add_path("/run/user/1000/bus");
        }
    }
}


#[test]
fn session_started_after_background_is_seen_by_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(MockDesktop::new().with_schemas(&[INTERFACE]));
    // No display variables: the session only shows up as sockets.
    let env = Rc::new(
        MapEnv::new()
            .with_var("XDG_SESSION_TYPE", "wayland")
            .with_var("XDG_RUNTIME_DIR", "/run/user/1000"),
    );
    // Three sleeps in the foreground wait, then the watcher's first poll
    // fails and its second succeeds.
    let sleeper = Rc::new(SessionStartsAfter {
        env: env.clone(),
        sleeps: Cell::new(0),
        after: 5,
    });
    let r = Reconciler::new(
        config("gnome-config", MarkerPolicy::Always),
        StatePaths::new(dir.path(), "gnome-config"),
        vec![Operation::set(INTERFACE, "color-scheme", "'prefer-dark'")],
    )
    .with_probe(Box::new(SessionProbe::new(env.clone())))
    .with_runner(Box::new(MockRunner::new()))
    .with_sleeper(Box::new(sleeper.clone()))
    .with_backends(all_backends(&desktop));

    let sched = RecordingScheduler::new();
    assert_eq!(r.run(&sched).unwrap(), RunOutcome::Backgrounded);
    assert_eq!(sched.detached(), vec!["gnome-config"]);
    assert_eq!(sleeper.sleeps.get(), 3);
    assert!(desktop.calls().is_empty());

    let held = match lock::acquire(&r.paths().lock()).unwrap() {
        LockAttempt::Acquired(h) => h,
        LockAttempt::AlreadyLocked { owner } => panic!("lock held by {}", owner),
    };
    let summary = completed(r.watch_with(held).unwrap());
    assert_eq!(summary.succeeded, 1);
    assert_eq!(sleeper.sleeps.get(), 5);
    assert_eq!(desktop.value(INTERFACE, "color-scheme").as_deref(), Some("'prefer-dark'"));
    assert!(r.paths().marker().exists());
}


#[test]
fn statuses_follow_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Rc::new(
        MockDesktop::new()
            .with_schemas(&[INTERFACE])
            .with_extensions(&["ext-A"]),
    );
    let ops = vec![
        Operation::enable("ext-A").when(Precondition::ExtensionInstalled("ext-A".into())),
        Operation::set(INTERFACE, "clock-show-weekday", "true"),
        Operation::set("org.absent", "k", "1"),
        Operation::enable("ext-B").when(Precondition::ExtensionInstalled("ext-B".into())),
    ];
    let r = reconciler(dir.path(), "ordered", MarkerPolicy::Always, ops, &desktop);
    let summary = completed(r.run(&RecordingScheduler::new()).unwrap());
    assert_eq!(summary.total(), 4);

    let log = std::fs::read_to_string(r.paths().run_log()).unwrap();
    let positions: Vec<usize> = ["(1/4)", "(2/4)", "(3/4)", "(4/4)"]
        .iter()
        .map(|tag| log.find(tag).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(summary.failures[0].operation.target, "org.absent k");
}
