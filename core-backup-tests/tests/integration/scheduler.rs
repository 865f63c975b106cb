//! Scheduler loop tests on a real tokio runtime
//!
//! Cron expressions are chosen so that no tick falls inside a test; runs are
//! triggered by `run_on_startup` only.

use core_backup::config::load_config;
use core_backup::Scheduler;
use std::time::Duration;
use test_utils::{ConfigBuilder, ScriptedServices, TestContext, SCRIPTED};
use tokio_util::sync::CancellationToken;

const YEARLY: &str = "0 0 1 1 *";
const TEST_TIMEOUT: Duration = Duration::from_secs(30);

fn context(job: &str, run_on_startup: bool) -> TestContext {
    TestContext::from_builder(
        ConfigBuilder::minimal()
            .add_job(job, SCRIPTED)
            .with_scheduler(YEARLY, "Europe/Berlin", run_on_startup),
    )
}

/// Services that cancel `token` as soon as any job executes
fn cancelling_services(token: &CancellationToken) -> ScriptedServices {
    let token = token.clone();
    ScriptedServices::new().on_execute(move |_| token.cancel())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_on_startup_runs_one_batch() {
    let ctx = context("tick", true);
    let token = CancellationToken::new();
    let services = cancelling_services(&token);
    let config = load_config(ctx.config_path()).unwrap();

    let scheduler = Scheduler::new(&ctx.config_path(), config, services.registry())
        .with_poll_interval(Duration::from_millis(20));
    let outcome = tokio::time::timeout(TEST_TIMEOUT, scheduler.run(token))
        .await
        .expect("scheduler did not stop");

    assert!(outcome.is_ok());
    assert_eq!(services.calls_for("tick"), vec!["prepare", "execute", "finalize"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_while_waiting_for_next_tick() {
    let ctx = context("tick", false);
    let token = CancellationToken::new();
    let services = ScriptedServices::new();
    let config = load_config(ctx.config_path()).unwrap();

    let scheduler = Scheduler::new(&ctx.config_path(), config, services.registry());
    let handle = tokio::spawn(scheduler.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let outcome = tokio::time::timeout(TEST_TIMEOUT, handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(outcome.is_ok());
    assert!(services.log().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_removed_scheduler_section_stops_the_loop() {
    let ctx = context("tick", true);
    let token = CancellationToken::new();
    let services = ScriptedServices::new();
    let config = ctx.config().unwrap().clone();

    let mut without_scheduler = config.clone();
    without_scheduler.scheduler = None;
    ctx.write_config(&without_scheduler);

    let scheduler = Scheduler::new(&ctx.config_path(), config, services.registry());
    let outcome = tokio::time::timeout(TEST_TIMEOUT, scheduler.run(token))
        .await
        .expect("scheduler did not stop");

    assert!(outcome.is_ok());
    assert!(services.log().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reload_picks_up_new_jobs() {
    let ctx = context("old", true);
    let token = CancellationToken::new();
    let services = cancelling_services(&token);
    let config = ctx.config().unwrap().clone();

    let mut updated = config.clone();
    updated.jobs[0].name = "new".to_string();
    ctx.write_config(&updated);

    let scheduler = Scheduler::new(&ctx.config_path(), config, services.registry());
    let outcome = tokio::time::timeout(TEST_TIMEOUT, scheduler.run(token))
        .await
        .expect("scheduler did not stop");

    assert!(outcome.is_ok());
    assert!(services.calls_for("old").is_empty());
    assert_eq!(services.calls_for("new"), vec!["prepare", "execute", "finalize"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_broken_reload_keeps_previous_config() {
    let ctx = context("kept", true);
    let token = CancellationToken::new();
    let services = cancelling_services(&token);
    let config = ctx.config().unwrap().clone();

    ctx.create_file("core-backup.yaml", "jobs: [this is not valid");

    let scheduler = Scheduler::new(&ctx.config_path(), config, services.registry());
    let outcome = tokio::time::timeout(TEST_TIMEOUT, scheduler.run(token))
        .await
        .expect("scheduler did not stop");

    assert!(outcome.is_ok());
    assert_eq!(services.calls_for("kept"), vec!["prepare", "execute", "finalize"]);
}

#[tokio::test]
async fn test_missing_scheduler_section_is_an_error() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_job("tick", SCRIPTED));
    let config = ctx.config().unwrap().clone();

    let scheduler = Scheduler::new(&ctx.config_path(), config, ScriptedServices::new().registry());
    let outcome = scheduler.run(CancellationToken::new()).await;

    assert!(outcome.is_err());
}
