//! Behavioural tests for the bootstrap sequence.

use std::cell::RefCell;
use std::sync::Arc;

use apigate_core::RequestContext;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;

use super::support::{FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader};
use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};

#[derive(Default)]
struct BootstrapWorld {
    loader: Option<Box<dyn ConfigLoader>>,
    reporter: Arc<RecordingHealthReporter>,
    outcome: Option<Result<Daemon, BootstrapError>>,
}

impl BootstrapWorld {
    fn daemon(&self) -> &Daemon {
        match &self.outcome {
            Some(Ok(daemon)) => daemon,
            other => panic!("bootstrap did not succeed: {:?}", other.as_ref().map(Result::is_ok)),
        }
    }
}

#[fixture]
fn world() -> RefCell<BootstrapWorld> {
    RefCell::new(BootstrapWorld::default())
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

#[given("a configuration without a users file")]
fn given_default_configuration(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Some(Box::new(TestConfigLoader::new()));
}

#[given("a users file with accounts \"ops\" and \"guest\"")]
fn given_users_file(world: &RefCell<BootstrapWorld>) {
    let loader = TestConfigLoader::new().with_users_file(
        r#"[
            {"username": "ops", "password": "ops-secret", "type": "admin"},
            {"username": "guest", "password": "guest"}
        ]"#,
    );
    world.borrow_mut().loader = Some(Box::new(loader));
}

#[given("a users file that is not JSON")]
fn given_malformed_users_file(world: &RefCell<BootstrapWorld>) {
    let loader = TestConfigLoader::new().with_users_file("users: [ops]");
    world.borrow_mut().loader = Some(Box::new(loader));
}

#[given("a configuration with an invalid socket")]
fn given_invalid_configuration(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Some(Box::new(FailingConfigLoader));
}

#[when("the daemon bootstraps")]
fn when_bootstraps(world: &RefCell<BootstrapWorld>) {
    let mut world = world.borrow_mut();
    let loader = world.loader.take().expect("loader configured");
    let reporter = Arc::clone(&world.reporter);
    world.outcome = Some(bootstrap_with(loader.as_ref(), reporter));
}

#[then("bootstrap succeeds")]
fn then_succeeds(world: &RefCell<BootstrapWorld>) {
    let world = world.borrow();
    world.daemon();
    let events = world.reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert_eq!(events.last(), Some(&HealthEvent::BootstrapSucceeded));
}

#[then("bootstrap fails mentioning \"{fragment}\"")]
fn then_fails(world: &RefCell<BootstrapWorld>, fragment: String) {
    let world = world.borrow();
    let Some(Err(error)) = &world.outcome else {
        panic!("bootstrap should fail");
    };
    let fragment = strip_quotes(&fragment);
    assert!(error.to_string().contains(fragment), "{error}");
    assert!(matches!(
        world.reporter.events().last(),
        Some(HealthEvent::BootstrapFailed(message)) if message.contains(fragment)
    ));
}

#[then("the store was seeded from \"{source}\" with {count} account")]
fn then_seeded_from(world: &RefCell<BootstrapWorld>, source: String, count: usize) {
    let expected = HealthEvent::StoreSeeded {
        source: strip_quotes(&source).to_owned(),
        accounts: count,
    };
    assert!(world.borrow().reporter.events().contains(&expected));
}

#[then("the store was seeded with {count} accounts")]
fn then_seeded(world: &RefCell<BootstrapWorld>, count: usize) {
    let seeded = world
        .borrow()
        .reporter
        .events()
        .into_iter()
        .any(|event| matches!(event, HealthEvent::StoreSeeded { accounts, .. } if accounts == count));
    assert!(seeded);
}

#[then("\"{username}\" can log in with password \"{password}\"")]
fn then_can_log_in(world: &RefCell<BootstrapWorld>, username: String, password: String) {
    let world = world.borrow();
    let daemon = world.daemon();
    let request = RequestContext::new(daemon.store().session());
    let envelope = daemon.endpoint().dispatcher().call_method(
        &request,
        "user",
        "login",
        json!({"username": strip_quotes(&username), "password": strip_quotes(&password)})
            .as_object()
            .cloned()
            .unwrap_or_default(),
        None,
    );
    assert!(envelope.is_success(), "{envelope:?}");
}

#[scenario(path = "tests/features/bootstrap.feature")]
fn daemon_bootstrap(#[from(world)] world: RefCell<BootstrapWorld>) {
    drop(world);
}
