//! End-to-end step execution against the in-memory engine.

use std::sync::Arc;

use a11y_resolve::A11yHint;
use page_port::mock::{Fixture, MemoryBrowser, MemoryElement};
use step_engine::{Coord, MouseActionKind, RunOptions, Step, StepKind, Target};
use tabweaver_cli::bootstrap::{build_agent, Agent};
use tabweaver_cli::config::AgentConfig;
use tabweaver_core_types::{ErrorCode, WorkspaceId};

fn fixture_a() -> Fixture {
    Fixture::new("Fixture A")
        .with_element(MemoryElement::new("button", "button", "Action A"))
        .with_element(MemoryElement::new("input", "textbox", "Name A"))
}

fn quiet_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.human.enabled = false;
    config.trace.log_ops = false;
    config
}

fn agent_with_fixture_a() -> (Arc<MemoryBrowser>, Agent) {
    let browser = MemoryBrowser::new();
    browser.add_fixture("file://fixture_a.html", fixture_a());
    let agent = build_agent(&quiet_config(), browser.clone());
    (browser, agent)
}

fn goto(url: &str) -> Step {
    Step::new(StepKind::Goto { url: url.into() })
}

fn snapshot() -> Step {
    Step::new(StepKind::Snapshot { include_a11y: true })
}

#[tokio::test]
async fn goto_and_snapshot_expose_fixture_tree() {
    let (_, agent) = agent_with_fixture_a();
    let workspace = WorkspaceId::new();
    let outcome = agent
        .deps
        .runner
        .run_steps(
            &workspace,
            vec![goto("file://fixture_a.html"), snapshot()],
            RunOptions::default(),
        )
        .await
        .unwrap();

    assert!(outcome.ok);
    let tree = &outcome.results[1].data.as_ref().unwrap()["a11y"];
    let children = tree["children"].as_array().unwrap();
    assert!(children
        .iter()
        .any(|node| node["role"] == "button" && node["name"] == "Action A"));
    assert!(children
        .iter()
        .any(|node| node["role"] == "textbox" && node["name"] == "Name A"));
}

#[tokio::test]
async fn click_missing_button_reports_not_found() {
    let (_, agent) = agent_with_fixture_a();
    let workspace = WorkspaceId::new();
    let outcome = agent
        .deps
        .runner
        .run_steps(
            &workspace,
            vec![
                goto("file://fixture_a.html"),
                snapshot(),
                Step::new(StepKind::Click {
                    target: Some(Target::hint(A11yHint::role_name("button", "Missing"))),
                    coord: None,
                    click_count: 1,
                }),
            ],
            RunOptions::default(),
        )
        .await
        .unwrap();

    assert!(!outcome.ok);
    let error = outcome.results[2].error.as_ref().unwrap();
    assert_eq!(error.code, ErrorCode::NotFound);
    // The hint is echoed back for diagnosability.
    let details = error.details.as_ref().unwrap();
    assert_eq!(details["hint"]["name"], "Missing");
}

#[tokio::test]
async fn ambiguous_hint_never_silently_picks_one() {
    let browser = MemoryBrowser::new();
    browser.add_fixture(
        "file://dupes.html",
        Fixture::new("Dupes")
            .with_element(MemoryElement::new("button", "button", "Delete"))
            .with_element(MemoryElement::new("button", "button", "Delete")),
    );
    let agent = build_agent(&quiet_config(), browser);
    let workspace = WorkspaceId::new();
    let outcome = agent
        .deps
        .runner
        .run_steps(
            &workspace,
            vec![
                goto("file://dupes.html"),
                snapshot(),
                Step::new(StepKind::Click {
                    target: Some(Target::hint(A11yHint::role_name("button", "Delete"))),
                    coord: None,
                    click_count: 1,
                }),
            ],
            RunOptions::default(),
        )
        .await
        .unwrap();

    assert!(!outcome.ok);
    let error = outcome.results[2].error.as_ref().unwrap();
    assert_eq!(error.code, ErrorCode::Ambiguous);
}

#[tokio::test]
async fn conflicting_click_arguments_are_internal() {
    let (_, agent) = agent_with_fixture_a();
    let workspace = WorkspaceId::new();
    let outcome = agent
        .deps
        .runner
        .run_steps(
            &workspace,
            vec![Step::new(StepKind::Click {
                target: Some(Target::node("n0.0")),
                coord: Some(Coord { x: 1.0, y: 2.0 }),
                click_count: 1,
            })],
            RunOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.results[0].error.as_ref().unwrap().code,
        ErrorCode::Internal
    );
}

#[tokio::test]
async fn wheel_without_delta_is_internal() {
    let (_, agent) = agent_with_fixture_a();
    let workspace = WorkspaceId::new();
    let outcome = agent
        .deps
        .runner
        .run_steps(
            &workspace,
            vec![Step::new(StepKind::Mouse {
                action: MouseActionKind::Wheel,
                x: 3.0,
                y: 4.0,
                delta_x: None,
                delta_y: None,
            })],
            RunOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.results[0].error.as_ref().unwrap().code,
        ErrorCode::Internal
    );
}

#[tokio::test]
async fn stop_on_error_returns_partial_results() {
    let (_, agent) = agent_with_fixture_a();
    let workspace = WorkspaceId::new();
    let failing = Step::new(StepKind::Click {
        target: None,
        coord: None,
        click_count: 1,
    });
    let steps = vec![goto("file://fixture_a.html"), failing, snapshot()];

    let halted = agent
        .deps
        .runner
        .run_steps(&workspace, steps.clone(), RunOptions::default())
        .await
        .unwrap();
    assert!(!halted.ok);
    assert_eq!(halted.results.len(), 2);

    let full = agent
        .deps
        .runner
        .run_steps(&workspace, steps, RunOptions { stop_on_error: false })
        .await
        .unwrap();
    assert!(!full.ok);
    assert_eq!(full.results.len(), 3);
    assert!(full.results[0].ok);
    assert!(!full.results[1].ok);
    assert!(full.results[2].ok);
}

#[tokio::test]
async fn snapshot_resolution_is_idempotent() {
    let (_, agent) = agent_with_fixture_a();
    let workspace = WorkspaceId::new();
    agent
        .deps
        .runner
        .run_steps(
            &workspace,
            vec![goto("file://fixture_a.html"), snapshot()],
            RunOptions::default(),
        )
        .await
        .unwrap();

    let binding = agent
        .deps
        .binder
        .ensure_active_page(&workspace)
        .await
        .unwrap();
    let hint = A11yHint::role_name("button", "Action A");
    let first = binding.tools.resolve_hint_node(&hint).await.unwrap();
    let second = binding.tools.resolve_hint_node(&hint).await.unwrap();
    assert_eq!(first, second);
}
