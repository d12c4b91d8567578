//! Concurrency properties: workspace isolation, per-workspace serial
//! ordering, and bounded global parallelism.

use std::sync::Arc;

use a11y_resolve::A11yHint;
use page_port::mock::{Fixture, MemoryBrowser, MemoryElement};
use step_engine::{RunOptions, Step, StepKind, Target};
use tabweaver_cli::bootstrap::{build_agent, Agent};
use tabweaver_cli::config::AgentConfig;
use tabweaver_core_types::WorkspaceId;

fn quiet_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.human.enabled = false;
    config.trace.log_ops = false;
    config
}

fn two_fixture_agent() -> (Arc<MemoryBrowser>, Agent) {
    let browser = MemoryBrowser::new();
    browser.add_fixture(
        "file://fixture_a.html",
        Fixture::new("Fixture A")
            .with_element(MemoryElement::new("button", "button", "Action A"))
            .with_element(MemoryElement::new("input", "textbox", "Name A")),
    );
    browser.add_fixture(
        "file://fixture_b.html",
        Fixture::new("Fixture B")
            .with_element(MemoryElement::new("button", "button", "Action B"))
            .with_element(MemoryElement::new("input", "textbox", "Name B")),
    );
    let agent = build_agent(&quiet_config(), browser.clone());
    (browser, agent)
}

fn interaction_steps(url: &str, button: &str, textbox: &str, value: &str) -> Vec<Step> {
    vec![
        Step::new(StepKind::Goto { url: url.into() }),
        Step::new(StepKind::Snapshot { include_a11y: true }),
        Step::new(StepKind::Click {
            target: Some(Target::hint(A11yHint::role_name("button", button))),
            coord: None,
            click_count: 1,
        }),
        Step::new(StepKind::Fill {
            target: Target::hint(A11yHint::role_name("textbox", textbox)),
            value: value.into(),
        }),
    ]
}

#[tokio::test]
async fn concurrent_workspaces_do_not_cross_talk() {
    let (browser, agent) = two_fixture_agent();
    let ws_a = WorkspaceId::new();
    let ws_b = WorkspaceId::new();

    let runner_a = agent.deps.runner.clone();
    let runner_b = agent.deps.runner.clone();
    let a = {
        let ws = ws_a.clone();
        tokio::spawn(async move {
            runner_a
                .run_steps(
                    &ws,
                    interaction_steps("file://fixture_a.html", "Action A", "Name A", "from-a"),
                    RunOptions::default(),
                )
                .await
                .unwrap()
        })
    };
    let b = {
        let ws = ws_b.clone();
        tokio::spawn(async move {
            runner_b
                .run_steps(
                    &ws,
                    interaction_steps("file://fixture_b.html", "Action B", "Name B", "from-b"),
                    RunOptions::default(),
                )
                .await
                .unwrap()
        })
    };

    let (outcome_a, outcome_b) = (a.await.unwrap(), b.await.unwrap());
    assert!(outcome_a.ok, "workspace A failed: {outcome_a:?}");
    assert!(outcome_b.ok, "workspace B failed: {outcome_b:?}");

    // Each workspace's page ends on its own fixture with its own edits.
    let pages = browser.pages();
    assert_eq!(pages.len(), 2);
    let urls: Vec<String> = pages.iter().map(|p| p.url()).collect();
    assert!(urls.contains(&"file://fixture_a.html".to_string()));
    assert!(urls.contains(&"file://fixture_b.html".to_string()));
    for page in &pages {
        match page.url().as_str() {
            "file://fixture_a.html" => {
                assert_eq!(page.last_click().as_deref(), Some("Action A"));
                assert_eq!(page.element_value("Name A").as_deref(), Some("from-a"));
                assert!(page.element_value("Name B").is_none());
            }
            "file://fixture_b.html" => {
                assert_eq!(page.last_click().as_deref(), Some("Action B"));
                assert_eq!(page.element_value("Name B").as_deref(), Some("from-b"));
            }
            other => panic!("unexpected final url {other}"),
        }
    }
}

#[tokio::test]
async fn same_workspace_step_lists_complete_in_submission_order() {
    let (browser, agent) = two_fixture_agent();
    let workspace = WorkspaceId::new();

    let mut handles = Vec::new();
    for i in 0..4 {
        let runner = agent.deps.runner.clone();
        let ws = workspace.clone();
        let value = format!("run-{i}");
        handles.push(tokio::spawn(async move {
            runner
                .run_steps(
                    &ws,
                    interaction_steps("file://fixture_a.html", "Action A", "Name A", &value),
                    RunOptions::default(),
                )
                .await
                .unwrap()
        }));
        // Stagger so submission order is deterministic.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    for handle in handles {
        assert!(handle.await.unwrap().ok);
    }

    // The last submitted list is the last to write the textbox.
    let page = browser.pages().into_iter().next().unwrap();
    assert_eq!(page.element_value("Name A").as_deref(), Some("run-3"));
}

#[tokio::test]
async fn run_steps_lazily_creates_distinct_pages_per_workspace() {
    let (browser, agent) = two_fixture_agent();
    let ws_a = WorkspaceId::new();
    let ws_b = WorkspaceId::new();

    for ws in [&ws_a, &ws_b] {
        let outcome = agent
            .deps
            .runner
            .run_steps(
                ws,
                vec![Step::new(StepKind::Snapshot { include_a11y: false })],
                RunOptions::default(),
            )
            .await
            .unwrap();
        assert!(outcome.ok);
    }

    assert_eq!(browser.pages().len(), 2);
    assert!(agent.deps.registry.workspace_exists(&ws_a));
    assert!(agent.deps.registry.workspace_exists(&ws_b));
}
