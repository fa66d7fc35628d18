//! Test: Trigger Evaluation - which events start the publish workflow

use crate::helpers::*;
use chrono::{TimeZone, Utc};
use ci_runner::core::{Event, Workflow};

fn publish_workflow() -> Workflow {
    let yaml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/publish.yml"))
        .expect("demo workflow is readable");
    workflow_from_yaml(&yaml)
}

#[test]
fn test_push_to_main_triggers() {
    let workflow = publish_workflow();
    assert!(workflow.evaluate(&Event::push_branch("main")));
    assert!(workflow.evaluate(&Event::push_branch("main").with_revision("4f2a9c1")));
}

#[test]
fn test_push_to_other_branch_does_not_trigger() {
    let workflow = publish_workflow();
    assert!(!workflow.evaluate(&Event::push_branch("develop")));
    assert!(!workflow.evaluate(&Event::push_branch("feature/main")));
}

#[test]
fn test_any_tag_push_triggers() {
    let workflow = publish_workflow();
    for tag in ["v1.0.0", "release/2026-10", "nightly"] {
        assert!(workflow.evaluate(&Event::push_tag(tag)), "tag {} should trigger", tag);
    }
}

#[test]
fn test_pull_request_to_any_branch_triggers() {
    let workflow = publish_workflow();
    for base in ["main", "develop", "feature/a/b", "release-1.2"] {
        assert!(
            workflow.evaluate(&Event::pull_request(base)),
            "pull request into {} should trigger",
            base
        );
    }
}

#[test]
fn test_schedule_fires_only_at_matching_minute() {
    let workflow = publish_workflow();

    // 2026-10-18 is a Sunday
    let sunday_noon = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
    assert!(workflow.evaluate(&Event::schedule(sunday_noon)));

    let not_matching = [
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 1, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 10, 18, 11, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
    ];
    for at in not_matching {
        assert!(!workflow.evaluate(&Event::schedule(at)), "{} should not fire", at);
    }
}

#[test]
fn test_manual_dispatch_triggers() {
    assert!(publish_workflow().evaluate(&Event::manual()));
}

#[test]
fn test_evaluation_is_idempotent() {
    let workflow = publish_workflow();
    let events = [
        Event::push_branch("main"),
        Event::push_branch("develop"),
        Event::pull_request("develop"),
        Event::schedule(Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()),
        Event::schedule(Utc.with_ymd_and_hms(2026, 10, 18, 13, 0, 0).unwrap()),
    ];

    for event in &events {
        let first = workflow.evaluate(event);
        for _ in 0..3 {
            assert_eq!(workflow.evaluate(event), first, "{} changed its answer", event);
        }
    }
}

#[test]
fn test_negated_branch_patterns() {
    let yaml = r#"
name: release
on:
  push:
    branches: ["release/**", "!release/*-alpha"]
steps:
  - id: build
    run: make
"#;
    let workflow = workflow_from_yaml(yaml);

    assert!(workflow.evaluate(&Event::push_branch("release/1.0")));
    assert!(!workflow.evaluate(&Event::push_branch("release/1.0-alpha")));
    assert!(!workflow.evaluate(&Event::push_branch("main")));
    // No tag patterns, so tag pushes never match
    assert!(!workflow.evaluate(&Event::push_tag("v1.0")));
    assert!(!workflow.evaluate(&Event::manual()));
}

#[test]
fn test_matching_names_the_trigger() {
    let workflow = publish_workflow();
    let trigger = workflow.triggers.matching(&Event::pull_request("develop")).unwrap();
    assert_eq!(trigger.kind(), "pull_request");
    assert!(workflow.triggers.matching(&Event::push_branch("develop")).is_none());
}
