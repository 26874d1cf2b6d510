//! Integration tests for the promote stage: gate decisions in front of the
//! synchronization engine.

mod support;

use patchflow_core::gate::{GateConfig, WeekdaySet, parse_time_of_day};
use patchflow_core::model::PatchTrack;
use patchflow_core::pipeline::{PromoteOptions, PromoteStage, Stage, StageOutcome, StageSummary};

use support::{FakeBackend, FixedClock, Op, date, my_app_state};

fn dwell(days: u32) -> GateConfig {
    GateConfig {
        min_dwell_days: Some(days),
        ..GateConfig::default()
    }
}

#[test]
fn completes_with_summary() {
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-20 10:00");

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp"))
        .unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Completed(StageSummary {
            stage: Stage::Promote,
            title: "MyApp".to_string(),
            version: "3.2.1".to_string(),
            policy_id: 21,
        })
    );
    assert_eq!(
        backend.snapshot().patch_policies[&21].entered_stage,
        Some(date("2024-01-20"))
    );
}

#[test]
fn dwell_of_seven_days_is_met() {
    // Stable patch policy stamped 2024-01-10
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-20 00:00");

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp").with_gate(dwell(7)))
        .unwrap();

    assert!(outcome.summary().is_some());
}

#[test]
fn dwell_of_eleven_days_waits_without_writes() {
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-20 00:00");

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp").with_gate(dwell(11)))
        .unwrap();

    assert!(matches!(outcome, StageOutcome::Waiting(_)));
    assert!(backend.writes().is_empty());
}

#[test]
fn unstamped_description_skips() {
    let mut state = my_app_state();
    let stable = state.patch_policies.get_mut(&21).unwrap();
    stable.self_service_description = "Update MyApp".to_string();
    stable.entered_stage = None;
    let backend = FakeBackend::new(state);
    let clock = FixedClock::at("2024-01-20 00:00");

    for days in [1, 30] {
        let outcome = PromoteStage::new(&backend, &clock)
            .run(&PromoteOptions::new("MyApp").with_gate(dwell(days)))
            .unwrap();
        assert!(matches!(outcome, StageOutcome::Skipped(_)));
    }
    assert!(backend.writes().is_empty());
}

#[test]
fn dwell_can_be_measured_on_test_track() {
    // Test patch policy stamped 2024-01-12, Stable stamped 2024-01-10
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-20 12:00");
    let options = PromoteOptions::new("MyApp").with_gate(dwell(9));

    let from_test = PromoteStage::new(&backend, &clock)
        .run(&options.clone().with_dwell_from(PatchTrack::Test))
        .unwrap();
    assert!(matches!(from_test, StageOutcome::Waiting(_)));

    let from_stable = PromoteStage::new(&backend, &clock).run(&options).unwrap();
    assert!(from_stable.summary().is_some());
}

#[test]
fn unstamped_test_track_skips_when_measured_from_test() {
    // nothing in the pipeline stamps the Test patch policy
    let mut state = my_app_state();
    let test = state.patch_policies.get_mut(&20).unwrap();
    test.self_service_description = "Testing MyApp".to_string();
    test.entered_stage = None;
    let backend = FakeBackend::new(state);
    let clock = FixedClock::at("2024-01-20 12:00");
    let options = PromoteOptions::new("MyApp").with_gate(dwell(1));

    let from_test = PromoteStage::new(&backend, &clock)
        .run(&options.clone().with_dwell_from(PatchTrack::Test))
        .unwrap();
    assert!(matches!(from_test, StageOutcome::Skipped(_)));
    assert!(backend.writes().is_empty());

    let from_stable = PromoteStage::new(&backend, &clock).run(&options).unwrap();
    assert!(from_stable.summary().is_some());
}

#[test]
fn outside_weekdays_waits_before_any_lookup_of_patch_records() {
    let backend = FakeBackend::new(my_app_state());
    // Saturday
    let clock = FixedClock::at("2024-01-20 10:00");
    let gate = GateConfig {
        weekdays: Some(WeekdaySet::from_digits("01234").unwrap()),
        min_dwell_days: Some(1),
        ..GateConfig::default()
    };

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp").with_gate(gate))
        .unwrap();

    assert!(matches!(outcome, StageOutcome::Waiting(ref reason) if reason.contains("Sat")));
    assert!(backend.writes().is_empty());
}

#[test]
fn outside_time_window_waits() {
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-22 18:15");
    let gate = GateConfig {
        not_before: Some(parse_time_of_day("08:00").unwrap()),
        not_after: Some(parse_time_of_day("17:00").unwrap()),
        ..GateConfig::default()
    };

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp").with_gate(gate))
        .unwrap();

    assert!(matches!(outcome, StageOutcome::Waiting(_)));
    assert_eq!(backend.count(Op::ListPatchTitles), 0);
}

#[test]
fn disabled_test_policy_waits() {
    let mut state = my_app_state();
    state.policies[0].enabled = false;
    let backend = FakeBackend::new(state);
    let clock = FixedClock::at("2024-01-22 10:00");

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp"))
        .unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Waiting("test policy is disabled".to_string())
    );
    assert!(backend.writes().is_empty());
}

#[test]
fn already_promoted_version_is_skipped() {
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-22 10:00");
    let stage = PromoteStage::new(&backend, &clock);

    stage.run(&PromoteOptions::new("MyApp")).unwrap();
    let outcome = stage.run(&PromoteOptions::new("MyApp")).unwrap();

    assert!(matches!(outcome, StageOutcome::Skipped(_)));
}

#[test]
fn separate_patch_title_is_used_for_patch_records() {
    let mut state = my_app_state();
    state.patch_titles[1].name = "My Application".to_string();
    state.definitions.get_mut(&7).unwrap().name = "My Application".to_string();
    let backend = FakeBackend::new(state);
    let clock = FixedClock::at("2024-01-22 10:00");

    let outcome = PromoteStage::new(&backend, &clock)
        .run(&PromoteOptions::new("MyApp").with_patch_title("My Application"))
        .unwrap();

    assert!(outcome.summary().is_some());
    // descriptions name the software title, not the patch title
    assert_eq!(
        backend.snapshot().patch_policies[&21].self_service_description,
        "Update MyApp (2024-01-22)"
    );
}

#[test]
fn missing_test_policy_is_an_error() {
    let backend = FakeBackend::new(my_app_state());
    let clock = FixedClock::at("2024-01-22 10:00");

    let result = PromoteStage::new(&backend, &clock).run(&PromoteOptions::new("Zoom"));

    assert!(result.is_err());
}
