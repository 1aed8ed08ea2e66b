// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Storefront scenarios replayed through the simulator.

use std::path::PathBuf;

use ar_activation::{ActivationState, EndCause, FailureReason};
use ar_app_core::ActivationSettings;
use ar_sim::{run_scenario, Scenario, SimReport};

fn fixture(name: &str) -> Scenario {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata/scenarios")
        .join(name);
    Scenario::load(&path).expect("fixture loads")
}

fn run(name: &str) -> SimReport {
    let scenario = fixture(name);
    let report = run_scenario(&scenario, &ActivationSettings::default()).expect("scenario runs");
    let violations = report.invariant_violations();
    assert!(violations.is_empty(), "{name}: {violations:?}");
    let mismatches = scenario.expect.mismatches(&report);
    assert!(mismatches.is_empty(), "{name}: {mismatches:?}");
    report
}

#[test]
fn webxr_happy_path_shows_instructions_once() {
    let report = run("a_android_webxr_happy_path.json");
    assert_eq!(
        report.states(),
        vec![
            "idle",
            "awaiting_permission",
            "awaiting_asset_ready",
            "invoking",
            "presenting",
            "tearing_down",
            "idle"
        ]
    );
    let instructions = report
        .trace
        .iter()
        .filter(|e| e.dialog == "instructions")
        .count();
    assert_eq!(instructions, 1);
    assert_eq!(report.final_dialog.name(), "none");
    assert_eq!(report.open_tracks, 0);
}

#[test]
fn denied_camera_shows_the_permission_message() {
    let report = run("b_permission_denied.json");
    assert_eq!(
        report.final_state,
        ActivationState::Failed(FailureReason::PermissionDenied)
    );
    let ar_activation::Dialog::Error { message, .. } = &report.final_dialog else {
        panic!("expected an error dialog, got {:?}", report.final_dialog);
    };
    assert!(message.contains("camera access"));
}

#[test]
fn silent_model_times_out_at_fifteen_seconds() {
    let report = run("c_asset_timeout.json");
    let failed = report.trace.last().unwrap();
    assert_eq!(failed.state, "failed(asset_timeout)");
    assert_eq!(failed.at_ms, 15_300);
    assert_eq!(report.live_timers, 0);
}

#[test]
fn ios_session_ends_on_pageshow_not_the_watchdog() {
    let report = run("d_ios_pageshow.json");
    assert_eq!(report.end_cause, Some(EndCause::PageShow));
    let end = report.trace.last().unwrap();
    assert_eq!(end.at_ms, 5_200);
    assert_eq!(report.live_timers, 0);
}

#[test]
fn rapid_retap_tears_the_first_session_down_first() {
    let report = run("e_rapid_retap.json");
    let at_50: Vec<_> = report.trace.iter().filter(|e| e.at_ms == 50).collect();
    let states: Vec<_> = at_50.iter().map(|e| e.state.as_str()).collect();
    assert_eq!(states, vec!["tearing_down", "idle", "awaiting_permission"]);
    assert_eq!(at_50[1].listeners, 0);
    assert_eq!(report.teardowns, 2);
}

#[test]
fn watchdog_and_ceiling_end_silent_sessions() {
    let inactive = run("g_watchdog_inactive.json");
    assert_eq!(inactive.trace.last().unwrap().at_ms, 10_500);

    let ceiling = run("h_session_ceiling.json");
    assert_eq!(ceiling.end_cause, Some(EndCause::Ceiling));
    assert_eq!(ceiling.trace.last().unwrap().at_ms, 300_300);
}

#[test]
fn remaining_fixtures_meet_their_expectations() {
    run("f_desktop_unsupported.json");
    run("i_ipad_desktop_mode.json");
}

#[test]
fn reject_policy_ignores_the_second_tap() {
    let mut scenario = fixture("e_rapid_retap.json");
    let settings: ActivationSettings =
        serde_json::from_str(r#"{"retap": "reject"}"#).unwrap();
    scenario.settings = Some(settings);
    let report = run_scenario(&scenario, &ActivationSettings::default()).unwrap();
    assert_eq!(report.rejected_taps, 1);
    assert_eq!(report.teardowns, 1);
    assert!(report.invariant_violations().is_empty());
}
