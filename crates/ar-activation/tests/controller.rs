// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Controller behaviour against the mock platform, driven signal by signal.

use std::cell::RefCell;
use std::rc::Rc;

use ar_activation::{
    instruction_steps, ActivationController, ActivationState, Dialog, EndCause, FailureReason,
    StartRejected,
};
use ar_app_core::{ActivationSettings, RetapPolicy};
use ar_mock_platform::MockPlatform;
use ar_platform_port::{
    ArMode, AssetReference, AttemptId, ElementVisibility, PageVisibility, PlatformError,
    SessionStatus, Signal, SignalSource,
};

type Controller = ActivationController<MockPlatform>;

fn controller(platform: MockPlatform) -> Controller {
    ActivationController::new(platform, ActivationSettings::default())
}

fn asset() -> AssetReference {
    AssetReference::new("/models/grass.glb").with_ios_model("/models/grass.usdz")
}

fn record(ctl: &mut Controller) -> Rc<RefCell<Vec<String>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ctl.on_state_change(move |state, _| sink.borrow_mut().push(state.to_string()));
    seen
}

fn grant(ctl: &mut Controller) {
    for attempt in ctl.platform_mut().take_pending_streams() {
        let stream = ctl.platform().grant_stream();
        ctl.dispatch(Signal::VideoStream {
            attempt,
            result: Ok(stream),
        });
    }
}

fn deny(ctl: &mut Controller, name: &str) {
    for attempt in ctl.platform_mut().take_pending_streams() {
        ctl.dispatch(Signal::VideoStream {
            attempt,
            result: Err(PlatformError::new(name, "getUserMedia failed")),
        });
    }
}

fn load(ctl: &mut Controller) {
    ctl.platform_mut().finish_loading();
    for attempt in ctl.platform().subscribers(SignalSource::ViewerLoad) {
        ctl.dispatch(Signal::ViewerLoaded { attempt });
    }
}

fn resolve_activation(ctl: &mut Controller) {
    for (_, attempt) in ctl.platform_mut().take_pending_activations() {
        ctl.platform_mut().ar_active = true;
        ctl.dispatch(Signal::ActivationSettled {
            attempt,
            result: Ok(()),
        });
    }
}

fn status(ctl: &mut Controller, status: SessionStatus) {
    for attempt in ctl.platform().subscribers(SignalSource::ViewerSessionStatus) {
        ctl.dispatch(Signal::SessionStatus { attempt, status });
    }
}

fn advance(ctl: &mut Controller, until_ms: u64) {
    while let Some(token) = ctl.platform_mut().pop_due(until_ms) {
        ctl.dispatch(Signal::TimerFired(token));
    }
}

fn assert_released(ctl: &Controller) {
    let platform = ctl.platform();
    assert_eq!(platform.live_session_subscriptions(), 0, "orphaned subscriptions");
    assert_eq!(platform.live_timers(), 0, "orphaned timers");
    assert_eq!(platform.open_tracks(), 0, "camera left open");
    assert_eq!(ctl.live_subscriptions(), 0);
}

#[test]
fn android_webxr_session_runs_to_completion() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.dispatch(Signal::WebXrProbed { supported: true });
    let seen = record(&mut ctl);

    let attempt = ctl.start_activation(asset()).unwrap();
    assert_eq!(ctl.dialog(), &Dialog::Busy);
    grant(&mut ctl);
    let Dialog::Instructions { steps } = ctl.dialog() else {
        unreachable!("expected instructions, got {:?}", ctl.dialog());
    };
    assert_eq!(steps, instruction_steps(&ctl.device_profile()));
    assert_eq!(steps[2], "Tap empty areas to add more grass!");
    assert_eq!(ctl.platform().open_tracks(), 0);
    load(&mut ctl);
    assert_eq!(ctl.platform().activations, vec![(ArMode::WebXr, attempt)]);
    resolve_activation(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::Presenting);
    assert_eq!(ctl.platform().visibility, ElementVisibility::Fullscreen);
    assert_eq!(ctl.platform().live_timers(), 2);

    advance(&mut ctl, 3_000);
    assert_eq!(ctl.state(), &ActivationState::Presenting);

    status(&mut ctl, SessionStatus::NotPresenting);
    assert_eq!(
        *seen.borrow(),
        [
            "idle",
            "awaiting_permission",
            "awaiting_asset_ready",
            "invoking",
            "presenting",
            "tearing_down",
            "idle"
        ]
    );
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::ViewerStatus);
    assert_eq!(ctl.platform().hide_count(), 1);
    assert_released(&ctl);
}

#[test]
fn unresolved_webxr_probe_falls_back_to_scene_viewer() {
    let mut ctl = controller(MockPlatform::new_android());
    assert_eq!(ctl.platform().webxr_probes, 1);
    let attempt = ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    assert_eq!(ctl.platform().activations, vec![(ArMode::SceneViewer, attempt)]);
}

#[test]
fn desktop_tap_fails_unsupported_without_resources() {
    let mut ctl = controller(MockPlatform::new_desktop());
    ctl.start_activation(asset()).unwrap();
    assert_eq!(
        ctl.state(),
        &ActivationState::Failed(FailureReason::Unsupported)
    );
    assert_eq!(ctl.platform().stream_requests, 0);
    assert!(matches!(ctl.dialog(), Dialog::Error { .. }));
    assert!(ctl.acknowledge());
    assert_eq!(ctl.state(), &ActivationState::Idle);
    assert!(!ctl.acknowledge());
}

#[test]
fn permission_failures_are_classified() {
    for (name, reason) in [
        ("NotAllowedError", FailureReason::PermissionDenied),
        ("NotFoundError", FailureReason::NoCameraDevice),
        ("AbortError", FailureReason::Unsupported),
    ] {
        let mut ctl = controller(MockPlatform::new_android());
        ctl.start_activation(asset()).unwrap();
        deny(&mut ctl, name);
        assert_eq!(ctl.state(), &ActivationState::Failed(reason));
        assert_released(&ctl);
    }
}

#[test]
fn missing_media_api_fails_immediately() {
    let mut platform = MockPlatform::new_android();
    platform.media_api_available = false;
    let mut ctl = controller(platform);
    ctl.start_activation(asset()).unwrap();
    assert_eq!(
        ctl.state(),
        &ActivationState::Failed(FailureReason::Unsupported)
    );
    assert_released(&ctl);
}

#[test]
fn asset_that_never_loads_times_out() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    assert_eq!(ctl.live_subscriptions(), 1);
    advance(&mut ctl, 14_999);
    assert_eq!(ctl.state(), &ActivationState::AwaitingAssetReady);
    advance(&mut ctl, 15_000);
    assert_eq!(
        ctl.state(),
        &ActivationState::Failed(FailureReason::AssetTimeout)
    );
    assert_released(&ctl);
}

#[test]
fn cached_model_skips_the_load_wait() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.platform_mut().src = Some("/models/grass.glb".to_owned());
    ctl.platform_mut().loaded = true;
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::Invoking);
    assert!(ctl.platform().subscribers(SignalSource::ViewerLoad).is_empty());
}

#[test]
fn previous_model_loaded_flag_does_not_skip_the_wait() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.platform_mut().loaded_lags_src_change = true;
    ctl.platform_mut().src = Some("/models/other.glb".to_owned());
    ctl.platform_mut().loaded = true;
    let attempt = ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::AwaitingAssetReady);
    assert!(ctl.platform().activations.is_empty());
    assert_eq!(
        ctl.platform().subscribers(SignalSource::ViewerLoad),
        vec![attempt]
    );

    load(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::Invoking);
}

#[test]
fn start_confirmation_holds_invocation() {
    let settings = ActivationSettings {
        require_start_confirmation: true,
        ..ActivationSettings::default()
    };
    let mut ctl = ActivationController::new(MockPlatform::new_android(), settings);
    assert!(!ctl.confirm_start());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::AwaitingAssetReady);
    assert!(ctl.platform().activations.is_empty());
    assert!(ctl.confirm_start());
    assert_eq!(ctl.state(), &ActivationState::Invoking);
}

#[test]
fn rejected_activation_keeps_platform_message_out_of_the_dialog() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    for (_, attempt) in ctl.platform_mut().take_pending_activations() {
        ctl.dispatch(Signal::ActivationSettled {
            attempt,
            result: Err(PlatformError::new("NotSupportedError", "immersive-ar blocked")),
        });
    }
    let ActivationState::Failed(FailureReason::ActivationRejected { platform_message }) = ctl.state()
    else {
        unreachable!("expected activation rejection, got {}", ctl.state());
    };
    assert!(platform_message.contains("immersive-ar blocked"));
    let Dialog::Error { message, .. } = ctl.dialog() else {
        unreachable!("expected error dialog");
    };
    assert!(!message.contains("immersive-ar"));
    assert_released(&ctl);
}

#[test]
fn ios_hands_off_to_quick_look_and_ends_on_pageshow() {
    let mut ctl = controller(MockPlatform::new_ios());
    let attempt = ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::Presenting);
    assert_eq!(ctl.platform().quick_looks, vec!["/models/grass.usdz".to_owned()]);
    assert!(ctl.platform().activations.is_empty());

    advance(&mut ctl, 4_000);
    assert_eq!(ctl.state(), &ActivationState::Presenting);

    let cleared_before = ctl.platform().timers_cleared;
    ctl.platform_mut().ar_active = false;
    ctl.dispatch(Signal::PageShow {
        attempt,
        persisted: true,
    });
    assert_eq!(ctl.state(), &ActivationState::Idle);
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::PageShow);
    assert_eq!(ctl.platform().timers_cleared - cleared_before, 2);
    assert_released(&ctl);
}

#[test]
fn ios_without_usdz_lets_the_viewer_convert_for_quick_look() {
    let mut ctl = controller(MockPlatform::new_ios());
    let attempt = ctl
        .start_activation(AssetReference::new("/models/grass.glb"))
        .unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    assert!(ctl.platform().quick_looks.is_empty(), "no anchor for a glTF model");
    assert_eq!(ctl.platform().activations, vec![(ArMode::QuickLook, attempt)]);
    assert_eq!(ctl.state(), &ActivationState::Invoking);

    resolve_activation(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::Presenting);
}

#[test]
fn ios_viewer_conversion_failure_is_an_activation_rejection() {
    let mut ctl = controller(MockPlatform::new_ios());
    let attempt = ctl
        .start_activation(AssetReference::new("/models/grass.glb"))
        .unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    ctl.platform_mut().take_pending_activations();
    ctl.dispatch(Signal::ActivationSettled {
        attempt,
        result: Err(PlatformError::new("NotAllowedError", "quick look unavailable")),
    });
    assert!(matches!(
        ctl.state(),
        ActivationState::Failed(FailureReason::ActivationRejected { .. })
    ));
    assert_released(&ctl);
}

#[test]
fn page_becoming_visible_ends_the_session() {
    let mut ctl = controller(MockPlatform::new_android());
    let attempt = ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    resolve_activation(&mut ctl);
    ctl.dispatch(Signal::VisibilityChanged {
        attempt,
        visibility: PageVisibility::Hidden,
    });
    assert_eq!(ctl.state(), &ActivationState::Presenting);
    ctl.dispatch(Signal::VisibilityChanged {
        attempt,
        visibility: PageVisibility::Visible,
    });
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::PageVisible);
    assert_released(&ctl);
}

#[test]
fn watchdog_ends_a_session_whose_flag_drops() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    resolve_activation(&mut ctl);
    advance(&mut ctl, 2_000);
    ctl.platform_mut().ar_active = false;
    advance(&mut ctl, 3_000);
    assert_eq!(ctl.state(), &ActivationState::Idle);
    assert_eq!(
        ctl.last_session_end().unwrap().cause,
        EndCause::WatchdogInactive
    );
    assert_released(&ctl);
}

#[test]
fn ceiling_ends_a_session_that_never_reports() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    resolve_activation(&mut ctl);
    advance(&mut ctl, 299_999);
    assert_eq!(ctl.state(), &ActivationState::Presenting);
    advance(&mut ctl, 300_000);
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::Ceiling);
    assert_eq!(ctl.teardown_count(), 1);
    assert_released(&ctl);
}

#[test]
fn viewer_failure_while_presenting_is_an_activation_rejection() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    resolve_activation(&mut ctl);
    status(&mut ctl, SessionStatus::Failed);
    assert!(matches!(
        ctl.state(),
        ActivationState::Failed(FailureReason::ActivationRejected { .. })
    ));
    assert_eq!(ctl.platform().hide_count(), 1);
    assert_released(&ctl);
}

#[test]
fn presenting_status_while_invoking_enters_presenting_once() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    load(&mut ctl);
    status(&mut ctl, SessionStatus::NotPresenting);
    assert_eq!(ctl.state(), &ActivationState::Invoking);
    status(&mut ctl, SessionStatus::Presenting);
    assert_eq!(ctl.state(), &ActivationState::Presenting);
    resolve_activation(&mut ctl);
    assert_eq!(ctl.state(), &ActivationState::Presenting);
    assert_eq!(ctl.platform().live_timers(), 2);
}

#[test]
fn retap_reject_policy_keeps_the_live_session() {
    let settings = ActivationSettings {
        retap: RetapPolicy::Reject,
        ..ActivationSettings::default()
    };
    let mut ctl = ActivationController::new(MockPlatform::new_android(), settings);
    let first = ctl.start_activation(asset()).unwrap();
    assert_eq!(
        ctl.start_activation(asset()),
        Err(StartRejected::Busy { attempt: first })
    );
    assert_eq!(ctl.current_attempt(), Some(first));
    assert_eq!(ctl.platform().stream_requests, 1);
}

#[test]
fn superseded_attempt_results_are_discarded() {
    let mut ctl = controller(MockPlatform::new_android());
    let first = ctl.start_activation(asset()).unwrap();
    let second = ctl.start_activation(asset()).unwrap();
    assert!(second > first);
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::Superseded);

    // The first prompt resolves late: its stream is released but ignored.
    let pending = ctl.platform_mut().take_pending_streams();
    assert_eq!(pending, vec![first, second]);
    let stale = ctl.platform().grant_stream();
    ctl.dispatch(Signal::VideoStream {
        attempt: first,
        result: Ok(stale),
    });
    assert_eq!(ctl.state(), &ActivationState::AwaitingPermission);
    assert_eq!(ctl.platform().open_tracks(), 0);

    ctl.dispatch(Signal::ViewerLoaded { attempt: first });
    assert_eq!(ctl.state(), &ActivationState::AwaitingPermission);
    assert_eq!(ctl.current_attempt(), Some(second));
}

#[test]
fn cancel_is_idempotent() {
    let mut ctl = controller(MockPlatform::new_android());
    let seen = record(&mut ctl);
    ctl.cancel();
    assert_eq!(*seen.borrow(), ["idle"]);

    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    ctl.cancel();
    let after_one = seen.borrow().clone();
    ctl.cancel();
    assert_eq!(*seen.borrow(), after_one);
    assert_eq!(ctl.state(), &ActivationState::Idle);
    assert_eq!(ctl.teardown_count(), 1);
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::Cancelled);
    assert_released(&ctl);
}

#[test]
fn tap_after_failure_acknowledges_and_retries() {
    let mut ctl = controller(MockPlatform::new_android());
    ctl.start_activation(asset()).unwrap();
    deny(&mut ctl, "NotAllowedError");
    let retry = ctl.start_activation(asset()).unwrap();
    assert_eq!(retry, AttemptId(2));
    assert_eq!(ctl.state(), &ActivationState::AwaitingPermission);
}

#[test]
fn missing_viewer_element_is_unsupported() {
    let mut platform = MockPlatform::new_android();
    platform.element_available = false;
    let mut ctl = controller(platform);
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    assert_eq!(
        ctl.state(),
        &ActivationState::Failed(FailureReason::Unsupported)
    );
    assert_released(&ctl);
}

#[test]
fn shutdown_releases_page_listeners_and_refuses_taps() {
    let mut ctl = controller(MockPlatform::new_android());
    assert_eq!(ctl.platform().live_subscriptions(), 1);
    ctl.start_activation(asset()).unwrap();
    grant(&mut ctl);
    ctl.shutdown();
    ctl.shutdown();
    assert_eq!(ctl.platform().live_subscriptions(), 0);
    assert_eq!(ctl.last_session_end().unwrap().cause, EndCause::Shutdown);
    assert_eq!(ctl.start_activation(asset()), Err(StartRejected::ShutDown));
}

#[test]
fn narrow_viewport_resize_updates_the_profile() {
    let mut ctl = controller(MockPlatform::new_desktop());
    assert!(!ctl.device_profile().is_mobile);
    ctl.dispatch(Signal::ViewportResized { width: 600.0 });
    assert!(ctl.device_profile().is_mobile);
}
