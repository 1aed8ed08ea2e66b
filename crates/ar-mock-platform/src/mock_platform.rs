// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mock platform adapter for headless controller tests.
//!
//! `MockPlatform` tracks subscriptions, timers, element state and camera
//! tracks in plain collections without a browser.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use ar_platform_port::{
    ArMode, AssetReference, AttemptId, ElementVisibility, EnvironmentPort, EventPort, MediaPort,
    MediaStream, PlatformError, SignalSource, SubscriptionId, TimerId, TimerPort, TimerToken,
    ViewerPort,
};

use crate::media::{MediaLedger, MockStream};

/// Chrome on an Android phone.
pub const ANDROID_UA: &str =
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Mobile Safari/537.36";
/// Safari on an iPhone.
pub const IPHONE_UA: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
/// Chrome on a Linux desktop.
pub const DESKTOP_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// A pending timer on the virtual clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockTimer {
    /// Virtual time the timer fires at.
    pub due_ms: u64,
    /// Re-arm period for intervals.
    pub period_ms: Option<u32>,
    /// Token reported when it fires.
    pub token: TimerToken,
}

/// Mock platform for testing.
///
/// Public fields describe the simulated browser; tests mutate them to script
/// what the page sees and read them to assert what the controller did.
#[derive(Debug)]
pub struct MockPlatform {
    /// `navigator.userAgent`.
    pub user_agent: String,
    /// `navigator.platform`.
    pub platform_name: String,
    /// `navigator.maxTouchPoints`.
    pub max_touch_points: u32,
    /// Viewport width.
    pub viewport_width: f64,
    /// Number of WebXR probes started.
    pub webxr_probes: u32,

    /// Whether `getUserMedia` exists.
    pub media_api_available: bool,
    /// Tracks opened per granted stream.
    pub tracks_per_stream: usize,
    /// Stream requests not answered yet, oldest first.
    pub pending_streams: Vec<AttemptId>,
    /// Total stream requests.
    pub stream_requests: usize,
    media: Rc<RefCell<MediaLedger>>,

    /// Whether the viewer element can be created.
    pub element_available: bool,
    /// Whether the viewer element exists.
    pub element_created: bool,
    /// Every source attached, in order.
    pub attached: Vec<AssetReference>,
    /// Model URL currently on the element.
    pub src: Option<String>,
    /// Models that have finished loading at least once.
    pub cached_models: BTreeSet<String>,
    /// The element's `loaded` flag.
    pub loaded: bool,
    /// Leave `loaded` untouched when the source changes, as a viewer does
    /// until it starts fetching the new model.
    pub loaded_lags_src_change: bool,
    /// The AR-active flag read by the watchdog.
    pub ar_active: bool,
    /// Activations not settled yet, oldest first.
    pub pending_activations: Vec<(ArMode, AttemptId)>,
    /// Every activation requested.
    pub activations: Vec<(ArMode, AttemptId)>,
    /// Whether Quick Look accepts hand-offs.
    pub quick_look_available: bool,
    /// URLs handed to Quick Look.
    pub quick_looks: Vec<String>,
    /// Whether the page is hidden.
    pub page_hidden: bool,
    /// Current visual state of the element.
    pub visibility: ElementVisibility,
    /// Every visual state applied, in order.
    pub visibility_changes: Vec<ElementVisibility>,

    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, (SignalSource, AttemptId)>,
    session_gauge: Rc<Cell<usize>>,
    /// Total subscribe calls.
    pub subscribe_calls: usize,
    /// Total unsubscribe calls that removed a live subscription.
    pub unsubscribe_calls: usize,

    now_ms: u64,
    timers: BTreeMap<TimerId, MockTimer>,
    /// Timers cleared while still pending.
    pub timers_cleared: usize,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new_android()
    }
}

impl MockPlatform {
    /// An Android phone with the media API, Scene Viewer and a 412 px viewport.
    pub fn new_android() -> Self {
        Self::with_environment(ANDROID_UA, "Linux armv8l", 5, 412.0)
    }

    /// An iPhone.
    pub fn new_ios() -> Self {
        Self::with_environment(IPHONE_UA, "iPhone", 5, 390.0)
    }

    /// A desktop browser with a wide viewport.
    pub fn new_desktop() -> Self {
        Self::with_environment(DESKTOP_UA, "Linux x86_64", 0, 1920.0)
    }

    /// A platform with explicit navigator facts.
    pub fn with_environment(
        user_agent: &str,
        platform_name: &str,
        max_touch_points: u32,
        viewport_width: f64,
    ) -> Self {
        Self {
            user_agent: user_agent.to_owned(),
            platform_name: platform_name.to_owned(),
            max_touch_points,
            viewport_width,
            webxr_probes: 0,
            media_api_available: true,
            tracks_per_stream: 1,
            pending_streams: Vec::new(),
            stream_requests: 0,
            media: Rc::new(RefCell::new(MediaLedger::default())),
            element_available: true,
            element_created: false,
            attached: Vec::new(),
            src: None,
            cached_models: BTreeSet::new(),
            loaded: false,
            loaded_lags_src_change: false,
            ar_active: false,
            pending_activations: Vec::new(),
            activations: Vec::new(),
            quick_look_available: true,
            quick_looks: Vec::new(),
            page_hidden: false,
            visibility: ElementVisibility::Hidden,
            visibility_changes: Vec::new(),
            next_id: 0,
            subscriptions: BTreeMap::new(),
            session_gauge: Rc::new(Cell::new(0)),
            subscribe_calls: 0,
            unsubscribe_calls: 0,
            now_ms: 0,
            timers: BTreeMap::new(),
            timers_cleared: 0,
        }
    }

    // ─── Media ───────────────────────────────────────────────────────────

    /// Open a stream whose tracks are tracked by this platform.
    pub fn grant_stream(&self) -> Box<dyn MediaStream> {
        Box::new(MockStream::open(&self.media, self.tracks_per_stream))
    }

    /// Take every unanswered stream request.
    pub fn take_pending_streams(&mut self) -> Vec<AttemptId> {
        std::mem::take(&mut self.pending_streams)
    }

    /// Camera tracks currently open.
    pub fn open_tracks(&self) -> usize {
        self.media.borrow().open_tracks()
    }

    /// Camera tracks stopped so far.
    pub fn stopped_tracks(&self) -> usize {
        self.media.borrow().stopped_tracks()
    }

    // ─── Viewer ──────────────────────────────────────────────────────────

    /// Mark the current model loaded.
    pub fn finish_loading(&mut self) {
        self.loaded = true;
        if let Some(src) = &self.src {
            self.cached_models.insert(src.clone());
        }
    }

    /// Take every unsettled activation.
    pub fn take_pending_activations(&mut self) -> Vec<(ArMode, AttemptId)> {
        std::mem::take(&mut self.pending_activations)
    }

    /// How many times the element went from fullscreen to hidden.
    pub fn hide_count(&self) -> usize {
        let mut previous = ElementVisibility::Hidden;
        let mut hides = 0;
        for next in &self.visibility_changes {
            if previous == ElementVisibility::Fullscreen && *next == ElementVisibility::Hidden {
                hides += 1;
            }
            previous = *next;
        }
        hides
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Attempts currently subscribed to `source`, in subscription order.
    pub fn subscribers(&self, source: SignalSource) -> Vec<AttemptId> {
        self.subscriptions
            .values()
            .filter(|(s, _)| *s == source)
            .map(|(_, attempt)| *attempt)
            .collect()
    }

    /// All live subscriptions.
    pub fn live_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Live subscriptions owned by an attempt (page-lifetime ones excluded).
    pub fn live_session_subscriptions(&self) -> usize {
        self.subscriptions
            .values()
            .filter(|(_, attempt)| !attempt.is_page())
            .count()
    }

    /// Shared counter of live session subscriptions.
    ///
    /// Observers registered on the controller cannot reach the platform; they
    /// hold this handle instead.
    pub fn session_subscription_gauge(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.session_gauge)
    }

    // ─── Clock ───────────────────────────────────────────────────────────

    /// Current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Pending timers.
    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    /// Pending timers by id.
    pub fn timers(&self) -> &BTreeMap<TimerId, MockTimer> {
        &self.timers
    }

    /// When the earliest pending timer fires.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.values().map(|t| t.due_ms).min()
    }

    /// Move the clock forward to `ms` without firing anything.
    pub fn advance_to(&mut self, ms: u64) {
        self.now_ms = self.now_ms.max(ms);
    }

    /// Fire the earliest timer due at or before `until_ms`.
    ///
    /// Advances the clock to the timer's due time. Intervals are re-armed,
    /// one-shots removed. Ties fire in arming order. Returns `None` (and
    /// advances the clock to `until_ms`) when nothing is due.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<TimerToken> {
        let next = self
            .timers
            .iter()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(id, t)| (t.due_ms, **id))
            .map(|(id, t)| (*id, *t));
        let Some((id, timer)) = next else {
            self.advance_to(until_ms);
            return None;
        };
        self.advance_to(timer.due_ms);
        match timer.period_ms {
            Some(period) => {
                if let Some(entry) = self.timers.get_mut(&id) {
                    entry.due_ms = timer.due_ms + u64::from(period.max(1));
                }
            }
            None => {
                self.timers.remove(&id);
            }
        }
        Some(timer.token)
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn arm(&mut self, delay_ms: u32, period_ms: Option<u32>, token: TimerToken) -> TimerId {
        let id = TimerId(self.allocate_id());
        self.timers.insert(
            id,
            MockTimer {
                due_ms: self.now_ms + u64::from(delay_ms),
                period_ms,
                token,
            },
        );
        id
    }
}

impl EnvironmentPort for MockPlatform {
    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn platform_name(&self) -> String {
        self.platform_name.clone()
    }

    fn max_touch_points(&self) -> u32 {
        self.max_touch_points
    }

    fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    fn probe_webxr(&mut self) {
        self.webxr_probes += 1;
    }
}

impl MediaPort for MockPlatform {
    fn request_video_stream(&mut self, attempt: AttemptId) -> Result<(), PlatformError> {
        if !self.media_api_available {
            return Err(PlatformError::unavailable("navigator.mediaDevices.getUserMedia"));
        }
        self.stream_requests += 1;
        self.pending_streams.push(attempt);
        Ok(())
    }
}

impl ViewerPort for MockPlatform {
    fn ensure_element(&mut self) -> Result<(), PlatformError> {
        if !self.element_available {
            return Err(PlatformError::unavailable("model-viewer"));
        }
        self.element_created = true;
        Ok(())
    }

    fn attach_source(&mut self, asset: &AssetReference) {
        self.attached.push(asset.clone());
        if self.src.as_deref() != Some(asset.model_url.as_str()) {
            if !self.loaded_lags_src_change {
                self.loaded = self.cached_models.contains(&asset.model_url);
            }
            self.src = Some(asset.model_url.clone());
        }
    }

    fn current_source(&self) -> Option<String> {
        self.src.clone()
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn is_ar_active(&self) -> bool {
        self.ar_active
    }

    fn activate(&mut self, mode: ArMode, attempt: AttemptId) {
        self.activations.push((mode, attempt));
        self.pending_activations.push((mode, attempt));
    }

    fn open_quick_look(&mut self, usdz_url: &str) -> Result<(), PlatformError> {
        if !self.quick_look_available {
            return Err(PlatformError::unavailable("Quick Look"));
        }
        self.quick_looks.push(usdz_url.to_owned());
        // Quick Look covers the page.
        self.ar_active = true;
        self.page_hidden = true;
        Ok(())
    }

    fn set_visibility(&mut self, visibility: ElementVisibility) {
        self.visibility = visibility;
        self.visibility_changes.push(visibility);
    }
}

impl TimerPort for MockPlatform {
    fn set_timeout(&mut self, delay_ms: u32, token: TimerToken) -> TimerId {
        self.arm(delay_ms, None, token)
    }

    fn set_interval(&mut self, period_ms: u32, token: TimerToken) -> TimerId {
        self.arm(period_ms, Some(period_ms), token)
    }

    fn clear_timer(&mut self, id: TimerId) {
        if self.timers.remove(&id).is_some() {
            self.timers_cleared += 1;
        }
    }
}

impl EventPort for MockPlatform {
    fn subscribe(&mut self, source: SignalSource, attempt: AttemptId) -> SubscriptionId {
        let id = SubscriptionId(self.allocate_id());
        self.subscriptions.insert(id, (source, attempt));
        self.subscribe_calls += 1;
        if !attempt.is_page() {
            self.session_gauge.set(self.session_gauge.get() + 1);
        }
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some((_, attempt)) = self.subscriptions.remove(&id) {
            self.unsubscribe_calls += 1;
            if !attempt.is_page() {
                self.session_gauge.set(self.session_gauge.get().saturating_sub(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_platform_port::TimerKind;

    fn token(attempt: u64, kind: TimerKind) -> TimerToken {
        TimerToken {
            attempt: AttemptId(attempt),
            kind,
        }
    }

    #[test]
    fn timers_fire_in_due_order_and_intervals_rearm() {
        let mut platform = MockPlatform::new_android();
        let poll = platform.set_interval(1_000, token(1, TimerKind::WatchdogPoll));
        platform.set_timeout(2_500, token(1, TimerKind::SessionCeiling));

        assert_eq!(platform.pop_due(3_000), Some(token(1, TimerKind::WatchdogPoll)));
        assert_eq!(platform.now_ms(), 1_000);
        assert_eq!(platform.pop_due(3_000), Some(token(1, TimerKind::WatchdogPoll)));
        assert_eq!(platform.pop_due(3_000), Some(token(1, TimerKind::SessionCeiling)));
        assert_eq!(platform.now_ms(), 2_500);
        assert_eq!(platform.pop_due(3_000), Some(token(1, TimerKind::WatchdogPoll)));
        assert_eq!(platform.pop_due(3_000), None);
        assert_eq!(platform.now_ms(), 3_000);

        platform.clear_timer(poll);
        platform.clear_timer(poll);
        assert_eq!(platform.timers_cleared, 1);
        assert_eq!(platform.live_timers(), 0);
        assert_eq!(platform.next_due(), None);
    }

    #[test]
    fn timeout_is_relative_to_the_virtual_clock() {
        let mut platform = MockPlatform::new_android();
        assert_eq!(platform.pop_due(500), None);
        platform.set_timeout(100, token(2, TimerKind::AssetTimeout));
        assert_eq!(platform.next_due(), Some(600));
    }

    #[test]
    fn page_subscriptions_are_not_session_subscriptions() {
        let mut platform = MockPlatform::new_android();
        platform.subscribe(SignalSource::ViewportResize, AttemptId::PAGE);
        let id = platform.subscribe(SignalSource::PageShow, AttemptId(1));
        assert_eq!(platform.live_subscriptions(), 2);
        let gauge = platform.session_subscription_gauge();
        assert_eq!(platform.live_session_subscriptions(), 1);
        assert_eq!(gauge.get(), 1);
        assert_eq!(platform.subscribers(SignalSource::PageShow), vec![AttemptId(1)]);
        platform.unsubscribe(id);
        assert_eq!(platform.live_session_subscriptions(), 0);
        assert_eq!(gauge.get(), 0);
    }

    #[test]
    fn reattaching_a_loaded_model_stays_loaded() {
        let mut platform = MockPlatform::new_android();
        let asset = AssetReference::new("grass.glb");
        platform.attach_source(&asset);
        assert!(!platform.is_loaded());
        platform.finish_loading();
        platform.attach_source(&AssetReference::new("other.glb"));
        assert!(!platform.is_loaded());
        platform.attach_source(&asset);
        assert!(platform.is_loaded());
    }

    #[test]
    fn lagging_loaded_flag_survives_a_src_change() {
        let mut platform = MockPlatform::new_android();
        platform.loaded_lags_src_change = true;
        platform.attach_source(&AssetReference::new("other.glb"));
        platform.finish_loading();
        platform.attach_source(&AssetReference::new("grass.glb"));
        assert_eq!(platform.current_source().as_deref(), Some("grass.glb"));
        assert!(platform.is_loaded(), "flag still describes other.glb");
    }

    #[test]
    fn hide_count_counts_fullscreen_exits() {
        let mut platform = MockPlatform::new_ios();
        platform.set_visibility(ElementVisibility::Fullscreen);
        platform.set_visibility(ElementVisibility::Hidden);
        platform.set_visibility(ElementVisibility::Hidden);
        assert_eq!(platform.hide_count(), 1);
    }

    #[test]
    fn missing_apis_report_errors() {
        let mut platform = MockPlatform::new_desktop();
        platform.media_api_available = false;
        platform.element_available = false;
        platform.quick_look_available = false;
        assert!(platform.request_video_stream(AttemptId(1)).is_err());
        assert!(platform.ensure_element().is_err());
        assert!(platform.open_quick_look("m.usdz").is_err());
        assert_eq!(platform.stream_requests, 0);
    }
}
