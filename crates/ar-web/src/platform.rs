// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `web-sys` implementation of the platform ports.
//!
//! Every browser callback hands its signal to the host from a fresh
//! microtask, never from inside the JS closure itself: the controller may
//! unsubscribe or clear the very listener/timer that fired, which drops the
//! closure.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ar_platform_port::{
    ArMode, AssetReference, AttemptId, ElementVisibility, EnvironmentPort, EventPort, MediaPort,
    MediaStream, PlatformError, Signal, SignalSource, SubscriptionId, TimerId, TimerPort,
    TimerToken, ViewerPort,
};
use js_sys::{Function, Promise, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{
    CustomEvent, Document, Element, Event, EventTarget, HtmlAnchorElement, MediaStreamConstraints,
    MediaStreamTrack, PageTransitionEvent, Window,
};

use crate::dom::{
    dom_event, signal_for, status_is_active, viewer_attributes, visibility_style, EventFacts,
    ListenerTarget, VIEWER_ELEMENT_ID, VIEWER_STATIC_ATTRIBUTES, VIEWER_TAG,
};
use crate::host::SignalSink;

fn deliver(sink: &Weak<dyn SignalSink>, signal: Signal) {
    match sink.upgrade() {
        Some(host) => host.deliver(signal),
        None => debug!(signal = signal.name(), "host gone; signal dropped"),
    }
}

/// Hand `signal` to the host on the next microtask.
fn deliver_later(sink: &Weak<dyn SignalSink>, signal: Signal) {
    let sink = sink.clone();
    spawn_local(async move { deliver(&sink, signal) });
}

/// Convert a thrown JS value (usually a `DOMException`) into a platform error.
fn platform_error(value: &JsValue) -> PlatformError {
    let field = |name: &str| {
        Reflect::get(value, &JsValue::from_str(name))
            .ok()
            .and_then(|v| v.as_string())
    };
    PlatformError::new(
        field("name").unwrap_or_else(|| "Error".to_owned()),
        field("message")
            .or_else(|| value.as_string())
            .unwrap_or_default(),
    )
}

/// Call the zero-argument method `name` on `target`.
fn call_method(target: &JsValue, name: &str) -> Result<JsValue, PlatformError> {
    let method = Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|m| m.dyn_into::<Function>().ok())
        .ok_or_else(|| PlatformError::unavailable(name))?;
    method.call0(target).map_err(|err| platform_error(&err))
}

/// A granted `getUserMedia` stream.
#[derive(Debug)]
struct WebStream(web_sys::MediaStream);

impl MediaStream for WebStream {
    fn track_ids(&self) -> Vec<String> {
        self.0
            .get_tracks()
            .iter()
            .filter_map(|track| track.dyn_into::<MediaStreamTrack>().ok())
            .map(|track| track.id())
            .collect()
    }

    fn stop_track(&mut self, track_id: &str) -> Result<(), PlatformError> {
        let track = self
            .0
            .get_track_by_id(track_id)
            .ok_or_else(|| PlatformError::new("NotFoundError", format!("no track {track_id}")))?;
        track.stop();
        Ok(())
    }
}

struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

struct Timer {
    handle: i32,
    interval: bool,
    _callback: Closure<dyn FnMut()>,
}

/// Platform adapter over the browser window, document and the
/// `<model-viewer>` element.
pub struct WebPlatform {
    window: Window,
    document: Document,
    element: Option<Element>,
    sink: Weak<dyn SignalSink>,
    ar_status_active: Rc<Cell<bool>>,
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, Listener>,
    timers: BTreeMap<TimerId, Timer>,
}

impl fmt::Debug for WebPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebPlatform")
            .field("element", &self.element.is_some())
            .field("listeners", &self.listeners.len())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}

impl WebPlatform {
    /// Adapter delivering its completions to `sink`.
    pub fn new(window: Window, document: Document, sink: Weak<dyn SignalSink>) -> Self {
        Self {
            window,
            document,
            element: None,
            sink,
            ar_status_active: Rc::new(Cell::new(false)),
            next_id: 0,
            listeners: BTreeMap::new(),
            timers: BTreeMap::new(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn arm(&mut self, delay_ms: u32, interval: bool, token: TimerToken) -> TimerId {
        let id = TimerId(self.allocate_id());
        let sink = self.sink.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            deliver_later(&sink, Signal::TimerFired(token));
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        let function: &Function = callback.as_ref().unchecked_ref();
        let handle = if interval {
            self.window
                .set_interval_with_callback_and_timeout_and_arguments_0(function, delay)
        } else {
            self.window
                .set_timeout_with_callback_and_timeout_and_arguments_0(function, delay)
        };
        match handle {
            Ok(handle) => {
                self.timers.insert(
                    id,
                    Timer {
                        handle,
                        interval,
                        _callback: callback,
                    },
                );
            }
            Err(err) => warn!(?token, error = ?err, "failed to arm timer"),
        }
        id
    }

    fn listener_target(&self, target: ListenerTarget) -> Option<EventTarget> {
        match target {
            ListenerTarget::Viewer => self.element.clone().map(EventTarget::from),
            ListenerTarget::Document => Some(EventTarget::from(self.document.clone())),
            ListenerTarget::Window => Some(EventTarget::from(self.window.clone())),
        }
    }

    fn create_element(&self) -> Result<Element, PlatformError> {
        let defined = self.window.custom_elements().get(VIEWER_TAG);
        if defined.is_undefined() {
            return Err(PlatformError::unavailable(VIEWER_TAG));
        }
        let element = self
            .document
            .create_element(VIEWER_TAG)
            .map_err(|err| platform_error(&err))?;
        element.set_id(VIEWER_ELEMENT_ID);
        for (name, value) in VIEWER_STATIC_ATTRIBUTES {
            element
                .set_attribute(name, value)
                .map_err(|err| platform_error(&err))?;
        }
        element
            .set_attribute("style", visibility_style(ElementVisibility::Hidden))
            .map_err(|err| platform_error(&err))?;
        let body = self
            .document
            .body()
            .ok_or_else(|| PlatformError::unavailable("document.body"))?;
        body.append_child(&element)
            .map_err(|err| platform_error(&err))?;
        Ok(element)
    }
}

fn event_status(event: &Event) -> Option<String> {
    let detail = event.dyn_ref::<CustomEvent>()?.detail();
    Reflect::get(&detail, &JsValue::from_str("status"))
        .ok()?
        .as_string()
}

fn event_persisted(event: &Event) -> bool {
    event
        .dyn_ref::<PageTransitionEvent>()
        .is_some_and(PageTransitionEvent::persisted)
}

fn inner_width(window: &Window) -> f64 {
    window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .unwrap_or(0.0)
}

impl EnvironmentPort for WebPlatform {
    fn user_agent(&self) -> String {
        self.window.navigator().user_agent().unwrap_or_default()
    }

    fn platform_name(&self) -> String {
        self.window.navigator().platform().unwrap_or_default()
    }

    fn max_touch_points(&self) -> u32 {
        u32::try_from(self.window.navigator().max_touch_points()).unwrap_or(0)
    }

    fn viewport_width(&self) -> f64 {
        inner_width(&self.window)
    }

    fn probe_webxr(&mut self) {
        // navigator.xr is not in the stable web-sys surface.
        let navigator: JsValue = self.window.navigator().into();
        let promise = Reflect::get(&navigator, &JsValue::from_str("xr"))
            .ok()
            .filter(|xr| !xr.is_undefined() && !xr.is_null())
            .and_then(|xr| {
                let check = Reflect::get(&xr, &JsValue::from_str("isSessionSupported"))
                    .ok()?
                    .dyn_into::<Function>()
                    .ok()?;
                check
                    .call1(&xr, &JsValue::from_str("immersive-ar"))
                    .ok()?
                    .dyn_into::<Promise>()
                    .ok()
            });
        let sink = self.sink.clone();
        spawn_local(async move {
            let supported = match promise {
                Some(promise) => JsFuture::from(promise)
                    .await
                    .ok()
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                None => false,
            };
            deliver_later(&sink, Signal::WebXrProbed { supported });
        });
    }
}

impl MediaPort for WebPlatform {
    fn request_video_stream(&mut self, attempt: AttemptId) -> Result<(), PlatformError> {
        let devices = self
            .window
            .navigator()
            .media_devices()
            .map_err(|_| PlatformError::unavailable("navigator.mediaDevices"))?;
        let constraints = MediaStreamConstraints::new();
        constraints.set_video(&JsValue::TRUE);
        let promise = devices
            .get_user_media_with_constraints(&constraints)
            .map_err(|err| platform_error(&err))?;
        let sink = self.sink.clone();
        spawn_local(async move {
            let result = match JsFuture::from(promise).await {
                Ok(value) => value
                    .dyn_into::<web_sys::MediaStream>()
                    .map(|stream| Box::new(WebStream(stream)) as Box<dyn MediaStream>)
                    .map_err(|_| PlatformError::new("TypeError", "getUserMedia resolved without a stream")),
                Err(err) => Err(platform_error(&err)),
            };
            deliver(&sink, Signal::VideoStream { attempt, result });
        });
        Ok(())
    }
}

impl ViewerPort for WebPlatform {
    fn ensure_element(&mut self) -> Result<(), PlatformError> {
        if self.element.is_some() {
            return Ok(());
        }
        let element = match self.document.get_element_by_id(VIEWER_ELEMENT_ID) {
            Some(existing) => existing,
            None => self.create_element()?,
        };
        self.element = Some(element);
        Ok(())
    }

    fn attach_source(&mut self, asset: &AssetReference) {
        let Some(element) = &self.element else {
            warn!("attach_source without a viewer element");
            return;
        };
        for (name, value) in viewer_attributes(asset) {
            let result = match value {
                Some(value) => element.set_attribute(name, &value),
                None => element.remove_attribute(name),
            };
            if let Err(err) = result {
                warn!(attribute = name, error = ?err, "failed to set viewer attribute");
            }
        }
    }

    fn current_source(&self) -> Option<String> {
        self.element.as_ref().and_then(|element| element.get_attribute("src"))
    }

    fn is_loaded(&self) -> bool {
        self.element.as_ref().is_some_and(|element| {
            Reflect::get(element, &JsValue::from_str("loaded"))
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        })
    }

    fn is_ar_active(&self) -> bool {
        // Native viewers background the page; WebXR reports through ar-status.
        self.ar_status_active.get() || self.document.hidden()
    }

    fn activate(&mut self, mode: ArMode, attempt: AttemptId) {
        self.ar_status_active.set(false);
        let called = match &self.element {
            Some(element) => {
                if let Err(err) = element.set_attribute("ar-modes", mode.as_attr()) {
                    warn!(error = ?err, "failed to set ar-modes");
                }
                call_method(element, "activateAR")
            }
            None => Err(PlatformError::unavailable(VIEWER_TAG)),
        };
        let sink = self.sink.clone();
        spawn_local(async move {
            let result = match called {
                Ok(value) => match value.dyn_into::<Promise>() {
                    Ok(promise) => JsFuture::from(promise)
                        .await
                        .map(|_| ())
                        .map_err(|err| platform_error(&err)),
                    Err(_) => Ok(()),
                },
                Err(err) => Err(err),
            };
            deliver(&sink, Signal::ActivationSettled { attempt, result });
        });
    }

    fn open_quick_look(&mut self, usdz_url: &str) -> Result<(), PlatformError> {
        let anchor = self
            .document
            .create_element("a")
            .map_err(|err| platform_error(&err))?
            .dyn_into::<HtmlAnchorElement>()
            .map_err(|_| PlatformError::new("TypeError", "created element is not an anchor"))?;
        anchor.set_rel("ar");
        anchor.set_href(usdz_url);
        // Quick Look only honours rel="ar" links with an image child.
        let image = self
            .document
            .create_element("img")
            .map_err(|err| platform_error(&err))?;
        anchor
            .append_child(&image)
            .map_err(|err| platform_error(&err))?;
        anchor.click();
        Ok(())
    }

    fn set_visibility(&mut self, visibility: ElementVisibility) {
        if let Some(element) = &self.element {
            if let Err(err) = element.set_attribute("style", visibility_style(visibility)) {
                warn!(?visibility, error = ?err, "failed to restyle viewer");
            }
        }
    }
}

impl TimerPort for WebPlatform {
    fn set_timeout(&mut self, delay_ms: u32, token: TimerToken) -> TimerId {
        self.arm(delay_ms, false, token)
    }

    fn set_interval(&mut self, period_ms: u32, token: TimerToken) -> TimerId {
        self.arm(period_ms, true, token)
    }

    fn clear_timer(&mut self, id: TimerId) {
        if let Some(timer) = self.timers.remove(&id) {
            if timer.interval {
                self.window.clear_interval_with_handle(timer.handle);
            } else {
                self.window.clear_timeout_with_handle(timer.handle);
            }
        }
    }
}

impl EventPort for WebPlatform {
    fn subscribe(&mut self, source: SignalSource, attempt: AttemptId) -> SubscriptionId {
        let id = SubscriptionId(self.allocate_id());
        let (target_kind, event) = dom_event(source);
        let Some(target) = self.listener_target(target_kind) else {
            warn!(?source, "no viewer element to listen on");
            return id;
        };

        let sink = self.sink.clone();
        let window = self.window.clone();
        let document = self.document.clone();
        let ar_active = Rc::clone(&self.ar_status_active);
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let facts = EventFacts {
                status: event_status(&event),
                hidden: document.hidden(),
                persisted: event_persisted(&event),
                width: inner_width(&window),
            };
            if let Some(status) = &facts.status {
                ar_active.set(status_is_active(status));
            }
            match signal_for(source, attempt, &facts) {
                Some(signal) => deliver_later(&sink, signal),
                None => debug!(?source, status = ?facts.status, "event ignored"),
            }
        });

        if let Err(err) = target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref()) {
            warn!(?source, error = ?err, "failed to add listener");
            return id;
        }
        self.listeners.insert(
            id,
            Listener {
                target,
                event,
                callback,
            },
        );
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(listener) = self.listeners.remove(&id) else {
            return;
        };
        if let Err(err) = listener
            .target
            .remove_event_listener_with_callback(listener.event, listener.callback.as_ref().unchecked_ref())
        {
            warn!(event = listener.event, error = ?err, "failed to remove listener");
        }
    }
}
