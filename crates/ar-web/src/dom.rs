// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! DOM vocabulary: which element/event backs each signal source, how the
//! viewer element is configured and styled, and how raw event facts become
//! [`Signal`]s.

use ar_platform_port::{
    AssetReference, AttemptId, ElementVisibility, PageVisibility, SessionStatus, Signal,
    SignalSource,
};

/// Tag name of the viewer custom element.
pub const VIEWER_TAG: &str = "model-viewer";
/// `id` given to the viewer element the binding creates.
pub const VIEWER_ELEMENT_ID: &str = "ar-activation-viewer";

/// Where a listener for a source is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerTarget {
    /// The viewer element.
    Viewer,
    /// `document`.
    Document,
    /// `window`.
    Window,
}

/// Target and DOM event name for `source`.
pub fn dom_event(source: SignalSource) -> (ListenerTarget, &'static str) {
    match source {
        SignalSource::ViewerLoad => (ListenerTarget::Viewer, "load"),
        SignalSource::ViewerSessionStatus => (ListenerTarget::Viewer, "ar-status"),
        SignalSource::VisibilityChange => (ListenerTarget::Document, "visibilitychange"),
        SignalSource::PageShow => (ListenerTarget::Window, "pageshow"),
        SignalSource::ViewportResize => (ListenerTarget::Window, "resize"),
    }
}

/// What a listener read off the event and the page when it fired.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventFacts {
    /// `event.detail.status` of an `ar-status` event.
    pub status: Option<String>,
    /// `document.hidden`.
    pub hidden: bool,
    /// `event.persisted` of a `pageshow` event.
    pub persisted: bool,
    /// `window.innerWidth`.
    pub width: f64,
}

/// Translate a fired DOM event into a controller signal.
///
/// `None` for `ar-status` events with an unknown status.
pub fn signal_for(source: SignalSource, attempt: AttemptId, facts: &EventFacts) -> Option<Signal> {
    match source {
        SignalSource::ViewerLoad => Some(Signal::ViewerLoaded { attempt }),
        SignalSource::ViewerSessionStatus => {
            let status = SessionStatus::from_wire(facts.status.as_deref()?)?;
            Some(Signal::SessionStatus { attempt, status })
        }
        SignalSource::VisibilityChange => Some(Signal::VisibilityChanged {
            attempt,
            visibility: if facts.hidden {
                PageVisibility::Hidden
            } else {
                PageVisibility::Visible
            },
        }),
        SignalSource::PageShow => Some(Signal::PageShow {
            attempt,
            persisted: facts.persisted,
        }),
        SignalSource::ViewportResize => Some(Signal::ViewportResized { width: facts.width }),
    }
}

/// Attributes written on the viewer element for `asset`.
///
/// Optional attributes are returned with `None` so stale values from a
/// previous asset get removed.
pub fn viewer_attributes(asset: &AssetReference) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("src", Some(asset.model_url.clone())),
        ("ios-src", asset.ios_model_url.clone()),
        ("poster", asset.poster_url.clone()),
        ("ar-placement", Some(asset.placement.as_attr().to_owned())),
    ]
}

/// Attributes set once when the element is created.
pub const VIEWER_STATIC_ATTRIBUTES: [(&str, &str); 4] = [
    ("ar", ""),
    ("ar-modes", "webxr scene-viewer quick-look"),
    ("camera-controls", ""),
    ("auto-rotate", ""),
];

/// Inline style for a visual state.
///
/// Hidden keeps the element laid out (so it keeps loading) but off-screen and
/// inert.
pub fn visibility_style(visibility: ElementVisibility) -> &'static str {
    match visibility {
        ElementVisibility::Hidden => {
            "position:fixed;left:-10000px;top:0;width:1px;height:1px;opacity:0;pointer-events:none;"
        }
        ElementVisibility::Fullscreen => {
            "position:fixed;inset:0;width:100vw;height:100vh;z-index:1000;opacity:1;"
        }
    }
}

/// Whether an `ar-status` value means a session is up.
pub fn status_is_active(status: &str) -> bool {
    SessionStatus::from_wire(status) == Some(SessionStatus::Presenting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_platform_port::Placement;

    #[test]
    fn page_lifetime_events_live_on_window_or_document() {
        assert_eq!(dom_event(SignalSource::PageShow), (ListenerTarget::Window, "pageshow"));
        assert_eq!(
            dom_event(SignalSource::VisibilityChange),
            (ListenerTarget::Document, "visibilitychange")
        );
        assert_eq!(dom_event(SignalSource::ViewerSessionStatus).0, ListenerTarget::Viewer);
    }

    #[test]
    fn status_events_map_model_viewer_names() {
        let facts = EventFacts {
            status: Some("session-started".into()),
            ..EventFacts::default()
        };
        let signal = signal_for(SignalSource::ViewerSessionStatus, AttemptId(3), &facts);
        assert!(matches!(
            signal,
            Some(Signal::SessionStatus {
                attempt: AttemptId(3),
                status: SessionStatus::Presenting
            })
        ));
        let unknown = EventFacts {
            status: Some("warming-up".into()),
            ..EventFacts::default()
        };
        assert!(signal_for(SignalSource::ViewerSessionStatus, AttemptId(3), &unknown).is_none());
        assert!(signal_for(SignalSource::ViewerSessionStatus, AttemptId(3), &EventFacts::default()).is_none());
    }

    #[test]
    fn visibility_follows_document_hidden() {
        let hidden = EventFacts {
            hidden: true,
            ..EventFacts::default()
        };
        assert!(matches!(
            signal_for(SignalSource::VisibilityChange, AttemptId(1), &hidden),
            Some(Signal::VisibilityChanged {
                visibility: PageVisibility::Hidden,
                ..
            })
        ));
        assert!(matches!(
            signal_for(SignalSource::VisibilityChange, AttemptId(1), &EventFacts::default()),
            Some(Signal::VisibilityChanged {
                visibility: PageVisibility::Visible,
                ..
            })
        ));
    }

    #[test]
    fn missing_optional_sources_clear_their_attributes() {
        let asset = AssetReference::new("/m.glb").with_placement(Placement::Wall);
        let attrs = viewer_attributes(&asset);
        assert!(attrs.contains(&("src", Some("/m.glb".to_owned()))));
        assert!(attrs.contains(&("ios-src", None)));
        assert!(attrs.contains(&("ar-placement", Some("wall".to_owned()))));
    }

    #[test]
    fn only_fullscreen_style_is_visible() {
        assert!(visibility_style(ElementVisibility::Hidden).contains("pointer-events:none"));
        assert!(visibility_style(ElementVisibility::Fullscreen).contains("inset:0"));
        assert!(status_is_active("object-placed"));
        assert!(!status_is_active("not-presenting"));
    }
}
