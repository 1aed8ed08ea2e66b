// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera permission gate.
//!
//! A video-only stream is opened solely to surface the OS permission prompt.
//! It is never displayed or recorded: every track is stopped as soon as the
//! stream arrives, whether or not the attempt that asked for it is still
//! current.

use ar_platform_port::{AttemptId, MediaPort, MediaStream, PlatformError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::FailureReason;

/// Classified camera-access failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum PermissionError {
    /// The user (or a policy) refused access.
    #[error("camera access denied")]
    Denied,
    /// No capture device is available.
    #[error("no camera device")]
    NoDevice,
    /// The media API is missing or failed in an unrecognised way.
    #[error("camera access unsupported")]
    Unsupported,
}

impl From<PermissionError> for FailureReason {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Denied => Self::PermissionDenied,
            PermissionError::NoDevice => Self::NoCameraDevice,
            PermissionError::Unsupported => Self::Unsupported,
        }
    }
}

/// Map a DOM exception name from `getUserMedia` onto the taxonomy.
pub fn classify_media_error(name: &str) -> PermissionError {
    match name {
        "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => PermissionError::Denied,
        "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
            PermissionError::NoDevice
        }
        _ => PermissionError::Unsupported,
    }
}

/// Stop every track of `stream`. Returns how many tracks stopped cleanly.
///
/// A track that refuses to stop is logged and skipped.
pub fn release_stream(stream: &mut dyn MediaStream) -> usize {
    let mut stopped = 0;
    for track in stream.track_ids() {
        match stream.stop_track(&track) {
            Ok(()) => stopped += 1,
            Err(err) => warn!(track = %track, %err, "failed to stop camera track"),
        }
    }
    stopped
}

/// Requests camera access and normalises the outcome.
#[derive(Debug, Default)]
pub struct PermissionGate {
    requests: u64,
    streams_released: u64,
}

impl PermissionGate {
    /// New gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the platform for a video stream on behalf of `attempt`.
    ///
    /// A synchronous platform error means the media API is missing.
    pub fn request<M: MediaPort + ?Sized>(
        &mut self,
        media: &mut M,
        attempt: AttemptId,
    ) -> Result<(), PermissionError> {
        self.requests += 1;
        media.request_video_stream(attempt).map_err(|err| {
            debug!(%attempt, %err, "media api unavailable");
            PermissionError::Unsupported
        })
    }

    /// Consume the platform's answer. Any stream is released before returning.
    pub fn settle(
        &mut self,
        result: Result<Box<dyn MediaStream>, PlatformError>,
    ) -> Result<(), PermissionError> {
        match result {
            Ok(mut stream) => {
                release_stream(stream.as_mut());
                self.streams_released += 1;
                Ok(())
            }
            Err(err) => {
                let classified = classify_media_error(&err.name);
                debug!(%err, ?classified, "camera access failed");
                Err(classified)
            }
        }
    }

    /// Number of stream requests issued.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Number of streams received and released.
    pub fn streams_released(&self) -> u64 {
        self.streams_released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeStream {
        tracks: Vec<String>,
        stopped: Vec<String>,
        stuck: Option<String>,
    }

    impl MediaStream for FakeStream {
        fn track_ids(&self) -> Vec<String> {
            self.tracks.clone()
        }

        fn stop_track(&mut self, track_id: &str) -> Result<(), PlatformError> {
            if self.stuck.as_deref() == Some(track_id) {
                return Err(PlatformError::new("InvalidStateError", "track busy"));
            }
            self.stopped.push(track_id.to_owned());
            Ok(())
        }
    }

    #[test]
    fn denial_names_are_classified() {
        assert_eq!(classify_media_error("NotAllowedError"), PermissionError::Denied);
        assert_eq!(classify_media_error("PermissionDeniedError"), PermissionError::Denied);
        assert_eq!(classify_media_error("SecurityError"), PermissionError::Denied);
        assert_eq!(classify_media_error("NotFoundError"), PermissionError::NoDevice);
        assert_eq!(classify_media_error("DevicesNotFoundError"), PermissionError::NoDevice);
        assert_eq!(classify_media_error("OverconstrainedError"), PermissionError::NoDevice);
        assert_eq!(classify_media_error("AbortError"), PermissionError::Unsupported);
        assert_eq!(classify_media_error(""), PermissionError::Unsupported);
    }

    #[test]
    fn failure_reasons_follow_classification() {
        assert_eq!(FailureReason::from(PermissionError::Denied), FailureReason::PermissionDenied);
        assert_eq!(FailureReason::from(PermissionError::NoDevice), FailureReason::NoCameraDevice);
        assert_eq!(FailureReason::from(PermissionError::Unsupported), FailureReason::Unsupported);
    }

    #[test]
    fn release_skips_tracks_that_fail_to_stop() {
        let mut stream = FakeStream {
            tracks: vec!["v0".into(), "v1".into(), "v2".into()],
            stopped: Vec::new(),
            stuck: Some("v1".into()),
        };
        assert_eq!(release_stream(&mut stream), 2);
        assert_eq!(stream.stopped, vec!["v0".to_owned(), "v2".to_owned()]);
    }

    #[test]
    fn settle_grants_and_counts_released_streams() {
        let mut gate = PermissionGate::new();
        let stream = FakeStream {
            tracks: vec!["v0".into()],
            stopped: Vec::new(),
            stuck: None,
        };
        assert_eq!(gate.settle(Ok(Box::new(stream))), Ok(()));
        assert_eq!(gate.streams_released(), 1);
        let denied = gate.settle(Err(PlatformError::new("NotAllowedError", "nope")));
        assert_eq!(denied, Err(PermissionError::Denied));
        assert_eq!(gate.streams_released(), 1);
    }
}
