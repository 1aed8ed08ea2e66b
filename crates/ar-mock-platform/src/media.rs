// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mock camera streams.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use ar_platform_port::{MediaStream, PlatformError};

/// Open-track bookkeeping shared between the platform and its streams.
#[derive(Debug, Default)]
pub struct MediaLedger {
    next_track: u64,
    open: BTreeSet<String>,
    stopped: usize,
}

impl MediaLedger {
    /// Tracks opened and not yet stopped.
    pub fn open_tracks(&self) -> usize {
        self.open.len()
    }

    /// Tracks stopped so far.
    pub fn stopped_tracks(&self) -> usize {
        self.stopped
    }

    fn open_track(&mut self) -> String {
        self.next_track += 1;
        let id = format!("video-{}", self.next_track);
        self.open.insert(id.clone());
        id
    }
}

/// A fake `getUserMedia` result.
#[derive(Debug)]
pub struct MockStream {
    ledger: Rc<RefCell<MediaLedger>>,
    tracks: Vec<String>,
    stuck: BTreeSet<String>,
}

impl MockStream {
    /// Open `track_count` tracks in `ledger`.
    pub fn open(ledger: &Rc<RefCell<MediaLedger>>, track_count: usize) -> Self {
        let tracks = {
            let mut ledger = ledger.borrow_mut();
            (0..track_count).map(|_| ledger.open_track()).collect()
        };
        Self {
            ledger: Rc::clone(ledger),
            tracks,
            stuck: BTreeSet::new(),
        }
    }

    /// Make `stop_track` fail for the first track.
    #[must_use]
    pub fn with_stuck_first_track(mut self) -> Self {
        if let Some(first) = self.tracks.first() {
            self.stuck.insert(first.clone());
        }
        self
    }
}

impl MediaStream for MockStream {
    fn track_ids(&self) -> Vec<String> {
        self.tracks.clone()
    }

    fn stop_track(&mut self, track_id: &str) -> Result<(), PlatformError> {
        if self.stuck.contains(track_id) {
            return Err(PlatformError::new("InvalidStateError", "track is busy"));
        }
        let mut ledger = self.ledger.borrow_mut();
        if ledger.open.remove(track_id) {
            ledger.stopped += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_tracks_closes_them_in_the_ledger() {
        let ledger = Rc::new(RefCell::new(MediaLedger::default()));
        let mut stream = MockStream::open(&ledger, 2);
        assert_eq!(ledger.borrow().open_tracks(), 2);
        for track in stream.track_ids() {
            assert!(stream.stop_track(&track).is_ok());
        }
        assert_eq!(ledger.borrow().open_tracks(), 0);
        assert_eq!(ledger.borrow().stopped_tracks(), 2);
    }

    #[test]
    fn stuck_track_stays_open() {
        let ledger = Rc::new(RefCell::new(MediaLedger::default()));
        let mut stream = MockStream::open(&ledger, 1).with_stuck_first_track();
        let track = stream.track_ids().remove(0);
        assert!(stream.stop_track(&track).is_err());
        assert_eq!(ledger.borrow().open_tracks(), 1);
    }
}
