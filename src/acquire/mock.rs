// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::io;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use super::error::AcquisitionError;
use super::Fetcher;

/// A mock fetcher. Serves canned bytes and counts fetches, so tests can
/// assert that a loaded player never refetches.
pub struct MockFetcher {
    bytes: Vec<u8>,
    fetches: Arc<AtomicUsize>,
    fail: bool,
    /// An artificial fetch latency, for exercising in-flight load behavior.
    delay: Option<Duration>,
}

impl MockFetcher {
    /// Creates a mock fetcher serving the given bytes.
    pub fn new(bytes: Vec<u8>) -> MockFetcher {
        MockFetcher {
            bytes,
            fetches: Arc::new(AtomicUsize::new(0)),
            fail: false,
            delay: None,
        }
    }

    /// Creates a mock fetcher whose fetches always fail with a transport
    /// error.
    pub fn failing() -> MockFetcher {
        MockFetcher {
            bytes: Vec::new(),
            fetches: Arc::new(AtomicUsize::new(0)),
            fail: true,
            delay: None,
        }
    }

    /// Adds an artificial latency to every fetch.
    pub fn with_delay(mut self, delay: Duration) -> MockFetcher {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if self.fail {
            return Err(AcquisitionError::Transport(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: mock transport failure", locator),
            )));
        }

        Ok(self.bytes.clone())
    }
}
