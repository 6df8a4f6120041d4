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

//! Buffer acquisition: fetching encoded audio bytes and decoding them into
//! an in-memory [`AudioBuffer`](crate::buffer::AudioBuffer).
//!
//! Fetch and decode are blocking operations; the player drives them through
//! `spawn_blocking` so callers only ever see the async surface.

use std::path::Path;

use crate::buffer::AudioBuffer;

pub mod decode;
pub mod error;
pub mod fetch;
pub mod mock;

pub use error::AcquisitionError;

/// Fetches encoded audio bytes by locator.
///
/// The locator format is up to the implementation; the file fetcher treats
/// it as a path. Implementations must distinguish transport failures from
/// everything else by returning [`AcquisitionError::Transport`].
pub trait Fetcher: Send + Sync {
    /// Fetches the raw encoded bytes for the given locator.
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError>;
}

/// Fetches and decodes a locator into a buffer. The locator's extension, if
/// any, is passed to the decoder as a format hint.
pub fn acquire(fetcher: &dyn Fetcher, locator: &str) -> Result<AudioBuffer, AcquisitionError> {
    let bytes = fetcher.fetch(locator)?;
    let extension = Path::new(locator)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_string());
    decode::decode_bytes(bytes, extension.as_deref())
}
