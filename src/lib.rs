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

//! Sample-accurate playback of in-memory audio buffers.
//!
//! A [`BufferPlayer`] fetches and decodes an audio file into an
//! [`AudioBuffer`], then plays it through an [`Engine`] with
//! sample-accurate scheduling against the engine clock: offsets, scheduled
//! starts and stops, looping, playback-rate changes with ramps and a
//! completion observer.

pub mod acquire;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod player;
pub mod source;
#[cfg(test)]
mod testutil;

pub use acquire::{AcquisitionError, Fetcher};
pub use buffer::AudioBuffer;
pub use clock::{Clock, Time};
pub use config::PlayerConfig;
pub use engine::{Engine, PlaybackUnit};
pub use player::{BufferPlayer, PlayerError};
pub use source::{AudioSource, LoopOptions, PlaybackState, StartOptions};
