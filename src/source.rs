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
use std::fmt;

use crate::clock::Time;
use crate::player::PlayerError;

/// The transport state of an audio source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Started,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Started => write!(f, "started"),
        }
    }
}

/// Options for starting playback. Unset fields take their defaults at call
/// time: `at` is now, `offset` is zero and `duration` is the remainder of the
/// buffer past the offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct StartOptions {
    /// When playback begins.
    pub at: Option<Time>,
    /// Buffer position playback begins at, in seconds.
    pub offset: Option<f64>,
    /// How long to play, in seconds.
    pub duration: Option<f64>,
}

/// Options for starting looped playback. Unset fields take their defaults at
/// call time: `loop_start` is zero, `loop_end` is the buffer duration and
/// `offset` is `loop_start`. With no explicit `duration` the loop runs until
/// an explicit stop.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopOptions {
    /// When playback begins.
    pub at: Option<Time>,
    /// Start of the looped region, in seconds.
    pub loop_start: Option<f64>,
    /// End of the looped region, in seconds.
    pub loop_end: Option<f64>,
    /// Buffer position playback begins at, in seconds.
    pub offset: Option<f64>,
    /// How long to play before a scheduled stop, in seconds.
    pub duration: Option<f64>,
}

/// The transport surface shared by playable sources, so playback code can
/// drive any source kind through one interface.
pub trait AudioSource: Send + Sync {
    /// Returns the current transport state.
    fn state(&self) -> PlaybackState;

    /// Starts playback.
    fn start(&self, options: StartOptions) -> Result<(), PlayerError>;

    /// Stops playback at the given time, or immediately.
    fn stop(&self, when: Option<Time>) -> Result<(), PlayerError>;
}
