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

use std::sync::Arc;

use crate::buffer::AudioBuffer;
use crate::clock::Clock;

pub mod mock;
pub mod render;

/// The one-shot completion signal registered on a playback unit.
pub type EndedCallback = Box<dyn FnOnce() + Send>;

/// A single-use scheduled playback handle bound to one buffer.
///
/// A unit is created by an [`Engine`], scheduled, connected into the engine's
/// signal graph, and then either plays to its natural end or is stopped. It is
/// never reused; every playback episode gets a fresh unit.
///
/// Offsets, durations and loop bounds are buffer-content positions in
/// seconds. Start and stop times are absolute engine seconds as produced by
/// the engine's [`Clock`].
pub trait PlaybackUnit: Send + Sync {
    /// Schedules playback of `duration` seconds of buffer content beginning
    /// at `offset`, starting at absolute engine time `when`.
    fn start_at(&self, when: f64, offset: f64, duration: f64);

    /// Schedules the unit to stop at absolute engine time `when`. Stopping
    /// fires the same ended signal as natural completion.
    fn stop_at(&self, when: f64);

    /// Marks the unit as looping over `[loop_start, loop_end)` within the
    /// buffer. A looping unit only ends via [`PlaybackUnit::stop_at`].
    fn set_loop(&self, loop_start: f64, loop_end: f64);

    /// Sets the playback rate immediately.
    fn set_rate(&self, rate: f64);

    /// Ramps the playback rate linearly, reaching `rate` at absolute engine
    /// time `until`.
    fn ramp_rate_to(&self, rate: f64, until: f64);

    /// Registers the one-time ended signal. Fires once, on natural completion
    /// or on a scheduled stop, never after [`PlaybackUnit::disconnect`].
    fn on_ended(&self, callback: EndedCallback);

    /// Connects the unit into the engine's downstream signal graph. A unit
    /// produces no output until connected.
    fn connect(&self);

    /// Severs the unit from the signal graph and releases its render state.
    /// Idempotent. A disconnected unit will not fire its ended signal.
    fn disconnect(&self);
}

/// A playback unit factory bound to a timebase.
///
/// The engine is the boundary between the player and whatever actually
/// renders audio: the in-process [`render::RenderEngine`], or the
/// [`mock::MockEngine`] in tests.
pub trait Engine: Clock {
    /// Creates a new, unconnected playback unit bound to the given buffer.
    fn create_unit(&self, buffer: &AudioBuffer) -> Arc<dyn PlaybackUnit>;
}
