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

/// A logical scheduling time, resolved against a [`Clock`] into absolute
/// engine seconds. Callers that omit a time get [`Time::Now`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Time {
    /// The current engine time.
    Now,
    /// Seconds from the current engine time.
    Relative(f64),
    /// An absolute engine time in seconds.
    Absolute(f64),
}

/// The shared timebase all playback scheduling goes through.
///
/// `now` must be monotonic. Scheduling operations capture one `now` value and
/// derive every absolute time from it, so a single start call sees a
/// consistent timebase.
pub trait Clock: Send + Sync {
    /// Returns the current engine time in seconds.
    fn now(&self) -> f64;

    /// Converts a logical time into absolute engine seconds. A missing time
    /// means "now".
    fn to_seconds(&self, time: Option<Time>) -> f64 {
        match time {
            None | Some(Time::Now) => self.now(),
            Some(Time::Relative(secs)) => self.now() + secs,
            Some(Time::Absolute(secs)) => secs,
        }
    }
}
