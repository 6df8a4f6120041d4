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

//! A mock engine. Doesn't actually render anything.
//!
//! Records every scheduling call a unit receives so transport tests can
//! assert on exact times, offsets and durations, and lets the test fire the
//! ended signal by hand.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;

use crate::buffer::AudioBuffer;
use crate::clock::Clock;
use crate::engine::{EndedCallback, Engine, PlaybackUnit};

/// A recorded start call: (when, offset, duration).
pub type RecordedStart = (f64, f64, f64);

/// A mock playback unit that records its scheduling calls.
pub struct MockUnit {
    buffer: AudioBuffer,
    start: Mutex<Option<RecordedStart>>,
    stops: Mutex<Vec<f64>>,
    loop_bounds: Mutex<Option<(f64, f64)>>,
    rates: Mutex<Vec<f64>>,
    ramps: Mutex<Vec<(f64, f64)>>,
    ended: Mutex<Option<EndedCallback>>,
    connected: AtomicBool,
    disconnected: AtomicBool,
}

impl MockUnit {
    fn new(buffer: AudioBuffer) -> MockUnit {
        MockUnit {
            buffer,
            start: Mutex::new(None),
            stops: Mutex::new(Vec::new()),
            loop_bounds: Mutex::new(None),
            rates: Mutex::new(Vec::new()),
            ramps: Mutex::new(Vec::new()),
            ended: Mutex::new(None),
            connected: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Returns the buffer this unit was created for.
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// Returns the recorded start call, if any.
    pub fn recorded_start(&self) -> Option<RecordedStart> {
        *self.start.lock()
    }

    /// Returns the recorded stop times.
    pub fn recorded_stops(&self) -> Vec<f64> {
        self.stops.lock().clone()
    }

    /// Returns the recorded loop bounds, if any.
    pub fn recorded_loop(&self) -> Option<(f64, f64)> {
        *self.loop_bounds.lock()
    }

    /// Returns every rate set on the unit, in order.
    pub fn recorded_rates(&self) -> Vec<f64> {
        self.rates.lock().clone()
    }

    /// Returns every (rate, until) ramp requested on the unit, in order.
    pub fn recorded_ramps(&self) -> Vec<(f64, f64)> {
        self.ramps.lock().clone()
    }

    /// Returns true if the unit is connected and not yet disconnected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.disconnected.load(Ordering::Relaxed)
    }

    /// Returns true if the unit was ever disconnected.
    pub fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }

    /// Fires the ended signal, as the engine would on natural completion or
    /// on a scheduled stop. Does nothing if the unit was disconnected or the
    /// signal already fired.
    pub fn finish(&self) {
        if self.disconnected.load(Ordering::Relaxed) {
            return;
        }
        let callback = self.ended.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl PlaybackUnit for MockUnit {
    fn start_at(&self, when: f64, offset: f64, duration: f64) {
        *self.start.lock() = Some((when, offset, duration));
    }

    fn stop_at(&self, when: f64) {
        self.stops.lock().push(when);
    }

    fn set_loop(&self, loop_start: f64, loop_end: f64) {
        *self.loop_bounds.lock() = Some((loop_start, loop_end));
    }

    fn set_rate(&self, rate: f64) {
        self.rates.lock().push(rate);
    }

    fn ramp_rate_to(&self, rate: f64, until: f64) {
        self.ramps.lock().push((rate, until));
    }

    fn on_ended(&self, callback: EndedCallback) {
        *self.ended.lock() = Some(callback);
    }

    fn connect(&self) {
        self.connected.store(true, Ordering::Relaxed);
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::Relaxed);
        self.ended.lock().take();
    }
}

/// A mock engine with a manually advanced clock.
pub struct MockEngine {
    now: Mutex<f64>,
    units: Mutex<Vec<Arc<MockUnit>>>,
}

impl MockEngine {
    /// Creates a new mock engine with the clock at zero.
    pub fn new() -> MockEngine {
        MockEngine {
            now: Mutex::new(0.0),
            units: Mutex::new(Vec::new()),
        }
    }

    /// Sets the current engine time.
    pub fn set_now(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Returns every unit created by this engine, in creation order.
    pub fn units(&self) -> Vec<Arc<MockUnit>> {
        self.units.lock().clone()
    }

    /// Returns the most recently created unit.
    pub fn last_unit(&self) -> Option<Arc<MockUnit>> {
        self.units.lock().last().cloned()
    }

    /// Returns the number of units created so far.
    pub fn unit_count(&self) -> usize {
        self.units.lock().len()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        MockEngine::new()
    }
}

impl Clock for MockEngine {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

impl Engine for MockEngine {
    fn create_unit(&self, buffer: &AudioBuffer) -> Arc<dyn PlaybackUnit> {
        let unit = Arc::new(MockUnit::new(buffer.clone()));
        self.units.lock().push(unit.clone());
        unit
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_mock_unit_records_calls() {
        let engine = MockEngine::new();
        let buffer = AudioBuffer::new(vec![0.0; 8], 1, 8);
        let unit = engine.create_unit(&buffer);

        unit.start_at(1.0, 0.5, 0.25);
        unit.stop_at(2.0);
        unit.set_loop(0.0, 1.0);
        unit.set_rate(1.5);
        unit.ramp_rate_to(2.0, 3.0);

        let mock = engine.last_unit().unwrap();
        assert_eq!(mock.recorded_start(), Some((1.0, 0.5, 0.25)));
        assert_eq!(mock.recorded_stops(), vec![2.0]);
        assert_eq!(mock.recorded_loop(), Some((0.0, 1.0)));
        assert_eq!(mock.recorded_rates(), vec![1.5]);
        assert_eq!(mock.recorded_ramps(), vec![(2.0, 3.0)]);
    }

    #[test]
    fn test_finish_fires_once() {
        let engine = MockEngine::new();
        let buffer = AudioBuffer::new(vec![0.0; 8], 1, 8);
        let unit = engine.create_unit(&buffer);

        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            unit.on_ended(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let mock = engine.last_unit().unwrap();
        mock.finish();
        mock.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_suppresses_finish() {
        let engine = MockEngine::new();
        let buffer = AudioBuffer::new(vec![0.0; 8], 1, 8);
        let unit = engine.create_unit(&buffer);

        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            unit.on_ended(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        unit.disconnect();
        engine.last_unit().unwrap().finish();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
