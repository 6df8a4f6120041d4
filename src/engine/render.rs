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

//! A software playback engine.
//!
//! The render engine owns the sample clock and mixes every connected unit
//! into interleaved output frames. Units are handed over via a channel so
//! connecting a unit never contends with the render path. Time only advances
//! when frames are rendered, which makes scheduling exact and tests
//! deterministic.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::clock::Clock;
use crate::engine::{EndedCallback, Engine, PlaybackUnit};

/// A linear playback rate ramp between two absolute engine times.
#[derive(Clone, Copy)]
struct Ramp {
    from_rate: f64,
    to_rate: f64,
    start: f64,
    end: f64,
}

/// Mutable scheduling parameters of a unit, written by the handle and read by
/// the render pass.
struct UnitParams {
    /// Absolute engine time at which playback begins. None until scheduled.
    start_at: Option<f64>,
    /// Buffer-content position playback begins at, in seconds.
    offset: f64,
    /// Buffer-content position at which the unit naturally ends, in seconds.
    /// None means "play until explicitly stopped" (looping units).
    end_position: Option<f64>,
    /// Absolute engine time of a scheduled stop, if any.
    stop_at: Option<f64>,
    /// Loop bounds within the buffer, in seconds.
    loop_bounds: Option<(f64, f64)>,
    /// The current playback rate.
    rate: f64,
    /// An in-flight rate ramp, if any.
    ramp: Option<Ramp>,
    /// The current buffer-content position, in seconds. Valid once started.
    position: f64,
    /// Whether the render pass has begun consuming the buffer.
    started: bool,
}

/// State shared between a unit handle and the render pass.
struct UnitState {
    buffer: AudioBuffer,
    params: Mutex<UnitParams>,
    /// The one-shot ended signal. Taken exactly once.
    ended: Mutex<Option<EndedCallback>>,
    connected: AtomicBool,
    finished: AtomicBool,
}

/// Resolves the effective playback rate at the given engine time, retiring
/// the ramp once it completes.
fn effective_rate(params: &mut UnitParams, now: f64) -> f64 {
    if let Some(ramp) = params.ramp {
        if now >= ramp.end {
            params.rate = ramp.to_rate;
            params.ramp = None;
        } else if now <= ramp.start || ramp.end <= ramp.start {
            return ramp.from_rate;
        } else {
            let progress = (now - ramp.start) / (ramp.end - ramp.start);
            return ramp.from_rate + (ramp.to_rate - ramp.from_rate) * progress;
        }
    }
    params.rate
}

/// The handle side of a render unit. Implements [`PlaybackUnit`] by mutating
/// the shared state the render pass reads.
struct RenderUnit {
    state: Arc<UnitState>,
    unit_tx: Sender<Arc<UnitState>>,
    /// The engine clock, for anchoring rate ramps.
    frames_rendered: Arc<AtomicU64>,
    sample_rate: u32,
}

impl RenderUnit {
    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::SeqCst) as f64 / self.sample_rate as f64
    }
}

impl PlaybackUnit for RenderUnit {
    fn start_at(&self, when: f64, offset: f64, duration: f64) {
        let mut params = self.state.params.lock();
        params.start_at = Some(when);
        params.offset = offset;
        params.position = offset;
        // Looping units run until stop_at is set; see set_loop.
        if params.loop_bounds.is_none() {
            params.end_position = Some(offset + duration);
        }
    }

    fn stop_at(&self, when: f64) {
        let mut params = self.state.params.lock();
        params.stop_at = Some(match params.stop_at {
            // An earlier scheduled stop wins.
            Some(existing) => existing.min(when),
            None => when,
        });
    }

    fn set_loop(&self, loop_start: f64, loop_end: f64) {
        let mut params = self.state.params.lock();
        params.loop_bounds = Some((loop_start, loop_end));
        params.end_position = None;
    }

    fn set_rate(&self, rate: f64) {
        let mut params = self.state.params.lock();
        params.rate = rate;
        params.ramp = None;
    }

    fn ramp_rate_to(&self, rate: f64, until: f64) {
        let now = self.now();
        let mut params = self.state.params.lock();
        let from_rate = effective_rate(&mut params, now);
        params.ramp = Some(Ramp {
            from_rate,
            to_rate: rate,
            start: now,
            end: until,
        });
    }

    fn on_ended(&self, callback: EndedCallback) {
        *self.state.ended.lock() = Some(callback);
    }

    fn connect(&self) {
        if self.state.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.unit_tx.send(self.state.clone()).is_err() {
            debug!("Render engine dropped before unit connection");
        }
    }

    fn disconnect(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.finished.store(true, Ordering::SeqCst);
        // A disconnected unit never fires its ended signal.
        self.state.ended.lock().take();
    }
}

/// An in-process engine that renders connected units to interleaved frames.
///
/// The engine is the destination of the signal chain: connecting a unit adds
/// it to the render list, disconnecting removes it.
pub struct RenderEngine {
    /// Units currently connected to the engine.
    units: RwLock<Vec<Arc<UnitState>>>,
    /// Channel for connecting units without touching the render lock.
    unit_tx: Sender<Arc<UnitState>>,
    unit_rx: Receiver<Arc<UnitState>>,
    /// Number of output channels.
    num_channels: u16,
    /// Output sample rate.
    sample_rate: u32,
    /// Frames rendered since creation. The engine clock.
    frames_rendered: Arc<AtomicU64>,
}

impl RenderEngine {
    /// Creates a new render engine.
    pub fn new(num_channels: u16, sample_rate: u32) -> RenderEngine {
        let (unit_tx, unit_rx) = crossbeam_channel::unbounded();
        RenderEngine {
            units: RwLock::new(Vec::new()),
            unit_tx,
            unit_rx,
            num_channels,
            sample_rate,
            frames_rendered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Gets the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of units currently connected.
    pub fn active_unit_count(&self) -> usize {
        self.drain_connections();
        self.units.read().len()
    }

    /// Moves newly connected units into the render list.
    fn drain_connections(&self) {
        if self.unit_rx.is_empty() {
            return;
        }
        let mut units = self.units.write();
        while let Ok(unit) = self.unit_rx.try_recv() {
            units.push(unit);
        }
    }

    /// Renders one frame of audio, advancing the engine clock by one sample.
    pub fn process_frame(&self) -> Vec<f32> {
        let mut frame = vec![0.0f32; self.num_channels as usize];
        let now = self.now();
        let sample_rate = self.sample_rate as f64;

        self.drain_connections();

        // Ended signals are collected during the render pass and fired after
        // the unit lock is released, so a completion handler may re-enter the
        // engine (e.g. to connect a retriggered unit).
        let mut ended: Vec<EndedCallback> = Vec::new();

        {
            let mut units = self.units.write();
            units.retain(|unit| {
                if unit.finished.load(Ordering::Relaxed) || !unit.connected.load(Ordering::Relaxed)
                {
                    return false;
                }

                let mut params = unit.params.lock();
                if render_unit(&unit.buffer, &mut params, now, sample_rate, &mut frame) {
                    return true;
                }

                // The unit reached its scheduled stop or its natural end.
                unit.finished.store(true, Ordering::Relaxed);
                unit.connected.store(false, Ordering::Relaxed);
                drop(params);
                if let Some(callback) = unit.ended.lock().take() {
                    ended.push(callback);
                }
                false
            });
        }

        self.frames_rendered.fetch_add(1, Ordering::SeqCst);

        for callback in ended {
            callback();
        }

        frame
    }

    /// Renders multiple frames of audio.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = Vec::with_capacity(num_frames * self.num_channels as usize);
        for _ in 0..num_frames {
            frames.extend_from_slice(&self.process_frame());
        }
        frames
    }
}

/// Renders one unit into the frame. Returns false once the unit is done.
fn render_unit(
    buffer: &AudioBuffer,
    params: &mut UnitParams,
    now: f64,
    sample_rate: f64,
    frame: &mut [f32],
) -> bool {
    if let Some(stop_at) = params.stop_at {
        if now >= stop_at {
            return false;
        }
    }

    let start_at = match params.start_at {
        Some(start_at) => start_at,
        // Not scheduled yet; stay connected and silent.
        None => return true,
    };
    if now < start_at {
        return true;
    }

    if !params.started {
        params.started = true;
        params.position = params.offset;
    }

    if params.loop_bounds.is_none() {
        let end = params
            .end_position
            .unwrap_or(f64::MAX)
            .min(buffer.duration_secs());
        if params.position >= end {
            return false;
        }
    }

    sample_buffer_at(buffer, params.position, frame);

    // Advance the content position: rate seconds of content per engine
    // second.
    let rate = effective_rate(params, now);
    params.position += rate / sample_rate;

    if let Some((loop_start, loop_end)) = params.loop_bounds {
        if loop_end > loop_start && params.position >= loop_end {
            let span = loop_end - loop_start;
            params.position = loop_start + (params.position - loop_start) % span;
        }
    }

    true
}

/// Samples the buffer at a fractional content position (seconds) and mixes
/// the result into the output frame, interpolating linearly between buffer
/// frames. Mono buffers are fanned out to every output channel;
/// multi-channel buffers map one to one.
fn sample_buffer_at(buffer: &AudioBuffer, position: f64, frame: &mut [f32]) {
    let frame_pos = position * buffer.sample_rate() as f64;
    let base = frame_pos.floor() as usize;
    let frac = frame_pos.fract() as f32;

    if buffer.channel_count() == 1 {
        let s0 = buffer.sample(base, 0);
        let s1 = buffer.sample(base + 1, 0);
        let sample = s0 + (s1 - s0) * frac;
        for out in frame.iter_mut() {
            *out += sample;
        }
        return;
    }

    for channel in 0..buffer.channel_count() {
        if channel as usize >= frame.len() {
            break;
        }
        let s0 = buffer.sample(base, channel);
        let s1 = buffer.sample(base + 1, channel);
        frame[channel as usize] += s0 + (s1 - s0) * frac;
    }
}

impl Clock for RenderEngine {
    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::SeqCst) as f64 / self.sample_rate as f64
    }
}

impl Engine for RenderEngine {
    fn create_unit(&self, buffer: &AudioBuffer) -> Arc<dyn PlaybackUnit> {
        Arc::new(RenderUnit {
            state: Arc::new(UnitState {
                buffer: buffer.clone(),
                params: Mutex::new(UnitParams {
                    start_at: None,
                    offset: 0.0,
                    end_position: None,
                    stop_at: None,
                    loop_bounds: None,
                    rate: 1.0,
                    ramp: None,
                    position: 0.0,
                    started: false,
                }),
                ended: Mutex::new(None),
                connected: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
            unit_tx: self.unit_tx.clone(),
            frames_rendered: self.frames_rendered.clone(),
            sample_rate: self.sample_rate,
        })
    }
}
