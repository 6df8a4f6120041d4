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
use std::{io, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level, Span};

use crate::{
    acquire::{self, AcquisitionError, Fetcher},
    buffer::AudioBuffer,
    clock::Time,
    config::PlayerConfig,
    engine::{Engine, PlaybackUnit},
    source::{AudioSource, LoopOptions, PlaybackState, StartOptions},
};

/// Player errors.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Player has been disposed")]
    Disposed,

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),
}

/// The mutable state of a player, shared with completion handlers.
struct Inner {
    /// The decoded buffer, once loaded.
    buffer: Option<AudioBuffer>,
    /// The transport state.
    state: PlaybackState,
    /// The live playback unit. A fresh unit is created for every accepted
    /// start and never reused.
    unit: Option<Arc<dyn PlaybackUnit>>,
    /// Bumped on every accepted start and on dispose. A completion handler
    /// whose episode no longer matches is stale and must not act.
    episode: u64,
    /// The persisted playback rate, applied to every new unit.
    playback_rate: f64,
    /// The completion observer.
    on_ended: Option<Arc<dyn Fn() + Send + Sync>>,
    disposed: bool,
}

/// Plays a decoded in-memory buffer through a playback engine with
/// sample-accurate scheduling.
///
/// The player owns at most one live unit at a time. Starting creates a unit,
/// schedules it against the engine clock and connects it; completion (natural
/// end or scheduled stop) transitions the player back to stopped and fires
/// the `on_ended` observer exactly once per playback.
pub struct BufferPlayer {
    /// The engine units are created on and scheduled against.
    engine: Arc<dyn Engine>,
    /// The fetcher used by load.
    fetcher: Arc<dyn Fetcher>,
    /// Whether start is accepted while already started.
    retrigger: bool,
    inner: Arc<Mutex<Inner>>,
    /// Serializes loads so concurrent calls fetch at most once.
    load_guard: tokio::sync::Mutex<()>,
    /// The logging span.
    span: Span,
}

impl BufferPlayer {
    /// Creates a new buffer player.
    pub fn new(
        engine: Arc<dyn Engine>,
        fetcher: Arc<dyn Fetcher>,
        config: PlayerConfig,
    ) -> BufferPlayer {
        BufferPlayer {
            engine,
            fetcher,
            retrigger: config.retrigger(),
            inner: Arc::new(Mutex::new(Inner {
                buffer: None,
                state: PlaybackState::Stopped,
                unit: None,
                episode: 0,
                playback_rate: config.playback_rate(),
                on_ended: None,
                disposed: false,
            })),
            load_guard: tokio::sync::Mutex::new(()),
            span: span!(Level::INFO, "buffer player"),
        }
    }

    /// Fetches and decodes the given locator into the player's buffer.
    ///
    /// Loads are serialized: a second call issued while one is in flight
    /// waits for it and then returns without refetching. A player that
    /// already holds a buffer returns immediately. On failure the player
    /// stays unloaded and the load may be retried.
    pub async fn load(&self, locator: &str) -> Result<(), PlayerError> {
        if self.inner.lock().disposed {
            return Err(PlayerError::Disposed);
        }

        let _guard = self.load_guard.lock().await;
        if self.inner.lock().buffer.is_some() {
            debug!(parent: &self.span, locator, "Already loaded, skipping fetch");
            return Ok(());
        }

        info!(parent: &self.span, locator, "Loading");

        // Fetch and decode are blocking.
        let fetcher = self.fetcher.clone();
        let locator_owned = locator.to_string();
        let buffer =
            tokio::task::spawn_blocking(move || acquire::acquire(fetcher.as_ref(), &locator_owned))
                .await
                .map_err(|e| {
                    AcquisitionError::Transport(io::Error::new(
                        io::ErrorKind::Other,
                        e.to_string(),
                    ))
                })??;

        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(PlayerError::Disposed);
        }
        inner.buffer = Some(buffer);
        Ok(())
    }

    /// Injects a buffer directly, bypassing acquisition.
    pub fn set_buffer(&self, buffer: AudioBuffer) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(PlayerError::Disposed);
        }
        inner.buffer = Some(buffer);
        Ok(())
    }

    /// Returns the player's buffer, if loaded.
    pub fn buffer(&self) -> Option<AudioBuffer> {
        self.inner.lock().buffer.clone()
    }

    /// Returns the current transport state.
    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    /// Returns the persisted playback rate.
    pub fn playback_rate(&self) -> f64 {
        self.inner.lock().playback_rate
    }

    /// Registers the completion observer. Invoked exactly once per playback,
    /// for natural completion and for explicit stops.
    pub fn set_on_ended<F>(&self, callback: F) -> Result<(), PlayerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(PlayerError::Disposed);
        }
        inner.on_ended = Some(Arc::new(callback));
        Ok(())
    }

    /// Starts playback. Ignored without a buffer, and ignored while already
    /// started unless retrigger is enabled.
    pub fn start(&self, options: StartOptions) -> Result<(), PlayerError> {
        let pending = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return Err(PlayerError::Disposed);
            }
            self.start_locked(&mut inner, options.at, options.offset, options.duration, None)?
        };
        if let Some(callback) = pending {
            callback();
        }
        Ok(())
    }

    /// Starts looped playback. Same gate as start; the loop region defaults
    /// to the whole buffer and playback begins at the loop start.
    pub fn start_loop(&self, options: LoopOptions) -> Result<(), PlayerError> {
        let pending = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return Err(PlayerError::Disposed);
            }

            let buffer_duration = match &inner.buffer {
                Some(buffer) => buffer.duration_secs(),
                None => {
                    debug!(parent: &self.span, "Loop start ignored, no buffer loaded");
                    return Ok(());
                }
            };

            let loop_start = options.loop_start.unwrap_or(0.0);
            let loop_end = options.loop_end.unwrap_or(buffer_duration);
            let offset = options.offset.unwrap_or(loop_start);

            self.start_locked(
                &mut inner,
                options.at,
                Some(offset),
                options.duration,
                Some((loop_start, loop_end, options.duration.is_some())),
            )?
        };
        if let Some(callback) = pending {
            callback();
        }
        Ok(())
    }

    /// The shared start path. The caller holds the inner lock and must
    /// invoke the returned pending observer, if any, after releasing it.
    fn start_locked(
        &self,
        inner: &mut Inner,
        at: Option<Time>,
        offset: Option<f64>,
        duration: Option<f64>,
        loop_bounds: Option<(f64, f64, bool)>,
    ) -> Result<Option<Arc<dyn Fn() + Send + Sync>>, PlayerError> {
        let buffer = match &inner.buffer {
            Some(buffer) => buffer.clone(),
            None => {
                debug!(parent: &self.span, "Start ignored, no buffer loaded");
                return Ok(None);
            }
        };

        if inner.state == PlaybackState::Started && !self.retrigger {
            debug!(parent: &self.span, "Start ignored, already started");
            return Ok(None);
        }

        // This start owns the next episode; any pending completion signal
        // from an earlier unit is now stale.
        inner.episode += 1;
        let episode = inner.episode;

        // Pre-empt the live unit, if any.
        let mut pending_ended = None;
        if let Some(old_unit) = inner.unit.take() {
            if inner.state == PlaybackState::Stopped {
                // The unit was stopped and its completion signal has not
                // arrived yet. That episode is still owed one observer
                // delivery; the caller makes it, since the engine's late
                // signal is suppressed below.
                debug!(parent: &self.span, "Delivering pending completion before restart");
                old_unit.disconnect();
                pending_ended = inner.on_ended.clone();
            } else {
                info!(parent: &self.span, "Retrigger, stopping live unit");
                old_unit.stop_at(self.engine.now());
                old_unit.disconnect();
            }
        }

        let when = self.engine.to_seconds(at);
        let offset = offset.unwrap_or(0.0);
        let duration = duration.unwrap_or_else(|| buffer.duration_secs() - offset);

        info!(
            parent: &self.span,
            when,
            offset,
            duration,
            looped = loop_bounds.is_some(),
            rate = inner.playback_rate,
            "Starting playback"
        );

        let unit = self.engine.create_unit(&buffer);
        unit.set_rate(inner.playback_rate);
        if let Some((loop_start, loop_end, _)) = loop_bounds {
            unit.set_loop(loop_start, loop_end);
        }
        unit.start_at(when, offset, duration);

        // A looping unit runs until stopped; an explicit duration schedules
        // the stop instead.
        if let Some((_, _, true)) = loop_bounds {
            unit.stop_at(when + duration);
        }

        let handler_inner = self.inner.clone();
        let handler_span = self.span.clone();
        unit.on_ended(Box::new(move || {
            BufferPlayer::handle_ended(&handler_inner, episode, &handler_span);
        }));
        unit.connect();

        inner.state = PlaybackState::Started;
        inner.unit = Some(unit);
        Ok(pending_ended)
    }

    /// Stops playback. An immediate stop transitions to stopped
    /// synchronously; a deferred stop leaves the transition to the unit's
    /// completion handler.
    pub fn stop(&self, when: Option<Time>) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(PlayerError::Disposed);
        }

        if inner.state != PlaybackState::Started || inner.unit.is_none() {
            debug!(parent: &self.span, "Stop ignored, not started");
            return Ok(());
        }

        let now = self.engine.now();
        let stop_time = self.engine.to_seconds(when);

        if stop_time <= now {
            info!(parent: &self.span, "Stopping");
            inner.state = PlaybackState::Stopped;
            if let Some(unit) = &inner.unit {
                unit.stop_at(now);
            }
            // The unit stays in place so its completion handler can
            // disconnect it and fire the observer.
        } else {
            info!(parent: &self.span, stop_time, "Stop scheduled");
            if let Some(unit) = &inner.unit {
                unit.stop_at(stop_time);
            }
        }
        Ok(())
    }

    /// Sets the playback rate. The rate persists and applies to every future
    /// unit; a live unit takes it immediately, or ramps to it over
    /// `ramp_secs` when given.
    pub fn set_playback_rate(&self, rate: f64, ramp_secs: Option<f64>) -> Result<(), PlayerError> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(PlayerError::Disposed);
        }

        inner.playback_rate = rate;
        if let Some(unit) = &inner.unit {
            match ramp_secs {
                Some(ramp_secs) if ramp_secs > 0.0 => {
                    debug!(parent: &self.span, rate, ramp_secs, "Ramping playback rate");
                    unit.ramp_rate_to(rate, self.engine.now() + ramp_secs);
                }
                _ => {
                    debug!(parent: &self.span, rate, "Setting playback rate");
                    unit.set_rate(rate);
                }
            }
        }
        Ok(())
    }

    /// Disposes the player. Stops and disconnects any live unit, releases
    /// the buffer and suppresses pending completion signals. Idempotent;
    /// every subsequent operation returns [`PlayerError::Disposed`].
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }

        info!(parent: &self.span, "Disposing");
        inner.disposed = true;
        inner.episode += 1;
        inner.state = PlaybackState::Stopped;
        if let Some(unit) = inner.unit.take() {
            unit.stop_at(self.engine.now());
            unit.disconnect();
        }
        inner.buffer = None;
        inner.on_ended = None;
    }

    /// The completion handler, invoked by the engine when a unit finishes.
    /// Runs once per episode; stale episodes are ignored.
    fn handle_ended(inner: &Mutex<Inner>, episode: u64, span: &Span) {
        let callback = {
            let mut inner = inner.lock();
            if inner.disposed || inner.episode != episode {
                warn!(parent: span, episode, "Ignoring stale completion signal");
                return;
            }

            debug!(parent: span, "Playback ended");
            inner.state = PlaybackState::Stopped;
            if let Some(unit) = inner.unit.take() {
                unit.disconnect();
            }
            inner.on_ended.clone()
        };

        // Fired outside the lock so the observer may call back into the
        // player.
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl AudioSource for BufferPlayer {
    fn state(&self) -> PlaybackState {
        BufferPlayer::state(self)
    }

    fn start(&self, options: StartOptions) -> Result<(), PlayerError> {
        BufferPlayer::start(self, options)
    }

    fn stop(&self, when: Option<Time>) -> Result<(), PlayerError> {
        BufferPlayer::stop(self, when)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::acquire::mock::MockFetcher;
    use crate::engine::mock::MockEngine;
    use crate::engine::render::RenderEngine;
    use crate::testutil::{eventually, sine_buffer, wav_bytes};

    fn mock_player(retrigger: bool) -> (Arc<MockEngine>, BufferPlayer) {
        let engine = Arc::new(MockEngine::new());
        let player = BufferPlayer::new(
            engine.clone(),
            Arc::new(MockFetcher::new(Vec::new())),
            PlayerConfig::new(retrigger, 1.0),
        );
        (engine, player)
    }

    fn loaded_player(retrigger: bool) -> (Arc<MockEngine>, BufferPlayer) {
        let (engine, player) = mock_player(retrigger);
        // Two seconds of audio.
        player
            .set_buffer(sine_buffer(1, 100, 2.0, 10.0))
            .expect("unable to set buffer");
        (engine, player)
    }

    fn ended_counter(player: &BufferPlayer) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = count.clone();
            player
                .set_on_ended(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .expect("unable to set observer");
        }
        count
    }

    #[test]
    fn test_start_without_buffer_is_ignored() {
        let (engine, player) = mock_player(false);

        player.start(StartOptions::default()).unwrap();
        assert_eq!(engine.unit_count(), 0);
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_start_defaults() {
        let (engine, player) = loaded_player(false);

        player.start(StartOptions::default()).unwrap();
        assert_eq!(player.state(), PlaybackState::Started);

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_start(), Some((0.0, 0.0, 2.0)));
        assert_eq!(unit.recorded_rates(), vec![1.0]);
        assert!(unit.is_connected());
        assert!(unit.recorded_loop().is_none());
    }

    #[test]
    fn test_start_explicit_times() {
        let (engine, player) = loaded_player(false);
        engine.set_now(1.0);

        player
            .start(StartOptions {
                at: Some(Time::Relative(0.5)),
                offset: Some(0.25),
                duration: Some(1.0),
            })
            .unwrap();

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_start(), Some((1.5, 0.25, 1.0)));
    }

    #[test]
    fn test_default_duration_is_remainder_past_offset() {
        let (engine, player) = loaded_player(false);

        player
            .start(StartOptions {
                at: None,
                offset: Some(0.5),
                duration: None,
            })
            .unwrap();

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_start(), Some((0.0, 0.5, 1.5)));
    }

    #[test]
    fn test_start_while_started_is_ignored() {
        let (engine, player) = loaded_player(false);

        player.start(StartOptions::default()).unwrap();
        player.start(StartOptions::default()).unwrap();
        assert_eq!(engine.unit_count(), 1);
    }

    #[test]
    fn test_retrigger_replaces_live_unit() {
        let (engine, player) = loaded_player(true);
        let count = ended_counter(&player);

        player.start(StartOptions::default()).unwrap();
        let first = engine.last_unit().unwrap();

        player.start(StartOptions::default()).unwrap();
        let units = engine.units();
        assert_eq!(units.len(), 2);
        assert!(!Arc::ptr_eq(&units[0], &units[1]));
        assert_eq!(player.state(), PlaybackState::Started);

        // The pre-empted unit was stopped and disconnected, and its pending
        // completion signal no longer reaches the observer.
        assert!(first.was_disconnected());
        assert_eq!(first.recorded_stops(), vec![0.0]);
        first.finish();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // The live unit still completes normally.
        engine.last_unit().unwrap().finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_start_loop_defaults() {
        let (engine, player) = loaded_player(false);

        player.start_loop(LoopOptions::default()).unwrap();

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_loop(), Some((0.0, 2.0)));
        assert_eq!(unit.recorded_start(), Some((0.0, 0.0, 2.0)));
        // A defaulted duration loops until explicitly stopped.
        assert!(unit.recorded_stops().is_empty());
    }

    #[test]
    fn test_start_loop_explicit() {
        let (engine, player) = loaded_player(false);

        player
            .start_loop(LoopOptions {
                at: None,
                loop_start: Some(0.5),
                loop_end: Some(1.5),
                offset: None,
                duration: Some(3.0),
            })
            .unwrap();

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_loop(), Some((0.5, 1.5)));
        // Offset defaults to the loop start; the explicit duration schedules
        // the stop.
        assert_eq!(unit.recorded_start(), Some((0.0, 0.5, 3.0)));
        assert_eq!(unit.recorded_stops(), vec![3.0]);
    }

    #[test]
    fn test_stop_immediate_transitions_synchronously() {
        let (engine, player) = loaded_player(false);
        let count = ended_counter(&player);

        player.start(StartOptions::default()).unwrap();
        player.stop(None).unwrap();

        // State is authoritative before the engine reports completion.
        assert_eq!(player.state(), PlaybackState::Stopped);
        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_stops(), vec![0.0]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // The completion signal still fires the observer, exactly once.
        unit.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(unit.was_disconnected());
        unit.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_deferred_waits_for_completion() {
        let (engine, player) = loaded_player(false);
        let count = ended_counter(&player);

        player.start(StartOptions::default()).unwrap();
        player.stop(Some(Time::Absolute(1.0))).unwrap();

        // No synchronous transition; the completion handler owns it.
        assert_eq!(player.state(), PlaybackState::Started);
        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_stops(), vec![1.0]);

        unit.finish();
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_while_stopped_is_ignored() {
        let (engine, player) = loaded_player(false);

        player.stop(None).unwrap();
        assert_eq!(engine.unit_count(), 0);
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_set_playback_rate_persists_for_new_units() {
        let (engine, player) = loaded_player(false);

        player.set_playback_rate(1.5, None).unwrap();
        player.start(StartOptions::default()).unwrap();

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_rates(), vec![1.5]);
        assert_eq!(player.playback_rate(), 1.5);
    }

    #[test]
    fn test_set_playback_rate_applies_to_live_unit() {
        let (engine, player) = loaded_player(false);

        player.start(StartOptions::default()).unwrap();
        player.set_playback_rate(0.5, None).unwrap();

        // The literal rate is set, not a ramp.
        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_rates(), vec![1.0, 0.5]);
        assert!(unit.recorded_ramps().is_empty());
    }

    #[test]
    fn test_set_playback_rate_with_ramp() {
        let (engine, player) = loaded_player(false);
        engine.set_now(2.0);

        player.start(StartOptions::default()).unwrap();
        player.set_playback_rate(2.0, Some(0.5)).unwrap();

        let unit = engine.last_unit().unwrap();
        assert_eq!(unit.recorded_ramps(), vec![(2.0, 2.5)]);
        // The persisted rate is the target, for future units.
        assert_eq!(player.playback_rate(), 2.0);
    }

    #[test]
    fn test_on_ended_fires_once_on_natural_completion() {
        let (engine, player) = loaded_player(false);
        let count = ended_counter(&player);

        player.start(StartOptions::default()).unwrap();
        let unit = engine.last_unit().unwrap();

        unit.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(player.state(), PlaybackState::Stopped);

        unit.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_after_completion() {
        let (engine, player) = loaded_player(false);

        player.start(StartOptions::default()).unwrap();
        engine.last_unit().unwrap().finish();
        assert_eq!(player.state(), PlaybackState::Stopped);

        // A completed player accepts a new start with a fresh unit.
        player.start(StartOptions::default()).unwrap();
        assert_eq!(engine.unit_count(), 2);
        assert_eq!(player.state(), PlaybackState::Started);
    }

    #[test]
    fn test_restart_before_stop_completion_delivers_observer() {
        let (engine, player) = loaded_player(false);
        let count = ended_counter(&player);

        player.start(StartOptions::default()).unwrap();
        let first = engine.last_unit().unwrap();
        player.stop(None).unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);

        // Restart before the engine delivers the stopped unit's completion
        // signal. The stopped episode still gets its observer delivery.
        player.start(StartOptions::default()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(player.state(), PlaybackState::Started);
        assert_eq!(engine.unit_count(), 2);

        // The late engine signal is suppressed, so no double delivery.
        first.finish();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        engine.last_unit().unwrap().finish();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_buffer_while_started_only_affects_future_starts() {
        let (engine, player) = loaded_player(false);

        player.start(StartOptions::default()).unwrap();
        let first = engine.last_unit().unwrap();

        // Replacing the buffer mid-playback leaves the live unit alone.
        player.set_buffer(sine_buffer(1, 100, 1.0, 10.0)).unwrap();
        assert_eq!(first.recorded_start(), Some((0.0, 0.0, 2.0)));
        assert!((first.buffer().duration_secs() - 2.0).abs() < 1e-9);

        // The next start sees the new buffer's duration.
        first.finish();
        player.start(StartOptions::default()).unwrap();
        let second = engine.last_unit().unwrap();
        assert_eq!(second.recorded_start(), Some((0.0, 0.0, 1.0)));
        assert!((second.buffer().duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dispose() {
        let (engine, player) = loaded_player(false);
        let count = ended_counter(&player);

        player.start(StartOptions::default()).unwrap();
        let unit = engine.last_unit().unwrap();

        player.dispose();
        player.dispose();

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(unit.was_disconnected());
        assert_eq!(unit.recorded_stops(), vec![0.0]);
        assert!(player.buffer().is_none());

        // Pending completion signals are suppressed.
        unit.finish();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(matches!(
            player.start(StartOptions::default()),
            Err(PlayerError::Disposed)
        ));
        assert!(matches!(player.stop(None), Err(PlayerError::Disposed)));
        assert!(matches!(
            player.set_buffer(sine_buffer(1, 100, 1.0, 10.0)),
            Err(PlayerError::Disposed)
        ));
        assert!(matches!(
            player.set_playback_rate(1.0, None),
            Err(PlayerError::Disposed)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_fetches_once() -> Result<(), PlayerError> {
        let fetcher = Arc::new(MockFetcher::new(wav_bytes(1, 44100, 1.0, 440.0)));
        let player = BufferPlayer::new(
            Arc::new(MockEngine::new()),
            fetcher.clone(),
            PlayerConfig::default(),
        );

        player.load("tone.wav").await?;
        let buffer = player.buffer().expect("buffer must be loaded");
        assert_eq!(buffer.sample_rate(), 44100);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-6);

        // A loaded player never refetches.
        player.load("tone.wav").await?;
        assert_eq!(fetcher.fetch_count(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_loads_fetch_once() -> Result<(), PlayerError> {
        let fetcher = Arc::new(
            MockFetcher::new(wav_bytes(1, 44100, 0.1, 440.0))
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let player = Arc::new(BufferPlayer::new(
            Arc::new(MockEngine::new()),
            fetcher.clone(),
            PlayerConfig::default(),
        ));

        let first = {
            let player = player.clone();
            tokio::spawn(async move { player.load("tone.wav").await })
        };
        let second = {
            let player = player.clone();
            tokio::spawn(async move { player.load("tone.wav").await })
        };

        first.await.expect("join error")?;
        second.await.expect("join error")?;
        assert_eq!(fetcher.fetch_count(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_load_leaves_player_unloaded() {
        let fetcher = Arc::new(MockFetcher::failing());
        let engine = Arc::new(MockEngine::new());
        let player = BufferPlayer::new(engine.clone(), fetcher.clone(), PlayerConfig::default());

        let err = player.load("missing.wav").await.unwrap_err();
        assert!(matches!(
            err,
            PlayerError::Acquisition(AcquisitionError::Transport(_))
        ));
        assert!(player.buffer().is_none());

        // Without a buffer, start is still a no-op.
        player.start(StartOptions::default()).unwrap();
        assert_eq!(engine.unit_count(), 0);

        // The load may be retried.
        assert!(player.load("missing.wav").await.is_err());
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[test]
    fn test_render_end_to_end() {
        let engine = Arc::new(RenderEngine::new(1, 100));
        let player = BufferPlayer::new(
            engine.clone(),
            Arc::new(MockFetcher::new(Vec::new())),
            PlayerConfig::default(),
        );
        let count = ended_counter(&player);

        // Half a second of audio.
        player.set_buffer(sine_buffer(1, 100, 0.5, 10.0)).unwrap();
        player.start(StartOptions::default()).unwrap();
        assert_eq!(player.state(), PlaybackState::Started);

        engine.process_frames(50);
        assert_eq!(engine.active_unit_count(), 1);

        // One frame past the end completes the playback.
        engine.process_frame();
        eventually(
            || count.load(Ordering::SeqCst) == 1,
            "observer never fired",
        );
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(engine.active_unit_count(), 0);
    }

    #[test]
    fn test_render_loop_until_stopped() {
        let engine = Arc::new(RenderEngine::new(1, 100));
        let player = BufferPlayer::new(
            engine.clone(),
            Arc::new(MockFetcher::new(Vec::new())),
            PlayerConfig::default(),
        );
        let count = ended_counter(&player);

        // A tenth of a second, looped.
        player.set_buffer(sine_buffer(1, 100, 0.1, 10.0)).unwrap();
        player.start_loop(LoopOptions::default()).unwrap();

        // Several times around the loop; the unit stays live.
        engine.process_frames(35);
        assert_eq!(engine.active_unit_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        player.stop(None).unwrap();
        assert_eq!(player.state(), PlaybackState::Stopped);
        engine.process_frame();
        eventually(
            || count.load(Ordering::SeqCst) == 1,
            "observer never fired",
        );
        assert_eq!(engine.active_unit_count(), 0);
    }
}
