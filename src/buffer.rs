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
use std::time::Duration;

/// A block of decoded audio samples held entirely in memory.
///
/// Samples are interleaved f32. The data is stored in an Arc so a buffer can
/// be shared between players (and between a player and the playback units it
/// creates) without copying. A buffer is immutable once constructed.
#[derive(Clone)]
pub struct AudioBuffer {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the buffer.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a new buffer from interleaved samples.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> AudioBuffer {
        AudioBuffer {
            data: Arc::new(data),
            channel_count,
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.data.len() / self.channel_count as usize
    }

    /// Returns the intrinsic duration of the buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Returns the intrinsic duration of the buffer.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Returns the sample for the given frame and channel, or 0.0 past the end.
    pub fn sample(&self, frame: usize, channel: u16) -> f32 {
        if channel >= self.channel_count {
            return 0.0;
        }
        let idx = frame * self.channel_count as usize + channel as usize;
        self.data.get(idx).copied().unwrap_or(0.0)
    }

    /// Returns the memory size of the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns the raw interleaved sample data.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}
