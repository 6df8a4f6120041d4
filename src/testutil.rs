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

use std::f32::consts::PI;
use std::io::Cursor;
use std::{
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::buffer::AudioBuffer;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

/// Renders an in-memory WAV file containing a sine tone. Each channel
/// carries the same signal.
pub fn wav_bytes(channels: u16, sample_rate: u32, duration_secs: f64, freq: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("unable to create wav writer");
        let frames = (sample_rate as f64 * duration_secs) as usize;
        for frame in 0..frames {
            let t = frame as f32 / sample_rate as f32;
            let sample = (2.0 * PI * freq * t).sin();
            for _ in 0..channels {
                writer
                    .write_sample(sample)
                    .expect("unable to write wav sample");
            }
        }
        writer.finalize().expect("unable to finalize wav");
    }

    cursor.into_inner()
}

/// Builds an in-memory buffer containing a sine tone.
pub fn sine_buffer(channels: u16, sample_rate: u32, duration_secs: f64, freq: f32) -> AudioBuffer {
    let frames = (sample_rate as f64 * duration_secs) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for frame in 0..frames {
        let t = frame as f32 / sample_rate as f32;
        let sample = (2.0 * PI * freq * t).sin();
        for _ in 0..channels {
            samples.push(sample);
        }
    }
    AudioBuffer::new(samples, channels, sample_rate)
}
