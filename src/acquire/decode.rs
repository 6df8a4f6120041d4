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
use std::io::Cursor;

use symphonia::core::audio::{AudioBuffer as SymphoniaBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::info;

use super::error::AcquisitionError;
use crate::buffer::AudioBuffer;

/// Decodes raw encoded audio bytes (WAV, MP3, FLAC, etc.) entirely into
/// memory. This uses symphonia to decode whatever format the probe
/// recognizes; the optional extension is a probing hint only.
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<AudioBuffer, AcquisitionError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AcquisitionError::NoAudioTrack)?;

    let track_id = track.id;
    let params = &track.codec_params;

    let sample_rate = params
        .sample_rate
        .ok_or(AcquisitionError::UnknownSampleRate)?;

    // Channels may be missing from the container metadata, in which case we
    // derive the count from the first decoded packet.
    let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(params, &decoder_opts)?;

    // Decode every packet of the selected track into one interleaved block.
    let mut samples = Vec::new();
    while let Some((packet_samples, packet_channels)) =
        read_and_decode_next_packet(format_reader.as_mut(), decoder.as_mut(), track_id)?
    {
        if channels == 0 {
            channels = packet_channels as u16;
        }
        samples.extend_from_slice(&packet_samples);
    }

    if channels == 0 {
        return Err(AcquisitionError::UnknownChannels);
    }

    let buffer = AudioBuffer::new(samples, channels, sample_rate);
    info!(
        channels,
        sample_rate,
        duration_ms = buffer.duration().as_millis(),
        memory_kb = buffer.memory_size() / 1024,
        "Buffer decoded"
    );

    Ok(buffer)
}

/// Reads and decodes the next packet for the given track. Handles
/// ResetRequired by resetting the decoder and retrying. Returns
/// `Ok(Some((samples, channels)))` when a packet was decoded, `Ok(None)` on
/// EOF, or `Err` on other errors.
fn read_and_decode_next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<(Vec<f32>, usize)>, AcquisitionError> {
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream.
                return Ok(None);
            }
            Err(SymphoniaError::DecodeError(_)) => {
                // Some decoders return DecodeError at EOF instead of IoError.
                return Ok(None);
            }
            Err(e) => return Err(AcquisitionError::Decode(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            Err(e) => return Err(AcquisitionError::Decode(e)),
        };
        let (samples, channels) = decode_buffer_to_f32(decoded);
        if channels > 0 && !samples.is_empty() {
            return Ok(Some((samples, channels)));
        }
    }
}

/// Converts a decoded AudioBufferRef to a Vec<f32> of interleaved samples
/// and returns the channel count as observed in the decoded buffer.
fn decode_buffer_to_f32(decoded: AudioBufferRef) -> (Vec<f32>, usize) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_planar_samples(&buf, |sample| sample),
        AudioBufferRef::F64(buf) => interleave_planar_samples(&buf, |sample| sample as f32),
        AudioBufferRef::S8(buf) => interleave_planar_samples(&buf, scale_s8),
        AudioBufferRef::S16(buf) => interleave_planar_samples(&buf, scale_s16),
        AudioBufferRef::S24(buf) => {
            interleave_planar_samples(&buf, |sample| scale_s24(sample.inner()))
        }
        AudioBufferRef::S32(buf) => interleave_planar_samples(&buf, scale_s32),
        AudioBufferRef::U8(buf) => interleave_planar_samples(&buf, scale_u8),
        AudioBufferRef::U16(buf) => interleave_planar_samples(&buf, scale_u16),
        AudioBufferRef::U24(buf) => {
            interleave_planar_samples(&buf, |sample| scale_u24(sample.inner()))
        }
        AudioBufferRef::U32(buf) => interleave_planar_samples(&buf, scale_u32),
    }
}

/// Helper to interleave planar samples from a generic AudioBuffer.
/// The closure receives a single sample value and returns the f32 sample value.
fn interleave_planar_samples<T, F>(buf: &SymphoniaBuffer<T>, convert: F) -> (Vec<f32>, usize)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    let mut samples = Vec::with_capacity(frames * channels);
    for frame_idx in 0..frames {
        for ch_idx in 0..channels {
            samples.push(convert(planes.planes()[ch_idx][frame_idx]));
        }
    }
    (samples, channels)
}

// Scaling helpers for all integer formats. These are `pub(crate)` so they can
// be validated directly in unit tests.

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
