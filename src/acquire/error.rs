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
/// Error types for buffer acquisition.
///
/// Transport failures (the bytes could not be fetched) and decode failures
/// (the bytes could not be turned into audio) are distinct variants so
/// callers can tell them apart. The player stays unloaded after either, and
/// the load may be retried.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Sample rate not specified")]
    UnknownSampleRate,

    #[error("Channel count could not be determined")]
    UnknownChannels,
}
