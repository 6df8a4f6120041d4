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
use serde::{Deserialize, Serialize};

/// Player configuration.
#[derive(Deserialize, Clone, Copy, Serialize, Debug)]
pub struct PlayerConfig {
    /// Whether start is accepted while already playing. When true, a new
    /// playback episode pre-empts the live one; when false, the call is
    /// ignored.
    #[serde(default)]
    retrigger: bool,

    /// The initial playback rate applied to every new playback unit.
    #[serde(default = "default_playback_rate")]
    playback_rate: f64,
}

fn default_playback_rate() -> f64 {
    1.0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            retrigger: false,
            playback_rate: default_playback_rate(),
        }
    }
}

impl PlayerConfig {
    /// Creates a new player configuration.
    pub fn new(retrigger: bool, playback_rate: f64) -> PlayerConfig {
        PlayerConfig {
            retrigger,
            playback_rate,
        }
    }

    /// Parses a configuration from YAML.
    pub fn from_yaml(contents: &str) -> Result<PlayerConfig, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    /// Gets the retrigger policy.
    pub fn retrigger(&self) -> bool {
        self.retrigger
    }

    /// Gets the initial playback rate.
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }
}
