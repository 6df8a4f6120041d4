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

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use super::error::AcquisitionError;
use super::Fetcher;

/// Fetches audio bytes from the filesystem. Relative locators are resolved
/// against an optional base path.
pub struct FileFetcher {
    base_path: Option<PathBuf>,
}

impl FileFetcher {
    /// Creates a new file fetcher resolving locators as-is.
    pub fn new() -> FileFetcher {
        FileFetcher { base_path: None }
    }

    /// Creates a new file fetcher resolving relative locators against the
    /// given base path.
    pub fn with_base_path(base_path: PathBuf) -> FileFetcher {
        FileFetcher {
            base_path: Some(base_path),
        }
    }
}

impl Default for FileFetcher {
    fn default() -> Self {
        FileFetcher::new()
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AcquisitionError> {
        let path = match &self.base_path {
            Some(base) if !PathBuf::from(locator).is_absolute() => base.join(locator),
            _ => PathBuf::from(locator),
        };

        debug!(path = %path.display(), "Fetching audio file");

        // Include the path in the error so the user sees which file failed.
        fs::read(&path).map_err(|e| {
            AcquisitionError::Transport(io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })
    }
}
