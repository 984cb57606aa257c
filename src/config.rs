/*
Copyright 2025 [rhythmcache]

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

         http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/


use std::{env, fmt, path::PathBuf, time::Duration};

use anyhow::Result;

use crate::error::Error;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Everything a single run needs. Built once, never mutated afterwards.
#[derive(Clone)]
pub struct RunArgs {
    pub owner: String,
    pub repo: String,
    pub pattern: String,
    /// Zero disables the deadline.
    pub timeout: Duration,
    pub token: Option<String>,
    pub api_url: String,
    pub dest_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl RunArgs {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            pattern: pattern.into(),
            timeout: DEFAULT_TIMEOUT,
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            dest_dir: PathBuf::from("."),
            staging_dir: env::temp_dir(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.is_empty() || self.repo.is_empty() || self.pattern.is_empty() {
            return Err(Error::MissingFlags.into());
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}

// Keeps the token out of debug logs.
impl fmt::Debug for RunArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunArgs")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("pattern", &self.pattern)
            .field("timeout", &self.timeout)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("dest_dir", &self.dest_dir)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

pub fn token_from_env() -> Option<String> {
    env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty())
}

/// Parses `90s`, `1m`, `1h 30m` and the like. A bare `0` means no deadline.
/// Fractions such as `1.5h` are rejected; write `1h 30m` instead.
pub fn parse_timeout(s: &str) -> Result<Duration, humantime::DurationError> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(s)
}
