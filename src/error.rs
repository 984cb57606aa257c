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


use std::{path::PathBuf, time::Duration};

use reqwest::StatusCode;

/// Failures a run can end with, besides plain I/O and transport errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("one or more mandatory flags missing")]
    MissingFlags,

    #[error("invalid pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("GitHub API error {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("no assets matching pattern {pattern:?} found, assets are: {names:?}")]
    NoMatch { pattern: String, names: Vec<String> },

    #[error("asset name {0:?} has no usable file name")]
    BadAssetName(String),

    #[error("file {0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error("cannot download release asset, don't have sensible link for that")]
    NoDownloadLink,

    #[error("invalid status: {0}")]
    BadStatus(StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
