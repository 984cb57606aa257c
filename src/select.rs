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


use std::path::PathBuf;

use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher};

use crate::{error::Error, github::Asset};

/// Shell-style glob: `*`, `?`, `[..]` with `!` or `^` negation, and `\` escapes.
/// Asset names are flat, so `/` gets no special treatment and a stray `**` acts like `*`.
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| {
            Error::Pattern {
                pattern: pattern.to_string(),
                source,
            }
            .into()
        })
}

/// First asset, in API order, whose name matches `pattern`.
pub fn select_asset<'a>(assets: &'a [Asset], pattern: &GlobMatcher) -> Result<&'a Asset> {
    assets
        .iter()
        .find(|asset| pattern.is_match(&asset.name))
        .ok_or_else(|| {
            Error::NoMatch {
                pattern: pattern.glob().glob().to_string(),
                names: assets.iter().map(|a| a.name.clone()).collect(),
            }
            .into()
        })
}

/// Local file name for an asset: its last path segment, whatever separator the remote used.
pub fn destination_name(asset_name: &str) -> Result<PathBuf> {
    match asset_name.rsplit(['/', '\\']).find(|s| !s.is_empty()) {
        Some(name) if name != "." && name != ".." => Ok(PathBuf::from(name)),
        _ => Err(Error::BadAssetName(asset_name.to_string()).into()),
    }
}
