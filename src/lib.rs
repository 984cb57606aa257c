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


//! Downloads the first asset matching a glob pattern from the latest
//! published release of a GitHub repository into a local directory,
//! refusing to overwrite an existing file.
//!
//! Pass a token through `GITHUB_TOKEN` to reach private repositories.

pub mod config;
pub mod download;
pub mod error;
pub mod github;
pub mod select;

use std::path::PathBuf;

use anyhow::Result;
use humansize::{BINARY, format_size};
use log::{debug, info};

pub use crate::{
    config::RunArgs,
    error::Error,
    github::{Asset, AssetContent, ByteStream, GitHub, Release, ReleaseApi},
};
use crate::{
    download::{Staging, ensure_absent, fetch_redirect, plain_client},
    select::{compile_pattern, destination_name, select_asset},
};

/// Runs against the real GitHub API. Returns the path of the written file.
pub async fn run(args: &RunArgs) -> Result<PathBuf> {
    let github = GitHub::new(&args.api_url, args.token.as_deref())?;
    run_with(args, &github).await
}

/// Same as [`run`] with any [`ReleaseApi`] behind it. The whole run shares one deadline.
pub async fn run_with<A: ReleaseApi>(args: &RunArgs, api: &A) -> Result<PathBuf> {
    args.validate()?;
    debug!("run arguments: {:?}", args);

    match args.deadline() {
        Some(limit) => tokio::time::timeout(limit, fetch_latest_asset(args, api))
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => fetch_latest_asset(args, api).await,
    }
}

async fn fetch_latest_asset<A: ReleaseApi>(args: &RunArgs, api: &A) -> Result<PathBuf> {
    let pattern = compile_pattern(&args.pattern)?;

    info!("looking up latest release of {}/{}", args.owner, args.repo);
    let release = api.latest_release(&args.owner, &args.repo).await?;
    debug!(
        "release {} has {} assets",
        release.tag_name,
        release.assets.len()
    );

    let asset = select_asset(&release.assets, &pattern)?;
    debug!("picked asset {} (id {})", asset.name, asset.id);

    let dest = args.dest_dir.join(destination_name(&asset.name)?);
    ensure_absent(&dest)?;

    let (body, len) = match api.asset_content(&args.owner, &args.repo, asset.id).await? {
        AssetContent::Stream { body, len } => (body, len),
        AssetContent::Redirect(url) => fetch_redirect(&plain_client()?, url).await?,
    };

    let mut staging = Staging::create(&args.staging_dir)?;
    let size_hint = len.or((asset.size > 0).then_some(asset.size));
    let written = staging.copy_stream(body, size_hint).await?;
    staging.finalize(&dest)?;

    info!(
        "saved {} ({}) to {}",
        asset.name,
        format_size(written, BINARY),
        dest.display()
    );
    Ok(dest)
}
