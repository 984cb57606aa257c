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


use std::{
    fs::{self, File},
    io,
    path::Path,
};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use reqwest::{StatusCode, Url};
use tempfile::{Builder, NamedTempFile, PersistError};
use tokio::io::AsyncWriteExt;

use crate::{
    error::Error,
    github::{AGENT, ByteStream},
};

const STAGING_PREFIX: &str = ".github-release-asset-";

/// Refuses to go on if anything, even a dangling symlink, sits at `dest`.
pub fn ensure_absent(dest: &Path) -> Result<()> {
    match fs::symlink_metadata(dest) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        _ => Err(Error::AlreadyExists(dest.to_path_buf()).into()),
    }
}

/// Client for the follow-up GET against a redirect target. Carries no credentials.
pub fn plain_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder().user_agent(AGENT).build()?;
    Ok(client)
}

pub async fn fetch_redirect(client: &reqwest::Client, url: Url) -> Result<(ByteStream, Option<u64>)> {
    // The query string usually holds a signature, keep it out of the logs.
    debug!("following redirect to {}{}", url.host_str().unwrap_or_default(), url.path());

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to download asset")?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::BadStatus(status).into());
    }

    let len = response.content_length();
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(io::Error::other))
        .boxed();
    Ok((body, len))
}

/// Private temp file holding the download until it is complete.
/// Dropping it on any path other than [`Staging::finalize`] deletes it.
pub struct Staging {
    file: NamedTempFile,
}

impl Staging {
    pub fn create(dir: &Path) -> Result<Self> {
        let file = Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create staging file in {}", dir.display()))?;
        debug!("staging download in {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn copy_stream(&mut self, mut body: ByteStream, len: Option<u64>) -> Result<u64> {
        let pb = create_progress_bar(len)?;
        let mut out = tokio::fs::File::from_std(self.file.as_file().try_clone()?);
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Failed to read asset data")?;
            out.write_all(&chunk)
                .await
                .context("Failed to write staging file")?;
            written += chunk.len() as u64;
            pb.inc(chunk.len() as u64);
        }

        out.flush().await.context("Failed to write staging file")?;
        out.sync_all().await.context("Failed to sync staging file")?;
        pb.finish_and_clear();
        Ok(written)
    }

    /// Moves the staged bytes to `dest` in one rename. Never replaces an existing file.
    pub fn finalize(self, dest: &Path) -> Result<()> {
        match self.file.persist_noclobber(dest) {
            Ok(_) => Ok(()),
            Err(PersistError { error, file }) if error.kind() == io::ErrorKind::CrossesDevices => {
                warn!(
                    "staging area is on another filesystem, copying next to {}",
                    dest.display()
                );
                persist_beside(file, dest)
            }
            Err(PersistError { error, .. }) => Err(rename_error(error, dest)),
        }
    }
}

// Re-stages the bytes in the destination directory so the final rename stays atomic.
fn persist_beside(staged: NamedTempFile, dest: &Path) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut local = Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create staging file in {}", dir.display()))?;

    let mut source: File = staged.reopen().context("Failed to reopen staging file")?;
    io::copy(&mut source, local.as_file_mut()).context("Failed to copy staging file")?;
    local.as_file().sync_all().context("Failed to sync staging file")?;

    local
        .persist_noclobber(dest)
        .map(|_| ())
        .map_err(|e| rename_error(e.error, dest))
}

fn rename_error(error: io::Error, dest: &Path) -> anyhow::Error {
    if error.kind() == io::ErrorKind::AlreadyExists {
        return Error::AlreadyExists(dest.to_path_buf()).into();
    }
    anyhow::Error::new(error).context(format!("Failed to move download to {}", dest.display()))
}

fn create_progress_bar(len: Option<u64>) -> Result<ProgressBar> {
    let pb = match len {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec})")?,
            );
            pb
        }
    };
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use tempfile::tempdir;

    fn body(chunks: &[&'static str]) -> ByteStream {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    #[test]
    fn existing_file_blocks_download() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("tool.tar.gz");
        ensure_absent(&dest)?;

        fs::write(&dest, b"old")?;
        let err = ensure_absent(&dest).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::AlreadyExists(_))));
        assert_eq!(fs::read(&dest)?, b"old");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_existing() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &dest)?;
        assert!(ensure_absent(&dest).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn staged_bytes_land_at_destination() -> Result<()> {
        let staging_dir = tempdir()?;
        let dest_dir = tempdir()?;
        let dest = dest_dir.path().join("asset.bin");

        let mut staging = Staging::create(staging_dir.path())?;
        assert!(staging
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(STAGING_PREFIX)));

        let written = staging.copy_stream(body(&["hello ", "world"]), Some(11)).await?;
        assert_eq!(written, 11);
        staging.finalize(&dest)?;

        assert_eq!(fs::read(&dest)?, b"hello world");
        assert_eq!(fs::read_dir(staging_dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_stream_leaves_nothing_behind() -> Result<()> {
        let staging_dir = tempdir()?;
        let broken: ByteStream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ])
        .boxed();

        let mut staging = Staging::create(staging_dir.path())?;
        assert!(staging.copy_stream(broken, None).await.is_err());
        drop(staging);

        assert_eq!(fs::read_dir(staging_dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn finalize_never_overwrites() -> Result<()> {
        let staging_dir = tempdir()?;
        let dest_dir = tempdir()?;
        let dest = dest_dir.path().join("asset.bin");

        let mut staging = Staging::create(staging_dir.path())?;
        staging.copy_stream(body(&["new"]), None).await?;

        // Someone else won the race after the existence check.
        fs::write(&dest, b"theirs")?;
        let err = staging.finalize(&dest).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::AlreadyExists(_))));

        assert_eq!(fs::read(&dest)?, b"theirs");
        assert_eq!(fs::read_dir(staging_dir.path())?.count(), 0);
        Ok(())
    }

    fn staged_in(dir: &Path, data: &[u8]) -> Result<NamedTempFile> {
        let mut file = Builder::new().prefix(STAGING_PREFIX).tempfile_in(dir)?;
        io::Write::write_all(file.as_file_mut(), data)?;
        Ok(file)
    }

    fn leftover_staging(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(STAGING_PREFIX) {
                names.push(name);
            }
        }
        Ok(names)
    }

    #[test]
    fn restaging_beside_destination_moves_bytes() -> Result<()> {
        let staging_dir = tempdir()?;
        let dest_dir = tempdir()?;
        let dest = dest_dir.path().join("asset.bin");

        let staged = staged_in(staging_dir.path(), b"copied across")?;
        persist_beside(staged, &dest)?;

        assert_eq!(fs::read(&dest)?, b"copied across");
        assert!(leftover_staging(staging_dir.path())?.is_empty());
        assert!(leftover_staging(dest_dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn restaging_beside_destination_never_overwrites() -> Result<()> {
        let staging_dir = tempdir()?;
        let dest_dir = tempdir()?;
        let dest = dest_dir.path().join("asset.bin");
        fs::write(&dest, b"theirs")?;

        let staged = staged_in(staging_dir.path(), b"ours")?;
        let err = persist_beside(staged, &dest).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::AlreadyExists(_))));

        assert_eq!(fs::read(&dest)?, b"theirs");
        assert!(leftover_staging(staging_dir.path())?.is_empty());
        assert!(leftover_staging(dest_dir.path())?.is_empty());
        Ok(())
    }
}
