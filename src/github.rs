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


use std::io;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::{StreamExt, stream::BoxStream};
use log::debug;
use reqwest::{
    StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LOCATION, USER_AGENT},
    redirect::Policy,
};
use serde::Deserialize;

use crate::{config::TOKEN_ENV, error::Error};

pub(crate) const AGENT: &str = concat!("github-release-get/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// The two ways the API hands out asset bytes.
pub enum AssetContent {
    Stream { body: ByteStream, len: Option<u64> },
    Redirect(Url),
}

/// The remote side of a run. [`GitHub`] talks to the real API; tests plug in fakes.
#[allow(async_fn_in_trait)]
pub trait ReleaseApi {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release>;

    async fn asset_content(&self, owner: &str, repo: &str, asset_id: u64) -> Result<AssetContent>;
}

#[derive(Clone)]
pub struct GitHub {
    client: reqwest::Client,
    api_url: String,
}

impl GitHub {
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(AGENT));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Token contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        // Asset downloads answer with a redirect we hand back to the caller
        // instead of following it with the token attached.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ReleaseApi for GitHub {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release> {
        let url = format!("{}/repos/{}/{}/releases/latest", self.api_url, owner, repo);
        debug!("fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .context("Failed to fetch latest release")?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json::<Release>()
            .await
            .context("Failed to parse release data")
    }

    async fn asset_content(&self, owner: &str, repo: &str, asset_id: u64) -> Result<AssetContent> {
        let url = format!(
            "{}/repos/{}/{}/releases/assets/{}",
            self.api_url, owner, repo, asset_id
        );
        debug!("requesting asset content from {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .context("Failed to request release asset")?;

        let status = response.status();
        if status.is_success() {
            let len = response.content_length();
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other))
                .boxed();
            return Ok(AssetContent::Stream { body, len });
        }
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .ok_or(Error::NoDownloadLink)?;
            let target = response
                .url()
                .join(location)
                .with_context(|| format!("Invalid redirect location {:?}", location))?;
            return Ok(AssetContent::Redirect(target));
        }

        Err(api_error(response).await)
    }
}

async fn api_error(response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v == "0"));

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&error_body)
        .ok()
        .and_then(|j| j.get("message").and_then(|m| m.as_str().map(String::from)))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    let message = if rate_limited {
        format!("{} (rate limit exceeded, try setting {})", message, TOKEN_ENV)
    } else if status == StatusCode::NOT_FOUND {
        format!("{} (repository not found or has no published releases)", message)
    } else {
        message
    };

    Error::Api { status, message }.into()
}
