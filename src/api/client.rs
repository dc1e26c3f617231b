//! Exposes a `Client` struct to talk to the HARDWARIO Cloud REST API.

use std::time::Instant;

use anyhow::Context;
use reqwest::tls::Version;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::pager::{Page, PageCursor};

pub const DEFAULT_BASE_URL: &str = "https://api.hardwario.cloud";
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Largest `limit` the API accepts.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication failed ({status}), check the group id and api token")]
    Unauthorized { status: StatusCode },
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },
    #[error("couldn't parse response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A paged collection of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// `/v1/devices`
    Devices { group_id: &'a str },
    /// `/v1/messages`
    Messages {
        group_id: &'a str,
        device_id: &'a str,
    },
}

impl<'a> Endpoint<'a> {
    fn path(&self) -> &'static str {
        match self {
            Endpoint::Devices { .. } => "/v1/devices",
            Endpoint::Messages { .. } => "/v1/messages",
        }
    }

    fn query(&self) -> Vec<(&'static str, &'a str)> {
        match *self {
            Endpoint::Devices { group_id } => vec![("group_id", group_id)],
            Endpoint::Messages {
                group_id,
                device_id,
            } => vec![("group_id", group_id), ("device_id", device_id)],
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Endpoint::Devices { .. } => "devices",
            Endpoint::Messages { .. } => "messages",
        }
    }
}

fn elapsed_ms(start: &Instant) -> u128 {
    start.elapsed().as_millis()
}

/// Map the status line of a response onto the error kinds the caller cares about.
fn check_status(status: StatusCode, url: &str) -> Result<(), FetchError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FetchError::Unauthorized { status })
        }
        status if !status.is_success() => Err(FetchError::Status {
            url: url.to_string(),
            status,
        }),
        _ => Ok(()),
    }
}

/// Only an empty page ends the collection, the server may hand out fewer than
/// `limit` items on any page.
fn next_cursor(offset: usize, count: usize) -> Option<PageCursor> {
    if count == 0 {
        None
    } else {
        Some(PageCursor::at(offset + count))
    }
}

pub struct Client {
    /// Use to make REST requests
    client: reqwest::Client,
    /// Example: `https://api.hardwario.cloud`
    base_url: String,
    /// `limit` sent with every page request
    page_size: usize,
}

impl Client {
    /// Create a new client, one per run.
    pub fn new(base_url: &str, page_size: usize) -> anyhow::Result<Client> {
        anyhow::ensure!(
            (1..=MAX_PAGE_SIZE).contains(&page_size),
            "page size must be between 1 and {}",
            MAX_PAGE_SIZE
        );

        let client = reqwest::Client::builder()
            .min_tls_version(Version::TLS_1_2)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("invalid http client configuration")?;

        Ok(Client {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    /// Example: `client.make_url("/v1/devices")` will produce
    /// `https://api.hardwario.cloud/v1/devices`
    pub fn make_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch a single page of `endpoint`, `cursor` is `None` for the first one.
    pub async fn fetch_page<T>(
        &self,
        endpoint: &Endpoint<'_>,
        token: &str,
        cursor: Option<PageCursor>,
    ) -> Result<Page<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.make_url(endpoint.path());
        let offset = cursor.map_or(0, |c| c.offset());

        let now = Instant::now();
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&endpoint.query())
            .query(&[("limit", self.page_size), ("offset", offset)])
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        check_status(status, &url)?;

        let text = resp.text().await.map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        log::debug!(
            "{} request to {} (offset {}, {}) took {}ms",
            endpoint.name(),
            url,
            offset,
            status.as_u16(),
            elapsed_ms(&now),
        );

        let items: Vec<T> =
            serde_json::from_str(&text).map_err(|source| FetchError::Decode { url: url.clone(), source })?;
        if items.len() > self.page_size {
            log::warn!(
                "{} returned {} items for limit {}",
                url,
                items.len(),
                self.page_size
            );
        }
        let next = next_cursor(offset, items.len());

        Ok(Page { items, next })
    }
}
