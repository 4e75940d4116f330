use relay_domain::{DataKind, Flag};
use relay_store::{Dataset, Item};
use reqwest::{Client, StatusCode};

use crate::error::IngestError;

/// REST client used for the `indirect/put` and `indirect/patch` fallback
/// fetches described in §4.2, and by the polling ingester.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_uri: String,
    sdk_key: String,
}

impl RestClient {
    pub fn new(client: Client, base_uri: impl Into<String>, sdk_key: impl Into<String>) -> Self {
        RestClient { client, base_uri: base_uri.into(), sdk_key: sdk_key.into() }
    }

    /// `GET /sdk/latest-all` — the full dataset, used for `indirect/put` and
    /// by the polling ingester.
    pub async fn fetch_all(&self) -> Result<Dataset, IngestError> {
        let url = format!("{}/sdk/latest-all", self.base_uri.trim_end_matches('/'));
        let response = self.client.get(&url).header("Authorization", &self.sdk_key).send().await?;
        self.check_status(response.status())?;
        let dataset = response.json::<Dataset>().await.map_err(|e| IngestError::MalformedEvent(e.to_string()))?;
        Ok(dataset)
    }

    /// `GET /sdk/latest-all/<flagKey>` — a single flag, used for
    /// `indirect/patch` against a `/flags/<key>` path.
    pub async fn fetch_flag(&self, key: &str) -> Result<Flag, IngestError> {
        let url = format!("{}/sdk/latest-all/{}", self.base_uri.trim_end_matches('/'), key);
        let response = self.client.get(&url).header("Authorization", &self.sdk_key).send().await?;
        self.check_status(response.status())?;
        let flag = response.json::<Flag>().await.map_err(|e| IngestError::MalformedEvent(e.to_string()))?;
        Ok(flag)
    }

    /// The upstream REST surface (§6) exposes no single-segment fetch
    /// endpoint, only `/sdk/latest-all` and the per-flag route. For an
    /// `indirect/patch` against a `/segments/<key>` path this falls back to
    /// a full re-fetch and extracts the segment by key out of the result.
    pub async fn fetch_segment(&self, key: &str) -> Result<Option<Item>, IngestError> {
        let dataset = self.fetch_all().await?;
        Ok(dataset.segments.get(key).cloned().map(Item::Segment))
    }

    pub async fn fetch_item(&self, kind: DataKind, key: &str) -> Result<Option<Item>, IngestError> {
        match kind {
            DataKind::Flags => self.fetch_flag(key).await.map(|f| Some(Item::Flag(f))),
            DataKind::Segments => self.fetch_segment(key).await,
        }
    }

    fn check_status(&self, status: StatusCode) -> Result<(), IngestError> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IngestError::Unauthorized);
        }
        if !status.is_success() {
            return Err(IngestError::UnexpectedStatus(status));
        }
        Ok(())
    }
}
