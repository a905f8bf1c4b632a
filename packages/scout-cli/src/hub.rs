//! Thin REST connector for the model hub's public API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use model_scout::types::{RepoFile, SafetyStatus};
use model_scout::{Candidate, HubClient, HubError, ProfileLookup};

const DEFAULT_BASE_URL: &str = "https://huggingface.co";

pub struct HubApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HubApiClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn list(
        &self,
        sort: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        let url = format!(
            "{}/api/models?sort={sort}&direction=-1&limit={limit}&full=true",
            self.base_url
        );
        let response = self.request(&url).send().await.map_err(to_hub_error)?;
        let response = check_status(response)?;
        let listings: Vec<ModelListing> = response.json().await.map_err(to_hub_error)?;

        let mut candidates = Vec::new();
        for listing in listings {
            // The listing is newest-first; entries at or before the cursor
            // were seen in an earlier run.
            let cutoff = match sort {
                "createdAt" => listing.created_at,
                _ => listing.last_modified,
            };
            if cutoff.map(|ts| ts <= since).unwrap_or(false) {
                break;
            }
            match self.hydrate(listing).await {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unhydratable listing");
                }
            }
        }
        Ok(candidates)
    }

    /// Fill in the README, which the listing endpoint does not carry.
    async fn hydrate(&self, listing: ModelListing) -> Result<Candidate, HubError> {
        let (namespace, name) = listing
            .id
            .split_once('/')
            .map(|(ns, n)| (ns.to_string(), n.to_string()))
            .unwrap_or_else(|| (listing.id.clone(), listing.id.clone()));

        let readme_url = format!("{}/{}/raw/main/README.md", self.base_url, listing.id);
        let readme = match self.request(&readme_url).send().await {
            Ok(response) if response.status().is_success() => {
                response.text().await.ok()
            }
            _ => None,
        };

        let files = listing
            .siblings
            .unwrap_or_default()
            .into_iter()
            .map(|s| RepoFile {
                path: s.rfilename,
                size: s.size.unwrap_or(0),
                scan_status: SafetyStatus::Unknown,
            })
            .collect();

        let now = Utc::now();
        Ok(Candidate {
            id: listing.id,
            namespace,
            name,
            tags: listing.tags,
            pipeline_tag: listing.pipeline_tag,
            card_data: listing.card_data.unwrap_or(serde_json::Value::Null),
            readme,
            files,
            created_at: listing.created_at.unwrap_or(now),
            last_modified: listing.last_modified.unwrap_or(now),
            safety: match listing.security_repo_status.as_deref() {
                Some("safe") => SafetyStatus::Safe,
                Some("unsafe") => SafetyStatus::Flagged,
                _ => SafetyStatus::Unknown,
            },
            safetensors_total_params: listing.safetensors.and_then(|s| s.total),
        })
    }
}

#[async_trait]
impl HubClient for HubApiClient {
    async fn list_new(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        self.list("createdAt", since, limit).await
    }

    async fn list_updated(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>, HubError> {
        self.list("lastModified", since, limit).await
    }

    async fn resolve_profile(&self, namespace: &str) -> Result<ProfileLookup, HubError> {
        let org_url = format!("{}/api/organizations/{namespace}/overview", self.base_url);
        let response = self.request(&org_url).send().await.map_err(to_hub_error)?;
        if response.status().is_success() {
            return Ok(ProfileLookup::Organization);
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(status_error(response.status()));
        }

        let user_url = format!("{}/api/users/{namespace}/overview", self.base_url);
        let response = self.request(&user_url).send().await.map_err(to_hub_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(ProfileLookup::NotFound);
        }
        let response = check_status(response)?;
        let overview: UserOverview = response.json().await.map_err(to_hub_error)?;
        Ok(ProfileLookup::User {
            followers: overview.num_followers.unwrap_or(0),
            is_pro: overview.is_pro.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelListing {
    id: String,
    #[serde(default)]
    tags: Vec<String>,
    pipeline_tag: Option<String>,
    card_data: Option<serde_json::Value>,
    created_at: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    siblings: Option<Vec<Sibling>>,
    safetensors: Option<SafetensorsInfo>,
    security_repo_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SafetensorsInfo {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserOverview {
    num_followers: Option<i64>,
    is_pro: Option<bool>,
}

fn to_hub_error(e: reqwest::Error) -> HubError {
    if e.is_timeout() {
        HubError::Timeout
    } else {
        HubError::Transport(e.to_string())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, HubError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status))
    }
}

fn status_error(status: reqwest::StatusCode) -> HubError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        HubError::RateLimited
    } else {
        HubError::Transport(format!("hub returned {status}"))
    }
}
