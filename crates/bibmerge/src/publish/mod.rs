//! Publication of the emitted file to a dataset hub.
//!
//! [`HubPublisher`] uploads the artifact as a single commit through the hub's
//! NDJSON commit endpoint:
//!
//! ```text
//! POST {endpoint}/api/datasets/{dataset_id}/commit/{revision}
//! {"key":"header","value":{"summary":"...","description":""}}
//! {"key":"file","value":{"content":"<base64>","path":"crypto_papers.jsonl","encoding":"base64"}}
//! ```
//!
//! Files above [`Config::inline_upload_limit`] are stored through the Git LFS
//! batch API first (`{endpoint}/datasets/{dataset_id}.git/info/lfs/objects/batch`),
//! and the commit then references them by SHA-256:
//!
//! ```text
//! {"key":"lfsFile","value":{"path":"crypto_papers.jsonl","algo":"sha256","oid":"<hex>","size":123}}
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::client::build_client;
use crate::config::Config;
use crate::error::{PublishError, PublishResult};

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Header key carrying the part size of a multipart LFS upload.
const LFS_CHUNK_SIZE: &str = "chunk_size";

/// Hub confirmation of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Browsable URL of the commit.
    pub commit_url: String,
    /// Commit hash, when the hub reports one.
    #[serde(default)]
    pub commit_oid: Option<String>,
}

/// What happened to publication in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublicationStatus {
    /// Uploaded.
    Published {
        /// Browsable URL of the commit
        commit_url: String,
    },
    /// No credential configured.
    Skipped,
    /// Local output is valid but the upload failed.
    Failed {
        /// Rendered [`PublishError`]
        reason: String,
    },
}

/// Ships a local file to a remote dataset store.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload `local_path` to `dataset_id`, authorized by `credential`.
    async fn publish(
        &self,
        local_path: &Path,
        dataset_id: &str,
        credential: &str,
    ) -> PublishResult<PublishReceipt>;
}

/// Where an uploaded file's bytes live.
enum Upload<'a> {
    /// Carried base64-encoded in the commit itself.
    Inline(&'a [u8]),
    /// Already stored through LFS.
    Lfs(LfsPointer),
}

/// Content address of a file stored through LFS.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LfsPointer {
    oid: String,
    size: usize,
}

impl LfsPointer {
    fn of(content: &[u8]) -> Self {
        Self { oid: format!("{:x}", Sha256::digest(content)), size: content.len() }
    }
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    #[serde(default)]
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

/// Dataset hub publisher.
#[derive(Clone)]
pub struct HubPublisher {
    client: ClientWithMiddleware,
    endpoint: String,
    revision: String,
    path_in_repo: String,
    inline_limit: usize,
}

impl HubPublisher {
    /// Create a publisher with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> PublishResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: config.hub_endpoint.trim_end_matches('/').to_string(),
            revision: config.revision.clone(),
            path_in_repo: config.repo_file_name(),
            inline_limit: config.inline_upload_limit,
        })
    }

    fn commit_url(&self, dataset_id: &str) -> String {
        format!("{}/api/datasets/{}/commit/{}", self.endpoint, dataset_id, self.revision)
    }

    fn lfs_batch_url(&self, dataset_id: &str) -> String {
        format!("{}/datasets/{}.git/info/lfs/objects/batch", self.endpoint, dataset_id)
    }

    fn commit_body(path_in_repo: &str, upload: &Upload<'_>) -> String {
        let header = json!({
            "key": "header",
            "value": {
                "summary": format!("Update {path_in_repo}"),
                "description": "",
            },
        });
        let file = match upload {
            Upload::Inline(content) => json!({
                "key": "file",
                "value": {
                    "content": STANDARD.encode(content),
                    "path": path_in_repo,
                    "encoding": "base64",
                },
            }),
            Upload::Lfs(pointer) => json!({
                "key": "lfsFile",
                "value": {
                    "path": path_in_repo,
                    "algo": "sha256",
                    "oid": pointer.oid,
                    "size": pointer.size,
                },
            }),
        };
        format!("{header}\n{file}\n")
    }

    /// Store `content` through the LFS batch API and return its pointer.
    async fn upload_lfs(
        &self,
        dataset_id: &str,
        credential: &str,
        content: &[u8],
    ) -> PublishResult<LfsPointer> {
        let pointer = LfsPointer::of(content);
        tracing::info!(oid = %pointer.oid, bytes = pointer.size, "Uploading through LFS");

        let batch = json!({
            "operation": "upload",
            "transfers": ["basic", "multipart"],
            "hash_algo": "sha256",
            "objects": [{ "oid": pointer.oid, "size": pointer.size }],
        });
        let response = self
            .client
            .post(self.lfs_batch_url(dataset_id))
            .bearer_auth(credential)
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(batch.to_string())
            .send()
            .await?;
        let batch: LfsBatchResponse = Self::handle_response(dataset_id, response).await?.json().await?;

        let object = batch
            .objects
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::lfs("batch response lists no objects"))?;
        if let Some(error) = object.error {
            return Err(PublishError::lfs(format!("{} ({})", error.message, error.code)));
        }
        let Some(actions) = object.actions else {
            tracing::debug!(oid = %pointer.oid, "LFS object already stored");
            return Ok(pointer);
        };

        if let Some(upload) = &actions.upload {
            self.transfer(upload, &pointer, content).await?;
        }
        if let Some(verify) = &actions.verify {
            let mut request = self
                .client
                .post(&verify.href)
                .bearer_auth(credential)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .body(json!({ "oid": pointer.oid, "size": pointer.size }).to_string());
            for (name, value) in &verify.header {
                request = request.header(name, value);
            }
            Self::check_lfs(request.send().await?).await?;
        }

        Ok(pointer)
    }

    /// PUT the bytes where the upload action says, in parts when it asks for them.
    async fn transfer(
        &self,
        action: &LfsAction,
        pointer: &LfsPointer,
        content: &[u8],
    ) -> PublishResult<()> {
        let Some(chunk_size) = action.header.get(LFS_CHUNK_SIZE) else {
            let mut request = self.client.put(&action.href).body(content.to_vec());
            for (name, value) in &action.header {
                request = request.header(name, value);
            }
            Self::check_lfs(request.send().await?).await?;
            return Ok(());
        };

        let chunk_size: usize = chunk_size
            .parse()
            .map_err(|_| PublishError::lfs(format!("invalid chunk size '{chunk_size}'")))?;
        let mut part_urls: Vec<(u32, &str)> = action
            .header
            .iter()
            .filter_map(|(name, url)| name.parse().ok().map(|number| (number, url.as_str())))
            .collect();
        part_urls.sort_unstable_by_key(|(number, _)| *number);
        if chunk_size == 0 || part_urls.len() != content.len().div_ceil(chunk_size) {
            return Err(PublishError::lfs(format!(
                "{} part URLs for {} bytes in chunks of {chunk_size}",
                part_urls.len(),
                content.len()
            )));
        }

        let mut parts = Vec::with_capacity(part_urls.len());
        for ((number, url), chunk) in part_urls.into_iter().zip(content.chunks(chunk_size)) {
            let response = self.client.put(url).body(chunk.to_vec()).send().await?;
            let response = Self::check_lfs(response).await?;
            let etag = response
                .headers()
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| PublishError::lfs(format!("part {number} returned no ETag")))?;
            parts.push(json!({ "partNumber": number, "etag": etag }));
        }
        tracing::debug!(parts = parts.len(), "Uploaded LFS parts");

        let completion = json!({ "oid": pointer.oid, "parts": parts });
        let response = self
            .client
            .post(&action.href)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(completion.to_string())
            .send()
            .await?;
        Self::check_lfs(response).await?;
        Ok(())
    }

    /// Status check for storage and verify endpoints, which are not dataset routes.
    async fn check_lfs(response: reqwest::Response) -> PublishResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().path().to_string();
        let text = response.text().await.unwrap_or_default();
        Err(PublishError::lfs(format!("{url} returned {status}: {text}")))
    }

    /// Handle API response status codes.
    async fn handle_response(
        dataset_id: &str,
        response: reqwest::Response,
    ) -> PublishResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        match code {
            401 | 403 => {
                let text = response.text().await.unwrap_or_default();
                Err(PublishError::Unauthorized { status: code, message: text })
            }
            404 => Err(PublishError::NotFound { dataset: dataset_id.to_string() }),
            500..=599 => {
                let text = response.text().await.unwrap_or_default();
                Err(PublishError::Server { status: code, message: text })
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(PublishError::UnexpectedStatus { status: code, message: text })
            }
        }
    }
}

#[async_trait]
impl Publisher for HubPublisher {
    async fn publish(
        &self,
        local_path: &Path,
        dataset_id: &str,
        credential: &str,
    ) -> PublishResult<PublishReceipt> {
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|source| PublishError::Io { path: local_path.to_path_buf(), source })?;

        tracing::info!(
            dataset = dataset_id,
            path = %self.path_in_repo,
            bytes = content.len(),
            "Publishing"
        );

        let upload = if content.len() > self.inline_limit {
            Upload::Lfs(self.upload_lfs(dataset_id, credential, &content).await?)
        } else {
            Upload::Inline(&content)
        };

        let response = self
            .client
            .post(self.commit_url(dataset_id))
            .bearer_auth(credential)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(Self::commit_body(&self.path_in_repo, &upload))
            .send()
            .await?;

        let response = Self::handle_response(dataset_id, response).await?;
        let receipt: PublishReceipt = response.json().await?;

        tracing::info!(commit_url = %receipt.commit_url, "Published");
        Ok(receipt)
    }
}

impl fmt::Debug for HubPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubPublisher")
            .field("endpoint", &self.endpoint)
            .field("revision", &self.revision)
            .field("path_in_repo", &self.path_in_repo)
            .field("inline_limit", &self.inline_limit)
            .finish_non_exhaustive()
    }
}
