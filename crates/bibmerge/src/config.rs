//! Configuration for the bibliography pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{AuthorStyle, FieldSelection};

/// Default source locations (CryptoBib).
pub mod sources {
    /// Abbreviation definitions. `abbrev0` is the most detailed variant.
    pub const ABBREV_URL: &str = "https://cryptobib.di.ens.fr/abbrev0.bib";

    /// Main bibliography.
    pub const MAIN_URL: &str = "https://cryptobib.di.ens.fr/crypto.bib";
}

/// Network configuration constants.
pub mod api {
    use std::time::Duration;

    /// Dataset hub base URL.
    pub const HUB_ENDPOINT: &str = "https://huggingface.co";

    /// Branch that publication commits to.
    pub const DEFAULT_REVISION: &str = "main";

    /// Request timeout. The main bibliography is tens of megabytes.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Retries for transient failures (5xx, timeouts, connection resets).
    pub const MAX_RETRIES: u32 = 3;

    /// Largest file committed inline; anything bigger goes through LFS.
    pub const INLINE_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

    /// Sent with every request.
    pub const USER_AGENT: &str = concat!("bibmerge/", env!("CARGO_PKG_VERSION"));
}

/// Field presets for `--fields`.
pub mod fields {
    /// Identifier, title and authors only.
    pub const MINIMAL: &[&str] = &["title", "author"];

    /// The fields most search indexes want.
    pub const STANDARD: &[&str] = &[
        "entrytype",
        "title",
        "author",
        "year",
        "booktitle",
        "journal",
        "pages",
        "doi",
    ];
}

/// Output defaults.
pub mod output {
    /// Local artifact name.
    pub const DEFAULT_PATH: &str = "crypto_papers.jsonl";
}

/// Environment variable names read by [`Config::from_env`].
pub mod env {
    /// Abbreviations source URL.
    pub const ABBREV_URL: &str = "BIBMERGE_ABBREV_URL";
    /// Main source URL.
    pub const MAIN_URL: &str = "BIBMERGE_MAIN_URL";
    /// Field selection (`all`, preset, or comma list).
    pub const FIELDS: &str = "BIBMERGE_FIELDS";
    /// Output path.
    pub const OUTPUT: &str = "BIBMERGE_OUTPUT";
    /// Dataset identifier (e.g. `user/cryptobib`).
    pub const DATASET: &str = "BIBMERGE_DATASET";
    /// Hub endpoint override.
    pub const HUB_ENDPOINT: &str = "BIBMERGE_HUB_ENDPOINT";
    /// Publication credential.
    pub const TOKEN: &str = "HF_TOKEN";
}

/// Pipeline configuration.
#[derive(Clone)]
pub struct Config {
    /// Abbreviations source URL.
    pub abbrev_url: String,

    /// Main source URL.
    pub main_url: String,

    /// Declared output fields.
    pub fields: FieldSelection,

    /// How author/editor lists are written.
    pub author_style: AuthorStyle,

    /// Where the JSON-lines file is written.
    pub output_path: PathBuf,

    /// Dataset to publish to (optional).
    pub dataset_id: Option<String>,

    /// Publication credential (optional; absent means publication is skipped).
    pub credential: Option<String>,

    /// Hub base URL (for testing with mock servers).
    pub hub_endpoint: String,

    /// Branch to commit to.
    pub revision: String,

    /// File name inside the dataset repository. Defaults to the output file name.
    pub path_in_repo: Option<String>,

    /// Files above this many bytes are uploaded through LFS.
    pub inline_upload_limit: usize,

    /// Request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Retries for transient HTTP failures.
    pub max_retries: u32,
}

impl Config {
    /// Create a configuration with default sources and optional publication target.
    #[must_use]
    pub fn new(dataset_id: Option<String>, credential: Option<String>) -> Self {
        Self {
            abbrev_url: sources::ABBREV_URL.to_string(),
            main_url: sources::MAIN_URL.to_string(),
            fields: FieldSelection::All,
            author_style: AuthorStyle::Raw,
            output_path: PathBuf::from(output::DEFAULT_PATH),
            dataset_id,
            credential,
            hub_endpoint: api::HUB_ENDPOINT.to_string(),
            revision: api::DEFAULT_REVISION.to_string(),
            path_in_repo: None,
            inline_upload_limit: api::INLINE_UPLOAD_LIMIT,
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            max_retries: api::MAX_RETRIES,
        }
    }

    /// Create a test configuration pointing both sources and the hub at a mock server.
    ///
    /// Sources are served from `/abbrev0.bib` and `/crypto.bib`.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            abbrev_url: format!("{}/abbrev0.bib", base_url),
            main_url: format!("{}/crypto.bib", base_url),
            hub_endpoint: base_url.to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            max_retries: 0, // No retries in tests
            ..Self::new(None, None)
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if `BIBMERGE_FIELDS` is not a valid field selection.
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::new(
            std::env::var(env::DATASET).ok().filter(|s| !s.is_empty()),
            std::env::var(env::TOKEN).ok().filter(|s| !s.is_empty()),
        );

        if let Ok(url) = std::env::var(env::ABBREV_URL) {
            config.abbrev_url = url;
        }
        if let Ok(url) = std::env::var(env::MAIN_URL) {
            config.main_url = url;
        }
        if let Ok(fields) = std::env::var(env::FIELDS) {
            config.fields = fields.parse()?;
        }
        if let Ok(path) = std::env::var(env::OUTPUT) {
            config.output_path = PathBuf::from(path);
        }
        if let Ok(endpoint) = std::env::var(env::HUB_ENDPOINT) {
            config.hub_endpoint = endpoint;
        }

        Ok(config)
    }

    /// Check everything that can be checked before fetching.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for unparseable URLs or a credential
    /// without a dataset to publish to.
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in [
            ("abbreviations URL", &self.abbrev_url),
            ("main URL", &self.main_url),
            ("hub endpoint", &self.hub_endpoint),
        ] {
            url::Url::parse(value)
                .map_err(|e| PipelineError::config(format!("{name} '{value}': {e}")))?;
        }

        if self.credential.is_some() && self.dataset_id.is_none() {
            return Err(PipelineError::config("a credential is set but no dataset id"));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(PipelineError::config("output path is empty"));
        }

        Ok(())
    }

    /// Check if a publication credential is configured.
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// File name used inside the dataset repository.
    #[must_use]
    pub fn repo_file_name(&self) -> String {
        self.path_in_repo.clone().unwrap_or_else(|| {
            self.output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| output::DEFAULT_PATH.to_string())
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("abbrev_url", &self.abbrev_url)
            .field("main_url", &self.main_url)
            .field("fields", &self.fields)
            .field("author_style", &self.author_style)
            .field("output_path", &self.output_path)
            .field("dataset_id", &self.dataset_id)
            .field("has_credential", &self.has_credential())
            .field("hub_endpoint", &self.hub_endpoint)
            .field("revision", &self.revision)
            .field("path_in_repo", &self.path_in_repo)
            .field("inline_upload_limit", &self.inline_upload_limit)
            .finish_non_exhaustive()
    }
}
