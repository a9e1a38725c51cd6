//! Run orchestration: fetch → merge → parse → normalize → project → emit → publish.
//!
//! Stages 2–5 are the synchronous [`transform`]; [`Pipeline::run`] wraps it
//! with the two network collaborators and the atomic file write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bibtex::{BibtexParser, EntryParser};
use crate::client::{HttpFetcher, SourceFetcher};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::formatters::jsonl::{EmitSummary, write_jsonl};
use crate::merge::merge_sources;
use crate::models::{AuthorStyle, FieldSelection, FieldSpec, ProjectedRecord, RawSource, SourceRole};
use crate::normalize::{CanonicalizationMiss, normalize};
use crate::project::project;
use crate::publish::{HubPublisher, PublicationStatus, Publisher};

/// How a run that produced its output ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Output written, and published or deliberately skipped.
    Success,
    /// Output written, publication failed.
    PartialSuccess,
}

impl RunOutcome {
    /// Process exit code for the CLI.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PartialSuccess => 2,
        }
    }
}

/// Everything a completed run reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When fetching started.
    pub started_at: DateTime<Utc>,
    /// When publication finished (or was skipped).
    pub finished_at: DateTime<Utc>,
    /// Size of the abbreviations text.
    pub abbreviations_bytes: usize,
    /// Size of the main text.
    pub main_bytes: usize,
    /// Entries parsed from the merged text.
    pub entries: usize,
    /// Records emitted. Always equal to `entries`.
    pub records: usize,
    /// Declared output fields (without `key`).
    pub fields: Vec<String>,
    /// Values kept raw because an escape could not be resolved.
    pub misses: Vec<CanonicalizationMiss>,
    /// The written artifact.
    pub output: EmitSummary,
    /// Publication result.
    pub publication: PublicationStatus,
}

impl RunReport {
    /// Overall outcome.
    #[must_use]
    pub const fn outcome(&self) -> RunOutcome {
        match self.publication {
            PublicationStatus::Failed { .. } => RunOutcome::PartialSuccess,
            PublicationStatus::Published { .. } | PublicationStatus::Skipped => RunOutcome::Success,
        }
    }

    /// Wall-clock run time.
    #[must_use]
    pub fn elapsed(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Result of the pure stages.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Field list the records were projected onto.
    pub spec: FieldSpec,
    /// Entries parsed.
    pub entries: usize,
    /// Projected records in entry order.
    pub records: Vec<ProjectedRecord>,
    /// Canonicalization misses.
    pub misses: Vec<CanonicalizationMiss>,
}

/// Merge, parse, normalize and project two source texts.
///
/// # Errors
///
/// Returns [`PipelineError::SourceOrder`] if the sources are not tagged
/// `(Abbreviations, Main)` and [`PipelineError::MalformedEntry`] if the merged
/// text does not parse.
pub fn transform(
    abbreviations: &RawSource,
    main: &RawSource,
    parser: &dyn EntryParser,
    selection: &FieldSelection,
    authors: AuthorStyle,
) -> PipelineResult<Transformed> {
    let merged = merge_sources(abbreviations, main)?;

    let entries = parser.parse(merged.as_str())?;
    let count = entries.len();
    tracing::info!(parser = parser.name(), entries = count, "Parsed entries");

    let spec = selection.resolve(&entries);
    let normalized = normalize(entries, &spec);
    tracing::info!(misses = normalized.misses.len(), "Normalized entries");

    let records = project(&normalized.entries, &spec, authors);
    tracing::info!(records = records.len(), fields = spec.record_width(), "Projected records");

    Ok(Transformed { spec, entries: count, records, misses: normalized.misses })
}

/// A configured pipeline.
pub struct Pipeline {
    config: Config,
    fetcher: Arc<dyn SourceFetcher>,
    parser: Box<dyn EntryParser>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl Pipeline {
    /// Create a pipeline with the HTTP fetcher, the BibTeX parser, and a hub
    /// publisher when a credential is configured.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the configuration is invalid or an
    /// HTTP client cannot be built.
    pub fn new(config: Config) -> PipelineResult<Self> {
        config.validate()?;

        let fetcher = HttpFetcher::new(&config)
            .map_err(|e| PipelineError::config(format!("HTTP client: {e}")))?;

        let publisher: Option<Arc<dyn Publisher>> = if config.has_credential() {
            let hub = HubPublisher::new(&config)
                .map_err(|e| PipelineError::config(format!("hub client: {e}")))?;
            Some(Arc::new(hub))
        } else {
            None
        };

        Ok(Self::with_components(config, Arc::new(fetcher), Box::new(BibtexParser::new()), publisher))
    }

    /// Create a pipeline from explicit collaborators.
    #[must_use]
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn SourceFetcher>,
        parser: Box<dyn EntryParser>,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Self {
        Self { config, fetcher, parser, publisher }
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run end to end.
    ///
    /// A fatal error leaves any existing output file untouched and publishes
    /// nothing. A publication failure is reported in the returned
    /// [`RunReport`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for invalid configuration, a failed fetch,
    /// malformed input or a failed write.
    pub async fn run(&self) -> PipelineResult<RunReport> {
        self.config.validate()?;
        let started_at = Utc::now();

        let abbreviations = self.acquire(SourceRole::Abbreviations, &self.config.abbrev_url).await?;
        let main = self.acquire(SourceRole::Main, &self.config.main_url).await?;

        let transformed = transform(
            &abbreviations,
            &main,
            self.parser.as_ref(),
            &self.config.fields,
            self.config.author_style,
        )?;

        let output = write_jsonl(&self.config.output_path, &transformed.records)?;
        let publication = self.publish(&output).await;

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            abbreviations_bytes: abbreviations.len(),
            main_bytes: main.len(),
            entries: transformed.entries,
            records: transformed.records.len(),
            fields: transformed.spec.names().to_vec(),
            misses: transformed.misses,
            output,
            publication,
        })
    }

    async fn acquire(&self, role: SourceRole, url: &str) -> PipelineResult<RawSource> {
        let text = self.fetcher.fetch(url).await.map_err(|e| PipelineError::fetch(role, e))?;
        tracing::info!(role = %role, bytes = text.len(), "Fetched source");
        Ok(RawSource::new(role, text))
    }

    async fn publish(&self, output: &EmitSummary) -> PublicationStatus {
        let (Some(credential), Some(dataset_id), Some(publisher)) =
            (&self.config.credential, &self.config.dataset_id, &self.publisher)
        else {
            tracing::info!("No credential configured, skipping publication");
            return PublicationStatus::Skipped;
        };

        match publisher.publish(&output.path, dataset_id, credential).await {
            Ok(receipt) => PublicationStatus::Published { commit_url: receipt.commit_url },
            Err(e) => {
                tracing::warn!(dataset = %dataset_id, error = %e, "Publication failed");
                PublicationStatus::Failed { reason: e.to_string() }
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("parser", &self.parser.name())
            .field("publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}
