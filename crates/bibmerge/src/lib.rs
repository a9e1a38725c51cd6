//! bibmerge
//!
//! Builds a JSON-lines dataset from a BibTeX bibliography split across an
//! abbreviations file and a main file (CryptoBib's `abbrev0.bib` +
//! `crypto.bib` by default), and optionally publishes it to a dataset hub.
//!
//! # Stages
//!
//! 1. **Acquisition** ([`client`]): fetch both sources; either failure is fatal
//! 2. **Merge** ([`merge`]): abbreviations text, newline, main text
//! 3. **Parse** ([`bibtex`]): ordered entries, `@string` macros expanded
//! 4. **Normalize** ([`normalize`]): LaTeX escapes → unicode, declared fields filled with `""`
//! 5. **Project** ([`project`]): `key` plus exactly the declared fields
//! 6. **Emit** ([`formatters::jsonl`]): one JSON object per line, written atomically
//! 7. **Publish** ([`publish`]): optional, skipped without a credential
//!
//! # Example
//!
//! ```no_run
//! use bibmerge::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let report = Pipeline::new(config)?.run().await?;
//!     println!("{} records", report.records);
//!     Ok(())
//! }
//! ```

pub mod bibtex;
pub mod client;
pub mod config;
pub mod error;
pub mod formatters;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod project;
pub mod publish;

pub use bibtex::{BibtexParser, EntryParser};
pub use client::{HttpFetcher, SourceFetcher};
pub use config::Config;
pub use error::{
    EmitError, FetchError, InvalidFieldSpecError, MalformedEntryError, PipelineError,
    PublishError, SerializationError,
};
pub use merge::merge;
pub use normalize::{CanonicalizationMiss, normalize};
pub use pipeline::{Pipeline, RunOutcome, RunReport, transform};
pub use project::project;
pub use publish::{HubPublisher, PublicationStatus, Publisher};
