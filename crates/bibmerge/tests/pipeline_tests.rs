//! End-to-end pipeline tests using wiremock.
//!
//! Both sources and the dataset hub are served by one mock server.

use std::path::Path;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use bibmerge::config::Config;
use bibmerge::error::{FetchError, PipelineError};
use bibmerge::formatters::decode_line;
use bibmerge::models::{FieldSelection, FieldSpec, SourceRole};
use bibmerge::{Pipeline, PublicationStatus, RunOutcome};

const ABBREV: &str = r#"
@string{crypto = "Advances in Cryptology -- CRYPTO"}
@string{lncs = "Lecture Notes in Computer Science"}
"#;

const MAIN: &str = r#"
@InProceedings{BonehG05,
  author =       "D. Boneh and S. Gorbunov",
  title =        "A \"Secure\" Scheme",
  booktitle =    crypto # " 2005",
  series =       lncs,
  year =         2005,
}

@Article{Schwenk07,
  title =        {Analysis of {J\"org}'s Protocol},
  year =         2007,
}
"#;

async fn serve_sources(server: &MockServer, abbrev: &str, main: &str) {
    Mock::given(method("GET"))
        .and(path("/abbrev0.bib"))
        .respond_with(ResponseTemplate::new(200).set_body_string(abbrev))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crypto.bib"))
        .respond_with(ResponseTemplate::new(200).set_body_string(main))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer, dir: &Path) -> Config {
    Config {
        fields: FieldSelection::Named(FieldSpec::new(["title", "author"]).unwrap()),
        output_path: dir.join("crypto_papers.jsonl"),
        ..Config::for_testing(&server.uri())
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
}

// =============================================================================
// Success paths
// =============================================================================

#[tokio::test]
async fn test_run_writes_records_and_skips_publication() {
    let server = MockServer::start().await;
    serve_sources(&server, ABBREV, MAIN).await;
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&server, dir.path());
    let output = config.output_path.clone();
    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.outcome(), RunOutcome::Success);
    assert_eq!(report.publication, PublicationStatus::Skipped);
    assert_eq!(report.entries, 2);
    assert_eq!(report.records, 2);
    assert!(report.misses.is_empty());

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 2);

    let first = decode_line(&lines[0]).unwrap();
    assert_eq!(first.key(), "BonehG05");
    assert_eq!(first.get("title"), Some("A \"Secure\" Scheme"));
    assert_eq!(first.get("author"), Some("D. Boneh and S. Gorbunov"));

    let second = decode_line(&lines[1]).unwrap();
    assert_eq!(second.get("title"), Some("Analysis of {Jörg}'s Protocol"));
    assert_eq!(second.get("author"), Some(""));
}

#[tokio::test]
async fn test_run_all_fields_resolves_abbreviations() {
    let server = MockServer::start().await;
    serve_sources(&server, ABBREV, MAIN).await;
    let dir = tempfile::tempdir().unwrap();

    let config = Config { fields: FieldSelection::All, ..test_config(&server, dir.path()) };
    let output = config.output_path.clone();
    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.fields, ["entrytype", "author", "title", "booktitle", "series", "year"]);

    let first = decode_line(&read_lines(&output)[0]).unwrap();
    assert_eq!(first.get("entrytype"), Some("inproceedings"));
    assert_eq!(first.get("booktitle"), Some("Advances in Cryptology -- CRYPTO 2005"));
    assert_eq!(first.get("series"), Some("Lecture Notes in Computer Science"));
    assert_eq!(first.get("year"), Some("2005"));
}

#[tokio::test]
async fn test_run_reports_canonicalization_misses() {
    let server = MockServer::start().await;
    serve_sources(&server, "", r"@misc{K, title = {The \emph{best} scheme}}").await;
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&server, dir.path());
    let output = config.output_path.clone();
    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.outcome(), RunOutcome::Success);
    assert_eq!(report.misses.len(), 1);
    assert_eq!(report.misses[0].sequence, r"\emph");

    let record = decode_line(&read_lines(&output)[0]).unwrap();
    assert_eq!(record.get("title"), Some(r"The \emph{best} scheme"));
}

// =============================================================================
// Fatal failures
// =============================================================================

#[tokio::test]
async fn test_fetch_failure_aborts_without_output_or_publish() {
    let server = MockServer::start().await;
    Mock::given(path("/abbrev0.bib"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ABBREV))
        .mount(&server)
        .await;
    Mock::given(path("/crypto.bib"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let config = Config {
        dataset_id: Some("me/cryptobib".into()),
        credential: Some("hf_test".into()),
        ..test_config(&server, dir.path())
    };
    let output = config.output_path.clone();
    let err = Pipeline::new(config).unwrap().run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Fetch { role: SourceRole::Main, source: FetchError::Server { status: 503, .. } }
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_malformed_input_leaves_previous_output_untouched() {
    let server = MockServer::start().await;
    serve_sources(&server, "", "@misc{K, title = {unterminated}").await;
    let dir = tempfile::tempdir().unwrap();

    let config = test_config(&server, dir.path());
    std::fs::write(&config.output_path, "previous run\n").unwrap();
    let output = config.output_path.clone();

    let err = Pipeline::new(config).unwrap().run().await.unwrap_err();
    assert!(matches!(err, PipelineError::MalformedEntry(_)));
    assert_eq!(std::fs::read_to_string(output).unwrap(), "previous run\n");
}

#[tokio::test]
async fn test_undefined_macro_is_fatal_when_abbreviations_missing() {
    let server = MockServer::start().await;
    serve_sources(&server, "", MAIN).await;
    let dir = tempfile::tempdir().unwrap();

    let err = Pipeline::new(test_config(&server, dir.path())).unwrap().run().await.unwrap_err();
    assert!(err.to_string().contains("undefined macro 'crypto'"), "{err}");
}

#[tokio::test]
async fn test_invalid_config_fails_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config { main_url: "not a url".into(), ..Config::for_testing(&server.uri()) };
    assert!(matches!(Pipeline::new(config), Err(PipelineError::Config(_))));
}

// =============================================================================
// Publication
// =============================================================================

fn publish_config(server: &MockServer, dir: &Path) -> Config {
    Config {
        dataset_id: Some("me/cryptobib".into()),
        credential: Some("hf_test_token".into()),
        ..test_config(server, dir)
    }
}

#[tokio::test]
async fn test_publish_commits_file_with_bearer_token() {
    let server = MockServer::start().await;
    serve_sources(&server, ABBREV, MAIN).await;
    Mock::given(method("POST"))
        .and(path("/api/datasets/me/cryptobib/commit/main"))
        .and(header("authorization", "Bearer hf_test_token"))
        .and(header("content-type", "application/x-ndjson"))
        .and(body_string_contains(r#""path":"crypto_papers.jsonl""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "commitUrl": "https://hub.example/datasets/me/cryptobib/commit/abc123",
            "commitOid": "abc123"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let report = Pipeline::new(publish_config(&server, dir.path())).unwrap().run().await.unwrap();

    assert_eq!(report.outcome(), RunOutcome::Success);
    assert_eq!(
        report.publication,
        PublicationStatus::Published {
            commit_url: "https://hub.example/datasets/me/cryptobib/commit/abc123".into()
        }
    );
}

#[tokio::test]
async fn test_publish_uploads_emitted_bytes() {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let server = MockServer::start().await;
    serve_sources(&server, ABBREV, MAIN).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"commitUrl": "u"})))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let config = publish_config(&server, dir.path());
    let output = config.output_path.clone();
    Pipeline::new(config).unwrap().run().await.unwrap();

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let commit = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
    let body = String::from_utf8(commit.body.clone()).unwrap();
    let file_line: serde_json::Value = serde_json::from_str(body.lines().nth(1).unwrap()).unwrap();
    let uploaded = STANDARD.decode(file_line["value"]["content"].as_str().unwrap()).unwrap();

    assert_eq!(uploaded, std::fs::read(output).unwrap());
}

#[tokio::test]
async fn test_publish_failure_is_partial_success() {
    let server = MockServer::start().await;
    serve_sources(&server, ABBREV, MAIN).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid credentials"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let config = publish_config(&server, dir.path());
    let output = config.output_path.clone();
    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.outcome(), RunOutcome::PartialSuccess);
    assert_eq!(report.outcome().exit_code(), 2);
    match &report.publication {
        PublicationStatus::Failed { reason } => assert!(reason.contains("401"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }

    // Local artifact is still complete and valid.
    let lines = read_lines(&output);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| decode_line(l).is_ok()));
}

#[tokio::test]
async fn test_dataset_without_credential_is_skipped() {
    let server = MockServer::start().await;
    serve_sources(&server, ABBREV, MAIN).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let config =
        Config { dataset_id: Some("me/cryptobib".into()), ..test_config(&server, dir.path()) };
    let report = Pipeline::new(config).unwrap().run().await.unwrap();
    assert_eq!(report.publication, PublicationStatus::Skipped);
}
