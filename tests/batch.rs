//! Batch orchestration tests with stub pipeline stages.
//!
//! No network and no pdfium: the rasteriser and extractor are replaced by
//! in-process stand-ins keyed on the file name.

use fintracks::pipeline::encode::encode_raw;
use fintracks::{
    extract_stream, run_batch, BatchProgressCallback, EncodedImage, ExtractionConfig, Extractor,
    FileError, FileStatus, FintracksError, Rasterizer, StatementFile,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const HEADER: &str = "Date,Description,Amount,Category,Notes";

/// Route library logs to the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Images pass as one payload per file; names starting with `corrupt`
/// fail to rasterise.
struct StubRasterizer;

impl Rasterizer for StubRasterizer {
    fn rasterize<'a>(
        &'a self,
        file: &'a StatementFile,
    ) -> BoxFuture<'a, Result<Vec<EncodedImage>, FileError>> {
        Box::pin(async move {
            if file.name.starts_with("corrupt") {
                return Err(FileError::RasterisationFailed {
                    name: file.name.clone(),
                    detail: "bad xref table".into(),
                });
            }
            match file.media_type.as_str() {
                "application/pdf" => Ok(vec![
                    encode_raw(b"page-1", "image/jpeg"),
                    encode_raw(b"page-2", "image/jpeg"),
                ]),
                m if m.starts_with("image/") => Ok(vec![encode_raw(&file.bytes, m)]),
                _ => Ok(Vec::new()),
            }
        })
    }
}

/// Canned responses per file name; unknown names fail as a service error.
#[derive(Default)]
struct StubExtractor {
    responses: HashMap<String, String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StubExtractor {
    fn with(mut self, name: &str, body: &str) -> Self {
        self.responses.insert(name.to_string(), body.to_string());
        self
    }

    fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Extractor for StubExtractor {
    fn extract<'a>(
        &'a self,
        name: &'a str,
        images: &'a [EncodedImage],
    ) -> BoxFuture<'a, Result<String, FileError>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), images.len()));
            self.responses
                .get(name)
                .cloned()
                .ok_or_else(|| FileError::ServiceFailed {
                    name: name.to_string(),
                    retries: 0,
                    detail: "503 Service Unavailable".into(),
                })
        })
    }
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<(usize, usize)>>,
    started: Mutex<Vec<String>>,
    errors: Mutex<Vec<usize>>,
    completed: Mutex<Option<(usize, usize)>>,
}

impl BatchProgressCallback for Recorder {
    fn on_file_start(&self, _index: usize, _total: usize, name: &str) {
        self.started.lock().unwrap().push(name.to_string());
    }

    fn on_progress(&self, completed: usize, total: usize) {
        self.progress.lock().unwrap().push((completed, total));
    }

    fn on_file_error(&self, index: usize, _total: usize, _error: &str) {
        self.errors.lock().unwrap().push(index);
    }

    fn on_batch_complete(&self, total_files: usize, records: usize) {
        *self.completed.lock().unwrap() = Some((total_files, records));
    }
}

fn image(name: &str) -> StatementFile {
    StatementFile::from_bytes(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

fn pdf(name: &str) -> StatementFile {
    StatementFile::from_bytes(name, "application/pdf", b"%PDF-1.7".to_vec())
}

fn other(name: &str) -> StatementFile {
    StatementFile::from_bytes(name, "text/plain", b"hello".to_vec())
}

fn config_with(recorder: Arc<Recorder>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .progress_callback(recorder)
        .build()
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_whatever_the_outcome() {
    init_tracing();
    let files = vec![
        image("ok.png"),
        pdf("corrupt.pdf"),
        other("notes.txt"),
        image("garbled.png"),
        pdf("march.pdf"),
    ];
    let extractor = StubExtractor::default()
        .with("ok.png", &format!("{HEADER}\n2024-01-01,Coffee,-3.00,Dining,"))
        .with("garbled.png", "Sorry, I cannot read this image.")
        .with("march.pdf", &format!("{HEADER}\n2024-03-01,Salary,2500,Income,"));
    let recorder = Arc::new(Recorder::default());

    let output = run_batch(&files, &StubRasterizer, &extractor, &config_with(recorder.clone()))
        .await
        .unwrap();

    let progress = recorder.progress.lock().unwrap().clone();
    assert_eq!(progress, (1..=5).map(|i| (i, 5)).collect::<Vec<_>>());
    assert_eq!(*recorder.errors.lock().unwrap(), vec![2]);
    assert_eq!(*recorder.completed.lock().unwrap(), Some((5, 2)));
    assert_eq!(
        *recorder.started.lock().unwrap(),
        vec!["ok.png", "corrupt.pdf", "notes.txt", "garbled.png", "march.pdf"]
    );

    let statuses: Vec<FileStatus> = output.files.iter().map(|f| f.status).collect();
    assert_eq!(
        statuses,
        vec![
            FileStatus::Extracted,
            FileStatus::Failed,
            FileStatus::Unsupported,
            FileStatus::NoRecords,
            FileStatus::Extracted,
        ]
    );
    assert_eq!(output.stats.total_files, 5);
    assert_eq!(output.stats.extracted_files, 2);
    assert_eq!(output.stats.failed_files, 1);
    assert_eq!(output.stats.unsupported_files, 1);
    assert_eq!(output.stats.empty_files, 1);
    assert_eq!(output.stats.total_records, 2);
}

#[tokio::test]
async fn one_corrupt_file_does_not_block_the_others() {
    init_tracing();
    let files = vec![pdf("corrupt-jan.pdf"), image("feb.png")];
    let extractor = StubExtractor::default().with(
        "feb.png",
        &format!("{HEADER}\n2024-02-01,\"Rent \"\"Feb\"\"\",-1200,Rent,\n2024-02-03,Bus,-2.75,Transport,"),
    );

    let output = run_batch(&files, &StubRasterizer, &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(output.transactions.len(), 2);
    assert_eq!(output.transactions[0].description, "Rent \"Feb\"");
    assert!(matches!(
        output.files[0].error,
        Some(FileError::RasterisationFailed { .. })
    ));
    assert_eq!(extractor.calls(), vec![("feb.png".to_string(), 1)]);
}

#[tokio::test]
async fn nothing_usable_anywhere_is_an_empty_extraction() {
    init_tracing();
    let files = vec![pdf("corrupt.pdf"), image("unreachable.png"), other("a.docx")];
    let extractor = StubExtractor::default();

    let err = run_batch(&files, &StubRasterizer, &extractor, &ExtractionConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FintracksError::EmptyExtraction { files: 3 }));
}

#[tokio::test]
async fn empty_submission_is_not_an_error() {
    let recorder = Arc::new(Recorder::default());
    let output = run_batch(&[], &StubRasterizer, &StubExtractor::default(), &config_with(recorder.clone()))
        .await
        .unwrap();

    assert!(output.transactions.is_empty());
    assert!(output.files.is_empty());
    assert!(recorder.progress.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_files_never_reach_the_extractor() {
    let files = vec![other("ledger.xlsx"), image("ok.png")];
    let extractor =
        StubExtractor::default().with("ok.png", &format!("{HEADER}\n2024-01-01,Tea,-2,Dining,"));

    run_batch(&files, &StubRasterizer, &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), vec![("ok.png".to_string(), 1)]);
}

#[tokio::test]
async fn whole_document_goes_in_one_request() {
    let files = vec![pdf("statement.pdf")];
    let extractor = StubExtractor::default()
        .with("statement.pdf", &format!("{HEADER}\n2024-01-01,Gym,-30,Subscription,"));

    let output = run_batch(&files, &StubRasterizer, &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), vec![("statement.pdf".to_string(), 2)]);
    assert_eq!(output.files[0].page_images, 2);
}

#[tokio::test]
async fn records_follow_submission_then_row_order() {
    let files = vec![image("a.png"), image("b.png")];
    let extractor = StubExtractor::default()
        .with("a.png", &format!("{HEADER}\n2024-01-02,A1,-1,,\n2024-01-01,A2,-2,,"))
        .with("b.png", &format!("{HEADER}\n2023-12-31,B1,3,,"));

    let output = run_batch(&files, &StubRasterizer, &extractor, &ExtractionConfig::default())
        .await
        .unwrap();

    let descs: Vec<&str> = output
        .transactions
        .iter()
        .map(|t| t.description.as_str())
        .collect();
    assert_eq!(descs, vec!["A1", "A2", "B1"]);
    assert!(output.transactions.iter().all(|t| t.category == "Other"));
}

#[tokio::test]
async fn stream_yields_each_file_in_order() {
    let files = vec![image("a.png"), pdf("corrupt.pdf"), image("c.png")];
    let extractor = StubExtractor::default()
        .with("a.png", &format!("{HEADER}\n2024-01-01,A,-1,,"))
        .with("c.png", &format!("{HEADER}\n2024-01-03,C,-3,,"));
    let recorder = Arc::new(Recorder::default());

    let results: Vec<_> = extract_stream(
        files,
        Arc::new(StubRasterizer),
        Arc::new(extractor),
        &config_with(recorder.clone()),
    )
    .collect()
    .await;

    let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(results[1].status, FileStatus::Failed);
    assert_eq!(results[2].records[0].description, "C");
    assert_eq!(
        *recorder.progress.lock().unwrap(),
        vec![(1, 3), (2, 3), (3, 3)]
    );
}
