//! Parallel chunk processing for oversized documents and document batches
//!
//! Oversized documents are cut into windows that are chunked independently on the blocking
//! pool. Each chunk is relabelled to `window_index * LARGE_OFFSET + local_index`, so a stable
//! sort by ordinal restores document order whatever order the workers finish in.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::ingestion::chunker::helpers::advance_chars;
use crate::domain::ingestion::{Chunk, LARGE_OFFSET, LargeDocumentOutcome, WindowFailure};
use crate::domain::DomainError;

use super::parser::code_fence_ranges;

/// Default forward adjustment allowed when placing a window end
pub const DEFAULT_WINDOW_ADJUST_LIMIT: usize = 200;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '…'];
const CJK_TERMINATORS: &[char] = &['。', '！', '？'];

/// Chunks one window: `(window_text, window_index) -> chunks with local ordinals`
pub type WindowWorker = Arc<dyn Fn(&str, usize) -> Result<Vec<Chunk>, DomainError> + Send + Sync>;

/// Cooperative cancellation shared between a caller and a running operation
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A contiguous byte range of the source text assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Split `text` into windows of roughly `unit_size` characters
///
/// Each end is moved forward by at most `adjust_limit` characters onto a paragraph gap,
/// sentence end, newline or whitespace, in that order of preference. A window never ends
/// inside a fenced code block: the end moves back to the fence start, or past the fence
/// when the window would otherwise be empty.
pub fn split_windows(text: &str, unit_size: usize, adjust_limit: usize) -> Vec<Window> {
    let unit_size = unit_size.max(1);
    let fences = code_fence_ranges(text);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let nominal = advance_chars(text, start, unit_size);
        let end = if nominal >= text.len() {
            text.len()
        } else {
            let adjusted = adjust_window_end(text, nominal, adjust_limit);
            avoid_fences(&fences, start, adjusted)
        };

        windows.push(Window {
            index: windows.len(),
            start,
            end,
        });
        start = end;
    }

    windows
}

fn adjust_window_end(text: &str, nominal: usize, adjust_limit: usize) -> usize {
    let limit = advance_chars(text, nominal, adjust_limit);
    let region = &text[nominal..limit];

    if let Some(i) = region.find("\n\n") {
        return nominal + i + 2;
    }

    let mut chars = region.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let after = nominal + i + c.len_utf8();
        if CJK_TERMINATORS.contains(&c) {
            return after;
        }
        if SENTENCE_TERMINATORS.contains(&c) {
            let followed_by_space = match chars.peek() {
                Some((_, next)) => next.is_whitespace(),
                None => text[after..].starts_with(char::is_whitespace),
            };
            if followed_by_space {
                return after;
            }
        }
    }

    if let Some(i) = region.find('\n') {
        return nominal + i + 1;
    }

    region
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| nominal + i + c.len_utf8())
        .unwrap_or(nominal)
}

fn avoid_fences(fences: &[(usize, usize)], start: usize, end: usize) -> usize {
    match fences.iter().find(|(fs, fe)| *fs < end && end < *fe) {
        Some((fs, _)) if *fs > start => *fs,
        Some((_, fe)) => *fe,
        None => end,
    }
}

/// Runs window and batch work with bounded concurrency
#[derive(Debug, Clone)]
pub struct ParallelChunkProcessor {
    worker_pool_size: usize,
    batch_concurrency: usize,
    window_adjust_limit: usize,
}

impl Default for ParallelChunkProcessor {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(workers)
    }
}

impl ParallelChunkProcessor {
    pub fn new(worker_pool_size: usize) -> Self {
        let worker_pool_size = worker_pool_size.max(1);
        Self {
            worker_pool_size,
            batch_concurrency: worker_pool_size,
            window_adjust_limit: DEFAULT_WINDOW_ADJUST_LIMIT,
        }
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_window_adjust_limit(mut self, limit: usize) -> Self {
        self.window_adjust_limit = limit;
        self
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size
    }

    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    /// Chunk an oversized document window by window
    ///
    /// A failing or panicking window is logged and listed in `failed_windows`; its chunks
    /// are missing from the result. Cancellation is checked before each dispatch; windows
    /// already running are drained before `Cancelled` is returned.
    pub async fn process_large(
        &self,
        text: &str,
        unit_size: usize,
        worker: WindowWorker,
        cancel: &CancellationFlag,
    ) -> Result<LargeDocumentOutcome, DomainError> {
        let windows = split_windows(text, unit_size, self.window_adjust_limit);
        let windows_total = windows.len();
        debug!(
            windows = windows_total,
            unit_size,
            workers = self.worker_pool_size,
            "Dispatching document windows"
        );

        let source: Arc<str> = Arc::from(text);
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;

        for window in windows {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DomainError::internal(format!("Worker pool closed: {}", e)))?;

            if cancel.is_cancelled() {
                break;
            }
            dispatched += 1;

            let source = Arc::clone(&source);
            let worker = Arc::clone(&worker);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = catch_unwind(AssertUnwindSafe(|| {
                    worker(window.text(&source), window.index)
                }));
                (window, result)
            });
        }

        let mut chunks = Vec::new();
        let mut failed_windows = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (window, result) = joined
                .map_err(|e| DomainError::internal(format!("Window task aborted: {}", e)))?;

            let message = match result {
                Ok(Ok(local)) => {
                    chunks.extend(local.into_iter().enumerate().map(|(local_index, chunk)| {
                        let ordinal = window.index as u64 * LARGE_OFFSET + local_index as u64;
                        chunk.relabelled(ordinal, window.index, window.start)
                    }));
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("worker panicked: {}", panic_message(payload.as_ref())),
            };

            warn!(window_index = window.index, error = %message, "Window processing failed");
            counter!("parallel_windows_failed_total").increment(1);
            failed_windows.push(WindowFailure {
                window_index: window.index,
                message,
            });
        }

        if dispatched < windows_total {
            return Err(DomainError::cancelled(format!(
                "Document processing cancelled after {} of {} windows",
                dispatched, windows_total
            )));
        }

        chunks.sort_by_key(|c| c.ordinal_index);
        failed_windows.sort_by_key(|f| f.window_index);

        Ok(LargeDocumentOutcome {
            chunks,
            windows_total,
            failed_windows,
        })
    }

    /// Run `worker` over every document with bounded concurrency
    ///
    /// Result `i` belongs to `documents[i]`. A failed or panicking document yields an
    /// `Err` in its slot and never cancels its siblings.
    pub async fn process_batch<D, T, F, Fut>(
        &self,
        documents: Vec<D>,
        worker: F,
        max_concurrency: Option<usize>,
    ) -> Vec<Result<T, DomainError>>
    where
        D: Send + 'static,
        T: Send + 'static,
        F: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DomainError>> + Send + 'static,
    {
        let concurrency = max_concurrency.unwrap_or(self.batch_concurrency).max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let worker = Arc::new(worker);

        let handles: Vec<_> = documents
            .into_iter()
            .map(|document| {
                let semaphore = Arc::clone(&semaphore);
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| DomainError::internal(format!("Batch pool closed: {}", e)))?;
                    worker(document).await
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let mut results = Vec::with_capacity(joined.len());
        for (index, joined) in joined.into_iter().enumerate() {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(DomainError::internal(format!(
                    "Document {} panicked: {}",
                    index,
                    panic_message(e.into_panic().as_ref())
                ))),
                Err(e) => Err(DomainError::internal(format!(
                    "Document {} task failed: {}",
                    index, e
                ))),
            };

            if let Err(e) = &result {
                warn!(document_index = index, error = %e, "Batch document failed");
            }
            results.push(result);
        }

        results
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
