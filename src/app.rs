use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{CatalogClient, filter_by_theme};
use crate::domain::{DatasetDescriptor, Decision, FetchOutcome};
use crate::error::MirrorError;
use crate::ledger::{Ledger, LedgerStore};
use crate::store::Store;
use crate::worker::{DatasetWorker, PayloadClient, decide};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub theme: String,
    pub concurrency: usize,
    /// Start from an empty ledger instead of loading the persisted one.
    pub reset: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncSummary {
    fn count(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Succeeded { .. } => self.succeeded += 1,
            FetchOutcome::Skipped { .. } => self.skipped += 1,
            FetchOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub theme: String,
    pub catalog_total: usize,
    pub matched: usize,
    pub summary: SyncSummary,
    pub outcomes: Vec<FetchOutcome>,
    pub ledger_path: Utf8PathBuf,
    pub ledger_entries: usize,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub theme: String,
    pub catalog_total: usize,
    pub items: Vec<PlanItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanItem {
    pub dataset_id: String,
    pub title: String,
    pub last_modified: String,
    pub artifact: Utf8PathBuf,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    fn outcome(&self, _outcome: &FetchOutcome) {}
}

pub struct App<C: CatalogClient, P: PayloadClient> {
    store: Store,
    ledger: LedgerStore,
    catalog: C,
    payload: P,
}

impl<C: CatalogClient, P: PayloadClient> App<C, P> {
    pub fn new(store: Store, ledger: LedgerStore, catalog: C, payload: P) -> Self {
        Self {
            store,
            ledger,
            catalog,
            payload,
        }
    }

    /// Runs one full cycle: load ledger, fetch and filter the catalog, sync
    /// every matching dataset on at most `concurrency` threads, then persist
    /// the merged ledger once.
    ///
    /// Only ledger and catalog failures are returned as errors; per-dataset
    /// problems come back as [`FetchOutcome::Failed`] entries in the report.
    pub fn sync(
        &self,
        options: &SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Result<SyncReport, MirrorError> {
        if options.concurrency == 0 {
            return Err(MirrorError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let started = Instant::now();

        let snapshot = if options.reset {
            sink.event(ProgressEvent {
                message: "phase=Ledger; reset requested, starting from empty".to_string(),
                elapsed: None,
            });
            Ledger::new()
        } else {
            sink.event(ProgressEvent {
                message: format!("phase=Ledger; loading {}", self.ledger.path()),
                elapsed: None,
            });
            self.ledger.load()?
        };

        let (catalog_total, datasets) = self.matching_datasets(&options.theme, sink)?;
        tracing::info!(
            theme = %options.theme,
            catalog_total,
            matched = datasets.len(),
            "catalog filtered"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Catalog; {} of {catalog_total} datasets match theme {:?}",
                datasets.len(),
                options.theme
            ),
            elapsed: Some(started.elapsed()),
        });

        let mut updated = snapshot.clone();
        let mut summary = SyncSummary::default();
        let mut outcomes = Vec::with_capacity(datasets.len());
        self.dispatch(&datasets, &snapshot, options.concurrency, |outcome| {
            log_outcome(&outcome);
            summary.count(&outcome);
            if let FetchOutcome::Succeeded {
                dataset_id,
                new_marker,
                ..
            } = &outcome
            {
                updated.record(dataset_id.clone(), new_marker.clone());
            }
            sink.outcome(&outcome);
            outcomes.push(outcome);
        });

        self.ledger.save(&updated)?;
        tracing::info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            ledger = %self.ledger.path(),
            "sync cycle complete"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; succeeded={} skipped={} failed={}",
                summary.succeeded, summary.skipped, summary.failed
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(SyncReport {
            theme: options.theme.clone(),
            catalog_total,
            matched: datasets.len(),
            summary,
            outcomes,
            ledger_path: self.ledger.path().to_path_buf(),
            ledger_entries: updated.len(),
            finished_at: Utc::now(),
        })
    }

    /// Dry run: reports what a cycle would do for each matching dataset
    /// without downloading, writing artifacts or touching the ledger.
    pub fn plan(&self, theme: &str, sink: &dyn ProgressSink) -> Result<PlanReport, MirrorError> {
        let snapshot = self.ledger.load()?;
        let (catalog_total, datasets) = self.matching_datasets(theme, sink)?;
        let items = datasets
            .iter()
            .map(|descriptor| PlanItem {
                dataset_id: descriptor.id.clone(),
                title: descriptor.title.clone(),
                last_modified: descriptor.last_modified.clone(),
                artifact: self.store.artifact_path(descriptor),
                decision: decide(descriptor, &snapshot),
            })
            .collect();
        Ok(PlanReport {
            theme: theme.to_string(),
            catalog_total,
            items,
        })
    }

    fn matching_datasets(
        &self,
        theme: &str,
        sink: &dyn ProgressSink,
    ) -> Result<(usize, Vec<DatasetDescriptor>), MirrorError> {
        sink.event(ProgressEvent {
            message: "phase=Catalog; fetching dataset metadata".to_string(),
            elapsed: None,
        });
        let descriptors = self.catalog.fetch_catalog()?;
        let total = descriptors.len();
        Ok((total, filter_by_theme(descriptors, theme)))
    }

    /// Fans `datasets` out to a scoped pool of `concurrency` threads. Workers
    /// pull descriptors from a shared iterator and send outcomes back over a
    /// channel; `on_outcome` runs on the calling thread only, in completion
    /// order.
    fn dispatch<F>(
        &self,
        datasets: &[DatasetDescriptor],
        snapshot: &Ledger,
        concurrency: usize,
        mut on_outcome: F,
    ) where
        F: FnMut(FetchOutcome),
    {
        if datasets.is_empty() {
            return;
        }
        let workers = concurrency.min(datasets.len());
        let queue = Mutex::new(datasets.iter());
        let (tx, rx) = mpsc::channel();
        let worker = DatasetWorker::new(&self.payload, &self.store);

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                let worker = &worker;
                scope.spawn(move || {
                    loop {
                        let next = match queue.lock() {
                            Ok(mut guard) => guard.next(),
                            Err(poisoned) => poisoned.into_inner().next(),
                        };
                        let Some(descriptor) = next else {
                            break;
                        };
                        if tx.send(worker.sync(descriptor, snapshot)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                on_outcome(outcome);
            }
        });
    }
}

/// Per-dataset outcomes reach the user through the sink and the report, so the
/// log only carries them at debug level.
fn log_outcome(outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Succeeded {
            dataset_id, path, ..
        } => tracing::debug!(%dataset_id, %path, "saved processed data"),
        FetchOutcome::Skipped { dataset_id, title } => {
            tracing::debug!(%dataset_id, %title, "not modified since last run, skipping")
        }
        FetchOutcome::Failed {
            dataset_id,
            title,
            reason,
        } => tracing::debug!(%dataset_id, %title, %reason, "dataset failed"),
    }
}
