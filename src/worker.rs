use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{DatasetDescriptor, Decision, FailureReason, FetchOutcome};
use crate::error::MirrorError;
use crate::ledger::Ledger;
use crate::normalize::normalize;
use crate::store::Store;

pub trait PayloadClient: Send + Sync {
    fn download(&self, url: &str) -> Result<Vec<u8>, MirrorError>;
}

#[derive(Clone)]
pub struct PayloadHttpClient {
    client: Client,
}

impl PayloadHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("catalog-mirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::PayloadHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| MirrorError::PayloadHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl PayloadClient for PayloadHttpClient {
    fn download(&self, url: &str) -> Result<Vec<u8>, MirrorError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| MirrorError::PayloadHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "payload request failed".to_string());
            return Err(MirrorError::PayloadStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| MirrorError::PayloadHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Staleness check for one descriptor against the cycle's ledger snapshot.
pub fn decide(descriptor: &DatasetDescriptor, snapshot: &Ledger) -> Decision {
    let Some(url) = descriptor.download_url.as_deref() else {
        return Decision::MissingUrl;
    };
    let previous = snapshot.marker(&descriptor.id);
    match previous {
        Some(marker) if !snapshot.is_stale(&descriptor.id, &descriptor.last_modified) => {
            Decision::UpToDate {
                marker: marker.to_string(),
            }
        }
        _ => Decision::Stale {
            url: url.to_string(),
            previous: previous.map(str::to_string),
        },
    }
}

/// Processes one descriptor end to end. Every error is folded into the
/// returned outcome; nothing here can abort the cycle.
pub struct DatasetWorker<'a, P: PayloadClient> {
    client: &'a P,
    store: &'a Store,
}

impl<'a, P: PayloadClient> DatasetWorker<'a, P> {
    pub fn new(client: &'a P, store: &'a Store) -> Self {
        Self { client, store }
    }

    pub fn sync(&self, descriptor: &DatasetDescriptor, snapshot: &Ledger) -> FetchOutcome {
        let dataset_id = descriptor.id.clone();
        let title = descriptor.title.clone();

        let url = match decide(descriptor, snapshot) {
            Decision::MissingUrl => {
                return FetchOutcome::Failed {
                    dataset_id,
                    title,
                    reason: FailureReason::NoUrl,
                };
            }
            Decision::UpToDate { .. } => return FetchOutcome::Skipped { dataset_id, title },
            Decision::Stale { url, .. } => url,
        };

        tracing::info!(dataset_id = %dataset_id, %title, "downloading");
        let failed = |reason| FetchOutcome::Failed {
            dataset_id: descriptor.id.clone(),
            title: descriptor.title.clone(),
            reason,
        };

        let payload = match self.client.download(&url) {
            Ok(payload) => payload,
            Err(err) => return failed(FailureReason::FetchError(err.to_string())),
        };
        let table = match normalize_table(&payload) {
            Ok(table) => table,
            Err(detail) => return failed(FailureReason::ParseError(detail)),
        };
        match self.store.write_artifact(descriptor, &table) {
            Ok(path) => FetchOutcome::Succeeded {
                dataset_id,
                title,
                new_marker: descriptor.last_modified.clone(),
                path,
            },
            Err(err) => failed(FailureReason::WriteError(err.to_string())),
        }
    }
}

/// Re-encodes a comma-separated payload with normalized headers. Rows are
/// carried over field for field; only the header row changes. Rows shorter
/// than the header are padded with empty fields, longer ones are rejected.
pub fn normalize_table(payload: &[u8]) -> Result<Vec<u8>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload);
    let headers = reader.byte_headers().map_err(|err| err.to_string())?.clone();
    if headers.is_empty() || headers.iter().all(|field| field.is_empty()) {
        return Err("payload has no header row".to_string());
    }

    let mut writer = csv::Writer::from_writer(Vec::with_capacity(payload.len()));
    let normalized = headers
        .iter()
        .map(|field| normalize(&String::from_utf8_lossy(field)));
    writer
        .write_record(normalized)
        .map_err(|err| err.to_string())?;
    let width = headers.len();
    for record in reader.byte_records() {
        let mut record = record.map_err(|err| err.to_string())?;
        if record.len() > width {
            let line = record.position().map_or(0, |pos| pos.line());
            return Err(format!(
                "line {line} has {} fields but the header has {width}",
                record.len()
            ));
        }
        while record.len() < width {
            record.push_field(b"");
        }
        writer.write_byte_record(&record).map_err(|err| err.to_string())?;
    }
    writer.into_inner().map_err(|err| err.to_string())
}
