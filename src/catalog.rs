use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::DatasetDescriptor;
use crate::error::MirrorError;

pub const DEFAULT_CATALOG_URL: &str =
    "https://data.cms.gov/provider-data/api/1/metastore/schemas/dataset/items";

pub trait CatalogClient: Send + Sync {
    fn fetch_catalog(&self) -> Result<Vec<DatasetDescriptor>, MirrorError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    url: String,
}

impl CatalogHttpClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("catalog-mirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::CatalogUnavailable(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| MirrorError::CatalogUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch_catalog(&self) -> Result<Vec<DatasetDescriptor>, MirrorError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| MirrorError::CatalogUnavailable(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "catalog request failed".to_string());
            return Err(MirrorError::CatalogStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| MirrorError::CatalogUnavailable(err.to_string()))?;
        parse_catalog(&body)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    id: String,
    title: String,
    #[serde(rename = "lastModified")]
    last_modified: String,
    #[serde(default, alias = "theme")]
    themes: Option<ThemeField>,
    #[serde(default)]
    distribution: Option<DistributionField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThemeField {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DistributionField {
    Single(Distribution),
    Many(Vec<Distribution>),
}

#[derive(Debug, Default, Deserialize)]
struct Distribution {
    #[serde(default, rename = "downloadURL")]
    download_url: Option<String>,
}

impl From<CatalogItem> for DatasetDescriptor {
    fn from(item: CatalogItem) -> Self {
        let theme_tags = match item.themes {
            Some(ThemeField::Single(value)) => vec![value],
            Some(ThemeField::Many(values)) => values,
            None => Vec::new(),
        };
        let download_url = match item.distribution {
            Some(DistributionField::Single(dist)) => dist.download_url,
            Some(DistributionField::Many(dists)) => {
                dists.into_iter().find_map(|dist| dist.download_url)
            }
            None => None,
        }
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

        DatasetDescriptor {
            id: item.id,
            title: item.title,
            theme_tags: theme_tags
                .into_iter()
                .filter(|tag| !tag.trim().is_empty())
                .collect(),
            last_modified: item.last_modified,
            download_url,
        }
    }
}

/// Parses a metastore response body.
///
/// The body must be a JSON object; an absent `items` array is an empty
/// catalog. Items missing `id`, `title` or `lastModified` are dropped with a
/// warning rather than failing the whole catalog.
pub fn parse_catalog(body: &str) -> Result<Vec<DatasetDescriptor>, MirrorError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|err| MirrorError::CatalogUnavailable(format!("malformed catalog body: {err}")))?;
    let object = root.as_object().ok_or_else(|| {
        MirrorError::CatalogUnavailable("catalog body is not a JSON object".to_string())
    })?;
    let items = match object.get("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(MirrorError::CatalogUnavailable(
                "catalog `items` is not an array".to_string(),
            ));
        }
    };

    let mut descriptors = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match CatalogItem::deserialize(item) {
            Ok(item) => descriptors.push(item.into()),
            Err(err) => {
                tracing::warn!(index, error = %err, "dropping malformed catalog item");
            }
        }
    }
    Ok(descriptors)
}

/// Keeps descriptors whose theme tags contain `theme`, ignoring case.
/// Descriptors without tags never match. A dataset id listed twice keeps its
/// first occurrence, so every id is dispatched at most once per cycle.
pub fn filter_by_theme(descriptors: Vec<DatasetDescriptor>, theme: &str) -> Vec<DatasetDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|descriptor| descriptor.matches_theme(theme))
        .filter(|descriptor| {
            let first = seen.insert(descriptor.id.clone());
            if !first {
                tracing::warn!(
                    dataset_id = %descriptor.id,
                    "duplicate dataset id in catalog, ignoring repeat"
                );
            }
            first
        })
        .collect()
}
