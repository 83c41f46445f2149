use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use humansize::{make_format, BINARY};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::prelude::*;
use crate::tier::Tier;

/// A single downloadable representation of a dataset.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Distribution {
    pub(crate) format: Option<String>,
    pub(crate) media_type: Option<String>,
    pub(crate) access_url: Option<String>,
    pub(crate) download_url: Option<String>,
}

impl Distribution {
    #[inline]
    pub(crate) fn tier(&self) -> Tier {
        Tier::from_fields(
            self.format.as_deref(),
            self.media_type.as_deref(),
            self.access_url.as_deref(),
            self.download_url.as_deref(),
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            format: string_field(obj, &["format"]),
            media_type: string_field(obj, &["mediaType"]),
            access_url: string_field(obj, &["accessUrl", "accessURL"]),
            download_url: string_field(
                obj,
                &["downloadUrl", "downloadURL"],
            ),
        })
    }
}

/// A normalized catalog entry.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Record {
    pub(crate) identifier: String,
    pub(crate) keywords: Vec<String>,
    pub(crate) publishers: Vec<String>,
    pub(crate) distributions: Vec<Distribution>,
    pub(crate) issued: Option<DateTime<Utc>>,
    pub(crate) modified: Option<DateTime<Utc>>,
}

impl Record {
    /// Returns the highest tier of all distributions or `None`, if
    /// the record has no distributions.
    pub(crate) fn best_tier(&self) -> Option<Tier> {
        self.distributions.iter().map(Distribution::tier).max()
    }

    /// Normalizes a raw dataset entry. Malformed fields are replaced
    /// by their empty value; entries without an identifier are
    /// rejected.
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let identifier = match obj.get("identifier")? {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let distributions = match obj.get("distribution") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Distribution::from_value)
                .collect(),
            Some(value @ Value::Object(_)) => {
                Distribution::from_value(value).into_iter().collect()
            }
            _ => vec![],
        };

        Some(Self {
            keywords: string_list(obj.get("keyword")),
            publishers: string_list(obj.get("publisher")),
            issued: date_field(obj, "issued"),
            modified: date_field(obj, "modified"),
            identifier,
            distributions,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    dataset: Vec<Value>,
}

/// The full source document.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    pub(crate) records: Vec<Record>,
}

impl Catalog {
    /// Parses a catalog document. Only a document that isn't an
    /// object with a `dataset` array is an error; malformed entries
    /// are skipped.
    pub(crate) fn from_slice(data: &[u8]) -> OgdResult<Self> {
        let raw: RawCatalog = serde_json::from_slice(data)
            .map_err(|e| OgdError::Catalog(e.to_string()))?;

        let total = raw.dataset.len();
        let records: Vec<Record> =
            raw.dataset.iter().filter_map(Record::from_value).collect();

        if records.len() < total {
            log::warn!(
                "skipped {} of {total} dataset entries without identifier",
                total - records.len()
            );
        }

        Ok(Self { records })
    }

    /// Reads a catalog document from disk.
    pub(crate) fn from_path<P: AsRef<Path>>(path: P) -> OgdResult<Self> {
        let data = fs::read(path.as_ref())?;
        log::info!("Loading metadata from {}", path.as_ref().display());
        Self::from_slice(&data)
    }

    /// Fetches the catalog document. Any network error, timeout or
    /// non-success status aborts; there are no retries.
    pub(crate) fn fetch(url: &Url, timeout: Duration) -> OgdResult<Self> {
        log::info!("Loading metadata from {url}");

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ogdmeta/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let body = client
            .get(url.clone())
            .send()?
            .error_for_status()?
            .bytes()?;

        let formatter = make_format(BINARY);
        log::debug!("received {}", formatter(body.len()));

        Self::from_slice(&body)
    }

    /// Reduces all distributions to the best tier per identifier.
    /// Identifiers without any distribution map to `None`.
    pub(crate) fn best_scores(&self) -> BTreeMap<&str, Option<Tier>> {
        let mut scores: BTreeMap<&str, Option<Tier>> = BTreeMap::new();
        for record in self.records.iter() {
            let best = record.best_tier();
            scores
                .entry(record.identifier.as_str())
                .and_modify(|score| *score = (*score).max(best))
                .or_insert(best);
        }

        scores
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => vec![],
    }
}

fn date_field(
    obj: &Map<String, Value>,
    key: &str,
) -> Option<DateTime<Utc>> {
    let value = obj.get(key)?.as_str()?;
    let date = parse_date(value);
    if date.is_none() && !value.trim().is_empty() {
        log::debug!("unable to parse {key} date '{value}'");
    }

    date
}

const DATETIME_FORMATS: [&str; 2] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

/// Parses an ISO-like date string. Values without an offset are taken
/// as UTC.
pub(crate) fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone, Timelike};

    use super::*;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2023, 4, 5, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2023-04-05"), Some(expected));
        assert_eq!(parse_date(" 05.04.2023 "), Some(expected));
        assert_eq!(parse_date("2023-04-05T00:00:00"), Some(expected));
        assert_eq!(parse_date("2023-04-05 00:00:00.000"), Some(expected));
        assert_eq!(parse_date("2023-04-05T02:00:00+02:00"), Some(expected));

        let dt = parse_date("2023-04-05T13:14:15.123Z").unwrap();
        assert_eq!((dt.year(), dt.hour(), dt.second()), (2023, 13, 15));
    }

    #[test]
    fn parse_date_invalid() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("unknown"), None);
        assert_eq!(parse_date("2023-13-45"), None);
    }

    #[test]
    fn catalog_from_slice() -> TestResult {
        let catalog = Catalog::from_slice(
            br#"{"dataset": [
                {
                    "identifier": "1@zh",
                    "keyword": ["geo", "zh"],
                    "publisher": ["Amt A"],
                    "issued": "2024-01-01",
                    "modified": "garbage",
                    "distribution": [
                        {"format": "CSV", "downloadUrl": "a.csv"},
                        {"format": 42, "mediaType": "application/json"},
                        "not an object"
                    ]
                },
                {"identifier": 7, "keyword": "single", "distribution": {}},
                {"keyword": ["orphan"]},
                42
            ]}"#,
        )?;

        assert_eq!(catalog.len(), 2);

        let record = &catalog.records[0];
        assert_eq!(record.identifier, "1@zh");
        assert_eq!(record.keywords, vec!["geo", "zh"]);
        assert_eq!(record.publishers, vec!["Amt A"]);
        assert!(record.issued.is_some());
        assert!(record.modified.is_none());
        assert_eq!(record.distributions.len(), 2);
        assert_eq!(record.distributions[1].format, None);
        assert_eq!(record.best_tier(), Some(Tier::Structured));

        let record = &catalog.records[1];
        assert_eq!(record.identifier, "7");
        assert_eq!(record.keywords, vec!["single"]);
        assert!(record.publishers.is_empty());
        assert_eq!(record.distributions.len(), 1);
        assert_eq!(record.best_tier(), Some(Tier::Delimited));

        Ok(())
    }

    #[test]
    fn catalog_from_slice_invalid() {
        assert!(matches!(
            Catalog::from_slice(b"[]"),
            Err(OgdError::Catalog(_))
        ));
        assert!(matches!(
            Catalog::from_slice(br#"{"datasets": []}"#),
            Err(OgdError::Catalog(_))
        ));
        assert!(matches!(
            Catalog::from_slice(b""),
            Err(OgdError::Catalog(_))
        ));
    }

    #[test]
    fn best_scores() {
        let dist = |format: &str| Distribution {
            format: Some(format.into()),
            ..Default::default()
        };

        let catalog = Catalog {
            records: vec![
                Record {
                    identifier: "a".into(),
                    distributions: vec![dist("csv"), dist("wms"), dist("xml")],
                    ..Default::default()
                },
                Record {
                    identifier: "b".into(),
                    ..Default::default()
                },
                Record {
                    identifier: "c".into(),
                    distributions: vec![dist("xlsx")],
                    ..Default::default()
                },
                Record {
                    identifier: "c".into(),
                    distributions: vec![dist("rdf")],
                    ..Default::default()
                },
            ],
        };

        let scores = catalog.best_scores();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores["a"], Some(Tier::Api));
        assert_eq!(scores["b"], None);
        assert_eq!(scores["c"], Some(Tier::LinkedData));
    }
}
