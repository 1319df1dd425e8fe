use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::error::{FetchError, InvalidRequest};

pub const DEFAULT_MAX_BYTES: usize = 100 * 1024 * 1024;
pub const DEFAULT_FETCH_RETRIES: u32 = 3;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Fetch contract
// ---------------------------------------------------------------------------

/// One page fetch. Construct through [`FetchRequest::new`] so the invariants hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: Url,
    max_bytes: usize,
    retries: u32,
    timeout: Duration,
}

impl FetchRequest {
    pub fn new(
        url: &str,
        max_bytes: usize,
        retries: u32,
        timeout: Duration,
    ) -> Result<Self, InvalidRequest> {
        let parsed = Url::parse(url.trim()).map_err(|_| InvalidRequest::Url(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(InvalidRequest::Url(url.to_string()));
        }
        if max_bytes == 0 {
            return Err(InvalidRequest::ZeroMaxBytes);
        }
        if retries == 0 {
            return Err(InvalidRequest::ZeroRetries);
        }
        Ok(Self {
            url: parsed,
            max_bytes,
            retries,
            timeout,
        })
    }

    /// Request with the stock limits (100 MiB, 3 attempts, 20s page load).
    pub fn with_defaults(url: &str) -> Result<Self, InvalidRequest> {
        Self::new(
            url,
            DEFAULT_MAX_BYTES,
            DEFAULT_FETCH_RETRIES,
            DEFAULT_FETCH_TIMEOUT,
        )
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Bound on the navigation itself.
    pub fn page_load_timeout(&self) -> Duration {
        self.timeout
    }

    /// Bound on the `<body>` presence wait. Twice the page-load timeout so
    /// client-side rendering has room after navigation returns.
    pub fn readiness_timeout(&self) -> Duration {
        self.timeout.saturating_mul(2)
    }
}

/// Normalized page text. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedPage {
    pub url: String,
    pub text: String,
    /// `true` when the normalized text exceeded `max_bytes` and was cut.
    pub truncated: bool,
    pub attempts: u32,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch {url} after {attempts_made} attempt(s): {last_error}")]
pub struct FetchFailure {
    pub url: String,
    pub attempts_made: u32,
    pub last_error: FetchError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success(FetchedPage),
    Failure(FetchFailure),
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }

    pub fn into_result(self) -> Result<FetchedPage, FetchFailure> {
        match self {
            FetchResult::Success(page) => Ok(page),
            FetchResult::Failure(failure) => Err(failure),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured extraction
// ---------------------------------------------------------------------------

/// Field names the extraction prompt asks the model for.
pub const RECOGNIZED_FIELDS: &[&str] = &[
    "title",
    "summary",
    "main_content_type",
    "author",
    "publication_date",
    "product_name",
    "price",
    "currency",
    "availability",
    "rating",
    "number_of_reviews",
    "key_details",
];

/// The model's JSON object after normalization.
///
/// `null` and blank-string values are removed on construction, so a field is
/// either present with real content or absent. Keys outside
/// [`RECOGNIZED_FIELDS`] are kept as the model sent them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StructuredExtraction(Map<String, Value>);

impl StructuredExtraction {
    /// Returns `None` when nothing survives normalization.
    pub fn from_object(object: Map<String, Value>) -> Option<Self> {
        let fields: Map<String, Value> = object
            .into_iter()
            .filter_map(|(key, value)| normalize_value(value).map(|v| (key, v)))
            .collect();

        if fields.is_empty() {
            None
        } else {
            Some(Self(fields))
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Keys the model returned that are not part of the prompt's schema.
    pub fn extra_fields(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !RECOGNIZED_FIELDS.contains(k))
            .collect()
    }

    /// String view of a scalar field. Numbers and booleans are rendered.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<String> {
        self.text("title")
    }

    pub fn summary(&self) -> Option<String> {
        self.text("summary")
    }

    pub fn main_content_type(&self) -> Option<String> {
        self.text("main_content_type")
    }

    pub fn author(&self) -> Option<String> {
        self.text("author")
    }

    pub fn publication_date(&self) -> Option<String> {
        self.text("publication_date")
    }

    pub fn product_name(&self) -> Option<String> {
        self.text("product_name")
    }

    pub fn price(&self) -> Option<String> {
        self.text("price")
    }

    pub fn currency(&self) -> Option<String> {
        self.text("currency")
    }

    pub fn availability(&self) -> Option<String> {
        self.text("availability")
    }

    pub fn rating(&self) -> Option<String> {
        self.text("rating")
    }

    /// Accepts `1250`, `"1250"` and `"1,250"`.
    pub fn number_of_reviews(&self) -> Option<u64> {
        match self.0.get("number_of_reviews")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.replace(',', "").trim().parse().ok(),
            _ => None,
        }
    }

    /// Ordered list of short facts. A bare string is treated as a one-item list.
    pub fn key_details(&self) -> Vec<&str> {
        match self.0.get("key_details") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn normalize_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items
                .into_iter()
                .filter(|v| match v {
                    Value::Null => false,
                    Value::String(s) => !s.trim().is_empty(),
                    _ => true,
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Array(kept))
            }
        }
        other => Some(other),
    }
}

// ---------------------------------------------------------------------------
// HTTP surface
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchBody {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub text: String,
    pub truncated: bool,
    pub bytes: usize,
    pub attempts: u32,
    pub fetched_at: DateTime<Utc>,
}

impl From<FetchedPage> for FetchResponse {
    fn from(page: FetchedPage) -> Self {
        Self {
            bytes: page.byte_len(),
            url: page.url,
            text: page.text,
            truncated: page.truncated,
            attempts: page.attempts,
            fetched_at: page.fetched_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractBody {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub extraction: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerBody {
    pub text: String,
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fetch_request_invariants() {
        let t = Duration::from_secs(5);
        assert!(FetchRequest::new("https://example.com/a", 10, 1, t).is_ok());
        assert_eq!(
            FetchRequest::new("ftp://example.com", 10, 1, t),
            Err(InvalidRequest::Url("ftp://example.com".into()))
        );
        assert!(matches!(
            FetchRequest::new("example.com/article", 10, 1, t),
            Err(InvalidRequest::Url(_))
        ));
        assert_eq!(
            FetchRequest::new("https://example.com", 0, 1, t),
            Err(InvalidRequest::ZeroMaxBytes)
        );
        assert_eq!(
            FetchRequest::new("https://example.com", 10, 0, t),
            Err(InvalidRequest::ZeroRetries)
        );
    }

    #[test]
    fn readiness_wait_is_longer_than_page_load() {
        let req = FetchRequest::new("http://example.com", 1, 1, Duration::from_secs(20)).unwrap();
        assert_eq!(req.page_load_timeout(), Duration::from_secs(20));
        assert_eq!(req.readiness_timeout(), Duration::from_secs(40));
    }

    #[test]
    fn extraction_drops_null_and_blank_fields() {
        let obj = json!({
            "title": "X",
            "author": null,
            "price": "  ",
            "main_content_type": "article",
            "key_details": ["a", "", null, "b"]
        });
        let ext = StructuredExtraction::from_object(obj.as_object().unwrap().clone()).unwrap();
        assert_eq!(ext.field_names(), vec!["key_details", "main_content_type", "title"]);
        assert!(!ext.contains("author"));
        assert!(!ext.contains("price"));
        assert_eq!(ext.key_details(), vec!["a", "b"]);
    }

    #[test]
    fn extraction_with_only_nulls_is_none() {
        let obj = json!({"title": null, "summary": ""});
        assert!(StructuredExtraction::from_object(obj.as_object().unwrap().clone()).is_none());
    }

    #[test]
    fn typed_accessors() {
        let obj = json!({
            "product_name": "XYZ Smartwatch Pro",
            "price": "$299.99",
            "rating": 4.7,
            "number_of_reviews": "1,250",
            "seller": "ACME"
        });
        let ext = StructuredExtraction::from_object(obj.as_object().unwrap().clone()).unwrap();
        assert_eq!(ext.product_name().as_deref(), Some("XYZ Smartwatch Pro"));
        assert_eq!(ext.rating().as_deref(), Some("4.7"));
        assert_eq!(ext.number_of_reviews(), Some(1250));
        assert_eq!(ext.extra_fields(), vec!["seller"]);
        assert!(ext.title().is_none());
    }
}
