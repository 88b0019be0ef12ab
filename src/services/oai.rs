// src/services/oai.rs

//! OAI-PMH harvest client.
//!
//! Speaks the paginated `ListRecords` protocol: one initial request per date
//! window, then continuation requests carrying only the resumption token
//! until the server stops returning one. The token is opaque and single-use;
//! it is never mixed with the original date-range parameters.
//!
//! Each page request retries transient failures (transport errors, non-2xx
//! statuses, malformed XML) with exponential backoff before the whole window
//! is reported failed.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ArxivRecord, Config, RetryConfig};
use crate::utils::{ident, time};

/// Client for one OAI-PMH endpoint.
pub struct OaiClient {
    http: Client,
    endpoint: Url,
    metadata_prefix: String,
    page_delay: Duration,
    retry: RetryConfig,
}

impl OaiClient {
    /// Create a client from the harvester configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.oai.user_agent)
            .timeout(Duration::from_secs(config.oai.timeout_secs))
            .build()?;
        let endpoint = Url::parse(&config.oai.endpoint)?;

        Ok(Self {
            http,
            endpoint,
            metadata_prefix: config.oai.metadata_prefix.clone(),
            page_delay: Duration::from_millis(config.oai.request_delay_ms),
            retry: config.retry.clone(),
        })
    }

    /// Begin a lazy record stream for one harvest window of a set.
    ///
    /// The stream is finite and not restartable mid-flight; a fresh call
    /// re-issues the initial request.
    pub fn list_records(
        &self,
        from: NaiveDate,
        until: NaiveDate,
        set_spec: &str,
    ) -> RecordStream<'_> {
        RecordStream {
            client: self,
            from,
            until,
            set_spec: set_spec.to_string(),
            token: None,
            started: false,
            done: false,
            buffer: VecDeque::new(),
        }
    }

    fn page_url(&self, query: &PageQuery) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.append_pair("verb", "ListRecords");
            match query {
                PageQuery::Initial { from, until, set } => {
                    pairs.append_pair("metadataPrefix", &self.metadata_prefix);
                    pairs.append_pair("set", set);
                    pairs.append_pair("from", &time::canonical_date(*from));
                    pairs.append_pair("until", &time::canonical_date(*until));
                }
                PageQuery::Continuation { token } => {
                    pairs.append_pair("resumptionToken", token);
                }
            }
        }
        url
    }

    /// Fetch one protocol page, retrying transient failures with backoff.
    async fn fetch_page(&self, query: &PageQuery, window: &str) -> Result<OaiEnvelope> {
        let url = self.page_url(query);
        let mut attempt: u32 = 0;
        loop {
            match self.try_fetch(url.clone()).await {
                Ok(envelope) => return Ok(envelope),
                Err(error) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    log::warn!("OAI request for {window} failed (attempt {attempt}): {error}");
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Err(error) => {
                    return Err(AppError::harvest(window, attempt + 1, error));
                }
            }
        }
    }

    async fn try_fetch(&self, url: Url) -> Result<OaiEnvelope> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(quick_xml::de::from_str(&body)?)
    }

    /// Backoff delay for the given attempt: `backoff_base ^ attempt`, capped
    /// at `backoff_max`, floored at half a second, optionally jittered ±10%.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let mut delay = self
            .retry
            .backoff_base
            .powi(attempt as i32)
            .min(self.retry.backoff_max);
        if self.retry.jitter {
            delay *= 1.0 + 0.1 * (2.0 * fastrand::f64() - 1.0);
        }
        Duration::from_secs_f64(delay.max(0.5))
    }
}

/// Lazy, page-buffered record sequence for a single window.
///
/// At most one page of records is held in memory; the next page is fetched
/// only once the current one is drained.
pub struct RecordStream<'a> {
    client: &'a OaiClient,
    from: NaiveDate,
    until: NaiveDate,
    set_spec: String,
    token: Option<String>,
    started: bool,
    done: bool,
    buffer: VecDeque<ArxivRecord>,
}

impl RecordStream<'_> {
    /// Pull the next record.
    ///
    /// `Some(Err(_))` means the current page exhausted its retries; the
    /// stream is finished after that.
    pub async fn next_record(&mut self) -> Option<Result<ArxivRecord>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if let Err(error) = self.fetch_next_page().await {
                self.done = true;
                return Some(Err(error));
            }
        }
    }

    fn window_label(&self) -> String {
        format!("{}..{}", self.from, self.until)
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        let query = match &self.token {
            Some(token) => PageQuery::Continuation {
                token: token.clone(),
            },
            None => PageQuery::Initial {
                from: self.from,
                until: self.until,
                set: self.set_spec.clone(),
            },
        };

        if self.started && !self.client.page_delay.is_zero() {
            tokio::time::sleep(self.client.page_delay).await;
        }
        let window = self.window_label();
        let envelope = self.client.fetch_page(&query, &window).await?;
        self.started = true;

        let Some(list) = envelope.list_records else {
            // `noRecordsMatch` and friends: an empty window, not a failure.
            if let Some(error) = envelope.error {
                log::info!(
                    "OAI returned {} for window {window}: {}",
                    error.code.as_deref().unwrap_or("error"),
                    error.message.as_deref().unwrap_or("")
                );
            }
            self.done = true;
            return Ok(());
        };

        for record in list.records {
            if let Some(parsed) = parse_record(record) {
                self.buffer.push_back(parsed);
            }
        }

        self.token = list
            .resumption_token
            .and_then(|t| t.value)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if self.token.is_none() {
            self.done = true;
        }
        Ok(())
    }
}

enum PageQuery {
    Initial {
        from: NaiveDate,
        until: NaiveDate,
        set: String,
    },
    Continuation {
        token: String,
    },
}

// --- Wire document ---
//
// Field names follow the protocol's element names; unknown elements and
// attributes are ignored. Struct shapes follow the envelope described in the
// OAI-PMH spec plus arXiv's `arXiv` metadata format.

#[derive(Debug, Deserialize)]
struct OaiEnvelope {
    #[serde(rename = "ListRecords")]
    list_records: Option<ListRecordsXml>,
    error: Option<OaiErrorXml>,
}

#[derive(Debug, Deserialize)]
struct OaiErrorXml {
    #[serde(rename = "@code")]
    code: Option<String>,
    #[serde(rename = "$text")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListRecordsXml {
    #[serde(rename = "record", default)]
    records: Vec<RecordXml>,
    #[serde(rename = "resumptionToken")]
    resumption_token: Option<TokenXml>,
}

#[derive(Debug, Deserialize)]
struct TokenXml {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordXml {
    header: Option<HeaderXml>,
    metadata: Option<MetadataXml>,
}

#[derive(Debug, Deserialize)]
struct HeaderXml {
    identifier: Option<String>,
    #[serde(rename = "@status")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataXml {
    #[serde(rename = "arXiv")]
    arxiv: Option<ArxivXml>,
}

#[derive(Debug, Deserialize)]
struct ArxivXml {
    id: Option<String>,
    created: Option<String>,
    updated: Option<String>,
    authors: Option<AuthorsXml>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    categories: Option<String>,
    comments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorsXml {
    #[serde(rename = "author", default)]
    authors: Vec<AuthorXml>,
}

#[derive(Debug, Deserialize)]
struct AuthorXml {
    keyname: Option<String>,
    name: Option<String>,
}

/// Parse one wire record into an [`ArxivRecord`].
///
/// Returns `None` for deleted records and records missing a usable
/// identifier; a single bad record never fails its page.
fn parse_record(record: RecordXml) -> Option<ArxivRecord> {
    let header_id = record
        .header
        .as_ref()
        .and_then(|h| h.identifier.clone())
        .unwrap_or_default();
    if record
        .header
        .as_ref()
        .and_then(|h| h.status.as_deref())
        .is_some_and(|s| s == "deleted")
    {
        log::debug!("Skipping deleted record {header_id}");
        return None;
    }

    let Some(md) = record.metadata.and_then(|m| m.arxiv) else {
        log::warn!("Record {header_id} has no arXiv metadata block; skipping");
        return None;
    };
    let Some(id) = md
        .id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    else {
        log::warn!("Record {header_id} is missing an identifier; skipping");
        return None;
    };

    let categories: Vec<String> = md
        .categories
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let primary_category = categories.first().cloned().unwrap_or_default();

    let authors = md
        .authors
        .map(|block| block.authors.iter().filter_map(author_name).collect())
        .unwrap_or_default();

    let created = md.created.as_deref().and_then(time::parse_date);
    let updated = md.updated.as_deref().and_then(time::parse_date).or(created);

    let abs_url = ident::abs_url(&id);
    let pdf_url = ident::pdf_url(&id);
    Some(ArxivRecord {
        title: collapse_whitespace(md.title.as_deref().unwrap_or("")),
        abstract_text: collapse_whitespace(md.abstract_text.as_deref().unwrap_or("")),
        authors,
        primary_category,
        categories,
        created,
        updated,
        comments: md
            .comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        abs_url,
        pdf_url,
        id,
    })
}

/// Structured keyname preferred, freeform name as fallback.
fn author_name(author: &AuthorXml) -> Option<String> {
    let keyname = author
        .keyname
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let freeform = author
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    keyname.or(freeform).map(str::to_string)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
