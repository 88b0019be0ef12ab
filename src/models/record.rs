//! Paper record structures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::ident;

/// A single paper as harvested from the metadata feed.
///
/// One record serializes to one line in its partition's JSONL file. Records
/// are immutable once parsed; a newer version of the same paper arrives as a
/// fresh record with a later `updated` date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArxivRecord {
    /// arXiv identifier, possibly carrying a version suffix
    pub id: String,

    /// Paper title, whitespace-collapsed
    pub title: String,

    /// Abstract text, whitespace-collapsed
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Author names in submission order
    pub authors: Vec<String>,

    /// First token of the category list
    pub primary_category: String,

    /// All categories, in feed order
    pub categories: Vec<String>,

    /// Submission date
    pub created: Option<NaiveDate>,

    /// Date of the latest version; `None` when the feed carried no usable date
    pub updated: Option<NaiveDate>,

    /// Free-text comments (page counts, venue notes)
    pub comments: Option<String>,

    /// Version-independent landing page URL
    pub abs_url: String,

    /// Version-independent PDF URL
    pub pdf_url: String,
}

/// Normalized projection handed to downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// All author names joined with ", "
    pub authors: String,
    pub first_author: String,
    pub primary_category: String,
    pub publish_date: NaiveDate,
    pub update_date: NaiveDate,
    pub comments: Option<String>,
}

impl Paper {
    /// Project a raw record into the consumer-facing shape.
    ///
    /// `fallback_date` fills in for records whose feed dates were missing:
    /// the publish date falls back to it, and the update date falls back to
    /// the publish date.
    pub fn from_record(record: &ArxivRecord, fallback_date: NaiveDate) -> Self {
        let publish_date = record.created.unwrap_or(fallback_date);
        let update_date = record.updated.unwrap_or(publish_date);
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            url: ident::abs_url(&record.id),
            abstract_text: record.abstract_text.clone(),
            authors: record.authors.join(", "),
            first_author: record.authors.first().cloned().unwrap_or_default(),
            primary_category: record.primary_category.clone(),
            publish_date,
            update_date,
            comments: record.comments.clone(),
        }
    }
}
