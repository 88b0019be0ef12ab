//! Read-side selection over stored records.
//!
//! Deduplicates, filters by keyword and category, orders, and limits. Pure
//! function of its inputs; the caller supplies records from a ranged read.

use std::collections::HashMap;

use crate::models::{ArxivRecord, OrderBy, SelectionCriteria};

/// Narrow an unordered record collection down to the requested selection.
pub fn select(records: Vec<ArxivRecord>, criteria: &SelectionCriteria) -> Vec<ArxivRecord> {
    let mut selected = dedup_latest(records);

    let include: Vec<String> = lowercased(&criteria.keywords_include);
    let exclude: Vec<String> = lowercased(&criteria.keywords_exclude);
    if !include.is_empty() || !exclude.is_empty() {
        selected.retain(|record| {
            let text = format!("{}\n{}", record.title, record.abstract_text).to_lowercase();
            let included = include.is_empty() || include.iter().any(|k| text.contains(k));
            included && !exclude.iter().any(|k| text.contains(k))
        });
    }

    if !criteria.categories.is_empty() {
        selected.retain(|record| matches_categories(record, &criteria.categories));
    }

    // Vec::sort_by is stable; ties keep their prior relative order.
    match criteria.order_by {
        OrderBy::UpdatedDesc => selected.sort_by(|a, b| b.updated.cmp(&a.updated)),
        OrderBy::CreatedDesc => selected.sort_by(|a, b| b.created.cmp(&a.created)),
    }

    if criteria.limit > 0 {
        selected.truncate(criteria.limit);
    }
    selected
}

/// Keep one record per id, preferring the largest `updated`.
///
/// Ranged reads can legitimately surface superseded duplicates of a paper
/// re-announced across partitions, so the store's dedup rule is applied
/// again here. A strictly newer instance replaces the earlier one in place;
/// ties keep the first instance seen.
fn dedup_latest(records: Vec<ArxivRecord>) -> Vec<ArxivRecord> {
    let mut slot_by_id: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<ArxivRecord> = Vec::with_capacity(records.len());
    for record in records {
        match slot_by_id.get(&record.id) {
            Some(&slot) => {
                if record.updated > out[slot].updated {
                    out[slot] = record;
                }
            }
            None => {
                slot_by_id.insert(record.id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Category allow-list check, falling back to the primary category when the
/// full category set is unavailable.
fn matches_categories(record: &ArxivRecord, allowed: &[String]) -> bool {
    if record.categories.is_empty() {
        return allowed.iter().any(|c| c == &record.primary_category);
    }
    record.categories.iter().any(|c| allowed.contains(c))
}

fn lowercased(terms: &[String]) -> Vec<String> {
    terms.iter().map(|t| t.to_lowercase()).collect()
}
