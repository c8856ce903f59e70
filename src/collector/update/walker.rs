//! Pending update search. Runs on the apartment thread.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use super::cache::UpdateSnapshot;
use super::{PENDING_INFO, QUERY_DURATION, SCRAPE_TIMESTAMP};
use crate::collector::sample::Sample;
use crate::com::ComError;
use crate::com::traits::{ComCollection, UpdateCategory, UpdateEntry, UpdateSession};

/// Search criteria: updates that are neither installed nor hidden.
pub const SEARCH_CRITERIA: &str = "IsInstalled=0 and IsHidden=0";

/// Plain-data view of one pending update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdateRecord {
    /// Primary category name, empty when the update has no categories.
    pub category: String,
    pub severity: String,
    pub title: String,
}

impl PendingUpdateRecord {
    pub fn to_sample(&self) -> Sample {
        Sample::new(
            &PENDING_INFO,
            vec![
                self.category.clone(),
                self.severity.clone(),
                self.title.clone(),
            ],
            1.0,
        )
    }
}

/// Runs one search and turns the result into a complete snapshot.
///
/// A failing search (or result count) fails the whole cycle; an update whose
/// properties cannot be read is logged and skipped.
pub fn fetch_updates<S: UpdateSession>(session: &S) -> Result<UpdateSnapshot, ComError> {
    let started = Instant::now();
    let updates = session
        .search(SEARCH_CRITERIA)
        .map_err(|e| e.wrap("search pending updates"))?;
    let query_duration = started.elapsed();

    let count = updates
        .count()
        .map_err(|e| e.wrap("count pending updates"))?;

    let mut samples = Vec::with_capacity(count + 2);
    for index in 0..count {
        let record = updates.item(index).and_then(|update| read_update(&update));
        match record {
            Ok(record) => samples.push(record.to_sample()),
            Err(e) => warn!(index, error = %e, "skipping unreadable pending update"),
        }
    }
    let pending = samples.len();

    let scrape_timestamp = Utc::now();
    samples.push(Sample::new(
        &QUERY_DURATION,
        Vec::new(),
        query_duration.as_secs_f64(),
    ));
    samples.push(Sample::new(
        &SCRAPE_TIMESTAMP,
        Vec::new(),
        scrape_timestamp.timestamp() as f64,
    ));

    debug!(
        pending,
        duration_ms = query_duration.as_millis() as u64,
        "pending update search complete"
    );

    Ok(UpdateSnapshot {
        samples,
        pending,
        query_duration,
        scrape_timestamp,
    })
}

/// Reads one update into a plain record.
pub fn read_update<U: UpdateEntry>(update: &U) -> Result<PendingUpdateRecord, ComError> {
    let severity = update.severity()?;
    let title = update.title()?;
    let categories = update.categories()?;
    let category = primary_category(&categories)?;

    Ok(PendingUpdateRecord {
        category,
        severity,
        title,
    })
}

/// Name of the category with the strictly lowest `Order`.
///
/// The first category wins ties. No categories yields an empty name.
pub fn primary_category<C>(categories: &C) -> Result<String, ComError>
where
    C: ComCollection,
    C::Item: UpdateCategory,
{
    let mut best_order = i32::MAX;
    let mut best_name = String::new();

    for index in 0..categories.count()? {
        let category = categories.item(index)?;
        let order = category.order()?;
        if order < best_order {
            best_order = order;
            best_name = category.name()?;
        }
    }
    Ok(best_name)
}
