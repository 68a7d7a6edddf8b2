//! Observation sources.
//!
//! The monitor only needs one question answered per station and cycle:
//! "what observations does the feed have right now?" Sources answer with a
//! `FetchResult` and never panic or return `Err`; every failure, timeouts
//! included, becomes `FetchResult::FetchError`.

pub mod aviationweather;

use crate::model::FetchResult;

pub trait ObservationSource: Send + Sync {
    fn fetch(&self, station_id: &str) -> FetchResult;

    /// Where `fetch` looks for this station, for inclusion in alerts.
    fn source_url(&self, _station_id: &str) -> Option<String> {
        None
    }
}
