//! aviationweather.gov METAR API client
//!
//! Retrieves recent METAR observations for a single station from the
//! Aviation Weather Center data API and turns the answer into a
//! `FetchResult`.
//!
//! API Documentation: https://aviationweather.gov/data/api/
//! Example: https://aviationweather.gov/api/data/metar?ids=KJWY&format=json&hours=2.5

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::ingest::ObservationSource;
use crate::logging;
use crate::model::{normalize_station_id, FetchResult, Observation};

// ============================================================================
// API Response Structures
// ============================================================================

/// One METAR entry of the JSON response. Only the fields the monitor needs
/// are deserialized; the rest of the record is ignored.
#[derive(Debug, Deserialize)]
pub struct MetarEntry {
    #[serde(rename = "icaoId")]
    pub icao_id: Option<String>,
    /// Observation time, Unix seconds.
    #[serde(rename = "obsTime")]
    pub obs_time: Option<i64>,
    /// Report time, ISO 8601. Used when `obsTime` is missing.
    #[serde(rename = "reportTime")]
    pub report_time: Option<String>,
    #[serde(rename = "rawOb")]
    pub raw_ob: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

pub struct AviationWeatherSource {
    client: reqwest::blocking::Client,
    base_url: String,
    lookback_hours: f64,
    timeout: Duration,
}

impl AviationWeatherSource {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, lookback_hours: f64, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metar_monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(AviationWeatherSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lookback_hours,
            timeout,
        })
    }

    pub fn build_url(&self, station_id: &str) -> String {
        build_url(&self.base_url, station_id, self.lookback_hours)
    }

    fn try_fetch(&self, station_id: &str) -> Result<FetchResult, String> {
        let url = self.build_url(station_id);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| describe_request_error(&e, self.timeout))?;

        // The API answers 204 when it has nothing for the requested ids.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(FetchResult::Empty);
        }
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }

        let body = response
            .text()
            .map_err(|e| describe_request_error(&e, self.timeout))?;
        let observations = parse_metar_json(&body, station_id)?;
        Ok(FetchResult::from_observations(observations))
    }
}

impl ObservationSource for AviationWeatherSource {
    fn fetch(&self, station_id: &str) -> FetchResult {
        match self.try_fetch(station_id) {
            Ok(result) => result,
            Err(reason) => {
                logging::log_fetch_failure(station_id, &reason);
                FetchResult::FetchError(reason)
            }
        }
    }

    fn source_url(&self, station_id: &str) -> Option<String> {
        Some(self.build_url(station_id))
    }
}

/// Builds the request URL for one station.
pub fn build_url(base_url: &str, station_id: &str, lookback_hours: f64) -> String {
    format!(
        "{}?ids={}&format=json&hours={}",
        base_url,
        normalize_station_id(station_id),
        lookback_hours
    )
}

fn describe_request_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timeout after {}s", timeout.as_secs())
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("request failed: {}", err)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses the JSON body into observations for `station_id`.
///
/// Entries for other stations, or without a usable time, are skipped. An
/// empty body or empty array yields an empty list; malformed JSON is an
/// error.
pub fn parse_metar_json(body: &str, station_id: &str) -> Result<Vec<Observation>, String> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<MetarEntry> = serde_json::from_str(body).map_err(|e| format!("Parse error: {}", e))?;
    let wanted = normalize_station_id(station_id);

    let observations = entries
        .into_iter()
        .filter_map(|entry| {
            let id = normalize_station_id(entry.icao_id.as_deref()?);
            if id != wanted {
                return None;
            }
            let observation_time = entry_time(&entry)?;
            Some(Observation {
                station_id: id,
                observation_time,
                raw_text: entry.raw_ob.unwrap_or_default(),
            })
        })
        .collect();
    Ok(observations)
}

fn entry_time(entry: &MetarEntry) -> Option<DateTime<Utc>> {
    if let Some(secs) = entry.obs_time {
        return DateTime::from_timestamp(secs, 0);
    }
    let raw = entry.report_time.as_deref()?;
    DateTime::parse_from_rfc3339(&raw.replace(' ', "T"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"[
        {"icaoId":"KJWY","obsTime":1771581300,"reportTime":"2026-02-20T09:55:00.000Z",
         "rawOb":"METAR KJWY 200955Z AUTO 18009KT 10SM CLR 08/M03 A3012"},
        {"icaoId":"KJWY","reportTime":"2026-02-20T08:55:00Z",
         "rawOb":"METAR KJWY 200855Z AUTO 18007KT 10SM CLR 07/M03 A3013"},
        {"icaoId":"KPIA","obsTime":1771581300,"rawOb":"METAR KPIA 200955Z 27010KT 10SM"},
        {"icaoId":"KJWY","rawOb":"no time at all"}
    ]"#;

    #[test]
    fn test_build_url_includes_station_and_lookback() {
        let url = build_url("https://aviationweather.gov/api/data/metar", "kjwy", 2.5);
        assert_eq!(url, "https://aviationweather.gov/api/data/metar?ids=KJWY&format=json&hours=2.5");
    }

    #[test]
    fn test_source_url_is_the_request_url() {
        let source =
            AviationWeatherSource::new("https://aviationweather.gov/api/data/metar/", 2.5, Duration::from_secs(5))
                .expect("client should build");
        assert_eq!(
            source.source_url("kpia").as_deref(),
            Some("https://aviationweather.gov/api/data/metar?ids=KPIA&format=json&hours=2.5")
        );
    }

    #[test]
    fn test_parse_keeps_only_requested_station_with_times() {
        let observations = parse_metar_json(SAMPLE, "KJWY").expect("sample should parse");
        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|o| o.station_id == "KJWY"));
        assert_eq!(
            observations[0].observation_time,
            Utc.with_ymd_and_hms(2026, 2, 20, 9, 55, 0).unwrap()
        );
        assert_eq!(
            observations[1].observation_time,
            Utc.with_ymd_and_hms(2026, 2, 20, 8, 55, 0).unwrap()
        );
        assert!(observations[0].raw_text.starts_with("METAR KJWY"));
    }

    #[test]
    fn test_parse_empty_body_and_empty_array_yield_nothing() {
        assert!(parse_metar_json("", "KJWY").unwrap().is_empty());
        assert!(parse_metar_json("[]", "KJWY").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_json_is_error() {
        let err = parse_metar_json("<response/>", "KJWY").expect_err("xml is not json");
        assert!(err.starts_with("Parse error"));
    }

    #[test]
    fn test_station_absent_from_response_becomes_empty_result() {
        let observations = parse_metar_json(SAMPLE, "KORD").unwrap();
        assert_eq!(FetchResult::from_observations(observations), FetchResult::Empty);
    }

    #[test]
    #[ignore] // Depends on the live aviationweather.gov API
    fn station_api_kjwy_answers() {
        let source = AviationWeatherSource::new(crate::config::DEFAULT_SOURCE_URL, 2.5, Duration::from_secs(20))
            .expect("client should build");
        match source.fetch("KJWY") {
            FetchResult::FetchError(reason) => panic!("KJWY fetch failed: {}", reason),
            other => println!("KJWY: {} observations", other.observation_count()),
        }
    }
}
