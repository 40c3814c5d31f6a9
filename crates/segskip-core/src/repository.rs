//! Segment database client.
//!
//! Lookups never send the media id itself: the request carries the first
//! [`hash::PREFIX_LEN`] hex characters of its SHA-256, the server answers with
//! every record under that prefix, and the exact id is picked out locally.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SponsorBlockConfig;
use crate::error::FetchError;
use crate::hash;
use crate::segments::{Category, Segment, SegmentSet, VoteInfo};

pub const DEFAULT_API_URL: &str = "https://sponsor.ajay.app/api";

/// Longest media the scheduler will accept bounds for (one week).
pub const MAX_SEGMENT_BOUND: f64 = 7.0 * 24.0 * 3600.0;

const USER_AGENT: &str = concat!("segskip/", env!("CARGO_PKG_VERSION"));

/// One media item's entry in a prefix lookup response.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRecord {
    #[serde(rename = "videoID")]
    pub video_id: String,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub category: String,
    pub segment: Vec<f64>,
    #[serde(rename = "UUID", default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub locked: i64,
    #[serde(rename = "actionType", default)]
    pub action_type: Option<String>,
    #[serde(rename = "videoDuration", default)]
    pub video_duration: Option<f64>,
}

impl RawSegment {
    fn into_segment(self) -> Option<Segment> {
        let category = match self.category.parse::<Category>() {
            Ok(c) => c,
            Err(e) => {
                debug!("Repository: dropping segment: {}", e);
                return None;
            }
        };
        let &[start, end] = self.segment.as_slice() else {
            debug!(
                "Repository: dropping segment with {} bounds",
                self.segment.len()
            );
            return None;
        };
        if !start.is_finite() || !end.is_finite() || end < start {
            debug!("Repository: dropping segment [{}, {}]", start, end);
            return None;
        }
        if start < 0.0 || end > MAX_SEGMENT_BOUND {
            debug!("Repository: dropping out-of-range segment [{}, {}]", start, end);
            return None;
        }
        let video_duration = self.video_duration.filter(|d| *d > 0.0);
        if video_duration.is_some_and(|d| start >= d) {
            debug!(
                "Repository: dropping segment [{}, {}] past media end {:?}",
                start, end, video_duration
            );
            return None;
        }
        Some(Segment {
            category,
            start,
            end,
            votes: VoteInfo {
                uuid: self.uuid,
                votes: self.votes,
                locked: self.locked != 0,
                action_type: self.action_type,
                video_duration,
            },
        })
    }
}

/// Pick the record for `media_id` out of a prefix response and validate its
/// segments. Order is not guaranteed; [`SegmentSet::new`] sorts.
pub fn select_segments(records: Vec<MediaRecord>, media_id: &str) -> Vec<Segment> {
    records
        .into_iter()
        .find(|r| r.video_id == media_id)
        .map(|r| {
            r.segments
                .into_iter()
                .filter_map(RawSegment::into_segment)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct SegmentRepository {
    client: reqwest::Client,
    api_url: String,
}

impl SegmentRepository {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Repository: client builder failed ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &SponsorBlockConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    /// Fetch and validate segments, reporting why nothing came back.
    pub async fn try_fetch(
        &self,
        media_id: &str,
        categories: &[Category],
    ) -> Result<Vec<Segment>, FetchError> {
        let prefix = hash::hash_prefix(media_id)?;
        let categories = serde_json::to_string(categories)?;
        let url = format!("{}/skipSegments/{}", self.api_url, prefix);

        debug!("Repository: GET {} categories={}", url, categories);
        let resp = self
            .client
            .get(&url)
            .query(&[("categories", categories.as_str())])
            .send()
            .await?;

        // the database answers 404 when nothing matches the prefix
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let body = resp.text().await?;
        let records: Vec<MediaRecord> = serde_json::from_str(&body)?;
        Ok(select_segments(records, media_id))
    }

    /// Fetch the segment set for `media_id`. Every failure degrades to an
    /// empty set.
    pub async fn fetch_segments(&self, media_id: &str, categories: &[Category]) -> SegmentSet {
        match self.try_fetch(media_id, categories).await {
            Ok(segments) if segments.is_empty() => {
                info!("Repository: {}: no segments found", media_id);
                SegmentSet::default()
            }
            Ok(segments) => {
                info!("Repository: {}: {} segments", media_id, segments.len());
                SegmentSet::new(segments)
            }
            Err(e) => {
                warn!("Repository: {}: failed to fetch segments: {}", media_id, e);
                SegmentSet::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(json: &str) -> Vec<MediaRecord> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_select_exact_id_only() {
        let recs = records(
            r#"[
                {"videoID": "other", "segments": [{"category": "sponsor", "segment": [1, 2]}]},
                {"videoID": "wanted", "segments": [
                    {"category": "intro", "segment": [0, 5.5], "UUID": "u1", "votes": 3, "locked": 1,
                     "actionType": "skip", "videoDuration": 212.0}
                ]}
            ]"#,
        );
        let segments = select_segments(recs, "wanted");
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert_eq!(seg.category, Category::Intro);
        assert_eq!((seg.start, seg.end), (0.0, 5.5));
        assert_eq!(seg.votes.uuid.as_deref(), Some("u1"));
        assert!(seg.votes.locked);
        assert_eq!(seg.votes.video_duration, Some(212.0));
    }

    #[test]
    fn test_invalid_segments_dropped() {
        let recs = records(
            r#"[{"videoID": "v", "segments": [
                {"category": "sponsor", "segment": [30, 20]},
                {"category": "jingle", "segment": [1, 2]},
                {"category": "outro", "segment": [1]},
                {"category": "outro", "segment": [50, 60]}
            ]}]"#,
        );
        let segments = select_segments(recs, "v");
        assert_eq!(segments, vec![Segment {
            category: Category::Outro,
            start: 50.0,
            end: 60.0,
            votes: VoteInfo::default(),
        }]);
    }

    #[test]
    fn test_out_of_range_bounds_dropped() {
        let recs = records(
            r#"[{"videoID": "v", "segments": [
                {"category": "sponsor", "segment": [1e20, 2e20]},
                {"category": "sponsor", "segment": [-5, 3]},
                {"category": "sponsor", "segment": [300, 310], "videoDuration": 212.0},
                {"category": "sponsor", "segment": [200, 212.5], "videoDuration": 212.0}
            ]}]"#,
        );
        let segments = select_segments(recs, "v");
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end), (200.0, 212.5));
    }

    #[test]
    fn test_missing_record_is_empty() {
        assert!(select_segments(records("[]"), "v").is_empty());
        assert!(select_segments(records(r#"[{"videoID": "v"}]"#), "v").is_empty());
    }
}
