use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownCategory;

/// Content category attached to a segment by the segment database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sponsor,
    Intro,
    Outro,
    Interaction,
    #[serde(rename = "selfpromo")]
    SelfPromo,
    Preview,
    Filler,
    MusicOfftopic,
}

/// Marker colour and opacity for a category on the progress-bar strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarStyle {
    pub color: &'static str,
    pub opacity: f32,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Sponsor,
        Category::Intro,
        Category::Outro,
        Category::Interaction,
        Category::SelfPromo,
        Category::Preview,
        Category::Filler,
        Category::MusicOfftopic,
    ];

    /// Wire name used by the segment database and in config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sponsor => "sponsor",
            Category::Intro => "intro",
            Category::Outro => "outro",
            Category::Interaction => "interaction",
            Category::SelfPromo => "selfpromo",
            Category::Preview => "preview",
            Category::Filler => "filler",
            Category::MusicOfftopic => "music_offtopic",
        }
    }

    /// Human-readable name used in skip notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Sponsor => "sponsored segment",
            Category::Intro => "intro",
            Category::Outro => "outro",
            Category::Interaction => "interaction reminder",
            Category::SelfPromo => "self-promotion",
            Category::Preview => "recap or preview",
            Category::Filler => "tangents",
            Category::MusicOfftopic => "non-music part",
        }
    }

    pub fn bar_style(&self) -> BarStyle {
        let (color, opacity) = match self {
            Category::Sponsor => ("#00d400", 0.7),
            Category::Intro => ("#00ffff", 0.7),
            Category::Outro => ("#0202ed", 0.7),
            Category::Interaction => ("#cc00ff", 0.7),
            Category::SelfPromo => ("#ffff00", 0.7),
            Category::Preview => ("#008fd6", 0.7),
            Category::Filler => ("#7300ff", 0.9),
            Category::MusicOfftopic => ("#ff9900", 0.7),
        };
        BarStyle { color, opacity }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Vote and bookkeeping fields the database attaches to each segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VoteInfo {
    pub uuid: Option<String>,
    pub votes: i64,
    pub locked: bool,
    pub action_type: Option<String>,
    /// Duration of the media item as seen by the submitter.
    pub video_duration: Option<f64>,
}

/// A time-bounded, categorised span of a media item. `end >= start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub category: Category,
    pub start: f64,
    pub end: f64,
    #[serde(flatten)]
    pub votes: VoteInfo,
}

impl Segment {
    pub fn new(category: Category, start: f64, end: f64) -> Self {
        Self {
            category,
            start,
            end,
            votes: VoteInfo::default(),
        }
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Segments of one media item, ascending by start, plus the scan cursor.
///
/// The cursor only ever moves forward; the scheduler starts every scan there
/// so a forward-playing session touches each segment a bounded number of
/// times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSet {
    segments: Vec<Segment>,
    cursor: usize,
}

impl SegmentSet {
    pub fn new(mut segments: Vec<Segment>) -> Self {
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            segments,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Segment> {
        self.segments.get(idx)
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor to `idx`. Never moves backwards.
    pub fn advance_cursor(&mut self, idx: usize) {
        if idx > self.cursor {
            self.cursor = idx.min(self.segments.len());
        }
    }

    /// Index of the first segment containing `t`, ignoring the cursor.
    pub fn position_containing(&self, t: f64) -> Option<usize> {
        self.segments.iter().position(|s| s.contains(t))
    }
}
