//! Engagement statistics for subscribed communities.

pub mod keywords;
pub mod stats;
pub mod trends;

pub use keywords::{top_keywords, KeywordCount, STOP_WORDS};
pub use stats::{busiest_hours, collect_stats, HourCount, SubredditStats};
pub use trends::{
    ActivitySummary, BasicStats, ContentSummary, PopularPost, SubredditTrend, TrendAnalyzer,
    TrendReport,
};
