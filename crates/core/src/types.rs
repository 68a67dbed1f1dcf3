/// Feeds are keyed by the backend's opaque string identifier.
pub type FeedId = String;

/// Zone identifiers are UUID strings minted at creation time.
pub type ZoneId = String;

/// All wall-clock timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
