//! In-memory zone registry, optionally mirrored to the durable store.
//!
//! [`ZoneStore`] is the sole writer of zone state for one feed. For
//! recorded feeds every mutation is mirrored through the
//! [`ZoneDirectory`] collaborator before the local copy changes; for
//! live/ephemeral sources ("webcam" mode) the store runs purely
//! volatile and never issues a durable call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use zonewatch_core::analysis::ZoneAnalysis;
use zonewatch_core::geometry::Point;
use zonewatch_core::types::FeedId;
use zonewatch_core::zone::{validate_polygon, Zone, ZoneDraft, ZoneUpdate};
use zonewatch_core::CoreError;

use crate::error::EngineError;
use crate::traits::ZoneDirectory;

/// Zone registry for a single feed.
pub struct ZoneStore {
    feed_id: FeedId,
    /// Insertion-ordered zone list. One feed rarely has more than a
    /// handful of zones, so linear scans beat a map here.
    zones: RwLock<Vec<Zone>>,
    /// Bumped on every visible mutation.
    revision: AtomicU64,
    min_zone_extent_px: f64,
    /// `None` in volatile mode (live sources).
    directory: Option<Arc<dyn ZoneDirectory>>,
}

impl ZoneStore {
    /// Create a store mirrored to the durable zone directory.
    pub fn durable(
        feed_id: FeedId,
        min_zone_extent_px: f64,
        directory: Arc<dyn ZoneDirectory>,
    ) -> Self {
        Self {
            feed_id,
            zones: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
            min_zone_extent_px,
            directory: Some(directory),
        }
    }

    /// Create a purely local store for a live/ephemeral source.
    pub fn volatile(feed_id: FeedId, min_zone_extent_px: f64) -> Self {
        Self {
            feed_id,
            zones: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
            min_zone_extent_px,
            directory: None,
        }
    }

    /// Whether this store skips the durable directory entirely.
    pub fn is_volatile(&self) -> bool {
        self.directory.is_none()
    }

    /// Current revision; changes on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Replace the local zone list with the durable directory's
    /// contents. No-op in volatile mode.
    pub async fn load(&self) -> Result<(), EngineError> {
        let Some(directory) = &self.directory else {
            return Ok(());
        };
        let zones = directory.list(&self.feed_id).await?;

        let mut guard = self.zones.write().await;
        *guard = zones;
        self.bump();

        tracing::debug!(feed_id = %self.feed_id, count = guard.len(), "Zones loaded");
        Ok(())
    }

    /// Create a zone from a draft.
    ///
    /// Rejects polygons with fewer than three points
    /// (`GeometryInvalid`) or a bounding extent under the minimum
    /// (`GeometryTooSmall`). The durable write happens first; a
    /// transport failure leaves local state untouched.
    pub async fn create(&self, draft: ZoneDraft) -> Result<Zone, EngineError> {
        validate_polygon(&draft.polygon, self.min_zone_extent_px)?;

        let id = uuid::Uuid::new_v4().to_string();
        let name = if draft.name.trim().is_empty() {
            // Same convention as the backend: short id suffix.
            format!("Zone-{}", &id[id.len() - 6..])
        } else {
            draft.name.trim().to_string()
        };

        let zone = Zone {
            id: id.clone(),
            name,
            polygon: draft.polygon,
            created_at: chrono::Utc::now(),
            last_analysis: None,
        };

        if let Some(directory) = &self.directory {
            directory.create(&self.feed_id, &zone).await?;
        }

        self.zones.write().await.push(zone.clone());
        self.bump();

        tracing::info!(feed_id = %self.feed_id, zone_id = %id, "Zone created");
        Ok(zone)
    }

    /// Replace the provided fields of an existing zone.
    pub async fn update(&self, zone_id: &str, update: ZoneUpdate) -> Result<Zone, EngineError> {
        if let Some(polygon) = &update.polygon {
            validate_polygon(polygon, self.min_zone_extent_px)?;
        }

        let mut guard = self.zones.write().await;
        let zone = guard
            .iter_mut()
            .find(|z| z.id == zone_id)
            .ok_or_else(|| not_found(zone_id))?;

        let mut updated = zone.clone();
        if let Some(name) = update.name {
            updated.name = name.trim().to_string();
        }
        if let Some(polygon) = update.polygon {
            updated.polygon = polygon;
        }

        if let Some(directory) = &self.directory {
            directory.update(&self.feed_id, &updated).await?;
        }

        *zone = updated.clone();
        self.bump();

        tracing::info!(feed_id = %self.feed_id, zone_id, "Zone updated");
        Ok(updated)
    }

    /// Delete a zone.
    pub async fn delete(&self, zone_id: &str) -> Result<(), EngineError> {
        let mut guard = self.zones.write().await;
        let idx = guard
            .iter()
            .position(|z| z.id == zone_id)
            .ok_or_else(|| not_found(zone_id))?;

        if let Some(directory) = &self.directory {
            directory.delete(&self.feed_id, zone_id).await?;
        }

        guard.remove(idx);
        self.bump();

        tracing::info!(feed_id = %self.feed_id, zone_id, "Zone deleted");
        Ok(())
    }

    /// Fetch one zone by id.
    pub async fn get(&self, zone_id: &str) -> Result<Zone, CoreError> {
        self.zones
            .read()
            .await
            .iter()
            .find(|z| z.id == zone_id)
            .cloned()
            .ok_or_else(|| core_not_found(zone_id))
    }

    /// All zones, in creation order.
    pub async fn list(&self) -> Vec<Zone> {
        self.zones.read().await.clone()
    }

    /// The current zone polygons, for detection filtering.
    pub async fn polygons(&self) -> Vec<Vec<Point>> {
        self.zones
            .read()
            .await
            .iter()
            .map(|z| z.polygon.clone())
            .collect()
    }

    /// Overwrite a zone's `last_analysis`.
    ///
    /// Fails with `NotFound` when the zone has been deleted since the
    /// analysis was requested; the aggregation pipeline treats that
    /// as "discard", but the write itself fails loudly.
    pub async fn record_analysis(
        &self,
        zone_id: &str,
        analysis: ZoneAnalysis,
    ) -> Result<(), CoreError> {
        let mut guard = self.zones.write().await;
        let zone = guard
            .iter_mut()
            .find(|z| z.id == zone_id)
            .ok_or_else(|| core_not_found(zone_id))?;

        zone.last_analysis = Some(analysis);
        self.bump();
        Ok(())
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

fn core_not_found(zone_id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "zone",
        id: zone_id.to_string(),
    }
}

fn not_found(zone_id: &str) -> EngineError {
    EngineError::Core(core_not_found(zone_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
