//! Per-zone analysis results and the multi-zone combiner.
//!
//! A [`ZoneAnalysis`] is produced by the external per-zone analysis
//! service and stored on the zone wholesale. [`combine`] merges the
//! results of several independent per-zone runs into one
//! [`CombinedAnalysis`] describing the whole monitored area:
//!
//! - `total_persons_passed` takes the **max** across zones. The same
//!   physical person may cross several zones, so summing would
//!   double-count; the most any single zone observed is the floor on
//!   distinct individuals.
//! - `peak_count` takes the **sum**: simultaneous occupancy across
//!   disjoint zones is additive.
//! - `avg_count` is the arithmetic mean of the per-zone averages.
//! - The per-frame series are aligned onto the first successful
//!   zone's time base and summed index-wise.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, ZoneId};

/// Synthetic zone label carried by a combined report.
pub const COMBINED_LABEL: &str = "combined";

/// Tolerance when matching timestamps between two zones' series, in
/// seconds. Detection caches are sampled at a few fps, so anything
/// tighter than a millisecond is the same instant.
const TIMESTAMP_MATCH_EPSILON: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// Occupancy statistics for a single zone over one analyzed video.
///
/// Produced by the external analysis service; never partially
/// written. `counts_per_frame` and `timestamps` are index-aligned
/// when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAnalysis {
    pub zone_id: ZoneId,
    #[serde(default)]
    pub zone_name: String,
    /// Mean occupancy across analyzed frames.
    pub avg_count: f64,
    /// Lowest single-frame occupancy observed.
    #[serde(default)]
    pub min_count: u32,
    /// Highest single-frame occupancy observed.
    pub peak_count: u32,
    /// Video time of the peak, in seconds.
    pub peak_time: f64,
    /// Estimated distinct individuals that entered the zone.
    pub total_persons_passed: u32,
    pub frames_analyzed: u32,
    /// Stride used when sampling frames for this run.
    #[serde(default = "default_frame_step")]
    pub frame_step: u32,
    pub fps: f64,
    /// Analyzed span of the video, in seconds.
    pub duration: f64,
    /// Occupancy per analyzed frame, index-aligned with `timestamps`.
    #[serde(default)]
    pub counts_per_frame: Vec<u32>,
    /// Video time of each analyzed frame, in seconds.
    #[serde(default)]
    pub timestamps: Vec<f64>,
    /// Seconds each tracked person stayed in the zone.
    #[serde(default)]
    pub dwell_times: Vec<f64>,
    pub analyzed_at: Timestamp,
}

fn default_frame_step() -> u32 {
    1
}

/// A synthesized report merging several per-zone analyses.
///
/// Same shape as [`ZoneAnalysis`] with the zone id replaced by a
/// synthetic label. Ephemeral: never written back to any zone.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedAnalysis {
    /// Synthetic label, see [`COMBINED_LABEL`].
    pub label: String,
    /// Number of zone analyses that contributed.
    pub zones_combined: usize,
    pub avg_count: f64,
    pub peak_count: u32,
    pub peak_time: f64,
    pub total_persons_passed: u32,
    pub frames_analyzed: u32,
    pub fps: f64,
    pub duration: f64,
    pub counts_per_frame: Vec<u32>,
    pub timestamps: Vec<f64>,
    pub dwell_times: Vec<f64>,
    pub analyzed_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Combiner
// ---------------------------------------------------------------------------

/// Merge successful per-zone analyses into one combined report.
///
/// Returns `None` when `analyses` is empty. The first analysis with a
/// non-empty `timestamps` list supplies the time base; every other
/// series is aligned onto it (exact index match, then timestamp
/// match, then proportional index scaling) and summed per index.
/// `frames_analyzed`, `fps`, `duration`, and `peak_time` come from
/// the first analysis: they describe the shared video, not
/// zone-specific content.
pub fn combine(analyses: &[ZoneAnalysis]) -> Option<CombinedAnalysis> {
    let first = analyses.first()?;

    let total_persons_passed = analyses
        .iter()
        .map(|a| a.total_persons_passed)
        .max()
        .unwrap_or(0);
    let peak_count = analyses.iter().map(|a| a.peak_count).sum();
    let avg_count = analyses.iter().map(|a| a.avg_count).sum::<f64>() / analyses.len() as f64;

    // Time base: the first zone reporting timestamps wins. If no zone
    // has timestamps, fall back to a plain index axis whose length is
    // derived from frames_analyzed (or the longest series).
    let base = analyses.iter().find(|a| !a.timestamps.is_empty());
    let (base_timestamps, base_len) = match base {
        Some(a) => (a.timestamps.clone(), a.timestamps.len()),
        None => {
            let len = if first.frames_analyzed > 0 {
                first.frames_analyzed as usize
            } else {
                analyses
                    .iter()
                    .map(|a| a.counts_per_frame.len())
                    .max()
                    .unwrap_or(0)
            };
            (Vec::new(), len)
        }
    };

    let mut counts_per_frame = vec![0u32; base_len];
    for analysis in analyses {
        let aligned = align_counts(
            &analysis.counts_per_frame,
            &analysis.timestamps,
            &base_timestamps,
            base_len,
        );
        for (slot, count) in counts_per_frame.iter_mut().zip(aligned) {
            *slot += count;
        }
    }

    let dwell_times = analyses
        .iter()
        .flat_map(|a| a.dwell_times.iter().copied())
        .collect();

    Some(CombinedAnalysis {
        label: COMBINED_LABEL.to_string(),
        zones_combined: analyses.len(),
        avg_count,
        peak_count,
        peak_time: first.peak_time,
        total_persons_passed,
        frames_analyzed: first.frames_analyzed,
        fps: first.fps,
        duration: first.duration,
        counts_per_frame,
        timestamps: base_timestamps,
        dwell_times,
        analyzed_at: chrono::Utc::now(),
    })
}

/// Align one zone's count series onto the combined time base.
///
/// Three tiers, in order of preference:
/// 1. lengths match — exact index alignment;
/// 2. the zone reports timestamps — match each base timestamp against
///    the zone's series (within [`TIMESTAMP_MATCH_EPSILON`]);
/// 3. neither — approximate by proportional index scaling.
fn align_counts(
    counts: &[u32],
    timestamps: &[f64],
    base_timestamps: &[f64],
    base_len: usize,
) -> Vec<u32> {
    if counts.len() == base_len {
        return counts.to_vec();
    }

    if !timestamps.is_empty() && !base_timestamps.is_empty() {
        // Both sides have time values: match on them. The series are
        // ascending, so a forward cursor covers every base instant in
        // one pass.
        let mut aligned = vec![0u32; base_len];
        let mut cursor = 0usize;
        for (i, &base_ts) in base_timestamps.iter().enumerate() {
            while cursor < timestamps.len()
                && timestamps[cursor] < base_ts - TIMESTAMP_MATCH_EPSILON
            {
                cursor += 1;
            }
            if cursor < timestamps.len()
                && (timestamps[cursor] - base_ts).abs() <= TIMESTAMP_MATCH_EPSILON
            {
                aligned[i] = counts.get(cursor).copied().unwrap_or(0);
            }
        }
        return aligned;
    }

    // No usable timestamps: stretch or squeeze by index.
    if counts.is_empty() || base_len == 0 {
        return vec![0; base_len];
    }
    (0..base_len)
        .map(|i| {
            let src = i * counts.len() / base_len;
            counts[src.min(counts.len() - 1)]
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(zone_id: &str, counts: Vec<u32>, timestamps: Vec<f64>) -> ZoneAnalysis {
        let peak_count = counts.iter().copied().max().unwrap_or(0);
        let avg_count = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<u32>() as f64 / counts.len() as f64
        };
        ZoneAnalysis {
            zone_id: zone_id.to_string(),
            zone_name: zone_id.to_string(),
            avg_count,
            min_count: counts.iter().copied().min().unwrap_or(0),
            peak_count,
            peak_time: 1.0,
            total_persons_passed: peak_count,
            frames_analyzed: counts.len() as u32,
            frame_step: 1,
            fps: 25.0,
            duration: 10.0,
            counts_per_frame: counts,
            timestamps,
            dwell_times: vec![],
            analyzed_at: chrono::Utc::now(),
        }
    }

    // -- headline statistics --

    #[test]
    fn combine_empty_is_none() {
        assert!(combine(&[]).is_none());
    }

    #[test]
    fn persons_passed_is_max_not_sum() {
        let mut z1 = analysis("z1", vec![1, 2], vec![0.0, 1.0]);
        z1.total_persons_passed = 5;
        let mut z2 = analysis("z2", vec![2, 3], vec![0.0, 1.0]);
        z2.total_persons_passed = 8;

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.total_persons_passed, 8);
    }

    #[test]
    fn peak_count_is_sum() {
        let mut z1 = analysis("z1", vec![1], vec![0.0]);
        z1.peak_count = 3;
        let mut z2 = analysis("z2", vec![1], vec![0.0]);
        z2.peak_count = 4;

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.peak_count, 7);
    }

    #[test]
    fn avg_count_is_mean_of_zone_averages() {
        let mut z1 = analysis("z1", vec![2, 2], vec![0.0, 1.0]);
        z1.avg_count = 2.0;
        let mut z2 = analysis("z2", vec![4, 4], vec![0.0, 1.0]);
        z2.avg_count = 4.0;

        let combined = combine(&[z1, z2]).unwrap();
        assert!((combined.avg_count - 3.0).abs() < 1e-9);
    }

    #[test]
    fn video_level_fields_come_from_first_zone() {
        let mut z1 = analysis("z1", vec![1, 1], vec![0.0, 1.0]);
        z1.fps = 30.0;
        z1.duration = 42.0;
        z1.peak_time = 7.5;
        let mut z2 = analysis("z2", vec![1, 1], vec![0.0, 1.0]);
        z2.fps = 10.0;
        z2.duration = 99.0;
        z2.peak_time = 1.0;

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.fps, 30.0);
        assert_eq!(combined.duration, 42.0);
        assert_eq!(combined.peak_time, 7.5);
        assert_eq!(combined.frames_analyzed, 2);
        assert_eq!(combined.label, COMBINED_LABEL);
        assert_eq!(combined.zones_combined, 2);
    }

    // -- series alignment --

    #[test]
    fn exact_index_alignment_sums_counts() {
        let z1 = analysis("z1", vec![1, 2, 3], vec![0.0, 1.0, 2.0]);
        let z2 = analysis("z2", vec![4, 5, 6], vec![0.0, 1.0, 2.0]);

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.counts_per_frame, vec![5, 7, 9]);
        assert_eq!(combined.timestamps, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn timestamp_match_alignment_for_sparser_zone() {
        // z2 only sampled every other instant; its counts land on the
        // base indexes whose timestamps match.
        let z1 = analysis("z1", vec![1, 1, 1, 1], vec![0.0, 1.0, 2.0, 3.0]);
        let z2 = analysis("z2", vec![10, 20], vec![1.0, 3.0]);

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.counts_per_frame, vec![1, 11, 1, 21]);
    }

    #[test]
    fn proportional_scaling_when_other_zone_lacks_timestamps() {
        // Base has 4 slots; z2 reports 2 counts and no timestamps, so
        // each of its counts covers two base slots.
        let z1 = analysis("z1", vec![0, 0, 0, 0], vec![0.0, 1.0, 2.0, 3.0]);
        let z2 = analysis("z2", vec![3, 7], vec![]);

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.counts_per_frame, vec![3, 3, 7, 7]);
    }

    #[test]
    fn fallback_length_from_frames_analyzed_when_no_timestamps_anywhere() {
        let mut z1 = analysis("z1", vec![1, 2, 3, 4], vec![]);
        z1.frames_analyzed = 4;
        let z2 = analysis("z2", vec![5, 6], vec![]);

        let combined = combine(&[z1, z2]).unwrap();
        assert!(combined.timestamps.is_empty());
        // z1 aligns exactly; z2 stretches proportionally over 4 slots.
        assert_eq!(combined.counts_per_frame, vec![6, 7, 9, 10]);
    }

    #[test]
    fn fallback_length_from_longest_series_when_frames_analyzed_is_zero() {
        let mut z1 = analysis("z1", vec![1, 2, 3], vec![]);
        z1.frames_analyzed = 0;
        let mut z2 = analysis("z2", vec![1], vec![]);
        z2.frames_analyzed = 0;

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.counts_per_frame.len(), 3);
    }

    #[test]
    fn base_is_first_zone_with_timestamps() {
        // z1 has no timestamps; z2 supplies the time base.
        let z1 = analysis("z1", vec![1, 1], vec![]);
        let z2 = analysis("z2", vec![2, 2, 2], vec![0.0, 0.5, 1.0]);

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.timestamps, vec![0.0, 0.5, 1.0]);
        assert_eq!(combined.counts_per_frame.len(), 3);
    }

    #[test]
    fn dwell_times_are_concatenated() {
        let mut z1 = analysis("z1", vec![1], vec![0.0]);
        z1.dwell_times = vec![1.5, 2.5];
        let mut z2 = analysis("z2", vec![1], vec![0.0]);
        z2.dwell_times = vec![4.0];

        let combined = combine(&[z1, z2]).unwrap();
        assert_eq!(combined.dwell_times, vec![1.5, 2.5, 4.0]);
    }

    #[test]
    fn single_zone_combines_to_itself() {
        let z1 = analysis("z1", vec![1, 2, 1], vec![0.0, 1.0, 2.0]);
        let combined = combine(std::slice::from_ref(&z1)).unwrap();

        assert_eq!(combined.counts_per_frame, z1.counts_per_frame);
        assert_eq!(combined.peak_count, z1.peak_count);
        assert_eq!(combined.total_persons_passed, z1.total_persons_passed);
        assert!((combined.avg_count - z1.avg_count).abs() < 1e-9);
    }

    // -- wire format --

    #[test]
    fn zone_analysis_parses_backend_payload() {
        let json = r#"{
            "zone_id": "abc",
            "zone_name": "entrance",
            "avg_count": 1.5,
            "min_count": 0,
            "peak_count": 3,
            "peak_time": 2.0,
            "total_persons_passed": 4,
            "frames_analyzed": 2,
            "frame_step": 1,
            "fps": 25.0,
            "duration": 4.0,
            "counts_per_frame": [1, 2],
            "timestamps": [0.0, 2.0],
            "analyzed_at": "2026-08-30T12:00:00Z"
        }"#;
        let parsed: ZoneAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.zone_id, "abc");
        assert_eq!(parsed.peak_count, 3);
        assert!(parsed.dwell_times.is_empty());
    }
}
