//! Simplified ByteTrack-style multi-object tracker.
//!
//! Two-stage association: high-confidence detections are matched to
//! existing tracks first, then low-confidence detections fill remaining
//! unmatched tracks. Weak detections never start new tracks, but they can
//! keep an existing track alive through momentary confidence drops.

use std::collections::HashSet;

use crate::shared::detection::Detection;

use super::math::bbox_iou;

const HIGH_THRESH: f64 = 0.5;
const MATCH_THRESH: f64 = 0.3;

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: [f64; 4],
    class_id: usize,
    frames_lost: usize,
    matched: bool,
}

/// Assigns persistent identities to per-frame detections.
pub struct ByteTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl ByteTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Updates tracker state from one frame's detections and writes the
    /// assigned `track_id` into each matched detection in place. Detections
    /// that matched no track and were too weak to start one keep `None`.
    pub fn assign(&mut self, detections: &mut [Detection]) {
        for det in detections.iter_mut() {
            det.track_id = None;
        }

        let (high, low) = split_by_confidence(detections);

        self.reset_match_flags();
        let num_existing = self.tracks.len();
        let matched_high = self.match_stage(&high, detections);
        self.match_stage(&low, detections);
        self.create_new_tracks(&high, &matched_high, detections);
        self.age_unmatched_tracks(num_existing);
    }

    /// Discards all track state; the next frame starts identities fresh.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    fn reset_match_flags(&mut self) {
        for track in &mut self.tracks {
            track.matched = false;
        }
    }

    /// Greedy IoU matching of the given detection indices against all
    /// currently unmatched tracks. Returns the matched detection indices
    /// and writes the winning track id into each detection.
    fn match_stage(&mut self, candidates: &[usize], detections: &mut [Detection]) -> HashSet<usize> {
        let track_refs: Vec<(usize, [f64; 4])> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.matched)
            .map(|(i, t)| (i, t.bbox))
            .collect();

        let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
        for (ti, bbox) in &track_refs {
            for &di in candidates {
                let score = bbox_iou(bbox, &detections[di].bbox);
                if score >= MATCH_THRESH {
                    pairs.push((*ti, di, score));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut used_tracks = HashSet::new();
        let mut matched_dets = HashSet::new();
        for (ti, di, _) in pairs {
            if used_tracks.contains(&ti) || matched_dets.contains(&di) {
                continue;
            }
            used_tracks.insert(ti);
            matched_dets.insert(di);

            let track = &mut self.tracks[ti];
            track.bbox = detections[di].bbox;
            track.class_id = detections[di].class_id;
            track.frames_lost = 0;
            track.matched = true;
            detections[di].track_id = Some(track.id);
        }
        matched_dets
    }

    fn create_new_tracks(
        &mut self,
        high: &[usize],
        matched: &HashSet<usize>,
        detections: &mut [Detection],
    ) {
        for &di in high {
            if matched.contains(&di) {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(TrackState {
                id,
                bbox: detections[di].bbox,
                class_id: detections[di].class_id,
                frames_lost: 0,
                matched: true,
            });
            detections[di].track_id = Some(id);
        }
    }

    fn age_unmatched_tracks(&mut self, num_existing: usize) {
        for track in self.tracks.iter_mut().take(num_existing) {
            if !track.matched {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);
    }
}

/// Splits detection indices into high- and low-confidence groups.
fn split_by_confidence(detections: &[Detection]) -> (Vec<usize>, Vec<usize>) {
    let mut high = Vec::new();
    let mut low = Vec::new();
    for (i, det) in detections.iter().enumerate() {
        if det.confidence >= HIGH_THRESH {
            high.push(i);
        } else {
            low.push(i);
        }
    }
    (high, low)
}
