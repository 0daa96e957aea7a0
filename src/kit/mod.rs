//! Drum kit model: pads, hitbox testing and hit debounce/statistics.
//!
//! A [`Pad`] owns its rectangle and all mutable hit state; the detector and
//! renderer only ever see pads through the [`DrumKit`] that owns them.

use serde::{Deserialize, Serialize};

use crate::config::KitConfig;
use crate::vision::Blob;

/// Minimum time a pad must wait after an accepted hit before accepting
/// another. Fixed, not configurable.
pub const REFRACTORY_SECS: f64 = 0.5;

/// The drum voices of the kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumKind {
    SnareDrum,
    BassDrum,
    HiHat,
    TomDrum,
}

impl DrumKind {
    /// Canonical asset stem (`<stem>.png` / `<stem>_sound.mp3`).
    pub fn asset_stem(&self) -> &'static str {
        match self {
            DrumKind::SnareDrum => "snare_drum",
            DrumKind::BassDrum => "bass_drum",
            DrumKind::HiHat => "hi_hat",
            DrumKind::TomDrum => "tom_drum",
        }
    }

    pub fn all() -> [DrumKind; 4] {
        [
            DrumKind::SnareDrum,
            DrumKind::BassDrum,
            DrumKind::HiHat,
            DrumKind::TomDrum,
        ]
    }
}

/// Axis-aligned pad rectangle in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PadRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Inclusive containment test: points exactly on an edge count as inside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x as i32
            && x <= (self.x + self.width) as i32
            && y >= self.y as i32
            && y <= (self.y + self.height) as i32
    }
}

/// A drum pad: hit region plus hit statistics.
#[derive(Debug, Clone)]
pub struct Pad {
    kind: DrumKind,
    rect: PadRect,
    /// Time of the last accepted hit, seconds since app start. `None` until
    /// the first hit, so the first strike is never debounced.
    last_hit: Option<f64>,
    hit_count: u64,
    /// Interval between the two most recent accepted hits. Stays 0 until a
    /// second accepted hit exists.
    hit_interval: f64,
    /// Instantaneous hit rate, `1 / hit_interval` (Hz). Not a windowed
    /// average.
    hit_speed: f64,
}

/// Outcome of a candidate hit on a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Hit accepted; the pad's sound should play.
    Accepted,
    /// Inside the refractory window; no sound, no stat change.
    Suppressed,
}

impl Pad {
    pub fn new(kind: DrumKind, rect: PadRect) -> Self {
        Self {
            kind,
            rect,
            last_hit: None,
            hit_count: 0,
            hit_interval: 0.0,
            hit_speed: 0.0,
        }
    }

    pub fn kind(&self) -> DrumKind {
        self.kind
    }

    pub fn rect(&self) -> PadRect {
        self.rect
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn hit_speed(&self) -> f64 {
        self.hit_speed
    }

    pub fn last_hit(&self) -> Option<f64> {
        self.last_hit
    }

    /// Register a candidate hit at `now` (seconds since app start).
    ///
    /// Accepted unless it falls within [`REFRACTORY_SECS`] of the previous
    /// accepted hit. Statistics change only on acceptance. Two candidates
    /// from the same frame share a timestamp, so the second one always lands
    /// inside the refractory window.
    pub fn strike(&mut self, now: f64) -> HitOutcome {
        if let Some(last) = self.last_hit {
            let interval = now - last;
            if interval < REFRACTORY_SECS {
                return HitOutcome::Suppressed;
            }
            self.hit_interval = interval;
        }
        self.last_hit = Some(now);
        self.hit_count += 1;
        self.hit_speed = if self.hit_interval > 0.0 {
            1.0 / self.hit_interval
        } else {
            0.0
        };
        HitOutcome::Accepted
    }
}

/// The full kit: the fixed pad list built from configuration at startup.
pub struct DrumKit {
    pads: Vec<Pad>,
}

impl DrumKit {
    pub fn from_config(config: &KitConfig) -> Self {
        let pads = config
            .pads
            .iter()
            .map(|p| Pad::new(p.kind, p.rect))
            .collect();
        Self { pads }
    }

    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    /// Test every blob center against every pad and register hits.
    ///
    /// Returns the drum kinds whose hits were accepted this frame, in
    /// detection order. Blob centers are truncated to integer coordinates
    /// before the hitbox test.
    pub fn handle_blobs(&mut self, blobs: &[Blob], now: f64) -> Vec<DrumKind> {
        let mut accepted = Vec::new();
        for blob in blobs {
            let x = blob.center.0 as i32;
            let y = blob.center.1 as i32;
            for pad in &mut self.pads {
                if pad.rect.contains(x, y) && pad.strike(now) == HitOutcome::Accepted {
                    log::debug!(
                        "{:?} hit at ({}, {}), count={}, speed={:.2} Hz",
                        pad.kind,
                        x,
                        y,
                        pad.hit_count,
                        pad.hit_speed
                    );
                    accepted.push(pad.kind);
                }
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pad() -> Pad {
        Pad::new(DrumKind::SnareDrum, PadRect::new(100, 200, 100, 100))
    }

    fn blob_at(x: f32, y: f32) -> Blob {
        Blob {
            center: (x, y),
            radius: 5.0,
        }
    }

    #[test]
    fn test_first_hit_has_no_speed() {
        let mut pad = test_pad();

        assert_eq!(pad.strike(0.0), HitOutcome::Accepted);
        assert_eq!(pad.hit_count(), 1);
        assert_eq!(pad.hit_speed(), 0.0);
    }

    #[test]
    fn test_hit_within_refractory_is_suppressed() {
        let mut pad = test_pad();

        assert_eq!(pad.strike(0.0), HitOutcome::Accepted);
        assert_eq!(pad.strike(0.3), HitOutcome::Suppressed);

        // Nothing changed: no count, no timestamp, no speed.
        assert_eq!(pad.hit_count(), 1);
        assert_eq!(pad.last_hit(), Some(0.0));
        assert_eq!(pad.hit_speed(), 0.0);
    }

    #[test]
    fn test_spaced_hits_update_speed() {
        let mut pad = test_pad();

        pad.strike(0.0);
        assert_eq!(pad.strike(0.6), HitOutcome::Accepted);
        assert_eq!(pad.hit_count(), 2);
        assert!((pad.hit_speed() - 1.0 / 0.6).abs() < 1e-9);

        assert_eq!(pad.strike(1.6), HitOutcome::Accepted);
        assert_eq!(pad.hit_count(), 3);
        assert!((pad.hit_speed() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_burst_of_three_hits() {
        // Pad (100,200,100,100); hits at t=0, t=0.6, t=0.9.
        let mut pad = test_pad();

        assert_eq!(pad.strike(0.0), HitOutcome::Accepted);
        assert_eq!(pad.hit_count(), 1);
        assert_eq!(pad.hit_speed(), 0.0);

        assert_eq!(pad.strike(0.6), HitOutcome::Accepted);
        assert_eq!(pad.hit_count(), 2);
        assert!((pad.hit_speed() - 1.6666667).abs() < 1e-3);

        // Interval 0.3 < 0.5: suppressed.
        assert_eq!(pad.strike(0.9), HitOutcome::Suppressed);
        assert_eq!(pad.hit_count(), 2);
    }

    #[test]
    fn test_boundary_point_is_inside() {
        let rect = PadRect::new(100, 200, 100, 100);

        assert!(rect.contains(100, 200));
        assert!(rect.contains(200, 300));
        assert!(rect.contains(100, 300));

        assert!(!rect.contains(99, 250));
        assert!(!rect.contains(201, 250));
        assert!(!rect.contains(150, 301));
    }

    #[test]
    fn test_blob_outside_all_pads_changes_nothing() {
        let mut kit = DrumKit::from_config(&KitConfig::default());

        let accepted = kit.handle_blobs(&[blob_at(0.0, 0.0)], 1.0);
        assert!(accepted.is_empty());
        for pad in kit.pads() {
            assert_eq!(pad.hit_count(), 0);
            assert_eq!(pad.last_hit(), None);
        }
    }

    #[test]
    fn test_blob_on_pad_triggers_that_pad_only() {
        let mut kit = DrumKit::from_config(&KitConfig::default());

        let accepted = kit.handle_blobs(&[blob_at(150.0, 250.0)], 1.0);
        assert_eq!(accepted, vec![DrumKind::SnareDrum]);

        for pad in kit.pads() {
            let expected = if pad.kind() == DrumKind::SnareDrum { 1 } else { 0 };
            assert_eq!(pad.hit_count(), expected);
        }
    }

    #[test]
    fn test_two_blobs_same_pad_same_frame_trigger_once() {
        let mut kit = DrumKit::from_config(&KitConfig::default());

        let blobs = [blob_at(150.0, 250.0), blob_at(160.0, 260.0)];
        let accepted = kit.handle_blobs(&blobs, 1.0);
        assert_eq!(accepted, vec![DrumKind::SnareDrum]);
    }
}
