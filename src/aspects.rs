use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::*;

/// Smallest separation between two ecliptic longitudes, in `[0, 180]`.
/// Inputs need not be normalized.
pub fn angular_distance(first: f64, second: f64) -> f64 {
    let distance = (first - second).rem_euclid(360.0);
    if distance > 180.0 {
        360.0 - distance
    } else {
        distance
    }
}

// ---------------------------
// ## Orb Tables
// ---------------------------

/// Maximum allowed deviation from the exact angle, per aspect kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbTable {
    pub conjunction: f64,
    pub opposition: f64,
    pub square: f64,
    pub trine: f64,
    pub sextile: f64,
}

impl OrbTable {
    /// Orbs for aspects inside a single chart.
    pub const NATAL: OrbTable = OrbTable {
        conjunction: 8.0,
        opposition: 8.0,
        square: 6.0,
        trine: 6.0,
        sextile: 4.0,
    };

    /// Orbs for transits, progressions and synastry.
    pub const TRANSIT: OrbTable = OrbTable {
        conjunction: 8.0,
        opposition: 8.0,
        square: 7.0,
        trine: 7.0,
        sextile: 5.0,
    };

    pub const fn uniform(orb: f64) -> Self {
        OrbTable {
            conjunction: orb,
            opposition: orb,
            square: orb,
            trine: orb,
            sextile: orb,
        }
    }

    pub fn limit(&self, kind: AspectKind) -> f64 {
        match kind {
            AspectKind::Conjunction => self.conjunction,
            AspectKind::Opposition => self.opposition,
            AspectKind::Square => self.square,
            AspectKind::Trine => self.trine,
            AspectKind::Sextile => self.sextile,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in AspectKind::MATCH_ORDER {
            let limit = self.limit(kind);
            if !limit.is_finite() || limit < 0.0 {
                return Err(AstrologyError::Config(format!(
                    "orb for {} must be a non-negative number, got {}",
                    kind, limit
                )));
            }
        }
        Ok(())
    }

    /// First kind in `AspectKind::MATCH_ORDER` whose orb admits `distance`,
    /// together with the unrounded orb.
    pub fn classify(&self, distance: f64) -> Option<(AspectKind, f64)> {
        AspectKind::MATCH_ORDER.into_iter().find_map(|kind| {
            let orb = (distance - kind.exact_angle()).abs();
            (orb <= self.limit(kind)).then_some((kind, orb))
        })
    }
}

// ---------------------------
// ## Applying / Separating
// ---------------------------

/// Decides whether an inter-chart aspect is still forming.
pub trait ApplyingRule: fmt::Debug + Send + Sync {
    fn is_applying(&self, moving: &CelestialPoint, fixed: &CelestialPoint, kind: AspectKind)
        -> bool;
}

/// Reports every aspect as separating.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverApplying;

impl ApplyingRule for NeverApplying {
    fn is_applying(&self, _: &CelestialPoint, _: &CelestialPoint, _: AspectKind) -> bool {
        false
    }
}

/// Steps both points forward by their daily speeds and checks whether the
/// orb to the exact angle shrinks. A missing speed counts as stationary.
#[derive(Debug, Clone, Copy)]
pub struct RelativeVelocity {
    pub step_days: f64,
}

impl Default for RelativeVelocity {
    fn default() -> Self {
        RelativeVelocity { step_days: 0.01 }
    }
}

impl ApplyingRule for RelativeVelocity {
    fn is_applying(
        &self,
        moving: &CelestialPoint,
        fixed: &CelestialPoint,
        kind: AspectKind,
    ) -> bool {
        let exact = kind.exact_angle();
        let orb_now = (angular_distance(moving.longitude, fixed.longitude) - exact).abs();

        let advance = |point: &CelestialPoint| {
            (point.longitude + point.speed.unwrap_or(0.0) * self.step_days).rem_euclid(360.0)
        };
        let orb_next = (angular_distance(advance(moving), advance(fixed)) - exact).abs();

        orb_next < orb_now
    }
}

// ---------------------------
// ## Matcher
// ---------------------------

/// Pairwise aspect matcher over a snapshot of resolved points.
///
/// Holds its orb table and output precision; it never fails and keeps no
/// state between calls.
#[derive(Debug)]
pub struct AspectMatcher {
    orbs: OrbTable,
    precision: u32,
    applying: Box<dyn ApplyingRule>,
}

impl AspectMatcher {
    pub fn new(orbs: OrbTable, precision: u32) -> Self {
        AspectMatcher {
            orbs,
            precision,
            applying: Box::new(NeverApplying),
        }
    }

    pub fn natal() -> Self {
        Self::new(OrbTable::NATAL, 4)
    }

    pub fn transit() -> Self {
        Self::new(OrbTable::TRANSIT, 2)
    }

    pub fn with_applying_rule(mut self, rule: impl ApplyingRule + 'static) -> Self {
        self.applying = Box::new(rule);
        self
    }

    pub fn orbs(&self) -> &OrbTable {
        &self.orbs
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn record(
        &self,
        first: &CelestialPoint,
        second: &CelestialPoint,
        is_applying: Option<bool>,
        kind: AspectKind,
        distance: f64,
        orb: f64,
    ) -> AspectRecord {
        AspectRecord {
            id1: first.id.clone(),
            id2: second.id.clone(),
            kind,
            difference: round_to(distance, self.precision),
            orb: round_to(orb, self.precision),
            exact_angle: kind.exact_angle(),
            is_applying,
        }
    }

    /// Every unordered pair `(i, j)`, `i < j`, of one chart, in input order.
    pub fn match_intra_chart(&self, points: &[CelestialPoint]) -> Vec<AspectRecord> {
        let mut aspects = Vec::new();

        for (i, first) in points.iter().enumerate() {
            for second in &points[i + 1..] {
                let distance = angular_distance(first.longitude, second.longitude);
                if let Some((kind, orb)) = self.orbs.classify(distance) {
                    aspects.push(self.record(first, second, None, kind, distance, orb));
                }
            }
        }

        debug!(
            "intra-chart: {} aspects across {} points",
            aspects.len(),
            points.len()
        );
        aspects
    }

    /// Every pair `(a, b)` with `a` from `moving` and `b` from `fixed`,
    /// skipping pairs that share an id.
    pub fn match_inter_chart(
        &self,
        moving: &[CelestialPoint],
        fixed: &[CelestialPoint],
    ) -> Vec<AspectRecord> {
        let mut aspects = Vec::new();

        for first in moving {
            for second in fixed.iter().filter(|second| second.id != first.id) {
                let distance = angular_distance(first.longitude, second.longitude);
                if let Some((kind, orb)) = self.orbs.classify(distance) {
                    let applying = self.applying.is_applying(first, second, kind);
                    aspects.push(self.record(first, second, Some(applying), kind, distance, orb));
                }
            }
        }

        debug!(
            "inter-chart: {} aspects across {}x{} points",
            aspects.len(),
            moving.len(),
            fixed.len()
        );
        aspects
    }
}

impl Default for AspectMatcher {
    fn default() -> Self {
        Self::natal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn point(id: &str, longitude: f64) -> CelestialPoint {
        CelestialPoint::new(id, longitude)
    }

    #[test]
    fn test_angular_distance_wraps() {
        assert_relative_eq!(angular_distance(0.0, 181.0), 179.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(350.0, 10.0), 20.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(10.0, 70.0), 60.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(0.0, 180.0), 180.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(42.0, 42.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(540.0, 0.0), 180.0, epsilon = 1e-9);
        assert_relative_eq!(angular_distance(-30.0, 750.0), 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unnormalized_points_still_match() {
        let raw = [
            CelestialPoint {
                longitude: 540.0,
                ..point("Sun", 0.0)
            },
            CelestialPoint {
                longitude: -360.0,
                ..point("Mars", 0.0)
            },
        ];
        let aspects = AspectMatcher::natal().match_intra_chart(&raw);
        assert_eq!(aspects.len(), 1);
        assert_eq!(aspects[0].kind, AspectKind::Opposition);
        assert_relative_eq!(aspects[0].difference, 180.0, epsilon = 1e-9);

        let decoded: Vec<CelestialPoint> =
            serde_json::from_str(r#"[{"id":"Sun","lon":540.0},{"id":"Mars","lon":0.0}]"#).unwrap();
        let aspects = AspectMatcher::natal().match_intra_chart(&decoded);
        assert_eq!(aspects.len(), 1);
        assert_eq!(aspects[0].kind, AspectKind::Opposition);
        assert_relative_eq!(aspects[0].orb, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_classify_follows_match_order() {
        assert_eq!(OrbTable::NATAL.classify(3.0).map(|m| m.0), Some(AspectKind::Conjunction));
        assert_eq!(OrbTable::NATAL.classify(175.0).map(|m| m.0), Some(AspectKind::Opposition));
        assert_eq!(OrbTable::NATAL.classify(88.0).map(|m| m.0), Some(AspectKind::Square));
        assert_eq!(OrbTable::NATAL.classify(125.0).map(|m| m.0), Some(AspectKind::Trine));
        assert_eq!(OrbTable::NATAL.classify(57.0).map(|m| m.0), Some(AspectKind::Sextile));
        assert_eq!(OrbTable::NATAL.classify(30.0), None);
    }

    #[test]
    fn test_orb_limit_is_inclusive() {
        let matcher = AspectMatcher::natal();

        let on_edge = matcher.match_intra_chart(&[point("Sun", 0.0), point("Mars", 96.0)]);
        assert_eq!(on_edge.len(), 1);
        assert_eq!(on_edge[0].kind, AspectKind::Square);
        assert_relative_eq!(on_edge[0].orb, 6.0, epsilon = 1e-9);

        let beyond = matcher.match_intra_chart(&[point("Sun", 0.0), point("Mars", 97.0)]);
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_transit_table_is_wider() {
        let matcher = AspectMatcher::transit();
        let natal = [point("Sun", 0.0)];

        let inside = matcher.match_inter_chart(&[point("Mars", 97.0)], &natal);
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].kind, AspectKind::Square);
        assert_relative_eq!(inside[0].orb, 7.0, epsilon = 1e-9);

        let outside = matcher.match_inter_chart(&[point("Mars", 98.0)], &natal);
        assert!(outside.is_empty());

        let sextile = matcher.match_inter_chart(&[point("Venus", 65.0)], &natal);
        assert_eq!(sextile[0].kind, AspectKind::Sextile);
    }

    #[test]
    fn test_overlapping_orbs_pick_earlier_kind() {
        let wide = OrbTable {
            conjunction: 8.0,
            opposition: 8.0,
            square: 20.0,
            trine: 20.0,
            sextile: 4.0,
        };
        let matcher = AspectMatcher::new(wide, 4);
        let aspects = matcher.match_intra_chart(&[point("Sun", 0.0), point("Moon", 105.0)]);

        assert_eq!(aspects.len(), 1);
        assert_eq!(aspects[0].kind, AspectKind::Square);
        assert_relative_eq!(aspects[0].orb, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intra_chart_keeps_input_order() {
        let points = [
            point("Moon", 70.0),
            point("Sun", 10.0),
            point("Mars", 190.0),
        ];
        let aspects = AspectMatcher::natal().match_intra_chart(&points);

        let pairs: Vec<(&str, &str, AspectKind)> = aspects
            .iter()
            .map(|a| (a.id1.as_str(), a.id2.as_str(), a.kind))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Moon", "Sun", AspectKind::Sextile),
                ("Moon", "Mars", AspectKind::Trine),
                ("Sun", "Mars", AspectKind::Opposition),
            ]
        );
        assert!(aspects.iter().all(|a| a.is_applying.is_none()));
    }

    #[test]
    fn test_intra_chart_rounds_to_four_places() {
        let aspects =
            AspectMatcher::natal().match_intra_chart(&[point("Sun", 0.0), point("Moon", 61.123456)]);
        assert_relative_eq!(aspects[0].difference, 61.1235, epsilon = 1e-9);
        assert_relative_eq!(aspects[0].orb, 1.1235, epsilon = 1e-9);
        assert_relative_eq!(aspects[0].exact_angle, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn test_too_few_points_yield_nothing() {
        let matcher = AspectMatcher::natal();
        assert!(matcher.match_intra_chart(&[]).is_empty());
        assert!(matcher.match_intra_chart(&[point("Sun", 0.0)]).is_empty());
        assert!(matcher.match_inter_chart(&[], &[point("Sun", 0.0)]).is_empty());
    }

    #[test]
    fn test_inter_chart_skips_same_body() {
        let matcher = AspectMatcher::transit();
        let transit = [point("Sun", 10.0), point("Jupiter", 100.0)];
        let natal = [point("Sun", 10.0), point("Jupiter", 190.0)];

        let aspects = matcher.match_inter_chart(&transit, &natal);
        let pairs: Vec<(&str, &str)> = aspects
            .iter()
            .map(|a| (a.id1.as_str(), a.id2.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Sun", "Jupiter"), ("Jupiter", "Sun")]);
        assert!(aspects.iter().all(|a| a.is_applying == Some(false)));
    }

    #[test]
    fn test_inter_chart_rounds_to_two_places() {
        let aspects = AspectMatcher::transit()
            .match_inter_chart(&[point("Saturn", 122.3456)], &[point("Moon", 0.0)]);
        assert_eq!(aspects[0].kind, AspectKind::Trine);
        assert_relative_eq!(aspects[0].difference, 122.35, epsilon = 1e-9);
        assert_relative_eq!(aspects[0].orb, 2.35, epsilon = 1e-9);
    }

    #[test]
    fn test_relative_velocity_rule() {
        let rule = RelativeVelocity::default();
        let natal_sun = point("Sun", 10.0);

        // Mars at 95 moving forward closes on the square at 100.
        let closing = point("Mars", 95.0).with_speed(0.5);
        assert!(rule.is_applying(&closing, &natal_sun, AspectKind::Square));

        // Mars at 105 moving forward drifts away from it.
        let opening = point("Mars", 105.0).with_speed(0.5);
        assert!(!rule.is_applying(&opening, &natal_sun, AspectKind::Square));

        let retrograde = point("Mars", 105.0).with_speed(-0.5);
        assert!(rule.is_applying(&retrograde, &natal_sun, AspectKind::Square));

        let stationary = point("Mars", 95.0);
        assert!(!rule.is_applying(&stationary, &natal_sun, AspectKind::Square));
    }

    #[test]
    fn test_matcher_uses_installed_rule() {
        let matcher = AspectMatcher::transit().with_applying_rule(RelativeVelocity::default());
        let aspects = matcher.match_inter_chart(
            &[point("Mars", 95.0).with_speed(0.5)],
            &[point("Sun", 10.0)],
        );
        assert_eq!(aspects[0].is_applying, Some(true));
    }

    #[test]
    fn test_orb_table_validation() {
        assert!(OrbTable::NATAL.validate().is_ok());
        assert!(OrbTable::uniform(1.0).validate().is_ok());
        assert!(OrbTable::uniform(-1.0).validate().is_err());
        assert!(OrbTable::uniform(f64::NAN).validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric_and_bounded(a in 0.0f64..360.0, b in 0.0f64..360.0) {
            let forward = angular_distance(a, b);
            prop_assert!((forward - angular_distance(b, a)).abs() < 1e-9);
            prop_assert!((0.0..=180.0).contains(&forward));
        }

        #[test]
        fn prop_distance_bounded_for_any_longitudes(a in -1080.0f64..1080.0, b in -1080.0f64..1080.0) {
            prop_assert!((0.0..=180.0).contains(&angular_distance(a, b)));
        }

        #[test]
        fn prop_matching_is_idempotent(lons in proptest::collection::vec(0.0f64..360.0, 0..13)) {
            let points: Vec<CelestialPoint> = lons
                .iter()
                .enumerate()
                .map(|(i, lon)| CelestialPoint::new(format!("P{}", i), *lon))
                .collect();
            let matcher = AspectMatcher::natal();
            let first = matcher.match_intra_chart(&points);
            prop_assert_eq!(&first, &matcher.match_intra_chart(&points));

            let mut pairs: Vec<(&str, &str)> = first
                .iter()
                .map(|a| (a.id1.as_str(), a.id2.as_str()))
                .collect();
            let total = pairs.len();
            pairs.dedup();
            prop_assert_eq!(pairs.len(), total);
        }
    }
}
