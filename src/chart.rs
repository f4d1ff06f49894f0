use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::*;

// ---------------------------
// ## Chart Objects
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Planet,
    Special,
    Angle,
}

/// Objects requested from the ephemeris, in request order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectId {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    NorthNode,
    SouthNode,
    Syzygy,
    ParsFortuna,
    Ascendant,
    Midheaven,
}

impl ObjectId {
    const ALL: [ObjectId; 13] = [
        ObjectId::Sun,
        ObjectId::Moon,
        ObjectId::Mercury,
        ObjectId::Venus,
        ObjectId::Mars,
        ObjectId::Jupiter,
        ObjectId::Saturn,
        ObjectId::NorthNode,
        ObjectId::SouthNode,
        ObjectId::Syzygy,
        ObjectId::ParsFortuna,
        ObjectId::Ascendant,
        ObjectId::Midheaven,
    ];

    pub fn all() -> impl Iterator<Item = ObjectId> {
        Self::ALL.iter().copied()
    }

    /// Classical planets plus the two angles; the set compared in synastry.
    pub fn primary() -> impl Iterator<Item = ObjectId> {
        Self::all().filter(|id| id.category() != ObjectCategory::Special)
    }

    pub fn category(&self) -> ObjectCategory {
        match self {
            ObjectId::Sun
            | ObjectId::Moon
            | ObjectId::Mercury
            | ObjectId::Venus
            | ObjectId::Mars
            | ObjectId::Jupiter
            | ObjectId::Saturn => ObjectCategory::Planet,
            ObjectId::NorthNode
            | ObjectId::SouthNode
            | ObjectId::Syzygy
            | ObjectId::ParsFortuna => ObjectCategory::Special,
            ObjectId::Ascendant | ObjectId::Midheaven => ObjectCategory::Angle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectId::Sun => "Sun",
            ObjectId::Moon => "Moon",
            ObjectId::Mercury => "Mercury",
            ObjectId::Venus => "Venus",
            ObjectId::Mars => "Mars",
            ObjectId::Jupiter => "Jupiter",
            ObjectId::Saturn => "Saturn",
            ObjectId::NorthNode => "North Node",
            ObjectId::SouthNode => "South Node",
            ObjectId::Syzygy => "Syzygy",
            ObjectId::ParsFortuna => "Pars Fortuna",
            ObjectId::Ascendant => "Asc",
            ObjectId::Midheaven => "MC",
        }
    }

    pub fn from_name(name: &str) -> Option<ObjectId> {
        Self::all().find(|id| id.name() == name)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------
// ## Ephemeris Provider
// ---------------------------

/// Source of object positions and house cusps for a given moment and place.
pub trait Ephemeris {
    fn object(&self, moment: &BirthInfo, id: ObjectId) -> Result<CelestialPoint>;
    fn houses(&self, moment: &BirthInfo) -> Result<Vec<HouseCusp>>;
}

/// A precomputed snapshot. Answers the same positions for every moment.
#[derive(Debug, Clone, Default)]
pub struct FixedEphemeris {
    points: HashMap<ObjectId, CelestialPoint>,
    houses: Vec<HouseCusp>,
}

impl FixedEphemeris {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, id: ObjectId, longitude: f64) -> Self {
        self.with_point(id, CelestialPoint::new(id.name(), longitude))
    }

    pub fn with_point(mut self, id: ObjectId, point: CelestialPoint) -> Self {
        self.points.insert(id, point);
        self
    }

    pub fn with_houses(mut self, cusps: impl IntoIterator<Item = f64>) -> Self {
        self.houses = cusps
            .into_iter()
            .zip(1u8..=12)
            .map(|(longitude, number)| HouseCusp::new(number, longitude))
            .collect();
        self
    }
}

impl Ephemeris for FixedEphemeris {
    fn object(&self, _moment: &BirthInfo, id: ObjectId) -> Result<CelestialPoint> {
        self.points
            .get(&id)
            .cloned()
            .ok_or_else(|| AstrologyError::Ephemeris {
                id: id.name().to_string(),
                message: "object missing from snapshot".to_string(),
            })
    }

    fn houses(&self, _moment: &BirthInfo) -> Result<Vec<HouseCusp>> {
        if self.houses.len() == 12 {
            Ok(self.houses.clone())
        } else {
            Err(AstrologyError::Ephemeris {
                id: "houses".to_string(),
                message: format!("expected 12 cusps, snapshot has {}", self.houses.len()),
            })
        }
    }
}

// ---------------------------
// ## Resolution
// ---------------------------

/// Outcome of asking the ephemeris for one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(CelestialPoint),
    Skipped { id: ObjectId, reason: String },
}

/// Asks for each id in turn. Failures are logged and kept as `Skipped`.
pub fn resolve_objects<E>(
    ephemeris: &E,
    moment: &BirthInfo,
    ids: impl IntoIterator<Item = ObjectId>,
) -> Vec<Resolution>
where
    E: Ephemeris + ?Sized,
{
    ids.into_iter()
        .map(|id| match ephemeris.object(moment, id) {
            Ok(point) => Resolution::Resolved(point),
            Err(e) => {
                warn!("Skipping {}: {}", id, e);
                Resolution::Skipped {
                    id,
                    reason: e.to_string(),
                }
            }
        })
        .collect()
}

/// The candidate list handed to the matcher, plus what was left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChart {
    pub moment: BirthInfo,
    pub points: Vec<CelestialPoint>,
    pub skipped: Vec<ObjectId>,
    pub houses: Vec<HouseCusp>,
}

impl ResolvedChart {
    pub fn from_resolutions(
        moment: BirthInfo,
        resolutions: Vec<Resolution>,
        houses: Vec<HouseCusp>,
    ) -> Self {
        let mut points = Vec::new();
        let mut skipped = Vec::new();
        for resolution in resolutions {
            match resolution {
                Resolution::Resolved(point) => points.push(point),
                Resolution::Skipped { id, .. } => skipped.push(id),
            }
        }
        ResolvedChart {
            moment,
            points,
            skipped,
            houses,
        }
    }

    /// Casts a chart with every catalogued object.
    pub fn cast<E>(ephemeris: &E, moment: BirthInfo) -> Result<Self>
    where
        E: Ephemeris + ?Sized,
    {
        Self::cast_objects(ephemeris, moment, ObjectId::all())
    }

    pub fn cast_objects<E>(
        ephemeris: &E,
        moment: BirthInfo,
        ids: impl IntoIterator<Item = ObjectId>,
    ) -> Result<Self>
    where
        E: Ephemeris + ?Sized,
    {
        moment.validate()?;
        info!(
            "Calculating chart for {} at ({}, {})",
            moment.date_time, moment.location.latitude, moment.location.longitude
        );

        let resolutions = resolve_objects(ephemeris, &moment, ids);
        let houses = match ephemeris.houses(&moment) {
            Ok(houses) => houses,
            Err(e) => {
                error!("Error processing houses: {}", e);
                Vec::new()
            }
        };

        Ok(Self::from_resolutions(moment, resolutions, houses))
    }

    pub fn point(&self, id: ObjectId) -> Option<&CelestialPoint> {
        self.points.iter().find(|point| point.id == id.name())
    }

    pub fn by_category(&self, category: ObjectCategory) -> Vec<&CelestialPoint> {
        self.points
            .iter()
            .filter(|point| {
                ObjectId::from_name(&point.id).map(|id| id.category()) == Some(category)
            })
            .collect()
    }

    pub fn primary_points(&self) -> Vec<CelestialPoint> {
        self.points
            .iter()
            .filter(|point| {
                ObjectId::from_name(&point.id)
                    .map_or(false, |id| id.category() != ObjectCategory::Special)
            })
            .cloned()
            .collect()
    }
}

// ---------------------------
// ## Aspect Engine
// ---------------------------

/// One matcher per context, built from an `AspectConfig`.
#[derive(Debug)]
pub struct AspectEngine {
    natal: AspectMatcher,
    transit: AspectMatcher,
    progression: AspectMatcher,
}

impl AspectEngine {
    pub fn new(config: &AspectConfig) -> Self {
        AspectEngine {
            natal: config.natal_matcher(),
            transit: config.transit_matcher(),
            progression: config.progression_matcher(),
        }
    }

    pub fn from_matchers(
        natal: AspectMatcher,
        transit: AspectMatcher,
        progression: AspectMatcher,
    ) -> Self {
        AspectEngine {
            natal,
            transit,
            progression,
        }
    }

    pub fn natal_aspects(&self, chart: &ResolvedChart) -> Vec<AspectRecord> {
        self.natal.match_intra_chart(&chart.points)
    }

    pub fn transit_aspects(
        &self,
        transit: &ResolvedChart,
        natal: &ResolvedChart,
    ) -> Vec<InterChartAspect> {
        tag(
            Pairing::Transit,
            self.transit.match_inter_chart(&transit.points, &natal.points),
        )
    }

    pub fn progression_aspects(
        &self,
        progressed: &ResolvedChart,
        natal: &ResolvedChart,
    ) -> Vec<InterChartAspect> {
        tag(
            Pairing::Progression,
            self.progression
                .match_inter_chart(&progressed.points, &natal.points),
        )
    }

    pub fn synastry_aspects(
        &self,
        first: &ResolvedChart,
        second: &ResolvedChart,
    ) -> Vec<InterChartAspect> {
        tag(
            Pairing::Synastry,
            self.transit
                .match_inter_chart(&first.primary_points(), &second.primary_points()),
        )
    }
}

impl Default for AspectEngine {
    fn default() -> Self {
        Self::new(&AspectConfig::default())
    }
}

fn tag(pairing: Pairing, records: Vec<AspectRecord>) -> Vec<InterChartAspect> {
    records
        .into_iter()
        .map(|record| InterChartAspect { pairing, record })
        .collect()
}
