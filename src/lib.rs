// src/lib.rs

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub mod aspects;
pub mod chart;
pub mod config;
pub mod forecast;

pub use aspects::{
    angular_distance, ApplyingRule, AspectMatcher, NeverApplying, OrbTable, RelativeVelocity,
};
pub use chart::{
    resolve_objects, AspectEngine, Ephemeris, FixedEphemeris, ObjectCategory, ObjectId,
    Resolution, ResolvedChart,
};
pub use config::AspectConfig;
pub use forecast::{
    first_of_next_month, first_of_next_year, progressed_date, transit_moment, ForecastPeriod,
};

// ---------------------------
// ## Enumerations
// ---------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries = 0,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn from_longitude(longitude: f64) -> Self {
        let normalized_longitude = longitude.rem_euclid(360.0);
        let sign_index = (normalized_longitude / 30.0).floor() as usize;
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs
        Self::ALL[sign_index % 12]
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sign_str = match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        };
        write!(f, "{}", sign_str)
    }
}

/// The major aspects recognised by the matcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectKind {
    Conjunction,
    Sextile,
    Square,
    Trine,
    Opposition,
}

impl AspectKind {
    /// Order in which kinds are tried against a pair. The first kind whose
    /// orb admits the pair wins.
    pub const MATCH_ORDER: [AspectKind; 5] = [
        AspectKind::Conjunction,
        AspectKind::Opposition,
        AspectKind::Square,
        AspectKind::Trine,
        AspectKind::Sextile,
    ];

    pub fn exact_angle(&self) -> f64 {
        match self {
            AspectKind::Conjunction => 0.0,
            AspectKind::Sextile => 60.0,
            AspectKind::Square => 90.0,
            AspectKind::Trine => 120.0,
            AspectKind::Opposition => 180.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AspectKind::Conjunction => "Conjunction",
            AspectKind::Sextile => "Sextile",
            AspectKind::Square => "Square",
            AspectKind::Trine => "Trine",
            AspectKind::Opposition => "Opposition",
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which two charts an inter-chart aspect was found between.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pairing {
    Transit,
    Progression,
    Synastry,
}

impl Pairing {
    /// Keys naming the moving side and the fixed side of the pair.
    pub fn role_labels(&self) -> (&'static str, &'static str) {
        match self {
            Pairing::Transit => ("transit_planet", "natal_planet"),
            Pairing::Progression => ("progressed_planet", "natal_planet"),
            Pairing::Synastry => ("person1_object", "person2_object"),
        }
    }
}

// ---------------------------
// ## Structures
// ---------------------------

/// A resolved body or sensitive point of a chart.
///
/// Only `longitude` takes part in aspect matching; the remaining fields are
/// carried through for display.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CelestialPoint {
    pub id: String,
    #[serde(rename = "lon", deserialize_with = "normalized_longitude")]
    pub longitude: f64,
    #[serde(rename = "lat", default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub retrograde: Option<bool>,
}

// Written with the display fields (`sign`, `sign_pos`) and the resolved
// retrograde flag rather than the raw option.
impl Serialize for CelestialPoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("sign", &self.sign())?;
        map.serialize_entry("sign_pos", &round_to(self.sign_position(), 2))?;
        map.serialize_entry("lon", &self.longitude)?;
        if let Some(latitude) = self.latitude {
            map.serialize_entry("lat", &latitude)?;
        }
        if let Some(speed) = self.speed {
            map.serialize_entry("speed", &speed)?;
        }
        map.serialize_entry("retrograde", &self.is_retrograde())?;
        map.end()
    }
}

impl CelestialPoint {
    pub fn new(id: impl Into<String>, longitude: f64) -> Self {
        CelestialPoint {
            id: id.into(),
            longitude: longitude.rem_euclid(360.0),
            latitude: None,
            speed: None,
            retrograde: None,
        }
    }

    pub fn with_latitude(mut self, latitude: f64) -> Self {
        self.latitude = Some(latitude);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_retrograde(mut self, retrograde: bool) -> Self {
        self.retrograde = Some(retrograde);
        self
    }

    /// The explicit flag wins; otherwise a negative daily speed means retrograde.
    pub fn is_retrograde(&self) -> bool {
        self.retrograde
            .unwrap_or_else(|| self.speed.map_or(false, |speed| speed < 0.0))
    }

    pub fn sign(&self) -> ZodiacSign {
        ZodiacSign::from_longitude(self.longitude)
    }

    /// Degrees into the current sign.
    pub fn sign_position(&self) -> f64 {
        self.longitude.rem_euclid(30.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HouseCusp {
    pub number: u8,
    #[serde(rename = "lon", deserialize_with = "normalized_longitude")]
    pub longitude: f64,
}

impl Serialize for HouseCusp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("number", &self.number)?;
        map.serialize_entry("sign", &self.sign())?;
        map.serialize_entry("sign_pos", &round_to(self.sign_position(), 2))?;
        map.serialize_entry("lon", &self.longitude)?;
        map.end()
    }
}

impl HouseCusp {
    pub fn new(number: u8, longitude: f64) -> Self {
        HouseCusp {
            number,
            longitude: longitude.rem_euclid(360.0),
        }
    }

    pub fn sign(&self) -> ZodiacSign {
        ZodiacSign::from_longitude(self.longitude)
    }

    pub fn sign_position(&self) -> f64 {
        self.longitude.rem_euclid(30.0)
    }
}

/// One matched pair. `id1`/`id2` keep input order, never alphabetical.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AspectRecord {
    pub id1: String,
    pub id2: String,
    #[serde(rename = "type")]
    pub kind: AspectKind,
    pub difference: f64,
    pub orb: f64,
    pub exact_angle: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_applying: Option<bool>,
}

/// An inter-chart record tagged with the charts it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct InterChartAspect {
    pub pairing: Pairing,
    pub record: AspectRecord,
}

impl Serialize for InterChartAspect {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (moving, fixed) = self.pairing.role_labels();
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry(moving, &self.record.id1)?;
        map.serialize_entry("aspect", &self.record.kind)?;
        map.serialize_entry(fixed, &self.record.id2)?;
        map.serialize_entry("difference", &self.record.difference)?;
        map.serialize_entry("orb", &self.record.orb)?;
        map.serialize_entry("is_applying", &self.record.is_applying.unwrap_or(false))?;
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Location { latitude, longitude }
    }

    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AstrologyError::InvalidInput(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AstrologyError::InvalidInput(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// The moment and place a chart is cast for. Times are already in UT;
/// timezone handling happens before this point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirthInfo {
    pub date_time: NaiveDateTime,
    pub location: Location,
}

impl BirthInfo {
    pub fn new(date_time: NaiveDateTime, location: Location) -> Self {
        BirthInfo { date_time, location }
    }

    pub fn validate(&self) -> Result<()> {
        self.location.validate()
    }
}

// ---------------------------
// ## Error Handling
// ---------------------------

#[derive(Debug, Error)]
pub enum AstrologyError {
    /// The ephemeris could not compute a requested object.
    #[error("Ephemeris Error for {id}: {message}")]
    Ephemeris { id: String, message: String },

    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Config Parse Error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal Error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AstrologyError>;

// ---------------------------
// ## Utility Functions
// ---------------------------

/// Longitudes read from outside are folded into `[0, 360)` on the way in.
fn normalized_longitude<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(|longitude| longitude.rem_euclid(360.0))
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
