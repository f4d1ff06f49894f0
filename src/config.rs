use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::*;

/// Orb tables and output precision for each matching context.
///
/// Every field is optional in TOML, down to single orbs; anything left out
/// keeps its default.
///
/// ```toml
/// natal_precision = 4
///
/// [transit]
/// square = 6.5
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AspectConfig {
    pub natal: OrbTable,
    pub transit: OrbTable,
    pub progression: OrbTable,
    pub natal_precision: u32,
    pub transit_precision: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrbTableToml {
    #[serde(default)]
    conjunction: Option<f64>,
    #[serde(default)]
    opposition: Option<f64>,
    #[serde(default)]
    square: Option<f64>,
    #[serde(default)]
    trine: Option<f64>,
    #[serde(default)]
    sextile: Option<f64>,
}

impl OrbTableToml {
    fn over(self, base: OrbTable) -> OrbTable {
        OrbTable {
            conjunction: self.conjunction.unwrap_or(base.conjunction),
            opposition: self.opposition.unwrap_or(base.opposition),
            square: self.square.unwrap_or(base.square),
            trine: self.trine.unwrap_or(base.trine),
            sextile: self.sextile.unwrap_or(base.sextile),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AspectConfigToml {
    #[serde(default)]
    natal: OrbTableToml,
    #[serde(default)]
    transit: OrbTableToml,
    #[serde(default)]
    progression: OrbTableToml,
    #[serde(default)]
    natal_precision: Option<u32>,
    #[serde(default)]
    transit_precision: Option<u32>,
}

impl Default for AspectConfig {
    fn default() -> Self {
        AspectConfig {
            natal: OrbTable::NATAL,
            transit: OrbTable::TRANSIT,
            progression: OrbTable::TRANSIT,
            natal_precision: 4,
            transit_precision: 2,
        }
    }
}

impl AspectConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: AspectConfigToml = toml::from_str(text)?;
        let defaults = AspectConfig::default();
        let config = AspectConfig {
            natal: raw.natal.over(defaults.natal),
            transit: raw.transit.over(defaults.transit),
            progression: raw.progression.over(defaults.progression),
            natal_precision: raw.natal_precision.unwrap_or(defaults.natal_precision),
            transit_precision: raw.transit_precision.unwrap_or(defaults.transit_precision),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded aspect config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.natal.validate()?;
        self.transit.validate()?;
        self.progression.validate()?;
        for precision in [self.natal_precision, self.transit_precision] {
            if precision > 10 {
                return Err(AstrologyError::Config(format!(
                    "precision must be at most 10 decimal places, got {}",
                    precision
                )));
            }
        }
        Ok(())
    }

    pub fn natal_matcher(&self) -> AspectMatcher {
        AspectMatcher::new(self.natal, self.natal_precision)
    }

    pub fn transit_matcher(&self) -> AspectMatcher {
        AspectMatcher::new(self.transit, self.transit_precision)
    }

    pub fn progression_matcher(&self) -> AspectMatcher {
        AspectMatcher::new(self.progression, self.transit_precision)
    }
}
