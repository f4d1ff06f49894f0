use aztro_aspects::{
    progressed_date, transit_moment, AspectConfig, AspectEngine, BirthInfo, FixedEphemeris,
    ForecastPeriod, Location, ObjectId, ResolvedChart,
};
use chrono::NaiveDate;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => AspectConfig::load(path)?,
        None => AspectConfig::default(),
    };
    let engine = AspectEngine::new(&config);

    // 3rd may 1990 13:20 (+03:00), nizhny novgorod
    let birth_date = NaiveDate::from_ymd_opt(1990, 5, 3).ok_or("bad birth date")?;
    let birth = BirthInfo::new(
        birth_date.and_hms_opt(10, 20, 0).ok_or("bad birth time")?,
        Location::new(56.2575, 43.9824),
    );

    let natal_positions = FixedEphemeris::new()
        .with_object(ObjectId::Sun, 42.61)
        .with_object(ObjectId::Moon, 313.87)
        .with_object(ObjectId::Mercury, 53.12)
        .with_object(ObjectId::Venus, 358.40)
        .with_object(ObjectId::Mars, 334.95)
        .with_object(ObjectId::Jupiter, 97.28)
        .with_object(ObjectId::Saturn, 294.10)
        .with_object(ObjectId::NorthNode, 315.56)
        .with_object(ObjectId::SouthNode, 135.56)
        .with_object(ObjectId::Ascendant, 131.72)
        .with_object(ObjectId::Midheaven, 24.35)
        .with_houses([
            131.72, 151.40, 175.06, 204.35, 238.12, 274.90, 311.72, 331.40, 355.06, 24.35,
            58.12, 94.90,
        ]);
    let natal = ResolvedChart::cast(&natal_positions, birth)?;
    println!("{:#?}", engine.natal_aspects(&natal));

    let target = ForecastPeriod::Month.target_date(birth_date)?;
    let transit_positions = FixedEphemeris::new()
        .with_object(ObjectId::Sun, 70.45)
        .with_object(ObjectId::Jupiter, 102.80)
        .with_object(ObjectId::Saturn, 293.55);
    let transit = ResolvedChart::cast(
        &transit_positions,
        BirthInfo::new(transit_moment(target), birth.location),
    )?;
    println!("{:#?}", engine.transit_aspects(&transit, &natal));

    let progressed_positions = FixedEphemeris::new()
        .with_object(ObjectId::Sun, 71.30)
        .with_object(ObjectId::Mercury, 49.87);
    let progressed = ResolvedChart::cast(
        &progressed_positions,
        BirthInfo::new(progressed_date(birth.date_time, 30)?, birth.location),
    )?;
    println!("{:#?}", engine.progression_aspects(&progressed, &natal));

    Ok(())
}
