//! Synthetic Data - Reference collaborators
//!
//! `SyntheticTrainingData`: labeled rows drawn from fixed per-field
//! distributions, labeled by hazard-specific rules, with 10% of labels flipped.
//! `SyntheticFeatureProvider`: a complete feature mapping for one location
//! from a (given or mocked) weather snapshot plus randomized site fields.
//!
//! Both are seeded and reproducible.

use chrono::{Datelike, NaiveDate, Utc};
use ndarray::Array2;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1, Poisson, StandardNormal};

use crate::logic::features::{RawFeatures, FEATURE_COUNT, FEATURE_LAYOUT};
use crate::logic::hazard::HazardType;
use crate::logic::lifecycle::{DataError, LabeledSet, TrainingDataProvider};
use crate::logic::scoring::{FeatureProvider, Location, WeatherSnapshot};

/// Share of labels flipped after rule labeling
pub const LABEL_NOISE: f64 = 0.1;

// Layout positions read by the labeling rules
const TEMPERATURE: usize = 0;
const HUMIDITY: usize = 1;
const PRESSURE: usize = 2;
const WIND_SPEED: usize = 3;
const RAINFALL_24H: usize = 6;
const RAINFALL_7D: usize = 7;
const RAINFALL_30D: usize = 8;
const ELEVATION: usize = 11;
const SLOPE: usize = 12;
const SOIL_MOISTURE: usize = 17;
const VEGETATION_INDEX: usize = 18;
const SEISMIC_7D: usize = 19;
const SEISMIC_30D: usize = 20;
const FAULT_DISTANCE: usize = 21;
const TECTONIC_STRESS: usize = 22;
const RIVER_LEVEL: usize = 24;
const SEA_SURFACE_TEMP: usize = 29;
const PRESSURE_GRADIENT: usize = 30;

// ============================================================================
// SAMPLING
// ============================================================================

struct Sampler<'a> {
    rng: &'a mut StdRng,
}

impl Sampler<'_> {
    fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + std * z
    }

    fn exponential(&mut self, scale: f64) -> f64 {
        let e: f64 = self.rng.sample(Exp1);
        scale * e
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    /// Integer in [low, high)
    fn randint(&mut self, low: i64, high: i64) -> f64 {
        self.rng.gen_range(low..high) as f64
    }

    fn poisson(&mut self, lambda: f64) -> f64 {
        match Poisson::new(lambda) {
            Ok(dist) => dist.sample(&mut *self.rng),
            Err(_) => 0.0,
        }
    }
}

fn season(month: f64) -> f64 {
    ((month as i64 % 12) / 3) as f64
}

fn is_monsoon(month: f64) -> f64 {
    if (6.0..=9.0).contains(&month) { 1.0 } else { 0.0 }
}

// ============================================================================
// TRAINING DATA
// ============================================================================

/// Rule-labeled synthetic training rows
#[derive(Debug, Clone, Default)]
pub struct SyntheticTrainingData;

impl SyntheticTrainingData {
    pub fn new() -> Self {
        Self
    }

    /// One unlabeled row, in layout order
    fn row(s: &mut Sampler<'_>) -> [f64; FEATURE_COUNT] {
        let rainfall_1h = s.exponential(5.0);
        let rainfall_24h = rainfall_1h * s.uniform(10.0, 30.0);
        let rainfall_7d = rainfall_24h * s.uniform(3.0, 10.0);
        let rainfall_30d = rainfall_7d * s.uniform(2.0, 6.0);
        let month = s.randint(1, 13);

        [
            // weather
            s.normal(25.0, 10.0),
            s.uniform(30.0, 100.0),
            s.normal(1013.0, 20.0),
            s.exponential(15.0),
            s.uniform(0.0, 360.0),
            rainfall_1h,
            rainfall_24h,
            rainfall_7d,
            rainfall_30d,
            s.normal(0.0, 5.0),
            s.normal(0.0, 10.0),
            // geography
            s.uniform(0.0, 3000.0),
            s.exponential(10.0),
            s.uniform(0.0, 360.0),
            s.exponential(50.0),
            s.exponential(200.0),
            s.randint(1, 10),
            s.uniform(10.0, 80.0),
            s.uniform(0.0, 1.0),
            // seismic
            s.exponential(2.0),
            s.exponential(8.0),
            s.exponential(100.0),
            s.uniform(0.0, 100.0),
            s.poisson(5.0),
            // hydrology
            s.uniform(1.0, 15.0),
            s.exponential(500.0),
            s.uniform(5.0, 50.0),
            s.uniform(50.0, 100.0),
            s.exponential(10.0),
            // atmosphere
            s.normal(27.0, 3.0),
            s.normal(0.0, 5.0),
            s.uniform(0.0, 50.0),
            s.uniform(40.0, 100.0),
            s.uniform(0.0, 1.0),
            // temporal
            month,
            season(month),
            s.randint(1, 366),
            is_monsoon(month),
            // history
            s.poisson(3.0),
            s.poisson(15.0),
            s.exponential(180.0),
            s.uniform(0.0, 1.0),
        ]
    }
}

/// Noise-free rule label for one row in layout order
pub fn rule_label(hazard: HazardType, r: &[f64]) -> bool {
    match hazard {
        HazardType::Flood => {
            r[RAINFALL_24H] > 100.0
                || r[RIVER_LEVEL] > 12.0
                || (r[RAINFALL_7D] > 300.0 && r[ELEVATION] < 100.0)
                || r[SOIL_MOISTURE] > 70.0
        }
        HazardType::Cyclone => {
            r[WIND_SPEED] > 60.0
                || (r[SEA_SURFACE_TEMP] > 26.0 && r[HUMIDITY] > 80.0 && r[PRESSURE] < 1000.0)
                || r[PRESSURE_GRADIENT] < -3.0
        }
        HazardType::Earthquake => {
            r[SEISMIC_7D] > 5.0
                || (r[TECTONIC_STRESS] > 70.0 && r[FAULT_DISTANCE] < 50.0)
                || r[SEISMIC_30D] > 20.0
        }
        HazardType::Landslide => {
            (r[RAINFALL_24H] > 80.0 && r[SLOPE] > 25.0)
                || (r[SOIL_MOISTURE] > 60.0 && r[SLOPE] > 20.0)
                || (r[RAINFALL_7D] > 200.0 && r[VEGETATION_INDEX] < 0.3)
        }
        HazardType::Wildfire => {
            (r[TEMPERATURE] > 35.0 && r[HUMIDITY] < 30.0)
                || (r[WIND_SPEED] > 30.0 && r[VEGETATION_INDEX] > 0.6 && r[RAINFALL_30D] < 20.0)
                || r[TEMPERATURE] > 40.0
        }
    }
}

impl TrainingDataProvider for SyntheticTrainingData {
    /// The same seed yields the same feature rows for every hazard; only labels differ
    fn labeled_set(&self, hazard: HazardType, samples: usize, seed: u64) -> Result<LabeledSet, DataError> {
        if samples == 0 {
            return Err(DataError("zero samples requested".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Array2::<f64>::zeros((samples, FEATURE_COUNT));
        let mut y = Vec::with_capacity(samples);

        for mut out in x.outer_iter_mut() {
            let row = Self::row(&mut Sampler { rng: &mut rng });
            for (dst, src) in out.iter_mut().zip(row.iter()) {
                *dst = *src;
            }

            let flip = rng.gen::<f64>() < LABEL_NOISE;
            y.push((rule_label(hazard, &row) ^ flip) as u8);
        }

        LabeledSet::new(x, y)
    }
}

// ============================================================================
// FEATURE PROVIDER
// ============================================================================

/// Builds a complete feature mapping for a location. Every canonical field is
/// always filled; this is where gap filling belongs, not in validation.
#[derive(Debug)]
pub struct SyntheticFeatureProvider {
    rng: Mutex<StdRng>,
}

impl SyntheticFeatureProvider {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Stand-in when no live weather is available
    pub fn mock_weather(&self) -> WeatherSnapshot {
        let mut rng = self.rng.lock();
        let mut s = Sampler { rng: &mut *rng };
        WeatherSnapshot {
            temperature: s.normal(25.0, 5.0),
            humidity: s.uniform(40.0, 90.0),
            pressure: s.normal(1013.0, 10.0),
            wind_speed: s.exponential(10.0),
            wind_direction: s.uniform(0.0, 360.0),
            rainfall_1h: s.exponential(2.0),
        }
    }

    /// Features as of `date` (temporal fields come from the date)
    pub fn features_on(&self, location: &Location, weather: Option<&WeatherSnapshot>, date: NaiveDate) -> RawFeatures {
        let weather = match weather {
            Some(w) => w.clone(),
            None => self.mock_weather(),
        };
        let lat = location.latitude;
        let month = date.month() as f64;

        let mut rng = self.rng.lock();
        let mut s = Sampler { rng: &mut *rng };

        let values: [f64; FEATURE_COUNT] = [
            // weather
            weather.temperature,
            weather.humidity,
            weather.pressure,
            weather.wind_speed,
            weather.wind_direction,
            weather.rainfall_1h,
            weather.rainfall_1h * s.uniform(15.0, 25.0),
            weather.rainfall_1h * s.uniform(50.0, 150.0),
            weather.rainfall_1h * s.uniform(200.0, 500.0),
            s.normal(0.0, 3.0),
            s.normal(0.0, 5.0),
            // geography
            lat.abs() * 10.0 + s.uniform(0.0, 500.0),
            s.exponential(8.0),
            s.uniform(0.0, 360.0),
            s.exponential(30.0),
            lat.abs() * 111.0 + s.uniform(0.0, 100.0),
            s.randint(1, 10),
            weather.humidity * 0.7 + s.uniform(-10.0, 10.0),
            s.uniform(0.2, 0.8),
            // seismic
            s.exponential(1.5),
            s.exponential(6.0),
            s.exponential(80.0),
            s.uniform(20.0, 80.0),
            s.poisson(3.0),
            // hydrology
            s.uniform(2.0, 10.0),
            s.exponential(300.0),
            s.uniform(10.0, 40.0),
            s.uniform(60.0, 95.0),
            weather.rainfall_1h * s.uniform(1.0, 3.0),
            // atmosphere
            weather.temperature + s.uniform(-2.0, 2.0),
            s.normal(0.0, 3.0),
            s.uniform(5.0, 40.0),
            weather.humidity + s.uniform(-10.0, 10.0),
            lat.abs() / 90.0,
            // temporal
            month,
            season(month),
            date.ordinal() as f64,
            is_monsoon(month),
            // history
            s.poisson(2.0),
            s.poisson(10.0),
            s.exponential(150.0),
            s.uniform(0.3, 0.7),
        ];

        RawFeatures::from_numbers(FEATURE_LAYOUT.iter().copied().zip(values))
    }
}

impl FeatureProvider for SyntheticFeatureProvider {
    fn features(&self, location: &Location, weather: Option<&WeatherSnapshot>) -> RawFeatures {
        self.features_on(location, weather, Utc::now().date_naive())
    }
}
