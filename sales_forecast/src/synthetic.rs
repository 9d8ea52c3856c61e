//! Synthetic Walmart-shaped input tables
//!
//! Sales follow a linear trend, a yearly cycle and a holiday bump, plus a
//! fuel-price effect that only the residual model can see.

use crate::error::{ForecastError, Result};
use crate::utils::write_csv;
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use serde::Serialize;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tracing::info;

/// ISO weeks flagged as holidays (Super Bowl, Labor Day, Thanksgiving, Christmas)
const HOLIDAY_WEEKS: [u32; 4] = [6, 36, 47, 52];

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub stores: u32,
    pub depts: u32,
    /// First Friday of the series
    pub start: NaiveDate,
    pub weeks: usize,
    pub seed: u64,
    pub noise_sd: f64,
    /// Sales change per unit of fuel price above its mean
    pub fuel_effect: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            stores: 2,
            depts: 2,
            start: NaiveDate::from_ymd_opt(2010, 2, 5).unwrap_or(NaiveDate::MIN),
            weeks: 156,
            seed: 7,
            noise_sd: 150.0,
            fuel_effect: 4000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct SalesRow {
    #[serde(rename = "Store")]
    store: u32,
    #[serde(rename = "Dept")]
    dept: u32,
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Weekly_Sales")]
    weekly_sales: f64,
    #[serde(rename = "IsHoliday")]
    is_holiday: bool,
}

#[derive(Debug, Clone, Serialize)]
struct FeaturesRow {
    #[serde(rename = "Store")]
    store: u32,
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Fuel_Price")]
    fuel_price: f64,
    #[serde(rename = "CPI")]
    cpi: f64,
    #[serde(rename = "Unemployment")]
    unemployment: f64,
    #[serde(rename = "IsHoliday")]
    is_holiday: bool,
}

#[derive(Debug, Clone, Serialize)]
struct StoresRow {
    #[serde(rename = "Store")]
    store: u32,
    #[serde(rename = "Type")]
    store_type: String,
    #[serde(rename = "Size")]
    size: f64,
}

const FUEL_LOW: f64 = 2.5;
const FUEL_HIGH: f64 = 4.0;

/// Write `train.csv`, `features.csv` and `stores.csv` into `dir`
pub fn write_demo_data(dir: &Path, spec: &SyntheticSpec) -> Result<()> {
    if spec.stores == 0 || spec.depts == 0 || spec.weeks == 0 {
        return Err(ForecastError::InvalidParameter(
            "Stores, departments and weeks must all be positive".to_string(),
        ));
    }
    let noise = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| ForecastError::InvalidParameter(format!("noise_sd: {e}")))?;
    let fuel = Uniform::new(FUEL_LOW, FUEL_HIGH);
    let fuel_mean = (FUEL_LOW + FUEL_HIGH) / 2.0;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let mut sales = Vec::new();
    let mut features = Vec::new();
    let mut stores = Vec::new();

    for store in 1..=spec.stores {
        stores.push(StoresRow {
            store,
            store_type: if store % 3 == 0 { "B" } else { "A" }.to_string(),
            size: 150_000.0 + 10_000.0 * f64::from(store),
        });

        for week in 0..spec.weeks {
            let date = spec.start + Duration::weeks(week as i64);
            let is_holiday = HOLIDAY_WEEKS.contains(&date.iso_week().week());
            let season = (2.0 * PI * f64::from(date.ordinal()) / 365.25).sin();
            let fuel_price = fuel.sample(&mut rng);

            features.push(FeaturesRow {
                store,
                date,
                temperature: 60.0 + 25.0 * season + rng.gen_range(-3.0..3.0),
                fuel_price,
                cpi: 211.0 + 0.05 * week as f64,
                unemployment: 8.0 - 0.005 * week as f64,
                is_holiday,
            });

            for dept in 1..=spec.depts {
                let level = 10_000.0 + 2_000.0 * f64::from(store) + 500.0 * f64::from(dept);
                let holiday_bump = if is_holiday { 3_000.0 } else { 0.0 };
                let weekly_sales = level
                    + 15.0 * week as f64
                    + 1_500.0 * season
                    + holiday_bump
                    + spec.fuel_effect * (fuel_price - fuel_mean)
                    + noise.sample(&mut rng);
                sales.push(SalesRow {
                    store,
                    dept,
                    date,
                    weekly_sales,
                    is_holiday,
                });
            }
        }
    }

    fs::create_dir_all(dir)?;
    write_csv(&dir.join("train.csv"), &sales)?;
    write_csv(&dir.join("features.csv"), &features)?;
    write_csv(&dir.join("stores.csv"), &stores)?;
    info!(
        rows = sales.len(),
        stores = spec.stores,
        depts = spec.depts,
        dir = %dir.display(),
        "wrote synthetic data"
    );
    Ok(())
}
