//! Loading and merging the raw sales tables

use crate::config::HybridConfig;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Identity of one independent time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub store: u32,
    pub dept: u32,
}

impl GroupKey {
    pub fn new(store: u32, dept: u32) -> Self {
        Self { store, dept }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.store, self.dept)
    }
}

impl FromStr for GroupKey {
    type Err = ForecastError;

    /// Parses the `{store}_{dept}` form used in artifact file names
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ForecastError::InvalidParameter(format!("Invalid group '{s}', expected STORE_DEPT"));
        let (store, dept) = s.split_once('_').ok_or_else(invalid)?;
        Ok(Self {
            store: store.trim().parse().map_err(|_| invalid())?,
            dept: dept.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Exogenous signals carried on every observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Exogenous {
    pub temperature: Option<f64>,
    pub fuel_price: Option<f64>,
    pub cpi: Option<f64>,
    pub unemployment: Option<f64>,
    pub size: Option<f64>,
}

/// Column selector over [`Exogenous`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExogenousColumn {
    Temperature,
    FuelPrice,
    Cpi,
    Unemployment,
    Size,
}

impl ExogenousColumn {
    pub const ALL: [ExogenousColumn; 5] = [
        ExogenousColumn::Temperature,
        ExogenousColumn::FuelPrice,
        ExogenousColumn::Cpi,
        ExogenousColumn::Unemployment,
        ExogenousColumn::Size,
    ];

    /// Column header in the source tables
    pub fn name(self) -> &'static str {
        match self {
            ExogenousColumn::Temperature => "Temperature",
            ExogenousColumn::FuelPrice => "Fuel_Price",
            ExogenousColumn::Cpi => "CPI",
            ExogenousColumn::Unemployment => "Unemployment",
            ExogenousColumn::Size => "Size",
        }
    }

    pub fn get(self, values: &Exogenous) -> Option<f64> {
        match self {
            ExogenousColumn::Temperature => values.temperature,
            ExogenousColumn::FuelPrice => values.fuel_price,
            ExogenousColumn::Cpi => values.cpi,
            ExogenousColumn::Unemployment => values.unemployment,
            ExogenousColumn::Size => values.size,
        }
    }
}

/// One merged (Store, Dept, Date) row
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub store: u32,
    pub dept: u32,
    pub date: NaiveDate,
    pub weekly_sales: f64,
    /// 0 or 1
    pub is_holiday: u8,
    pub exogenous: Exogenous,
    pub store_type: Option<String>,
}

impl Observation {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.store, self.dept)
    }
}

/// The three input tables as read from disk, with normalized column types.
///
/// - `sales`: `Store`, `Dept` (u32), `Date` (i32 days from CE), `Weekly_Sales` (f64), `IsHoliday` (i32 0/1)
/// - `features`: `Store`, `Date`, `IsHoliday` and the four weekly signals (f64, nullable)
/// - `stores`: `Store`, `Type` (str, nullable), `Size` (f64, nullable)
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub sales: DataFrame,
    pub features: DataFrame,
    pub stores: DataFrame,
}

/// All observations sorted by (Store, Dept, Date)
#[derive(Debug, Clone, Default)]
pub struct SalesFrame {
    rows: Vec<Observation>,
}

impl SalesFrame {
    /// Sort and reject duplicate (Store, Dept, Date) keys
    pub fn from_observations(mut rows: Vec<Observation>) -> Result<Self> {
        rows.sort_by(|a, b| (a.key(), a.date).cmp(&(b.key(), b.date)));

        if let Some(pair) = rows
            .windows(2)
            .find(|w| w[0].key() == w[1].key() && w[0].date == w[1].date)
        {
            return Err(ForecastError::DataError(format!(
                "Duplicate observation for group {} on {}",
                pair[0].key(),
                pair[0].date
            )));
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one group, sorted by date; empty if the group is unknown
    pub fn group(&self, key: GroupKey) -> &[Observation] {
        let start = self.rows.partition_point(|r| r.key() < key);
        let end = self.rows.partition_point(|r| r.key() <= key);
        &self.rows[start..end]
    }

    /// Groups in (Store, Dept) order
    pub fn groups(&self) -> Groups<'_> {
        Groups { rest: &self.rows }
    }

    pub fn group_keys(&self) -> Vec<GroupKey> {
        self.groups().map(|(key, _)| key).collect()
    }
}

/// Iterator over the contiguous groups of a [`SalesFrame`]
pub struct Groups<'a> {
    rest: &'a [Observation],
}

impl<'a> Iterator for Groups<'a> {
    type Item = (GroupKey, &'a [Observation]);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.rest.first()?.key();
        let len = self.rest.iter().take_while(|r| r.key() == key).count();
        let (group, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some((key, group))
    }
}

const FEATURE_KEYS: [&str; 3] = ["Store", "Date", "IsHoliday"];
const WEEKLY_SIGNALS: [&str; 4] = ["Temperature", "Fuel_Price", "CPI", "Unemployment"];

fn parse_holiday(raw: &str) -> Option<i32> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "1.0" => Some(1),
        "false" | "0" | "0.0" => Some(0),
        _ => None,
    }
}

/// Column normalization for one input file; errors name the file
struct TableReader<'a> {
    path: &'a Path,
    df: DataFrame,
}

impl<'a> TableReader<'a> {
    fn open(path: &'a Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForecastError::DataError(format!(
                "Input file {} not found",
                path.display()
            )));
        }
        let df = CsvReader::from_path(path)
            .map_err(|e| read_error(path, e))?
            .infer_schema(None)
            .has_header(true)
            .with_null_values(Some(NullValues::AllColumns(
                ["NA", "NaN", "nan"].iter().map(|v| v.to_string()).collect(),
            )))
            .finish()
            .map_err(|e| read_error(path, e))?;
        Ok(Self { path, df })
    }

    fn error(&self, msg: impl fmt::Display) -> ForecastError {
        ForecastError::DataError(format!("{}: {msg}", self.path.display()))
    }

    fn required(&self, name: &str) -> Result<&Series> {
        self.df
            .column(name)
            .map_err(|_| self.error(format!("missing required column {name}")))
    }

    fn ids(&self, name: &str) -> Result<Series> {
        let ids = self
            .required(name)?
            .strict_cast(&DataType::UInt32)
            .map_err(|e| self.error(format!("column {name}: {e}")))?;
        if ids.null_count() > 0 {
            return Err(self.error(format!("column {name} has empty values")));
        }
        Ok(ids)
    }

    fn dates(&self) -> Result<Series> {
        let raw = self.required("Date")?.cast(&DataType::Utf8)?;
        let days = raw
            .utf8()?
            .into_iter()
            .map(|value| {
                let text = value.unwrap_or_default().trim();
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|d| d.num_days_from_ce())
                    .map_err(|_| self.error(format!("invalid Date '{text}'")))
            })
            .collect::<Result<Vec<i32>>>()?;
        Ok(Series::new("Date", days))
    }

    fn holidays(&self) -> Result<Series> {
        let raw = self.required("IsHoliday")?.cast(&DataType::Utf8)?;
        let flags = raw
            .utf8()?
            .into_iter()
            .map(|value| {
                let text = value.unwrap_or_default();
                parse_holiday(text).ok_or_else(|| self.error(format!("invalid IsHoliday value '{text}'")))
            })
            .collect::<Result<Vec<i32>>>()?;
        Ok(Series::new("IsHoliday", flags))
    }

    /// Float column with nulls for missing cells; all null when absent
    fn floats(&self, name: &str) -> Result<Series> {
        match self.df.column(name) {
            Ok(column) => column
                .strict_cast(&DataType::Float64)
                .map_err(|e| self.error(format!("column {name}: {e}"))),
            Err(_) => Ok(Series::full_null(name, self.df.height(), &DataType::Float64)),
        }
    }

    fn sales(self) -> Result<DataFrame> {
        self.required("Weekly_Sales")?;
        let weekly_sales = self.floats("Weekly_Sales")?;
        if weekly_sales.null_count() > 0 {
            return Err(self.error("column Weekly_Sales has empty values"));
        }
        Ok(DataFrame::new(vec![
            self.ids("Store")?,
            self.ids("Dept")?,
            self.dates()?,
            weekly_sales,
            self.holidays()?,
        ])?)
    }

    fn features(self) -> Result<DataFrame> {
        let mut columns = vec![self.ids("Store")?, self.dates()?, self.holidays()?];
        for name in WEEKLY_SIGNALS {
            columns.push(self.floats(name)?);
        }
        Ok(DataFrame::new(columns)?)
    }

    fn stores(self) -> Result<DataFrame> {
        let store_type = match self.df.column("Type") {
            Ok(column) => column.cast(&DataType::Utf8)?,
            Err(_) => Series::full_null("Type", self.df.height(), &DataType::Utf8),
        };
        Ok(DataFrame::new(vec![self.ids("Store")?, store_type, self.floats("Size")?])?)
    }
}

fn read_error(path: &Path, err: PolarsError) -> ForecastError {
    ForecastError::DataError(format!("{}: {err}", path.display()))
}

/// Turn the merged frame back into typed rows
fn observations(df: &DataFrame) -> Result<Vec<Observation>> {
    let stores: Vec<Option<u32>> = df.column("Store")?.u32()?.into_iter().collect();
    let depts: Vec<Option<u32>> = df.column("Dept")?.u32()?.into_iter().collect();
    let dates: Vec<Option<i32>> = df.column("Date")?.i32()?.into_iter().collect();
    let sales: Vec<Option<f64>> = df.column("Weekly_Sales")?.f64()?.into_iter().collect();
    let holidays: Vec<Option<i32>> = df.column("IsHoliday")?.i32()?.into_iter().collect();
    let store_types: Vec<Option<String>> = df
        .column("Type")?
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    let mut signals = Vec::with_capacity(ExogenousColumn::ALL.len());
    for column in ExogenousColumn::ALL {
        let values: Vec<Option<f64>> = df.column(column.name())?.f64()?.into_iter().collect();
        signals.push(values);
    }

    (0..df.height())
        .map(|i| {
            let (Some(store), Some(dept), Some(days), Some(weekly_sales)) =
                (stores[i], depts[i], dates[i], sales[i])
            else {
                return Err(ForecastError::DataError(format!(
                    "Merged row {i} lacks Store, Dept, Date or Weekly_Sales"
                )));
            };
            let date = NaiveDate::from_num_days_from_ce_opt(days).ok_or_else(|| {
                ForecastError::DataError(format!("Merged row {i} has day number {days} out of range"))
            })?;
            Ok(Observation {
                store,
                dept,
                date,
                weekly_sales,
                is_holiday: u8::from(holidays[i] == Some(1)),
                exogenous: Exogenous {
                    temperature: signals[0][i],
                    fuel_price: signals[1][i],
                    cpi: signals[2][i],
                    unemployment: signals[3][i],
                    size: signals[4][i],
                },
                store_type: store_types[i].clone(),
            })
        })
        .collect()
}

/// Data loader for the sales, features and stores tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Read `train.csv`, `features.csv` and `stores.csv` from `data_dir`
    pub fn load_raw<P: AsRef<Path>>(data_dir: P) -> Result<RawTables> {
        let dir = data_dir.as_ref();
        Ok(RawTables {
            sales: TableReader::open(&dir.join("train.csv"))?.sales()?,
            features: TableReader::open(&dir.join("features.csv"))?.features()?,
            stores: TableReader::open(&dir.join("stores.csv"))?.stores()?,
        })
    }

    /// Left-join features on (Store, Date, IsHoliday) and stores on Store,
    /// sort by (Store, Dept, Date), then forward and backward fill every
    /// exogenous column within each (Store, Dept) group.
    ///
    /// Repeated keys in the features or stores table keep their first row.
    pub fn merge(tables: RawTables) -> Result<SalesFrame> {
        let feature_keys = || FEATURE_KEYS.map(col);
        let features = tables.features.lazy().unique_stable(
            Some(FEATURE_KEYS.iter().map(|k| k.to_string()).collect()),
            UniqueKeepStrategy::First,
        );
        let stores = tables
            .stores
            .lazy()
            .unique_stable(Some(vec!["Store".to_string()]), UniqueKeepStrategy::First);

        let filled: Vec<Expr> = ExogenousColumn::ALL
            .iter()
            .map(|c| {
                col(c.name())
                    .forward_fill(None)
                    .backward_fill(None)
                    .over([col("Store"), col("Dept")])
            })
            .collect();

        let merged = tables
            .sales
            .lazy()
            .join(
                features,
                feature_keys(),
                feature_keys(),
                JoinArgs::new(JoinType::Left),
            )
            .left_join(stores, col("Store"), col("Store"))
            .sort_by_exprs([col("Store"), col("Dept"), col("Date")], [false, false, false], false, true)
            .with_columns(filled)
            .collect()?;

        SalesFrame::from_observations(observations(&merged)?)
    }

    /// Load and merge the configured input tables
    pub fn build_base_frame(config: &HybridConfig) -> Result<SalesFrame> {
        let tables = Self::load_raw(&config.paths.data_dir)?;
        debug!(
            sales = tables.sales.height(),
            features = tables.features.height(),
            stores = tables.stores.height(),
            "loaded raw tables"
        );
        let frame = Self::merge(tables)?;
        info!(rows = frame.len(), "built base frame");
        Ok(frame)
    }
}

/// Split rows at `test_start`: strictly earlier dates train, the rest test
pub fn train_test_split(
    rows: &[Observation],
    test_start: NaiveDate,
) -> (Vec<Observation>, Vec<Observation>) {
    rows.iter().cloned().partition(|r| r.date < test_start)
}
