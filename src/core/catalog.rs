//! The car catalog with search, brand filtering and sorting

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSpecs {
    pub battery: String,
    pub range: String,
    pub zero_to_sixty: String,
    pub top_speed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: u32,
    pub name: String,
    pub brand: String,
    pub btc_price: f64,
    pub image: String,
    pub specs: CarSpecs,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Leading number of a spec string such as `"75 kWh"` or `"330 mi"`, or 0.
fn spec_value(spec: &str) -> f64 {
    spec.split_whitespace()
        .next()
        .and_then(|n| n.parse::<f64>().ok())
        .unwrap_or(0.0)
}

impl Car {
    pub fn battery_kwh(&self) -> f64 {
        spec_value(&self.specs.battery)
    }

    pub fn range_miles(&self) -> f64 {
        spec_value(&self.specs.range)
    }

    pub fn top_speed_mph(&self) -> f64 {
        spec_value(&self.specs.top_speed)
    }

    pub fn zero_to_sixty_secs(&self) -> f64 {
        spec_value(&self.specs.zero_to_sixty)
    }

    fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Default,
    PriceAsc,
    PriceDesc,
    BatteryDesc,
    BatteryAsc,
    RangeDesc,
    RangeAsc,
    TopSpeedDesc,
    TopSpeedAsc,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SortOrder::Default => "default",
                SortOrder::PriceAsc => "price-asc",
                SortOrder::PriceDesc => "price-desc",
                SortOrder::BatteryDesc => "battery-desc",
                SortOrder::BatteryAsc => "battery-asc",
                SortOrder::RangeDesc => "range-desc",
                SortOrder::RangeAsc => "range-asc",
                SortOrder::TopSpeedDesc => "top-speed-desc",
                SortOrder::TopSpeedAsc => "top-speed-asc",
            }
        )
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(SortOrder::Default),
            "price-asc" => Ok(SortOrder::PriceAsc),
            "price-desc" => Ok(SortOrder::PriceDesc),
            "battery-desc" => Ok(SortOrder::BatteryDesc),
            "battery-asc" => Ok(SortOrder::BatteryAsc),
            "range-desc" => Ok(SortOrder::RangeDesc),
            "range-asc" => Ok(SortOrder::RangeAsc),
            "top-speed-desc" => Ok(SortOrder::TopSpeedDesc),
            "top-speed-asc" => Ok(SortOrder::TopSpeedAsc),
            _ => Err(anyhow::anyhow!("Invalid sort order: {}", s)),
        }
    }
}

impl SortOrder {
    fn compare(&self, a: &Car, b: &Car) -> Ordering {
        let by = |x: f64, y: f64| x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        match self {
            SortOrder::Default => a.id.cmp(&b.id),
            SortOrder::PriceAsc => by(a.btc_price, b.btc_price),
            SortOrder::PriceDesc => by(b.btc_price, a.btc_price),
            SortOrder::BatteryDesc => by(b.battery_kwh(), a.battery_kwh()),
            SortOrder::BatteryAsc => by(a.battery_kwh(), b.battery_kwh()),
            SortOrder::RangeDesc => by(b.range_miles(), a.range_miles()),
            SortOrder::RangeAsc => by(a.range_miles(), b.range_miles()),
            SortOrder::TopSpeedDesc => by(b.top_speed_mph(), a.top_speed_mph()),
            SortOrder::TopSpeedAsc => by(a.top_speed_mph(), b.top_speed_mph()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CarFilter {
    pub search: Option<String>,
    /// `None` or `"All"` keeps every brand
    pub brand: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("No car with id {0}")]
    NotFound(u32),
}

#[derive(Debug, Clone)]
pub struct Catalog {
    cars: Vec<Car>,
}

impl Catalog {
    pub fn new(cars: Vec<Car>) -> Self {
        Self { cars }
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> Result<Self> {
        let cars: Vec<Car> = serde_yaml::from_str(include_str!("../../data/catalog.yaml"))
            .context("Failed to parse built-in catalog")?;
        Ok(Self::new(cars))
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn find(&self, id: u32) -> Result<&Car, CatalogError> {
        self.cars
            .iter()
            .find(|c| c.id == id)
            .ok_or(CatalogError::NotFound(id))
    }

    /// Distinct brands in catalog order
    pub fn brands(&self) -> Vec<&str> {
        let mut brands: Vec<&str> = Vec::new();
        for car in &self.cars {
            if !brands.contains(&car.brand.as_str()) {
                brands.push(&car.brand);
            }
        }
        brands
    }

    pub fn filter(&self, filter: &CarFilter) -> Vec<&Car> {
        let mut cars: Vec<&Car> = self
            .cars
            .iter()
            .filter(|car| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|query| car.matches_query(query))
            })
            .filter(|car| match filter.brand.as_deref() {
                None | Some("All") => true,
                Some(brand) => car.brand == brand,
            })
            .collect();
        // Stable, so ties keep catalog order
        cars.sort_by(|a, b| filter.sort.compare(a, b));
        cars
    }
}
