use crate::error::Error;
use crate::geo::GeoPoint;
use geojson::{Feature, GeoJson, Value};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Immutable reference data for a world city. Loaded once at startup,
/// never mutated or removed during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub id: u32,
    pub name: String,
    pub country: String,
    pub point: GeoPoint,
    pub population: u64,
    pub founded_year: Option<i32>,
    pub landmarks: Vec<String>,
}

/// The static city catalog
#[derive(Debug, Default)]
pub struct Catalog {
    cities: Vec<City>,
}

impl Catalog {
    pub fn from_cities(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// Load cities from a GeoJSON feature collection file. Features with
    /// missing or invalid geometry are skipped with a warning; one bad
    /// feature never aborts the load.
    pub fn load_geojson(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_geojson_str(&content)
    }

    /// Parse cities from GeoJSON text
    pub fn from_geojson_str(content: &str) -> Result<Self, Error> {
        let geojson: GeoJson = content.parse()?;
        let mut cities = Vec::new();

        if let GeoJson::FeatureCollection(fc) = geojson {
            for (idx, feature) in fc.features.into_iter().enumerate() {
                if let Some(city) = parse_city(idx as u32 + 1, feature) {
                    cities.push(city);
                }
            }
        }

        Ok(Self { cities })
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn find(&self, id: u32) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    /// Top-n cities by population, descending
    pub fn top_by_population(&self, count: usize) -> Vec<&City> {
        let mut sorted: Vec<&City> = self.cities.iter().collect();
        sorted.sort_by(|a, b| b.population.cmp(&a.population));
        sorted.truncate(count);
        sorted
    }

    /// Coordinates to center the map on for a city, falling back to the
    /// world view when the id is unknown
    pub fn center_of(&self, id: u32) -> GeoPoint {
        self.find(id)
            .map(|c| c.point)
            .unwrap_or_else(|| GeoPoint::new(20.0, 0.0))
    }

    /// Built-in fallback catalog of major cities, used when no data file
    /// is available
    pub fn builtin() -> Self {
        let city = |id, name: &str, country: &str, lat, lon, population| City {
            id,
            name: name.to_string(),
            country: country.to_string(),
            point: GeoPoint::new(lat, lon),
            population,
            founded_year: None,
            landmarks: Vec::new(),
        };

        Self {
            cities: vec![
                city(1, "New York", "United States", 40.7, -74.0, 18_800_000),
                city(2, "London", "United Kingdom", 51.5, -0.1, 9_000_000),
                city(3, "Paris", "France", 48.9, 2.3, 11_000_000),
                city(4, "Tokyo", "Japan", 35.7, 139.7, 37_400_000),
                city(5, "Sydney", "Australia", -33.9, 151.2, 5_300_000),
                city(6, "Rio de Janeiro", "Brazil", -22.9, -43.2, 13_500_000),
                city(7, "Moscow", "Russia", 55.8, 37.6, 12_500_000),
                city(8, "Beijing", "China", 39.9, 116.4, 21_500_000),
                city(9, "Delhi", "India", 28.6, 77.2, 32_900_000),
                city(10, "Los Angeles", "United States", 34.0, -118.2, 12_400_000),
                city(11, "Mexico City", "Mexico", 19.4, -99.1, 21_800_000),
                city(12, "Buenos Aires", "Argentina", -34.6, -58.4, 15_000_000),
                city(13, "Hanoi", "Vietnam", 21.0285, 105.8542, 8_100_000),
            ],
        }
    }
}

/// Extract a city from a GeoJSON point feature. Population is read from
/// whichever property name is present first.
fn parse_city(fallback_id: u32, feature: Feature) -> Option<City> {
    let props = feature.properties.as_ref();

    let name = props
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let country = props
        .and_then(|p| p.get("country").or_else(|| p.get("adm0name")))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let population = props
        .and_then(|p| {
            p.get("population")
                .or_else(|| p.get("pop_max"))
                .or_else(|| p.get("pop_min"))
        })
        .and_then(|v| v.as_f64())
        .map(|v| v.max(0.0) as u64)
        .unwrap_or(0);

    let founded_year = props
        .and_then(|p| p.get("founded"))
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let landmarks = props
        .and_then(|p| p.get("landmarks"))
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let id = props
        .and_then(|p| p.get("id"))
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(fallback_id);

    let Some(geometry) = feature.geometry else {
        warn!(%name, "city feature has no geometry, skipping");
        return None;
    };

    if let Value::Point(coords) = geometry.value {
        if coords.len() >= 2 {
            // GeoJSON order is lon, lat
            let point = GeoPoint::new(coords[1], coords[0]);
            if !point.is_valid() {
                warn!(%name, lat = point.latitude, lon = point.longitude,
                    "city has invalid coordinates, skipping");
                return None;
            }
            return Some(City {
                id,
                name,
                country,
                point,
                population,
                founded_year,
                landmarks,
            });
        }
    }

    warn!(%name, "city feature has no point geometry, skipping");
    None
}
