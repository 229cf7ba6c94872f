use crate::catalog::City;
use crate::enrich::{EnrichedEntity, TravelStatus};
use crate::geo::{self, GeoPoint};
use std::collections::HashSet;

/// Inclusive population bounds; the default filters nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationRange {
    pub min: u64,
    pub max: u64,
}

impl PopulationRange {
    pub const UNBOUNDED: Self = Self {
        min: 0,
        max: u64::MAX,
    };

    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, population: u64) -> bool {
        population >= self.min && population <= self.max
    }
}

impl Default for PopulationRange {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Inclusive age bounds. The untouched default range filters nothing;
/// a narrowed range excludes entities whose age is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub const DEFAULT: Self = Self { min: 18, max: 99 };

    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    pub fn contains(&self, age: u8) -> bool {
        age >= self.min && age <= self.max
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Immutable snapshot of every active filter.
///
/// The radius filter and the category filters (country, population,
/// search) are mutually exclusive: applying one side cancels the other.
/// User-attribute filters compose freely with both.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterState {
    pub country: Option<String>,
    pub population: PopulationRange,
    pub search: Option<String>,
    pub radius_km: Option<f64>,
    pub local_status: Option<HashSet<TravelStatus>>,
    pub budget: Option<HashSet<u8>>,
    pub gender: Option<HashSet<String>>,
    pub age: AgeRange,
    pub languages: Option<HashSet<String>>,
    pub cuisines: Option<HashSet<String>>,
}

/// A single filter mutation request. Mutations queue up during the
/// debounce window and replay in order when it fires, so the last value
/// wins per field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterMutation {
    Country(Option<String>),
    Population(u64, u64),
    Search(Option<String>),
    Radius(Option<f64>),
    LocalStatus(Option<HashSet<TravelStatus>>),
    Budget(Option<HashSet<u8>>),
    Gender(Option<HashSet<String>>),
    Age(u8, u8),
    Languages(Option<HashSet<String>>),
    Cuisines(Option<HashSet<String>>),
}

impl FilterState {
    /// Apply one mutation, enforcing the radius/category exclusion:
    /// a category filter cancels the radius, and setting the radius
    /// clears the country and resets the population bounds.
    pub fn apply(&mut self, mutation: FilterMutation) {
        match mutation {
            FilterMutation::Country(country) => {
                self.country = country;
                self.radius_km = None;
            }
            FilterMutation::Population(min, max) => {
                self.population = PopulationRange::new(min, max);
                self.radius_km = None;
            }
            FilterMutation::Search(term) => {
                self.search = term;
                self.radius_km = None;
            }
            FilterMutation::Radius(radius_km) => {
                self.radius_km = radius_km;
                self.country = None;
                self.population = PopulationRange::UNBOUNDED;
            }
            FilterMutation::LocalStatus(statuses) => self.local_status = statuses,
            FilterMutation::Budget(budgets) => self.budget = budgets,
            FilterMutation::Gender(genders) => self.gender = genders,
            FilterMutation::Age(min, max) => self.age = AgeRange::new(min, max),
            FilterMutation::Languages(languages) => self.languages = languages,
            FilterMutation::Cuisines(cuisines) => self.cuisines = cuisines,
        }
    }

    /// Radius containment; inert when the viewer position is unknown
    fn passes_radius(&self, point: GeoPoint, viewer: Option<GeoPoint>) -> bool {
        match (self.radius_km, viewer) {
            (Some(radius_km), Some(viewer)) => geo::is_within_radius(viewer, point, radius_km),
            _ => true,
        }
    }

    /// Whether a city passes every active filter. A min > max population
    /// range is accepted as-is and selects nothing.
    pub fn passes_city(&self, city: &City, viewer: Option<GeoPoint>) -> bool {
        if let Some(country) = &self.country {
            if city.country != *country {
                return false;
            }
        }
        if !self.population.contains(city.population) {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !city.name.to_lowercase().contains(&term)
                && !city.country.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        self.passes_radius(city.point, viewer)
    }

    /// Whether a live entity passes every active filter. Country and
    /// population apply to cities only; attribute filters use membership
    /// semantics, and languages/cuisines require every requested tag.
    pub fn passes_user(&self, user: &EnrichedEntity, viewer: Option<GeoPoint>) -> bool {
        if let Some(term) = &self.search {
            if !user.live.name.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }
        if !self.passes_radius(user.point(), viewer) {
            return false;
        }
        if let Some(statuses) = &self.local_status {
            if !statuses.contains(&user.status) {
                return false;
            }
        }
        if let Some(budgets) = &self.budget {
            match user.live.budget {
                Some(budget) if budgets.contains(&budget) => {}
                _ => return false,
            }
        }
        if let Some(genders) = &self.gender {
            match &user.profile.gender {
                Some(gender) if genders.contains(gender) => {}
                _ => return false,
            }
        }
        if !self.age.is_default() {
            match user.age() {
                Some(age) if self.age.contains(age) => {}
                _ => return false,
            }
        }
        if let Some(languages) = &self.languages {
            if !languages.iter().all(|l| user.profile.languages.contains(l)) {
                return false;
            }
        }
        if let Some(cuisines) = &self.cuisines {
            if !cuisines.iter().all(|c| user.profile.cuisines.contains(c)) {
                return false;
            }
        }
        true
    }

    pub fn filter_cities<'a>(&self, cities: &'a [City], viewer: Option<GeoPoint>) -> Vec<&'a City> {
        cities
            .iter()
            .filter(|city| self.passes_city(city, viewer))
            .collect()
    }

    pub fn filter_users<'a>(
        &self,
        users: &'a [EnrichedEntity],
        viewer: Option<GeoPoint>,
    ) -> Vec<&'a EnrichedEntity> {
        users
            .iter()
            .filter(|user| self.passes_user(user, viewer))
            .collect()
    }
}
