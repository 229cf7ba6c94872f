use crate::error::Error;
use crate::feed::LiveEntity;
use crate::geo::{self, GeoPoint};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Distance from home below which an entity counts as Local
pub const LOCAL_THRESHOLD_KM: f64 = 50.0;

/// Whether an entity is near its registered home position or far from it.
/// Entities with no home location default to Traveller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TravelStatus {
    Local,
    Traveller,
}

/// Profile fields fetched separately from the live feed, keyed by entity
/// id. Every field is optional; a missing record is a valid state, not an
/// error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileAttributes {
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub languages: HashSet<String>,
    #[serde(default)]
    pub cuisines: HashSet<String>,
    #[serde(default)]
    pub home_latitude: Option<f64>,
    #[serde(default)]
    pub home_longitude: Option<f64>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileAttributes {
    /// Home location when both components are present and sane
    pub fn home(&self) -> Option<GeoPoint> {
        let point = GeoPoint::new(self.home_latitude?, self.home_longitude?);
        point.is_valid().then_some(point)
    }
}

/// A live entity merged with its profile attributes and derived fields.
/// Derived fields are recomputed on every pass, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedEntity {
    pub live: LiveEntity,
    pub profile: ProfileAttributes,
    pub status: TravelStatus,
    pub distance_from_viewer: Option<f64>,
}

impl EnrichedEntity {
    pub fn id(&self) -> &str {
        &self.live.id
    }

    pub fn point(&self) -> GeoPoint {
        self.live.point
    }

    /// Age as reported by the profile, falling back to the feed
    pub fn age(&self) -> Option<u8> {
        self.profile.age.or(self.live.age)
    }
}

/// Travel status from the distance between current and home positions
pub fn derive_status(current: GeoPoint, home: Option<GeoPoint>) -> TravelStatus {
    match home {
        Some(home) if geo::haversine_km(current, home) <= LOCAL_THRESHOLD_KM => {
            TravelStatus::Local
        }
        _ => TravelStatus::Traveller,
    }
}

/// Merge live entities with profile attributes and derive per-entity
/// fields. Total: every input produces exactly one output; profile gaps
/// become defaults and never fail the pass.
pub fn enrich(
    live: &[LiveEntity],
    profiles: &ProfileStore,
    viewer: Option<GeoPoint>,
) -> Vec<EnrichedEntity> {
    live.iter()
        .map(|entity| {
            let profile = profiles.get(&entity.id).cloned().unwrap_or_default();
            let status = derive_status(entity.point, profile.home());
            let distance_from_viewer = viewer.map(|v| geo::haversine_km(v, entity.point));
            EnrichedEntity {
                live: entity.clone(),
                profile,
                status,
                distance_from_viewer,
            }
        })
        .collect()
}

/// Profile attribute source collaborator. Returns a partial map; ids
/// missing from the result mean "no profile", not an error.
#[allow(async_fn_in_trait)]
pub trait ProfileSource {
    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, ProfileAttributes>, Error>;
}

/// Profile attributes by entity id, stamped with a monotonic fetch
/// sequence so a fetch that completes out of order cannot overwrite
/// fresher data with a stale batch.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: HashMap<String, (ProfileAttributes, u64)>,
    fetch_seq: u64,
}

impl ProfileStore {
    /// Stamp handed to an outgoing fetch; pass it back to `merge`
    pub fn begin_fetch(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.fetch_seq
    }

    /// Merge a fetched batch. Ids already holding a newer stamp keep
    /// their attributes. Returns how many records were applied.
    pub fn merge(&mut self, batch: HashMap<String, ProfileAttributes>, seq: u64) -> usize {
        let mut applied = 0;
        for (id, attrs) in batch {
            if let Some((_, held)) = self.profiles.get(&id) {
                if *held > seq {
                    continue;
                }
            }
            self.profiles.insert(id, (attrs, seq));
            applied += 1;
        }
        applied
    }

    pub fn get(&self, id: &str) -> Option<&ProfileAttributes> {
        self.profiles.get(id).map(|(attrs, _)| attrs)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
