use crate::error::Error;
use crate::geo::GeoPoint;
use crate::hash::{hash2, rand_normal};
use serde::Deserialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One entry of the live-location feed as received on the wire.
/// Untrusted input: coordinates are validated before entering the roster.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRecord {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(default)]
    pub budget: Option<u8>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
}

/// A live entity as tracked between feed updates. Coordinates mutate on
/// every update; the id is stable for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEntity {
    pub id: String,
    pub point: GeoPoint,
    pub name: String,
    pub budget: Option<u8>,
    pub bio: Option<String>,
    pub age: Option<u8>,
}

impl LiveEntity {
    fn from_record(rec: FeedRecord) -> Option<Self> {
        let point = GeoPoint::new(rec.latitude, rec.longitude);
        if !point.is_valid() {
            warn!(id = %rec.id, lat = rec.latitude, lon = rec.longitude,
                "feed entry has invalid coordinates, dropping");
            return None;
        }
        Some(Self {
            id: rec.id,
            point,
            name: rec.name,
            budget: rec.budget,
            bio: rec.bio,
            age: rec.age,
        })
    }
}

/// Parse a JSON feed batch. simd-json parses in place, so the buffer is
/// taken mutably and clobbered.
pub fn parse_feed(buf: &mut [u8]) -> Result<Vec<FeedRecord>, Error> {
    Ok(simd_json::serde::from_slice(buf)?)
}

/// A change pushed by the realtime feed
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Full feed snapshot; ids missing from it stopped reporting
    Snapshot(Vec<FeedRecord>),
    /// Single-entity position/attribute update
    Update(FeedRecord),
    /// The owning account signed out
    Remove(String),
}

/// Owned view of every entity the feed currently reports
#[derive(Debug, Default)]
pub struct Roster {
    entities: HashMap<String, LiveEntity>,
}

impl Roster {
    /// Replace the roster with a full feed snapshot. Entities missing
    /// from the snapshot are dropped (their session ended).
    pub fn apply_snapshot(&mut self, records: Vec<FeedRecord>) {
        let mut next = HashMap::with_capacity(records.len());
        for rec in records {
            if let Some(entity) = LiveEntity::from_record(rec) {
                next.insert(entity.id.clone(), entity);
            }
        }
        self.entities = next;
    }

    /// Upsert a single entity from a realtime push event
    pub fn apply_update(&mut self, record: FeedRecord) {
        if let Some(entity) = LiveEntity::from_record(record) {
            self.entities.insert(entity.id.clone(), entity);
        }
    }

    /// Remove an entity; true when it was present
    pub fn remove(&mut self, id: &str) -> bool {
        self.entities.remove(id).is_some()
    }

    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Snapshot(records) => self.apply_snapshot(records),
            FeedEvent::Update(record) => self.apply_update(record),
            FeedEvent::Remove(id) => {
                self.remove(&id);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&LiveEntity> {
        self.entities.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Handle on a realtime feed subscription. The pump task selects on the
/// token; teardown is synchronous and idempotent, so unsubscribing twice
/// is a no-op.
#[derive(Debug, Clone, Default)]
pub struct FeedSubscription {
    token: CancellationToken,
}

impl FeedSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the pump task to select on
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Availability of the viewer position source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Prompt,
    Denied,
    Unavailable,
}

/// The viewer's position as supplied by the platform. The pipeline must
/// function with no position at all: radius filters become no-ops and
/// per-entity viewer distances are unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPosition {
    pub status: PermissionStatus,
    pub point: Option<GeoPoint>,
}

impl ViewerPosition {
    pub fn granted(point: GeoPoint) -> Self {
        Self {
            status: PermissionStatus::Granted,
            point: Some(point),
        }
    }

    pub fn denied() -> Self {
        Self {
            status: PermissionStatus::Denied,
            point: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: PermissionStatus::Unavailable,
            point: None,
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        self.point
    }
}

impl Default for ViewerPosition {
    fn default() -> Self {
        Self {
            status: PermissionStatus::Prompt,
            point: None,
        }
    }
}

/// Deterministic synthetic feed: `count` users normally scattered around
/// `center` (Box-Muller over splitmix64, so the same seed reproduces the
/// same crowd). Used by the demo binary, benches and tests.
pub fn mock_feed(seed: u64, center: GeoPoint, std_dev_deg: f64, count: usize) -> Vec<FeedRecord> {
    (0..count)
        .map(|i| {
            let s = hash2(seed, i as u64);
            FeedRecord {
                id: format!("mock-{i}"),
                latitude: rand_normal(s, center.latitude, std_dev_deg),
                longitude: rand_normal(hash2(s, 2), center.longitude, std_dev_deg),
                name: format!("Mock User {i}"),
                budget: Some((s % 3) as u8 + 1),
                bio: None,
                age: Some(18 + (s % 50) as u8),
            }
        })
        .collect()
}
