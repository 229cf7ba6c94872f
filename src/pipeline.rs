use crate::aggregate::{aggregate, MapItem, Tile};
use crate::catalog::{Catalog, City};
use crate::enrich::{enrich, EnrichedEntity, ProfileSource, ProfileStore, TravelStatus};
use crate::error::Error;
use crate::feed::{FeedEvent, LiveEntity, Roster, ViewerPosition};
use crate::filter::{FilterMutation, FilterState};
use crate::tile::TileId;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pipeline tunables
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Trailing debounce window for filter mutations
    pub debounce: Duration,
    /// Angular tile resolution in degrees
    pub tile_resolution_deg: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            tile_resolution_deg: 0.1,
        }
    }
}

enum Command {
    Mutate(FilterMutation),
    Reset,
}

/// Handle to the debounced filter state machine.
///
/// Mutations are collapsed by a trailing window: every mutation restarts
/// the timer, and when the window elapses with no further input the
/// queued mutations replay in order into a single published state, so
/// consumers observe one recomputation per burst. `reset` bypasses the
/// window and applies immediately.
#[derive(Clone)]
pub struct FilterHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<FilterState>,
}

impl FilterHandle {
    pub fn set_country(&self, country: Option<String>) {
        self.send(FilterMutation::Country(country));
    }

    pub fn set_population_range(&self, min: u64, max: u64) {
        self.send(FilterMutation::Population(min, max));
    }

    pub fn set_search(&self, term: Option<String>) {
        self.send(FilterMutation::Search(term));
    }

    pub fn set_radius(&self, radius_km: Option<f64>) {
        self.send(FilterMutation::Radius(radius_km));
    }

    pub fn set_local_status(&self, statuses: Option<HashSet<TravelStatus>>) {
        self.send(FilterMutation::LocalStatus(statuses));
    }

    pub fn set_budget(&self, budgets: Option<HashSet<u8>>) {
        self.send(FilterMutation::Budget(budgets));
    }

    pub fn set_gender(&self, genders: Option<HashSet<String>>) {
        self.send(FilterMutation::Gender(genders));
    }

    pub fn set_age(&self, min: u8, max: u8) {
        self.send(FilterMutation::Age(min, max));
    }

    pub fn set_languages(&self, languages: Option<HashSet<String>>) {
        self.send(FilterMutation::Languages(languages));
    }

    pub fn set_cuisines(&self, cuisines: Option<HashSet<String>>) {
        self.send(FilterMutation::Cuisines(cuisines));
    }

    /// Drop any pending mutations and return every field to its default
    /// immediately. A full reset must be perceived as instantaneous.
    pub fn reset(&self) {
        let _ = self.tx.send(Command::Reset);
    }

    fn send(&self, mutation: FilterMutation) {
        let _ = self.tx.send(Command::Mutate(mutation));
    }

    /// Receiver for applied filter states. `changed()` fires once per
    /// application, not once per mutation.
    pub fn watch(&self) -> watch::Receiver<FilterState> {
        self.state.clone()
    }

    pub fn current(&self) -> FilterState {
        self.state.borrow().clone()
    }
}

/// Spawn the filter task. The handle is cheap to clone; cancel the token
/// to tear the task down.
pub fn spawn_filter(config: &PipelineConfig, cancel: CancellationToken) -> FilterHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(FilterState::default());
    let window = config.debounce;

    tokio::spawn(async move {
        let mut state = FilterState::default();
        let mut pending: Vec<FilterMutation> = Vec::new();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = rx.recv() => {
                    match cmd {
                        None => break,
                        Some(Command::Mutate(mutation)) => {
                            pending.push(mutation);
                            deadline = Some(Instant::now() + window);
                        }
                        Some(Command::Reset) => {
                            pending.clear();
                            deadline = None;
                            state = FilterState::default();
                            let _ = state_tx.send(state.clone());
                        }
                    }
                }
                // trailing edge of the debounce window
                _ = async { sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                    for mutation in pending.drain(..) {
                        state.apply(mutation);
                    }
                    deadline = None;
                    debug!(?state, "filters applied");
                    let _ = state_tx.send(state.clone());
                }
            }
        }
    });

    FilterHandle {
        tx,
        state: state_rx,
    }
}

/// Output of one recomputation pass
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub cities: Vec<City>,
    pub users: Vec<EnrichedEntity>,
    pub tiles: HashMap<TileId, Tile>,
}

/// Owns the catalog, the live roster, profile attributes and viewer
/// state, and recomputes the filtered and tiled view on demand. The
/// filter state and entity caches are mutated only through these
/// operations, never from outside.
pub struct MapPipeline {
    config: PipelineConfig,
    catalog: Catalog,
    roster: Roster,
    profiles: ProfileStore,
    viewer: ViewerPosition,
    viewer_id: Option<String>,
    filters: FilterState,
    snapshot: ViewSnapshot,
}

impl MapPipeline {
    pub fn new(config: PipelineConfig, catalog: Catalog) -> Self {
        Self {
            config,
            catalog,
            roster: Roster::default(),
            profiles: ProfileStore::default(),
            viewer: ViewerPosition::default(),
            viewer_id: None,
            filters: FilterState::default(),
            snapshot: ViewSnapshot::default(),
        }
    }

    pub fn set_viewer(&mut self, id: Option<String>, position: ViewerPosition) {
        self.viewer_id = id;
        self.viewer = position;
    }

    /// Install an applied filter state (from the debounced handle)
    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
    }

    pub fn apply_feed(&mut self, event: FeedEvent) {
        self.roster.apply(event);
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Fetch profile attributes for every roster id through the
    /// collaborator. On failure the previous attributes stay in place,
    /// the error is reported upward, and the pipeline keeps serving the
    /// last-known-good snapshot.
    pub async fn refresh_profiles<S: ProfileSource>(&mut self, source: &S) -> Result<usize, Error> {
        let ids: Vec<String> = self.roster.iter().map(|e| e.id.clone()).collect();
        let seq = self.profiles.begin_fetch();
        let batch = source.fetch(&ids).await?;
        Ok(self.profiles.merge(batch, seq))
    }

    /// Recompute enrichment, filtering and aggregation synchronously.
    /// Derived fields are always rebuilt from the current inputs; nothing
    /// is patched incrementally across passes.
    pub fn rebuild(&mut self) -> &ViewSnapshot {
        let viewer_point = self.viewer.point();

        let live: Vec<LiveEntity> = self.roster.iter().cloned().collect();
        let enriched = enrich(&live, &self.profiles, viewer_point);

        let cities: Vec<City> = self
            .filters
            .filter_cities(self.catalog.cities(), viewer_point)
            .into_iter()
            .cloned()
            .collect();
        let users: Vec<EnrichedEntity> = self
            .filters
            .filter_users(&enriched, viewer_point)
            .into_iter()
            .cloned()
            .collect();

        let items = cities
            .iter()
            .cloned()
            .map(MapItem::City)
            .chain(users.iter().cloned().map(MapItem::User));
        let tiles = aggregate(
            items,
            self.viewer_id.as_deref(),
            self.config.tile_resolution_deg,
        );

        debug!(
            cities = cities.len(),
            users = users.len(),
            tiles = tiles.len(),
            "view rebuilt"
        );
        self.snapshot = ViewSnapshot {
            cities,
            users,
            tiles,
        };
        &self.snapshot
    }

    /// Last computed view; possibly stale until the next `rebuild`
    pub fn snapshot(&self) -> &ViewSnapshot {
        &self.snapshot
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{mock_feed, FeedRecord};
    use crate::geo::GeoPoint;

    fn hanoi() -> GeoPoint {
        GeoPoint::new(21.0285, 105.8542)
    }

    #[test]
    fn test_rebuild_covers_all_entities_exactly_once() {
        let mut pipeline = MapPipeline::new(PipelineConfig::default(), Catalog::builtin());
        pipeline.apply_feed(FeedEvent::Snapshot(mock_feed(3, hanoi(), 0.05, 25)));
        pipeline.set_viewer(Some("mock-0".to_string()), ViewerPosition::granted(hanoi()));

        let snapshot = pipeline.rebuild();
        let total: usize = snapshot.tiles.values().map(|t| t.items.len()).sum();
        assert_eq!(total, snapshot.cities.len() + snapshot.users.len());
        assert_eq!(snapshot.users.len(), 25);
        assert!(snapshot
            .tiles
            .values()
            .any(|t| t.contains_viewer));
    }

    #[test]
    fn test_rebuild_without_viewer_keeps_radius_inert() {
        let mut pipeline = MapPipeline::new(PipelineConfig::default(), Catalog::builtin());
        pipeline.apply_feed(FeedEvent::Snapshot(mock_feed(3, hanoi(), 0.05, 10)));

        let mut filters = FilterState::default();
        filters.apply(FilterMutation::Radius(Some(50.0)));
        pipeline.set_filters(filters);

        let snapshot = pipeline.rebuild();
        assert_eq!(snapshot.users.len(), 10);
        assert_eq!(snapshot.cities.len(), Catalog::builtin().len());
    }

    #[test]
    fn test_radius_filter_passes_nearby_majority() {
        let mut pipeline = MapPipeline::new(PipelineConfig::default(), Catalog::builtin());
        // sigma 0.05 deg is roughly 5.5 km; nearly all users fall within 50 km
        pipeline.apply_feed(FeedEvent::Snapshot(mock_feed(11, hanoi(), 0.05, 10)));
        pipeline.set_viewer(None, ViewerPosition::granted(hanoi()));

        let mut filters = FilterState::default();
        filters.apply(FilterMutation::Radius(Some(50.0)));
        pipeline.set_filters(filters);

        let snapshot = pipeline.rebuild();
        assert!(
            snapshot.users.len() > 9,
            "expected >90% of 10 users within 50 km, got {}",
            snapshot.users.len()
        );
    }

    #[test]
    fn test_feed_removal_shrinks_next_rebuild() {
        let mut pipeline = MapPipeline::new(PipelineConfig::default(), Catalog::builtin());
        pipeline.apply_feed(FeedEvent::Snapshot(mock_feed(5, hanoi(), 0.05, 5)));
        pipeline.rebuild();
        assert_eq!(pipeline.snapshot().users.len(), 5);

        pipeline.apply_feed(FeedEvent::Remove("mock-2".to_string()));
        pipeline.rebuild();
        assert_eq!(pipeline.snapshot().users.len(), 4);
        assert!(pipeline
            .snapshot()
            .users
            .iter()
            .all(|u| u.id() != "mock-2"));
    }

    #[test]
    fn test_update_moves_entity_between_tiles() {
        let mut pipeline = MapPipeline::new(PipelineConfig::default(), Catalog::from_cities(vec![]));
        pipeline.apply_feed(FeedEvent::Update(FeedRecord {
            id: "u".to_string(),
            latitude: 21.01,
            longitude: 105.81,
            name: "u".to_string(),
            budget: None,
            bio: None,
            age: None,
        }));
        pipeline.rebuild();
        let before: Vec<TileId> = pipeline.snapshot().tiles.keys().copied().collect();

        pipeline.apply_feed(FeedEvent::Update(FeedRecord {
            id: "u".to_string(),
            latitude: 21.91,
            longitude: 105.81,
            name: "u".to_string(),
            budget: None,
            bio: None,
            age: None,
        }));
        pipeline.rebuild();
        let after: Vec<TileId> = pipeline.snapshot().tiles.keys().copied().collect();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 1);
        assert_ne!(before[0], after[0]);
    }
}
