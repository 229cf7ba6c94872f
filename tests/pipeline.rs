//! End-to-end pipeline behavior: debounce timing over a paused clock and
//! the feed -> enrich -> filter -> aggregate flow.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wanderlens::{
    mock_feed, spawn_filter, Catalog, Error, FeedEvent, FilterState, GeoPoint, MapPipeline,
    PipelineConfig, ProfileAttributes, ProfileSource, ViewerPosition,
};

fn hanoi() -> GeoPoint {
    GeoPoint::new(21.0285, 105.8542)
}

/// Give the filter task a chance to process queued commands
async fn drain() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn debounce_collapses_burst_into_one_application() {
    let cancel = CancellationToken::new();
    let filters = spawn_filter(&PipelineConfig::default(), cancel.clone());
    let mut applied = filters.watch();

    filters.set_gender(Some(HashSet::from(["female".to_string()])));
    drain().await;
    tokio::time::advance(Duration::from_millis(200)).await;

    // second mutation restarts the trailing window
    filters.set_gender(Some(HashSet::from(["male".to_string()])));
    drain().await;

    // 450 ms after the first mutation, 250 ms after the second: nothing
    // has been applied yet
    tokio::time::advance(Duration::from_millis(250)).await;
    drain().await;
    assert!(!applied.has_changed().unwrap());

    // the window elapses 300 ms after the second mutation
    tokio::time::advance(Duration::from_millis(60)).await;
    applied.changed().await.unwrap();

    let state = applied.borrow_and_update().clone();
    assert_eq!(state.gender, Some(HashSet::from(["male".to_string()])));

    // exactly one application was published for the whole burst
    tokio::time::advance(Duration::from_millis(500)).await;
    drain().await;
    assert!(!applied.has_changed().unwrap());

    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn burst_replays_in_order_like_sequential_application() {
    let cancel = CancellationToken::new();
    let filters = spawn_filter(&PipelineConfig::default(), cancel.clone());
    let mut applied = filters.watch();

    // radius then country inside one window: country wins and cancels
    // the radius, exactly as if applied sequentially without debouncing
    filters.set_radius(Some(50.0));
    filters.set_country(Some("Vietnam".to_string()));
    drain().await;

    tokio::time::advance(Duration::from_millis(350)).await;
    applied.changed().await.unwrap();

    let state = applied.borrow_and_update().clone();
    let mut expected = FilterState::default();
    expected.apply(wanderlens::FilterMutation::Radius(Some(50.0)));
    expected.apply(wanderlens::FilterMutation::Country(Some(
        "Vietnam".to_string(),
    )));
    assert_eq!(state, expected);
    assert_eq!(state.radius_km, None);
    assert_eq!(state.country.as_deref(), Some("Vietnam"));

    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn reset_bypasses_the_window_and_drops_pending_mutations() {
    let cancel = CancellationToken::new();
    let filters = spawn_filter(&PipelineConfig::default(), cancel.clone());
    let mut applied = filters.watch();

    filters.set_search(Some("hanoi".to_string()));
    drain().await;
    filters.reset();

    // the reset is published without any clock movement
    applied.changed().await.unwrap();
    assert_eq!(*applied.borrow_and_update(), FilterState::default());

    // and the queued search mutation never fires
    tokio::time::advance(Duration::from_millis(500)).await;
    drain().await;
    assert!(!applied.has_changed().unwrap());

    cancel.cancel();
}

struct StaticProfiles(HashMap<String, ProfileAttributes>);

impl ProfileSource for StaticProfiles {
    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, ProfileAttributes>, Error> {
        Ok(ids
            .iter()
            .filter_map(|id| self.0.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

struct FailingProfiles;

impl ProfileSource for FailingProfiles {
    async fn fetch(&self, _ids: &[String]) -> Result<HashMap<String, ProfileAttributes>, Error> {
        Err(Error::Fetch("connection refused".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn feed_to_tiles_end_to_end() {
    let config = PipelineConfig::default();
    let cancel = CancellationToken::new();
    let filters = spawn_filter(&config, cancel.clone());
    let mut applied = filters.watch();

    let mut pipeline = MapPipeline::new(config, Catalog::builtin());
    pipeline.apply_feed(FeedEvent::Snapshot(mock_feed(9, hanoi(), 0.05, 30)));
    pipeline.set_viewer(Some("mock-1".to_string()), ViewerPosition::granted(hanoi()));

    let source = StaticProfiles(HashMap::from([(
        "mock-1".to_string(),
        ProfileAttributes {
            home_latitude: Some(hanoi().latitude),
            home_longitude: Some(hanoi().longitude),
            ..Default::default()
        },
    )]));
    pipeline.refresh_profiles(&source).await.unwrap();

    filters.set_radius(Some(50.0));
    tokio::time::advance(Duration::from_millis(350)).await;
    applied.changed().await.unwrap();
    pipeline.set_filters(applied.borrow_and_update().clone());

    let snapshot = pipeline.rebuild();

    // completeness: every filtered entity lands in exactly one tile
    let total: usize = snapshot.tiles.values().map(|t| t.items.len()).sum();
    assert_eq!(total, snapshot.cities.len() + snapshot.users.len());

    // the viewer's own tile exists and its badge excludes the viewer
    let viewer_tile = snapshot
        .tiles
        .values()
        .find(|t| t.contains_viewer)
        .expect("viewer tile");
    assert_eq!(viewer_tile.display_count(), viewer_tile.items.len() - 1);

    // profile enrichment went through the fetch path
    let me = snapshot.users.iter().find(|u| u.id() == "mock-1").unwrap();
    assert!(me.profile.home().is_some());

    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_keeps_last_known_good_view() {
    let config = PipelineConfig::default();
    let mut pipeline = MapPipeline::new(config, Catalog::builtin());
    pipeline.apply_feed(FeedEvent::Snapshot(mock_feed(5, hanoi(), 0.05, 8)));
    pipeline.rebuild();
    assert_eq!(pipeline.snapshot().users.len(), 8);

    let err = pipeline.refresh_profiles(&FailingProfiles).await;
    assert!(err.is_err());

    // the pipeline keeps serving the entity set it already had
    pipeline.rebuild();
    assert_eq!(pipeline.snapshot().users.len(), 8);
}
