use anyhow::Result;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use wanderlens::{
    mock_feed, spawn_filter, Catalog, Error, FeedEvent, GeoPoint, MapPipeline, PipelineConfig,
    ProfileAttributes, ProfileSource, ViewerPosition,
};

/// In-memory profile source standing in for the remote attribute store
struct StaticProfiles(HashMap<String, ProfileAttributes>);

impl ProfileSource for StaticProfiles {
    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, ProfileAttributes>, Error> {
        Ok(ids
            .iter()
            .filter_map(|id| self.0.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive("info".parse().expect("invalid filter"))
                .from_env_lossy(),
        )
        .try_init();

    let hanoi = GeoPoint::new(21.0285, 105.8542);
    let config = PipelineConfig::default();

    // Synthetic crowd around Hanoi, with home locations for every third
    // user so both Local and Traveller show up
    let records = mock_feed(42, hanoi, 0.05, 40);
    let profiles: HashMap<String, ProfileAttributes> = records
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 == 0)
        .map(|(i, rec)| {
            let home = if i % 6 == 0 {
                // near the current position: Local
                GeoPoint::new(rec.latitude, rec.longitude)
            } else {
                // Da Nang: far enough to be a Traveller
                GeoPoint::new(16.0479, 108.2209)
            };
            (
                rec.id.clone(),
                ProfileAttributes {
                    home_latitude: Some(home.latitude),
                    home_longitude: Some(home.longitude),
                    ..Default::default()
                },
            )
        })
        .collect();
    let source = StaticProfiles(profiles);

    let mut pipeline = MapPipeline::new(config, Catalog::builtin());
    pipeline.apply_feed(FeedEvent::Snapshot(records));
    pipeline.set_viewer(Some("mock-0".to_string()), ViewerPosition::granted(hanoi));
    pipeline.refresh_profiles(&source).await?;

    // Debounced filters: two quick mutations collapse into one update
    let cancel = CancellationToken::new();
    let filters = spawn_filter(&config, cancel.clone());
    let mut applied = filters.watch();

    filters.set_radius(Some(100.0));
    filters.set_radius(Some(50.0));
    applied.changed().await?;
    pipeline.set_filters(applied.borrow().clone());

    let snapshot = pipeline.rebuild();
    println!(
        "{} cities and {} users within 50 km, {} tiles",
        snapshot.cities.len(),
        snapshot.users.len(),
        snapshot.tiles.len()
    );

    let mut tiles: Vec<_> = snapshot.tiles.iter().collect();
    tiles.sort_by_key(|(id, _)| (id.lat_idx, id.lon_idx));
    for (id, tile) in tiles.iter().take(10) {
        let marker = if tile.items.len() == 1 {
            tile.items[0].name().to_string()
        } else {
            format!("badge x{}", tile.display_count())
        };
        println!(
            "  tile {id} {marker}{}",
            if tile.contains_viewer { " (you)" } else { "" }
        );
    }

    // A reset applies immediately, no debounce wait
    filters.reset();
    applied.changed().await?;
    pipeline.set_filters(applied.borrow().clone());
    let snapshot = pipeline.rebuild();
    println!(
        "after reset: {} cities, {} users",
        snapshot.cities.len(),
        snapshot.users.len()
    );

    cancel.cancel();
    Ok(())
}
