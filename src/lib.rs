//! Spatial aggregation and filtering for geo-located map entities.
//!
//! The crate takes a static city catalog and a live user-position feed,
//! merges the feed with separately-fetched profile attributes, applies a
//! debounced compound filter state, and buckets the survivors into
//! fixed-resolution tiles for aggregate rendering:
//!
//! raw feed -> enrich -> filter -> aggregate -> render layer (external)
//!
//! - [`geo`]: haversine distance, radius containment, border points
//! - [`tile`]: lat/lon to tile id and back
//! - [`catalog`]: the static city reference data
//! - [`feed`]: live feed parsing, roster lifecycle, viewer position
//! - [`enrich`]: profile merge and derived Local/Traveller status
//! - [`filter`]: compound filter state and its apply rules
//! - [`aggregate`]: tile bucketing and marker placement
//! - [`pipeline`]: the debounced driver and the recompute hub

pub mod aggregate;
pub mod catalog;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod filter;
pub mod geo;
pub mod hash;
pub mod pipeline;
pub mod tile;

pub use aggregate::{aggregate, marker_position, MapItem, Tile};
pub use catalog::{Catalog, City};
pub use enrich::{
    derive_status, enrich, EnrichedEntity, ProfileAttributes, ProfileSource, ProfileStore,
    TravelStatus, LOCAL_THRESHOLD_KM,
};
pub use error::Error;
pub use feed::{
    mock_feed, parse_feed, FeedEvent, FeedRecord, FeedSubscription, LiveEntity, PermissionStatus,
    Roster, ViewerPosition,
};
pub use filter::{AgeRange, FilterMutation, FilterState, PopulationRange};
pub use geo::{border_point, haversine_km, is_within_radius, GeoPoint};
pub use pipeline::{
    spawn_filter, FilterHandle, MapPipeline, PipelineConfig, ViewSnapshot,
};
pub use tile::TileId;
