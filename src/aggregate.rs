use crate::catalog::City;
use crate::enrich::EnrichedEntity;
use crate::geo::{self, GeoPoint};
use crate::tile::TileId;
use std::collections::HashMap;
use tracing::warn;

/// One renderable item bucketed into a tile
#[derive(Debug, Clone, PartialEq)]
pub enum MapItem {
    City(City),
    User(EnrichedEntity),
}

impl MapItem {
    pub fn point(&self) -> GeoPoint {
        match self {
            MapItem::City(city) => city.point,
            MapItem::User(user) => user.point(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MapItem::City(city) => &city.name,
            MapItem::User(user) => &user.live.name,
        }
    }

    /// Stable render identifier, unique across both kinds
    pub fn key(&self) -> String {
        match self {
            MapItem::City(city) => format!("city-{}", city.id),
            MapItem::User(user) => format!("user-{}", user.id()),
        }
    }

    fn user_id(&self) -> Option<&str> {
        match self {
            MapItem::City(_) => None,
            MapItem::User(user) => Some(user.id()),
        }
    }
}

/// A tile bucket: the items inside it and whether one of them is the
/// viewer's own marker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tile {
    pub items: Vec<MapItem>,
    pub contains_viewer: bool,
}

impl Tile {
    /// Count shown on an aggregate badge. The viewer's own marker is
    /// excluded so the badge reads "N other things here".
    pub fn display_count(&self) -> usize {
        if self.contains_viewer {
            self.items.len().saturating_sub(1)
        } else {
            self.items.len()
        }
    }
}

/// Bucket every item into fixed-resolution tiles. The map is rebuilt from
/// scratch each pass; membership is never patched incrementally, which
/// keeps stale-membership bugs impossible at the cost of some CPU.
/// Items with invalid coordinates are skipped with a warning.
pub fn aggregate(
    items: impl IntoIterator<Item = MapItem>,
    viewer_id: Option<&str>,
    resolution_deg: f64,
) -> HashMap<TileId, Tile> {
    let mut tiles: HashMap<TileId, Tile> = HashMap::new();

    for item in items {
        let point = item.point();
        if !point.is_valid() {
            warn!(key = %item.key(), lat = point.latitude, lon = point.longitude,
                "item has invalid coordinates, skipping");
            continue;
        }

        let id = TileId::for_point(point, resolution_deg);
        let tile = tiles.entry(id).or_default();
        if let (Some(viewer), Some(user)) = (viewer_id, item.user_id()) {
            if viewer == user {
                tile.contains_viewer = true;
            }
        }
        tile.items.push(item);
    }

    tiles
}

/// Marker placement for a tile. Markers sit on the tile center, except
/// when a radius filter is active and the center falls outside the circle
/// while a member item is inside: then the marker is pinned to the border
/// so it stays visually inside the filtered area.
pub fn marker_position(
    tile_id: TileId,
    tile: &Tile,
    resolution_deg: f64,
    viewer: Option<GeoPoint>,
    radius_km: Option<f64>,
) -> GeoPoint {
    let center = tile_id.center(resolution_deg);
    let (Some(viewer), Some(radius_km)) = (viewer, radius_km) else {
        return center;
    };

    let any_inside = tile
        .items
        .iter()
        .any(|item| geo::is_within_radius(viewer, item.point(), radius_km));

    if any_inside && !geo::is_within_radius(viewer, center, radius_km) {
        geo::border_point(viewer, center, radius_km)
    } else {
        center
    }
}
