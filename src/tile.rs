use crate::error::Error;
use crate::geo::GeoPoint;
use std::fmt;
use std::str::FromStr;

/// A fixed-resolution geographic bucket key.
///
/// Points bucket by floor division of their coordinates, so the id is
/// stable for a given input and distinct buckets never collide. The string
/// form `"lat_idx:lon_idx"` is what the render layer keys its markers by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub lat_idx: i64,
    pub lon_idx: i64,
}

impl TileId {
    /// Bucket a point at the given angular resolution in degrees
    pub fn for_point(point: GeoPoint, resolution_deg: f64) -> Self {
        Self {
            lat_idx: (point.latitude / resolution_deg).floor() as i64,
            lon_idx: (point.longitude / resolution_deg).floor() as i64,
        }
    }

    /// Representative center of the bucket: lower-left corner plus half a
    /// resolution step. Buckets back to the same id.
    pub fn center(&self, resolution_deg: f64) -> GeoPoint {
        GeoPoint::new(
            self.lat_idx as f64 * resolution_deg + resolution_deg / 2.0,
            self.lon_idx as f64 * resolution_deg + resolution_deg / 2.0,
        )
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lat_idx, self.lon_idx)
    }
}

impl FromStr for TileId {
    type Err = Error;

    /// A malformed id is a programmer error: ids only ever come from
    /// `Display` above. Callers should treat the error as fatal while
    /// developing and defensively skip the tile in production.
    fn from_str(s: &str) -> Result<Self, Error> {
        let mut parts = s.splitn(2, ':');
        let (Some(lat), Some(lon)) = (parts.next(), parts.next()) else {
            return Err(Error::InvalidTileId(s.to_string()));
        };
        let parse =
            |v: &str| v.parse::<i64>().map_err(|_| Error::InvalidTileId(s.to_string()));
        Ok(Self {
            lat_idx: parse(lat)?,
            lon_idx: parse(lon)?,
        })
    }
}
