//! Crate error type.
//!
//! A single `thiserror` enum covering the fallible boundaries of the
//! pipeline: filesystem and GeoJSON parsing for the catalog, JSON feed
//! decoding, and tile-id parsing.

use thiserror::Error;

/// Errors produced while loading reference data or parsing live input.
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error, e.g. reading the catalog file from disk.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog GeoJSON failed to parse.
    #[error("geojson parse error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A JSON feed batch failed to parse.
    #[error("feed parse error: {0}")]
    Feed(#[from] simd_json::Error),

    /// A tile id string was not of the expected form.
    #[error("invalid tile id: {0}")]
    InvalidTileId(String),

    /// A profile-source fetch failed.
    #[error("profile fetch error: {0}")]
    Fetch(String),
}
