//! Collaborator seams
//!
//! The engine calls but does not own the map surface, geocoding/POI
//! clients, layer registry, and location provider. They are injected as
//! trait objects at startup so tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub position: LatLng,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiResult {
    pub position: LatLng,
    pub name: String,
    pub distance_km: f64,
}

impl From<PoiResult> for GeocodeResult {
    fn from(poi: PoiResult) -> Self {
        GeocodeResult {
            position: poi.position,
            name: poi.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerDescriptor {
    pub id: String,
    pub name: String,
}

/// Local map-control surface. Synchronous: these only touch in-process
/// map state, never the network.
pub trait MapControl: Send + Sync {
    /// None until the map has been positioned.
    fn center(&self) -> Option<LatLng>;
    fn zoom(&self) -> u8;
    fn set_view(&self, center: LatLng, zoom: u8);
    fn set_zoom(&self, zoom: u8);
    fn zoom_in(&self, steps: u8);
    fn zoom_out(&self, steps: u8);
    fn pan_by(&self, dx_px: i32, dy_px: i32);
    fn set_layer_active(&self, layer_id: &str, active: bool);
    /// Returns the new active state.
    fn toggle_layer(&self, layer_id: &str) -> bool;
    fn clear_layers(&self);
    fn show_search_results(&self, results: Vec<GeocodeResult>);
    fn clear_search_results(&self);
    fn add_marker(&self, position: LatLng, label: &str);
}

#[async_trait]
pub trait GeocodingClient: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, CollabError>;

    /// Search biased toward a position hint when one is available.
    async fn smart_search(
        &self,
        query: &str,
        hint: Option<LatLng>,
    ) -> Result<Vec<GeocodeResult>, CollabError>;

    async fn reverse_geocode(&self, at: LatLng) -> Result<Option<String>, CollabError>;
}

#[async_trait]
pub trait PoiClient: Send + Sync {
    async fn find_nearby(
        &self,
        at: LatLng,
        category: &str,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<PoiResult>, CollabError>;

    /// Detect a POI category mentioned in free text, if any.
    fn detect_category(&self, text: &str) -> Option<String>;
}

pub trait LayerRegistry: Send + Sync {
    /// Fuzzy-resolve a spoken layer name to a layer id.
    fn detect_layer(&self, text: &str) -> Option<String>;
    fn all_layers(&self) -> Vec<LayerDescriptor>;
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<LatLng, CollabError>;
    /// Most recent successful fix, if any.
    fn last_known(&self) -> Option<LatLng>;
}

/// The full collaborator set injected into the dispatcher.
#[derive(Clone)]
pub struct Collaborators {
    pub map: Arc<dyn MapControl>,
    pub geocoder: Arc<dyn GeocodingClient>,
    pub poi: Arc<dyn PoiClient>,
    pub layers: Arc<dyn LayerRegistry>,
    pub location: Arc<dyn LocationProvider>,
}
