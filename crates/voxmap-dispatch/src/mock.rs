//! In-memory mock collaborators for tests and the demo binary

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::collab::{
    CollabError, Collaborators, GeocodeResult, GeocodingClient, LatLng, LayerDescriptor,
    LayerRegistry, LocationProvider, MapControl, PoiClient, PoiResult,
};

#[derive(Debug, Default)]
struct MapState {
    center: Option<LatLng>,
    zoom: u8,
    active_layers: BTreeSet<String>,
    markers: Vec<(LatLng, String)>,
    search_results: Vec<GeocodeResult>,
}

/// Map control surface backed by plain in-process state.
pub struct InMemoryMapControl {
    state: Mutex<MapState>,
}

impl InMemoryMapControl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MapState {
                center: Some(LatLng::new(47.6062, -122.3321)),
                zoom: 10,
                ..Default::default()
            }),
        }
    }

    /// A map that has not been positioned yet, for exercising the
    /// marker location fallback chain.
    pub fn without_center() -> Self {
        Self {
            state: Mutex::new(MapState {
                center: None,
                zoom: 10,
                ..Default::default()
            }),
        }
    }

    pub fn is_layer_active(&self, layer_id: &str) -> bool {
        self.state.lock().active_layers.contains(layer_id)
    }

    pub fn markers(&self) -> Vec<(LatLng, String)> {
        self.state.lock().markers.clone()
    }

    pub fn search_results(&self) -> Vec<GeocodeResult> {
        self.state.lock().search_results.clone()
    }
}

impl Default for InMemoryMapControl {
    fn default() -> Self {
        Self::new()
    }
}

impl MapControl for InMemoryMapControl {
    fn center(&self) -> Option<LatLng> {
        self.state.lock().center
    }

    fn zoom(&self) -> u8 {
        self.state.lock().zoom
    }

    fn set_view(&self, center: LatLng, zoom: u8) {
        let mut state = self.state.lock();
        state.center = Some(center);
        state.zoom = zoom;
    }

    fn set_zoom(&self, zoom: u8) {
        self.state.lock().zoom = zoom;
    }

    fn zoom_in(&self, steps: u8) {
        let mut state = self.state.lock();
        state.zoom = state.zoom.saturating_add(steps);
    }

    fn zoom_out(&self, steps: u8) {
        let mut state = self.state.lock();
        state.zoom = state.zoom.saturating_sub(steps);
    }

    fn pan_by(&self, _dx_px: i32, _dy_px: i32) {
        // Pixel panning has no observable effect on the mock's
        // geographic state.
    }

    fn set_layer_active(&self, layer_id: &str, active: bool) {
        let mut state = self.state.lock();
        if active {
            state.active_layers.insert(layer_id.to_string());
        } else {
            state.active_layers.remove(layer_id);
        }
    }

    fn toggle_layer(&self, layer_id: &str) -> bool {
        let mut state = self.state.lock();
        if state.active_layers.remove(layer_id) {
            false
        } else {
            state.active_layers.insert(layer_id.to_string());
            true
        }
    }

    fn clear_layers(&self) {
        self.state.lock().active_layers.clear();
    }

    fn show_search_results(&self, results: Vec<GeocodeResult>) {
        self.state.lock().search_results = results;
    }

    fn clear_search_results(&self) {
        self.state.lock().search_results.clear();
    }

    fn add_marker(&self, position: LatLng, label: &str) {
        self.state
            .lock()
            .markers
            .push((position, label.to_string()));
    }
}

/// Geocoder returning canned results per query.
#[derive(Default)]
pub struct MockGeocoder {
    results: Mutex<HashMap<String, Vec<GeocodeResult>>>,
    reverse_name: Mutex<Option<String>>,
    fail_with: Mutex<Option<String>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, query: &str, name: &str, position: LatLng) -> Self {
        self.results
            .lock()
            .entry(query.to_lowercase())
            .or_default()
            .push(GeocodeResult {
                position,
                name: name.to_string(),
            });
        self
    }

    pub fn with_reverse_name(self, name: &str) -> Self {
        *self.reverse_name.lock() = Some(name.to_string());
        self
    }

    pub fn failing(self, message: &str) -> Self {
        *self.fail_with.lock() = Some(message.to_string());
        self
    }

    fn check_failure(&self) -> Result<(), CollabError> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(CollabError::Network(message));
        }
        Ok(())
    }
}

#[async_trait]
impl GeocodingClient for MockGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeResult>, CollabError> {
        self.check_failure()?;
        Ok(self
            .results
            .lock()
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn smart_search(
        &self,
        query: &str,
        _hint: Option<LatLng>,
    ) -> Result<Vec<GeocodeResult>, CollabError> {
        self.search(query).await
    }

    async fn reverse_geocode(&self, _at: LatLng) -> Result<Option<String>, CollabError> {
        self.check_failure()?;
        Ok(self.reverse_name.lock().clone())
    }
}

/// POI client with a keyword-based category detector and canned results.
#[derive(Default)]
pub struct MockPoiClient {
    categories: HashMap<String, String>,
    nearby: Vec<PoiResult>,
}

impl MockPoiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, keyword: &str, category: &str) -> Self {
        self.categories
            .insert(keyword.to_string(), category.to_string());
        self
    }

    pub fn with_nearby(mut self, name: &str, position: LatLng, distance_km: f64) -> Self {
        self.nearby.push(PoiResult {
            position,
            name: name.to_string(),
            distance_km,
        });
        self
    }
}

#[async_trait]
impl PoiClient for MockPoiClient {
    async fn find_nearby(
        &self,
        _at: LatLng,
        _category: &str,
        _radius_km: f64,
        limit: usize,
    ) -> Result<Vec<PoiResult>, CollabError> {
        Ok(self.nearby.iter().take(limit).cloned().collect())
    }

    fn detect_category(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.categories
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, category)| category.clone())
    }
}

/// Layer registry with substring-based fuzzy matching.
pub struct StaticLayerRegistry {
    layers: Vec<LayerDescriptor>,
}

impl StaticLayerRegistry {
    pub fn new(layers: Vec<(&str, &str)>) -> Self {
        Self {
            layers: layers
                .into_iter()
                .map(|(id, name)| LayerDescriptor {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    /// The layer set the demo map ships with.
    pub fn with_default_layers() -> Self {
        Self::new(vec![
            ("esri_world_imagery", "Satellite"),
            ("osm_standard", "Street Map"),
            ("opentopomap", "Terrain"),
            ("traffic_flow", "Traffic"),
        ])
    }
}

impl LayerRegistry for StaticLayerRegistry {
    fn detect_layer(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.layers
            .iter()
            .find(|layer| {
                let name = layer.name.to_lowercase();
                name.contains(&text)
                    || text.contains(&name)
                    || name.split_whitespace().any(|word| text.contains(word))
            })
            .map(|layer| layer.id.clone())
    }

    fn all_layers(&self) -> Vec<LayerDescriptor> {
        self.layers.clone()
    }
}

/// Location provider with settable current and last-known fixes.
#[derive(Default)]
pub struct MockLocationProvider {
    current: Mutex<Option<LatLng>>,
    last: Mutex<Option<LatLng>>,
}

impl MockLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fix(self, position: LatLng) -> Self {
        *self.current.lock() = Some(position);
        *self.last.lock() = Some(position);
        self
    }
}

#[async_trait]
impl LocationProvider for MockLocationProvider {
    async fn current_location(&self) -> Result<LatLng, CollabError> {
        match *self.current.lock() {
            Some(position) => Ok(position),
            None => Err(CollabError::Unavailable("no GPS fix".to_string())),
        }
    }

    fn last_known(&self) -> Option<LatLng> {
        *self.last.lock()
    }
}

/// A full mock collaborator set with sensible demo defaults.
pub fn demo_collaborators() -> (Collaborators, Arc<InMemoryMapControl>) {
    let map = Arc::new(InMemoryMapControl::new());
    let collaborators = Collaborators {
        map: map.clone(),
        geocoder: Arc::new(
            MockGeocoder::new()
                .with_result("the airport", "International Airport", LatLng::new(47.45, -122.31))
                .with_result("central park", "Central Park", LatLng::new(40.78, -73.97))
                .with_reverse_name("Pike Place Market, Seattle"),
        ),
        poi: Arc::new(
            MockPoiClient::new()
                .with_category("restaurant", "restaurant")
                .with_category("coffee", "cafe")
                .with_category("gas", "fuel")
                .with_nearby("Corner Bistro", LatLng::new(47.61, -122.33), 0.4)
                .with_nearby("Harbor Grill", LatLng::new(47.60, -122.34), 1.1),
        ),
        layers: Arc::new(StaticLayerRegistry::with_default_layers()),
        location: Arc::new(MockLocationProvider::new().with_fix(LatLng::new(47.6062, -122.3321))),
    };
    (collaborators, map)
}
