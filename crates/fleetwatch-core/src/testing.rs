//! In-memory [`MapBackend`] that records every call.
//!
//! Used by the unit and integration tests, and handy for headless runs.
//! Layer objects are kept by handle, so tests can check that a toggle reuses
//! the same object or that a base layer switch does not add a tile layer.

use crate::base_layer::BaseLayerDescriptor;
use crate::error::{FleetwatchError, Result};
use crate::overlay::GeofenceOverlay;
use crate::session::{LayerHandle, MapBackend, MarkerSpec};
use crate::types::{GeoBounds, GeoPoint};
use std::collections::{BTreeMap, BTreeSet};

/// A layer object held by the recording backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedLayer {
    Tile {
        base_layer_id: String,
        url_template: String,
    },
    Overlay {
        overlay_id: String,
        features: usize,
    },
    Marker(MarkerSpec),
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    surface_available: bool,
    map_live: bool,
    maps_created: usize,
    view: Option<(GeoPoint, f64)>,
    next_handle: u64,
    layers: BTreeMap<LayerHandle, RecordedLayer>,
    attached: BTreeSet<LayerHandle>,
    /// Marker draw order
    marker_order: Vec<LayerHandle>,
    overlay_layers_created: usize,
    tile_source_changes: usize,
    fits: Vec<(GeoBounds, f32)>,
}

impl RecordingBackend {
    /// Backend with a rendering surface.
    pub fn new() -> Self {
        Self {
            surface_available: true,
            ..Self::default()
        }
    }

    /// Backend whose surface has not appeared yet.
    pub fn without_surface() -> Self {
        Self::default()
    }

    pub fn set_surface_available(&mut self, available: bool) {
        self.surface_available = available;
    }

    pub fn is_map_live(&self) -> bool {
        self.map_live
    }

    pub fn maps_created(&self) -> usize {
        self.maps_created
    }

    /// Initial center and zoom of the live map.
    pub fn initial_view(&self) -> Option<(GeoPoint, f64)> {
        self.view
    }

    /// Number of live layer objects of any kind.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, handle: LayerHandle) -> Option<&RecordedLayer> {
        self.layers.get(&handle)
    }

    pub fn is_attached(&self, handle: LayerHandle) -> bool {
        self.attached.contains(&handle)
    }

    pub fn tile_layer_count(&self) -> usize {
        self.layers
            .values()
            .filter(|layer| matches!(layer, RecordedLayer::Tile { .. }))
            .count()
    }

    /// URL template of the live tile layer.
    pub fn tile_url_template(&self) -> Option<&str> {
        self.layers.values().find_map(|layer| match layer {
            RecordedLayer::Tile { url_template, .. } => Some(url_template.as_str()),
            _ => None,
        })
    }

    pub fn tile_source_changes(&self) -> usize {
        self.tile_source_changes
    }

    /// Total overlay layer objects built over the backend's lifetime.
    pub fn overlay_layers_created(&self) -> usize {
        self.overlay_layers_created
    }

    /// Ids of overlays currently attached.
    pub fn attached_overlay_ids(&self) -> BTreeSet<String> {
        self.attached
            .iter()
            .filter_map(|handle| match self.layers.get(handle) {
                Some(RecordedLayer::Overlay { overlay_id, .. }) => Some(overlay_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Markers in draw order.
    pub fn markers(&self) -> Vec<&MarkerSpec> {
        self.marker_order
            .iter()
            .filter_map(|handle| match self.layers.get(handle) {
                Some(RecordedLayer::Marker(spec)) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn fit_calls(&self) -> &[(GeoBounds, f32)] {
        &self.fits
    }

    pub fn last_fit(&self) -> Option<GeoBounds> {
        self.fits.last().map(|(bounds, _)| *bounds)
    }

    fn allocate(&mut self, layer: RecordedLayer) -> LayerHandle {
        self.next_handle += 1;
        let handle = LayerHandle::new(self.next_handle);
        self.layers.insert(handle, layer);
        handle
    }
}

impl MapBackend for RecordingBackend {
    fn create_map(&mut self, center: GeoPoint, zoom: f64) -> Result<()> {
        if !self.surface_available {
            return Err(FleetwatchError::MissingSurface);
        }
        self.map_live = true;
        self.maps_created += 1;
        self.view = Some((center, zoom));
        Ok(())
    }

    fn destroy_map(&mut self) {
        self.map_live = false;
        self.view = None;
        self.layers.clear();
        self.attached.clear();
        self.marker_order.clear();
    }

    fn create_tile_layer(&mut self, base: &BaseLayerDescriptor) -> LayerHandle {
        let handle = self.allocate(RecordedLayer::Tile {
            base_layer_id: base.id.clone(),
            url_template: base.url_template.clone(),
        });
        self.attached.insert(handle);
        handle
    }

    fn set_tile_source(&mut self, layer: LayerHandle, base: &BaseLayerDescriptor) {
        if let Some(RecordedLayer::Tile {
            base_layer_id,
            url_template,
        }) = self.layers.get_mut(&layer)
        {
            *base_layer_id = base.id.clone();
            *url_template = base.url_template.clone();
            self.tile_source_changes += 1;
        }
    }

    fn create_overlay_layer(&mut self, overlay: &GeofenceOverlay) -> LayerHandle {
        self.overlay_layers_created += 1;
        self.allocate(RecordedLayer::Overlay {
            overlay_id: overlay.id.clone(),
            features: overlay.features.len(),
        })
    }

    fn attach_layer(&mut self, layer: LayerHandle) {
        if self.layers.contains_key(&layer) {
            self.attached.insert(layer);
        }
    }

    fn detach_layer(&mut self, layer: LayerHandle) {
        self.attached.remove(&layer);
    }

    fn add_markers(&mut self, markers: Vec<MarkerSpec>) -> Vec<LayerHandle> {
        markers
            .into_iter()
            .map(|spec| {
                let handle = self.allocate(RecordedLayer::Marker(spec));
                self.attached.insert(handle);
                self.marker_order.push(handle);
                handle
            })
            .collect()
    }

    fn remove_markers(&mut self, markers: &[LayerHandle]) {
        let removed: BTreeSet<LayerHandle> = markers.iter().copied().collect();
        for handle in &removed {
            self.layers.remove(handle);
            self.attached.remove(handle);
        }
        self.marker_order.retain(|handle| !removed.contains(handle));
    }

    fn fit_bounds(&mut self, bounds: GeoBounds, padding: f32) {
        self.fits.push((bounds, padding));
    }
}
