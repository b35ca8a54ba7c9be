//! walkers-backed implementation of the map session backend.
//!
//! The map instance is a [`MapMemory`] plus one logical tile layer whose
//! URL template can be swapped in place. `HttpTiles` owns its source, so one
//! downloader is kept per template and reused when the user switches back.

use eframe::egui;
use fleetwatch_core::base_layer::BaseLayerDescriptor;
use fleetwatch_core::overlay::GeofenceOverlay;
use fleetwatch_core::session::{LayerHandle, MapBackend, MarkerSpec};
use fleetwatch_core::types::{GeoBounds, GeoPoint};
use fleetwatch_core::{FleetwatchError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use walkers::sources::{Attribution, TileSource};
use walkers::{HttpTiles, MapMemory, TileId};

/// Edge length of a slippy map tile in pixels.
const TILE_SIZE: f64 = 256.0;

/// Web Mercator latitude limit.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Tile source backed by a base layer descriptor.
struct TemplateSource {
    descriptor: BaseLayerDescriptor,
    attribution: &'static str,
}

impl TemplateSource {
    fn new(descriptor: BaseLayerDescriptor, attribution: &'static str) -> Self {
        Self {
            descriptor,
            attribution,
        }
    }
}

/// Returns a `'static` copy of `text`, leaking each distinct text once per
/// process.
fn intern_attribution(interned: &mut HashMap<String, &'static str>, text: &str) -> &'static str {
    if let Some(&existing) = interned.get(text) {
        return existing;
    }
    let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
    interned.insert(text.to_owned(), leaked);
    leaked
}

impl TileSource for TemplateSource {
    fn tile_url(&self, tile_id: TileId) -> String {
        self.descriptor.tile_url(tile_id.zoom, tile_id.x, tile_id.y)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: self.attribution,
            url: "",
            logo_light: None,
            logo_dark: None,
        }
    }
}

/// The single tile layer of the map.
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub handle: LayerHandle,
    pub base: BaseLayerDescriptor,
}

/// An overlay layer object. Detaching only clears `attached`.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub overlay: GeofenceOverlay,
    pub attached: bool,
}

pub struct WalkersBackend {
    /// Rendering surface, present once the egui context exists
    ctx: Option<egui::Context>,
    live: bool,
    memory: MapMemory,
    home: GeoPoint,
    max_fit_zoom: f64,
    next_handle: u64,
    tile_layer: Option<TileLayer>,
    /// Downloaders keyed by URL template
    downloaders: HashMap<String, HttpTiles>,
    /// Outlives map sessions, unlike `downloaders`
    attributions: HashMap<String, &'static str>,
    overlays: BTreeMap<LayerHandle, OverlayLayer>,
    /// Handles are monotonic, so iteration order is insertion order
    markers: BTreeMap<LayerHandle, MarkerSpec>,
    pending_fit: Option<(GeoBounds, f32)>,
}

impl WalkersBackend {
    pub fn new(max_fit_zoom: f64) -> Self {
        Self {
            ctx: None,
            live: false,
            memory: MapMemory::default(),
            home: GeoPoint::new(0.0, 0.0),
            max_fit_zoom,
            next_handle: 0,
            tile_layer: None,
            downloaders: HashMap::new(),
            attributions: HashMap::new(),
            overlays: BTreeMap::new(),
            markers: BTreeMap::new(),
            pending_fit: None,
        }
    }

    /// Makes the rendering surface available to the next mount.
    pub fn attach_surface(&mut self, ctx: &egui::Context) {
        if self.ctx.is_none() {
            debug!("Rendering surface attached");
            self.ctx = Some(ctx.clone());
        }
    }

    pub fn has_surface(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn tile_layer(&self) -> Option<&TileLayer> {
        self.tile_layer.as_ref()
    }

    /// Attached overlays in creation order.
    pub fn attached_overlays(&self) -> impl Iterator<Item = &GeofenceOverlay> {
        self.overlays
            .values()
            .filter(|layer| layer.attached)
            .map(|layer| &layer.overlay)
    }

    /// Markers in draw order.
    pub fn markers(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.values()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Map memory, downloader and drawables for one frame.
    ///
    /// Applies a pending fit first, now that the widget size is known.
    pub fn frame_parts(&mut self, size: egui::Vec2) -> Option<FrameParts<'_>> {
        if !self.live {
            return None;
        }

        if let Some((bounds, padding)) = self.pending_fit.take() {
            let zoom = fit_zoom(&bounds, size, padding, self.max_fit_zoom);
            let center = bounds.center();
            self.memory
                .center_at(walkers::lat_lon(center.latitude, center.longitude));
            if let Err(e) = self.memory.set_zoom(zoom) {
                warn!("Cannot apply fitted zoom {:.2}: {:?}", zoom, e);
            }
            debug!(zoom, "Viewport fitted to {:?}", bounds);
        }

        let ctx = self.ctx.as_ref()?;
        let layer = self.tile_layer.as_ref()?;
        let attributions = &mut self.attributions;
        let tiles = self
            .downloaders
            .entry(layer.base.url_template.clone())
            .or_insert_with(|| {
                debug!(base_layer = %layer.base.id, "Creating tile downloader");
                let attribution = intern_attribution(attributions, &layer.base.attribution);
                HttpTiles::new(TemplateSource::new(layer.base.clone(), attribution), ctx.clone())
            });

        Some(FrameParts {
            tiles,
            memory: &mut self.memory,
            home: walkers::lat_lon(self.home.latitude, self.home.longitude),
            attribution: &layer.base.attribution,
            overlays: self
                .overlays
                .values()
                .filter(|layer| layer.attached)
                .map(|layer| &layer.overlay)
                .collect(),
            markers: self.markers.values().collect(),
        })
    }

    fn allocate(&mut self) -> LayerHandle {
        self.next_handle += 1;
        LayerHandle::new(self.next_handle)
    }
}

/// Borrowed pieces needed to draw one frame of the map.
pub struct FrameParts<'a> {
    pub tiles: &'a mut HttpTiles,
    pub memory: &'a mut MapMemory,
    pub home: walkers::Position,
    pub attribution: &'a str,
    pub overlays: Vec<&'a GeofenceOverlay>,
    pub markers: Vec<&'a MarkerSpec>,
}

impl MapBackend for WalkersBackend {
    fn create_map(&mut self, center: GeoPoint, zoom: f64) -> Result<()> {
        if self.ctx.is_none() {
            return Err(FleetwatchError::MissingSurface);
        }
        let mut memory = MapMemory::default();
        memory.center_at(walkers::lat_lon(center.latitude, center.longitude));
        if let Err(e) = memory.set_zoom(zoom) {
            warn!("Invalid initial zoom {}: {:?}", zoom, e);
        }
        self.memory = memory;
        self.home = center;
        self.live = true;
        Ok(())
    }

    fn destroy_map(&mut self) {
        self.live = false;
        self.tile_layer = None;
        self.downloaders.clear();
        self.overlays.clear();
        self.markers.clear();
        self.pending_fit = None;
    }

    fn create_tile_layer(&mut self, base: &BaseLayerDescriptor) -> LayerHandle {
        let handle = self.allocate();
        self.tile_layer = Some(TileLayer {
            handle,
            base: base.clone(),
        });
        handle
    }

    fn set_tile_source(&mut self, layer: LayerHandle, base: &BaseLayerDescriptor) {
        match self.tile_layer.as_mut() {
            Some(tile_layer) if tile_layer.handle == layer => tile_layer.base = base.clone(),
            _ => warn!("No tile layer {} to update", layer),
        }
    }

    fn create_overlay_layer(&mut self, overlay: &GeofenceOverlay) -> LayerHandle {
        let handle = self.allocate();
        self.overlays.insert(
            handle,
            OverlayLayer {
                overlay: overlay.clone(),
                attached: false,
            },
        );
        handle
    }

    fn attach_layer(&mut self, layer: LayerHandle) {
        if let Some(overlay) = self.overlays.get_mut(&layer) {
            overlay.attached = true;
        }
    }

    fn detach_layer(&mut self, layer: LayerHandle) {
        if let Some(overlay) = self.overlays.get_mut(&layer) {
            overlay.attached = false;
        }
    }

    fn add_markers(&mut self, markers: Vec<MarkerSpec>) -> Vec<LayerHandle> {
        markers
            .into_iter()
            .map(|spec| {
                let handle = self.allocate();
                self.markers.insert(handle, spec);
                handle
            })
            .collect()
    }

    fn remove_markers(&mut self, markers: &[LayerHandle]) {
        for handle in markers {
            self.markers.remove(handle);
        }
    }

    fn fit_bounds(&mut self, bounds: GeoBounds, padding: f32) {
        self.pending_fit = Some((bounds, padding));
    }
}

/// Largest zoom, capped at `max_zoom`, at which `bounds` plus `padding`
/// pixels on every side fits in a widget of `size`.
pub fn fit_zoom(bounds: &GeoBounds, size: egui::Vec2, padding: f32, max_zoom: f64) -> f64 {
    let usable_w = (size.x - 2.0 * padding).max(1.0) as f64;
    let usable_h = (size.y - 2.0 * padding).max(1.0) as f64;

    // Fractions of the world at zoom 0
    let span_x = (bounds.east - bounds.west).abs() / 360.0;
    let span_y = (mercator_y(bounds.south) - mercator_y(bounds.north)).abs();

    let zoom_for = |span: f64, usable: f64| {
        if span <= f64::EPSILON {
            max_zoom
        } else {
            (usable / (TILE_SIZE * span)).log2()
        }
    };

    zoom_for(span_x, usable_w)
        .min(zoom_for(span_y, usable_h))
        .clamp(0.0, max_zoom)
}

/// Normalized Web Mercator y in 0..1, 0 at the north edge.
fn mercator_y(latitude: f64) -> f64 {
    let lat = latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0
}
