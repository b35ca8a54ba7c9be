//! Map session lifecycle and reconciliation.
//!
//! [`MapSessionManager`] owns the single persistent map instance of a map
//! widget. The instance is created once when a rendering surface exists,
//! mutated in place on every trigger (new position batch, overlay toggle,
//! base layer switch) and released on unmount.
//!
//! The map library itself sits behind [`MapBackend`], an imperative,
//! handle-based interface. The manager is the only caller, and every method
//! takes `&mut self`, so reconciliation from different triggers is always
//! sequenced.
//!
//! ```text
//! Unmounted --mount--> Initializing --placement done--> Ready
//!     ^                      |                            |
//!     +-------unmount--------+-----------unmount----------+
//! ```

use crate::base_layer::{BaseLayerDescriptor, BaseLayerRegistry};
use crate::classifier::{classify, tooltip_for, MarkerStyle, MarkerTooltip};
use crate::commands::{SessionCommand, SessionReceiver};
use crate::config::{AppConfig, MarkerPalette};
use crate::error::{FleetwatchError, Result};
use crate::legend::LegendCounts;
use crate::overlay::{GeofenceOverlay, OverlayRegistry};
use crate::toggle::{LayerControlPanel, ViewToggleState};
use crate::types::{GeoBounds, GeoPoint, MarkerId, PositionBatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque handle to a layer object owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerHandle(u64);

impl LayerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Everything the backend needs to draw one marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub id: MarkerId,
    pub position: GeoPoint,
    pub style: MarkerStyle,
    pub tooltip: Option<MarkerTooltip>,
}

/// Imperative map library surface driven by the session manager.
///
/// Layer objects are created by the backend and referred to by handle.
/// Attaching and detaching must not destroy the layer object, so a handle
/// stays valid until the map is destroyed.
pub trait MapBackend {
    /// Creates the map instance. Returns [`FleetwatchError::MissingSurface`]
    /// when there is nothing to render into yet.
    fn create_map(&mut self, center: GeoPoint, zoom: f64) -> Result<()>;

    /// Releases the map instance and every layer object it owns.
    fn destroy_map(&mut self);

    /// Creates and attaches the base tile layer.
    fn create_tile_layer(&mut self, base: &BaseLayerDescriptor) -> LayerHandle;

    /// Points an existing tile layer at a different tile source.
    fn set_tile_source(&mut self, layer: LayerHandle, base: &BaseLayerDescriptor);

    /// Builds an overlay layer object without attaching it.
    fn create_overlay_layer(&mut self, overlay: &GeofenceOverlay) -> LayerHandle;

    fn attach_layer(&mut self, layer: LayerHandle);

    fn detach_layer(&mut self, layer: LayerHandle);

    /// Adds markers in order; later markers draw on top of earlier ones.
    fn add_markers(&mut self, markers: Vec<MarkerSpec>) -> Vec<LayerHandle>;

    fn remove_markers(&mut self, markers: &[LayerHandle]);

    /// Moves the viewport so `bounds` is visible with `padding` pixels around it.
    fn fit_bounds(&mut self, bounds: GeoBounds, padding: f32);
}

/// Lifecycle state of the map session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No map instance exists
    Unmounted,
    /// Map created, initial markers still being placed
    Initializing,
    /// Initial placement and fit done
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unmounted => write!(f, "Unmounted"),
            SessionState::Initializing => write!(f, "Initializing"),
            SessionState::Ready => write!(f, "Ready"),
        }
    }
}

/// Load-time constants of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub center: GeoPoint,
    pub zoom: f64,
    pub fit_padding: f32,
    /// Markers inserted per [`MapSessionManager::pump`] call
    pub chunk_size: usize,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            center: config.map.center,
            zoom: config.map.zoom,
            fit_padding: config.map.fit_padding,
            chunk_size: config.placement.chunk_size.max(1),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
struct OverlayAttachment {
    handle: LayerHandle,
    attached: bool,
}

/// Marker placement still in progress for one batch.
#[derive(Debug)]
struct Placement {
    batch: PositionBatch,
    /// Batch indices, normal records first so alerts draw on top
    order: Vec<usize>,
    cursor: usize,
}

impl Placement {
    fn new(batch: PositionBatch) -> Self {
        let (alerts, normal): (Vec<usize>, Vec<usize>) =
            (0..batch.len()).partition(|&i| batch[i].is_alert);
        let mut order = normal;
        order.extend(alerts);
        Self {
            batch,
            order,
            cursor: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.cursor >= self.order.len()
    }
}

/// The live map instance and everything attached to it.
#[derive(Debug)]
struct MapSession {
    state: SessionState,
    tile_layer: LayerHandle,
    active_base_layer: String,
    overlays: BTreeMap<String, OverlayAttachment>,
    markers: BTreeMap<MarkerId, LayerHandle>,
    bounds: Option<GeoBounds>,
    placement: Option<Placement>,
}

/// Owns the map session of one widget and reconciles it with the current
/// position batch and toggle state.
pub struct MapSessionManager<B: MapBackend> {
    backend: B,
    settings: SessionSettings,
    palette: Arc<MarkerPalette>,
    overlays: Arc<OverlayRegistry>,
    base_layers: Arc<BaseLayerRegistry>,
    batch: PositionBatch,
    legend: LegendCounts,
    session: Option<MapSession>,
}

impl<B: MapBackend> MapSessionManager<B> {
    pub fn new(
        backend: B,
        settings: SessionSettings,
        palette: Arc<MarkerPalette>,
        overlays: Arc<OverlayRegistry>,
        base_layers: Arc<BaseLayerRegistry>,
    ) -> Self {
        Self {
            backend,
            settings,
            palette,
            overlays,
            base_layers,
            batch: PositionBatch::default(),
            legend: LegendCounts::default(),
            session: None,
        }
    }

    /// Creates the map instance if a surface is available.
    ///
    /// A missing surface is not an error: the session stays `Unmounted` and
    /// the caller retries on its next mount attempt. Mounting while a session
    /// is live fails with [`FleetwatchError::SessionAlreadyActive`].
    pub fn mount(&mut self, toggles: &ViewToggleState) -> Result<SessionState> {
        if self.session.is_some() {
            return Err(FleetwatchError::SessionAlreadyActive);
        }

        match self.backend.create_map(self.settings.center, self.settings.zoom) {
            Ok(()) => {}
            Err(FleetwatchError::MissingSurface) => {
                debug!("Map surface not available yet, mount deferred");
                return Ok(SessionState::Unmounted);
            }
            Err(e) => return Err(e),
        }

        let base = self.resolve_base_layer(&toggles.active_base_layer_id).clone();
        let tile_layer = self.backend.create_tile_layer(&base);

        let mut overlays = BTreeMap::new();
        for overlay in self.overlays.iter() {
            let handle = self.backend.create_overlay_layer(overlay);
            let attached = toggles.is_overlay_visible(&overlay.id);
            if attached {
                self.backend.attach_layer(handle);
            }
            overlays.insert(overlay.id.clone(), OverlayAttachment { handle, attached });
        }

        info!(
            base_layer = %base.id,
            overlays = overlays.len(),
            positions = self.batch.len(),
            "Map session initializing"
        );

        self.session = Some(MapSession {
            state: SessionState::Initializing,
            tile_layer,
            active_base_layer: base.id,
            overlays,
            markers: BTreeMap::new(),
            bounds: None,
            placement: None,
        });

        self.start_placement();
        Ok(self.state())
    }

    /// Replaces the position batch.
    ///
    /// Every previously placed marker is removed and placement restarts with
    /// the new batch; an unfinished placement of an older batch is discarded.
    pub fn set_batch(&mut self, batch: PositionBatch) {
        self.legend = LegendCounts::from_batch(&batch);
        self.batch = batch;

        if self.session.is_some() {
            self.clear_markers();
            self.start_placement();
        }
    }

    /// Places the next chunk of markers.
    ///
    /// Returns true while markers remain to be placed.
    pub fn pump(&mut self) -> bool {
        let chunk_size = self.settings.chunk_size;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(placement) = session.placement.as_mut() else {
            return false;
        };

        let end = (placement.cursor + chunk_size).min(placement.order.len());
        let mut specs = Vec::with_capacity(end - placement.cursor);
        for &index in &placement.order[placement.cursor..end] {
            let record = &placement.batch[index];
            if let Err(e) = record.validate() {
                warn!(vehicle = %record.vehicle_id, "{}; rendering best-effort", e);
            }
            specs.push(MarkerSpec {
                id: MarkerId::for_record(index, record),
                position: record.position(),
                style: classify(record, &self.palette),
                tooltip: tooltip_for(record),
            });
        }
        placement.cursor = end;

        let ids: Vec<MarkerId> = specs.iter().map(|spec| spec.id.clone()).collect();
        let handles = self.backend.add_markers(specs);
        session.markers.extend(ids.into_iter().zip(handles));

        if placement.is_done() {
            self.finish_placement();
            false
        } else {
            true
        }
    }

    /// Places every remaining marker.
    pub fn flush(&mut self) {
        while self.pump() {}
    }

    /// Converges attached overlays and the tile source to `toggles`.
    ///
    /// This is the only way to change what the session shows.
    pub fn reconcile(&mut self, toggles: &ViewToggleState) {
        self.reconcile_overlays(&toggles.visible_overlay_ids);
        self.reconcile_base_layer(&toggles.active_base_layer_id);
    }

    /// Attaches or detaches overlays so exactly `visible` are shown.
    ///
    /// Layer objects are reused, never rebuilt.
    fn reconcile_overlays(&mut self, visible: &BTreeSet<String>) {
        for id in visible {
            if !self.overlays.contains(id) {
                warn!("{}", FleetwatchError::unknown_overlay(id.as_str()));
            }
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        for (id, attachment) in session.overlays.iter_mut() {
            let desired = visible.contains(id);
            if desired == attachment.attached {
                continue;
            }
            if desired {
                self.backend.attach_layer(attachment.handle);
            } else {
                self.backend.detach_layer(attachment.handle);
            }
            attachment.attached = desired;
            debug!(overlay = %id, attached = desired, "Overlay reconciled");
        }
    }

    /// Swaps the tile source of the existing tile layer. Unknown ids are
    /// logged and ignored.
    fn reconcile_base_layer(&mut self, id: &str) {
        let base = match self.base_layers.get_layer(id) {
            Ok(base) => base,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.active_base_layer == base.id {
            return;
        }

        self.backend.set_tile_source(session.tile_layer, base);
        info!(from = %session.active_base_layer, to = %base.id, "Base layer switched");
        session.active_base_layer = base.id.clone();
    }

    /// Releases the map instance and everything attached to it.
    ///
    /// Safe to call in any state, including mid-placement.
    pub fn unmount(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if session.placement.is_some() {
            debug!("Discarding in-flight marker placement on unmount");
        }

        let markers: Vec<LayerHandle> = session.markers.values().copied().collect();
        self.backend.remove_markers(&markers);
        for attachment in session.overlays.values().filter(|a| a.attached) {
            self.backend.detach_layer(attachment.handle);
        }
        self.backend.destroy_map();

        info!(markers = markers.len(), "Map session unmounted");
    }

    /// Applies one command. Visibility and base layer commands go through
    /// `panel`, which stays the source of truth for toggle state.
    pub fn apply(&mut self, command: SessionCommand, panel: &mut LayerControlPanel) {
        match command {
            SessionCommand::ReplaceBatch(batch) => self.set_batch(batch),
            SessionCommand::SetOverlayVisible { id, visible } => {
                if panel.set_overlay_visible(&id, visible) {
                    self.reconcile(panel.state());
                }
            }
            SessionCommand::ToggleOverlay(id) => {
                if panel.toggle_overlay(&id) {
                    self.reconcile(panel.state());
                }
            }
            SessionCommand::SwitchBaseLayer(id) => {
                if panel.switch_base_layer(&id) {
                    self.reconcile(panel.state());
                }
            }
            SessionCommand::Unmount => self.unmount(),
        }
    }

    /// Applies every queued command in arrival order.
    ///
    /// A run of consecutive `ReplaceBatch` commands collapses into its newest
    /// batch. Returns how many commands were applied.
    pub fn drain(&mut self, receiver: &SessionReceiver, panel: &mut LayerControlPanel) -> usize {
        let mut applied = 0;
        let mut pending: Option<PositionBatch> = None;

        while let Some(command) = receiver.try_recv() {
            if let SessionCommand::ReplaceBatch(batch) = command {
                if pending.replace(batch).is_some() {
                    debug!("Skipping superseded position batch");
                }
                continue;
            }
            if let Some(batch) = pending.take() {
                self.set_batch(batch);
                applied += 1;
            }
            debug!(command = command.name(), "Applying session command");
            self.apply(command, panel);
            applied += 1;
        }

        if let Some(batch) = pending {
            self.set_batch(batch);
            applied += 1;
        }
        applied
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Unmounted, |session| session.state)
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    /// Bounds of the last viewport fit.
    pub fn bounds(&self) -> Option<GeoBounds> {
        self.session.as_ref().and_then(|session| session.bounds)
    }

    pub fn legend(&self) -> LegendCounts {
        self.legend
    }

    pub fn batch(&self) -> &PositionBatch {
        &self.batch
    }

    pub fn marker_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.markers.len())
    }

    pub fn placement_pending(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.placement.is_some())
    }

    /// Ids of overlays currently attached to the map.
    pub fn attached_overlays(&self) -> BTreeSet<String> {
        self.session
            .as_ref()
            .map(|session| {
                session
                    .overlays
                    .iter()
                    .filter(|(_, a)| a.attached)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Layer object backing an overlay, attached or not.
    pub fn overlay_handle(&self, id: &str) -> Option<LayerHandle> {
        self.session
            .as_ref()
            .and_then(|session| session.overlays.get(id))
            .map(|attachment| attachment.handle)
    }

    pub fn tile_layer(&self) -> Option<LayerHandle> {
        self.session.as_ref().map(|session| session.tile_layer)
    }

    pub fn active_base_layer(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.active_base_layer.as_str())
    }

    pub fn palette(&self) -> &MarkerPalette {
        &self.palette
    }

    pub fn overlays(&self) -> &OverlayRegistry {
        &self.overlays
    }

    pub fn base_layers(&self) -> &BaseLayerRegistry {
        &self.base_layers
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn resolve_base_layer(&self, id: &str) -> &BaseLayerDescriptor {
        match self.base_layers.get_layer(id) {
            Ok(base) => base,
            Err(e) => {
                warn!("{}; using '{}'", e, self.base_layers.first().id);
                self.base_layers.first()
            }
        }
    }

    fn clear_markers(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.placement.take().is_some() {
            debug!("Discarding in-flight marker placement");
        }
        if session.markers.is_empty() {
            return;
        }
        let handles: Vec<LayerHandle> = session.markers.values().copied().collect();
        self.backend.remove_markers(&handles);
        session.markers.clear();
    }

    fn start_placement(&mut self) {
        let batch = self.batch.clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if batch.is_empty() {
            session.placement = None;
            self.finish_placement();
            return;
        }
        debug!(positions = batch.len(), "Starting marker placement");
        session.placement = Some(Placement::new(batch));
    }

    fn finish_placement(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let batch = match session.placement.take() {
            Some(placement) => placement.batch,
            None => self.batch.clone(),
        };

        let valid_points = batch.iter().map(|record| record.position());
        match GeoBounds::from_points(valid_points) {
            Some(bounds) => {
                self.backend.fit_bounds(bounds, self.settings.fit_padding);
                session.bounds = Some(bounds);
            }
            None => debug!("No valid positions to fit, keeping viewport"),
        }

        if session.state == SessionState::Initializing {
            session.state = SessionState::Ready;
            info!(markers = session.markers.len(), "Map session ready");
        }
    }
}

impl<B: MapBackend> Drop for MapSessionManager<B> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;
    use crate::types::PositionRecord;
    use chrono::Utc;

    fn record(lat: f64, lon: f64, is_alert: bool) -> PositionRecord {
        PositionRecord {
            vehicle_id: "V1".into(),
            timestamp: Utc::now(),
            latitude: lat,
            longitude: lon,
            intersects_barrier: false,
            inside_polygon: false,
            is_alert,
        }
    }

    fn manager(backend: RecordingBackend, chunk_size: usize) -> MapSessionManager<RecordingBackend> {
        let settings = SessionSettings {
            chunk_size,
            ..SessionSettings::default()
        };
        MapSessionManager::new(
            backend,
            settings,
            Arc::new(MarkerPalette::default()),
            Arc::new(OverlayRegistry::default()),
            Arc::new(BaseLayerRegistry::builtin()),
        )
    }

    fn toggles() -> ViewToggleState {
        ViewToggleState::new("dark", Vec::<String>::new())
    }

    #[test]
    fn test_missing_surface_defers_mount() {
        let mut manager = manager(RecordingBackend::without_surface(), 10);
        assert_eq!(manager.mount(&toggles()).unwrap(), SessionState::Unmounted);
        assert!(!manager.is_mounted());

        manager.backend_mut().set_surface_available(true);
        assert_eq!(manager.mount(&toggles()).unwrap(), SessionState::Ready);

        let defaults = SessionSettings::default();
        assert_eq!(
            manager.backend().initial_view(),
            Some((defaults.center, defaults.zoom))
        );
    }

    #[test]
    fn test_second_mount_is_an_error() {
        let mut manager = manager(RecordingBackend::new(), 10);
        manager.mount(&toggles()).unwrap();
        assert!(matches!(
            manager.mount(&toggles()),
            Err(FleetwatchError::SessionAlreadyActive)
        ));
        assert_eq!(manager.backend().maps_created(), 1);
    }

    #[test]
    fn test_chunked_placement_reaches_ready() {
        let mut manager = manager(RecordingBackend::new(), 2);
        manager.set_batch(PositionBatch::new(vec![
            record(-22.0, -49.0, false),
            record(-22.1, -49.1, true),
            record(-22.2, -49.2, false),
        ]));

        assert_eq!(manager.mount(&toggles()).unwrap(), SessionState::Initializing);
        assert_eq!(manager.marker_count(), 0);

        assert!(manager.pump());
        assert_eq!(manager.marker_count(), 2);
        assert_eq!(manager.state(), SessionState::Initializing);

        assert!(!manager.pump());
        assert_eq!(manager.marker_count(), 3);
        assert_eq!(manager.state(), SessionState::Ready);
        assert!(!manager.placement_pending());
    }

    #[test]
    fn test_alerts_placed_after_normal_markers() {
        let mut manager = manager(RecordingBackend::new(), 100);
        manager.set_batch(PositionBatch::new(vec![
            record(-22.0, -49.0, true),
            record(-22.1, -49.1, false),
            record(-22.2, -49.2, true),
            record(-22.3, -49.3, false),
        ]));
        manager.mount(&toggles()).unwrap();
        manager.flush();

        let alerts: Vec<bool> = manager
            .backend()
            .markers()
            .iter()
            .map(|spec| spec.style.is_alert())
            .collect();
        assert_eq!(alerts, vec![false, false, true, true]);
    }

    #[test]
    fn test_newer_batch_cancels_in_flight_placement() {
        let mut manager = manager(RecordingBackend::new(), 2);
        manager.set_batch(PositionBatch::new(
            (0..10).map(|i| record(-22.0 - i as f64 * 0.01, -49.0, false)).collect(),
        ));
        manager.mount(&toggles()).unwrap();
        manager.pump();
        assert_eq!(manager.marker_count(), 2);

        let newer = PositionBatch::new(vec![record(-23.0, -50.0, true)]);
        manager.set_batch(newer);
        manager.flush();

        assert_eq!(manager.marker_count(), 1);
        assert_eq!(manager.backend().markers().len(), 1);
        assert!(manager.backend().markers()[0].style.is_alert());
    }

    #[test]
    fn test_invalid_coordinates_rendered_but_not_fitted() {
        let mut manager = manager(RecordingBackend::new(), 10);
        manager.set_batch(PositionBatch::new(vec![
            record(-22.0, -49.0, false),
            record(95.0, -49.0, false),
        ]));
        manager.mount(&toggles()).unwrap();
        manager.flush();

        assert_eq!(manager.marker_count(), 2);
        let bounds = manager.bounds().unwrap();
        assert_eq!(bounds.north, -22.0);
    }

    #[test]
    fn test_unmount_mid_placement() {
        let mut manager = manager(RecordingBackend::new(), 1);
        manager.set_batch(PositionBatch::new(vec![
            record(-22.0, -49.0, false),
            record(-22.1, -49.0, false),
        ]));
        manager.mount(&toggles()).unwrap();
        manager.pump();

        manager.unmount();
        assert_eq!(manager.state(), SessionState::Unmounted);
        assert!(!manager.backend().is_map_live());
        assert_eq!(manager.backend().layer_count(), 0);
        assert!(!manager.pump());

        // Unmount twice is harmless
        manager.unmount();

        // A fresh mount starts a new initializing cycle
        assert_eq!(manager.mount(&toggles()).unwrap(), SessionState::Initializing);
        assert_eq!(manager.backend().maps_created(), 2);
    }

    #[test]
    fn test_reconcile_unknown_base_layer_is_ignored() {
        let mut manager = manager(RecordingBackend::new(), 10);
        manager.mount(&toggles()).unwrap();

        manager.reconcile(&ViewToggleState::new("watercolor", Vec::<String>::new()));
        assert_eq!(manager.active_base_layer(), Some("dark"));
        assert_eq!(manager.backend().tile_source_changes(), 0);

        manager.reconcile(&ViewToggleState::new("street", Vec::<String>::new()));
        assert_eq!(manager.active_base_layer(), Some("street"));
        assert_eq!(manager.backend().tile_layer_count(), 1);
    }

    #[test]
    fn test_drain_collapses_consecutive_batches() {
        let mut manager = manager(RecordingBackend::new(), 10);
        manager.mount(&toggles()).unwrap();
        let mut panel = LayerControlPanel::new(
            toggles(),
            &OverlayRegistry::default(),
            &BaseLayerRegistry::builtin(),
        );
        let (tx, rx) = crate::commands::command_channel();

        for count in [12, 7, 4] {
            let batch = (0..count).map(|i| record(-22.0, -49.0 + i as f64 * 0.01, false));
            tx.replace_batch(PositionBatch::new(batch.collect())).unwrap();
        }
        tx.send(SessionCommand::SwitchBaseLayer("street".into())).unwrap();
        tx.replace_batch(PositionBatch::new(vec![record(-22.0, -49.0, true)]))
            .unwrap();
        tx.replace_batch(PositionBatch::new(vec![
            record(-22.0, -49.0, false),
            record(-22.5, -49.5, true),
        ]))
        .unwrap();

        assert_eq!(manager.drain(&rx, &mut panel), 3);
        assert!(rx.is_empty());
        assert_eq!(manager.active_base_layer(), Some("street"));

        manager.flush();
        assert_eq!(manager.batch().len(), 2);
        assert_eq!(manager.marker_count(), 2);
        assert_eq!(manager.legend().alerts, 1);
    }
}
