//! End-to-end map session scenarios against the recording backend

mod common;

use common::{fixtures_dir, grid_batch, record, Harness};
use fleetwatch_core::classifier::StyleKey;
use fleetwatch_core::commands::{command_channel, SessionCommand};
use fleetwatch_core::config::MarkerPalette;
use fleetwatch_core::legend::{count_alerts, count_normal};
use fleetwatch_core::testing::RecordingBackend;
use fleetwatch_core::types::load_batch;
use fleetwatch_core::{FleetwatchError, PositionBatch, SessionState};

#[test]
fn test_single_normal_position() {
    let mut h = Harness::new(500);
    h.manager
        .set_batch(PositionBatch::new(vec![record("V1", -22.3, -49.5, false)]));
    h.mount();
    h.manager.flush();

    let markers = h.manager.backend().markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].style.key, StyleKey::Normal);
    assert!(markers[0].tooltip.is_none());

    let legend = h.manager.legend();
    assert_eq!(legend.alerts, 0);
    assert_eq!(legend.normal, 1);
    assert_eq!(h.manager.state(), SessionState::Ready);
}

#[test]
fn test_barrier_and_polygon_alerts_have_distinct_borders() {
    let mut barrier = record("B1", -22.31, -49.07, true);
    barrier.intersects_barrier = true;
    let mut polygon = record("P1", -22.20, -49.95, true);
    polygon.inside_polygon = true;

    let mut h = Harness::new(500);
    h.manager.set_batch(PositionBatch::new(vec![barrier, polygon]));
    h.mount();
    h.manager.flush();

    let palette = MarkerPalette::default();
    let markers = h.manager.backend().markers();
    assert_eq!(markers.len(), 2);
    assert_eq!(markers[0].style.border, palette.barrier_color);
    assert_eq!(markers[1].style.border, palette.polygon_color);
    assert_ne!(markers[0].style.border, markers[1].style.border);
    assert_eq!(h.manager.legend().alerts, 2);
}

#[test]
fn test_hiding_polygons_keeps_markers_and_barriers() {
    let mut h = Harness::new(500);
    h.manager.set_batch(grid_batch(20));
    h.mount();
    h.manager.flush();
    assert_eq!(h.manager.attached_overlays().len(), 2);

    assert!(h.panel.toggle_overlay("city-polygons"));
    h.manager.reconcile(h.panel.state());

    let attached = h.manager.backend().attached_overlay_ids();
    assert!(!attached.contains("city-polygons"));
    assert!(attached.contains("barrier-lines"));
    assert_eq!(h.manager.marker_count(), 20);
    assert_eq!(h.manager.backend().markers().len(), 20);
}

#[test]
fn test_base_layer_switch_leaves_markers_and_overlays_untouched() {
    let mut h = Harness::new(500);
    h.manager.set_batch(grid_batch(30));
    h.mount();
    h.manager.flush();

    let backend = h.manager.backend();
    let markers_before = serde_json::to_string(&backend.markers()).unwrap();
    let overlays_before = backend.attached_overlay_ids();
    let template_before = backend.tile_url_template().map(str::to_string);
    let layers_before = backend.layer_count();

    assert!(h.panel.switch_base_layer("satellite"));
    h.manager.reconcile(h.panel.state());

    let backend = h.manager.backend();
    assert_ne!(backend.tile_url_template().map(str::to_string), template_before);
    assert!(backend
        .tile_url_template()
        .is_some_and(|t| t.contains("World_Imagery")));
    assert_eq!(backend.tile_layer_count(), 1);
    assert_eq!(backend.layer_count(), layers_before);
    assert_eq!(serde_json::to_string(&backend.markers()).unwrap(), markers_before);
    assert_eq!(backend.attached_overlay_ids(), overlays_before);
    assert_eq!(h.manager.active_base_layer(), Some("satellite"));
}

#[test]
fn test_empty_batch_clears_markers_and_keeps_bounds() {
    let mut h = Harness::new(500);
    h.manager.set_batch(grid_batch(100));
    h.mount();
    h.manager.flush();

    let bounds = h.manager.bounds();
    let fits = h.manager.backend().fit_calls().len();
    assert!(bounds.is_some());
    assert_eq!(h.manager.marker_count(), 100);

    h.manager.set_batch(PositionBatch::default());
    h.manager.flush();

    assert_eq!(h.manager.marker_count(), 0);
    assert!(h.manager.backend().markers().is_empty());
    assert_eq!(h.manager.legend().alerts, 0);
    assert_eq!(h.manager.legend().normal, 0);
    assert_eq!(h.manager.bounds(), bounds);
    assert_eq!(h.manager.backend().fit_calls().len(), fits);
}

#[test]
fn test_fitted_bounds_contain_every_position() {
    let mut h = Harness::new(7);
    let batch = grid_batch(64);
    h.manager.set_batch(batch.clone());
    h.mount();
    h.manager.flush();

    let bounds = h.manager.backend().last_fit().unwrap();
    assert_eq!(h.manager.bounds(), Some(bounds));
    for r in batch.iter() {
        assert!(bounds.contains(r.position()), "{} outside {:?}", r.position(), bounds);
    }
}

#[test]
fn test_toggle_twice_preserves_layer_identity() {
    let mut h = Harness::new(500);
    h.mount();

    let handle = h.manager.overlay_handle("barrier-lines").unwrap();
    let attached_before = h.manager.backend().attached_overlay_ids();
    let created_before = h.manager.backend().overlay_layers_created();

    h.panel.toggle_overlay("barrier-lines");
    h.manager.reconcile(h.panel.state());
    assert!(!h.manager.backend().is_attached(handle));

    h.panel.toggle_overlay("barrier-lines");
    h.manager.reconcile(h.panel.state());

    assert!(h.manager.backend().is_attached(handle));
    assert_eq!(h.manager.overlay_handle("barrier-lines"), Some(handle));
    assert_eq!(h.manager.backend().attached_overlay_ids(), attached_before);
    assert_eq!(h.manager.backend().overlay_layers_created(), created_before);
}

#[test]
fn test_toggle_order_independence() {
    let mut ab = Harness::new(500);
    ab.mount();
    ab.panel.toggle_overlay("city-polygons");
    ab.manager.reconcile(ab.panel.state());
    ab.panel.toggle_overlay("barrier-lines");
    ab.manager.reconcile(ab.panel.state());

    let mut ba = Harness::new(500);
    ba.mount();
    ba.panel.toggle_overlay("barrier-lines");
    ba.manager.reconcile(ba.panel.state());
    ba.panel.toggle_overlay("city-polygons");
    ba.manager.reconcile(ba.panel.state());

    assert_eq!(
        ab.manager.backend().attached_overlay_ids(),
        ba.manager.backend().attached_overlay_ids()
    );
    assert!(ab.manager.attached_overlays().is_empty());
}

#[test]
fn test_newer_batch_wins_over_in_flight_placement() {
    let mut h = Harness::new(10);
    h.manager.set_batch(grid_batch(100));
    h.mount();
    assert!(h.manager.pump());
    assert!(h.manager.pump());
    assert_eq!(h.manager.marker_count(), 20);

    let newer = grid_batch(5);
    h.manager.set_batch(newer.clone());
    h.manager.flush();

    let ids: Vec<&str> = h
        .manager
        .backend()
        .markers()
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(ids.len(), 5);
    assert!(ids.iter().all(|id| id.starts_with("GRID00")));
    assert_eq!(h.manager.state(), SessionState::Ready);
    assert_eq!(h.manager.legend().total(), newer.len());
}

#[test]
fn test_unmount_mid_placement_releases_everything() {
    let mut h = Harness::new(10);
    h.manager.set_batch(grid_batch(50));
    h.mount();
    h.manager.pump();
    assert!(h.manager.placement_pending());

    h.manager.unmount();

    assert_eq!(h.manager.state(), SessionState::Unmounted);
    assert!(!h.manager.backend().is_map_live());
    assert_eq!(h.manager.backend().layer_count(), 0);
    assert!(h.manager.attached_overlays().is_empty());
    assert!(!h.manager.pump());

    h.mount();
    assert_eq!(h.manager.state(), SessionState::Initializing);
    h.manager.flush();
    assert_eq!(h.manager.marker_count(), 50);
}

#[test]
fn test_missing_surface_is_retried() {
    let mut h = Harness::with_backend(RecordingBackend::without_surface(), 500);
    h.manager.set_batch(grid_batch(3));

    let state = h.manager.mount(h.panel.state()).unwrap();
    assert_eq!(state, SessionState::Unmounted);
    assert_eq!(h.manager.backend().maps_created(), 0);

    h.manager.backend_mut().set_surface_available(true);
    h.mount();
    h.manager.flush();
    assert_eq!(h.manager.state(), SessionState::Ready);
    assert_eq!(h.manager.marker_count(), 3);
}

#[test]
fn test_second_session_rejected() {
    let mut h = Harness::new(500);
    h.mount();
    let err = h.manager.mount(h.panel.state()).unwrap_err();
    assert!(matches!(err, FleetwatchError::SessionAlreadyActive));
    assert!(!err.is_recoverable());
    assert_eq!(h.manager.backend().maps_created(), 1);
}

#[test]
fn test_unknown_ids_are_ignored() {
    let mut h = Harness::new(500);
    h.mount();
    let overlays_before = h.manager.attached_overlays();

    h.manager.apply(
        SessionCommand::SetOverlayVisible {
            id: "rivers".into(),
            visible: true,
        },
        &mut h.panel,
    );
    h.manager.apply(SessionCommand::SwitchBaseLayer("watercolor".into()), &mut h.panel);

    assert_eq!(h.manager.attached_overlays(), overlays_before);
    assert_eq!(h.manager.active_base_layer(), Some("dark"));
    assert_eq!(h.manager.backend().tile_source_changes(), 0);
}

#[test]
fn test_base_layer_survives_unrelated_overlay_toggle() {
    let mut h = Harness::new(500);
    h.mount();

    h.manager.apply(SessionCommand::SwitchBaseLayer("street".into()), &mut h.panel);
    assert_eq!(h.manager.active_base_layer(), Some("street"));
    assert_eq!(h.panel.state().active_base_layer_id, "street");

    h.manager.apply(SessionCommand::ToggleOverlay("city-polygons".into()), &mut h.panel);
    h.manager.reconcile(h.panel.state());

    assert_eq!(h.manager.active_base_layer(), Some("street"));
    assert_eq!(h.manager.backend().tile_source_changes(), 1);
}

#[test]
fn test_commands_drain_in_arrival_order() {
    let mut h = Harness::new(500);
    h.mount();
    let (tx, rx) = command_channel();

    tx.replace_batch(grid_batch(12)).unwrap();
    tx.send(SessionCommand::SetOverlayVisible {
        id: "city-polygons".into(),
        visible: false,
    })
    .unwrap();
    tx.send(SessionCommand::SwitchBaseLayer("topographic".into()))
        .unwrap();
    tx.replace_batch(grid_batch(4)).unwrap();

    let applied = h.manager.drain(&rx, &mut h.panel);
    assert_eq!(applied, 4);
    h.manager.flush();

    assert_eq!(h.manager.marker_count(), 4);
    assert!(!h.panel.state().is_overlay_visible("city-polygons"));
    assert!(!h.manager.attached_overlays().contains("city-polygons"));
    assert_eq!(h.manager.active_base_layer(), Some("topographic"));

    tx.send(SessionCommand::Unmount).unwrap();
    h.manager.drain(&rx, &mut h.panel);
    assert!(!h.manager.is_mounted());
}

#[test]
fn test_fixture_batch_end_to_end() {
    let batch = load_batch(fixtures_dir().join("positions.json")).unwrap();
    assert_eq!(count_alerts(&batch) + count_normal(&batch), batch.len());

    let mut h = Harness::new(2);
    h.manager.set_batch(batch);
    h.mount();
    h.manager.flush();

    let markers = h.manager.backend().markers();
    let keys: Vec<StyleKey> = markers.iter().map(|m| m.style.key).collect();
    assert_eq!(
        keys,
        vec![
            StyleKey::Normal,
            StyleKey::Normal,
            StyleKey::AlertBoth,
            StyleKey::AlertPolygon
        ]
    );

    let tooltip = markers[2].tooltip.as_ref().unwrap();
    assert_eq!(tooltip.vehicle_id, "ABC1D23");
    assert_eq!(tooltip.time, "01/03/2024 10:15:07");
    assert_eq!(h.manager.legend().alerts, 2);
    assert_eq!(h.manager.legend().normal, 2);
}
