//! GUI application for the fleetwatch map engine.
//!
//! This crate provides a native desktop front-end built with egui/eframe: a
//! walkers slippy map showing vehicle positions over geofence overlays, a
//! layer control panel and the alert legend.

use eframe::egui;
use fleetwatch_core::commands::{command_channel, SessionReceiver, SessionSender};
use fleetwatch_core::config::AppConfig;
use fleetwatch_core::overlay::OverlayRegistry;
use fleetwatch_core::session::{MapSessionManager, SessionSettings};
use fleetwatch_core::toggle::{LayerControlPanel, ViewToggleState};
use fleetwatch_core::{PositionBatch, SessionState};
use std::sync::Arc;
use std::time::Duration;

mod ui;

pub mod backend;
pub use backend::WalkersBackend;

/// Main application state for the fleetwatch GUI.
pub struct FleetwatchApp {
    /// Owns the map instance
    manager: MapSessionManager<WalkersBackend>,

    /// Toggle state behind the layer control
    panel: LayerControlPanel,

    /// Commands from the reload thread and other producers
    commands: SessionReceiver,

    /// Kept so the queue stays open while the app runs
    sender: SessionSender,

    /// Set once the session was unmounted on request; no remount after that
    closed: bool,
}

impl FleetwatchApp {
    /// Creates the application from loaded configuration and data.
    pub fn new(
        config: &AppConfig,
        overlays: OverlayRegistry,
        batch: PositionBatch,
    ) -> anyhow::Result<Self> {
        let base_layers = Arc::new(config.base_layer_registry()?);
        let overlays = Arc::new(overlays);

        let panel = LayerControlPanel::new(
            ViewToggleState::from_config(&config.map),
            &overlays,
            &base_layers,
        );

        let mut manager = MapSessionManager::new(
            WalkersBackend::new(config.map.max_fit_zoom),
            SessionSettings::from_config(config),
            Arc::new(config.markers.clone()),
            overlays,
            base_layers,
        );
        manager.set_batch(batch);

        let (sender, commands) = command_channel();

        Ok(Self {
            manager,
            panel,
            commands,
            sender,
            closed: false,
        })
    }

    /// Handle for producers outside the UI thread.
    pub fn command_sender(&self) -> SessionSender {
        self.sender.clone()
    }

    fn ensure_mounted(&mut self, ctx: &egui::Context) {
        if self.closed || self.manager.is_mounted() {
            return;
        }
        self.manager.backend_mut().attach_surface(ctx);
        if let Err(e) = self.manager.mount(self.panel.state()) {
            tracing::error!("Failed to mount map session: {}", e);
        }
    }

    fn status_text(&self) -> String {
        match self.manager.state() {
            SessionState::Unmounted if self.closed => "Session closed".to_string(),
            SessionState::Unmounted => "Waiting for map surface".to_string(),
            SessionState::Initializing => format!(
                "Placing markers {}/{}",
                self.manager.marker_count(),
                self.manager.batch().len()
            ),
            SessionState::Ready => format!("{} positions", self.manager.marker_count()),
        }
    }
}

impl eframe::App for FleetwatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_mounted(ctx);

        let applied = self.manager.drain(&self.commands, &mut self.panel);
        if applied > 0 && !self.manager.is_mounted() {
            self.closed = true;
        }

        // One chunk per frame keeps large batches from blocking the loop
        let placing = self.manager.pump();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Fleetwatch");
                ui.separator();
                ui::legend::show(ui, &self.manager.legend(), self.manager.palette());

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(self.status_text())
                            .small()
                            .color(egui::Color32::GRAY),
                    );
                });
            });
        });

        egui::SidePanel::left("layer_panel")
            .resizable(false)
            .default_width(180.0)
            .show(ctx, |ui| {
                let changed = ui::layer_panel::show(
                    ui,
                    &mut self.panel,
                    self.manager.overlays(),
                    self.manager.base_layers(),
                );
                if changed {
                    self.manager.reconcile(self.panel.state());
                }
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let palette = self.manager.palette().clone();
                ui::map::show(ui, self.manager.backend_mut(), &palette);
            });

        if placing {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_secs(1));
        }
    }
}
