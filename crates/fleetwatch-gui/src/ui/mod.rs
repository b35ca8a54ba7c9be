//! UI modules for the fleetwatch GUI.

pub mod layer_panel;
pub mod legend;
pub mod map;
