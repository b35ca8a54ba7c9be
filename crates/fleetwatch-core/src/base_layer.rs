//! Catalog of switchable base map styles.
//!
//! The catalog is static. Switching the active style swaps the URL template
//! of the one tile layer the map session owns; it never creates a second
//! tile layer.

use crate::error::{ConfigError, FleetwatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Describes one tile source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseLayerDescriptor {
    /// Stable identifier used by toggles and configuration
    pub id: String,

    /// Human-readable label for the layer control panel
    pub label: String,

    /// Slippy-map URL template with `{z}`, `{x}`, `{y}` and optional
    /// `{s}` (subdomain) and `{r}` (retina suffix) placeholders
    pub url_template: String,

    /// Attribution text shown on the map
    #[serde(default)]
    pub attribution: String,

    /// Subdomains substituted for `{s}`
    #[serde(default)]
    pub subdomains: Vec<String>,

    /// Maximum zoom level served by the source
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

fn default_max_zoom() -> u8 {
    19
}

impl BaseLayerDescriptor {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        url_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            url_template: url_template.into(),
            attribution: String::new(),
            subdomains: Vec::new(),
            max_zoom: default_max_zoom(),
        }
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = attribution.into();
        self
    }

    pub fn with_subdomains(mut self, subdomains: &[&str]) -> Self {
        self.subdomains = subdomains.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Expands the URL template for one tile.
    pub fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        expand_template(&self.url_template, &self.subdomains, zoom, x, y)
    }
}

/// Expands a slippy-map URL template. Subdomains rotate on `x + y` so
/// neighbouring tiles spread across hosts.
pub fn expand_template(template: &str, subdomains: &[String], zoom: u8, x: u32, y: u32) -> String {
    let subdomain = if subdomains.is_empty() {
        "a"
    } else {
        let index = (x as usize + y as usize) % subdomains.len();
        subdomains[index].as_str()
    };

    template
        .replace("{s}", subdomain)
        .replace("{z}", &zoom.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
        .replace("{r}", "")
}

/// The four built-in styles: dark, satellite, topographic, street.
pub fn builtin_catalog() -> Vec<BaseLayerDescriptor> {
    vec![
        BaseLayerDescriptor::new(
            "dark",
            "Dark",
            "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
        )
        .with_subdomains(&["a", "b", "c", "d"])
        .with_attribution("© OpenStreetMap contributors © CARTO"),
        BaseLayerDescriptor::new(
            "satellite",
            "Satellite",
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        )
        .with_attribution("Tiles © Esri"),
        BaseLayerDescriptor::new(
            "topographic",
            "Topographic",
            "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
        )
        .with_subdomains(&["a", "b", "c"])
        .with_max_zoom(17)
        .with_attribution("© OpenStreetMap contributors, SRTM | © OpenTopoMap (CC-BY-SA)"),
        BaseLayerDescriptor::new(
            "street",
            "Street",
            "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        )
        .with_attribution("© OpenStreetMap contributors"),
    ]
}

/// Ordered, immutable catalog of base layers.
#[derive(Debug, Clone)]
pub struct BaseLayerRegistry {
    layers: Vec<BaseLayerDescriptor>,
}

impl BaseLayerRegistry {
    /// Builds a registry, rejecting empty catalogs and duplicate ids.
    pub fn new(layers: Vec<BaseLayerDescriptor>) -> Result<Self> {
        if layers.is_empty() {
            return Err(ConfigError::invalid_value("base_layers", "catalog is empty").into());
        }

        let mut seen = HashSet::new();
        for layer in &layers {
            if !seen.insert(layer.id.as_str()) {
                return Err(ConfigError::DuplicateBaseLayerId {
                    id: layer.id.clone(),
                }
                .into());
            }
        }

        Ok(Self { layers })
    }

    /// Registry over the built-in catalog.
    pub fn builtin() -> Self {
        Self {
            layers: builtin_catalog(),
        }
    }

    /// Layers in display order.
    pub fn list_layers(&self) -> &[BaseLayerDescriptor] {
        &self.layers
    }

    pub fn get_layer(&self, id: &str) -> Result<&BaseLayerDescriptor> {
        self.layers
            .iter()
            .find(|layer| layer.id == id)
            .ok_or_else(|| FleetwatchError::unknown_base_layer(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.layers.iter().any(|layer| layer.id == id)
    }

    /// The first layer in the catalog.
    pub fn first(&self) -> &BaseLayerDescriptor {
        // `new` and `builtin` both guarantee a non-empty catalog
        &self.layers[0]
    }
}

impl Default for BaseLayerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order() {
        let registry = BaseLayerRegistry::builtin();
        let ids: Vec<&str> = registry
            .list_layers()
            .iter()
            .map(|layer| layer.id.as_str())
            .collect();
        assert_eq!(ids, vec!["dark", "satellite", "topographic", "street"]);
        assert_eq!(registry.first().id, "dark");
    }

    #[test]
    fn test_get_layer() {
        let registry = BaseLayerRegistry::builtin();
        assert_eq!(registry.get_layer("satellite").unwrap().label, "Satellite");
        assert!(matches!(
            registry.get_layer("watercolor"),
            Err(FleetwatchError::UnknownBaseLayerId { .. })
        ));
    }

    #[test]
    fn test_template_expansion() {
        let dark = BaseLayerRegistry::builtin().get_layer("dark").unwrap().clone();
        assert_eq!(
            dark.tile_url(8, 95, 146),
            "https://b.basemaps.cartocdn.com/dark_all/8/95/146.png"
        );

        let satellite = BaseLayerRegistry::builtin()
            .get_layer("satellite")
            .unwrap()
            .clone();
        assert!(satellite.tile_url(3, 1, 2).ends_with("/tile/3/2/1"));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let layer = BaseLayerDescriptor::new("a", "A", "https://x/{z}/{x}/{y}.png");
        assert!(BaseLayerRegistry::new(vec![layer.clone(), layer]).is_err());
        assert!(BaseLayerRegistry::new(Vec::new()).is_err());
    }
}
