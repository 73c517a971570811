//! Minimal style data model
//!
//! The cascade engine proper is an external collaborator; this module keeps
//! just enough of the style JSON to discover sources from layers, resolve the
//! glyph URL and record the class/transition inputs the cascade runs with.

pub mod fetch;

use crate::prelude::{HashMap, HashSet};
use crate::tiles::source::{SourceDescriptor, SourceKind};
use crate::MapError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct StyleModel {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sources: HashMap<String, StyleSourceDef>,
    #[serde(default)]
    pub layers: Vec<StyleLayer>,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default)]
    pub glyphs: Option<String>,
    #[serde(skip)]
    active_classes: Vec<String>,
    #[serde(skip)]
    transition: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StyleLayer {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "source-layer")]
    pub source_layer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StyleSourceDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tiles: Option<Vec<String>>,
    #[serde(default = "default_tile_size", rename = "tileSize")]
    pub tile_size: u32,
}

fn default_tile_size() -> u32 {
    256
}

impl StyleModel {
    pub fn parse(json: &str) -> Result<Self, MapError> {
        let style: StyleModel = serde_json::from_str(json)?;
        if style.layers.is_empty() {
            return Err(MapError::Parse("style has no layers".to_string()));
        }
        Ok(style)
    }

    /// Feeds the current class list and default transition duration into the
    /// cascade. The real cascading runs in the drawing collaborator; the
    /// engine records the inputs so every frame carries them.
    pub fn cascade(&mut self, classes: &[String], transition: Duration) {
        self.active_classes = classes.to_vec();
        self.transition = transition;
        log::debug!(
            "cascaded style with classes {:?} and transition {:?}",
            self.active_classes,
            self.transition
        );
    }

    pub fn active_classes(&self) -> &[String] {
        &self.active_classes
    }

    pub fn transition(&self) -> Duration {
        self.transition
    }

    /// Descriptors of every source referenced by at least one layer, in first
    /// reference order. Layers naming unknown or unsupported sources are
    /// skipped with a warning.
    pub fn active_source_descriptors(&self) -> Vec<SourceDescriptor> {
        let mut seen: HashSet<String> = HashSet::default();
        let mut out = Vec::new();
        for layer in &self.layers {
            let Some(source_id) = &layer.source else {
                continue;
            };
            if !seen.insert(source_id.clone()) {
                continue;
            }
            let Some(def) = self.sources.get(source_id) else {
                log::warn!("layer {} references unknown source {}", layer.id, source_id);
                continue;
            };
            let kind = match def.kind.as_str() {
                "vector" => SourceKind::Vector,
                "raster" => SourceKind::Raster,
                "annotations" => SourceKind::Annotations,
                other => {
                    log::warn!("source {source_id} has unsupported type {other}");
                    continue;
                }
            };
            out.push(SourceDescriptor {
                id: source_id.clone(),
                kind,
                url_template: def
                    .tiles
                    .as_ref()
                    .and_then(|tiles| tiles.first().cloned())
                    .or_else(|| def.url.clone()),
                tile_size: def.tile_size,
            });
        }
        out
    }
}

/// Resolves the style's glyph template into a fetchable URL: relative
/// templates are joined onto `base`, `mapbox://` templates are rewritten to
/// the public API host, and the access token is appended when present.
pub fn resolve_glyph_url(template: &str, base: &str, access_token: &str) -> String {
    let mut url = if let Some(rest) = template.strip_prefix("mapbox://") {
        format!("https://api.tiles.mapbox.com/v4/{rest}")
    } else if !template.contains("://") && !base.is_empty() {
        format!("{base}{template}")
    } else {
        template.to_string()
    };
    if !access_token.is_empty() && !url.contains("access_token=") {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str("access_token=");
        url.push_str(access_token);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLE: &str = r#"{
        "version": 8,
        "glyphs": "fonts/{fontstack}/{range}.pbf",
        "sources": {
            "osm": {"type": "raster", "tiles": ["https://tile.example.org/{z}/{x}/{y}.png"]},
            "streets": {"type": "vector", "url": "https://vector.example.org/{z}/{x}/{y}.mvt"}
        },
        "layers": [
            {"id": "background", "type": "background"},
            {"id": "base", "type": "raster", "source": "osm"},
            {"id": "roads", "type": "line", "source": "streets", "source-layer": "road"},
            {"id": "labels", "type": "symbol", "source": "streets", "source-layer": "place"},
            {"id": "ghost", "type": "fill", "source": "missing"}
        ]
    }"#;

    #[test]
    fn test_parse_and_discover_sources() {
        let style = StyleModel::parse(STYLE).unwrap();
        assert_eq!(style.version, 8);

        let descriptors = style.active_source_descriptors();
        // "streets" referenced twice yields one descriptor; "missing" is
        // dropped.
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id, "osm");
        assert_eq!(descriptors[0].kind, SourceKind::Raster);
        assert_eq!(descriptors[1].id, "streets");
        assert_eq!(descriptors[1].kind, SourceKind::Vector);
        assert!(descriptors[1].url_template.is_some());
    }

    #[test]
    fn test_parse_rejects_style_without_layers() {
        assert!(matches!(
            StyleModel::parse(r#"{"version": 8, "layers": []}"#),
            Err(MapError::Parse(_))
        ));
        assert!(matches!(
            StyleModel::parse("not json"),
            Err(MapError::Serialization(_))
        ));
    }

    #[test]
    fn test_cascade_records_inputs() {
        let mut style = StyleModel::parse(STYLE).unwrap();
        style.cascade(&["night".to_string()], Duration::from_millis(300));
        assert_eq!(style.active_classes(), ["night".to_string()]);
        assert_eq!(style.transition(), Duration::from_millis(300));
    }

    #[test]
    fn test_glyph_url_resolution() {
        assert_eq!(
            resolve_glyph_url("fonts/{fontstack}/{range}.pbf", "https://example.org/", "tok"),
            "https://example.org/fonts/{fontstack}/{range}.pbf?access_token=tok"
        );
        assert_eq!(
            resolve_glyph_url("mapbox://fonts/{fontstack}/{range}.pbf", "", "tok"),
            "https://api.tiles.mapbox.com/v4/fonts/{fontstack}/{range}.pbf?access_token=tok"
        );
        assert_eq!(
            resolve_glyph_url("https://example.org/g?fmt=pbf", "", "tok"),
            "https://example.org/g?fmt=pbf&access_token=tok"
        );
        assert_eq!(
            resolve_glyph_url("https://example.org/g", "", ""),
            "https://example.org/g"
        );
    }
}
