//! Source descriptors and tile payloads

use crate::annotations::AnnotationFeature;
use crate::core::geo::TileCoord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Raster,
    /// Synthetic source fed by materialized annotation tiles
    Annotations,
}

/// Identity of a data source. The registry is keyed on descriptor equality,
/// so a style change that alters a source's connection info is a new source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDescriptor {
    pub id: String,
    pub kind: SourceKind,
    /// Tile URL template with `{z}`/`{x}`/`{y}` placeholders; `None` for the
    /// synthetic annotation source.
    pub url_template: Option<String>,
    pub tile_size: u32,
}

impl SourceDescriptor {
    pub fn annotations(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: SourceKind::Annotations,
            url_template: None,
            tile_size: 256,
        }
    }

    pub fn tile_url(&self, coord: TileCoord) -> Option<String> {
        let template = self.url_template.as_ref()?;
        Some(
            template
                .replace("{z}", &coord.z.to_string())
                .replace("{x}", &coord.x.to_string())
                .replace("{y}", &coord.y.to_string()),
        )
    }
}

/// Payload of a loaded tile
#[derive(Debug, Clone)]
pub enum TileData {
    Raster(Vec<u8>),
    Vector(Vec<u8>),
    Annotations(Vec<AnnotationFeature>),
}

impl TileData {
    pub fn len(&self) -> usize {
        match self {
            TileData::Raster(bytes) | TileData::Vector(bytes) => bytes.len(),
            TileData::Annotations(features) => features.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_url_templating() {
        let descriptor = SourceDescriptor {
            id: "osm".to_string(),
            kind: SourceKind::Raster,
            url_template: Some("https://tile.example.org/{z}/{x}/{y}.png".to_string()),
            tile_size: 256,
        };
        assert_eq!(
            descriptor.tile_url(TileCoord::new(3, 5, 4)).unwrap(),
            "https://tile.example.org/4/3/5.png"
        );
    }

    #[test]
    fn test_annotation_source_has_no_url() {
        let descriptor = SourceDescriptor::annotations("annotations");
        assert_eq!(descriptor.tile_url(TileCoord::new(0, 0, 0)), None);
    }

    #[test]
    fn test_descriptor_identity_includes_connection_info() {
        let a = SourceDescriptor {
            id: "osm".to_string(),
            kind: SourceKind::Raster,
            url_template: Some("https://a.example.org/{z}/{x}/{y}.png".to_string()),
            tile_size: 256,
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.url_template = Some("https://b.example.org/{z}/{x}/{y}.png".to_string());
        assert_ne!(a, b);
    }
}
