use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use super::error::MapLoadError;

/// Tiled stores flip/rotation flags in the top bits of every GID.
const GID_FLAG_MASK: u32 = 0x0FFF_FFFF;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            PropertyValue::String(value) => match value.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(value) => Some(*value as f64),
            PropertyValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Parses a raw value according to a Tiled property `type` attribute.
    /// Unknown types (`color`, `file`, `object`, ...) keep the raw text.
    pub(crate) fn from_typed_text(kind: Option<&str>, raw: &str) -> Option<Self> {
        match kind.unwrap_or("string") {
            "bool" => match raw {
                "true" => Some(PropertyValue::Bool(true)),
                "false" => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            "int" => raw.trim().parse().ok().map(PropertyValue::Int),
            "float" => raw.trim().parse().ok().map(PropertyValue::Float),
            _ => Some(PropertyValue::String(raw.to_string())),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(value) => f.write_str(value),
            PropertyValue::Int(value) => write!(f, "{value}"),
            PropertyValue::Float(value) => write!(f, "{value}"),
            PropertyValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

fn property_is_true(properties: &PropertyMap, key: &str) -> bool {
    properties
        .get(key)
        .and_then(PropertyValue::as_bool)
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
    pub gids: Vec<u32>,
    pub properties: PropertyMap,
}

impl TileLayer {
    /// GID at a cell with flip flags masked off; 0 means empty.
    pub fn gid_at(&self, col: u32, row: u32) -> u32 {
        if col >= self.width || row >= self.height {
            return 0;
        }
        let index = row as usize * self.width as usize + col as usize;
        self.gids
            .get(index)
            .map(|gid| gid & GID_FLAG_MASK)
            .unwrap_or(0)
    }

    pub fn collides(&self) -> bool {
        property_is_true(&self.properties, "collides")
    }
}

/// One map object as authored. Position fields stay optional so malformed
/// objects survive parsing and are filtered later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectRecord {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: f32,
    pub height: f32,
    pub properties: PropertyMap,
}

impl ObjectRecord {
    /// `None` when the object has no usable name or position.
    pub fn descriptor(&self) -> Option<ObjectDescriptor> {
        let name = self.name.as_deref().filter(|name| !name.is_empty())?;
        let x = self.x.filter(|x| x.is_finite())?;
        let y = self.y.filter(|y| y.is_finite())?;
        Some(ObjectDescriptor {
            name: name.to_string(),
            x,
            y,
            width: self.width,
            height: self.height,
            properties: self.properties.clone(),
        })
    }
}

/// A well-formed object: named, positioned. Only used at spawn time.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub properties: PropertyMap,
}

impl ObjectDescriptor {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(PropertyValue::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectLayer {
    pub name: String,
    pub objects: Vec<ObjectRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRef {
    pub first_gid: u32,
    pub name: String,
    pub image: Option<PathBuf>,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub tile_count: u32,
    pub margin: u32,
    pub spacing: u32,
    /// Local tile ids whose tile properties set `collides = true`.
    pub colliding_tiles: BTreeSet<u32>,
}

impl TilesetRef {
    pub fn contains_local(&self, local_id: u32) -> bool {
        local_id < self.tile_count
    }

    /// Pixel rectangle `(x, y, w, h)` of a local tile inside the atlas image.
    pub fn source_rect(&self, local_id: u32) -> Option<(u32, u32, u32, u32)> {
        if self.columns == 0 || !self.contains_local(local_id) {
            return None;
        }
        let col = local_id % self.columns;
        let row = local_id / self.columns;
        Some((
            self.margin + col * (self.tile_width + self.spacing),
            self.margin + row * (self.tile_height + self.spacing),
            self.tile_width,
            self.tile_height,
        ))
    }
}

/// Format-independent result of parsing a Tiled map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_layers: Vec<TileLayer>,
    pub object_layers: Vec<ObjectLayer>,
    pub tilesets: Vec<TilesetRef>,
}

impl MapDocument {
    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * self.tile_width as f32
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * self.tile_height as f32
    }

    pub fn object_layer(&self, name: &str) -> Option<&ObjectLayer> {
        self.object_layers.iter().find(|layer| layer.name == name)
    }

    /// Tileset owning `gid` plus the tile's local id inside it.
    pub fn tileset_for_gid(&self, gid: u32) -> Option<(&TilesetRef, u32)> {
        let gid = gid & GID_FLAG_MASK;
        if gid == 0 {
            return None;
        }
        self.tilesets
            .iter()
            .filter(|tileset| tileset.first_gid <= gid)
            .max_by_key(|tileset| tileset.first_gid)
            .map(|tileset| (tileset, gid - tileset.first_gid))
            .filter(|(tileset, local)| tileset.contains_local(*local))
    }

    pub fn tile_collides(&self, layer: &TileLayer, gid: u32) -> bool {
        if gid & GID_FLAG_MASK == 0 {
            return false;
        }
        layer.collides()
            || self
                .tileset_for_gid(gid)
                .is_some_and(|(tileset, local)| tileset.colliding_tiles.contains(&local))
    }

    /// Shape checks shared by every input format.
    pub(crate) fn validated(mut self) -> Result<Self, MapLoadError> {
        if self.width == 0 || self.height == 0 || self.tile_width == 0 || self.tile_height == 0 {
            return Err(MapLoadError::EmptyMap {
                width: self.width,
                height: self.height,
                tile_width: self.tile_width,
                tile_height: self.tile_height,
            });
        }
        for layer in &self.tile_layers {
            let expected = layer.width as usize * layer.height as usize;
            if layer.gids.len() != expected {
                return Err(MapLoadError::LayerSizeMismatch {
                    layer: layer.name.clone(),
                    expected,
                    actual: layer.gids.len(),
                });
            }
        }
        self.tilesets.sort_by_key(|tileset| tileset.first_gid);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tileset(first_gid: u32, tile_count: u32) -> TilesetRef {
        TilesetRef {
            first_gid,
            name: format!("set{first_gid}"),
            image: None,
            tile_width: 16,
            tile_height: 16,
            columns: 4,
            tile_count,
            margin: 0,
            spacing: 0,
            colliding_tiles: BTreeSet::from([2]),
        }
    }

    fn document() -> MapDocument {
        MapDocument {
            width: 2,
            height: 1,
            tile_width: 16,
            tile_height: 16,
            tile_layers: vec![TileLayer {
                name: "ground".to_string(),
                width: 2,
                height: 1,
                visible: true,
                gids: vec![1, 3 | 0x8000_0000],
                properties: PropertyMap::new(),
            }],
            object_layers: Vec::new(),
            tilesets: vec![tileset(9, 8), tileset(1, 8)],
        }
    }

    #[test]
    fn gid_lookup_masks_flip_flags_and_picks_owning_tileset() {
        let doc = document().validated().expect("valid");
        assert_eq!(doc.tile_layers[0].gid_at(1, 0), 3);
        let (set, local) = doc.tileset_for_gid(10).expect("second set");
        assert_eq!((set.first_gid, local), (9, 1));
        assert!(doc.tileset_for_gid(0).is_none());
        assert!(doc.tileset_for_gid(99).is_none());
    }

    #[test]
    fn tile_collision_comes_from_tile_or_layer_properties() {
        let mut doc = document().validated().expect("valid");
        let layer = doc.tile_layers[0].clone();
        assert!(!doc.tile_collides(&layer, 1));
        assert!(doc.tile_collides(&layer, 3 | 0x8000_0000));

        doc.tile_layers[0]
            .properties
            .insert("collides".to_string(), PropertyValue::Bool(true));
        let layer = doc.tile_layers[0].clone();
        assert!(doc.tile_collides(&layer, 1));
        assert!(!doc.tile_collides(&layer, 0));
    }

    #[test]
    fn validation_rejects_empty_maps_and_short_layers() {
        let mut empty = document();
        empty.width = 0;
        assert!(matches!(
            empty.validated(),
            Err(MapLoadError::EmptyMap { width: 0, .. })
        ));

        let mut short = document();
        short.tile_layers[0].gids.pop();
        assert!(matches!(
            short.validated(),
            Err(MapLoadError::LayerSizeMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn source_rect_accounts_for_margin_and_spacing() {
        let mut set = tileset(1, 8);
        set.margin = 1;
        set.spacing = 2;
        assert_eq!(set.source_rect(5), Some((19, 19, 16, 16)));
        assert_eq!(set.source_rect(8), None);
    }

    #[test]
    fn descriptor_requires_name_and_numeric_position() {
        let record = ObjectRecord {
            name: Some("Monk".to_string()),
            x: Some(10.0),
            y: Some(20.0),
            ..ObjectRecord::default()
        };
        assert_eq!(record.descriptor().map(|d| d.name), Some("Monk".to_string()));

        let unnamed = ObjectRecord {
            name: Some(String::new()),
            ..record.clone()
        };
        assert!(unnamed.descriptor().is_none());

        let no_y = ObjectRecord { y: None, ..record };
        assert!(no_y.descriptor().is_none());
    }

    #[test]
    fn typed_text_parsing_follows_declared_type() {
        assert_eq!(
            PropertyValue::from_typed_text(Some("int"), "42"),
            Some(PropertyValue::Int(42))
        );
        assert_eq!(PropertyValue::from_typed_text(Some("bool"), "maybe"), None);
        assert_eq!(
            PropertyValue::from_typed_text(Some("color"), "#ff00ff"),
            Some(PropertyValue::String("#ff00ff".to_string()))
        );
        assert_eq!(PropertyValue::Int(3).as_f64(), Some(3.0));
    }
}
