use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::document::{
    MapDocument, ObjectLayer, ObjectRecord, PropertyMap, PropertyValue, TileLayer, TilesetRef,
};
use super::error::MapLoadError;
use super::{read_text, tmx};

#[derive(Debug, Deserialize)]
struct RawMap {
    width: u32,
    height: u32,
    #[serde(rename = "tilewidth")]
    tile_width: u32,
    #[serde(rename = "tileheight")]
    tile_height: u32,
    #[serde(default)]
    layers: Vec<RawLayer>,
    #[serde(default)]
    tilesets: Vec<RawTilesetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawLayer {
    #[serde(rename = "tilelayer")]
    Tiles(RawTileLayer),
    #[serde(rename = "objectgroup")]
    Objects(RawObjectGroup),
    #[serde(rename = "group")]
    Group(RawGroup),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawTileLayer {
    #[serde(default)]
    name: String,
    width: u32,
    height: u32,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    data: Option<RawTileData>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    properties: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTileData {
    Gids(Vec<u32>),
    /// base64/zlib payloads are rejected, so only the shape is checked.
    Encoded(#[serde(deserialize_with = "discard_string")] ()),
}

fn discard_string<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|_| ())
}

/// Objects stay as raw JSON so one bad object cannot fail the whole map.
#[derive(Debug, Deserialize)]
struct RawObjectGroup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    objects: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(default)]
    layers: Vec<RawLayer>,
}

#[derive(Debug, Deserialize)]
struct RawTilesetEntry {
    #[serde(rename = "firstgid")]
    first_gid: u32,
    #[serde(default)]
    source: Option<String>,
    #[serde(flatten)]
    tileset: RawTileset,
}

#[derive(Debug, Default, Deserialize)]
struct RawTileset {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default, rename = "imagewidth")]
    image_width: Option<u32>,
    #[serde(default, rename = "tilewidth")]
    tile_width: Option<u32>,
    #[serde(default, rename = "tileheight")]
    tile_height: Option<u32>,
    #[serde(default)]
    columns: Option<u32>,
    #[serde(default, rename = "tilecount")]
    tile_count: Option<u32>,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    tiles: Vec<RawTile>,
}

#[derive(Debug, Deserialize)]
struct RawTile {
    id: u32,
    #[serde(default)]
    properties: Option<Value>,
}

fn default_visible() -> bool {
    true
}

/// Parses a Tiled JSON map (`.json` / `.tmj`). External tilesets are
/// resolved relative to `base_dir`.
pub fn parse_tiled_json(raw: &str, base_dir: &Path) -> Result<MapDocument, MapLoadError> {
    let raw_map: RawMap = deserialize_with_path(raw)?;

    let mut tile_layers = Vec::new();
    let mut object_layers = Vec::new();
    flatten_layers(raw_map.layers, &mut tile_layers, &mut object_layers)?;

    let mut tilesets = Vec::with_capacity(raw_map.tilesets.len());
    for entry in raw_map.tilesets {
        tilesets.push(resolve_tileset(
            entry,
            base_dir,
            raw_map.tile_width,
            raw_map.tile_height,
        )?);
    }

    MapDocument {
        width: raw_map.width,
        height: raw_map.height,
        tile_width: raw_map.tile_width,
        tile_height: raw_map.tile_height,
        tile_layers,
        object_layers,
        tilesets,
    }
    .validated()
}

fn deserialize_with_path<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, MapLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(MapLoadError::from_json_path)
}

fn flatten_layers(
    layers: Vec<RawLayer>,
    tile_layers: &mut Vec<TileLayer>,
    object_layers: &mut Vec<ObjectLayer>,
) -> Result<(), MapLoadError> {
    for layer in layers {
        match layer {
            RawLayer::Tiles(layer) => tile_layers.push(tile_layer_from_raw(layer)?),
            RawLayer::Objects(group) => object_layers.push(ObjectLayer {
                name: group.name,
                objects: group.objects.iter().map(object_from_json).collect(),
            }),
            RawLayer::Group(group) => flatten_layers(group.layers, tile_layers, object_layers)?,
            RawLayer::Other => {}
        }
    }
    Ok(())
}

fn tile_layer_from_raw(layer: RawTileLayer) -> Result<TileLayer, MapLoadError> {
    let gids = match layer.data {
        Some(RawTileData::Gids(gids)) => gids,
        Some(RawTileData::Encoded(())) => {
            return Err(MapLoadError::UnsupportedEncoding {
                layer: layer.name,
                encoding: layer.encoding.unwrap_or_else(|| "base64".to_string()),
            });
        }
        None => Vec::new(),
    };
    Ok(TileLayer {
        properties: properties_from_json(layer.properties.as_ref()),
        name: layer.name,
        width: layer.width,
        height: layer.height,
        visible: layer.visible,
        gids,
    })
}

fn resolve_tileset(
    entry: RawTilesetEntry,
    base_dir: &Path,
    map_tile_width: u32,
    map_tile_height: u32,
) -> Result<TilesetRef, MapLoadError> {
    let Some(source) = entry.source else {
        return Ok(tileset_from_raw(
            entry.first_gid,
            entry.tileset,
            base_dir,
            map_tile_width,
            map_tile_height,
        ));
    };

    let path = base_dir.join(&source);
    let tileset_dir = path.parent().unwrap_or(base_dir).to_path_buf();
    match extension_of(&path).as_deref() {
        Some("tsx") => tmx::parse_tsx(&read_text(&path)?, entry.first_gid, &tileset_dir),
        Some("tsj") | Some("json") => {
            let raw: RawTileset = deserialize_with_path(&read_text(&path)?)?;
            Ok(tileset_from_raw(
                entry.first_gid,
                raw,
                &tileset_dir,
                map_tile_width,
                map_tile_height,
            ))
        }
        _ => Err(MapLoadError::UnsupportedFormat { path }),
    }
}

fn tileset_from_raw(
    first_gid: u32,
    raw: RawTileset,
    base_dir: &Path,
    map_tile_width: u32,
    map_tile_height: u32,
) -> TilesetRef {
    let tile_width = raw.tile_width.unwrap_or(map_tile_width);
    let tile_height = raw.tile_height.unwrap_or(map_tile_height);
    let columns = raw.columns.unwrap_or(match raw.image_width {
        Some(image_width) if tile_width > 0 => image_width / tile_width,
        _ => 0,
    });
    let colliding_tiles = raw
        .tiles
        .iter()
        .filter(|tile| {
            properties_from_json(tile.properties.as_ref())
                .get("collides")
                .and_then(PropertyValue::as_bool)
                .unwrap_or(false)
        })
        .map(|tile| tile.id)
        .collect::<BTreeSet<_>>();

    TilesetRef {
        first_gid,
        name: raw.name.unwrap_or_default(),
        image: raw.image.map(|image| base_dir.join(image)),
        tile_width,
        tile_height,
        columns,
        tile_count: raw.tile_count.unwrap_or(0),
        margin: raw.margin,
        spacing: raw.spacing,
        colliding_tiles,
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn object_from_json(value: &Value) -> ObjectRecord {
    ObjectRecord {
        id: value
            .get("id")
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok()),
        name: value.get("name").and_then(Value::as_str).map(str::to_string),
        x: number_field(value, "x"),
        y: number_field(value, "y"),
        width: number_field(value, "width").unwrap_or(0.0),
        height: number_field(value, "height").unwrap_or(0.0),
        properties: properties_from_json(value.get("properties")),
    }
}

fn number_field(value: &Value, key: &str) -> Option<f32> {
    value.get(key).and_then(Value::as_f64).map(|n| n as f32)
}

/// Accepts the current `[{name, type, value}]` list and the legacy flat
/// object form. Entries that cannot be read are dropped.
fn properties_from_json(value: Option<&Value>) -> PropertyMap {
    match value {
        Some(Value::Array(entries)) => entries.iter().filter_map(property_entry).collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(name, value)| scalar_property(None, value).map(|v| (name.clone(), v)))
            .collect(),
        _ => PropertyMap::new(),
    }
}

fn property_entry(entry: &Value) -> Option<(String, PropertyValue)> {
    let name = entry.get("name")?.as_str()?;
    let kind = entry.get("type").and_then(Value::as_str);
    let value = scalar_property(kind, entry.get("value")?)?;
    Some((name.to_string(), value))
}

fn scalar_property(kind: Option<&str>, value: &Value) -> Option<PropertyValue> {
    match (kind, value) {
        (Some("int"), Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(PropertyValue::Int),
        (Some("float"), Value::Number(n)) => n.as_f64().map(PropertyValue::Float),
        (Some("bool"), Value::Bool(b)) => Some(PropertyValue::Bool(*b)),
        (Some("int" | "float" | "bool"), _) => None,
        (_, Value::String(s)) => Some(PropertyValue::String(s.clone())),
        (_, Value::Bool(b)) => Some(PropertyValue::Bool(*b)),
        (_, Value::Number(n)) => n
            .as_i64()
            .map(PropertyValue::Int)
            .or_else(|| n.as_f64().map(PropertyValue::Float)),
        _ => None,
    }
}
