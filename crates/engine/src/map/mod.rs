mod document;
mod error;
mod tiled;
mod tmx;
mod world_map;

use std::fs;
use std::path::Path;

pub use document::{
    MapDocument, ObjectDescriptor, ObjectLayer, ObjectRecord, PropertyMap, PropertyValue,
    TileLayer, TilesetRef,
};
pub use error::{MapLoadError, SourceLocation};
pub use tiled::parse_tiled_json;
pub use tmx::parse_tmx;
pub use world_map::{
    WorldMap, NPC_LAYER_NAME, NPC_TYPE_PROPERTY, NPC_TYPE_VALUE, PLAYER_SPAWN_OBJECT_NAME,
};

/// Loads a Tiled map, picking the parser from the file extension.
pub fn load_map_file(path: &Path) -> Result<MapDocument, MapLoadError> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    match tiled::extension_of(path).as_deref() {
        Some("json") | Some("tmj") => parse_tiled_json(&read_text(path)?, base_dir),
        Some("tmx") => parse_tmx(&read_text(path)?, base_dir),
        _ => Err(MapLoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String, MapLoadError> {
    fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JSON_MAP: &str = r#"{
        "width": 1, "height": 1, "tilewidth": 32, "tileheight": 32,
        "layers": [
            { "type": "tilelayer", "name": "ground", "width": 1, "height": 1, "data": [0] },
            { "type": "objectgroup", "name": "NPCs", "objects": [
                { "id": 7, "name": "Monk", "x": 4, "y": 50, "height": 48,
                  "properties": [
                    { "name": "type", "type": "string", "value": "NPC" },
                    { "name": "interactionType", "type": "string", "value": "quest" }
                  ] }
            ] }
        ],
        "tilesets": []
    }"#;

    const TMX_MAP: &str = r#"<map width="1" height="1" tilewidth="32" tileheight="32">
 <layer name="ground" width="1" height="1"><data encoding="csv">0</data></layer>
 <objectgroup name="NPCs">
  <object id="7" name="Monk" x="4" y="50" height="48">
   <properties>
    <property name="type" value="NPC"/>
    <property name="interactionType" value="quest"/>
   </properties>
  </object>
 </objectgroup>
</map>"#;

    #[test]
    fn json_and_tmx_maps_yield_the_same_npc_descriptors() {
        let temp = TempDir::new().expect("temp dir");
        let json_path = temp.path().join("map.json");
        let tmx_path = temp.path().join("map.tmx");
        fs::write(&json_path, JSON_MAP).expect("write json");
        fs::write(&tmx_path, TMX_MAP).expect("write tmx");

        let from_json = load_map_file(&json_path).expect("json map");
        let from_tmx = load_map_file(&tmx_path).expect("tmx map");
        assert_eq!(from_json, from_tmx);

        let viewport = crate::app::Viewport {
            width: 64,
            height: 32,
        };
        let json_npcs = WorldMap::new(from_json, viewport).npc_descriptors();
        let tmx_npcs = WorldMap::new(from_tmx, viewport).npc_descriptors();
        assert_eq!(json_npcs, tmx_npcs);
        assert_eq!(json_npcs.len(), 1);
        assert_eq!(
            json_npcs[0].string_property("interactionType"),
            Some("quest")
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let error = load_map_file(Path::new("level1/map.yaml")).expect_err("must fail");
        assert!(matches!(error, MapLoadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let temp = TempDir::new().expect("temp dir");
        let error = load_map_file(&temp.path().join("absent.tmj")).expect_err("must fail");
        assert!(matches!(error, MapLoadError::Read { .. }));
    }
}
