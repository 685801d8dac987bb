use std::collections::BTreeSet;
use std::path::Path;

use roxmltree::{Document, Node};

use super::document::{
    MapDocument, ObjectLayer, ObjectRecord, PropertyMap, PropertyValue, TileLayer, TilesetRef,
};
use super::error::MapLoadError;
use super::read_text;

/// Parses a Tiled XML map (`.tmx`). External `.tsx` tilesets are resolved
/// relative to `base_dir`.
pub fn parse_tmx(raw: &str, base_dir: &Path) -> Result<MapDocument, MapLoadError> {
    let doc = parse_document(raw)?;
    let root = doc.root_element();
    if !root.has_tag_name("map") {
        return Err(error_at_node(&doc, root, "root element must be <map>"));
    }

    let tile_width = required_u32(&doc, root, "tilewidth")?;
    let tile_height = required_u32(&doc, root, "tileheight")?;

    let mut tilesets = Vec::new();
    for node in root.children().filter(|node| node.has_tag_name("tileset")) {
        tilesets.push(tileset_element(&doc, node, base_dir, tile_width, tile_height)?);
    }

    let mut tile_layers = Vec::new();
    let mut object_layers = Vec::new();
    collect_layers(&doc, root, &mut tile_layers, &mut object_layers)?;

    MapDocument {
        width: required_u32(&doc, root, "width")?,
        height: required_u32(&doc, root, "height")?,
        tile_width,
        tile_height,
        tile_layers,
        object_layers,
        tilesets,
    }
    .validated()
}

/// Parses an external `.tsx` tileset referenced from a map.
pub(crate) fn parse_tsx(
    raw: &str,
    first_gid: u32,
    base_dir: &Path,
) -> Result<TilesetRef, MapLoadError> {
    let doc = parse_document(raw)?;
    let root = doc.root_element();
    if !root.has_tag_name("tileset") {
        return Err(error_at_node(&doc, root, "root element must be <tileset>"));
    }
    Ok(tileset_from_node(root, first_gid, base_dir, 0, 0))
}

fn parse_document(raw: &str) -> Result<Document<'_>, MapLoadError> {
    Document::parse(raw).map_err(|error| {
        let pos = error.pos();
        MapLoadError::xml_at(error.to_string(), pos.row, pos.col)
    })
}

fn collect_layers(
    doc: &Document<'_>,
    parent: Node<'_, '_>,
    tile_layers: &mut Vec<TileLayer>,
    object_layers: &mut Vec<ObjectLayer>,
) -> Result<(), MapLoadError> {
    for node in parent.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "layer" => tile_layers.push(tile_layer_element(doc, node)?),
            "objectgroup" => object_layers.push(ObjectLayer {
                name: node.attribute("name").unwrap_or_default().to_string(),
                objects: node
                    .children()
                    .filter(|child| child.has_tag_name("object"))
                    .map(object_element)
                    .collect(),
            }),
            "group" => collect_layers(doc, node, tile_layers, object_layers)?,
            _ => {}
        }
    }
    Ok(())
}

fn tile_layer_element(doc: &Document<'_>, node: Node<'_, '_>) -> Result<TileLayer, MapLoadError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let gids = match node.children().find(|child| child.has_tag_name("data")) {
        Some(data) => layer_data(doc, &name, data)?,
        None => Vec::new(),
    };
    Ok(TileLayer {
        width: required_u32(doc, node, "width")?,
        height: required_u32(doc, node, "height")?,
        visible: node.attribute("visible") != Some("0"),
        gids,
        properties: properties_of(node),
        name,
    })
}

fn layer_data(
    doc: &Document<'_>,
    layer_name: &str,
    data: Node<'_, '_>,
) -> Result<Vec<u32>, MapLoadError> {
    match data.attribute("encoding") {
        Some("csv") => data
            .text()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(|cell| {
                cell.parse::<u32>().map_err(|_| {
                    error_at_node(doc, data, format!("invalid gid '{cell}' in csv layer data"))
                })
            })
            .collect(),
        None => Ok(data
            .children()
            .filter(|child| child.has_tag_name("tile"))
            .map(|tile| {
                tile.attribute("gid")
                    .and_then(|gid| gid.parse().ok())
                    .unwrap_or(0)
            })
            .collect()),
        Some(other) => Err(MapLoadError::UnsupportedEncoding {
            layer: layer_name.to_string(),
            encoding: other.to_string(),
        }),
    }
}

fn object_element(node: Node<'_, '_>) -> ObjectRecord {
    let number = |key: &str| node.attribute(key).and_then(|raw| raw.trim().parse::<f32>().ok());
    ObjectRecord {
        id: node.attribute("id").and_then(|raw| raw.parse().ok()),
        name: node.attribute("name").map(str::to_string),
        x: number("x"),
        y: number("y"),
        width: number("width").unwrap_or(0.0),
        height: number("height").unwrap_or(0.0),
        properties: properties_of(node),
    }
}

fn tileset_element(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    base_dir: &Path,
    map_tile_width: u32,
    map_tile_height: u32,
) -> Result<TilesetRef, MapLoadError> {
    let first_gid = required_u32(doc, node, "firstgid")?;
    match node.attribute("source") {
        Some(source) => {
            let path = base_dir.join(source);
            let tileset_dir = path.parent().unwrap_or(base_dir).to_path_buf();
            parse_tsx(&read_text(&path)?, first_gid, &tileset_dir)
        }
        None => Ok(tileset_from_node(
            node,
            first_gid,
            base_dir,
            map_tile_width,
            map_tile_height,
        )),
    }
}

fn tileset_from_node(
    node: Node<'_, '_>,
    first_gid: u32,
    base_dir: &Path,
    default_tile_width: u32,
    default_tile_height: u32,
) -> TilesetRef {
    let tile_width = u32_attribute(node, "tilewidth").unwrap_or(default_tile_width);
    let tile_height = u32_attribute(node, "tileheight").unwrap_or(default_tile_height);
    let image = node.children().find(|child| child.has_tag_name("image"));
    let columns = u32_attribute(node, "columns").unwrap_or_else(|| {
        image
            .and_then(|image| u32_attribute(image, "width"))
            .filter(|_| tile_width > 0)
            .map(|image_width| image_width / tile_width)
            .unwrap_or(0)
    });

    let colliding_tiles = node
        .children()
        .filter(|child| child.has_tag_name("tile"))
        .filter(|tile| {
            properties_of(*tile)
                .get("collides")
                .and_then(PropertyValue::as_bool)
                .unwrap_or(false)
        })
        .filter_map(|tile| u32_attribute(tile, "id"))
        .collect::<BTreeSet<_>>();

    TilesetRef {
        first_gid,
        name: node.attribute("name").unwrap_or_default().to_string(),
        image: image
            .and_then(|image| image.attribute("source"))
            .map(|source| base_dir.join(source)),
        tile_width,
        tile_height,
        columns,
        tile_count: u32_attribute(node, "tilecount").unwrap_or(0),
        margin: u32_attribute(node, "margin").unwrap_or(0),
        spacing: u32_attribute(node, "spacing").unwrap_or(0),
        colliding_tiles,
    }
}

/// Reads `<properties>` under `node`. Multi-line string values live in the
/// element text instead of the `value` attribute.
fn properties_of(node: Node<'_, '_>) -> PropertyMap {
    let Some(properties) = node.children().find(|child| child.has_tag_name("properties")) else {
        return PropertyMap::new();
    };
    properties
        .children()
        .filter(|child| child.has_tag_name("property"))
        .filter_map(|property| {
            let name = property.attribute("name")?;
            let raw = property.attribute("value").or_else(|| property.text())?;
            let value = PropertyValue::from_typed_text(property.attribute("type"), raw)?;
            Some((name.to_string(), value))
        })
        .collect()
}

fn u32_attribute(node: Node<'_, '_>, key: &str) -> Option<u32> {
    node.attribute(key).and_then(|raw| raw.trim().parse().ok())
}

fn required_u32(doc: &Document<'_>, node: Node<'_, '_>, key: &str) -> Result<u32, MapLoadError> {
    let raw = node.attribute(key).ok_or_else(|| {
        error_at_node(
            doc,
            node,
            format!("<{}> is missing attribute '{key}'", node.tag_name().name()),
        )
    })?;
    raw.trim().parse().map_err(|_| {
        error_at_node(
            doc,
            node,
            format!(
                "<{}> attribute '{key}' must be a non-negative integer, got '{raw}'",
                node.tag_name().name()
            ),
        )
    })
}

fn error_at_node(doc: &Document<'_>, node: Node<'_, '_>, message: impl Into<String>) -> MapLoadError {
    let pos = doc.text_pos_at(node.range().start);
    MapLoadError::xml_at(message, pos.row, pos.col)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const NPC_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="2" height="2" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="terrain" tilewidth="32" tileheight="32" tilecount="4" columns="2">
  <image source="terrain.png" width="64" height="64"/>
  <tile id="1">
   <properties><property name="collides" type="bool" value="true"/></properties>
  </tile>
 </tileset>
 <layer id="1" name="ground" width="2" height="2">
  <data encoding="csv">
1,1,
2,0
</data>
 </layer>
 <group name="actors">
  <objectgroup id="2" name="NPCs">
   <object id="1" name="Monk" x="10" y="40.5" height="48">
    <properties>
     <property name="type" value="NPC"/>
     <property name="speed" type="int" value="3"/>
     <property name="dialogue">Seek the middle,
then halve again.</property>
    </properties>
   </object>
   <object id="2" name="Broken" x="left" y="4"/>
  </objectgroup>
 </group>
</map>
"#;

    #[test]
    fn parses_csv_layers_grouped_objects_and_inline_tileset() {
        let doc = parse_tmx(NPC_MAP, Path::new("maps")).expect("parse");

        assert_eq!(doc.tile_layers[0].gids, vec![1, 1, 2, 0]);
        let npcs = doc.object_layer("NPCs").expect("npc layer");
        let monk = npcs.objects[0].descriptor().expect("monk");
        assert_eq!((monk.x, monk.y, monk.height), (10.0, 40.5, 48.0));
        assert_eq!(monk.string_property("type"), Some("NPC"));
        assert_eq!(monk.property("speed"), Some(&PropertyValue::Int(3)));
        assert_eq!(
            monk.string_property("dialogue"),
            Some("Seek the middle,\nthen halve again.")
        );
        assert!(npcs.objects[1].descriptor().is_none());

        let tileset = &doc.tilesets[0];
        assert_eq!(tileset.image, Some(Path::new("maps").join("terrain.png")));
        assert!(tileset.colliding_tiles.contains(&1));
    }

    #[test]
    fn xml_tile_elements_are_accepted_as_layer_data() {
        let raw = r#"<map width="2" height="1" tilewidth="8" tileheight="8">
 <layer name="floor" width="2" height="1"><data><tile gid="3"/><tile/></data></layer>
</map>"#;
        let doc = parse_tmx(raw, Path::new(".")).expect("parse");
        assert_eq!(doc.tile_layers[0].gids, vec![3, 0]);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let error = parse_tmx("<map>\n  <layer></map>", Path::new(".")).expect_err("must fail");
        match error {
            MapLoadError::Xml { location, .. } => assert_eq!(location.line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_map_dimension_is_an_error_at_the_map_element() {
        let error = parse_tmx(r#"<map tilewidth="8" tileheight="8"/>"#, Path::new("."))
            .expect_err("must fail");
        assert!(error.to_string().contains("missing attribute 'width'"));
    }

    #[test]
    fn short_csv_layer_is_rejected() {
        let raw = r#"<map width="2" height="2" tilewidth="8" tileheight="8">
 <layer name="floor" width="2" height="2"><data encoding="csv">1,2,3</data></layer>
</map>"#;
        let error = parse_tmx(raw, Path::new(".")).expect_err("must fail");
        assert!(matches!(
            error,
            MapLoadError::LayerSizeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn external_tsx_is_loaded_relative_to_the_map() {
        let temp = TempDir::new().expect("temp dir");
        fs::write(
            temp.path().join("walls.tsx"),
            r#"<tileset name="walls" tilewidth="16" tileheight="16" tilecount="4">
 <image source="img/walls.png" width="32" height="32"/>
 <tile id="3"><properties><property name="collides" type="bool" value="true"/></properties></tile>
</tileset>"#,
        )
        .expect("write tsx");
        let raw = r#"<map width="1" height="1" tilewidth="16" tileheight="16">
 <tileset firstgid="5" source="walls.tsx"/>
 <layer name="walls" width="1" height="1"><data encoding="csv">8</data></layer>
</map>"#;

        let doc = parse_tmx(raw, temp.path()).expect("parse");
        let tileset = &doc.tilesets[0];
        assert_eq!(tileset.first_gid, 5);
        assert_eq!(tileset.columns, 2);
        assert_eq!(tileset.image, Some(temp.path().join("img/walls.png")));
        let layer = doc.tile_layers[0].clone();
        assert!(doc.tile_collides(&layer, 8));
    }
}
