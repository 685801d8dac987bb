use tracing::debug;

use crate::app::{Rect, Vec2, Viewport, ViewportFit};

use super::document::{MapDocument, ObjectDescriptor, ObjectLayer, TileLayer, TilesetRef};

pub const NPC_LAYER_NAME: &str = "NPCs";
pub const NPC_TYPE_PROPERTY: &str = "type";
pub const NPC_TYPE_VALUE: &str = "NPC";
pub const PLAYER_SPAWN_OBJECT_NAME: &str = "PlayerSpawn";
/// Default spawn sits this far above the bottom edge, inside the door.
const DEFAULT_SPAWN_BOTTOM_INSET_PX: f32 = 192.0;

/// A loaded map plus the fit that places it on screen. Read-only after
/// construction; the fit never changes for the lifetime of the map.
#[derive(Debug, Clone)]
pub struct WorldMap {
    document: MapDocument,
    fit: ViewportFit,
    collision_rects: Vec<Rect>,
}

impl WorldMap {
    pub fn new(document: MapDocument, viewport: Viewport) -> Self {
        let fit = ViewportFit::compute(viewport, document.pixel_width(), document.pixel_height());
        let collision_rects = build_collision_rects(&document, fit);
        debug!(
            width_px = document.pixel_width(),
            height_px = document.pixel_height(),
            scale = fit.scale_factor,
            offset_x = fit.offset_x,
            offset_y = fit.offset_y,
            colliders = collision_rects.len(),
            "world_map_fitted"
        );
        Self {
            document,
            fit,
            collision_rects,
        }
    }

    pub fn fit(&self) -> ViewportFit {
        self.fit
    }

    pub fn pixel_width(&self) -> f32 {
        self.document.pixel_width()
    }

    pub fn pixel_height(&self) -> f32 {
        self.document.pixel_height()
    }

    pub fn document(&self) -> &MapDocument {
        &self.document
    }

    pub fn tile_layers(&self) -> &[TileLayer] {
        &self.document.tile_layers
    }

    pub fn object_layer(&self, name: &str) -> Option<&ObjectLayer> {
        self.document.object_layer(name)
    }

    pub fn tileset_for_gid(&self, gid: u32) -> Option<(&TilesetRef, u32)> {
        self.document.tileset_for_gid(gid)
    }

    /// NPC objects that are tagged as NPCs and well formed. Anything else in
    /// the layer is skipped.
    pub fn npc_descriptors(&self) -> Vec<ObjectDescriptor> {
        let Some(layer) = self.object_layer(NPC_LAYER_NAME) else {
            debug!(layer = NPC_LAYER_NAME, "npc_layer_missing");
            return Vec::new();
        };

        layer
            .objects
            .iter()
            .filter(|object| {
                object
                    .properties
                    .get(NPC_TYPE_PROPERTY)
                    .and_then(|value| value.as_str())
                    == Some(NPC_TYPE_VALUE)
            })
            .filter_map(|object| {
                let descriptor = object.descriptor();
                if descriptor.is_none() {
                    debug!(
                        object_id = ?object.id,
                        name = ?object.name,
                        has_x = object.x.is_some(),
                        has_y = object.y.is_some(),
                        "npc_spawn_skipped"
                    );
                }
                descriptor
            })
            .collect()
    }

    /// Tiled anchors objects at their bottom edge; lift by the object height
    /// so the sprite sits on the authored point.
    pub fn spawn_position(&self, descriptor: &ObjectDescriptor) -> Vec2 {
        self.fit
            .map_to_world(Vec2::new(descriptor.x, descriptor.y - descriptor.height))
    }

    /// The `PlayerSpawn` object if the map has one, else bottom-center.
    pub fn player_spawn(&self) -> Vec2 {
        let authored = self
            .document
            .object_layers
            .iter()
            .flat_map(|layer| layer.objects.iter())
            .filter(|object| object.name.as_deref() == Some(PLAYER_SPAWN_OBJECT_NAME))
            .find_map(|object| object.descriptor());
        if let Some(descriptor) = authored {
            return self.spawn_position(&descriptor);
        }

        let map_px = Vec2::new(
            self.pixel_width() / 2.0,
            (self.pixel_height() - DEFAULT_SPAWN_BOTTOM_INSET_PX).max(0.0),
        );
        self.fit.map_to_world(map_px)
    }

    /// World-space rectangles of every colliding tile.
    pub fn collision_rects(&self) -> &[Rect] {
        &self.collision_rects
    }

    /// World-space rectangle covering the tile cell at `(col, row)`.
    pub fn cell_rect(&self, col: u32, row: u32) -> Rect {
        cell_rect(&self.document, self.fit, col, row)
    }
}

fn cell_rect(document: &MapDocument, fit: ViewportFit, col: u32, row: u32) -> Rect {
    let tile_w = document.tile_width as f32;
    let tile_h = document.tile_height as f32;
    let origin = fit.map_to_world(Vec2::new(col as f32 * tile_w, row as f32 * tile_h));
    Rect {
        x: origin.x,
        y: origin.y,
        width: tile_w * fit.scale_factor,
        height: tile_h * fit.scale_factor,
    }
}

fn build_collision_rects(document: &MapDocument, fit: ViewportFit) -> Vec<Rect> {
    let mut rects = Vec::new();
    for layer in &document.tile_layers {
        for row in 0..layer.height {
            for col in 0..layer.width {
                let gid = layer.gid_at(col, row);
                if document.tile_collides(layer, gid) {
                    rects.push(cell_rect(document, fit, col, row));
                }
            }
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::map::{ObjectRecord, PropertyMap, PropertyValue};

    fn npc(name: Option<&str>, x: Option<f32>, y: Option<f32>, tagged: bool) -> ObjectRecord {
        let mut properties = PropertyMap::new();
        if tagged {
            properties.insert(
                NPC_TYPE_PROPERTY.to_string(),
                PropertyValue::String(NPC_TYPE_VALUE.to_string()),
            );
        }
        ObjectRecord {
            id: None,
            name: name.map(str::to_string),
            x,
            y,
            width: 32.0,
            height: 48.0,
            properties,
        }
    }

    fn document(objects: Vec<ObjectRecord>) -> MapDocument {
        MapDocument {
            width: 25,
            height: 20,
            tile_width: 32,
            tile_height: 32,
            tile_layers: Vec::new(),
            object_layers: vec![ObjectLayer {
                name: NPC_LAYER_NAME.to_string(),
                objects,
            }],
            tilesets: Vec::new(),
        }
    }

    fn viewport(width: u32, height: u32) -> Viewport {
        Viewport { width, height }
    }

    #[test]
    fn fit_is_computed_once_from_the_viewport() {
        let map = WorldMap::new(document(Vec::new()), viewport(1600, 640));
        let fit = map.fit();
        assert_eq!(fit.scale_factor, 1.0);
        assert_eq!(fit.offset_x, 400.0);
        assert_eq!(fit.offset_y, 0.0);
    }

    #[test]
    fn npc_filter_keeps_only_tagged_well_formed_objects() {
        let map = WorldMap::new(
            document(vec![
                npc(Some("Monk"), Some(100.0), Some(200.0), true),
                npc(Some("Sign"), Some(10.0), Some(10.0), false),
                npc(None, Some(10.0), Some(10.0), true),
                npc(Some("Ghost"), None, Some(10.0), true),
            ]),
            viewport(800, 640),
        );

        let names: Vec<String> = map
            .npc_descriptors()
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect();
        assert_eq!(names, vec!["Monk".to_string()]);
    }

    #[test]
    fn spawn_position_lifts_by_height_and_applies_fit() {
        let map = WorldMap::new(document(Vec::new()), viewport(1600, 1280));
        let descriptor = npc(Some("Monk"), Some(100.0), Some(200.0), true)
            .descriptor()
            .expect("descriptor");

        // scale 2, offset (0, 0)
        assert_eq!(map.spawn_position(&descriptor), Vec2::new(200.0, 304.0));
    }

    #[test]
    fn player_spawn_prefers_authored_object() {
        let default_map = WorldMap::new(document(Vec::new()), viewport(800, 640));
        assert_eq!(default_map.player_spawn(), Vec2::new(400.0, 448.0));

        let mut spawn = npc(Some(PLAYER_SPAWN_OBJECT_NAME), Some(64.0), Some(96.0), false);
        spawn.height = 0.0;
        let authored_map = WorldMap::new(document(vec![spawn]), viewport(800, 640));
        assert_eq!(authored_map.player_spawn(), Vec2::new(64.0, 96.0));
    }

    #[test]
    fn colliding_cells_become_world_rects() {
        let mut doc = document(Vec::new());
        doc.width = 2;
        doc.height = 1;
        doc.tile_layers.push(TileLayer {
            name: "walls".to_string(),
            width: 2,
            height: 1,
            visible: true,
            gids: vec![0, 2],
            properties: PropertyMap::new(),
        });
        doc.tilesets.push(TilesetRef {
            first_gid: 1,
            name: "walls".to_string(),
            image: None,
            tile_width: 32,
            tile_height: 32,
            columns: 2,
            tile_count: 4,
            margin: 0,
            spacing: 0,
            colliding_tiles: BTreeSet::from([1]),
        });

        let map = WorldMap::new(doc, viewport(128, 32));
        // scale 1, offset_x 32
        assert_eq!(
            map.collision_rects(),
            &[Rect {
                x: 64.0,
                y: 0.0,
                width: 32.0,
                height: 32.0
            }]
        );
    }
}
