use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use engine::{
    EntityId, Facing, Footprint, InputAction, InputSnapshot, LaunchContext, MapDocument,
    ObjectDescriptor, PropertyMap, Rect, RenderableDesc, RenderableKind, Scene, SceneCommand,
    SceneKey, SceneOutcome, SceneWorld, SpriteCatalog, TextPanel, Transform, Vec2, WorldMap,
    NPC_TYPE_PROPERTY,
};
use serde::Serialize;
use tracing::{debug, info, warn};

const PLAYER_SPEED_UNITS_PER_SECOND: f32 = 150.0;
const INTERACTION_THRESHOLD_UNITS: f32 = 100.0;
const DEFAULT_DIALOGUE: &str = "This NPC has nothing to say.";
const DEFAULT_NPC_SPRITE_KEY: &str = "monk1";
const PLAYER_SPRITE_KEY: &str = "player";
const SPRITE_FRAME_WIDTH_PX: f32 = 32.0;
const SPRITE_FRAME_HEIGHT_PX: f32 = 48.0;
/// NPC sheets are drawn at this multiple of the map fit scale.
const NPC_SCALE_PER_FIT: f32 = 3.2;
const PLAYER_SCALE: f32 = 1.2;
const GAMEPLAY_SYSTEM_ORDER_TEXT: &str = "InputIntent>Movement>Proximity>Interaction";

include!("types.rs");
include!("spawn.rs");
include!("systems.rs");
include!("dialogue.rs");
include!("codex.rs");
include!("scene_impl.rs");

/// Settings the binary resolves from the environment before the window opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GameSettings {
    /// Map file, relative to the assets directory.
    pub(crate) map_path: PathBuf,
    pub(crate) player_identity: String,
    pub(crate) debug_learn_keys: bool,
}

pub(crate) fn build_scene_pair(
    settings: GameSettings,
    document: MapDocument,
    sprite_catalog: SpriteCatalog,
) -> (Box<dyn Scene>, Box<dyn Scene>) {
    let world_scene = WorldScene::new(settings, document, sprite_catalog);
    (Box::new(world_scene), Box::new(QuestScene::default()))
}
