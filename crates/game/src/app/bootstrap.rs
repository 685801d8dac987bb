use std::env;
use std::path::PathBuf;

use engine::{
    load_map_file, resolve_app_paths, LoopConfig, MapLoadError, Scene, SpriteCatalog,
    SpriteKeyError, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, GameSettings};

const MAP_ENV_VAR: &str = "ALGOREALM_MAP";
const PLAYER_NAME_ENV_VAR: &str = "ALGOREALM_PLAYER_NAME";
const DEBUG_LEARN_KEYS_ENV_VAR: &str = "ALGOREALM_DEBUG_LEARN_KEYS";
const DEFAULT_MAP_PATH: &str = "level1/tilemaps/map1.json";
const DEFAULT_PLAYER_NAME: &str = "Player";

const SPRITE_FRAME_WIDTH: u32 = 32;
const SPRITE_FRAME_HEIGHT: u32 = 48;
const SPRITE_SHEETS: [(&str, &str); 3] = [
    ("player", "level1/sprites/shane.png"),
    ("monk1", "level1/sprites/monk.png"),
    ("student", "level1/sprites/student.png"),
];

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load world map: {0}")]
    Map(#[from] MapLoadError),
    #[error("invalid sprite catalog entry: {0}")]
    SpriteCatalog(#[from] SpriteKeyError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) world_scene: Box<dyn Scene>,
    pub(crate) quest_scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Algorealm Startup ===");

    let app_paths = resolve_app_paths()?;
    let settings = settings_from_lookup(|key| env::var(key).ok());
    let map_path = app_paths.assets_dir.join(&settings.map_path);
    info!(
        root = %app_paths.root.display(),
        assets_dir = %app_paths.assets_dir.display(),
        map = %map_path.display(),
        player = %settings.player_identity,
        debug_learn_keys = settings.debug_learn_keys,
        "startup"
    );

    let document = load_map_file(&map_path)?;
    let sprite_catalog = build_sprite_catalog()?;
    let (world_scene, quest_scene) =
        gameplay::build_scene_pair(settings, document, sprite_catalog.clone());
    let config = LoopConfig {
        asset_root: app_paths.assets_dir,
        sprite_catalog,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        world_scene,
        quest_scene,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn settings_from_lookup<F>(lookup: F) -> GameSettings
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    GameSettings {
        map_path: PathBuf::from(
            non_empty(MAP_ENV_VAR).unwrap_or_else(|| DEFAULT_MAP_PATH.to_string()),
        ),
        player_identity: non_empty(PLAYER_NAME_ENV_VAR)
            .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_string()),
        debug_learn_keys: parse_enabled_flag(non_empty(DEBUG_LEARN_KEYS_ENV_VAR).as_deref()),
    }
}

fn parse_enabled_flag(raw: Option<&str>) -> bool {
    matches!(raw, Some("1") | Some("true") | Some("yes") | Some("on"))
}

fn build_sprite_catalog() -> Result<SpriteCatalog, SpriteKeyError> {
    let mut catalog = SpriteCatalog::default();
    for (key, path) in SPRITE_SHEETS {
        catalog.register(key, path, SPRITE_FRAME_WIDTH, SPRITE_FRAME_HEIGHT)?;
    }
    Ok(catalog)
}
