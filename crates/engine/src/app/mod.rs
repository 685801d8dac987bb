mod animation;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;

pub use animation::{animation_key_for, sheet_frame_index, Facing, ANIMATION_FRAMES_PER_SECOND};
pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig, MAX_FPS_ENV_VAR};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{Renderer, TextPanel, Viewport, ViewportFit};
pub use scene::{
    Entity, EntityId, Footprint, LaunchContext, Rect, RenderableDesc, RenderableKind, Scene,
    SceneCommand, SceneKey, SceneOutcome, SceneWorld, Transform, Vec2,
};
