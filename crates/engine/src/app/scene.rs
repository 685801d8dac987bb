use std::ops::{Add, Sub};

use tracing::{info, warn};

use super::animation::{animation_key_for, Facing};
use super::input::InputSnapshot;
use super::rendering::{TextPanel, Viewport};
use crate::map::WorldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    World,
    Quest,
}

/// Data handed to a launched sub-scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    pub player_identity: String,
    pub initiator: String,
    pub skill: Option<String>,
}

/// What a sub-scene reports back when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneOutcome {
    pub completed: bool,
    pub learned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    /// Pause the world and run `scene` on top of it.
    Launch {
        scene: SceneKey,
        context: LaunchContext,
    },
    /// End the running sub-scene and resume the world.
    Finish(SceneOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Screen-aligned world coordinates: x grows right, y grows down.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn normalized_or_zero(self) -> Self {
        let len_sq = self.x * self.x + self.y * self.y;
        if len_sq > 0.0 && len_sq.is_finite() {
            self.scaled(len_sq.sqrt().recip())
        } else {
            Self::ZERO
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle, `x`/`y` at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn from_center(center: Vec2, footprint: Footprint) -> Self {
        Self {
            x: center.x - footprint.width * 0.5,
            y: center.y - footprint.height * 0.5,
            width: footprint.width,
            height: footprint.height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Touching edges do not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Footprint {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Transform {
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderableKind {
    Placeholder,
    SpriteSheet(String),
}

#[derive(Debug, Clone)]
pub struct RenderableDesc {
    pub kind: RenderableKind,
    pub scale: f32,
    pub depth: i32,
    pub debug_name: String,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub velocity: Vec2,
    pub facing: Facing,
    pub moving: bool,
    pub animation_elapsed: f32,
    pub footprint: Footprint,
    pub renderable: RenderableDesc,
}

impl Entity {
    pub fn animation_key(&self) -> &'static str {
        animation_key_for(self.facing, self.moving)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.transform.position, self.footprint)
    }

    /// Stop on the idle frame of the current facing.
    pub fn freeze_animation(&mut self) {
        self.moving = false;
        self.animation_elapsed = 0.0;
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    map: Option<WorldMap>,
    viewport: Viewport,
    panel: Option<TextPanel>,
}

impl SceneWorld {
    pub fn spawn(
        &mut self,
        transform: Transform,
        footprint: Footprint,
        renderable: RenderableDesc,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            velocity: Vec2::ZERO,
            facing: Facing::default(),
            moving: false,
            animation_elapsed: 0.0,
            footprint,
            renderable,
        });
        id
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            self.entities.append(&mut self.pending_spawns);
        }
    }

    /// Drops everything the scene owns; the viewport survives.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.map = None;
        self.panel = None;
    }

    pub fn set_map(&mut self, map: WorldMap) {
        self.map = Some(map);
    }

    pub fn map(&self) -> Option<&WorldMap> {
        self.map.as_ref()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_panel(&mut self, panel: TextPanel) {
        self.panel = Some(panel);
    }

    pub fn clear_panel(&mut self) {
        self.panel = None;
    }

    pub fn panel(&self) -> Option<&TextPanel> {
        self.panel.as_ref()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    /// Called right after `load` when this scene is launched as a sub-scene.
    fn on_launch(&mut self, _context: &LaunchContext, _world: &mut SceneWorld) {}
    /// Called on the paused scene when the sub-scene on top of it finishes.
    fn on_resume(&mut self, _outcome: &SceneOutcome, _world: &mut SceneWorld) {}
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    fn unload_and_clear(&mut self) {
        if self.is_loaded {
            let (scene, world) = (&mut self.scene, &mut self.world);
            scene.unload(world);
        }
        self.world.clear();
        self.is_loaded = false;
    }
}

/// The world scene plus one sub-scene. While the sub-scene runs the world is
/// paused: it is still rendered but receives no updates.
pub(crate) struct SceneMachine {
    world: SceneRuntime,
    quest: SceneRuntime,
    active_scene: SceneKey,
}

impl SceneMachine {
    pub(crate) fn new(world_scene: Box<dyn Scene>, quest_scene: Box<dyn Scene>) -> Self {
        Self {
            world: SceneRuntime::new(world_scene),
            quest: SceneRuntime::new(quest_scene),
            active_scene: SceneKey::World,
        }
    }

    pub(crate) fn active_scene(&self) -> SceneKey {
        self.active_scene
    }

    pub(crate) fn world_paused(&self) -> bool {
        self.active_scene != SceneKey::World
    }

    pub(crate) fn set_viewport(&mut self, viewport: Viewport) {
        self.world.world.set_viewport(viewport);
        self.quest.world.set_viewport(viewport);
    }

    pub(crate) fn load_world(&mut self) {
        if self.world.is_loaded {
            return;
        }
        let runtime = &mut self.world;
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        scene.load(world);
        world.apply_pending();
        runtime.is_loaded = true;
    }

    pub(crate) fn update_active(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> SceneCommand {
        let runtime = self.active_runtime_mut();
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        let command = scene.update(fixed_dt_seconds, input, world);
        world.apply_pending();
        command
    }

    /// Returns true when the active scene changed.
    pub(crate) fn apply_command(&mut self, command: SceneCommand) -> bool {
        match command {
            SceneCommand::None => false,
            SceneCommand::Launch { scene, context } => self.launch(scene, &context),
            SceneCommand::Finish(outcome) => self.finish(&outcome),
        }
    }

    fn launch(&mut self, target: SceneKey, context: &LaunchContext) -> bool {
        if target == SceneKey::World || self.active_scene != SceneKey::World {
            warn!(
                target = ?target,
                active = ?self.active_scene,
                "scene_launch_ignored"
            );
            return false;
        }

        let runtime = self.runtime_mut(target);
        runtime.unload_and_clear();
        {
            let (scene, world) = (&mut runtime.scene, &mut runtime.world);
            scene.load(world);
            scene.on_launch(context, world);
            world.apply_pending();
        }
        runtime.is_loaded = true;
        self.active_scene = target;
        info!(
            scene = ?target,
            player = %context.player_identity,
            initiator = %context.initiator,
            "scene_launched"
        );
        true
    }

    fn finish(&mut self, outcome: &SceneOutcome) -> bool {
        if self.active_scene == SceneKey::World {
            warn!("scene_finish_ignored_world_active");
            return false;
        }

        let finished = self.active_scene;
        self.runtime_mut(finished).unload_and_clear();
        self.active_scene = SceneKey::World;

        let runtime = &mut self.world;
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        scene.on_resume(outcome, world);
        info!(
            scene = ?finished,
            completed = outcome.completed,
            learned = outcome.learned.len(),
            "scene_finished"
        );
        true
    }

    /// The world scene's state, drawn every frame even while paused.
    pub(crate) fn world_view(&self) -> &SceneWorld {
        &self.world.world
    }

    pub(crate) fn overlay_view(&self) -> Option<&SceneWorld> {
        self.world_paused().then_some(&self.quest.world)
    }

    pub(crate) fn debug_title_active(&self) -> Option<String> {
        let runtime = self.active_runtime_ref();
        runtime.scene.debug_title(&runtime.world)
    }

    pub(crate) fn shutdown_all(&mut self) {
        self.quest.unload_and_clear();
        self.world.unload_and_clear();
        self.active_scene = SceneKey::World;
    }

    fn active_runtime_ref(&self) -> &SceneRuntime {
        match self.active_scene {
            SceneKey::World => &self.world,
            SceneKey::Quest => &self.quest,
        }
    }

    fn active_runtime_mut(&mut self) -> &mut SceneRuntime {
        self.runtime_mut(self.active_scene)
    }

    fn runtime_mut(&mut self, key: SceneKey) -> &mut SceneRuntime {
        match key {
            SceneKey::World => &mut self.world,
            SceneKey::Quest => &mut self.quest,
        }
    }
}
