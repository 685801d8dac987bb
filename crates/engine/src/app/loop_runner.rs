use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::sprite_keys::SpriteCatalog;

use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::scene::SceneMachine;
use super::{InputAction, InputSnapshot, Renderer, Scene, Viewport};

pub const MAX_FPS_ENV_VAR: &str = "ALGOREALM_MAX_FPS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    /// Directory sprite sheet and tileset paths are resolved against.
    pub asset_root: PathBuf,
    pub sprite_catalog: SpriteCatalog,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Algorealm".to_string(),
            window_width: 1280,
            window_height: 720,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: None,
            asset_root: PathBuf::from("assets"),
            sprite_catalog: SpriteCatalog::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Opens the window and drives `world_scene` at a fixed tick rate until the
/// window closes or Escape is pressed. `quest_scene` runs on top of the
/// paused world whenever the world scene launches it.
pub fn run_app(
    config: LoopConfig,
    world_scene: Box<dyn Scene>,
    quest_scene: Box<dyn Scene>,
) -> Result<(), AppError> {
    let mut scenes = SceneMachine::new(world_scene, quest_scene);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(
        Arc::clone(&window),
        config.asset_root.clone(),
        config.sprite_catalog.clone(),
    )
    .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let effective_render_cap = resolve_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);

    let initial_size = window.inner_size();
    let mut input_collector = InputCollector::new(initial_size.width, initial_size.height);
    scenes.set_viewport(Viewport {
        width: initial_size.width,
        height: initial_size.height,
    });
    scenes.load_world();
    info!(
        scene = ?scenes.active_scene(),
        entity_count = scenes.world_view().entity_count(),
        viewport_width = initial_size.width,
        viewport_height = initial_size.height,
        "scene_loaded"
    );

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, Instant::now());
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    scenes.set_viewport(Viewport {
                        width: new_size.width,
                        height: new_size.height,
                    });
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    scenes.set_viewport(Viewport {
                        width: size.width,
                        height: size.height,
                    });
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(false) => {
                    input_collector.release_all();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
                    accumulator = accumulator.saturating_add(clamped_frame_dt);

                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..step_plan.ticks_to_run {
                        let input_snapshot = input_collector.snapshot_for_tick();
                        let command = scenes.update_active(fixed_dt_seconds, &input_snapshot);
                        if scenes.apply_command(command) {
                            metrics_accumulator.record_scene_switch();
                        }
                        metrics_accumulator.record_tick(scenes.world_paused());
                    }
                    accumulator = step_plan.remaining_accumulator;

                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    if let Err(error) =
                        renderer.render_frame(scenes.world_view(), scenes.overlay_view())
                    {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title = scenes.debug_title_active();
                    if next_title != last_applied_title {
                        match &next_title {
                            Some(title) => window.set_title(title),
                            None => window.set_title(&config.window_title),
                        }
                        last_applied_title = next_title;
                    }
                    metrics_accumulator.record_frame(raw_frame_dt);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            paused_tick_ratio = snapshot.paused_tick_ratio,
                            scene_switches = snapshot.scene_switches,
                            entity_count = scenes.world_view().entity_count(),
                            scene = ?scenes.active_scene(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                scenes.shutdown_all();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Folds key events into held state plus press edges. Edges survive until
/// the next `snapshot_for_tick`, so a press between two ticks is seen by
/// exactly one tick.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    held: ActionStates,
    pressed_edges: ActionStates,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let is_pressed = key_event.state == ElementState::Pressed;
        self.handle_physical_key(key_event.physical_key, is_pressed);
    }

    fn handle_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let Some(action) = action_for_key(key) else {
            return;
        };
        if is_pressed && !self.held.is_down(action) {
            self.pressed_edges.set(action, true);
        }
        self.held.set(action, is_pressed);
        if action == InputAction::Quit && is_pressed {
            self.mark_quit_requested();
        }
    }

    /// Focus loss swallows key-up events, so nothing may stay held.
    fn release_all(&mut self) {
        self.held.clear();
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.quit_requested,
            self.held,
            self.pressed_edges,
            self.window_width,
            self.window_height,
        );
        self.pressed_edges.clear();
        snapshot
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let action = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => InputAction::MoveUp,
        KeyCode::KeyS | KeyCode::ArrowDown => InputAction::MoveDown,
        KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::MoveLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => InputAction::MoveRight,
        KeyCode::KeyE => InputAction::Interact,
        KeyCode::Digit1 => InputAction::Hotkey1,
        KeyCode::Digit2 => InputAction::Hotkey2,
        KeyCode::Digit3 => InputAction::Hotkey3,
        KeyCode::Escape => InputAction::Quit,
        _ => return None,
    };
    Some(action)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_render_fps_cap(config_cap: Option<u32>) -> Option<u32> {
    match env::var(MAX_FPS_ENV_VAR) {
        Ok(value) => parse_render_fps_cap(&value, config_cap),
        Err(env::VarError::NotPresent) => normalize_render_fps_cap(config_cap),
        Err(err) => {
            warn!(
                env_var = MAX_FPS_ENV_VAR,
                error = %err,
                "unable to read max-fps env var; falling back to config"
            );
            normalize_render_fps_cap(config_cap)
        }
    }
}

/// `0` or `off` disables the cap; anything unparsable keeps the config value.
fn parse_render_fps_cap(raw: &str, config_cap: Option<u32>) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("off") {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(fps) => normalize_render_fps_cap(Some(fps)),
        Err(_) => {
            warn!(
                env_var = MAX_FPS_ENV_VAR,
                value = raw,
                "invalid max-fps env var value; falling back to config"
            );
            normalize_render_fps_cap(config_cap)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputCollector, code: KeyCode) {
        input.handle_physical_key(PhysicalKey::Code(code), true);
    }

    fn release(input: &mut InputCollector, code: KeyCode) {
        input.handle_physical_key(PhysicalKey::Code(code), false);
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(50), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(2));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn interact_press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new(1280, 720);
        press(&mut input, KeyCode::KeyE);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::Interact));
        assert!(!second.was_pressed(InputAction::Interact));
        assert!(second.is_down(InputAction::Interact));
    }

    #[test]
    fn held_key_repeat_does_not_spam_press_edges() {
        let mut input = InputCollector::default();

        press(&mut input, KeyCode::KeyE);
        let first = input.snapshot_for_tick();

        press(&mut input, KeyCode::KeyE);
        let second = input.snapshot_for_tick();

        release(&mut input, KeyCode::KeyE);
        press(&mut input, KeyCode::KeyE);
        let third = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::Interact));
        assert!(!second.was_pressed(InputAction::Interact));
        assert!(third.was_pressed(InputAction::Interact));
    }

    #[test]
    fn press_and_release_between_ticks_still_reports_the_edge() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyE);
        release(&mut input, KeyCode::KeyE);

        let snapshot = input.snapshot_for_tick();
        assert!(snapshot.was_pressed(InputAction::Interact));
        assert!(!snapshot.is_down(InputAction::Interact));
    }

    #[test]
    fn wasd_and_arrow_keys_map_to_the_same_actions() {
        let pairs = [
            (KeyCode::KeyW, KeyCode::ArrowUp, InputAction::MoveUp),
            (KeyCode::KeyS, KeyCode::ArrowDown, InputAction::MoveDown),
            (KeyCode::KeyA, KeyCode::ArrowLeft, InputAction::MoveLeft),
            (KeyCode::KeyD, KeyCode::ArrowRight, InputAction::MoveRight),
        ];
        for (letter, arrow, action) in pairs {
            assert_eq!(action_for_key(PhysicalKey::Code(letter)), Some(action));
            assert_eq!(action_for_key(PhysicalKey::Code(arrow)), Some(action));
        }
    }

    #[test]
    fn digit_keys_map_to_hotkeys() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::Digit2);
        let snapshot = input.snapshot_for_tick();
        assert!(snapshot.was_pressed(InputAction::Hotkey2));
        assert!(!snapshot.was_pressed(InputAction::Hotkey1));
    }

    #[test]
    fn key_release_clears_action_state() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyD);
        release(&mut input, KeyCode::KeyD);
        input.snapshot_for_tick();

        let snapshot = input.snapshot_for_tick();
        assert!(!snapshot.is_down(InputAction::MoveRight));
    }

    #[test]
    fn focus_loss_releases_held_keys() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyA);
        input.snapshot_for_tick();
        input.release_all();

        assert!(!input.snapshot_for_tick().is_down(InputAction::MoveLeft));
    }

    #[test]
    fn escape_marks_quit_requested() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::Escape);
        assert!(input.quit_requested);
        assert!(input.snapshot_for_tick().quit_requested());
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyQ);
        let snapshot = input.snapshot_for_tick();
        assert!(!snapshot.is_down(InputAction::Interact));
        assert!(!snapshot.quit_requested());
    }

    #[test]
    fn snapshot_carries_window_size() {
        let mut input = InputCollector::new(1280, 720);
        assert_eq!(input.snapshot_for_tick().window_size(), (1280, 720));
        input.set_window_size(800, 600);
        assert_eq!(input.snapshot_for_tick().window_size(), (800, 600));
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(None), None);
    }

    #[test]
    fn target_frame_duration_for_60hz_is_expected() {
        let duration = target_frame_duration(Some(60)).expect("duration");
        assert!((duration.as_secs_f64() - (1.0 / 60.0)).abs() < 0.000_001);
    }

    #[test]
    fn compute_cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60)));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn compute_cap_sleep_positive_when_under_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(5), target_frame_duration(Some(60)));
        assert!(sleep > Duration::ZERO);
    }

    #[test]
    fn normalize_render_fps_cap_disables_zero() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(normalize_render_fps_cap(Some(60)), Some(60));
    }

    #[test]
    fn max_fps_value_parsing() {
        assert_eq!(parse_render_fps_cap("144", None), Some(144));
        assert_eq!(parse_render_fps_cap(" 30 ", Some(60)), Some(30));
        assert_eq!(parse_render_fps_cap("off", Some(60)), None);
        assert_eq!(parse_render_fps_cap("0", Some(60)), None);
        assert_eq!(parse_render_fps_cap("fast", Some(60)), Some(60));
    }
}
