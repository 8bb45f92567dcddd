use std::env;
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

use crate::content::{load_scene, LoadError, SceneBuildOptions};
use crate::scene::{Level, Node, SceneTree};
use crate::{resolve_root, StartupError};

use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::{InputAction, InputEvent, MetricsHandle, Renderer};

pub const SLOW_FRAME_ENV_VAR: &str = "BARFLY_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub logical_width: u32,
    pub logical_height: u32,
    pub window_scale: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub start_level: usize,
    pub debug_bounds: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Barfly".to_string(),
            logical_width: 128,
            logical_height: 64,
            window_scale: 6,
            target_tps: 20,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            start_level: 0,
            debug_bounds: false,
        }
    }
}

impl LoopConfig {
    fn scene_options(&self) -> SceneBuildOptions {
        SceneBuildOptions {
            view_width: i32::try_from(self.logical_width).unwrap_or(i32::MAX),
            view_height: i32::try_from(self.logical_height).unwrap_or(i32::MAX),
            start_level: self.start_level,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load scene: {0}")]
    Load(#[from] LoadError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, metrics_handle)
}

/// Resolve the project root, load `assets/` into a scene tree and drive it
/// until the window closes.
pub fn run_app_with_metrics(config: LoopConfig, metrics_handle: MetricsHandle) -> Result<(), AppError> {
    let root = resolve_root()?;
    let assets_dir = root.join("assets");
    info!(
        root = %root.display(),
        assets_dir = %assets_dir.display(),
        "startup"
    );

    let options = config.scene_options();
    let tree = match load_scene(&assets_dir, &options) {
        Err(LoadError::StartLevelOutOfRange { index, count }) if count > 0 => {
            let clamped = count - 1;
            warn!(
                start_level = index,
                level_count = count,
                clamped,
                "start_level_out_of_range"
            );
            load_scene(
                &assets_dir,
                &SceneBuildOptions {
                    start_level: clamped,
                    ..options
                },
            )?
        }
        result => result?,
    };
    run_scene_with_metrics(config, tree, metrics_handle)
}

/// Drive an already built scene tree.
pub fn run_scene_with_metrics(
    config: LoopConfig,
    mut tree: SceneTree,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window_scale = config.window_scale.max(1);
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                f64::from(config.logical_width * window_scale),
                f64::from(config.logical_height * window_scale),
            ))
            .with_min_inner_size(LogicalSize::new(
                f64::from(config.logical_width),
                f64::from(config.logical_height),
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(
        Arc::clone(&window),
        config.logical_width,
        config.logical_height,
    )
    .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / f64::from(target_tps));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut input_collector = InputCollector::default();
    let mut debug_bounds = config.debug_bounds;

    info!(
        level = active_level_name(&tree),
        level_count = tree.level_count(),
        node_count = tree.node_count(),
        "scene_ready"
    );
    info!(
        target_tps,
        logical_width = config.logical_width,
        logical_height = config.logical_height,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        debug_bounds,
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
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
                    if input_collector.take_debug_bounds_toggle_pressed() {
                        debug_bounds = !debug_bounds;
                        info!(debug_bounds, "debug_bounds_toggled");
                    }

                    if slow_frame_delay > Duration::ZERO {
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    for input in input_collector.drain_events() {
                        let events = tree.handle_input(input);
                        metrics_accumulator.record_interactions(events.len());
                    }

                    let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
                    accumulator = accumulator.saturating_add(clamped_frame_dt);

                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..step_plan.ticks_to_run {
                        let report = tree.tick();
                        if report.switched_to.is_some() {
                            info!(
                                level = active_level_name(&tree),
                                node_count = tree.node_count(),
                                "level_entered"
                            );
                        }
                        metrics_accumulator.record_tick(&report);
                    }
                    accumulator = step_plan.remaining_accumulator;

                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    // Only render pacing sleeps here.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    if let Err(error) = renderer.render(&tree, debug_bounds) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();
                    metrics_accumulator.record_frame(raw_frame_dt);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            rollbacks = snapshot.rollbacks,
                            interaction_events = snapshot.interaction_events,
                            node_count = tree.node_count(),
                            level = active_level_name(&tree),
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
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn active_level_name(tree: &SceneTree) -> &str {
    tree.active_level()
        .and_then(Node::as_level)
        .map(Level::name)
        .unwrap_or("none")
}

/// Turns raw key state into action edges for the scene. Edges queue between
/// frames and are drained once per redraw, before the ticks run.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    action_states: ActionStates,
    pending: Vec<InputEvent>,
    debug_bounds_is_down: bool,
    debug_bounds_pressed_edge: bool,
}

impl InputCollector {
    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        if key_event.repeat {
            return;
        }
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        if code == KeyCode::F3 {
            self.handle_debug_bounds_key_state(is_pressed);
            return;
        }
        let Some(action) = action_for_key(code) else {
            return;
        };
        if let Some(edge) = self.action_states.set(action, is_pressed) {
            self.pending.push(edge);
        }
        if action == InputAction::Quit && is_pressed {
            self.mark_quit_requested();
        }
    }

    fn handle_debug_bounds_key_state(&mut self, is_pressed: bool) {
        if is_pressed {
            if !self.debug_bounds_is_down {
                self.debug_bounds_pressed_edge = true;
            }
            self.debug_bounds_is_down = true;
        } else {
            self.debug_bounds_is_down = false;
        }
    }

    fn take_debug_bounds_toggle_pressed(&mut self) -> bool {
        std::mem::take(&mut self.debug_bounds_pressed_edge)
    }

    /// Emit releases for everything still held, e.g. when focus is lost.
    fn release_all(&mut self) {
        for action in InputAction::ALL {
            if let Some(edge) = self.action_states.set(action, false) {
                self.pending.push(edge);
            }
        }
        self.debug_bounds_is_down = false;
    }

    fn drain_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending)
    }
}

fn action_for_key(code: KeyCode) -> Option<InputAction> {
    match code {
        KeyCode::KeyW | KeyCode::ArrowUp => Some(InputAction::MoveUp),
        KeyCode::KeyS | KeyCode::ArrowDown => Some(InputAction::MoveDown),
        KeyCode::KeyA | KeyCode::ArrowLeft => Some(InputAction::MoveLeft),
        KeyCode::KeyD | KeyCode::ArrowRight => Some(InputAction::MoveRight),
        KeyCode::KeyE => Some(InputAction::Interact),
        KeyCode::Escape => Some(InputAction::Quit),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(mut accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::replace(&mut accumulator, Duration::ZERO)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
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
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
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

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputCollector, code: KeyCode) {
        input.update_action_state_from_physical_key(PhysicalKey::Code(code), true);
    }

    fn release(input: &mut InputCollector, code: KeyCode) {
        input.update_action_state_from_physical_key(PhysicalKey::Code(code), false);
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
        let fixed_dt = Duration::from_millis(50);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 2);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(20));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(50);
        let result = plan_sim_steps(Duration::from_millis(250), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(100));
    }

    #[test]
    fn wasd_and_arrow_keys_map_to_actions() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyW);
        press(&mut input, KeyCode::ArrowLeft);
        press(&mut input, KeyCode::KeyE);

        assert_eq!(
            input.drain_events(),
            vec![
                InputEvent::Pressed(InputAction::MoveUp),
                InputEvent::Pressed(InputAction::MoveLeft),
                InputEvent::Pressed(InputAction::Interact),
            ]
        );
        assert!(input.drain_events().is_empty());
    }

    #[test]
    fn held_key_does_not_repeat_press_edges() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyD);
        press(&mut input, KeyCode::ArrowRight);
        release(&mut input, KeyCode::KeyD);

        assert_eq!(
            input.drain_events(),
            vec![
                InputEvent::Pressed(InputAction::MoveRight),
                InputEvent::Released(InputAction::MoveRight),
            ]
        );
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyQ);
        release(&mut input, KeyCode::Space);
        assert!(input.drain_events().is_empty());
    }

    #[test]
    fn escape_requests_quit() {
        let mut input = InputCollector::default();
        assert!(!input.quit_requested);
        press(&mut input, KeyCode::Escape);
        assert!(input.quit_requested);
    }

    #[test]
    fn f3_toggle_is_edge_triggered() {
        let mut input = InputCollector::default();

        press(&mut input, KeyCode::F3);
        assert!(input.take_debug_bounds_toggle_pressed());

        press(&mut input, KeyCode::F3);
        assert!(!input.take_debug_bounds_toggle_pressed());

        release(&mut input, KeyCode::F3);
        press(&mut input, KeyCode::F3);
        assert!(input.take_debug_bounds_toggle_pressed());
        assert!(input.drain_events().is_empty());
    }

    #[test]
    fn focus_loss_releases_held_actions() {
        let mut input = InputCollector::default();
        press(&mut input, KeyCode::KeyA);
        press(&mut input, KeyCode::KeyE);
        input.drain_events();

        input.release_all();
        assert_eq!(
            input.drain_events(),
            vec![
                InputEvent::Released(InputAction::MoveLeft),
                InputEvent::Released(InputAction::Interact),
            ]
        );
    }

    #[test]
    fn scene_options_follow_logical_size() {
        let config = LoopConfig {
            start_level: 1,
            ..LoopConfig::default()
        };
        let options = config.scene_options();
        assert_eq!((options.view_width, options.view_height), (128, 64));
        assert_eq!(options.start_level, 1);
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
        assert_eq!(format_render_cap(None), "off");
    }
}
