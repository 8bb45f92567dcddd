mod input;
mod loop_runner;
mod metrics;
mod rendering;

pub use input::{InputAction, InputEvent};
pub use loop_runner::{
    run_app, run_app_with_metrics, run_scene_with_metrics, AppError, LoopConfig,
    SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{Renderer, CLEAR_COLOR};
