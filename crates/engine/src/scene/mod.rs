mod action;
mod animation;
mod canvas;
mod entity;
mod geometry;
mod interaction;
mod level;
mod node;
mod resolver;
mod tilemap;
mod tree;

pub use action::{
    ActionAnimations, ActionKind, ActionMachine, ActionRequest, TraversalProbe, WalkDecision,
    CLIMB_DELTA_PX, HEADROOM_PROBE_PX, WALK_STEP_PX,
};
pub use animation::{Animation, AnimationSpec, SpriteSheet};
pub use canvas::{
    world_to_screen, Canvas, RenderPass, Rgba, BACKDROP_TILE_COLOR, DEBUG_BOUNDS_COLOR,
    PROMPT_BACKGROUND_COLOR, PROMPT_GLYPH_COLOR, SOLID_TILE_COLOR,
};
pub use entity::{
    Attendant, AttendantPhase, Behavior, Entity, PoolPhase, PoolPlayer, ATTENDANT_IDLE_CYCLES,
    DEFAULT_HEALTH, DEFAULT_PLACEHOLDER_COLOR, POOL_PLAYER_WAIT_CYCLES,
};
pub use geometry::{center_distance_squared, Rect};
pub use interaction::{
    dispatch_key, dispatch_proximity, Activation, InteractionEvent, InteractionKey,
    InteractionPhase, InteractionTarget, Interactive, DOOR_RADIUS_PX, SERVE_RADIUS_PX,
};
pub use level::{Camera, Level, LevelContext, LevelSet};
pub use node::{Node, NodeFlags, NodeId, NodeIdAllocator, NodeKind};
pub use resolver::{
    check_child_collisions, resolve_children, update_child, TickContext, GRAVITY_PER_TICK,
};
pub use tilemap::{
    TileGrid, TileLayer, TileProbe, Tilemap, TilemapError, DEFAULT_TILE_SIZE, EMPTY_CELL,
};
pub use tree::{SceneTree, TickReport};
