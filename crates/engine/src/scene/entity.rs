use tracing::debug;

use super::action::{ActionMachine, ActionRequest};
use super::animation::Animation;
use super::canvas::{world_to_screen, Canvas, Rgba};
use super::geometry::Rect;
use super::level::LevelContext;
use super::node::NodeId;

pub const DEFAULT_PLACEHOLDER_COLOR: Rgba = [220, 220, 240, 255];
pub const DEFAULT_HEALTH: i32 = 100;

/// Idle cycles an attendant rests after serving before it will serve again.
pub const ATTENDANT_IDLE_CYCLES: i32 = 3;
/// Idle cycles a pool player waits between shots.
pub const POOL_PLAYER_WAIT_CYCLES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendantPhase {
    Ready,
    Serving,
    Returning,
    Resting { ticks_left: i32 },
}

/// Serve, walk back, rest. Driven by an automatic interaction on its owner.
#[derive(Debug, Clone)]
pub struct Attendant {
    serve: Animation,
    walk: Animation,
    idle: Animation,
    phase: AttendantPhase,
}

impl Attendant {
    pub fn new(serve: Animation, walk: Animation, idle: Animation) -> Self {
        Self {
            serve,
            walk,
            idle,
            phase: AttendantPhase::Ready,
        }
    }

    pub fn phase(&self) -> AttendantPhase {
        self.phase
    }

    pub fn is_working(&self) -> bool {
        self.phase != AttendantPhase::Ready
    }

    /// Start a serve cycle. Ignored while a previous one is still running.
    pub fn serve(&mut self) -> bool {
        if self.is_working() {
            return false;
        }
        self.serve.reset();
        self.phase = AttendantPhase::Serving;
        true
    }

    pub fn update(&mut self) {
        match self.phase {
            AttendantPhase::Ready => self.idle.update(),
            AttendantPhase::Serving => {
                self.serve.update();
                if self.serve.is_complete() {
                    self.walk.reset();
                    self.phase = AttendantPhase::Returning;
                }
            }
            AttendantPhase::Returning => {
                self.walk.update();
                if self.walk.is_complete() {
                    self.idle.reset();
                    self.phase = AttendantPhase::Resting {
                        ticks_left: ATTENDANT_IDLE_CYCLES * self.idle.cycle_duration(),
                    };
                }
            }
            AttendantPhase::Resting { ticks_left } => {
                self.idle.update();
                let ticks_left = ticks_left - 1;
                self.phase = if ticks_left <= 0 {
                    AttendantPhase::Ready
                } else {
                    AttendantPhase::Resting { ticks_left }
                };
            }
        }
    }

    pub fn current_animation(&self) -> &Animation {
        match self.phase {
            AttendantPhase::Serving => &self.serve,
            AttendantPhase::Returning => &self.walk,
            AttendantPhase::Ready | AttendantPhase::Resting { .. } => &self.idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    Shooting,
    Waiting,
    Preparing,
}

impl PoolPhase {
    fn next(self) -> Self {
        match self {
            PoolPhase::Shooting => PoolPhase::Waiting,
            PoolPhase::Waiting => PoolPhase::Preparing,
            PoolPhase::Preparing => PoolPhase::Shooting,
        }
    }
}

/// Ambient loop of shoot, wait, line up the next shot. Every phase change
/// restarts the incoming animation.
#[derive(Debug, Clone)]
pub struct PoolPlayer {
    shoot: Animation,
    wait: Animation,
    prepare: Animation,
    phase: PoolPhase,
    ticks_left: i32,
}

impl PoolPlayer {
    pub fn new(shoot: Animation, wait: Animation, prepare: Animation) -> Self {
        let mut player = Self {
            shoot,
            wait,
            prepare,
            phase: PoolPhase::Shooting,
            ticks_left: 0,
        };
        player.ticks_left = player.phase_duration(PoolPhase::Shooting);
        player
    }

    pub fn phase(&self) -> PoolPhase {
        self.phase
    }

    pub fn ticks_left(&self) -> i32 {
        self.ticks_left
    }

    fn phase_duration(&self, phase: PoolPhase) -> i32 {
        let ticks = match phase {
            PoolPhase::Shooting => self.shoot.cycle_duration(),
            PoolPhase::Waiting => POOL_PLAYER_WAIT_CYCLES * self.wait.cycle_duration(),
            PoolPhase::Preparing => self.prepare.cycle_duration(),
        };
        ticks.max(1)
    }

    fn animation_mut(&mut self, phase: PoolPhase) -> &mut Animation {
        match phase {
            PoolPhase::Shooting => &mut self.shoot,
            PoolPhase::Waiting => &mut self.wait,
            PoolPhase::Preparing => &mut self.prepare,
        }
    }

    pub fn update(&mut self) {
        let phase = self.phase;
        self.animation_mut(phase).update();
        self.ticks_left -= 1;
        if self.ticks_left > 0 {
            return;
        }
        let next = self.phase.next();
        self.animation_mut(next).reset();
        self.ticks_left = self.phase_duration(next);
        self.phase = next;
    }

    pub fn current_animation(&self) -> &Animation {
        match self.phase {
            PoolPhase::Shooting => &self.shoot,
            PoolPhase::Waiting => &self.wait,
            PoolPhase::Preparing => &self.prepare,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Player-style traversal.
    Actor(ActionMachine),
    Attendant(Attendant),
    PoolPlayer(PoolPlayer),
    /// Decoration, optionally animated.
    Prop(Option<Animation>),
    /// Constant velocity every tick.
    Drift { dx: i32, dy: i32 },
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub behavior: Behavior,
    pub facing_left: bool,
    pub camera_controlling: bool,
    pub controllable: bool,
    pub placeholder_color: Rgba,
    health: i32,
    pending: Option<ActionRequest>,
}

impl Entity {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            facing_left: false,
            camera_controlling: false,
            controllable: false,
            placeholder_color: DEFAULT_PLACEHOLDER_COLOR,
            health: DEFAULT_HEALTH,
            pending: None,
        }
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    /// Apply a signed health change, floored at zero. Returns the new value.
    pub fn update_health(&mut self, delta: i32) -> i32 {
        self.health = self.health.saturating_add(delta).max(0);
        self.health
    }

    pub fn action(&self) -> Option<&ActionMachine> {
        match &self.behavior {
            Behavior::Actor(machine) => Some(machine),
            _ => None,
        }
    }

    pub fn attendant_mut(&mut self) -> Option<&mut Attendant> {
        match &mut self.behavior {
            Behavior::Attendant(attendant) => Some(attendant),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.action().is_some_and(ActionMachine::is_locked)
    }

    pub fn pending_request(&self) -> Option<ActionRequest> {
        self.pending
    }

    /// External input. Applied now when possible, otherwise queued until the
    /// current action unlocks; a newer request replaces a queued one.
    pub fn request(&mut self, id: NodeId, request: ActionRequest) {
        if self.is_locked() {
            debug!(entity = %id, request = ?request, "action_request_queued");
            self.pending = Some(request);
        } else {
            self.pending = None;
            self.apply(id, request);
        }
    }

    fn apply(&mut self, id: NodeId, request: ActionRequest) {
        let Behavior::Actor(machine) = &mut self.behavior else {
            return;
        };
        if machine.apply(id, request) {
            if let ActionRequest::Walk { facing_left } = request {
                self.facing_left = facing_left;
            }
        }
    }

    pub fn update(&mut self, id: NodeId, bounds: &mut Rect, level: &mut dyn LevelContext) {
        if !self.is_locked() {
            if let Some(request) = self.pending.take() {
                self.apply(id, request);
            }
        }

        match &mut self.behavior {
            Behavior::Actor(machine) => machine.update(
                id,
                bounds,
                self.facing_left,
                self.camera_controlling,
                level,
            ),
            Behavior::Attendant(attendant) => attendant.update(),
            Behavior::PoolPlayer(player) => player.update(),
            Behavior::Prop(Some(animation)) => animation.update(),
            Behavior::Prop(None) => {}
            Behavior::Drift { dx, dy } => {
                *bounds = bounds.translated(*dx, *dy);
            }
        }
    }

    fn current_animation(&self) -> Option<&Animation> {
        match &self.behavior {
            Behavior::Actor(machine) => Some(machine.current_animation()),
            Behavior::Attendant(attendant) => Some(attendant.current_animation()),
            Behavior::PoolPlayer(player) => Some(player.current_animation()),
            Behavior::Prop(animation) => animation.as_ref(),
            Behavior::Drift { .. } => None,
        }
    }

    /// Current frame centered on the entity, or a placeholder box when the
    /// animation has no sheet.
    pub(crate) fn draw(&self, canvas: &mut dyn Canvas, bounds: &Rect, camera: &Rect) {
        let sprite = self
            .current_animation()
            .and_then(|animation| animation.sheet().map(|sheet| (animation, sheet)));
        match sprite {
            Some((animation, sheet)) => canvas.blit(
                sheet,
                animation.frame_sample(),
                world_to_screen(animation.frame_bounds(bounds), camera),
                animation.is_flipped(),
            ),
            None => canvas.fill_rect(world_to_screen(*bounds, camera), self.placeholder_color),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::scene::action::test_support::{animation, animations, GridLevel};
    use crate::scene::action::ActionKind;
    use crate::scene::animation::{AnimationSpec, SpriteSheet};
    use crate::scene::canvas::recording::{DrawOp, RecordingCanvas};

    const ID: NodeId = NodeId::new(3);

    fn attendant() -> Attendant {
        Attendant::new(animation(16, 3, true), animation(7, 3, true), animation(12, 3, false))
    }

    fn player() -> Entity {
        let mut entity = Entity::new(Behavior::Actor(ActionMachine::new(animations())));
        entity.controllable = true;
        entity
    }

    fn step_level() -> GridLevel {
        GridLevel::parse(&["......", "......", "......", "...###", "######"])
    }

    #[test]
    fn attendant_runs_serve_walk_rest_then_accepts_again() {
        let mut attendant = attendant();
        assert!(attendant.serve());
        assert!(!attendant.serve());

        for _ in 0..16 * 3 {
            attendant.update();
        }
        assert_eq!(attendant.phase(), AttendantPhase::Returning);

        for _ in 0..7 * 3 {
            attendant.update();
        }
        assert_eq!(
            attendant.phase(),
            AttendantPhase::Resting {
                ticks_left: 3 * 12 * 3
            }
        );
        assert!(!attendant.serve());

        for _ in 0..3 * 12 * 3 {
            attendant.update();
        }
        assert_eq!(attendant.phase(), AttendantPhase::Ready);
        assert!(attendant.serve());
    }

    #[test]
    fn pool_player_loops_shoot_wait_prepare() {
        let mut pool = PoolPlayer::new(
            animation(12, 3, true),
            animation(4, 3, false),
            animation(6, 2, true),
        );
        assert_eq!(pool.phase(), PoolPhase::Shooting);
        assert_eq!(pool.ticks_left(), 12 * 3);

        for _ in 0..12 * 3 - 1 {
            pool.update();
        }
        assert_eq!(pool.phase(), PoolPhase::Shooting);

        pool.update();
        assert_eq!(pool.phase(), PoolPhase::Waiting);
        assert_eq!(pool.ticks_left(), 3 * 4 * 3);
        assert_eq!(pool.current_animation().current_frame(), 0);

        for _ in 0..3 * 4 * 3 {
            pool.update();
        }
        assert_eq!(pool.phase(), PoolPhase::Preparing);
        assert_eq!(pool.ticks_left(), 6 * 2);

        for _ in 0..6 * 2 {
            pool.update();
        }
        assert_eq!(pool.phase(), PoolPhase::Shooting);
        let shoot = pool.current_animation();
        assert_eq!(shoot.current_frame(), 0);
        assert_eq!(shoot.cycle_remaining(), shoot.cycle_duration());
    }

    #[test]
    fn health_changes_floor_at_zero() {
        let mut entity = player();
        assert_eq!(entity.update_health(-30), 70);
        assert_eq!(entity.update_health(-500), 0);
        assert_eq!(entity.update_health(5), 5);
    }

    #[test]
    fn walk_request_sets_facing_when_unlocked() {
        let mut entity = player();
        entity.request(ID, ActionRequest::Walk { facing_left: true });
        assert!(entity.facing_left);
        assert_eq!(entity.action().map(ActionMachine::kind), Some(ActionKind::Walking));
    }

    #[test]
    fn requests_while_climbing_are_queued_latest_wins() {
        let mut level = step_level();
        let mut entity = player();
        let mut bounds = Rect::new(16, 8, 8, 24);
        entity.request(ID, ActionRequest::Walk { facing_left: false });
        entity.update(ID, &mut bounds, &mut level);
        assert!(entity.is_locked());

        entity.request(ID, ActionRequest::Walk { facing_left: true });
        entity.request(ID, ActionRequest::Idle);
        assert_eq!(entity.pending_request(), Some(ActionRequest::Idle));
        assert!(!entity.facing_left);

        let total = entity
            .action()
            .map(|machine| machine.current_animation().cycle_duration())
            .expect("actor");
        for _ in 0..total {
            entity.update(ID, &mut bounds, &mut level);
        }
        assert_eq!(entity.action().map(ActionMachine::kind), Some(ActionKind::Walking));
        assert_eq!(bounds, Rect::new(24, 0, 8, 24));

        entity.update(ID, &mut bounds, &mut level);
        assert_eq!(entity.action().map(ActionMachine::kind), Some(ActionKind::Idle));
        assert_eq!(entity.pending_request(), None);
    }

    #[test]
    fn drift_translates_each_tick() {
        let mut level = step_level();
        let mut entity = Entity::new(Behavior::Drift { dx: 2, dy: -1 });
        let mut bounds = Rect::new(0, 10, 4, 4);
        entity.update(ID, &mut bounds, &mut level);
        entity.update(ID, &mut bounds, &mut level);
        assert_eq!(bounds, Rect::new(4, 8, 4, 4));
    }

    #[test]
    fn draw_falls_back_to_placeholder_without_sheet() {
        let entity = player();
        let mut canvas = RecordingCanvas::default();
        entity.draw(&mut canvas, &Rect::new(10, 10, 8, 24), &Rect::new(8, 0, 128, 64));
        assert_eq!(
            canvas.ops,
            vec![DrawOp::Fill(Rect::new(2, 10, 8, 24), DEFAULT_PLACEHOLDER_COLOR)]
        );
    }

    #[test]
    fn draw_blits_current_frame_centered_and_flipped() {
        let sheet = Arc::new(SpriteSheet::new("bartender", 64, 48, vec![0; 64 * 48 * 4]));
        let spec = AnimationSpec {
            frame_width: 32,
            frame_height: 48,
            row: 0,
            frames: 2,
            frame_delay: 1,
            once: false,
        };
        let mut prop = Animation::new(Some(sheet), spec);
        prop.set_flipped(true);
        let entity = Entity::new(Behavior::Prop(Some(prop)));

        let mut canvas = RecordingCanvas::default();
        entity.draw(&mut canvas, &Rect::new(40, 20, 8, 24), &Rect::new(0, 0, 128, 64));
        assert_eq!(
            canvas.ops,
            vec![DrawOp::Blit {
                sheet: "bartender".to_string(),
                sample: Rect::new(0, 0, 32, 48),
                dest: Rect::new(28, 8, 32, 48),
                flipped: true,
            }]
        );
    }
}
