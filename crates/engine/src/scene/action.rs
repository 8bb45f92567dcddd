use tracing::debug;

use super::animation::Animation;
use super::geometry::Rect;
use super::level::LevelContext;
use super::node::NodeId;

pub const WALK_STEP_PX: i32 = 1;
/// One tile, the diagonal distance covered by a climb.
pub const CLIMB_DELTA_PX: i32 = 8;
pub const HEADROOM_PROBE_PX: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Idle,
    Walking,
    ClimbingUp,
    ClimbingDown,
}

/// Externally requested action. Climbs are only ever entered from probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRequest {
    Idle,
    Walk { facing_left: bool },
}

#[derive(Debug, Clone)]
pub struct ActionAnimations {
    pub idle: Animation,
    pub walk: Animation,
    pub climb_up: Animation,
    pub climb_down: Animation,
}

impl ActionAnimations {
    fn set_flipped(&mut self, flipped: bool) {
        self.idle.set_flipped(flipped);
        self.walk.set_flipped(flipped);
        self.climb_up.set_flipped(flipped);
        self.climb_down.set_flipped(flipped);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDecision {
    ClimbUp,
    ClimbDown,
    Step,
}

/// Tile samples taken around the leading foot of a walking entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalProbe {
    pub ground: bool,
    pub obstruction: bool,
    pub headroom: bool,
    pub ground_ahead: bool,
}

impl TraversalProbe {
    pub fn sample(bounds: &Rect, facing_left: bool, level: &dyn LevelContext) -> Self {
        let foot_center = bounds.x + bounds.w / 2;
        let foot_y = bounds.bottom() - 1;
        let lead_x = if facing_left {
            bounds.x - 1
        } else {
            bounds.right()
        };
        // Drop point sits just past the leading edge: a finished descent must
        // not overlap the tile it left.
        Self {
            ground: level.solid_at(foot_center, bounds.bottom()),
            obstruction: level.solid_at(lead_x, foot_y),
            headroom: level.solid_at(lead_x, foot_y - HEADROOM_PROBE_PX),
            ground_ahead: level.solid_at(lead_x, bounds.bottom()),
        }
    }

    pub fn decide(&self) -> WalkDecision {
        if self.obstruction && !self.headroom && self.ground {
            WalkDecision::ClimbUp
        } else if !self.obstruction && self.ground && !self.ground_ahead {
            WalkDecision::ClimbDown
        } else {
            WalkDecision::Step
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Idle,
    Walking,
    Climbing { up: bool, origin_x: i32, origin_y: i32 },
}

impl Action {
    fn kind(self) -> ActionKind {
        match self {
            Action::Idle => ActionKind::Idle,
            Action::Walking => ActionKind::Walking,
            Action::Climbing { up: true, .. } => ActionKind::ClimbingUp,
            Action::Climbing { up: false, .. } => ActionKind::ClimbingDown,
        }
    }
}

/// Idle/walk/climb state machine driven once per tick by its entity.
#[derive(Debug, Clone)]
pub struct ActionMachine {
    action: Action,
    animations: ActionAnimations,
}

impl ActionMachine {
    pub fn new(animations: ActionAnimations) -> Self {
        Self {
            action: Action::Idle,
            animations,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Climbs run to completion; nothing external can preempt them.
    pub fn is_locked(&self) -> bool {
        matches!(self.action, Action::Climbing { .. })
    }

    pub fn animations(&self) -> &ActionAnimations {
        &self.animations
    }

    pub fn current_animation(&self) -> &Animation {
        match self.action {
            Action::Idle => &self.animations.idle,
            Action::Walking => &self.animations.walk,
            Action::Climbing { up: true, .. } => &self.animations.climb_up,
            Action::Climbing { up: false, .. } => &self.animations.climb_down,
        }
    }

    /// Returns false when the current action is locked.
    pub fn apply(&mut self, entity: NodeId, request: ActionRequest) -> bool {
        if self.is_locked() {
            return false;
        }
        let next = match request {
            ActionRequest::Idle => Action::Idle,
            ActionRequest::Walk { .. } => Action::Walking,
        };
        if next != self.action {
            match next {
                Action::Idle => self.animations.idle.reset(),
                Action::Walking => self.animations.walk.reset(),
                Action::Climbing { .. } => {}
            }
            self.transition(entity, next);
        }
        true
    }

    fn transition(&mut self, entity: NodeId, next: Action) {
        debug!(
            entity = %entity,
            from = ?self.action.kind(),
            to = ?next.kind(),
            "action_changed"
        );
        self.action = next;
    }

    fn start_climb(&mut self, entity: NodeId, up: bool, bounds: &Rect) {
        if up {
            self.animations.climb_up.reset();
        } else {
            self.animations.climb_down.reset();
        }
        self.transition(
            entity,
            Action::Climbing {
                up,
                origin_x: bounds.x,
                origin_y: bounds.y,
            },
        );
    }

    pub fn update(
        &mut self,
        entity: NodeId,
        bounds: &mut Rect,
        facing_left: bool,
        camera_controlling: bool,
        level: &mut dyn LevelContext,
    ) {
        self.animations.set_flipped(facing_left);

        match self.action {
            Action::Idle => self.animations.idle.update(),
            Action::Walking => match TraversalProbe::sample(bounds, facing_left, level).decide() {
                WalkDecision::ClimbUp => self.start_climb(entity, true, bounds),
                WalkDecision::ClimbDown => self.start_climb(entity, false, bounds),
                WalkDecision::Step => {
                    bounds.x += if facing_left {
                        -WALK_STEP_PX
                    } else {
                        WALK_STEP_PX
                    };
                    self.animations.walk.update();
                }
            },
            Action::Climbing {
                up,
                origin_x,
                origin_y,
            } => {
                let animation = if up {
                    &mut self.animations.climb_up
                } else {
                    &mut self.animations.climb_down
                };
                animation.update();

                let dx = if facing_left {
                    -CLIMB_DELTA_PX
                } else {
                    CLIMB_DELTA_PX
                };
                let dy = if up { -CLIMB_DELTA_PX } else { CLIMB_DELTA_PX };
                let origin = bounds.with_position(origin_x, origin_y);

                if animation.is_complete() {
                    *bounds = origin.translated(dx, dy);
                    if camera_controlling {
                        let (x, y) = bounds.center();
                        level.center_camera(x, y);
                    }
                    self.transition(entity, Action::Walking);
                } else if camera_controlling {
                    let progress = animation.progress();
                    let (x, y) = origin.center();
                    level.center_camera(
                        x + (dx as f32 * progress) as i32,
                        y + (dy as f32 * progress) as i32,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::scene::animation::AnimationSpec;
    use crate::scene::tilemap::{TileGrid, TileLayer};

    pub(crate) fn animation(frames: i32, frame_delay: i32, once: bool) -> Animation {
        Animation::new(
            None,
            AnimationSpec {
                frame_width: 32,
                frame_height: 48,
                row: 0,
                frames,
                frame_delay,
                once,
            },
        )
    }

    pub(crate) fn animations() -> ActionAnimations {
        ActionAnimations {
            idle: animation(4, 3, false),
            walk: animation(7, 2, false),
            climb_up: animation(4, 2, true),
            climb_down: animation(4, 2, true),
        }
    }

    /// Level stand-in backed by one solid layer; records camera requests.
    pub(crate) struct GridLevel {
        pub(crate) layer: TileLayer,
        pub(crate) centered: Vec<(i32, i32)>,
    }

    impl GridLevel {
        /// `rows` uses `#` for solid tiles and `.` for empty ones.
        pub(crate) fn parse(rows: &[&str]) -> Self {
            let columns = rows.first().map_or(0, |row| row.len());
            let cells = rows
                .iter()
                .flat_map(|row| row.chars().map(|c| if c == '#' { 0 } else { -1 }))
                .collect();
            let grid = TileGrid::new(columns, rows.len(), cells).expect("grid");
            Self {
                layer: TileLayer::new(grid, 8, true).expect("layer"),
                centered: Vec::new(),
            }
        }
    }

    impl LevelContext for GridLevel {
        fn solid_at(&self, x: i32, y: i32) -> bool {
            self.layer.solid_at(x, y)
        }

        fn center_camera(&mut self, x: i32, y: i32) {
            self.centered.push((x, y));
        }

        fn camera(&self) -> Rect {
            Rect::new(0, 0, 128, 64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{animations, GridLevel};
    use super::*;

    const ENTITY: NodeId = NodeId::new(9);

    // Floor on row 4, one-tile step at column 3.
    fn step_level() -> GridLevel {
        GridLevel::parse(&[
            "......", //
            "......", //
            "......", //
            "...###", //
            "######",
        ])
    }

    fn walking_machine() -> ActionMachine {
        let mut machine = ActionMachine::new(animations());
        assert!(machine.apply(ENTITY, ActionRequest::Walk { facing_left: false }));
        machine
    }

    #[test]
    fn probe_points_follow_facing() {
        let level = step_level();
        let bounds = Rect::new(16, 8, 8, 24);

        let right = TraversalProbe::sample(&bounds, false, &level);
        assert_eq!(
            right,
            TraversalProbe {
                ground: true,
                obstruction: true,
                headroom: false,
                ground_ahead: true,
            }
        );
        assert_eq!(right.decide(), WalkDecision::ClimbUp);

        let left = TraversalProbe::sample(&bounds, true, &level);
        assert!(!left.obstruction);
        assert_eq!(left.decide(), WalkDecision::Step);
    }

    #[test]
    fn blocked_headroom_keeps_walking_into_wall() {
        let level = GridLevel::parse(&[
            "......", //
            "......", //
            "...###", //
            "...###", //
            "######",
        ]);
        let probe = TraversalProbe::sample(&Rect::new(16, 8, 8, 24), false, &level);
        assert!(probe.headroom);
        assert_eq!(probe.decide(), WalkDecision::Step);
    }

    #[test]
    fn ledge_ahead_starts_climb_down() {
        let level = GridLevel::parse(&[
            "......", //
            "......", //
            "......", //
            "##....", //
            "######",
        ]);
        let probe = TraversalProbe::sample(&Rect::new(8, 0, 8, 24), false, &level);
        assert_eq!(probe.decide(), WalkDecision::ClimbDown);
    }

    #[test]
    fn drop_is_sampled_past_the_leading_edge() {
        let level = GridLevel::parse(&[
            "......", //
            "......", //
            "......", //
            "##....", //
            "######",
        ]);
        // Body still half over the ledge: keep walking.
        let probe = TraversalProbe::sample(&Rect::new(4, 0, 8, 24), false, &level);
        assert!(probe.ground_ahead);
        assert_eq!(probe.decide(), WalkDecision::Step);

        let probe = TraversalProbe::sample(&Rect::new(8, 0, 8, 24), false, &level);
        assert!(!probe.ground_ahead);

        // Facing left off the right end of the upper floor.
        let level = GridLevel::parse(&[
            "......", //
            "......", //
            "......", //
            "....##", //
            "######",
        ]);
        let probe = TraversalProbe::sample(&Rect::new(36, 0, 8, 24), true, &level);
        assert_eq!(probe.decide(), WalkDecision::Step);
        let probe = TraversalProbe::sample(&Rect::new(32, 0, 8, 24), true, &level);
        assert_eq!(probe.decide(), WalkDecision::ClimbDown);
    }

    #[test]
    fn walking_into_step_switches_to_climb_up_with_reset_animation() {
        let mut level = step_level();
        let mut machine = walking_machine();
        let mut bounds = Rect::new(16, 8, 8, 24);

        machine.update(ENTITY, &mut bounds, false, false, &mut level);

        assert_eq!(machine.kind(), ActionKind::ClimbingUp);
        assert!(machine.is_locked());
        assert_eq!(machine.current_animation().current_frame(), 0);
        assert_eq!(
            machine.current_animation().cycle_remaining(),
            machine.current_animation().cycle_duration()
        );
        assert_eq!(bounds, Rect::new(16, 8, 8, 24));
    }

    #[test]
    fn open_floor_steps_one_pixel_in_facing_direction() {
        let mut level = step_level();
        let mut machine = ActionMachine::new(animations());
        machine.apply(ENTITY, ActionRequest::Walk { facing_left: true });
        let mut bounds = Rect::new(16, 8, 8, 24);

        machine.update(ENTITY, &mut bounds, true, false, &mut level);
        assert_eq!(bounds.x, 15);
        assert_eq!(machine.kind(), ActionKind::Walking);
        assert!(machine.current_animation().is_flipped());
    }

    #[test]
    fn climb_eases_camera_halfway_and_stays_locked() {
        let mut level = step_level();
        let mut machine = walking_machine();
        let mut bounds = Rect::new(16, 8, 8, 24);
        machine.update(ENTITY, &mut bounds, false, true, &mut level);

        let total = machine.current_animation().cycle_duration();
        for _ in 0..total / 2 {
            machine.update(ENTITY, &mut bounds, false, true, &mut level);
        }
        assert_eq!(machine.current_animation().cycle_remaining(), total / 2);

        // Origin center is (20, 20); half of the (+8, -8) climb is (+4, -4).
        let (x, y) = *level.centered.last().expect("camera eased");
        assert!((x - 24).abs() <= 1, "x = {x}");
        assert!((y - 16).abs() <= 1, "y = {y}");

        assert!(!machine.apply(ENTITY, ActionRequest::Idle));
        assert_eq!(machine.kind(), ActionKind::ClimbingUp);
        assert_eq!(bounds, Rect::new(16, 8, 8, 24));
    }

    #[test]
    fn completed_climb_snaps_one_tile_diagonally_and_unlocks() {
        let mut level = step_level();
        let mut machine = walking_machine();
        let mut bounds = Rect::new(16, 8, 8, 24);
        machine.update(ENTITY, &mut bounds, false, true, &mut level);

        let total = machine.current_animation().cycle_duration();
        for _ in 0..total {
            machine.update(ENTITY, &mut bounds, false, true, &mut level);
        }

        assert_eq!(bounds, Rect::new(24, 0, 8, 24));
        assert_eq!(machine.kind(), ActionKind::Walking);
        assert!(!machine.is_locked());
        assert_eq!(level.centered.last(), Some(&(28, 12)));
        assert!(machine.apply(ENTITY, ActionRequest::Idle));
        assert_eq!(machine.kind(), ActionKind::Idle);
    }

    #[test]
    fn climb_down_moves_forward_and_down() {
        let mut level = GridLevel::parse(&[
            "......", //
            "......", //
            "......", //
            "##....", //
            "######",
        ]);
        let mut machine = walking_machine();
        let mut bounds = Rect::new(8, 0, 8, 24);
        machine.update(ENTITY, &mut bounds, false, false, &mut level);
        assert_eq!(machine.kind(), ActionKind::ClimbingDown);

        let total = machine.current_animation().cycle_duration();
        for _ in 0..total {
            machine.update(ENTITY, &mut bounds, false, false, &mut level);
        }
        assert_eq!(bounds, Rect::new(16, 8, 8, 24));
        assert!(level.centered.is_empty());
    }

    #[test]
    fn idle_never_moves() {
        let mut level = step_level();
        let mut machine = ActionMachine::new(animations());
        let mut bounds = Rect::new(16, 8, 8, 24);
        for _ in 0..10 {
            machine.update(ENTITY, &mut bounds, false, true, &mut level);
        }
        assert_eq!(bounds, Rect::new(16, 8, 8, 24));
        assert!(level.centered.is_empty());
    }
}
