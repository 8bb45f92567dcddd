use super::geometry::Rect;
use super::level::{Camera, LevelContext};
use super::node::{Node, NodeFlags};

/// Downward pixels applied to every gravity node once per tick.
pub const GRAVITY_PER_TICK: i32 = 2;

/// What a child sees while it updates: its siblings (read-only, split around
/// the child) and the camera of the level it lives in.
pub struct TickContext<'a> {
    pub before: &'a [Node],
    pub after: &'a [Node],
    pub camera: &'a mut Camera,
    pub rollbacks: &'a mut u32,
}

impl LevelContext for TickContext<'_> {
    fn solid_at(&self, x: i32, y: i32) -> bool {
        self.before
            .iter()
            .chain(self.after.iter())
            .any(|sibling| sibling.solid_at(x, y))
    }

    fn center_camera(&mut self, x: i32, y: i32) {
        self.camera.center_on(x, y);
    }

    fn camera(&self) -> Rect {
        self.camera.view()
    }
}

/// True when `child` is collidable and overlaps any solid sibling.
pub fn check_child_collisions(child: &Node, before: &[Node], after: &[Node]) -> bool {
    if !child.is_collidable() {
        return false;
    }
    before
        .iter()
        .chain(after.iter())
        .any(|sibling| sibling.is_solid() && sibling.collides_with(child))
}

/// Update one child with two independent rollback passes: the child's own
/// movement, then one gravity step from wherever the movement left it.
pub fn update_child(children: &mut [Node], index: usize, camera: &mut Camera, rollbacks: &mut u32) {
    let (before, rest) = children.split_at_mut(index);
    let (current, after) = rest.split_at_mut(1);
    let child = &mut current[0];
    let before: &[Node] = before;
    let after: &[Node] = after;

    let old = child.bounds;
    {
        let mut ctx = TickContext {
            before,
            after,
            camera: &mut *camera,
            rollbacks: &mut *rollbacks,
        };
        child.update(&mut ctx);
    }
    if check_child_collisions(child, before, after) {
        child.bounds = old;
        *rollbacks = rollbacks.saturating_add(1);
    }

    if child.flags.contains(NodeFlags::GRAVITY) {
        let settled = child.bounds;
        child.bounds.y += GRAVITY_PER_TICK;
        if check_child_collisions(child, before, after) {
            child.bounds = settled;
        }
    }
}

pub fn resolve_children(children: &mut [Node], camera: &mut Camera, rollbacks: &mut u32) {
    for index in 0..children.len() {
        update_child(children, index, camera, rollbacks);
    }
}
