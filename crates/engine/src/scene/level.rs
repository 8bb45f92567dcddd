use super::geometry::Rect;
use super::node::{Node, NodeId};

/// Capabilities a node may use from the level it lives in while updating.
pub trait LevelContext {
    fn solid_at(&self, x: i32, y: i32) -> bool;
    fn center_camera(&mut self, x: i32, y: i32);
    fn camera(&self) -> Rect;
}

/// Fixed-size view clamped inside `max_bounds`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Camera {
    view: Rect,
    max_bounds: Rect,
}

impl Camera {
    pub fn new(view: Rect, max_bounds: Rect) -> Self {
        let mut camera = Self { view, max_bounds };
        camera.clamp();
        camera
    }

    pub fn view(&self) -> Rect {
        self.view
    }

    pub fn max_bounds(&self) -> Rect {
        self.max_bounds
    }

    pub fn set_max_bounds(&mut self, max_bounds: Rect) {
        self.max_bounds = max_bounds;
        self.clamp();
    }

    pub fn center_on(&mut self, x: i32, y: i32) {
        self.view.x = x - self.view.w / 2;
        self.view.y = y - self.view.h / 2;
        self.clamp();
    }

    fn clamp(&mut self) {
        self.view.x = clamp_axis(self.view.x, self.view.w, self.max_bounds.x, self.max_bounds.w);
        self.view.y = clamp_axis(self.view.y, self.view.h, self.max_bounds.y, self.max_bounds.h);
    }
}

// A view wider than the bounds pins to the bounds origin.
fn clamp_axis(position: i32, extent: i32, min: i32, span: i32) -> i32 {
    let max = min + span - extent;
    if max <= min {
        min
    } else {
        position.clamp(min, max)
    }
}

/// A playable map: its own camera plus the nodes registered for camera
/// follow and interaction distance checks.
#[derive(Debug, Clone)]
pub struct Level {
    name: String,
    camera: Camera,
    actor: Option<NodeId>,
    camera_target: Option<NodeId>,
}

impl Level {
    pub fn new(name: impl Into<String>, camera: Camera) -> Self {
        Self {
            name: name.into(),
            camera,
            actor: None,
            camera_target: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Node whose position drives interaction range checks.
    pub fn actor(&self) -> Option<NodeId> {
        self.actor
    }

    pub fn register_actor(&mut self, actor: NodeId) {
        self.actor = Some(actor);
    }

    pub fn camera_target(&self) -> Option<NodeId> {
        self.camera_target
    }

    pub fn register_camera_target(&mut self, target: NodeId) {
        self.camera_target = Some(target);
    }

    pub(crate) fn follow_camera_target(&mut self, children: &[Node]) {
        let Some(target) = self.camera_target else {
            return;
        };
        if let Some(node) = children.iter().find_map(|child| child.find(target)) {
            let (x, y) = node.bounds.center();
            self.camera.center_on(x, y);
        }
    }
}

/// Root payload: owns every level, only the active one runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelSet {
    active: usize,
}

impl LevelSet {
    pub fn new(active: usize) -> Self {
        Self { active }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: usize) {
        self.active = active;
    }
}
