use tracing::{debug, info, warn};

use crate::app::{InputAction, InputEvent};

use super::action::ActionRequest;
use super::canvas::{Canvas, RenderPass};
use super::interaction::{
    dispatch_key, dispatch_proximity, release_ranges, reset_ranges, InteractionEvent,
    InteractionKey, InteractionPhase, InteractionTarget,
};
use super::level::{Camera, Level};
use super::node::{Node, NodeId, NodeKind};
use super::resolver::TickContext;

/// What one tick did, for the driver's logs and metrics.
#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<InteractionEvent>,
    pub rollbacks: u32,
    pub removed: usize,
    pub switched_to: Option<usize>,
}

/// Owns the root level set and runs the per-tick sequence: update and
/// collision, interaction dispatch, event delivery, removal compaction.
#[derive(Debug)]
pub struct SceneTree {
    root: Node,
    held_left: bool,
    held_right: bool,
}

impl SceneTree {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            held_left: false,
            held_right: false,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.root.find(id)
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.root.find_mut(id)
    }

    pub fn node_count(&self) -> usize {
        1 + self.root.descendant_count()
    }

    pub fn level_count(&self) -> usize {
        self.root.children().len()
    }

    pub fn active_level_index(&self) -> usize {
        match &self.root.kind {
            NodeKind::LevelSet(set) => set.active(),
            _ => 0,
        }
    }

    pub fn active_level(&self) -> Option<&Node> {
        self.root.children().get(self.active_level_index())
    }

    fn active_level_mut(&mut self) -> Option<&mut Node> {
        let index = self.active_level_index();
        self.root.children_mut().get_mut(index)
    }

    fn active_actor(&self) -> Option<NodeId> {
        self.active_level()
            .and_then(Node::as_level)
            .and_then(Level::actor)
    }

    pub fn mark_for_removal(&mut self, id: NodeId) -> bool {
        match self.root.find_mut(id) {
            Some(node) => {
                node.mark_for_removal();
                true
            }
            None => false,
        }
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let mut camera = Camera::default();
        {
            let mut ctx = TickContext {
                before: &[],
                after: &[],
                camera: &mut camera,
                rollbacks: &mut report.rollbacks,
            };
            self.root.update(&mut ctx);
        }

        self.dispatch_proximity(&mut report.events);
        report.switched_to = self.deliver(&mut report.events);

        report.removed = self.root.compact_removed();
        if report.removed > 0 {
            debug!(removed = report.removed, "nodes_compacted");
        }
        report
    }

    fn dispatch_proximity(&mut self, events: &mut Vec<InteractionEvent>) {
        let Some(actor) = self.active_actor() else {
            return;
        };
        let Some(level) = self.active_level_mut() else {
            return;
        };
        // Single snapshot for the whole pass.
        let Some(actor_bounds) = level.find(actor).map(|node| node.bounds) else {
            return;
        };
        dispatch_proximity(level, &actor_bounds, events);
    }

    /// Forward one input edge. Directional presses steer the active level's
    /// actor; key presses reach in-range interactive nodes immediately.
    pub fn handle_input(&mut self, input: InputEvent) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        match input {
            InputEvent::Pressed(action) => {
                match action {
                    InputAction::MoveLeft => {
                        self.held_left = true;
                        self.request_actor(ActionRequest::Walk { facing_left: true });
                    }
                    InputAction::MoveRight => {
                        self.held_right = true;
                        self.request_actor(ActionRequest::Walk { facing_left: false });
                    }
                    _ => {}
                }
                if let Some(key) = interaction_key(action) {
                    if let Some(level) = self.active_level() {
                        dispatch_key(level, key, &mut events);
                    }
                    self.deliver(&mut events);
                }
            }
            InputEvent::Released(action) => {
                let request = match action {
                    InputAction::MoveLeft => {
                        self.held_left = false;
                        Some(self.held_direction_request())
                    }
                    InputAction::MoveRight => {
                        self.held_right = false;
                        Some(self.held_direction_request())
                    }
                    _ => None,
                };
                if let Some(request) = request {
                    self.request_actor(request);
                }
            }
        }
        events
    }

    fn held_direction_request(&self) -> ActionRequest {
        match (self.held_left, self.held_right) {
            (true, _) => ActionRequest::Walk { facing_left: true },
            (false, true) => ActionRequest::Walk { facing_left: false },
            (false, false) => ActionRequest::Idle,
        }
    }

    fn request_actor(&mut self, request: ActionRequest) {
        let Some(actor) = self.active_actor() else {
            return;
        };
        let Some(node) = self.root.find_mut(actor) else {
            return;
        };
        if let Some(entity) = node.as_entity_mut() {
            if entity.controllable {
                entity.request(actor, request);
            }
        }
    }

    /// Apply entered events in order, appending the exits caused by leaving a
    /// level. Returns the level switched to, if any.
    fn deliver(&mut self, events: &mut Vec<InteractionEvent>) -> Option<usize> {
        let mut switched_to = None;
        let mut exits = Vec::new();
        for event in events.iter() {
            if event.phase != InteractionPhase::Entered {
                continue;
            }
            match &event.target {
                InteractionTarget::Door {
                    level,
                    spawn_x,
                    spawn_y,
                } => {
                    if let Some(left) = self.switch_level(*level, *spawn_x, *spawn_y) {
                        exits.extend(left);
                        switched_to = Some(*level);
                    }
                }
                InteractionTarget::ServeDrink => {
                    let attendant = event
                        .owner
                        .and_then(|owner| self.root.find_mut(owner))
                        .and_then(Node::as_entity_mut)
                        .and_then(|entity| entity.attendant_mut());
                    if let Some(attendant) = attendant {
                        if attendant.serve() {
                            debug!(owner = ?event.owner, "attendant_serving");
                        }
                    }
                }
                InteractionTarget::Notify(label) => {
                    info!(source = %event.source, label = label.as_str(), "interaction_notified");
                }
            }
        }
        events.extend(exits);
        switched_to
    }

    /// Make `index` the active level and place its actor at the spawn point.
    /// Nodes left in range on the old level are closed and returned as
    /// `Exited` events; `None` when `index` names no level.
    pub fn switch_level(
        &mut self,
        index: usize,
        spawn_x: i32,
        spawn_y: i32,
    ) -> Option<Vec<InteractionEvent>> {
        if index >= self.level_count() {
            warn!(level = index, level_count = self.level_count(), "unknown_level_requested");
            return None;
        }
        let previous = self.active_level_index();
        let NodeKind::LevelSet(set) = &mut self.root.kind else {
            return None;
        };
        set.set_active(index);

        let mut exits = Vec::new();
        if let Some(old_level) = self.root.children_mut().get_mut(previous) {
            release_ranges(old_level, &mut exits);
        }

        let level_node = self.root.child_mut(index);
        reset_ranges(level_node);
        let actor = level_node.as_level().and_then(Level::actor);
        let actor_center = actor
            .and_then(|id| level_node.find_mut(id))
            .map(|node| {
                node.bounds = node.bounds.with_position(spawn_x, spawn_y);
                node.bounds.center()
            });
        let name = match level_node.as_level_mut() {
            Some(level) => {
                if let Some((x, y)) = actor_center {
                    level.camera_mut().center_on(x, y);
                }
                level.name().to_string()
            }
            None => String::new(),
        };

        info!(
            level = index,
            name = name.as_str(),
            spawn_x,
            spawn_y,
            "level_switched"
        );
        Some(exits)
    }

    pub fn render(&self, canvas: &mut dyn Canvas, debug_bounds: bool) {
        let pass = RenderPass {
            debug_bounds,
            ..RenderPass::default()
        };
        self.root.render(canvas, &pass);
        self.root.render_foreground(canvas, &pass);
    }

    /// Camera of the active level, in level pixels.
    pub fn active_camera(&self) -> Option<Camera> {
        self.active_level()
            .and_then(Node::as_level)
            .map(|level| *level.camera())
    }
}

fn interaction_key(action: InputAction) -> Option<InteractionKey> {
    match action {
        InputAction::Interact => Some(InteractionKey::E),
        InputAction::MoveUp => Some(InteractionKey::W),
        InputAction::MoveLeft => Some(InteractionKey::A),
        InputAction::MoveDown => Some(InteractionKey::S),
        InputAction::MoveRight => Some(InteractionKey::D),
        InputAction::Quit => None,
    }
}
