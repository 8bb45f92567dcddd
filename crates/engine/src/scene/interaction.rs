use tracing::debug;

use super::canvas::{world_to_screen, Canvas, PROMPT_BACKGROUND_COLOR, PROMPT_GLYPH_COLOR};
use super::geometry::{center_distance_squared, Rect};
use super::node::{Node, NodeFlags, NodeId, NodeKind};

pub const DOOR_RADIUS_PX: i32 = 8;
pub const SERVE_RADIUS_PX: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKey {
    E,
    W,
    A,
    S,
    D,
}

impl InteractionKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "E" | "e" => Some(Self::E),
            "W" | "w" => Some(Self::W),
            "A" | "a" => Some(Self::A),
            "S" | "s" => Some(Self::S),
            "D" | "d" => Some(Self::D),
            _ => None,
        }
    }

    // 3x5 bitmap, one row per entry, most significant of the low three bits on the left.
    fn glyph(self) -> [u8; 5] {
        match self {
            Self::E => [0b111, 0b100, 0b111, 0b100, 0b111],
            Self::W => [0b101, 0b101, 0b101, 0b111, 0b101],
            Self::A => [0b010, 0b101, 0b111, 0b101, 0b101],
            Self::S => [0b111, 0b100, 0b111, 0b001, 0b111],
            Self::D => [0b110, 0b101, 0b101, 0b101, 0b110],
        }
    }
}

/// How an interactive node fires `Entered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Once per key press while the actor is in range.
    Key(InteractionKey),
    /// Every tick the actor stays in range.
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionTarget {
    Door {
        level: usize,
        spawn_x: i32,
        spawn_y: i32,
    },
    ServeDrink,
    Notify(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPhase {
    Entered,
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionEvent {
    pub source: NodeId,
    /// Parent of the interactive node, the thing being interacted with.
    pub owner: Option<NodeId>,
    pub phase: InteractionPhase,
    pub target: InteractionTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interactive {
    activation: Activation,
    radius: i32,
    in_range: bool,
    target: InteractionTarget,
}

impl Interactive {
    pub fn new(activation: Activation, radius: i32, target: InteractionTarget) -> Self {
        Self {
            activation,
            radius: radius.max(0),
            in_range: false,
            target,
        }
    }

    pub fn door(key: InteractionKey, level: usize, spawn_x: i32, spawn_y: i32) -> Self {
        Self::new(
            Activation::Key(key),
            DOOR_RADIUS_PX,
            InteractionTarget::Door {
                level,
                spawn_x,
                spawn_y,
            },
        )
    }

    pub fn serve_drink() -> Self {
        Self::new(
            Activation::Automatic,
            SERVE_RADIUS_PX,
            InteractionTarget::ServeDrink,
        )
    }

    /// Flags an interactive node needs for dispatch to see it.
    pub fn node_flags(&self) -> NodeFlags {
        match self.activation {
            Activation::Key(_) => NodeFlags::INTERACTIVE,
            Activation::Automatic => NodeFlags::INTERACTIVE | NodeFlags::AUTOMATIC_INTERACTION,
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn radius(&self) -> i32 {
        self.radius
    }

    pub fn target(&self) -> &InteractionTarget {
        &self.target
    }

    pub fn can_interact(&self) -> bool {
        self.in_range
    }

    pub fn is_automatic(&self) -> bool {
        self.activation == Activation::Automatic
    }

    /// Clear the range flag. Returns whether it was set.
    pub(crate) fn reset_range(&mut self) -> bool {
        std::mem::replace(&mut self.in_range, false)
    }

    /// Recompute range against the actor. Returns `Exited` on the
    /// in-range to out-of-range edge, and `Entered` on every in-range tick
    /// for automatic nodes.
    pub fn update_proximity(&mut self, own: &Rect, actor: &Rect) -> Option<InteractionPhase> {
        let radius = i64::from(self.radius);
        let now_in_range = center_distance_squared(own, actor) <= radius * radius;
        let was_in_range = self.in_range;
        self.in_range = now_in_range;

        if was_in_range && !now_in_range {
            Some(InteractionPhase::Exited)
        } else if now_in_range && self.is_automatic() {
            Some(InteractionPhase::Entered)
        } else {
            None
        }
    }

    pub fn accepts_key(&self, key: InteractionKey) -> bool {
        self.in_range && self.activation == Activation::Key(key)
    }

    /// Key prompt drawn centered above the node while the actor is in range.
    pub(crate) fn draw_prompt(&self, canvas: &mut dyn Canvas, bounds: &Rect, camera: &Rect) {
        let Activation::Key(key) = self.activation else {
            return;
        };
        if !self.in_range {
            return;
        }

        let (cx, _) = bounds.center();
        let frame = Rect::new(cx - 3, bounds.y - 9, 5, 7);
        let screen = world_to_screen(frame, camera);
        canvas.fill_rect(screen, PROMPT_BACKGROUND_COLOR);
        for (row, bits) in key.glyph().into_iter().enumerate() {
            for column in 0..3 {
                if bits & (0b100 >> column) != 0 {
                    canvas.fill_rect(
                        Rect::new(screen.x + 1 + column, screen.y + 1 + row as i32, 1, 1),
                        PROMPT_GLYPH_COLOR,
                    );
                }
            }
        }
    }
}

/// Proximity pass over `root`'s subtree against one actor snapshot.
pub fn dispatch_proximity(root: &mut Node, actor: &Rect, events: &mut Vec<InteractionEvent>) {
    root.walk_mut(&mut |node| {
        if !node.flags.contains(NodeFlags::INTERACTIVE) {
            return;
        }
        let (source, owner, bounds) = (node.id(), node.parent(), node.bounds);
        let NodeKind::Interactive(interactive) = &mut node.kind else {
            return;
        };
        if let Some(phase) = interactive.update_proximity(&bounds, actor) {
            let event = InteractionEvent {
                source,
                owner,
                phase,
                target: interactive.target().clone(),
            };
            log_event(&event);
            events.push(event);
        }
    });
}

/// Key press delivered to every in-range key-style node under `root`.
pub fn dispatch_key(root: &Node, key: InteractionKey, events: &mut Vec<InteractionEvent>) {
    root.walk(&mut |node| {
        if !node.flags.contains(NodeFlags::INTERACTIVE) {
            return;
        }
        let NodeKind::Interactive(interactive) = &node.kind else {
            return;
        };
        if interactive.accepts_key(key) {
            let event = InteractionEvent {
                source: node.id(),
                owner: node.parent(),
                phase: InteractionPhase::Entered,
                target: interactive.target().clone(),
            };
            log_event(&event);
            events.push(event);
        }
    });
}

pub(crate) fn reset_ranges(root: &mut Node) {
    root.walk_mut(&mut |node| {
        if let NodeKind::Interactive(interactive) = &mut node.kind {
            interactive.reset_range();
        }
    });
}

/// Close every open range under `root`, reporting each as `Exited`.
pub(crate) fn release_ranges(root: &mut Node, events: &mut Vec<InteractionEvent>) {
    root.walk_mut(&mut |node| {
        let (source, owner) = (node.id(), node.parent());
        let NodeKind::Interactive(interactive) = &mut node.kind else {
            return;
        };
        if interactive.reset_range() {
            let event = InteractionEvent {
                source,
                owner,
                phase: InteractionPhase::Exited,
                target: interactive.target().clone(),
            };
            log_event(&event);
            events.push(event);
        }
    });
}

fn log_event(event: &InteractionEvent) {
    match event.phase {
        InteractionPhase::Entered => debug!(
            source = %event.source,
            owner = ?event.owner,
            target = ?event.target,
            "interaction_entered"
        ),
        InteractionPhase::Exited => debug!(
            source = %event.source,
            owner = ?event.owner,
            target = ?event.target,
            "interaction_exited"
        ),
    }
}
