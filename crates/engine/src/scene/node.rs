use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::canvas::{world_to_screen, Canvas, RenderPass, DEBUG_BOUNDS_COLOR};
use super::entity::Entity;
use super::geometry::Rect;
use super::interaction::Interactive;
use super::level::{Level, LevelSet};
use super::resolver::{resolve_children, TickContext};
use super::tilemap::{TileLayer, Tilemap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Capability bits carried by every node.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const COLLIDABLE: Self = Self(1 << 0);
    pub const SOLID: Self = Self(1 << 1);
    pub const VISIBLE: Self = Self(1 << 2);
    pub const ALWAYS_VISIBLE: Self = Self(1 << 3);
    pub const GRAVITY: Self = Self(1 << 4);
    pub const INTERACTIVE: Self = Self(1 << 5);
    pub const AUTOMATIC_INTERACTION: Self = Self(1 << 6);
    pub const PENDING_REMOVAL: Self = Self(1 << 7);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::COLLIDABLE, "COLLIDABLE"),
        (Self::SOLID, "SOLID"),
        (Self::VISIBLE, "VISIBLE"),
        (Self::ALWAYS_VISIBLE, "ALWAYS_VISIBLE"),
        (Self::GRAVITY, "GRAVITY"),
        (Self::INTERACTIVE, "INTERACTIVE"),
        (Self::AUTOMATIC_INTERACTION, "AUTOMATIC_INTERACTION"),
        (Self::PENDING_REMOVAL, "PENDING_REMOVAL"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}

/// Per-variant node state.
#[derive(Debug)]
pub enum NodeKind {
    Group,
    LevelSet(LevelSet),
    Level(Level),
    Tilemap(Tilemap),
    TileLayer(TileLayer),
    Entity(Entity),
    Interactive(Interactive),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::LevelSet(_) => "level_set",
            NodeKind::Level(_) => "level",
            NodeKind::Tilemap(_) => "tilemap",
            NodeKind::TileLayer(_) => "tile_layer",
            NodeKind::Entity(_) => "entity",
            NodeKind::Interactive(_) => "interactive",
        }
    }
}

/// Scene tree element. A node exclusively owns its children; `parent` is a
/// plain id stamped at attach time.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    pub bounds: Rect,
    pub flags: NodeFlags,
    pub kind: NodeKind,
    children: Vec<Node>,
}

impl Node {
    pub fn new(id: NodeId, bounds: Rect, flags: NodeFlags, kind: NodeKind) -> Self {
        Self {
            id,
            parent: None,
            bounds,
            flags,
            kind,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Take ownership of `child` and return its index in the child list.
    pub fn add_child(&mut self, mut child: Node) -> usize {
        child.parent = Some(self.id);
        self.children.push(child);
        self.children.len() - 1
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    /// Child at `index`. Panics on a missing child; callers only hold indices
    /// returned by `add_child`.
    pub fn child(&self, index: usize) -> &Node {
        &self.children[index]
    }

    pub fn child_mut(&mut self, index: usize) -> &mut Node {
        &mut self.children[index]
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Pre-order visit of this node and every descendant.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Node)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    pub fn is_solid(&self) -> bool {
        self.flags.contains(NodeFlags::SOLID)
    }

    pub fn is_collidable(&self) -> bool {
        self.flags.contains(NodeFlags::COLLIDABLE)
    }

    pub fn is_visible(&self, camera: &Rect) -> bool {
        self.flags.contains(NodeFlags::ALWAYS_VISIBLE)
            || (self.flags.contains(NodeFlags::VISIBLE) && self.bounds.intersects(camera))
    }

    pub fn mark_for_removal(&mut self) {
        self.flags.insert(NodeFlags::PENDING_REMOVAL);
    }

    pub fn is_pending_removal(&self) -> bool {
        self.flags.contains(NodeFlags::PENDING_REMOVAL)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match &self.kind {
            NodeKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match &mut self.kind {
            NodeKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_level(&self) -> Option<&Level> {
        match &self.kind {
            NodeKind::Level(level) => Some(level),
            _ => None,
        }
    }

    pub fn as_level_mut(&mut self) -> Option<&mut Level> {
        match &mut self.kind {
            NodeKind::Level(level) => Some(level),
            _ => None,
        }
    }

    fn solid_layer(&self, map: &Tilemap) -> Option<&Node> {
        map.solid_layer.and_then(|index| self.children.get(index))
    }

    /// Point solidity. Tile layers answer from their grid, tilemaps from their
    /// solid layer, every other node from its own bounds or any child.
    pub fn solid_at(&self, x: i32, y: i32) -> bool {
        match &self.kind {
            NodeKind::TileLayer(layer) => layer.solid_at(x, y),
            NodeKind::Tilemap(map) => self
                .solid_layer(map)
                .is_some_and(|layer| layer.solid_at(x, y)),
            _ => {
                (self.is_solid() && self.bounds.contains_point(x, y))
                    || self.children.iter().any(|child| child.solid_at(x, y))
            }
        }
    }

    pub fn collides_with(&self, other: &Node) -> bool {
        match &self.kind {
            NodeKind::TileLayer(layer) => layer.collides_with(other),
            NodeKind::Tilemap(map) => self
                .solid_layer(map)
                .is_some_and(|layer| layer.collides_with(other)),
            _ => self.is_collidable() && self.bounds.intersects(&other.bounds),
        }
    }

    pub fn collides_with_rect(&self, rect: &Rect) -> bool {
        self.is_collidable() && self.bounds.intersects(rect)
    }

    /// Per-tick hook. Levels swap in their own camera, level sets only run
    /// the active level, entities run their behavior before their children.
    pub fn update(&mut self, ctx: &mut TickContext<'_>) {
        let Node {
            id,
            bounds,
            kind,
            children,
            ..
        } = self;

        match kind {
            NodeKind::LevelSet(set) => {
                if let Some(level) = children.get_mut(set.active()) {
                    level.update(ctx);
                }
            }
            NodeKind::Level(level) => {
                level.follow_camera_target(children);
                resolve_children(children, level.camera_mut(), ctx.rollbacks);
            }
            NodeKind::Entity(entity) => {
                entity.update(*id, bounds, ctx);
                resolve_children(children, ctx.camera, ctx.rollbacks);
            }
            _ => resolve_children(children, ctx.camera, ctx.rollbacks),
        }
    }

    pub fn render(&self, canvas: &mut dyn Canvas, pass: &RenderPass) {
        match &self.kind {
            NodeKind::LevelSet(set) => {
                if let Some(level) = self.children.get(set.active()) {
                    level.render(canvas, pass);
                }
                return;
            }
            NodeKind::Level(level) => {
                let inner = pass.with_camera(level.camera().view());
                for child in &self.children {
                    child.render(canvas, &inner);
                }
                return;
            }
            _ => {}
        }

        if self.is_visible(&pass.camera) {
            match &self.kind {
                NodeKind::TileLayer(layer) => layer.draw(canvas, &pass.camera),
                NodeKind::Entity(entity) => entity.draw(canvas, &self.bounds, &pass.camera),
                _ => {}
            }
            if pass.debug_bounds {
                canvas.outline_rect(world_to_screen(self.bounds, &pass.camera), DEBUG_BOUNDS_COLOR);
            }
        }

        for child in &self.children {
            child.render(canvas, pass);
        }
    }

    /// Overlay pass drawn after every main pass, regardless of depth.
    pub fn render_foreground(&self, canvas: &mut dyn Canvas, pass: &RenderPass) {
        match &self.kind {
            NodeKind::LevelSet(set) => {
                if let Some(level) = self.children.get(set.active()) {
                    level.render_foreground(canvas, pass);
                }
                return;
            }
            NodeKind::Level(level) => {
                let inner = pass.with_camera(level.camera().view());
                for child in &self.children {
                    child.render_foreground(canvas, &inner);
                }
                return;
            }
            NodeKind::Interactive(interactive) => {
                interactive.draw_prompt(canvas, &self.bounds, &pass.camera);
            }
            _ => {}
        }

        for child in &self.children {
            child.render_foreground(canvas, pass);
        }
    }

    /// Drop every descendant flagged for removal. Returns how many nodes were
    /// dropped, counting removed subtrees.
    pub fn compact_removed(&mut self) -> usize {
        let mut removed = 0;
        self.children.retain(|child| {
            if child.is_pending_removal() {
                removed += 1 + child.descendant_count();
                false
            } else {
                true
            }
        });
        for child in &mut self.children {
            removed += child.compact_removed();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::canvas::recording::{DrawOp, RecordingCanvas};
    use crate::scene::tilemap::{TileGrid, TileLayer};

    fn group(id: u64, bounds: Rect, flags: NodeFlags) -> Node {
        Node::new(NodeId::new(id), bounds, flags, NodeKind::Group)
    }

    #[test]
    fn allocator_hands_out_sequential_ids() {
        let mut allocator = NodeIdAllocator::default();
        assert_eq!(allocator.allocate().get(), 0);
        assert_eq!(allocator.allocate().get(), 1);
        assert_eq!(allocator.allocate().get(), 2);
    }

    #[test]
    fn flags_insert_remove_and_contain() {
        let mut flags = NodeFlags::COLLIDABLE | NodeFlags::GRAVITY;
        assert!(flags.contains(NodeFlags::COLLIDABLE));
        assert!(!flags.contains(NodeFlags::SOLID));
        assert!(!flags.contains(NodeFlags::COLLIDABLE | NodeFlags::SOLID));

        flags.set(NodeFlags::SOLID, true);
        flags.remove(NodeFlags::GRAVITY);
        assert!(flags.contains(NodeFlags::COLLIDABLE | NodeFlags::SOLID));
        assert!(!flags.contains(NodeFlags::GRAVITY));
        assert_eq!(format!("{flags:?}"), "{COLLIDABLE, SOLID}");
    }

    #[test]
    fn add_child_returns_index_and_stamps_parent() {
        let mut parent = group(1, Rect::default(), NodeFlags::empty());
        let first = parent.add_child(group(2, Rect::default(), NodeFlags::empty()));
        let second = parent.add_child(group(3, Rect::default(), NodeFlags::empty()));

        assert_eq!((first, second), (0, 1));
        assert_eq!(parent.child(1).id(), NodeId::new(3));
        assert_eq!(parent.child(0).parent(), Some(NodeId::new(1)));
    }

    #[test]
    #[should_panic]
    fn missing_child_index_panics() {
        let parent = group(1, Rect::default(), NodeFlags::empty());
        let _ = parent.child(0);
    }

    #[test]
    fn find_reaches_any_depth() {
        let mut grandchild_parent = group(2, Rect::default(), NodeFlags::empty());
        grandchild_parent.add_child(group(3, Rect::new(5, 5, 1, 1), NodeFlags::empty()));
        let mut root = group(1, Rect::default(), NodeFlags::empty());
        root.add_child(grandchild_parent);

        assert_eq!(
            root.find(NodeId::new(3)).map(|node| node.bounds),
            Some(Rect::new(5, 5, 1, 1))
        );
        assert!(root.find(NodeId::new(9)).is_none());

        let mut visited = Vec::new();
        root.walk(&mut |node| visited.push(node.id().get()));
        assert_eq!(visited, vec![1, 2, 3]);
    }

    #[test]
    fn visibility_respects_camera_unless_always_visible() {
        let camera = Rect::new(0, 0, 128, 64);
        let offscreen = Rect::new(200, 0, 8, 8);

        assert!(!group(1, offscreen, NodeFlags::VISIBLE).is_visible(&camera));
        assert!(group(1, offscreen, NodeFlags::ALWAYS_VISIBLE).is_visible(&camera));
        assert!(group(1, Rect::new(10, 10, 8, 8), NodeFlags::VISIBLE).is_visible(&camera));
        assert!(!group(1, Rect::new(10, 10, 8, 8), NodeFlags::empty()).is_visible(&camera));
    }

    #[test]
    fn default_collision_needs_collidable_and_overlap() {
        let a = group(1, Rect::new(0, 0, 8, 8), NodeFlags::COLLIDABLE);
        let touching = group(2, Rect::new(8, 0, 8, 8), NodeFlags::COLLIDABLE);
        let overlapping = group(3, Rect::new(7, 7, 8, 8), NodeFlags::empty());

        assert!(!a.collides_with(&touching));
        assert!(a.collides_with(&overlapping));
        assert!(!overlapping.collides_with(&a));
    }

    #[test]
    fn default_solid_at_checks_bounds_then_children() {
        let mut wall = group(1, Rect::new(0, 0, 8, 8), NodeFlags::SOLID);
        wall.add_child(group(2, Rect::new(16, 0, 8, 8), NodeFlags::SOLID));

        assert!(wall.solid_at(0, 0));
        assert!(!wall.solid_at(8, 0));
        assert!(wall.solid_at(20, 4));
    }

    #[test]
    fn tilemap_delegates_to_its_solid_layer() {
        let backdrop = TileLayer::new(TileGrid::new(1, 1, vec![0]).expect("grid"), 8, false)
            .expect("layer");
        let solid = TileLayer::new(TileGrid::new(2, 1, vec![-1, 0]).expect("grid"), 8, true)
            .expect("layer");

        let mut map = Node::new(
            NodeId::new(1),
            Rect::new(0, 0, 16, 8),
            NodeFlags::SOLID,
            NodeKind::Tilemap(Tilemap { solid_layer: None }),
        );
        map.add_child(Node::new(
            NodeId::new(2),
            backdrop.bounds(),
            NodeFlags::VISIBLE,
            NodeKind::TileLayer(backdrop),
        ));
        let solid_index = map.add_child(Node::new(
            NodeId::new(3),
            solid.bounds(),
            NodeFlags::VISIBLE,
            NodeKind::TileLayer(solid),
        ));

        let body = group(4, Rect::new(10, 0, 4, 4), NodeFlags::COLLIDABLE);
        assert!(!map.solid_at(12, 4));
        assert!(!map.collides_with(&body));

        map.kind = NodeKind::Tilemap(Tilemap {
            solid_layer: Some(solid_index),
        });
        assert!(map.solid_at(12, 4));
        assert!(!map.solid_at(4, 4));
        assert!(map.collides_with(&body));
    }

    #[test]
    fn compaction_drops_flagged_subtrees() {
        let mut root = group(1, Rect::default(), NodeFlags::empty());
        let mut doomed = group(2, Rect::default(), NodeFlags::empty());
        doomed.add_child(group(3, Rect::default(), NodeFlags::empty()));
        doomed.mark_for_removal();
        root.add_child(doomed);
        let mut kept = group(4, Rect::default(), NodeFlags::empty());
        let mut nested = group(5, Rect::default(), NodeFlags::empty());
        nested.mark_for_removal();
        kept.add_child(nested);
        root.add_child(kept);

        assert_eq!(root.compact_removed(), 3);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.child(0).id(), NodeId::new(4));
        assert!(root.child(0).children().is_empty());
    }

    #[test]
    fn render_outlines_visible_bounds_in_debug_mode() {
        let mut root = group(1, Rect::new(0, 0, 8, 8), NodeFlags::VISIBLE);
        root.add_child(group(2, Rect::new(500, 0, 8, 8), NodeFlags::VISIBLE));
        let pass = RenderPass {
            camera: Rect::new(-4, 0, 128, 64),
            debug_bounds: true,
        };

        let mut canvas = RecordingCanvas::default();
        root.render(&mut canvas, &pass);
        assert_eq!(
            canvas.ops,
            vec![DrawOp::Outline(Rect::new(4, 0, 8, 8), DEBUG_BOUNDS_COLOR)]
        );
    }
}
