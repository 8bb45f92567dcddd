use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::scene::{
    ActionAnimations, ActionMachine, Activation, Animation, AnimationSpec, Attendant, Behavior,
    Camera, Entity, InteractionKey, InteractionTarget, Interactive, Level, LevelSet, Node,
    NodeFlags, NodeIdAllocator, NodeKind, PoolPlayer, Rect, SceneTree, SpriteSheet, Tilemap,
};

use super::error::LoadError;
use super::levels::{
    read_level_set, AttendantDef, DoorDef, LevelDef, LevelSetDef, NoticeDef, PlayerDef,
    PoolPlayerDef, PropDef, RowDef, TilemapDef, LEVELS_FILE_NAME,
};
use super::map::{MapFiles, TileGridProvider};
use super::resources::SharedResources;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBuildOptions {
    pub view_width: i32,
    pub view_height: i32,
    pub start_level: usize,
}

impl Default for SceneBuildOptions {
    fn default() -> Self {
        Self {
            view_width: 128,
            view_height: 64,
            start_level: 0,
        }
    }
}

/// Read `levels.json` under `assets_dir`, decode its sheets and build the
/// scene with maps resolved relative to the same directory.
pub fn load_scene(assets_dir: &Path, options: &SceneBuildOptions) -> Result<SceneTree, LoadError> {
    let defs = read_level_set(&assets_dir.join(LEVELS_FILE_NAME))?;
    let resources = SharedResources::load(assets_dir, &defs.sheets)?;
    let grids = MapFiles::new(assets_dir);
    build_scene(&defs, &grids, &resources, options)
}

pub fn build_scene(
    defs: &LevelSetDef,
    grids: &dyn TileGridProvider,
    resources: &SharedResources,
    options: &SceneBuildOptions,
) -> Result<SceneTree, LoadError> {
    if defs.levels.is_empty() {
        return Err(LoadError::NoLevels);
    }
    if options.start_level >= defs.levels.len() {
        return Err(LoadError::StartLevelOutOfRange {
            index: options.start_level,
            count: defs.levels.len(),
        });
    }

    let mut level_indices = HashMap::with_capacity(defs.levels.len());
    for (index, level) in defs.levels.iter().enumerate() {
        if level_indices.insert(level.name.as_str(), index).is_some() {
            return Err(LoadError::DuplicateLevel {
                name: level.name.clone(),
            });
        }
    }

    let mut builder = LevelBuilder {
        ids: NodeIdAllocator::default(),
        grids,
        resources,
        level_indices,
        view: Rect::new(0, 0, options.view_width, options.view_height),
    };
    let mut root = Node::new(
        builder.ids.allocate(),
        Rect::default(),
        NodeFlags::empty(),
        NodeKind::LevelSet(LevelSet::new(options.start_level)),
    );
    for (index, def) in defs.levels.iter().enumerate() {
        let level = builder.build_level(def)?;
        info!(
            level = index,
            name = def.name.as_str(),
            nodes = 1 + level.descendant_count(),
            width = level.bounds.w,
            height = level.bounds.h,
            "level_loaded"
        );
        root.add_child(level);
    }

    let tree = SceneTree::new(root);
    info!(
        levels = tree.level_count(),
        nodes = tree.node_count(),
        sheets = resources.len(),
        start_level = options.start_level,
        "scene_loaded"
    );
    Ok(tree)
}

struct LevelBuilder<'a> {
    ids: NodeIdAllocator,
    grids: &'a dyn TileGridProvider,
    resources: &'a SharedResources,
    level_indices: HashMap<&'a str, usize>,
    view: Rect,
}

impl LevelBuilder<'_> {
    fn build_level(&mut self, def: &LevelDef) -> Result<Node, LoadError> {
        let name = def.name.as_str();
        let mut level = Level::new(name, Camera::default());
        let mut children = Vec::new();

        for map in def.maps.iter().filter(|map| !map.foreground) {
            children.push(self.build_tilemap(name, map)?);
        }

        let player_def = def.player.as_ref().ok_or_else(|| LoadError::MissingPlayer {
            level: name.to_string(),
        })?;
        let player = self.build_player(name, player_def)?;
        let player_id = player.id();
        let player_center = player.bounds.center();
        level.register_actor(player_id);
        level.register_camera_target(player_id);
        children.push(player);

        for attendant in &def.attendants {
            children.push(self.build_attendant(name, attendant)?);
        }
        for pool_player in &def.pool_players {
            children.push(self.build_pool_player(name, pool_player)?);
        }
        for prop in &def.props {
            children.push(self.build_prop(name, prop)?);
        }
        for door in &def.doors {
            children.push(self.build_door(name, door)?);
        }
        for notice in &def.notices {
            children.push(self.build_notice(name, notice)?);
        }
        for map in def.maps.iter().filter(|map| map.foreground) {
            children.push(self.build_tilemap(name, map)?);
        }

        let bounds = level_extent(&children).unwrap_or(self.view);
        let mut camera = Camera::new(self.view, bounds);
        camera.center_on(player_center.0, player_center.1);
        *level.camera_mut() = camera;

        let mut node = Node::new(
            self.ids.allocate(),
            bounds,
            NodeFlags::empty(),
            NodeKind::Level(level),
        );
        for child in children {
            node.add_child(child);
        }
        Ok(node)
    }

    fn build_tilemap(&mut self, level: &str, def: &TilemapDef) -> Result<Node, LoadError> {
        let sheet = self.resources.resolve(level, def.tileset.as_deref())?;
        let solid_layer = def.solid_layer.filter(|index| *index < def.layers.len());

        let mut layers = Vec::with_capacity(def.layers.len());
        for (position, layer_index) in def.layers.iter().enumerate() {
            let solid = solid_layer == Some(position);
            let layer = self
                .grids
                .load_grid(&def.resource, *layer_index)?
                .into_layer(solid)
                .map_err(|source| LoadError::InvalidGrid {
                    path: PathBuf::from(&def.resource),
                    source,
                })?
                .with_sheet(sheet.clone());
            let flags = if solid {
                NodeFlags::COLLIDABLE | NodeFlags::SOLID | NodeFlags::ALWAYS_VISIBLE
            } else {
                NodeFlags::ALWAYS_VISIBLE
            };
            layers.push(Node::new(
                self.ids.allocate(),
                layer.bounds(),
                flags,
                NodeKind::TileLayer(layer),
            ));
        }

        let bounds = layers
            .get(solid_layer.unwrap_or(0))
            .map(|layer| layer.bounds)
            .unwrap_or_default();

        let flags = if solid_layer.is_some() {
            NodeFlags::SOLID | NodeFlags::ALWAYS_VISIBLE
        } else {
            NodeFlags::ALWAYS_VISIBLE
        };
        let mut map = Node::new(
            self.ids.allocate(),
            bounds,
            flags,
            NodeKind::Tilemap(Tilemap { solid_layer }),
        );
        for layer in layers {
            map.add_child(layer);
        }
        Ok(map)
    }

    fn build_player(&mut self, level: &str, def: &PlayerDef) -> Result<Node, LoadError> {
        let sheet = self.resources.resolve(level, def.sheet.as_deref())?;
        let frames = &def.animations;
        let animation = |row: &RowDef| {
            Animation::new(sheet.clone(), row.spec(frames.frame_width, frames.frame_height))
        };
        let animations = ActionAnimations {
            idle: animation(&frames.idle),
            walk: animation(&frames.walk),
            climb_up: animation(&frames.climb_up),
            climb_down: animation(&frames.climb_down),
        };

        let mut entity = Entity::new(Behavior::Actor(ActionMachine::new(animations)));
        entity.controllable = true;
        entity.camera_controlling = true;
        entity.facing_left = def.facing_left;
        Ok(Node::new(
            self.ids.allocate(),
            def.bounds(),
            NodeFlags::COLLIDABLE | NodeFlags::GRAVITY | NodeFlags::VISIBLE,
            NodeKind::Entity(entity),
        ))
    }

    fn build_attendant(&mut self, level: &str, def: &AttendantDef) -> Result<Node, LoadError> {
        let sheet = self.resources.resolve(level, def.sheet.as_deref())?;
        let frames = &def.animations;
        let animation = |row: &RowDef| {
            let mut animation =
                Animation::new(sheet.clone(), row.spec(frames.frame_width, frames.frame_height));
            animation.set_flipped(def.facing_left);
            animation
        };
        let attendant = Attendant::new(
            animation(&frames.serve),
            animation(&frames.walk),
            animation(&frames.idle),
        );

        let mut entity = Entity::new(Behavior::Attendant(attendant));
        entity.facing_left = def.facing_left;
        let bounds = def.bounds();
        let mut node = Node::new(
            self.ids.allocate(),
            bounds,
            NodeFlags::VISIBLE,
            NodeKind::Entity(entity),
        );
        let serve = Interactive::serve_drink();
        node.add_child(Node::new(
            self.ids.allocate(),
            bounds,
            serve.node_flags(),
            NodeKind::Interactive(serve),
        ));
        Ok(node)
    }

    fn build_pool_player(&mut self, level: &str, def: &PoolPlayerDef) -> Result<Node, LoadError> {
        let sheet = self.resources.resolve(level, def.sheet.as_deref())?;
        let frames = &def.animations;
        let animation = |row: &RowDef| {
            let mut animation =
                Animation::new(sheet.clone(), row.spec(frames.frame_width, frames.frame_height));
            animation.set_flipped(def.facing_left);
            animation
        };
        let pool_player = PoolPlayer::new(
            animation(&frames.shoot),
            animation(&frames.wait),
            animation(&frames.prepare),
        );

        let mut entity = Entity::new(Behavior::PoolPlayer(pool_player));
        entity.facing_left = def.facing_left;
        if let Some(color) = def.color {
            entity.placeholder_color = color;
        }
        Ok(Node::new(
            self.ids.allocate(),
            def.bounds(),
            NodeFlags::VISIBLE,
            NodeKind::Entity(entity),
        ))
    }

    fn build_prop(&mut self, level: &str, def: &PropDef) -> Result<Node, LoadError> {
        let sheet = self.resources.resolve(level, def.sheet.as_deref())?;
        let bounds = Rect::from(def.bounds);
        let animation = match (def.animation, sheet) {
            (Some(animation), sheet) => Some(Animation::new(sheet, animation.spec())),
            (None, Some(sheet)) => Some(still_frame(sheet)),
            (None, None) => None,
        };

        let mut entity = Entity::new(Behavior::Prop(animation));
        if let Some(color) = def.color {
            entity.placeholder_color = color;
        }
        let mut flags = NodeFlags::VISIBLE;
        flags.set(NodeFlags::SOLID | NodeFlags::COLLIDABLE, def.solid);
        flags.set(NodeFlags::GRAVITY, def.gravity);
        Ok(Node::new(
            self.ids.allocate(),
            bounds,
            flags,
            NodeKind::Entity(entity),
        ))
    }

    fn build_door(&mut self, level: &str, def: &DoorDef) -> Result<Node, LoadError> {
        let key = parse_key(level, &def.key)?;
        let target = self
            .level_indices
            .get(def.to.as_str())
            .copied()
            .ok_or_else(|| LoadError::UnknownLevel {
                level: level.to_string(),
                target: def.to.clone(),
            })?;
        let door = Interactive::door(key, target, def.spawn_x, def.spawn_y);
        Ok(Node::new(
            self.ids.allocate(),
            Rect::from(def.bounds),
            door.node_flags(),
            NodeKind::Interactive(door),
        ))
    }

    fn build_notice(&mut self, level: &str, def: &NoticeDef) -> Result<Node, LoadError> {
        let key = parse_key(level, &def.key)?;
        let notice = Interactive::new(
            Activation::Key(key),
            def.radius,
            InteractionTarget::Notify(def.label.clone()),
        );
        Ok(Node::new(
            self.ids.allocate(),
            Rect::from(def.bounds),
            notice.node_flags(),
            NodeKind::Interactive(notice),
        ))
    }
}

/// The first map with a solid layer sets the level extent; without one, the
/// first map does.
fn level_extent(children: &[Node]) -> Option<Rect> {
    let mut fallback = None;
    for child in children {
        if let NodeKind::Tilemap(map) = &child.kind {
            if map.solid_layer.is_some() {
                return Some(child.bounds);
            }
            fallback = fallback.or(Some(child.bounds));
        }
    }
    fallback
}

fn parse_key(level: &str, key: &str) -> Result<InteractionKey, LoadError> {
    InteractionKey::parse(key).ok_or_else(|| LoadError::UnknownKey {
        level: level.to_string(),
        key: key.to_string(),
    })
}

/// Whole sheet as a single looping frame.
fn still_frame(sheet: Arc<SpriteSheet>) -> Animation {
    let spec = AnimationSpec {
        frame_width: i32::try_from(sheet.width()).unwrap_or(i32::MAX),
        frame_height: i32::try_from(sheet.height()).unwrap_or(i32::MAX),
        row: 0,
        frames: 1,
        frame_delay: 1,
        once: false,
    };
    Animation::new(Some(sheet), spec)
}
