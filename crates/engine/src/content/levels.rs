use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::scene::{AnimationSpec, Rect};

use super::error::LoadError;

pub const LEVELS_FILE_NAME: &str = "levels.json";

/// Top-level level file: shared sheets plus the ordered level list. The
/// position of a level in `levels` is its index in the level set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelSetDef {
    #[serde(default)]
    pub sheets: BTreeMap<String, PathBuf>,
    pub levels: Vec<LevelDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelDef {
    pub name: String,
    #[serde(default)]
    pub maps: Vec<TilemapDef>,
    pub player: Option<PlayerDef>,
    #[serde(default)]
    pub attendants: Vec<AttendantDef>,
    #[serde(default)]
    pub pool_players: Vec<PoolPlayerDef>,
    #[serde(default)]
    pub props: Vec<PropDef>,
    #[serde(default)]
    pub doors: Vec<DoorDef>,
    #[serde(default)]
    pub notices: Vec<NoticeDef>,
}

/// Layers `layers` of map file `resource`. `solid_layer` indexes into
/// `layers`. Foreground maps are added after every entity so they draw on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TilemapDef {
    pub resource: String,
    pub layers: Vec<usize>,
    #[serde(default)]
    pub solid_layer: Option<usize>,
    #[serde(default)]
    pub tileset: Option<String>,
    #[serde(default)]
    pub foreground: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowDef {
    pub row: i32,
    pub frames: i32,
    pub delay: i32,
    #[serde(default)]
    pub once: bool,
}

impl RowDef {
    const fn new(row: i32, frames: i32, delay: i32, once: bool) -> Self {
        Self {
            row,
            frames,
            delay,
            once,
        }
    }

    pub fn spec(&self, frame_width: i32, frame_height: i32) -> AnimationSpec {
        AnimationSpec {
            frame_width,
            frame_height,
            row: self.row,
            frames: self.frames,
            frame_delay: self.delay,
            once: self.once,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorAnimationsDef {
    pub frame_width: i32,
    pub frame_height: i32,
    pub idle: RowDef,
    pub walk: RowDef,
    pub climb_up: RowDef,
    pub climb_down: RowDef,
}

impl Default for ActorAnimationsDef {
    fn default() -> Self {
        Self {
            frame_width: 32,
            frame_height: 48,
            idle: RowDef::new(0, 12, 2, false),
            walk: RowDef::new(1, 8, 2, false),
            climb_up: RowDef::new(2, 11, 2, true),
            climb_down: RowDef::new(3, 11, 2, true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerDef {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_player_width")]
    pub width: i32,
    #[serde(default = "default_player_height")]
    pub height: i32,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub animations: ActorAnimationsDef,
    #[serde(default)]
    pub facing_left: bool,
}

impl PlayerDef {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

fn default_player_width() -> i32 {
    8
}

fn default_player_height() -> i32 {
    24
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttendantAnimationsDef {
    pub frame_width: i32,
    pub frame_height: i32,
    pub serve: RowDef,
    pub walk: RowDef,
    pub idle: RowDef,
}

impl Default for AttendantAnimationsDef {
    fn default() -> Self {
        Self {
            frame_width: 40,
            frame_height: 32,
            serve: RowDef::new(0, 16, 3, true),
            walk: RowDef::new(1, 7, 3, true),
            idle: RowDef::new(2, 12, 3, false),
        }
    }
}

/// An attendant occupies one animation frame and is served from its own
/// bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttendantDef {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub animations: AttendantAnimationsDef,
    #[serde(default)]
    pub facing_left: bool,
}

impl AttendantDef {
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.x,
            self.y,
            self.animations.frame_width,
            self.animations.frame_height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolPlayerAnimationsDef {
    pub frame_width: i32,
    pub frame_height: i32,
    pub shoot: RowDef,
    pub wait: RowDef,
    pub prepare: RowDef,
}

impl Default for PoolPlayerAnimationsDef {
    fn default() -> Self {
        Self {
            frame_width: 48,
            frame_height: 24,
            shoot: RowDef::new(0, 12, 3, true),
            wait: RowDef::new(1, 4, 3, false),
            prepare: RowDef::new(2, 12, 3, true),
        }
    }
}

/// Background figure at a pool table; sized to one animation frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolPlayerDef {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub animations: PoolPlayerAnimationsDef,
    #[serde(default)]
    pub facing_left: bool,
    #[serde(default)]
    pub color: Option<[u8; 4]>,
}

impl PoolPlayerDef {
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.x,
            self.y,
            self.animations.frame_width,
            self.animations.frame_height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RectDef {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<RectDef> for Rect {
    fn from(value: RectDef) -> Self {
        Rect::new(value.x, value.y, value.width, value.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropAnimationDef {
    pub frame_width: i32,
    pub frame_height: i32,
    pub row: i32,
    pub frames: i32,
    pub delay: i32,
    #[serde(default)]
    pub once: bool,
}

impl PropAnimationDef {
    pub fn spec(&self) -> AnimationSpec {
        RowDef::new(self.row, self.frames, self.delay, self.once)
            .spec(self.frame_width, self.frame_height)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropDef {
    pub bounds: RectDef,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub animation: Option<PropAnimationDef>,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub gravity: bool,
    #[serde(default)]
    pub color: Option<[u8; 4]>,
}

/// Key-activated switch to `to` (a level name), placing its player at the
/// spawn point.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoorDef {
    pub bounds: RectDef,
    #[serde(default = "default_door_key")]
    pub key: String,
    pub to: String,
    pub spawn_x: i32,
    pub spawn_y: i32,
}

fn default_door_key() -> String {
    "E".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoticeDef {
    pub bounds: RectDef,
    pub key: String,
    pub label: String,
    #[serde(default = "default_notice_radius")]
    pub radius: i32,
}

fn default_notice_radius() -> i32 {
    crate::scene::DOOR_RADIUS_PX
}

pub fn read_level_set(path: &Path) -> Result<LevelSetDef, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::ReadLevels {
        path: path.to_path_buf(),
        source,
    })?;
    parse_level_set(path, &raw)
}

pub fn parse_level_set(path: &Path, raw: &str) -> Result<LevelSetDef, LoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, LevelSetDef>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        LoadError::ParseLevels {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}
