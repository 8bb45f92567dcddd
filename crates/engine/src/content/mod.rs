mod builder;
mod error;
mod levels;
mod map;
mod resources;

pub use builder::{build_scene, load_scene, SceneBuildOptions};
pub use error::LoadError;
pub use levels::{
    parse_level_set, read_level_set, ActorAnimationsDef, AttendantAnimationsDef, AttendantDef,
    DoorDef, LevelDef, LevelSetDef, NoticeDef, PlayerDef, PoolPlayerAnimationsDef, PoolPlayerDef,
    PropAnimationDef, PropDef, RectDef, RowDef, TilemapDef, LEVELS_FILE_NAME,
};
pub use map::{parse_map_layer, LoadedGrid, MapFiles, TileGridProvider};
pub use resources::{decode_sprite_sheet, SharedResources};
