use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use tracing::debug;

use crate::scene::SpriteSheet;

use super::error::LoadError;

/// Sprite sheets decoded once during load and handed out by key.
#[derive(Debug, Default)]
pub struct SharedResources {
    sheets: HashMap<String, Arc<SpriteSheet>>,
}

impl SharedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every `key -> relative path` entry under `root`.
    pub fn load<'a>(
        root: &Path,
        entries: impl IntoIterator<Item = (&'a String, &'a PathBuf)>,
    ) -> Result<Self, LoadError> {
        let mut resources = Self::new();
        for (key, relative) in entries {
            let sheet = decode_sprite_sheet(key, &root.join(relative))?;
            resources.insert(sheet);
        }
        Ok(resources)
    }

    pub fn insert(&mut self, sheet: SpriteSheet) -> Arc<SpriteSheet> {
        let sheet = Arc::new(sheet);
        self.sheets
            .insert(sheet.key().to_string(), Arc::clone(&sheet));
        sheet
    }

    pub fn sheet(&self, key: &str) -> Option<Arc<SpriteSheet>> {
        self.sheets.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Resolve an optional sheet reference made by `level`.
    pub(crate) fn resolve(
        &self,
        level: &str,
        key: Option<&str>,
    ) -> Result<Option<Arc<SpriteSheet>>, LoadError> {
        let Some(key) = key else {
            return Ok(None);
        };
        self.sheet(key)
            .map(Some)
            .ok_or_else(|| LoadError::UnknownSheet {
                level: level.to_string(),
                key: key.to_string(),
            })
    }
}

pub fn decode_sprite_sheet(key: &str, path: &Path) -> Result<SpriteSheet, LoadError> {
    let reader = ImageReader::open(path).map_err(|source| LoadError::ReadImage {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| LoadError::DecodeImage {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decoded.to_rgba8();
    let (width, height) = image.dimensions();
    debug!(key, path = %path.display(), width, height, "sprite_sheet_decoded");
    Ok(SpriteSheet::new(key, width, height, image.into_raw()))
}
