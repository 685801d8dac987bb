use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key must start with a lowercase letter or digit, got '{character}'")]
    InvalidLeading { character: char },
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
    #[error("sprite sheet '{key}' has a zero-sized frame")]
    EmptyFrame { key: String },
}

/// Keys name sprite sheets the way map designers write them (`monk1`,
/// `student`, `npc_guard-2`). Paths never appear in a key.
pub fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return Err(SpriteKeyError::Empty);
    };
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return Err(SpriteKeyError::InvalidLeading { character: first });
    }
    for ch in chars {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-') {
            continue;
        }
        return Err(SpriteKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}

/// A grid-sliced sheet. Rows are facings (down, left, right, up), four
/// frames per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSheet {
    pub image_path: PathBuf,
    pub frame_width: u32,
    pub frame_height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SpriteCatalog {
    sheets: BTreeMap<String, SpriteSheet>,
}

impl SpriteCatalog {
    pub fn register(
        &mut self,
        key: &str,
        image_path: impl Into<PathBuf>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<(), SpriteKeyError> {
        validate_sprite_key(key)?;
        if frame_width == 0 || frame_height == 0 {
            return Err(SpriteKeyError::EmptyFrame {
                key: key.to_string(),
            });
        }
        self.sheets.insert(
            key.to_string(),
            SpriteSheet {
                image_path: image_path.into(),
                frame_width,
                frame_height,
            },
        );
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sheets.contains_key(key)
    }

    pub fn sheet(&self, key: &str) -> Option<&SpriteSheet> {
        self.sheets.get(key)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Takes the first non-empty candidate and keeps it only if it names a
    /// registered sheet; otherwise `default_key`. Later candidates are not
    /// tried. Never fails: the default is returned even when it is
    /// unregistered, and the renderer draws a placeholder for it.
    pub fn resolve_or_default<'a, I>(&self, candidates: I, default_key: &str) -> String
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        candidates
            .into_iter()
            .flatten()
            .find(|key| !key.is_empty())
            .filter(|key| self.contains(key))
            .unwrap_or(default_key)
            .to_string()
    }
}
