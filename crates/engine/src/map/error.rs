use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("failed to read map file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported map format for {path}; expected .json, .tmj, .tmx or .tsx/.tsj tilesets")]
    UnsupportedFormat { path: PathBuf },
    #[error("malformed map json at {json_path}: {source}")]
    Json {
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed map xml at {location}: {message}")]
    Xml {
        message: String,
        location: SourceLocation,
    },
    #[error("map has zero size ({width}x{height} tiles of {tile_width}x{tile_height}px)")]
    EmptyMap {
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    },
    #[error("tile layer '{layer}' has {actual} tiles, expected {expected}")]
    LayerSizeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("tile layer '{layer}' uses unsupported encoding '{encoding}'; save the map with CSV or array layer data")]
    UnsupportedEncoding { layer: String, encoding: String },
}

impl MapLoadError {
    pub(crate) fn from_json_path(error: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let json_path = error.path().to_string();
        MapLoadError::Json {
            json_path: if json_path.is_empty() {
                ".".to_string()
            } else {
                json_path
            },
            source: error.into_inner(),
        }
    }

    pub(crate) fn xml_at(message: impl Into<String>, line: u32, column: u32) -> Self {
        MapLoadError::Xml {
            message: message.into(),
            location: SourceLocation {
                line: line as usize,
                column: column as usize,
            },
        }
    }
}
