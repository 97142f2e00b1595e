//! Data model shared between the data service, the pipeline and the GUI.
//!
//! Records coming out of the catalog are plain serde structs; a session's
//! [`Point`] additionally carries its decoded thumbnail once the image stage
//! has run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Decoded RGBA image shared between threads
pub type ImageHandle = Arc<image::RgbaImage>;

/// One projected painting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    /// Identity of the point within a session
    pub filename: String,
    pub artist: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    pub thumbnail: Option<ImageHandle>,
}

impl Point {
    pub fn new(filename: &str, artist: &str, x: f64, y: f64) -> Self {
        Self {
            filename: filename.to_string(),
            artist: artist.to_string(),
            x,
            y,
            thumbnail: None,
        }
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename
    }
}

/// Axis-aligned rectangle in bitmap pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Containment test with the rectangle grown by `margin` on every side.
    /// Edges are inclusive.
    pub fn contains_with_margin(&self, px: f64, py: f64, margin: f64) -> bool {
        px >= self.x - margin
            && px <= self.x + self.width + margin
            && py >= self.y - margin
            && py <= self.y + self.height + margin
    }
}

/// Resolution tier of a bitmap and of the bounds computed for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Square overview bitmap
    Full,
    /// Narrow bitmap used while the detail pane is open
    Half,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Full => write!(f, "full"),
            Tier::Half => write!(f, "half"),
        }
    }
}

/// Which image collection to read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Thumbnail,
    Resized,
    Visualization,
}

impl ImageKind {
    /// Sub-directory of the assets root holding this kind
    pub fn dir_name(&self) -> &'static str {
        match self {
            ImageKind::Thumbnail => "thumbnails",
            ImageKind::Resized => "resized",
            ImageKind::Visualization => "visualizations",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Metadata about one painter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    pub years: Option<String>,
    pub genre: Option<String>,
    pub nationality: Option<String>,
    pub bio: Option<String>,
    pub wikipedia: Option<String>,
    pub paintings: Option<String>,
}

impl ArtistRecord {
    /// Field label / value pairs in display order
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        fn v(o: &Option<String>) -> &str {
            o.as_deref().unwrap_or("")
        }
        [
            ("bio", v(&self.bio)),
            ("genre", v(&self.genre)),
            ("name", self.name.as_str()),
            ("nationality", v(&self.nationality)),
            ("paintings", v(&self.paintings)),
            ("wikipedia", v(&self.wikipedia)),
            ("years", v(&self.years)),
        ]
    }
}

/// One stored run of a DR method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub config_id: i64,
    pub subset_strategy: Option<String>,
    pub subset_size: Option<i64>,
    pub runtime: Option<f64>,
}

impl ConfigSummary {
    pub fn label(&self) -> String {
        let mut out = format!("config {}", self.config_id);
        if let Some(strategy) = &self.subset_strategy {
            out.push_str(&format!(" · {}", strategy));
        }
        if let Some(size) = self.subset_size {
            out.push_str(&format!(" · n={}", size));
        }
        if let Some(runtime) = self.runtime {
            out.push_str(&format!(" · {:.1}s", runtime));
        }
        out
    }
}

/// A rendered mosaic stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizConfig {
    pub viz_id: i64,
    pub method: String,
    pub config_id: i64,
    pub filename: Option<String>,
    pub name: Option<String>,
}

impl VizConfig {
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!(
                "viz {} ({}, config {})",
                self.viz_id, self.method, self.config_id
            ),
        }
    }
}
