use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    Hd,
    Sd,
}

impl Quality {
    pub fn label(self) -> &'static str {
        match self {
            Quality::Hd => "HD",
            Quality::Sd => "SD",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Size of a rendition. Upstream pages rarely expose it, so the server may
/// send either a number of megabytes or a display label.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileSize {
    Megabytes(f64),
    Label(String),
}

impl FileSize {
    pub fn unknown() -> Self {
        FileSize::Label("Unknown".to_string())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSize::Megabytes(mb) => write!(f, "{mb:.1} MB"),
            FileSize::Label(label) if label.parse::<f64>().is_ok() => write!(f, "{label} MB"),
            FileSize::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoSource {
    pub quality: Quality,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(rename = "sizeMB")]
    pub size_mb: FileSize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    pub sources: Vec<VideoSource>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParseRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}
