use serde::{Deserialize, Serialize};

/// Role of a file, classified by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Video,
    Subtitle,
    Image,
    Info,
    Unsupported,
}

impl FileRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Subtitle => "subtitle",
            Self::Image => "image",
            Self::Info => "info",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artwork kind stored alongside a movie file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Poster,
    Fanart,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poster => "poster",
            Self::Fanart => "fanart",
        }
    }

    /// Canonical file name inside a movie directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Poster => "poster.jpg",
            Self::Fanart => "fanart.jpg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "poster" => Some(Self::Poster),
            "fanart" => Some(Self::Fanart),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
