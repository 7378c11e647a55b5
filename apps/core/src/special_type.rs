use serde::{Deserialize, Serialize};

/// Broad content categories a handler can claim instead of a single extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialType {
    Text,
    Video,
    Image,
    Web,
    Audio,
    Document,
    Archive,
    Executable,
}

impl SpecialType {
    pub const ALL: [SpecialType; 8] = [
        Self::Text,
        Self::Video,
        Self::Image,
        Self::Web,
        Self::Audio,
        Self::Document,
        Self::Archive,
        Self::Executable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
            Self::Image => "image",
            Self::Web => "web",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Executable => "executable",
        }
    }

    pub fn from_name(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|special| special.as_str() == normalized)
    }

    /// Category for a file extension, with or without its leading dot.
    pub fn for_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        let special = match ext.as_str() {
            "txt" | "log" | "md" | "ini" | "cfg" | "conf" | "json" | "xml" | "yaml" | "yml"
            | "csv" | "toml" => Self::Text,
            "mp4" | "mkv" | "avi" | "mov" | "wmv" | "webm" | "flv" | "m4v" => Self::Video,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "svg" | "ico" | "tif" | "tiff" => {
                Self::Image
            }
            "html" | "htm" | "xhtml" | "url" => Self::Web,
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" => Self::Audio,
            "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "rtf" => {
                Self::Document
            }
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" => Self::Archive,
            "exe" | "msi" | "bat" | "cmd" | "ps1" | "com" => Self::Executable,
            _ => return None,
        };
        Some(special)
    }
}
