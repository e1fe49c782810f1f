//! Content-type resolution for stored results.
//!
//! Every outcome is a row of [`TABLE`], so the MIME type and the file extension of an upload can
//! never disagree. Lookups that hit nothing fall through to the next source, and the media
//! category default ends the chain, so [`resolve`] always returns something.

use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Image,
    Audio,
    Video,
    Model3d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentType {
    pub mime: &'static str,
    /// Canonical extension, with the leading dot
    pub extension: &'static str,
    pub category: MediaCategory,
}

const fn row(mime: &'static str, extension: &'static str, category: MediaCategory) -> ContentType {
    ContentType {
        mime,
        extension,
        category,
    }
}

pub const TABLE: &[ContentType] = &[
    row("image/png", ".png", MediaCategory::Image),
    row("image/jpeg", ".jpg", MediaCategory::Image),
    row("image/webp", ".webp", MediaCategory::Image),
    row("image/gif", ".gif", MediaCategory::Image),
    row("image/bmp", ".bmp", MediaCategory::Image),
    row("image/tiff", ".tiff", MediaCategory::Image),
    row("audio/mpeg", ".mp3", MediaCategory::Audio),
    row("audio/wav", ".wav", MediaCategory::Audio),
    row("audio/ogg", ".ogg", MediaCategory::Audio),
    row("audio/flac", ".flac", MediaCategory::Audio),
    row("audio/aac", ".aac", MediaCategory::Audio),
    row("audio/mp4", ".m4a", MediaCategory::Audio),
    row("video/mp4", ".mp4", MediaCategory::Video),
    row("video/webm", ".webm", MediaCategory::Video),
    row("video/quicktime", ".mov", MediaCategory::Video),
    row("model/gltf-binary", ".glb", MediaCategory::Model3d),
    row("model/gltf+json", ".gltf", MediaCategory::Model3d),
    row("model/obj", ".obj", MediaCategory::Model3d),
    row("model/stl", ".stl", MediaCategory::Model3d),
];

/// Non-canonical MIME names seen in the wild, mapped to the canonical row.
const MIME_ALIASES: &[(&str, &str)] = &[
    ("image/jpg", "image/jpeg"),
    ("image/pjpeg", "image/jpeg"),
    ("image/x-png", "image/png"),
    ("image/x-ms-bmp", "image/bmp"),
    ("image/tif", "image/tiff"),
    ("audio/mp3", "audio/mpeg"),
    ("audio/x-wav", "audio/wav"),
    ("audio/wave", "audio/wav"),
    ("audio/vnd.wave", "audio/wav"),
    ("audio/x-flac", "audio/flac"),
    ("audio/x-m4a", "audio/mp4"),
    ("audio/m4a", "audio/mp4"),
    ("video/x-m4v", "video/mp4"),
    ("video/mov", "video/quicktime"),
    ("model/gltf", "model/gltf+json"),
    ("model/x.stl-binary", "model/stl"),
    ("application/sla", "model/stl"),
];

/// Extensions that are not the canonical one for their row.
const EXTENSION_ALIASES: &[(&str, &str)] = &[
    (".jpeg", ".jpg"),
    (".jpe", ".jpg"),
    (".tif", ".tiff"),
    (".mpeg3", ".mp3"),
    (".wave", ".wav"),
    (".oga", ".ogg"),
    (".m4v", ".mp4"),
    (".qt", ".mov"),
];

impl ContentType {
    /// Look up a `Content-Type` value. Parameters and case are ignored.
    pub fn from_mime(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if essence.is_empty() {
            return None;
        }
        let canonical = MIME_ALIASES
            .iter()
            .find(|(alias, _)| *alias == essence)
            .map_or(essence.as_str(), |(_, canonical)| *canonical);
        TABLE.iter().find(|ct| ct.mime == canonical).copied()
    }

    /// Look up a file extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase());
        if ext.len() < 2 {
            return None;
        }
        let canonical = EXTENSION_ALIASES
            .iter()
            .find(|(alias, _)| *alias == ext)
            .map_or(ext.as_str(), |(_, canonical)| *canonical);
        if let Some(ct) = TABLE.iter().find(|ct| ct.extension == canonical) {
            return Some(*ct);
        }

        // Anything else goes through mime_guess and back into the table
        mime_guess::from_ext(&ext[1..])
            .iter_raw()
            .find_map(Self::from_mime)
    }

    /// Infer from the last path segment of a URL. Query strings and fragments are ignored.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let segment = parsed.path_segments()?.next_back()?;
        let (_, ext) = segment.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn default_for(category: MediaCategory) -> Self {
        let mime = match category {
            MediaCategory::Image => "image/png",
            MediaCategory::Audio => "audio/mpeg",
            MediaCategory::Video => "video/mp4",
            MediaCategory::Model3d => "model/gltf-binary",
        };
        TABLE
            .iter()
            .find(|ct| ct.mime == mime)
            .copied()
            .unwrap_or(TABLE[0])
    }
}

/// Resolve the stored type of a result.
///
/// Sources in priority order: the type the provider declared, the response `Content-Type`
/// header, the URL extension, then the category default.
pub fn resolve(
    declared: Option<&str>,
    response_content_type: Option<&str>,
    source_url: Option<&str>,
    category: MediaCategory,
) -> ContentType {
    declared
        .and_then(ContentType::from_mime)
        .or_else(|| response_content_type.and_then(ContentType::from_mime))
        .or_else(|| source_url.and_then(ContentType::from_url))
        .unwrap_or_else(|| ContentType::default_for(category))
}
