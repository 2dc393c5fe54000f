//! Media file metadata: kind, MIME type, byte length and duration.
//!
//! The supported container kinds form a closed set ([`MediaKind`]). Each kind
//! knows its MIME type and whether its duration can be probed from the
//! container headers (via `lofty`). Unknown suffixes map to
//! [`MediaKind::Unsupported`] instead of falling through.
//!
//! A missing file is not an error here: its length and duration read as zero.
//! Callers that want a hard failure check [`MediaMetadata::exists`].
use lofty::{config::ParseOptions, prelude::*, probe::Probe};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// File extension is not one of the recognised audio/video kinds.
    #[error("Unsupported media type: '{0}'")]
    UnsupportedMediaType(String),

    /// The container could not be parsed.
    #[error("Failed to probe media file: {0}")]
    Probe(#[from] lofty::error::LoftyError),

    #[error("Failed to read media file: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognised media containers, keyed by file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Mp3,
    M4a,
    Mp4,
    Mov,
    /// Anything else; carries the offending extension (empty if none).
    Unsupported(String),
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match ext {
            "mp3" => MediaKind::Mp3,
            "m4a" => MediaKind::M4a,
            "mp4" => MediaKind::Mp4,
            "mov" => MediaKind::Mov,
            other => MediaKind::Unsupported(other.to_string()),
        }
    }

    /// Enclosure MIME type.
    ///
    /// `.mp4` recordings of audio-only programs are served as `audio/x-m4a`
    /// so podcast clients file them as audio episodes.
    pub fn mime_type(&self, is_video: bool) -> Result<&'static str, MediaError> {
        match self {
            MediaKind::Mp3 => Ok("audio/mpeg"),
            MediaKind::M4a => Ok("audio/x-m4a"),
            MediaKind::Mp4 if is_video => Ok("video/mp4"),
            MediaKind::Mp4 => Ok("audio/x-m4a"),
            MediaKind::Mov => Ok("video/quicktime"),
            MediaKind::Unsupported(ext) => Err(MediaError::UnsupportedMediaType(ext.clone())),
        }
    }

    /// Whether duration can be read from the container headers.
    ///
    /// QuickTime `.mov` files are served but never probed; their records
    /// must carry a duration.
    pub fn is_probeable(&self) -> bool {
        matches!(self, MediaKind::Mp3 | MediaKind::M4a | MediaKind::Mp4)
    }

    /// Read the duration in whole seconds from an existing file.
    pub fn probe_duration(&self, path: &Path) -> Result<u64, MediaError> {
        if !self.is_probeable() {
            let ext = match self {
                MediaKind::Unsupported(ext) => ext.clone(),
                _ => path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_string(),
            };
            return Err(MediaError::UnsupportedMediaType(ext));
        }

        let tagged_file = Probe::open(path)?.options(ParseOptions::new()).read()?;
        let secs = tagged_file.properties().duration().as_secs();

        tracing::debug!(path = %path.display(), duration_secs = secs, "Probed media duration");
        Ok(secs)
    }
}

/// File-derived enclosure fields for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub kind: MediaKind,
    pub mime_type: &'static str,
    /// Byte length; 0 when the file is missing.
    pub length: u64,
    /// Duration in seconds; 0 when the file is missing.
    pub duration: u64,
    pub exists: bool,
}

impl MediaMetadata {
    /// Resolve kind, MIME type, size and duration for a media file.
    ///
    /// `known_duration` (from the recorder) is used as-is when present and
    /// non-zero; otherwise the container is probed.
    ///
    /// # Errors
    ///
    /// - [`MediaError::UnsupportedMediaType`] for unknown extensions, and for
    ///   existing `.mov` files when no duration is known
    /// - [`MediaError::Probe`] when an existing file cannot be parsed
    pub fn resolve(
        path: &Path,
        is_video: bool,
        known_duration: Option<u64>,
    ) -> Result<Self, MediaError> {
        let kind = MediaKind::from_path(path);
        let mime_type = kind.mime_type(is_video)?;

        let length = match std::fs::metadata(path) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(MediaError::Io(e)),
        };
        let exists = length.is_some();

        let duration = match known_duration.filter(|&d| d > 0) {
            Some(d) => d,
            None if !exists => 0,
            None => kind.probe_duration(path)?,
        };

        if !exists {
            tracing::warn!(path = %path.display(), "Media file not found, using zero length and duration");
        }

        Ok(Self {
            kind,
            mime_type,
            length: length.unwrap_or(0),
            duration,
            exists,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.mp3")), MediaKind::Mp3);
        assert_eq!(MediaKind::from_path(Path::new("b.m4a")), MediaKind::M4a);
        assert_eq!(MediaKind::from_path(Path::new("b.mp4")), MediaKind::Mp4);
        assert_eq!(MediaKind::from_path(Path::new("b.mov")), MediaKind::Mov);
        assert_eq!(
            MediaKind::from_path(Path::new("b.ogg")),
            MediaKind::Unsupported("ogg".into())
        );
        assert_eq!(
            MediaKind::from_path(Path::new("noext")),
            MediaKind::Unsupported(String::new())
        );
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        assert_eq!(
            MediaKind::from_path(Path::new("LOUD.MP3")),
            MediaKind::Unsupported("MP3".into())
        );
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(MediaKind::Mp3.mime_type(false).unwrap(), "audio/mpeg");
        assert_eq!(MediaKind::M4a.mime_type(true).unwrap(), "audio/x-m4a");
        assert_eq!(MediaKind::Mp4.mime_type(true).unwrap(), "video/mp4");
        assert_eq!(MediaKind::Mp4.mime_type(false).unwrap(), "audio/x-m4a");
        assert_eq!(MediaKind::Mov.mime_type(false).unwrap(), "video/quicktime");
        assert!(matches!(
            MediaKind::Unsupported("wav".into()).mime_type(false),
            Err(MediaError::UnsupportedMediaType(ext)) if ext == "wav"
        ));
    }

    #[test]
    fn test_missing_file_resolves_to_zero() {
        let path = PathBuf::from("/nonexistent/podfeeder/episode.mp3");
        let meta = MediaMetadata::resolve(&path, false, None).unwrap();
        assert!(!meta.exists);
        assert_eq!(meta.length, 0);
        assert_eq!(meta.duration, 0);
        assert_eq!(meta.mime_type, "audio/mpeg");
    }

    #[test]
    fn test_known_duration_wins_over_probe() {
        let path = PathBuf::from("/nonexistent/podfeeder/episode.mp4");
        let meta = MediaMetadata::resolve(&path, true, Some(1800)).unwrap();
        assert_eq!(meta.duration, 1800);
        assert_eq!(meta.mime_type, "video/mp4");
    }

    #[test]
    fn test_unsupported_extension_fails() {
        let path = PathBuf::from("/nonexistent/podfeeder/episode.flac");
        let err = MediaMetadata::resolve(&path, false, Some(60)).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaType(ext) if ext == "flac"));
    }

    #[test]
    fn test_mov_without_duration_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        std::fs::write(&path, b"moov").unwrap();

        let err = MediaMetadata::resolve(&path, true, None).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaType(ext) if ext == "mov"));
    }

    #[test]
    fn test_missing_mov_without_duration_is_zero() {
        let path = PathBuf::from("/nonexistent/podfeeder/clip.mov");
        let meta = MediaMetadata::resolve(&path, true, None).unwrap();
        assert_eq!(meta.duration, 0);
    }

    #[test]
    fn test_mov_with_duration_resolves() {
        let path = PathBuf::from("/nonexistent/podfeeder/clip.mov");
        let meta = MediaMetadata::resolve(&path, true, Some(90)).unwrap();
        assert_eq!(meta.mime_type, "video/quicktime");
        assert_eq!(meta.duration, 90);
    }

    #[test]
    fn test_existing_file_length_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.mp3");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        // Known duration skips probing the (invalid) container
        let meta = MediaMetadata::resolve(&path, false, Some(30)).unwrap();
        assert!(meta.exists);
        assert_eq!(meta.length, 4096);
        assert_eq!(meta.duration, 30);
    }

    #[test]
    fn test_corrupt_container_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.m4a");
        std::fs::write(&path, b"definitely not an mp4 container").unwrap();

        let err = MediaMetadata::resolve(&path, false, None).unwrap_err();
        assert!(matches!(err, MediaError::Probe(_)));
    }
}
