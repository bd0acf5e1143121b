use sha2::{Digest, Sha256};
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter};
use uuid::Uuid;

/// Largest payload accepted for analysis: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1_048_576;

const BYTES_PER_MB: f64 = 1_048_576.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    #[error("The selected file is empty.")]
    Empty,
    #[error(
        "File exceeds the 10 MB limit ({:.2} MB). Please choose another file.",
        megabytes(.size)
    )]
    TooLarge { size: u64 },
    #[error("Unsupported media type: {0}. Only images and videos can be analyzed.")]
    UnsupportedMediaType(String),
    #[error("A detection request is already in progress.")]
    RequestInFlight,
}

fn megabytes(size: &u64) -> f64 {
    *size as f64 / BYTES_PER_MB
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Media formats the preview and upload paths know by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, Display)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Mp4,
    Webm,
    QuickTime,
    Avi,
}

impl MediaFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Bmp => "image/bmp",
            MediaFormat::Webp => "image/webp",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Webm => "video/webm",
            MediaFormat::QuickTime => "video/quicktime",
            MediaFormat::Avi => "video/x-msvideo",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaFormat::Jpeg => &["jpg", "jpeg"],
            MediaFormat::Png => &["png"],
            MediaFormat::Gif => &["gif"],
            MediaFormat::Bmp => &["bmp"],
            MediaFormat::Webp => &["webp"],
            MediaFormat::Mp4 => &["mp4"],
            MediaFormat::Webm => &["webm"],
            MediaFormat::QuickTime => &["mov"],
            MediaFormat::Avi => &["avi"],
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        MediaFormat::iter().find(|format| format.extensions().contains(&extension.as_str()))
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        file_name
            .rsplit_once('.')
            .and_then(|(_, extension)| Self::from_extension(extension))
    }
}

/// A validated file ready to be submitted for analysis.
///
/// Construction enforces the upload constraints, so a value of this type is
/// always non-empty, at most [`MAX_UPLOAD_BYTES`] long and of an image or
/// video media type. Clones share the payload and keep the same id, which is
/// what a retry resends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    id: Uuid,
    file_name: String,
    media_type: String,
    payload: Arc<[u8]>,
    fingerprint: String,
}

impl AnalysisRequest {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<Self, InvalidInput> {
        let media_type = media_type.into();
        Self::check_size(payload.len() as u64)?;
        Self::check_media_type(&media_type)?;

        let fingerprint = Self::fingerprint_of(&payload);
        Ok(Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            media_type,
            payload: payload.into(),
            fingerprint,
        })
    }

    /// Size check usable before the payload has been read.
    pub fn check_size(size: u64) -> Result<(), InvalidInput> {
        if size == 0 {
            return Err(InvalidInput::Empty);
        }
        if size > MAX_UPLOAD_BYTES {
            return Err(InvalidInput::TooLarge { size });
        }
        Ok(())
    }

    pub fn check_media_type(media_type: &str) -> Result<MediaKind, InvalidInput> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.split_once('/') {
            Some(("image", subtype)) if !subtype.is_empty() => Ok(MediaKind::Image),
            Some(("video", subtype)) if !subtype.is_empty() => Ok(MediaKind::Video),
            _ => Err(InvalidInput::UnsupportedMediaType(media_type.to_string())),
        }
    }

    fn fingerprint_of(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hex::encode(hasher.finalize())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn media_kind(&self) -> MediaKind {
        // Validated at construction.
        Self::check_media_type(&self.media_type).unwrap_or(MediaKind::Image)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Hex SHA-256 of the payload.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_image_within_limit() {
        let request = AnalysisRequest::new("face.jpg", "image/jpeg", vec![1; 2 * 1_000_000]).unwrap();
        assert_eq!(request.size(), 2_000_000);
        assert_eq!(request.media_kind(), MediaKind::Image);
        assert_eq!(request.fingerprint().len(), 64);
    }

    #[test]
    fn accepts_exactly_ten_mebibytes() {
        assert!(AnalysisRequest::check_size(MAX_UPLOAD_BYTES).is_ok());
        assert_eq!(
            AnalysisRequest::check_size(MAX_UPLOAD_BYTES + 1),
            Err(InvalidInput::TooLarge { size: MAX_UPLOAD_BYTES + 1 })
        );
    }

    #[test]
    fn oversize_message_reports_measured_size() {
        let err = AnalysisRequest::new("clip.mp4", "video/mp4", vec![0; 11 * 1_048_576]).unwrap_err();
        assert!(err.to_string().contains("11.00 MB"), "{err}");
    }

    #[test]
    fn rejects_empty_payload() {
        let err = AnalysisRequest::new("empty.png", "image/png", Vec::new()).unwrap_err();
        assert_eq!(err, InvalidInput::Empty);
    }

    #[test]
    fn rejects_non_media_types() {
        let err = AnalysisRequest::new("notes.txt", "text/plain", b"Hello World".to_vec()).unwrap_err();
        assert_eq!(err, InvalidInput::UnsupportedMediaType("text/plain".into()));
        assert!(AnalysisRequest::check_media_type("image/").is_err());
        assert_eq!(
            AnalysisRequest::check_media_type("Video/MP4; codecs=avc1"),
            Ok(MediaKind::Video)
        );
    }

    #[test]
    fn clones_keep_identity() {
        let request = AnalysisRequest::new("a.webp", "image/webp", vec![7; 16]).unwrap();
        let again = request.clone();
        assert_eq!(request, again);
        assert_eq!(request.id(), again.id());

        let other = AnalysisRequest::new("a.webp", "image/webp", vec![7; 16]).unwrap();
        assert_ne!(request.id(), other.id());
        assert_eq!(request.fingerprint(), other.fingerprint());
    }

    #[test]
    fn formats_resolve_from_file_names() {
        assert_eq!(MediaFormat::from_file_name("IMG_001.JPEG"), Some(MediaFormat::Jpeg));
        assert_eq!(MediaFormat::from_file_name("movie.mov"), Some(MediaFormat::QuickTime));
        assert_eq!(MediaFormat::from_file_name("archive.tar.gz"), None);
        assert_eq!(MediaFormat::from_file_name("README"), None);
        assert_eq!(MediaFormat::Avi.mime_type(), "video/x-msvideo");
    }
}
