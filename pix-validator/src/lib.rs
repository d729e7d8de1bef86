//! pix-validator: decides whether an uploaded file is an image pixvault will keep.
//!
//! The decision only looks at the bytes. The content type a client declared
//! is advisory: the format is sniffed from the stream's own magic bytes, the
//! header is read for dimensions, and the pixel data is decoded once to make
//! sure the file is not truncated or corrupt.
//!
//! ```rust
//! use pix_validator::{ImageValidator, ValidationRules};
//!
//! let validator = ImageValidator::new(ValidationRules::default());
//! let err = validator.validate_bytes(b"definitely not a png", Some("image/png")).unwrap_err();
//! assert!(err.to_string().starts_with("invalid image format"));
//! ```

use std::io::{BufRead, Cursor, Seek, SeekFrom};

use image::{ImageFormat, ImageReader, Limits};
use thiserror::Error;

/// Default exclusive bound for both width and height.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Why a candidate was rejected.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid image format: {reason}")]
    Unreadable { reason: String },

    #[error(
        "image resolution {width}x{height} is too large; width and height must both be below {max_width}x{max_height}"
    )]
    TooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("I/O error while reading image: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidationError {
    pub fn unreadable<S: Into<String>>(reason: S) -> Self {
        Self::Unreadable {
            reason: reason.into(),
        }
    }

    /// True when the client sent something that is not a usable image.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Resolution bounds. Both limits are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same exclusive bound for width and height.
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_width = max;
        self.max_height = max;
        self
    }

    fn admits(&self, width: u32, height: u32) -> bool {
        width < self.max_width && height < self.max_height
    }
}

/// What the validator learned about an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// MIME type of the detected format.
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Whether a client-declared content type names the detected format.
    pub fn matches_content_type(&self, declared: &str) -> bool {
        let essence = declared.split(';').next().unwrap_or("").trim();
        ImageFormat::from_mime_type(essence) == Some(self.format)
    }
}

/// Read-only image admission check.
#[derive(Debug, Clone, Default)]
pub struct ImageValidator {
    rules: ValidationRules,
}

impl ImageValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate a seekable stream.
    ///
    /// On success the stream is rewound to where it was when the call
    /// started, so the same reader can be handed to storage afterwards.
    /// `declared_content_type` is never used for the decision.
    pub fn validate<R>(
        &self,
        candidate: &mut R,
        _declared_content_type: Option<&str>,
    ) -> Result<ImageInfo, ValidationError>
    where
        R: BufRead + Seek,
    {
        let start = candidate.stream_position()?;

        let reader = ImageReader::new(&mut *candidate)
            .with_guessed_format()
            .map_err(|e| ValidationError::unreadable(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| ValidationError::unreadable("unrecognized image format"))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| ValidationError::unreadable(e.to_string()))?;

        if !self.rules.admits(width, height) {
            return Err(ValidationError::TooLarge {
                width,
                height,
                max_width: self.rules.max_width,
                max_height: self.rules.max_height,
            });
        }

        candidate.seek(SeekFrom::Start(start))?;
        let mut reader = ImageReader::with_format(&mut *candidate, format);
        reader.limits(self.decode_limits());
        reader
            .decode()
            .map_err(|e| ValidationError::unreadable(e.to_string()))?;

        candidate.seek(SeekFrom::Start(start))?;

        Ok(ImageInfo {
            format,
            width,
            height,
        })
    }

    /// Validate an in-memory buffer.
    pub fn validate_bytes(
        &self,
        data: &[u8],
        declared_content_type: Option<&str>,
    ) -> Result<ImageInfo, ValidationError> {
        let mut cursor = Cursor::new(data);
        self.validate(&mut cursor, declared_content_type)
    }

    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.rules.max_width);
        limits.max_image_height = Some(self.rules.max_height);
        limits
    }
}
