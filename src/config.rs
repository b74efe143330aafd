//! Configuration types for text-behind-image operations

use crate::color::RgbaColor;
use crate::error::{Result, TextBehindError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder text shown in the text input
pub const DEFAULT_TEXT: &str = "Your Text Here";

/// Smallest font size offered by the size slider
pub const MIN_FONT_SIZE: u32 = 10;

/// Largest font size offered by the size slider
pub const MAX_FONT_SIZE: u32 = 200;

/// Largest size any text style may request, slider or not
pub const MAX_RENDER_FONT_SIZE: u32 = 1000;

/// Initial slider position
pub const DEFAULT_FONT_SIZE: u32 = 100;

/// Initial color picker value
pub const DEFAULT_FONT_COLOR: &str = "#FFFFFF";

/// File name offered for the downloaded composite
pub const DOWNLOAD_FILE_NAME: &str = "text_behind_image.png";

/// MIME type of the downloaded composite
pub const DOWNLOAD_MIME_TYPE: &str = "image/png";

/// Environment variable holding extra font directories
pub const FONT_DIRS_ENV: &str = "IMGLY_TEXT_BEHIND_FONT_DIRS";

/// The fonts offered by the font picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontChoice {
    #[default]
    Arial,
    Times,
    Georgia,
}

impl FontChoice {
    pub const ALL: [FontChoice; 3] = [FontChoice::Arial, FontChoice::Times, FontChoice::Georgia];

    /// Font file name looked up on the host
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            FontChoice::Arial => "arial.ttf",
            FontChoice::Times => "times.ttf",
            FontChoice::Georgia => "georgia.ttf",
        }
    }
}

impl fmt::Display for FontChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for FontChoice {
    type Err = TextBehindError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let stem = normalized.strip_suffix(".ttf").unwrap_or(&normalized);
        match stem {
            "arial" => Ok(FontChoice::Arial),
            "times" => Ok(FontChoice::Times),
            "georgia" => Ok(FontChoice::Georgia),
            _ => Err(TextBehindError::invalid_config(format!(
                "Unknown font '{}'. Available fonts: arial.ttf, times.ttf, georgia.ttf",
                s
            ))),
        }
    }
}

/// Font, size and color used to draw the text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Font name or path
    pub font: String,
    /// Point size
    pub size: u32,
    /// Fill color
    pub color: RgbaColor,
}

impl TextStyle {
    /// Create a text style
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `size` is zero or above [`MAX_RENDER_FONT_SIZE`].
    pub fn new<S: Into<String>>(font: S, size: u32, color: RgbaColor) -> Result<Self> {
        if size == 0 || size > MAX_RENDER_FONT_SIZE {
            return Err(TextBehindError::config_value_error(
                "font size",
                size,
                &format!("1-{}", MAX_RENDER_FONT_SIZE),
                Some(DEFAULT_FONT_SIZE),
            ));
        }
        Ok(Self {
            font: font.into(),
            size,
            color,
        })
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontChoice::default().file_name().to_string(),
            size: DEFAULT_FONT_SIZE,
            color: RgbaColor::WHITE,
        }
    }
}

/// A validated set of user inputs for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub text: String,
    pub style: TextStyle,
}

impl ComposeRequest {
    #[must_use]
    pub fn builder() -> ComposeRequestBuilder {
        ComposeRequestBuilder::new()
    }
}

impl Default for ComposeRequest {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            style: TextStyle::default(),
        }
    }
}

/// Builder for `ComposeRequest` that applies the form's input constraints
#[derive(Debug, Clone)]
pub struct ComposeRequestBuilder {
    text: String,
    font: FontChoice,
    font_size: u32,
    font_color: String,
}

impl ComposeRequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            font: FontChoice::default(),
            font_size: DEFAULT_FONT_SIZE,
            font_color: DEFAULT_FONT_COLOR.to_string(),
        }
    }

    #[must_use]
    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn font(mut self, font: FontChoice) -> Self {
        self.font = font;
        self
    }

    #[must_use]
    pub fn font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    #[must_use]
    pub fn font_color<S: Into<String>>(mut self, color: S) -> Self {
        self.font_color = color.into();
        self
    }

    /// Build the request
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a font size outside 10..=200 or a malformed
    /// `#RRGGBB` color.
    pub fn build(self) -> Result<ComposeRequest> {
        crate::utils::ConfigValidator::validate_font_size(self.font_size)?;
        let color = RgbaColor::from_hex(&self.font_color)?;
        let style = TextStyle::new(self.font.file_name(), self.font_size, color)?;
        Ok(ComposeRequest {
            text: self.text,
            style,
        })
    }
}

impl Default for ComposeRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Font lookup configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontConfig {
    /// Directories searched before the platform font directories
    pub search_dirs: Vec<PathBuf>,
    /// Skip the platform font directories
    pub skip_system_fonts: bool,
}

impl FontConfig {
    /// Configuration with directories from `IMGLY_TEXT_BEHIND_FONT_DIRS`
    #[must_use]
    pub fn from_env() -> Self {
        let search_dirs = std::env::var_os(FONT_DIRS_ENV)
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        Self {
            search_dirs,
            skip_system_fonts: false,
        }
    }

    #[must_use]
    pub fn with_search_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn without_system_fonts(mut self) -> Self {
        self.skip_system_fonts = true;
        self
    }
}

/// Settings for the HTTP interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Maximum accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Default upload limit of 200 MiB
    pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_upload_bytes: Self::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
