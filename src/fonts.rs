//! Font lookup, measurement and drawing
//!
//! A font identifier is either a path or a file name such as `arial.ttf`. File
//! names are matched case-insensitively in the configured directories and then
//! in the platform font directories. When nothing loads, text is drawn with a
//! built-in 8x8 bitmap font whose size ignores the requested point size.

use crate::config::FontConfig;
use crate::error::{Result, TextBehindError};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Edge length of a fallback glyph cell in pixels
pub const FALLBACK_GLYPH_SIZE: u32 = 8;

/// Extra pixels between stacked lines of text
pub const LINE_SPACING: u32 = 4;

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

/// Lines of `text`, one entry for empty text
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Built-in bitmap font used when the requested font cannot be loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct BitmapFont;

impl BitmapFont {
    /// Every character advances one cell; unknown characters draw as blanks
    #[must_use]
    pub fn measure(self, text: &str) -> (u32, u32) {
        let cells = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        (cells.saturating_mul(FALLBACK_GLYPH_SIZE), FALLBACK_GLYPH_SIZE)
    }

    fn glyph(ch: char) -> [u8; 8] {
        BASIC_FONTS
            .get(ch)
            .or_else(|| LATIN_FONTS.get(ch))
            .unwrap_or([0; 8])
    }

    pub fn draw(self, canvas: &mut RgbaImage, color: Rgba<u8>, x: i64, y: i64, text: &str) {
        let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));
        let cell = i64::from(FALLBACK_GLYPH_SIZE);

        for (index, ch) in text.chars().enumerate() {
            let origin_x = x + index as i64 * cell;
            if origin_x >= width {
                break;
            }
            for (row, bits) in Self::glyph(ch).iter().enumerate() {
                let py = y + row as i64;
                for col in 0..8_i64 {
                    // Bit 0 is the leftmost pixel
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    let px = origin_x + col;
                    if (0..width).contains(&px) && (0..height).contains(&py) {
                        canvas.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

/// A font ready to measure and draw at a fixed size
#[derive(Debug, Clone)]
pub enum ResolvedFont {
    Scalable {
        name: String,
        font: FontArc,
        scale: PxScale,
    },
    Fallback(BitmapFont),
}

impl ResolvedFont {
    /// Scale a loaded font so that one em is `size` pixels
    #[must_use]
    pub fn scalable(name: String, font: FontArc, size: u32) -> Self {
        let units_per_em = font.units_per_em().unwrap_or(1000.0);
        let scale = PxScale::from(size as f32 * font.height_unscaled() / units_per_em);
        Self::Scalable { name, font, scale }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalable { name, .. } => name,
            Self::Fallback(_) => "builtin-8x8",
        }
    }

    /// Vertical distance between the tops of consecutive lines
    #[must_use]
    pub fn line_advance(&self) -> u32 {
        let line_height = match self {
            Self::Scalable { font, scale, .. } => {
                let scaled = font.as_scaled(*scale);
                (scaled.height() + scaled.line_gap()).ceil().max(0.0) as u32
            },
            Self::Fallback(_) => FALLBACK_GLYPH_SIZE,
        };
        line_height.saturating_add(LINE_SPACING)
    }

    fn measure_line(&self, line: &str) -> (u32, u32) {
        match self {
            Self::Scalable { font, scale, .. } => imageproc::drawing::text_size(*scale, font, line),
            Self::Fallback(bitmap) => bitmap.measure(line),
        }
    }

    /// Rendered `(width, height)` of `text`
    ///
    /// Lines split on `\n` are left-aligned and stacked [`Self::line_advance`]
    /// pixels apart; the width is that of the widest line.
    #[must_use]
    pub fn measure(&self, text: &str) -> (u32, u32) {
        let advance = self.line_advance();
        let mut width = 0;
        let mut height = 0;
        for (index, line) in split_lines(text).enumerate() {
            let (line_width, line_height) = self.measure_line(line);
            width = width.max(line_width);
            let top = u32::try_from(index).unwrap_or(u32::MAX).saturating_mul(advance);
            height = top.saturating_add(line_height);
        }
        (width, height)
    }

    /// Draw `text` with its top-left corner at `(x, y)`, clipping at the canvas edges
    pub fn draw(&self, canvas: &mut RgbaImage, color: Rgba<u8>, x: i64, y: i64, text: &str) {
        let advance = i64::from(self.line_advance());
        for (index, line) in split_lines(text).enumerate() {
            let line_y = y.saturating_add((index as i64).saturating_mul(advance));
            if line_y >= i64::from(canvas.height()) {
                break;
            }
            match self {
                Self::Scalable { font, scale, .. } => {
                    imageproc::drawing::draw_text_mut(
                        canvas,
                        color,
                        clamp_to_i32(x),
                        clamp_to_i32(line_y),
                        *scale,
                        font,
                        line,
                    );
                },
                Self::Fallback(bitmap) => bitmap.draw(canvas, color, x, line_y, line),
            }
        }
    }
}

fn clamp_to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Finds and loads fonts by name or path
#[derive(Debug, Clone, Default)]
pub struct FontResolver {
    config: FontConfig,
}

impl FontResolver {
    #[must_use]
    pub fn new(config: FontConfig) -> Self {
        Self { config }
    }

    /// Resolver using `IMGLY_TEXT_BEHIND_FONT_DIRS` plus the platform directories
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(FontConfig::from_env())
    }

    #[must_use]
    pub fn config(&self) -> &FontConfig {
        &self.config
    }

    /// Platform font directories that exist on this machine
    #[must_use]
    pub fn system_font_dirs() -> Vec<PathBuf> {
        let mut dirs_list = Vec::new();
        if cfg!(target_os = "windows") {
            if let Some(windir) = std::env::var_os("WINDIR") {
                dirs_list.push(PathBuf::from(windir).join("Fonts"));
            }
        } else if cfg!(target_os = "macos") {
            dirs_list.push(PathBuf::from("/System/Library/Fonts"));
            dirs_list.push(PathBuf::from("/Library/Fonts"));
        } else {
            dirs_list.push(PathBuf::from("/usr/share/fonts"));
            dirs_list.push(PathBuf::from("/usr/local/share/fonts"));
            if let Some(home) = dirs::home_dir() {
                dirs_list.push(home.join(".fonts"));
            }
        }
        if let Some(user_fonts) = dirs::font_dir() {
            dirs_list.push(user_fonts);
        }
        dirs_list.retain(|dir| dir.is_dir());
        dirs_list
    }

    /// File names accepted for `identifier`, lowercase
    fn candidate_names(identifier: &str) -> Vec<String> {
        let lower = identifier.to_lowercase();
        let has_extension = Path::new(&lower)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FONT_EXTENSIONS.contains(&ext));
        if has_extension {
            vec![lower]
        } else {
            FONT_EXTENSIONS
                .iter()
                .map(|ext| format!("{}.{}", lower, ext))
                .collect()
        }
    }

    /// Locate the font file for `identifier` without loading it
    #[must_use]
    pub fn locate(&self, identifier: &str) -> Option<PathBuf> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }

        let direct = Path::new(identifier);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }

        let names = Self::candidate_names(identifier);
        let system_dirs = if self.config.skip_system_fonts {
            Vec::new()
        } else {
            Self::system_font_dirs()
        };

        self.config
            .search_dirs
            .iter()
            .chain(system_dirs.iter())
            .find_map(|dir| Self::find_in_dir(dir, &names))
    }

    fn find_in_dir(dir: &Path, names: &[String]) -> Option<PathBuf> {
        WalkDir::new(dir)
            .follow_links(true)
            .max_depth(6)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| names.contains(&name.to_lowercase()))
            })
            .map(walkdir::DirEntry::into_path)
    }

    /// Load `identifier` at `size`
    ///
    /// # Errors
    /// - `Font` when the font cannot be found or parsed
    /// - `Io` when the file cannot be read
    pub fn load(&self, identifier: &str, size: u32) -> Result<ResolvedFont> {
        let path = self.locate(identifier).ok_or_else(|| {
            TextBehindError::font(format!("Font '{}' not found", identifier))
        })?;
        let data = std::fs::read(&path)
            .map_err(|e| TextBehindError::file_io_error("read font", &path, &e))?;
        let font = FontArc::try_from_vec(data).map_err(|e| {
            TextBehindError::font(format!("Failed to parse font {}: {}", path.display(), e))
        })?;

        let name = path
            .file_name()
            .map_or_else(|| identifier.to_string(), |n| n.to_string_lossy().to_string());
        tracing::debug!(font = %name, path = %path.display(), size, "Loaded font");
        Ok(ResolvedFont::scalable(name, font, size))
    }

    /// Load `identifier` at `size`, falling back to the bitmap font on any failure
    #[must_use]
    pub fn resolve(&self, identifier: &str, size: u32) -> ResolvedFont {
        match self.load(identifier, size) {
            Ok(font) => font,
            Err(e) => {
                tracing::warn!(
                    font = identifier,
                    error = %e,
                    "Falling back to the built-in bitmap font; requested size is ignored"
                );
                ResolvedFont::Fallback(BitmapFont)
            },
        }
    }
}
