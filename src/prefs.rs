//! Accessibility preferences: typography settings with bounded steppers.

use serde::{Deserialize, Serialize};

pub const FONT_SIZE_MIN: u16 = 12;
pub const FONT_SIZE_MAX: u16 = 32;
pub const FONT_SIZE_STEP: u16 = 2;

pub const LINE_SPACING_MIN: f32 = 1.0;
pub const LINE_SPACING_MAX: f32 = 3.0;
pub const LINE_SPACING_STEP: f32 = 0.25;

/// Reader-friendly font families. The terminal cannot change its own
/// font, so the selection is advisory: shown in the header and persisted
/// for companion front-ends that can apply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    OpenDyslexic,
    Arial,
    ComicSans,
    Verdana,
}

impl FontFamily {
    pub fn display_name(&self) -> &'static str {
        match self {
            FontFamily::OpenDyslexic => "OpenDyslexic",
            FontFamily::Arial => "Arial",
            FontFamily::ComicSans => "Comic Sans MS",
            FontFamily::Verdana => "Verdana",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            FontFamily::OpenDyslexic => FontFamily::Arial,
            FontFamily::Arial => FontFamily::ComicSans,
            FontFamily::ComicSans => FontFamily::Verdana,
            FontFamily::Verdana => FontFamily::OpenDyslexic,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccessibilityPrefs {
    pub font_size_px: u16,
    pub line_spacing: f32,
    pub font_family: FontFamily,
}

impl Default for AccessibilityPrefs {
    fn default() -> Self {
        Self {
            font_size_px: 18,
            line_spacing: 1.5,
            font_family: FontFamily::OpenDyslexic,
        }
    }
}

impl AccessibilityPrefs {
    pub fn font_size_up(&mut self) {
        self.font_size_px = (self.font_size_px + FONT_SIZE_STEP).min(FONT_SIZE_MAX);
    }

    pub fn font_size_down(&mut self) {
        self.font_size_px = self
            .font_size_px
            .saturating_sub(FONT_SIZE_STEP)
            .max(FONT_SIZE_MIN);
    }

    pub fn line_spacing_up(&mut self) {
        self.line_spacing = (self.line_spacing + LINE_SPACING_STEP).min(LINE_SPACING_MAX);
    }

    pub fn line_spacing_down(&mut self) {
        self.line_spacing = (self.line_spacing - LINE_SPACING_STEP).max(LINE_SPACING_MIN);
    }

    pub fn cycle_font(&mut self) {
        self.font_family = self.font_family.next();
    }

    /// Blank lines inserted between rendered message lines. 1.0..1.75
    /// maps to none, 1.75..2.75 to one, 2.75+ to two.
    pub fn blank_lines(&self) -> usize {
        ((self.line_spacing - 1.0) / 0.875).round() as usize
    }

    /// Clamp out-of-range values loaded from an edited config file.
    pub fn sanitized(mut self) -> Self {
        self.font_size_px = self.font_size_px.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
        self.line_spacing = self.line_spacing.clamp(LINE_SPACING_MIN, LINE_SPACING_MAX);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_size_clamps_at_bounds() {
        let mut prefs = AccessibilityPrefs::default();
        for _ in 0..50 {
            prefs.font_size_up();
        }
        assert_eq!(prefs.font_size_px, FONT_SIZE_MAX);
        for _ in 0..50 {
            prefs.font_size_down();
        }
        assert_eq!(prefs.font_size_px, FONT_SIZE_MIN);
    }

    #[test]
    fn test_line_spacing_clamps_at_bounds() {
        let mut prefs = AccessibilityPrefs::default();
        for _ in 0..50 {
            prefs.line_spacing_up();
        }
        assert_eq!(prefs.line_spacing, LINE_SPACING_MAX);
        for _ in 0..50 {
            prefs.line_spacing_down();
        }
        assert_eq!(prefs.line_spacing, LINE_SPACING_MIN);
    }

    #[test]
    fn test_font_cycle_covers_all_families() {
        let mut prefs = AccessibilityPrefs::default();
        let start = prefs.font_family;
        let mut seen = vec![start];
        for _ in 0..3 {
            prefs.cycle_font();
            assert!(!seen.contains(&prefs.font_family));
            seen.push(prefs.font_family);
        }
        prefs.cycle_font();
        assert_eq!(prefs.font_family, start);
    }

    #[test]
    fn test_blank_lines_mapping() {
        let prefs = |s| AccessibilityPrefs {
            line_spacing: s,
            ..Default::default()
        };
        assert_eq!(prefs(1.0).blank_lines(), 0);
        assert_eq!(prefs(1.5).blank_lines(), 1);
        assert_eq!(prefs(2.0).blank_lines(), 1);
        assert_eq!(prefs(3.0).blank_lines(), 2);
    }

    #[test]
    fn test_sanitized_clamps_loaded_values() {
        let prefs = AccessibilityPrefs {
            font_size_px: 100,
            line_spacing: 0.1,
            font_family: FontFamily::Verdana,
        }
        .sanitized();
        assert_eq!(prefs.font_size_px, FONT_SIZE_MAX);
        assert_eq!(prefs.line_spacing, LINE_SPACING_MIN);
    }
}
