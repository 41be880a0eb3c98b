//! Bus value carriers: addresses, data bytes, and packed RGBA colors.

use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// 16-bit bus address.
pub type Address = u16;

/// 8-bit bus datum.
pub type Data = u8;

/// A 32-bit packed RGBA color, channels big-endian (R highest, A lowest).
/// `alpha == 0` means fully transparent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32)
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }
    pub const fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }
    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }
    pub const fn a(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_opaque(self) -> bool {
        self.a() != 0
    }

    /// Scale each color channel by `factor`, clamping to 255. Alpha is untouched.
    pub fn scale(self, factor: f32) -> Self {
        let clamp = |v: u8| -> u8 { ((v as f32) * factor).round().clamp(0.0, 255.0) as u8 };
        Self::new(clamp(self.r()), clamp(self.g()), clamp(self.b()), self.a())
    }

    /// Additively blend two colors, averaging alpha.
    pub fn blend(self, other: Self) -> Self {
        let add = |a: u8, b: u8| -> u8 { (a as u16 + b as u16).min(255) as u8 };
        Self::new(
            add(self.r(), other.r()),
            add(self.g(), other.g()),
            add(self.b(), other.b()),
            ((self.a() as u16 + other.a() as u16) / 2) as u8,
        )
    }

    /// Replace `self` with `other` only if `other` is opaque.
    pub fn set_if_opaque(self, other: Self) -> Self {
        if other.is_opaque() { other } else { self }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// An ordered palette of [`Rgba`] entries, loadable from / savable to a text
/// file of 8-hex-digit lines (`RRGGBBAA`). Empty lines and lines beginning
/// with `#` are ignored on load.
#[derive(Clone, Debug, Default)]
pub struct RgbaTable {
    entries: Vec<Rgba>,
}

impl RgbaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Rgba>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, color: Rgba) {
        self.entries.push(color);
    }

    pub fn get(&self, index: usize) -> Option<Rgba> {
        self.entries.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Rgba> + '_ {
        self.entries.iter().copied()
    }

    /// Load a palette from a text file: one color per line, exactly eight
    /// hex digits (`RRGGBBAA`). Blank lines and `#`-comments are skipped;
    /// any other malformed line is an `InvalidArgument` error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut table = Self::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| Error::Io {
                path: path.display().to_string(),
                source,
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.len() != 8 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidArgument(format!(
                    "malformed palette line: {trimmed:?}"
                )));
            }
            let value = u32::from_str_radix(trimmed, 16)
                .map_err(|_| Error::InvalidArgument(format!("malformed palette line: {trimmed:?}")))?;
            table.push(Rgba(value));
        }
        Ok(table)
    }

    /// Save the palette back out in the same one-color-per-line format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = fs::File::create(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        for color in &self.entries {
            writeln!(file, "{color}").map_err(|source| Error::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_preserves_alpha() {
        let c = Rgba::new(100, 100, 100, 0xFF);
        let scaled = c.scale(1.82);
        assert_eq!(scaled.a(), 0xFF);
        assert_eq!(scaled.r(), 182);
    }

    #[test]
    fn transparent_has_zero_alpha() {
        let c = Rgba::new(10, 20, 30, 0);
        assert!(!c.is_opaque());
    }

    #[test]
    fn set_if_opaque_keeps_base_when_transparent() {
        let base = Rgba::new(1, 2, 3, 0xFF);
        let overlay = Rgba::new(9, 9, 9, 0);
        assert_eq!(base.set_if_opaque(overlay), base);
    }

    #[test]
    fn rgba_table_round_trips_through_a_file() {
        let dir = std::env::temp_dir().join(format!("tubecore-palette-test-{:p}", &dir_marker()));
        let table = RgbaTable::from_entries(vec![
            Rgba(0xFF0000FF),
            Rgba(0x00FF00FF),
            Rgba(0x0000FFFF),
        ]);
        table.save(&dir).unwrap();
        let loaded = RgbaTable::load(&dir).unwrap();
        assert_eq!(loaded.len(), 3);
        for (a, b) in table.iter().zip(loaded.iter()) {
            assert_eq!(a, b);
        }
        std::fs::remove_file(&dir).ok();
    }

    fn dir_marker() -> u8 {
        0
    }

    #[test]
    fn load_skips_blank_and_comment_lines() {
        let dir = std::env::temp_dir().join("tubecore-palette-comment-test");
        std::fs::write(&dir, "# header\n\nFF0000FF\n\n00FF00FF\n").unwrap();
        let loaded = RgbaTable::load(&dir).unwrap();
        assert_eq!(loaded.len(), 2);
        std::fs::remove_file(&dir).ok();
    }

    #[test]
    fn load_rejects_malformed_line() {
        let dir = std::env::temp_dir().join("tubecore-palette-bad-test");
        std::fs::write(&dir, "NOTHEX12\n").unwrap();
        assert!(RgbaTable::load(&dir).is_err());
        std::fs::remove_file(&dir).ok();
    }
}
