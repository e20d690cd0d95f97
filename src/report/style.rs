//! Resolved report colors.
//!
//! Built once from `[style]` and passed to every drawing function.

use crate::config::StyleConfig;
use crate::models::GroupConfig;
use plotters::style::{FontDesc, FontFamily, FontStyle, RGBColor};
use std::collections::BTreeMap;
use tracing::warn;

/// Neutral gray used when a configured color is unusable.
const FALLBACK: RGBColor = RGBColor(0x6B, 0x72, 0x80);

/// Image width at which font and spacing sizes are used unscaled.
const BASE_WIDTH: f64 = 1200.0;

/// Report colors with every hex string already parsed.
#[derive(Debug, Clone)]
pub struct ReportStyle {
    /// Group identifiers in configuration order, parallel to `group_colors`.
    groups: Vec<String>,
    group_colors: Vec<RGBColor>,
    palette: Vec<RGBColor>,
    category_colors: BTreeMap<String, RGBColor>,
    pub highlight: RGBColor,
    pub muted: RGBColor,
    pub background: RGBColor,
    pub text: RGBColor,
    /// Multiplier applied to font sizes and spacing.
    pub scale: f64,
}

impl ReportStyle {
    pub fn new(style: &StyleConfig, groups: &[GroupConfig]) -> Self {
        let mut palette: Vec<RGBColor> = style.palette.iter().map(|c| color_or_fallback(c)).collect();
        if palette.is_empty() {
            palette.push(FALLBACK);
        }

        Self {
            groups: groups.iter().map(|g| g.id.clone()).collect(),
            group_colors: style.group_colors.iter().map(|c| color_or_fallback(c)).collect(),
            palette,
            category_colors: style
                .category_colors
                .iter()
                .map(|(k, v)| (k.clone(), color_or_fallback(v)))
                .collect(),
            highlight: color_or_fallback(&style.highlight),
            muted: color_or_fallback(&style.muted),
            background: color_or_fallback(&style.background),
            text: color_or_fallback(&style.text),
            scale: 1.0,
        }
    }

    /// Scale sizes for an image `width` pixels wide.
    pub fn scaled_for(mut self, width: u32) -> Self {
        self.scale = (width as f64 / BASE_WIDTH).max(0.5);
        self
    }

    pub fn font(&self, size: f64, bold: bool) -> FontDesc<'static> {
        let weight = if bold { FontStyle::Bold } else { FontStyle::Normal };
        FontDesc::new(FontFamily::SansSerif, size * self.scale, weight)
    }

    /// A length in pixels, scaled.
    pub fn px(&self, size: f64) -> i32 {
        (size * self.scale).round() as i32
    }

    /// Color of a group: its configured slot, else a palette entry by position.
    pub fn group_color(&self, group: &str, position: usize) -> RGBColor {
        self.groups
            .iter()
            .position(|g| g == group)
            .and_then(|i| self.group_colors.get(i).copied())
            .unwrap_or_else(|| self.palette_color(position))
    }

    /// Color of a category: its fixed color, else a palette entry by position.
    pub fn category_color(&self, category: &str, position: usize) -> RGBColor {
        self.category_colors
            .get(category)
            .copied()
            .unwrap_or_else(|| self.palette_color(position))
    }

    pub fn palette_color(&self, position: usize) -> RGBColor {
        self.palette[position % self.palette.len()]
    }
}

/// Parse `#rrggbb` (the leading `#` is optional).
pub fn parse_hex(value: &str) -> Option<RGBColor> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

fn color_or_fallback(value: &str) -> RGBColor {
    parse_hex(value).unwrap_or_else(|| {
        warn!("Invalid color '{}', using gray", value);
        FALLBACK
    })
}
