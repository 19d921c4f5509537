//! Fonts used on the face and greedy width-bounded text wrapping.

use embedded_graphics::mono_font::{
    ascii::{FONT_10X20, FONT_6X10, FONT_8X13},
    MonoFont,
};

// Measures rendered text in pixels
pub trait TextMetrics {
    fn text_width(&self, text: &str) -> f32;
    fn line_height(&self) -> f32;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FontId {
    // Institution labels
    Label,
    // Hour digits around the dial
    Marker,
    // Menu status and detail lines
    Message,
}

impl FontId {
    pub fn mono_font(self) -> &'static MonoFont<'static> {
        match self {
            FontId::Label => &FONT_8X13,
            FontId::Marker => &FONT_10X20,
            FontId::Message => &FONT_6X10,
        }
    }
}

impl TextMetrics for FontId {
    fn text_width(&self, text: &str) -> f32 {
        let font = self.mono_font();
        let advance = font.character_size.width + font.character_spacing;
        (text.chars().count() as u32 * advance) as f32
    }

    fn line_height(&self) -> f32 {
        self.mono_font().character_size.height as f32
    }
}

/// Split `text` into lines no wider than `max_width`.
///
/// Each step takes the longest prefix of what remains that still fits. A step
/// always takes at least one character, so a width narrower than a single
/// glyph still terminates. Joining the lines gives back `text` unchanged.
pub fn wrap<'a>(text: &'a str, max_width: f32, metrics: &impl TextMetrics) -> Vec<&'a str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = fitting_prefix_len(rest, max_width, metrics);
        let (line, tail) = rest.split_at(end);
        lines.push(line);
        rest = tail;
    }
    lines
}

// Byte length of the longest fitting prefix; never zero for non-empty text.
fn fitting_prefix_len(text: &str, max_width: f32, metrics: &impl TextMetrics) -> usize {
    let mut best = 0;
    for (idx, ch) in text.char_indices() {
        let end = idx + ch.len_utf8();
        if metrics.text_width(&text[..end]) > max_width {
            break;
        }
        best = end;
    }
    if best == 0 {
        text.chars().next().map_or(0, char::len_utf8)
    } else {
        best
    }
}
