const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: usize = 5;
const TEXT_SCALE: i32 = 3;
const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;
const LINE_ADVANCE: i32 = (GLYPH_HEIGHT as i32 + 2) * TEXT_SCALE;
const PANEL_MARGIN: i32 = 16;
const PANEL_PADDING: i32 = 12;
const PANEL_BG_COLOR: [u8; 4] = [12, 14, 22, 235];
const PANEL_BORDER_COLOR: [u8; 4] = [214, 178, 74, 255];
const TITLE_COLOR: [u8; 4] = [250, 204, 21, 255];
const BODY_COLOR: [u8; 4] = [240, 244, 250, 255];

/// A boxed block of text pinned to the bottom of the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPanel {
    pub title: String,
    pub body: String,
}

impl TextPanel {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

pub(crate) fn draw_panel(frame: &mut [u8], width: u32, height: u32, panel: &TextPanel) {
    if width == 0 || height == 0 {
        return;
    }

    let panel_width = width as i32 - PANEL_MARGIN * 2;
    let max_chars = ((panel_width - PANEL_PADDING * 2) / GLYPH_ADVANCE).max(1) as usize;
    let body_lines = wrap_text(&panel.body, max_chars);
    let line_count = body_lines.len() as i32 + 1;
    let panel_height = line_count * LINE_ADVANCE + PANEL_PADDING * 2;
    let panel_left = PANEL_MARGIN;
    let panel_top = height as i32 - PANEL_MARGIN - panel_height;

    fill_rect(
        frame,
        width,
        height,
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        PANEL_BG_COLOR,
    );
    outline_rect(
        frame,
        width,
        height,
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        PANEL_BORDER_COLOR,
    );

    let text_left = panel_left + PANEL_PADDING;
    let mut y = panel_top + PANEL_PADDING;
    draw_text(frame, width, height, text_left, y, &panel.title, TITLE_COLOR);
    for line in body_lines {
        y += LINE_ADVANCE;
        draw_text(frame, width, height, text_left, y, &line, BODY_COLOR);
    }
}

/// Greedy word wrap; words longer than a line are hard-split.
pub(crate) fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let word_len = word.len();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub(crate) fn draw_text(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
) {
    let mut pen_x = x;
    for ch in text.chars() {
        if let Some(rows) = glyph_rows(ch) {
            draw_glyph(frame, width, height, pen_x, y, rows, color);
        }
        pen_x += GLYPH_ADVANCE;
    }
}

fn draw_glyph(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rows: [u8; GLYPH_HEIGHT],
    color: [u8; 4],
) {
    for (row_index, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            fill_rect(
                frame,
                width,
                height,
                x + col * TEXT_SCALE,
                y + row_index as i32 * TEXT_SCALE,
                TEXT_SCALE,
                TEXT_SCALE,
                color,
            );
        }
    }
}

/// `None` for blanks. Letters render upper-case; anything unknown renders
/// as `?`.
fn glyph_rows(ch: char) -> Option<[u8; GLYPH_HEIGHT]> {
    if ch.is_whitespace() {
        return None;
    }
    let upper = ch.to_ascii_uppercase();
    FONT.iter()
        .find(|(glyph_char, _)| *glyph_char == upper)
        .or_else(|| FONT.iter().find(|(glyph_char, _)| *glyph_char == '?'))
        .map(|(_, rows)| *rows)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x = x.saturating_add(rect_width).min(width as i32);
    let end_y = y.saturating_add(rect_height).min(height as i32);
    if end_x <= start_x || end_y <= start_y {
        return;
    }

    for py in start_y..end_y {
        for px in start_x..end_x {
            blend_pixel(frame, width as usize, px as usize, py as usize, color);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn outline_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    if rect_width <= 1 || rect_height <= 1 {
        return;
    }
    fill_rect(frame, width, height, x, y, rect_width, 2, color);
    fill_rect(frame, width, height, x, y + rect_height - 2, rect_width, 2, color);
    fill_rect(frame, width, height, x, y, 2, rect_height, color);
    fill_rect(frame, width, height, x + rect_width - 2, y, 2, rect_height, color);
}

/// Alpha-blends `color` over the frame pixel; out-of-range writes are dropped.
pub(crate) fn blend_pixel(frame: &mut [u8], width: usize, x: usize, y: usize, color: [u8; 4]) {
    let Some(offset) = y
        .checked_mul(width)
        .and_then(|row| row.checked_add(x))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    let Some(dst) = frame.get_mut(offset..offset + 4) else {
        return;
    };

    let alpha = color[3] as u32;
    if alpha == 255 {
        dst.copy_from_slice(&color);
        return;
    }
    for channel in 0..3 {
        let src = color[channel] as u32;
        let old = dst[channel] as u32;
        dst[channel] = ((src * alpha + old * (255 - alpha)) / 255) as u8;
    }
    dst[3] = 255;
}

const FONT: [(char, [u8; GLYPH_HEIGHT]); 46] = [
    ('A', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('B', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('C', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('D', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('E', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('F', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('G', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('H', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('I', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('J', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('K', [0b101, 0b101, 0b110, 0b101, 0b101]),
    ('L', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('M', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('N', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('O', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('P', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('Q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('R', [0b110, 0b101, 0b110, 0b101, 0b101]),
    ('S', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('T', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('U', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('V', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('W', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('X', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('Y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('Z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b110, 0b001, 0b010, 0b100, 0b111]),
    ('3', [0b110, 0b001, 0b010, 0b001, 0b110]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b110, 0b001, 0b110]),
    ('6', [0b011, 0b100, 0b110, 0b101, 0b010]),
    ('7', [0b111, 0b001, 0b010, 0b010, 0b010]),
    ('8', [0b010, 0b101, 0b010, 0b101, 0b010]),
    ('9', [0b010, 0b101, 0b011, 0b001, 0b110]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    (',', [0b000, 0b000, 0b000, 0b010, 0b100]),
    ('!', [0b010, 0b010, 0b010, 0b000, 0b010]),
    ('?', [0b110, 0b001, 0b010, 0b000, 0b010]),
    ('\'', [0b010, 0b010, 0b000, 0b000, 0b000]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
    ('(', [0b001, 0b010, 0b010, 0b010, 0b001]),
    (')', [0b100, 0b010, 0b010, 0b010, 0b100]),
    ('/', [0b001, 0b001, 0b010, 0b100, 0b100]),
];
