use crate::host::Host;

// DISPLAY MODEL
// ================================================================================================

/// Character width of one display row.
pub const DISP_COLS: usize = 22;

/// Number of text rows.
pub const DISP_ROWS: usize = 2;

/// The two-row text display.
///
/// The engine composes rows of text; glyph rasterization onto the 131×16 bitmap belongs to
/// the shell's skin renderer, so `flush` hands the shell the packed row bytes and lets it
/// draw. Annunciator changes go out through the same flush.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Display {
    rows: [String; DISP_ROWS],
    dirty: bool,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self, idx: usize) -> &str {
        &self.rows[idx]
    }

    pub fn clear_row(&mut self, idx: usize) {
        self.rows[idx].clear();
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        for r in &mut self.rows {
            r.clear();
        }
        self.dirty = true;
    }

    /// Replaces a row, truncating at the display width.
    pub fn draw(&mut self, idx: usize, text: &str) {
        let mut text = text.to_string();
        let mut width = 0;
        text = text
            .chars()
            .take_while(|_| {
                width += 1;
                width <= DISP_COLS
            })
            .collect();
        self.rows[idx] = text;
        self.dirty = true;
    }

    /// Right-aligned draw, the convention for X-register rendering.
    pub fn draw_right(&mut self, idx: usize, text: &str) {
        let chars = text.chars().count();
        if chars >= DISP_COLS {
            self.draw(idx, text);
        } else {
            let padded = format!("{:>width$}", text, width = DISP_COLS);
            self.rows[idx] = padded;
            self.dirty = true;
        }
    }

    /// Pushes dirty rows to the shell.
    pub fn flush(&mut self, host: &mut impl Host) {
        if !self.dirty {
            return;
        }
        for (y, row) in self.rows.iter().enumerate() {
            host.blitter(row.as_bytes(), row.len().max(1), 0, y, DISP_COLS, 1);
        }
        self.dirty = false;
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_truncates_to_width() {
        let mut d = Display::new();
        d.draw(0, &"x".repeat(30));
        assert_eq!(d.row(0).len(), DISP_COLS);
    }

    #[test]
    fn draw_right_pads() {
        let mut d = Display::new();
        d.draw_right(1, "42");
        assert_eq!(d.row(1).len(), DISP_COLS);
        assert!(d.row(1).ends_with("42"));
    }
}
