//! In-memory terminal for rendering tests.
//!
//! [`VirtualTerminal`] feeds everything ratatui draws through a `vt100`
//! parser, so assertions run against the final screen a user would see,
//! escape sequences and all, rather than against ratatui's cell buffer.

use std::io;

use crossterm::{Command, cursor, style, terminal};
use ratatui::backend::{Backend, ClearType, WindowSize};
use ratatui::buffer::Cell;
use ratatui::layout::{Position, Size};
use ratatui::style::{Color, Style};

pub struct VirtualTerminal {
    parser: vt100::Parser,
}

impl VirtualTerminal {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            parser: vt100::Parser::new(height, width, 0),
        }
    }

    /// Screen text as `vt100` reports it: rows right-trimmed, trailing
    /// blank rows dropped.
    pub fn contents(&self) -> String {
        self.parser.screen().contents()
    }

    fn feed(&mut self, ansi: &str) {
        self.parser.process(ansi.as_bytes());
    }

    fn rows_cols(&self) -> (u16, u16) {
        self.parser.screen().size()
    }
}

/// Emit one style change, resetting first so attributes never leak from
/// the previous cell.
fn push_style(ansi: &mut String, style: Style) {
    let _ = style::SetAttribute(style::Attribute::Reset).write_ansi(ansi);
    if let Some(fg) = terminal_color(style.fg) {
        let _ = style::SetForegroundColor(fg).write_ansi(ansi);
    }
    if let Some(bg) = terminal_color(style.bg) {
        let _ = style::SetBackgroundColor(bg).write_ansi(ansi);
    }
}

impl Backend for VirtualTerminal {
    type Error = io::Error;

    fn draw<'a, I>(&mut self, content: I) -> io::Result<()>
    where
        I: Iterator<Item = (u16, u16, &'a Cell)>,
    {
        use std::fmt::Write;

        let mut ansi = String::new();
        let mut pen: Option<Style> = None;
        let mut next_cell: Option<(u16, u16)> = None;

        for (x, y, cell) in content {
            if next_cell != Some((x, y)) {
                let _ = cursor::MoveTo(x, y).write_ansi(&mut ansi);
            }
            if pen != Some(cell.style()) {
                push_style(&mut ansi, cell.style());
                pen = Some(cell.style());
            }
            let _ = write!(ansi, "{}", cell.symbol());
            next_cell = Some((x + 1, y));
        }

        self.feed(&ansi);
        Ok(())
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn show_cursor(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn get_cursor_position(&mut self) -> io::Result<Position> {
        let (row, col) = self.parser.screen().cursor_position();
        Ok(Position::new(col, row))
    }

    fn set_cursor_position<P: Into<Position>>(&mut self, position: P) -> io::Result<()> {
        let Position { x, y } = position.into();
        let mut ansi = String::new();
        let _ = cursor::MoveTo(x, y).write_ansi(&mut ansi);
        self.feed(&ansi);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        let mut ansi = String::new();
        let _ = terminal::Clear(terminal::ClearType::All).write_ansi(&mut ansi);
        self.feed(&ansi);
        Ok(())
    }

    fn clear_region(&mut self, _clear_type: ClearType) -> io::Result<()> {
        // Region granularity does not matter for these tests.
        self.clear()
    }

    fn size(&self) -> io::Result<Size> {
        let (rows, cols) = self.rows_cols();
        Ok(Size::new(cols, rows))
    }

    fn window_size(&mut self) -> io::Result<WindowSize> {
        let (rows, cols) = self.rows_cols();
        Ok(WindowSize {
            columns_rows: Size::new(cols, rows),
            pixels: Size::new(cols * 8, rows * 16),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn terminal_color(color: Option<Color>) -> Option<crossterm::style::Color> {
    use crossterm::style::Color as Ansi;

    match color? {
        Color::Reset => None,
        Color::Black => Some(Ansi::Black),
        Color::Red => Some(Ansi::DarkRed),
        Color::Green => Some(Ansi::DarkGreen),
        Color::Yellow => Some(Ansi::DarkYellow),
        Color::Blue => Some(Ansi::DarkBlue),
        Color::Magenta => Some(Ansi::DarkMagenta),
        Color::Cyan => Some(Ansi::DarkCyan),
        Color::Gray => Some(Ansi::Grey),
        Color::DarkGray => Some(Ansi::DarkGrey),
        Color::LightRed => Some(Ansi::Red),
        Color::LightGreen => Some(Ansi::Green),
        Color::LightYellow => Some(Ansi::Yellow),
        Color::LightBlue => Some(Ansi::Blue),
        Color::LightMagenta => Some(Ansi::Magenta),
        Color::LightCyan => Some(Ansi::Cyan),
        Color::White => Some(Ansi::White),
        Color::Rgb(r, g, b) => Some(Ansi::Rgb { r, g, b }),
        Color::Indexed(i) => Some(Ansi::AnsiValue(i)),
    }
}
