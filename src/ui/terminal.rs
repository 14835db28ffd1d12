use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Write};
use std::ops::Range;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

use crate::models::filter::PROTOCOL_FILTERS;
use crate::models::packet::Protocol;
use crate::utils::error::AppResult;
use crate::utils::text::sanitize_for_display;
use crate::view::refresh::DisplaySurface;
use crate::view::render::{DisplayFrame, RenderedEntry};

/// Lines taken by the title, counters, filter bar, search line and separator
const HEADER_LINES: usize = 5;

/// Full-screen packet list on the controlling terminal.
///
/// Creating it switches the terminal to raw mode on the alternate screen;
/// dropping it restores the terminal.
pub struct TerminalSurface {
    writer: BufferWriter,
}

impl TerminalSurface {
    pub fn new() -> AppResult<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        Ok(Self {
            writer: BufferWriter::stdout(ColorChoice::Auto),
        })
    }
}

impl DisplaySurface for TerminalSurface {
    fn render(&mut self, frame: &DisplayFrame) -> AppResult<()> {
        let (cols, rows) = terminal::size()?;

        let mut stdout = io::stdout();
        queue!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;
        stdout.flush()?;

        let mut buffer = self.writer.buffer();
        write_frame(&mut buffer, frame, cols as usize, rows as usize)?;
        self.writer.print(&buffer)?;
        Ok(())
    }

    fn visible_entries(&self) -> Option<usize> {
        terminal::size()
            .ok()
            .map(|(_, rows)| (rows as usize).saturating_sub(HEADER_LINES))
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Keeps output inside a `cols` x `rows` area: characters past the right
/// edge are dropped, as is everything after the last row, including the
/// line feed that would scroll the screen.
struct Clipped<W> {
    inner: W,
    cols: usize,
    rows: usize,
    col: usize,
    row: usize,
}

impl<W> Clipped<W> {
    fn new(inner: W, cols: usize, rows: usize) -> Self {
        Self {
            inner,
            cols,
            rows,
            col: 0,
            row: 0,
        }
    }
}

impl<W: Write> Write for Clipped<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let mut kept = String::with_capacity(text.len());

        for c in text.chars() {
            match c {
                '\r' => {
                    if self.row < self.rows {
                        kept.push(c);
                    }
                    self.col = 0;
                }
                '\n' => {
                    self.row += 1;
                    if self.row < self.rows {
                        kept.push(c);
                    }
                }
                _ => {
                    if self.row < self.rows && self.col < self.cols {
                        kept.push(c);
                    }
                    self.col += 1;
                }
            }
        }

        self.inner.write_all(kept.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: WriteColor> WriteColor for Clipped<W> {
    fn supports_color(&self) -> bool {
        self.inner.supports_color()
    }

    fn set_color(&mut self, spec: &ColorSpec) -> io::Result<()> {
        self.inner.set_color(spec)
    }

    fn reset(&mut self) -> io::Result<()> {
        self.inner.reset()
    }
}

pub fn protocol_color(protocol: Protocol) -> Color {
    match protocol {
        Protocol::Dns => Color::Green,
        Protocol::Http => Color::Blue,
        Protocol::Tls => Color::Yellow,
        Protocol::Tcp => Color::Cyan,
        Protocol::Udp => Color::Magenta,
        Protocol::Quic => Color::Ansi256(129),
        Protocol::Icmp | Protocol::Icmpv6 => Color::Red,
        _ => Color::White,
    }
}

/// Draw a whole frame into a `cols` x `rows` screen. Raw mode needs explicit
/// carriage returns, so lines end in `\r\n`.
pub fn write_frame<W: WriteColor>(out: &mut W, frame: &DisplayFrame, cols: usize, rows: usize) -> io::Result<()> {
    let mut out = Clipped::new(out, cols, rows);

    write_header(&mut out, frame)?;
    write_counters(&mut out, frame)?;
    write_filter_bar(&mut out, frame)?;
    write_search_line(&mut out, frame)?;
    write!(out, "{}\r\n", "─".repeat(cols))?;

    let mut body_rows = rows.saturating_sub(HEADER_LINES);
    if let Some(status) = &frame.status {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "{}", sanitize_for_display(status))?;
        out.reset()?;
        write!(out, "\r\n")?;
        body_rows = body_rows.saturating_sub(1);
    }

    if frame.retained == 0 {
        out.set_color(ColorSpec::new().set_fg(Some(Color::White)))?;
        write!(out, "Waiting for packets...\r\n")?;
        write!(out, "Network traffic will be displayed here when detected.\r\n")?;
        out.reset()?;
        return Ok(());
    }

    for entry in frame.entries.iter().take(body_rows) {
        write_entry(&mut out, entry)?;
    }
    Ok(())
}

fn write_header<W: WriteColor>(out: &mut W, frame: &DisplayFrame) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Blue)).set_bold(true))?;
    write!(out, "netmon")?;
    out.reset()?;
    write!(
        out,
        " │ {} │ {} │ m: density │ q: quit\r\n",
        frame.interfaces.join(", "),
        frame.density.label(),
    )
}

fn write_counters<W: WriteColor>(out: &mut W, frame: &DisplayFrame) -> io::Result<()> {
    let stats = &frame.stats;
    write!(
        out,
        "retained {}  received {}  appended {}  evicted {}  ",
        frame.retained, stats.received, stats.appended, stats.evicted
    )?;
    if stats.dropped > 0 {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
    }
    write!(out, "dropped {}", stats.dropped)?;
    out.reset()?;
    write!(out, "  unclassified {}\r\n", stats.unclassified)
}

fn write_filter_bar<W: WriteColor>(out: &mut W, frame: &DisplayFrame) -> io::Result<()> {
    for (i, filter) in PROTOCOL_FILTERS.iter().enumerate() {
        if i > 0 {
            write!(out, "  ")?;
        }
        if i == frame.filter_index {
            out.set_color(
                ColorSpec::new()
                    .set_fg(Some(Color::Black))
                    .set_bg(Some(Color::Yellow))
                    .set_bold(true),
            )?;
        }
        write!(out, "[{}] {}", i + 1, filter.label)?;
        out.reset()?;
    }
    write!(out, "\r\n")
}

fn write_search_line<W: WriteColor>(out: &mut W, frame: &DisplayFrame) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
    if frame.search_mode {
        write!(out, "Search (ESC to close): ")?;
        out.reset()?;
        write!(out, "{}_\r\n", frame.search)
    } else if frame.search.is_empty() {
        write!(out, "Press Enter to search")?;
        out.reset()?;
        write!(out, "\r\n")
    } else {
        write!(out, "Search: ")?;
        out.reset()?;
        write!(out, "{}\r\n", frame.search)
    }
}

fn write_entry<W: WriteColor>(out: &mut W, entry: &RenderedEntry) -> io::Result<()> {
    out.set_color(
        ColorSpec::new()
            .set_fg(Some(protocol_color(entry.protocol)))
            .set_bold(true),
    )?;
    write!(out, " {:<6} ", entry.protocol.label())?;
    out.reset()?;
    write!(out, " │ ")?;

    write_highlighted(out, &entry.source, entry.source_highlight.as_ref(), Color::Cyan)?;
    write!(out, " → ")?;
    write_highlighted(out, &entry.destination, entry.destination_highlight.as_ref(), Color::Magenta)?;
    write!(out, " │ ")?;

    out.set_color(ColorSpec::new().set_fg(Some(Color::White)).set_dimmed(true))?;
    write!(out, "{}", entry.timestamp)?;
    out.reset()?;

    if !entry.detail.is_empty() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        write!(out, " {}", entry.detail)?;
        out.reset()?;
    }
    write!(out, "\r\n")
}

fn write_highlighted<W: WriteColor>(
    out: &mut W,
    text: &str,
    highlight: Option<&Range<usize>>,
    color: Color,
) -> io::Result<()> {
    let base = ColorSpec::new().set_fg(Some(color)).clone();

    match highlight.filter(|r| text.get((*r).clone()).is_some()) {
        Some(range) => {
            out.set_color(&base)?;
            write!(out, "{}", &text[..range.start])?;
            out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
            write!(out, "{}", &text[range.clone()])?;
            out.set_color(&base)?;
            write!(out, "{}", &text[range.end..])?;
        }
        None => {
            out.set_color(&base)?;
            write!(out, "{}", text)?;
        }
    }
    out.reset()
}
