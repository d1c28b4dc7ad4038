use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Color as CtColor, Stylize};
use std::io::{self, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 255,
    };
    pub const MAGENTA: Color = Color::Rgb {
        r: 255,
        g: 0,
        b: 255,
    };
    pub const PURPLE: Color = Color::Rgb {
        r: 180,
        g: 100,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Box Drawing Characters
// ═══════════════════════════════════════════════════════════════════════════════

pub mod box_chars {
    pub const SINGLE_HORIZONTAL: &str = "─";

    // Rounded box
    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";

    // Arrows and bullets
    pub const ARROW_RIGHT: &str = "▶";
    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
    pub const WARNING: &str = "⚠";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Painting
// ═══════════════════════════════════════════════════════════════════════════════

/// Colors text when enabled, so output stays plain when piped.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn paint(&self, text: &str, color: CtColor) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str, color: CtColor) -> String {
        if self.enabled {
            text.with(color).bold().to_string()
        } else {
            text.to_string()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Width Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Cut `text` to at most `max` display columns, marking the cut with `…`.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Pad `text` with spaces up to `width` display columns.
pub fn pad_to_width(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(padding))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn success_line(painter: Painter, message: &str) -> String {
    format!(
        " {} {}",
        painter.bold(box_chars::CHECK, colors::GREEN),
        painter.paint(message, colors::GREEN)
    )
}

pub fn error_line(painter: Painter, message: &str) -> String {
    format!(
        " {} {}",
        painter.bold(box_chars::CROSS_MARK, colors::RED),
        painter.paint(message, colors::RED)
    )
}

pub fn warning_line(painter: Painter, message: &str) -> String {
    format!(
        " {} {}",
        painter.bold(box_chars::WARNING, colors::ORANGE),
        painter.paint(message, colors::ORANGE)
    )
}

pub fn print_success(painter: Painter, message: &str) {
    println!("{}", success_line(painter, message));
}

pub fn print_error(painter: Painter, message: &str) {
    eprintln!("{}", error_line(painter, message));
}

pub fn print_warning(painter: Painter, message: &str) {
    println!("{}", warning_line(painter, message));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Section Headers
// ═══════════════════════════════════════════════════════════════════════════════

pub const SECTION_WIDTH: usize = 60;

pub fn section_header(painter: Painter, title: &str) -> String {
    let title_len = title.width();
    let padding = SECTION_WIDTH.saturating_sub(title_len + 4) / 2;
    let rest = SECTION_WIDTH.saturating_sub(title_len + 4 + padding);
    format!(
        "{}{} {} {}{}",
        painter.paint(box_chars::ROUND_TOP_LEFT, colors::CYAN),
        painter.paint(&box_chars::SINGLE_HORIZONTAL.repeat(padding), colors::CYAN),
        painter.bold(title, colors::CYAN),
        painter.paint(&box_chars::SINGLE_HORIZONTAL.repeat(rest), colors::CYAN),
        painter.paint(box_chars::ROUND_TOP_RIGHT, colors::CYAN),
    )
}

pub fn section_footer(painter: Painter) -> String {
    format!(
        "{}{}{}",
        painter.paint(box_chars::ROUND_BOTTOM_LEFT, colors::CYAN),
        painter.paint(
            &box_chars::SINGLE_HORIZONTAL.repeat(SECTION_WIDTH - 2),
            colors::CYAN
        ),
        painter.paint(box_chars::ROUND_BOTTOM_RIGHT, colors::CYAN),
    )
}

pub fn flush() {
    let _ = io::stdout().flush();
}
