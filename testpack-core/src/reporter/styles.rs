// Copyright (c) The testpack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ANSI markup expansion and terminal-width-aware layout.
//!
//! A small owned set of `owo_colors::Style`s, toggled on only when the destination stream
//! actually supports color. Styled spans are expressed as `@|style text|@` markup embedded in
//! plain strings, rather than built up directly from `owo_colors` calls at each call site.

use owo_colors::{OwoColorize, Style};

/// One parsed style token inside a `@|...|@` span.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum StyleToken {
    Red,
    Green,
    Yellow,
    Blue,
    BgRed,
    BgGreen,
    BgYellow,
    Bold,
}

impl StyleToken {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "red" => Self::Red,
            "green" => Self::Green,
            "yellow" => Self::Yellow,
            "blue" => Self::Blue,
            "bg_red" => Self::BgRed,
            "bg_green" => Self::BgGreen,
            "bg_yellow" => Self::BgYellow,
            "bold" => Self::Bold,
            _ => return None,
        })
    }

    fn apply(self, style: Style) -> Style {
        match self {
            Self::Red => style.red(),
            Self::Green => style.green(),
            Self::Yellow => style.yellow(),
            Self::Blue => style.blue(),
            Self::BgRed => style.on_red(),
            Self::BgGreen => style.on_green(),
            Self::BgYellow => style.on_yellow(),
            Self::Bold => style.bold(),
        }
    }
}

/// Whether markup spans should be rendered as actual escape codes or stripped to plain text.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Colorize {
    Yes,
    No,
}

impl Colorize {
    /// Auto-detects colorization by whether the destination stream supports it
    /// (`supports-color`), with `Always`/`Never` overrides.
    pub fn for_stream(stream: supports_color::Stream, force: Option<bool>) -> Self {
        match force {
            Some(true) => Colorize::Yes,
            Some(false) => Colorize::No,
            None => {
                if supports_color::on_cached(stream).is_some() {
                    Colorize::Yes
                } else {
                    Colorize::No
                }
            }
        }
    }
}

/// Expands `@|style,style text|@` markup into ANSI escape sequences (or plain text, if
/// `colorize` is `No`).
///
/// Unknown style tokens are ignored (the text still renders, just unstyled for that token);
/// unterminated spans are passed through literally rather than erroring, since malformed markup
/// in a test's own failure message shouldn't crash the reporter.
pub fn render_markup(input: &str, colorize: Colorize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("@|") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(close) = after_open.find("|@") else {
            // No closing marker; emit the rest verbatim.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let body = &after_open[..close];
        let Some(space) = body.find(' ') else {
            // Malformed span (no style/text separator); pass through untouched.
            out.push_str("@|");
            out.push_str(body);
            out.push_str("|@");
            rest = &after_open[close + 2..];
            continue;
        };
        let style_spec = &body[..space];
        let text = &body[space + 1..];

        match colorize {
            Colorize::No => out.push_str(text),
            Colorize::Yes => {
                let mut style = Style::new();
                for token in style_spec.split(',') {
                    if let Some(parsed) = StyleToken::parse(token) {
                        style = parsed.apply(style);
                    }
                }
                out.push_str(&format!("{}", text.style(style)));
            }
        }

        rest = &after_open[close + 2..];
    }
    out.push_str(rest);
    out
}

/// The visible width of `s` with any ANSI escape sequences stripped out, as chars (not bytes) —
/// enough to drive fixed-width terminal padding without overcounting multi-byte UTF-8 runs.
pub fn display_width(s: &str) -> usize {
    match strip_ansi_escapes::strip_str(s) {
        stripped => stripped.chars().count(),
    }
}

/// The current terminal width, or `0` if it can't be determined (which callers should treat as
/// "padding disabled").
pub fn terminal_width() -> usize {
    crossterm::terminal::size().map(|(cols, _)| cols as usize).unwrap_or(0)
}

/// Right-pads `left` with spaces so that `left` + padding + `right` exactly fills `width`,
/// clamping to "just put a single space between them" if `right` alone would overflow the width.
pub fn right_align(left: &str, right: &str, width: usize) -> String {
    if width == 0 {
        return format!("{left}  {right}");
    }
    let used = display_width(left) + display_width(right);
    if used >= width {
        return format!("{left}  {right}");
    }
    let padding = width - used;
    format!("{left}{}{right}", " ".repeat(padding))
}
