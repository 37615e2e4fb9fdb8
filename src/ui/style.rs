//! Presentation styles.
//!
//! A [`Style`] picks a [`Palette`], the set of ratatui styles every block
//! kind and render state is drawn with.

use ratatui::style::{Color, Modifier, Style as TextStyle};

use crate::document::BlockKind;

/// Named presentation style, selectable with `--style` and cycled with `s`.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Obsidian,
    Plain,
    HighContrast,
}

impl Style {
    pub const ALL: [Self; 3] = [Self::Obsidian, Self::Plain, Self::HighContrast];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Obsidian => "obsidian",
            Self::Plain => "plain",
            Self::HighContrast => "high-contrast",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// The style after this one, wrapping around.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Obsidian => Self::Plain,
            Self::Plain => Self::HighContrast,
            Self::HighContrast => Self::Obsidian,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Obsidian => Palette {
                headings: [
                    Color::Rgb(0xc7, 0x92, 0xea),
                    Color::Rgb(0x82, 0xaa, 0xff),
                    Color::Rgb(0x89, 0xdd, 0xff),
                    Color::Rgb(0xc3, 0xe8, 0x8d),
                    Color::Rgb(0xff, 0xcb, 0x6b),
                    Color::Rgb(0xf7, 0x8c, 0x6c),
                ],
                text: TextStyle::default().fg(Color::Rgb(0xdc, 0xdd, 0xde)),
                code: TextStyle::default()
                    .fg(Color::Rgb(0xe0, 0x6c, 0x75))
                    .bg(Color::Rgb(0x1e, 0x1e, 0x1e)),
                quote: TextStyle::default().fg(Color::Rgb(0x7f, 0x6d, 0xf2)),
                muted: TextStyle::default().fg(Color::Rgb(0x66, 0x66, 0x66)),
                error: TextStyle::default().fg(Color::Rgb(0xfb, 0x46, 0x4c)),
                ready: TextStyle::default().fg(Color::Rgb(0x44, 0xcf, 0x6e)),
                matched: TextStyle::default()
                    .bg(Color::Rgb(0x5c, 0x4a, 0x00))
                    .fg(Color::White),
                active_match: TextStyle::default()
                    .bg(Color::Rgb(0xe5, 0xb5, 0x67))
                    .fg(Color::Black),
                cursor: '▍',
            },
            Self::Plain => Palette {
                headings: [Color::Reset; 6],
                text: TextStyle::default(),
                code: TextStyle::default().add_modifier(Modifier::DIM),
                quote: TextStyle::default().add_modifier(Modifier::ITALIC),
                muted: TextStyle::default().add_modifier(Modifier::DIM),
                error: TextStyle::default().add_modifier(Modifier::BOLD),
                ready: TextStyle::default(),
                matched: TextStyle::default().add_modifier(Modifier::UNDERLINED),
                active_match: TextStyle::default().add_modifier(Modifier::REVERSED),
                cursor: '>',
            },
            Self::HighContrast => Palette {
                headings: [
                    Color::LightYellow,
                    Color::LightCyan,
                    Color::LightGreen,
                    Color::LightMagenta,
                    Color::White,
                    Color::White,
                ],
                text: TextStyle::default().fg(Color::White),
                code: TextStyle::default().fg(Color::LightGreen).bg(Color::Black),
                quote: TextStyle::default().fg(Color::LightCyan),
                muted: TextStyle::default().fg(Color::Gray),
                error: TextStyle::default()
                    .fg(Color::White)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
                ready: TextStyle::default().fg(Color::LightGreen),
                matched: TextStyle::default().fg(Color::Black).bg(Color::LightYellow),
                active_match: TextStyle::default()
                    .fg(Color::Black)
                    .bg(Color::LightMagenta)
                    .add_modifier(Modifier::BOLD),
                cursor: '█',
            },
        }
    }
}

/// Concrete colors for one [`Style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub headings: [Color; 6],
    pub text: TextStyle,
    pub code: TextStyle,
    pub quote: TextStyle,
    pub muted: TextStyle,
    pub error: TextStyle,
    pub ready: TextStyle,
    pub matched: TextStyle,
    pub active_match: TextStyle,
    pub cursor: char,
}

impl Palette {
    pub fn heading(&self, level: u8) -> TextStyle {
        let index = usize::from(level.clamp(1, 6) - 1);
        let style = TextStyle::default()
            .fg(self.headings[index])
            .add_modifier(Modifier::BOLD);
        if level == 1 {
            style.add_modifier(Modifier::UNDERLINED)
        } else {
            style
        }
    }

    /// Base style for a block's body text.
    pub fn for_kind(&self, kind: &BlockKind) -> TextStyle {
        match kind {
            BlockKind::Heading(level) => self.heading(*level),
            BlockKind::Code(_) => self.code,
            BlockKind::Callout(_) => self.quote,
            BlockKind::Diagram | BlockKind::Image => self.muted,
            BlockKind::Text | BlockKind::Table => self.text,
        }
    }
}
