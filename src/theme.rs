use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub accent: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  pub overlay_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Fuego",
    bg: Color::Rgb(12, 10, 16),
    fg: Color::Rgb(236, 232, 240),
    muted: Color::Rgb(128, 120, 140),
    accent: Color::Rgb(236, 72, 153),
    border: Color::Rgb(70, 56, 90),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(124, 58, 237),
    stripe_bg: Color::Rgb(20, 17, 26),
    status: Color::Rgb(250, 204, 21),
    error: Color::Rgb(248, 113, 113),
    key_fg: Color::Rgb(12, 10, 16),
    key_bg: Color::Rgb(192, 132, 252),
    overlay_bg: Color::Rgb(0, 0, 0),
  },
  Theme {
    name: "Humo",
    bg: Color::Rgb(24, 26, 30),
    fg: Color::Rgb(220, 223, 228),
    muted: Color::Rgb(120, 126, 136),
    accent: Color::Rgb(125, 211, 252),
    border: Color::Rgb(63, 68, 78),
    highlight_fg: Color::Rgb(24, 26, 30),
    highlight_bg: Color::Rgb(148, 163, 184),
    stripe_bg: Color::Rgb(30, 33, 38),
    status: Color::Rgb(134, 239, 172),
    error: Color::Rgb(252, 165, 165),
    key_fg: Color::Rgb(24, 26, 30),
    key_bg: Color::Rgb(125, 211, 252),
    overlay_bg: Color::Rgb(8, 9, 11),
  },
  Theme {
    name: "Papel",
    bg: Color::Rgb(250, 247, 240),
    fg: Color::Rgb(40, 36, 32),
    muted: Color::Rgb(140, 132, 120),
    accent: Color::Rgb(194, 65, 12),
    border: Color::Rgb(214, 205, 190),
    highlight_fg: Color::Rgb(250, 247, 240),
    highlight_bg: Color::Rgb(194, 65, 12),
    stripe_bg: Color::Rgb(243, 238, 228),
    status: Color::Rgb(21, 128, 61),
    error: Color::Rgb(185, 28, 28),
    key_fg: Color::Rgb(250, 247, 240),
    key_bg: Color::Rgb(120, 90, 60),
    overlay_bg: Color::Rgb(235, 230, 220),
  },
];

pub fn theme_index(name: &str) -> usize {
  THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(name)).unwrap_or(0)
}
