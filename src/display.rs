use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Kitty,
  Direct,
  Ascii,
}

/// How thumbnails are drawn in the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
  Kitty,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
      DisplayMode::Kitty => "Kitty",
    }
  }

  /// Whether images bypass the cell buffer and go straight to the terminal.
  pub fn uses_graphics_protocol(self) -> bool {
    self == DisplayMode::Kitty
  }
}

/// Pick a display mode from terminal environment values.
///
/// Probe order: Kitty graphics > true-color half-block > ASCII
fn detect_from(term: &str, term_program: &str, colorterm: &str) -> DisplayMode {
  let term_program = term_program.to_lowercase();
  if term == "xterm-kitty" || matches!(term_program.as_str(), "kitty" | "wezterm" | "ghostty") {
    return DisplayMode::Kitty;
  }

  let colorterm = colorterm.to_lowercase();
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }

  DisplayMode::Ascii
}

pub fn detect_display_mode() -> DisplayMode {
  let var = |name: &str| std::env::var(name).unwrap_or_default();
  detect_from(&var("TERM"), &var("TERM_PROGRAM"), &var("COLORTERM"))
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Kitty => DisplayMode::Kitty,
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detect_kitty() {
    assert_eq!(detect_from("xterm-kitty", "", ""), DisplayMode::Kitty);
    assert_eq!(detect_from("xterm-256color", "WezTerm", ""), DisplayMode::Kitty);
  }

  #[test]
  fn detect_truecolor() {
    assert_eq!(detect_from("xterm-256color", "Apple_Terminal", "truecolor"), DisplayMode::Direct);
    assert_eq!(detect_from("xterm", "", "24BIT"), DisplayMode::Direct);
  }

  #[test]
  fn detect_fallback_ascii() {
    assert_eq!(detect_from("vt100", "", ""), DisplayMode::Ascii);
  }
}
