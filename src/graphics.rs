use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat};
use ratatui::{
  buffer::Buffer,
  layout::{Alignment, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Paragraph, Widget, Wrap},
};
use std::io::{Cursor, Write};

use crate::display::DisplayMode;
use crate::theme::Theme;

// --- Thumbnail Widget ---

/// Draws an already-resized thumbnail into the cell buffer. Kitty mode draws
/// nothing here; the image is sent out of band after the frame.
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_half_blocks(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
      DisplayMode::Kitty => {}
    }
  }
}

/// Top-left cell that centers a `w` x `h` cell image inside `area`.
fn centered_origin(area: Rect, w: u32, h: u32) -> (u16, u16) {
  let dx = (area.width as u32).saturating_sub(w) / 2;
  let dy = (area.height as u32).saturating_sub(h) / 2;
  (area.x.saturating_add(dx.min(u16::MAX as u32) as u16), area.y.saturating_add(dy.min(u16::MAX as u32) as u16))
}

fn render_half_blocks(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  // Each cell shows two vertical pixels: upper as foreground, lower as background.
  let rgb = image.to_rgb8();
  let cols = rgb.width().min(area.width as u32);
  let rows = rgb.height().div_ceil(2).min(area.height as u32);
  let (ox, oy) = centered_origin(area, cols, rows);

  for row in 0..rows {
    for col in 0..cols {
      let upper = rgb.get_pixel(col, row * 2);
      let bg = match rgb.get_pixel_checked(col, row * 2 + 1) {
        Some(lower) => Color::Rgb(lower[0], lower[1], lower[2]),
        None => Color::Reset,
      };
      let style = Style::default().fg(Color::Rgb(upper[0], upper[1], upper[2])).bg(bg);
      buf.set_string(ox + col as u16, oy + row as u16, "▀", style);
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let cols = luma.width().min(area.width as u32);
  let rows = luma.height().min(area.height as u32);
  let (ox, oy) = centered_origin(area, cols, rows);
  let steps = (ASCII_RAMP.len() - 1) as f32;

  for row in 0..rows {
    for col in 0..cols {
      let level = luma.get_pixel(col, row)[0] as f32 / 255.0;
      let idx = ((level * steps).round() as usize).min(ASCII_RAMP.len() - 1);
      let ch = ASCII_RAMP[idx] as char;
      buf.set_string(ox + col as u16, oy + row as u16, ch.to_string(), Style::default());
    }
  }
}

/// Target pixel size for a thumbnail filling `area`. Half-block mode packs two
/// pixel rows per cell; ASCII and Kitty use one.
pub fn thumb_pixels(area: Rect, mode: DisplayMode) -> (u32, u32) {
  let w = area.width as u32;
  let h = match mode {
    DisplayMode::Direct => area.height as u32 * 2,
    DisplayMode::Ascii | DisplayMode::Kitty => area.height as u32,
  };
  (w.max(1), h.max(1))
}

// --- Placeholder card ---

/// Titled card shown when a tile has no usable image.
pub struct PlaceholderCard<'a> {
  pub title: &'a str,
  pub caption: &'a str,
  pub theme: &'a Theme,
}

impl Widget for PlaceholderCard<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    let top_pad = area.height.saturating_sub(4) / 2;
    let mut lines: Vec<Line> = (0..top_pad).map(|_| Line::from("")).collect();
    lines.push(Line::from(Span::styled("🎆", Style::default().fg(self.theme.accent))));
    lines.push(Line::from(Span::styled(
      self.title.to_string(),
      Style::default().fg(self.theme.fg).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(self.caption.to_string(), Style::default().fg(self.theme.muted))));

    Paragraph::new(lines)
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true })
      .block(Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(self.theme.border)))
      .render(area, buf);
  }
}

// --- Kitty Graphics Protocol ---
//
//   Transmit:  \x1B_G a=T,f=100,t=d,i=<id>,p=1,c=<cols>,r=<rows>,q=2,m=1;<base64 chunk>\x1B\\
//   Continue:  \x1B_G m=1;<base64 chunk>\x1B\\
//   Last:      \x1B_G m=0;<base64 chunk>\x1B\\
//   Delete all:       \x1B_G a=d,d=a,q=2\x1B\\
//
// Re-sending with the same image/placement id replaces the previous image in
// place. The PNG payload is base64'd and split into <=4096-byte chunks; `c`
// and `r` scale it over the cell area.

const KITTY_CHUNK_SIZE: usize = 4096;

/// Delete all Kitty images currently displayed.
pub fn kitty_delete_all() -> Result<()> {
  let mut stdout = std::io::stdout();
  write!(stdout, "\x1B_Ga=d,d=a,q=2\x1B\\").context("Failed to write kitty delete all")?;
  stdout.flush().context("Failed to flush kitty delete")?;
  Ok(())
}

/// Build the escape sequence placing `png` over `area` as image `id`.
fn kitty_sequence(png: &[u8], area: Rect, id: u32) -> String {
  let b64 = BASE64.encode(png);
  let chunks: Vec<&str> = b64
    .as_bytes()
    .chunks(KITTY_CHUNK_SIZE)
    .map(|c| std::str::from_utf8(c).unwrap_or_default())
    .collect();
  let last = chunks.len().saturating_sub(1);

  let mut out = format!("\x1B[{};{}H", area.y.saturating_add(1), area.x.saturating_add(1));
  for (i, chunk) in chunks.iter().enumerate() {
    let more = u8::from(i < last);
    if i == 0 {
      out.push_str(&format!(
        "\x1B_Ga=T,f=100,t=d,i={},p=1,c={},r={},q=2,m={};{}\x1B\\",
        id, area.width, area.height, more, chunk
      ));
    } else {
      out.push_str(&format!("\x1B_Gm={};{}\x1B\\", more, chunk));
    }
  }
  out
}

/// Render an image at `area` using the Kitty graphics protocol.
pub fn kitty_render_image(image: &DynamicImage, area: Rect, id: u32) -> Result<()> {
  if area.is_empty() {
    return Ok(());
  }
  let mut png = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).context("Failed to encode thumbnail as PNG for kitty")?;

  let mut stdout = std::io::stdout();
  stdout.write_all(kitty_sequence(&png, area, id).as_bytes()).context("Failed to write kitty image")?;
  stdout.flush().context("Failed to flush kitty image")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn solid(w: u32, h: u32, px: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(px)))
  }

  #[test]
  fn thumb_pixels_by_mode() {
    let area = Rect::new(0, 0, 40, 10);
    assert_eq!(thumb_pixels(area, DisplayMode::Direct), (40, 20));
    assert_eq!(thumb_pixels(area, DisplayMode::Ascii), (40, 10));
    assert_eq!(thumb_pixels(Rect::new(0, 0, 0, 0), DisplayMode::Kitty), (1, 1));
  }

  #[test]
  fn half_blocks_fill_centered() {
    let area = Rect::new(0, 0, 6, 4);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &solid(2, 4, [255, 0, 0]), display_mode: DisplayMode::Direct }.render(area, &mut buf);
    // 2x4 pixels -> 2x2 cells, centered at x=2, y=1
    assert_eq!(buf[(2, 1)].symbol(), "▀");
    assert_eq!(buf[(2, 1)].fg, Color::Rgb(255, 0, 0));
    assert_eq!(buf[(0, 0)].symbol(), " ");
  }

  #[test]
  fn ascii_uses_ramp_extremes() {
    let area = Rect::new(0, 0, 2, 1);
    let mut buf = Buffer::empty(area);
    ThumbnailWidget { image: &solid(2, 1, [255, 255, 255]), display_mode: DisplayMode::Ascii }.render(area, &mut buf);
    assert_eq!(buf[(0, 0)].symbol(), "@");
  }

  #[test]
  fn kitty_sequence_chunks() {
    let png = vec![0u8; 5000];
    let seq = kitty_sequence(&png, Rect::new(2, 3, 10, 5), 7);
    assert!(seq.starts_with("\x1B[4;3H\x1B_Ga=T,f=100,t=d,i=7,p=1,c=10,r=5,q=2,m=1;"));
    assert!(seq.contains("\x1B_Gm=0;"));
  }

  #[test]
  fn placeholder_shows_title() {
    let area = Rect::new(0, 0, 30, 8);
    let mut buf = Buffer::empty(area);
    PlaceholderCard { title: "Humo", caption: "No preview", theme: &crate::theme::THEMES[0] }.render(area, &mut buf);
    let text: String = (0..area.height)
      .flat_map(|y| (0..area.width).map(move |x| (x, y)))
      .map(|(x, y)| buf[(x, y)].symbol().to_string())
      .collect();
    assert!(text.contains("Humo"));
    assert!(text.contains("No preview"));
  }
}
