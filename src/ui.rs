use image::imageops::FilterType;
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, List, ListItem, Padding, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, TileImage};
use crate::catalog::{MediaItem, catalog};
use crate::graphics::{PlaceholderCard, ThumbnailWidget, thumb_pixels};
use crate::modal::{Phase, embed_url};
use crate::theme::Theme;
use crate::thumbnail::ThumbnailResolution;
use crate::viewport::{ControlPlacement, DeviceClass, PlayerLayout};

const SPINNER: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

// --- Helpers ---

/// Truncate to `max_width` display columns, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.width() <= max_width {
    return s.to_string();
  }
  let mut out = String::new();
  let mut used = 0;
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w + 1 > max_width {
      break;
    }
    used += w;
    out.push(c);
  }
  out.push('…');
  out
}

/// Box for the player overlay: the whole screen when full-bleed, a centered
/// 16:9 frame otherwise.
fn modal_area(area: Rect, layout: PlayerLayout) -> Rect {
  match layout {
    PlayerLayout::FullBleed => area,
    PlayerLayout::Letterbox => {
      let width = area.width.saturating_sub(8);
      // Cells are roughly twice as tall as wide.
      let ideal_h = (width as u32 * 9 / 32) as u16 + 4;
      let height = ideal_h.min(area.height.saturating_sub(2));
      if width == 0 || height == 0 {
        return area;
      }
      Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
      }
    }
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  app.gfx.thumb_area = None;
  app.gfx.thumb_url = None;

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, filter_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_filters(frame, app, filter_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);

  if app.modal.is_open() {
    // The overlay covers the preview; Kitty images would bleed through.
    app.gfx.thumb_area = None;
    app.gfx.thumb_url = None;
    render_modal(frame, app, main_area);
  }
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(vec![
    Span::styled(" 🎆 fxreel ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(crate::constants::constants().business_name.as_str(), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_filters(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let active = app.filter.tag();
  let mut spans = vec![Span::raw(" ")];
  for f in &catalog().filters {
    let style = if f.tag == active {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.muted)
    };
    spans.push(Span::styled(format!(" {} ", f.label), style));
    spans.push(Span::raw(" "));
  }
  frame.render_widget(Line::from(spans), area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.visible.is_empty() {
    render_empty(frame, app.theme(), area);
    return;
  }
  let [list_area, preview_area] = match app.viewport.current() {
    DeviceClass::Mobile => Layout::vertical([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area),
    DeviceClass::Desktop => Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area),
  };
  render_gallery(frame, app, list_area);
  render_preview(frame, app, preview_area);
}

fn render_empty(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("No videos in this category", Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Press Tab to pick another filter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

/// One-cell marker for an item's thumbnail state.
fn resolution_marker(resolution: Option<&ThumbnailResolution>) -> &'static str {
  match resolution {
    None | Some(ThumbnailResolution::Loading) => "◌",
    Some(ThumbnailResolution::Ready(_)) => "●",
    Some(ThumbnailResolution::Failed(_)) => "×",
  }
}

fn render_gallery(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let c = catalog();
  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = (0..app.visible.len())
    .filter_map(|pos| app.visible_item(pos).map(|item| (pos, item)))
    .map(|(pos, item)| {
      let is_selected = Some(pos) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if pos % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let marker = resolution_marker(app.thumbnails.get(&item.external_video_ref));
      let right = c.label_for(&item.category);
      let right_w = right.width();
      let title_max = inner_w.saturating_sub(right_w + 4);
      let title = truncate_str(&item.title, title_max);
      let gap = inner_w.saturating_sub(title.width() + right_w + 2);

      let line = Line::from(vec![
        Span::styled(format!("{} ", marker), Style::default().fg(theme.muted)),
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right.to_string(), Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = format!(" {} · {} ", c.label_for(app.filter.tag()), app.visible.len());
  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_preview(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let Some(item) = app.selected_item() else {
    frame.render_widget(
      Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)),
      area,
    );
    return;
  };

  let [thumb_area, info_area] = Layout::vertical([Constraint::Min(3), Constraint::Length(5)]).areas(area);
  render_tile(frame, app, item, thumb_area);

  let resolution = app.thumbnails.get(&item.external_video_ref);
  let source = match resolution {
    Some(ThumbnailResolution::Ready(t)) => match t.dimensions {
      Some((w, h)) => format!("{} · {}x{}", t.provider.label(), w, h),
      None => t.provider.label().to_string(),
    },
    Some(ThumbnailResolution::Failed(reason)) => format!("no preview: {}", reason),
    _ => "resolving…".to_string(),
  };
  let inner_w = info_area.width.saturating_sub(4) as usize;
  let lines = vec![
    Line::from(Span::styled(
      truncate_str(&item.title, inner_w),
      Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(vec![
      Span::styled("Category  ", Style::default().fg(theme.muted)),
      Span::styled(catalog().label_for(&item.category).to_string(), Style::default().fg(theme.fg)),
    ]),
    Line::from(vec![
      Span::styled("Preview   ", Style::default().fg(theme.muted)),
      Span::styled(truncate_str(&source, inner_w.saturating_sub(10)), Style::default().fg(theme.fg)),
    ]),
  ];
  let info = Paragraph::new(lines).block(
    Block::bordered()
      .border_type(BorderType::Rounded)
      .border_style(Style::default().fg(theme.border))
      .padding(Padding::horizontal(1)),
  );
  frame.render_widget(info, info_area);
}

/// Thumbnail for `item`, or a titled placeholder card when there is none yet
/// or the image is unusable.
fn render_tile(frame: &mut Frame, app: &mut App, item: &MediaItem, area: Rect) {
  let theme = app.theme();
  let caption = match app.tile_image(item) {
    Some((_, TileImage::Loaded(_))) => None,
    Some((_, TileImage::Loading)) => Some("Loading image…"),
    Some((_, TileImage::Broken)) => Some("No preview available"),
    None => match app.thumbnails.get(&item.external_video_ref) {
      Some(ThumbnailResolution::Failed(_)) => Some("No preview available"),
      _ => Some("Loading preview…"),
    },
  };
  if let Some(caption) = caption {
    frame.render_widget(PlaceholderCard { title: &item.title, caption, theme }, area);
    return;
  }

  // Keep 16:9 inside the pane.
  let mut thumb_area = Rect { y: area.y + 1, height: area.height.saturating_sub(2), ..area };
  let ideal_h = (thumb_area.width as f32 * 9.0 / 32.0).round() as u16;
  if ideal_h < thumb_area.height {
    thumb_area.y += (thumb_area.height - ideal_h) / 2;
    thumb_area.height = ideal_h;
  }

  let mode = app.display_mode;
  let Some((url, TileImage::Loaded(image))) = app.tile_image(item) else { return };
  let url = url.to_string();

  if mode.uses_graphics_protocol() {
    app.gfx.thumb_area = Some(thumb_area);
    app.gfx.thumb_url = Some(url);
    return;
  }

  let needs_resize = match &app.gfx.resized_thumb {
    Some((u, w, h, _)) => *u != url || *w != thumb_area.width || *h != thumb_area.height,
    None => true,
  };
  if needs_resize {
    let (w, h) = thumb_pixels(thumb_area, mode);
    let resized = image.resize_to_fill(w, h, FilterType::Triangle);
    app.gfx.resized_thumb = Some((url, thumb_area.width, thumb_area.height, resized));
  }
  if let Some((_, _, _, ref resized)) = app.gfx.resized_thumb {
    frame.render_widget(ThumbnailWidget { image: resized, display_mode: mode }, thumb_area);
  }
}

fn render_modal(frame: &mut Frame, app: &App, main_area: Rect) {
  let theme = app.theme();
  let params = app.playback_params();
  let area = modal_area(main_area, params.layout);
  let (Some(index), Some(item)) = (app.modal.active_index(), app.modal_item()) else { return };
  let len = app.visible.len();

  frame.render_widget(Clear, area);
  let block = Block::bordered()
    .title(Line::from(vec![
      Span::styled(
        format!(" {} ", truncate_str(&item.title, area.width.saturating_sub(16) as usize)),
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
      ),
      Span::styled(format!("{}/{} ", index + 1, len), Style::default().fg(theme.muted)),
    ]))
    .title(Line::from(Span::styled(" Esc ✕ ", Style::default().fg(theme.muted))).alignment(Alignment::Right))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.accent))
    .style(Style::default().bg(theme.overlay_bg))
    .padding(Padding::horizontal(2));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let (show_prev, show_next) = app.modal.controls_visible(len);
  let [body_area, controls_area] = match params.controls {
    ControlPlacement::BottomCenter => Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner),
    ControlPlacement::SideEdges => [inner, Rect::default()],
  };

  let inner_w = body_area.width.saturating_sub(4) as usize;
  let phase_line = match app.modal.phase() {
    Some(Phase::Loading { since }) => {
      let frame_idx = (since.elapsed().as_millis() / 100) as usize % SPINNER.len();
      Line::from(Span::styled(format!("{} Loading player…", SPINNER[frame_idx]), Style::default().fg(theme.status)))
    }
    Some(Phase::Ready) => {
      let text =
        if app.player.is_enabled() { "▶ Playing in external player" } else { "▶ Ready: ^o opens it in the browser" };
      Line::from(Span::styled(text, Style::default().fg(theme.status)))
    }
    Some(Phase::Error(reason)) => Line::from(Span::styled(
      truncate_str(&format!("⚠  {}", reason), inner_w),
      Style::default().fg(theme.error),
    )),
    None => Line::from(""),
  };

  let url = embed_url(&item.external_video_ref, &params);
  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(catalog().label_for(&item.category).to_string(), Style::default().fg(theme.muted))),
    Line::from(""),
    phase_line,
    Line::from(""),
    Line::from(Span::styled(
      truncate_str(&url, inner_w),
      Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
    )),
  ];
  if let Some(status) = app.player.last_status() {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(truncate_str(status, inner_w), Style::default().fg(theme.muted))));
  }
  if matches!(app.modal.phase(), Some(Phase::Error(_))) {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("r Retry", Style::default().fg(theme.key_fg).bg(theme.key_bg))));
  }
  frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }), body_area);

  let control = Style::default().fg(theme.key_fg).bg(theme.key_bg).add_modifier(Modifier::BOLD);
  match params.controls {
    ControlPlacement::BottomCenter => {
      let mut spans = Vec::new();
      if show_prev {
        spans.push(Span::styled(" ◀ ", control));
        spans.push(Span::raw("   "));
      }
      spans.push(Span::styled(format!("{}/{}", index + 1, len), Style::default().fg(theme.muted)));
      if show_next {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(" ▶ ", control));
      }
      frame.render_widget(Line::from(spans).alignment(Alignment::Center), controls_area);
    }
    ControlPlacement::SideEdges => {
      let mid = inner.y + inner.height / 2;
      if show_prev {
        frame.render_widget(Span::styled(" ◀ ", control), Rect { x: area.x, y: mid, width: 3, height: 1 });
      }
      if show_next {
        let x = (area.x + area.width).saturating_sub(3);
        frame.render_widget(Span::styled(" ▶ ", control), Rect { x, y: mid, width: 3, height: 1 });
      }
    }
  }
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(status) = app.player.last_status() {
    (format!(" ▶ {}", status), Style::default().fg(theme.status))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ {}", info), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = if app.modal.is_open() {
    let mut k = Vec::new();
    let (show_prev, show_next) = app.modal.controls_visible(app.visible.len());
    if show_prev || show_next {
      k.push(("←/→", "Prev/Next"));
    }
    if matches!(app.modal.phase(), Some(Phase::Error(_))) {
      k.push(("r", "Retry"));
    }
    k.push(("^o", "Browser"));
    k.push(("Esc", "Close"));
    k
  } else {
    vec![("Enter", "Watch"), ("j/k", "Navigate"), ("Tab", "Filter"), ("^o", "Browser"), ("^t", "Theme"), ("Esc", "Quit")]
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let label =
    format!("{} · {} · {} ", theme.name, app.viewport.current().label(), app.display_mode.label().to_lowercase());
  let right = Line::from(Span::styled(&label, Style::default().fg(theme.muted)));
  let label_w = label.width() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(label_w), width: label_w.min(area.width), ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::display::DisplayMode;
  use crate::viewport::DeviceOverride;
  use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};

  fn buffer_text(buf: &Buffer) -> String {
    let area = buf.area;
    (area.y..area.y + area.height)
      .map(|y| (area.x..area.x + area.width).map(|x| buf[(x, y)].symbol().to_string()).collect::<String>())
      .collect::<Vec<_>>()
      .join("\n")
  }

  #[test]
  fn truncate_respects_display_width() {
    assert_eq!(truncate_str("Bodas", 10), "Bodas");
    assert_eq!(truncate_str("Cumpleaños mágicos", 8), "Cumplea…");
    assert_eq!(truncate_str("日本語テキスト", 5), "日本…");
  }

  #[test]
  fn full_bleed_uses_whole_area() {
    let area = Rect::new(0, 2, 60, 20);
    assert_eq!(modal_area(area, PlayerLayout::FullBleed), area);
  }

  #[test]
  fn letterbox_is_centered_inside() {
    let area = Rect::new(0, 0, 120, 40);
    let boxed = modal_area(area, PlayerLayout::Letterbox);
    assert_eq!(boxed.width, 112);
    assert_eq!(boxed.x, 4);
    assert!(boxed.height < area.height);
    assert_eq!(boxed.y, (area.height - boxed.height) / 2);
  }

  #[test]
  fn letterbox_on_a_collapsed_terminal_keeps_the_area() {
    for area in [Rect::new(0, 0, 0, 10), Rect::new(3, 1, 6, 10), Rect::new(0, 0, 120, 0), Rect::new(0, 0, 120, 2)] {
      assert_eq!(modal_area(area, PlayerLayout::Letterbox), area);
    }
    let tiny = modal_area(Rect::new(2, 0, 9, 3), PlayerLayout::Letterbox);
    assert_eq!((tiny.x, tiny.width, tiny.height), (6, 1, 1));
  }

  #[tokio::test]
  async fn gallery_renders_titles_and_filters() {
    let mut app = App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Desktop), 120);
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    terminal.draw(|frame| ui(frame, &mut app)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    let first_word = catalog().items[0].title.split_whitespace().next().unwrap();
    assert!(text.contains("fxreel"));
    assert!(text.contains(first_word));
    assert!(text.contains(catalog().filters[0].label.as_str()));
  }

  #[tokio::test]
  async fn modal_overlay_shows_counter_and_close_hint() {
    let mut app = App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Mobile), 80);
    app.open_selected().await;
    let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
    terminal.draw(|frame| ui(frame, &mut app)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains(&format!("1/{}", app.visible.len())));
    assert!(text.contains("Esc ✕"));
    assert!(text.contains("Loading player"));
  }
}
