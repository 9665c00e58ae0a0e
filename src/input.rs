use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::App;
use crate::modal::LISTENER_NAME;

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('o') {
    app.open_current_in_browser();
    return Ok(());
  }

  // The topmost registered listener owns the keyboard.
  if app.keys.active() == Some(LISTENER_NAME) {
    handle_modal_key(app, key).await;
  } else {
    handle_gallery_key(app, key).await;
  }
  Ok(())
}

async fn handle_modal_key(app: &mut App, key: event::KeyEvent) {
  if let Some(action) = app.modal.action_for_key(key.code) {
    app.apply_modal_action(action).await;
  }
}

async fn handle_gallery_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.open_selected().await;
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.select_next();
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.select_prev();
    }
    KeyCode::Tab | KeyCode::Char('f') => {
      app.next_filter().await;
    }
    KeyCode::BackTab => {
      app.prev_filter().await;
    }
    KeyCode::Esc => {
      app.should_quit = true;
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::{Filter, catalog};
  use crate::config::Config;
  use crate::display::DisplayMode;
  use crate::viewport::DeviceOverride;
  use ratatui::crossterm::event::KeyEvent;

  fn app() -> App {
    App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Desktop), 120)
  }

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn esc_quits_gallery_but_closes_modal() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Enter)).await.unwrap();
    assert!(app.modal.is_open());

    handle_key_event(&mut app, press(KeyCode::Esc)).await.unwrap();
    assert!(!app.modal.is_open());
    assert!(!app.should_quit);

    handle_key_event(&mut app, press(KeyCode::Esc)).await.unwrap();
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn arrows_navigate_modal_only_while_open() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Right)).await.unwrap();
    assert_eq!(app.modal.active_index(), None);

    handle_key_event(&mut app, press(KeyCode::Enter)).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Right)).await.unwrap();
    assert_eq!(app.modal.active_index(), Some(1));
    handle_key_event(&mut app, press(KeyCode::Left)).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Left)).await.unwrap();
    assert_eq!(app.modal.active_index(), Some(app.visible.len() - 1));
  }

  #[tokio::test]
  async fn gallery_keys_are_captured_by_modal() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Enter)).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Char('j'))).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Tab)).await.unwrap();
    assert_eq!(app.list_state.selected(), Some(0));
    assert_eq!(app.filter, Filter::All);
  }

  #[tokio::test]
  async fn tab_cycles_filters() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Tab)).await.unwrap();
    assert_eq!(app.filter, catalog().next_filter(&Filter::All));
    handle_key_event(&mut app, press(KeyCode::BackTab)).await.unwrap();
    assert_eq!(app.filter, Filter::All);
  }

  #[tokio::test]
  async fn ctrl_c_quits_from_modal() {
    let mut app = app();
    handle_key_event(&mut app, press(KeyCode::Enter)).await.unwrap();
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)).await.unwrap();
    assert!(app.should_quit);
  }
}
