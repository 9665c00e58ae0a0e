//! Video modal controller.
//!
//! A full-screen overlay layered over the gallery's filtered item list. The
//! list is owned by the caller; every navigation call takes its current
//! length. Navigation always wraps.
//!
//! ```text
//!   Closed --open(i)--> Loading --ready--> Ready
//!                         |  ^               |
//!          error/timeout  v  | retry, next,  |
//!                        Error  prev         |
//!   any Open state --close--> Closed  <------+
//! ```
//!
//! While open the controller holds the scroll lock and the key listener;
//! both are released when the open state is discarded, including when the
//! controller itself is dropped.

use ratatui::crossterm::event::KeyCode;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::scroll_lock::{KeyListenerGuard, KeyListeners, ScrollLock, ScrollLockGuard};
use crate::viewport::{PlaybackParams, PlayerLayout};

pub const LISTENER_NAME: &str = "video-modal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
  Loading { since: Instant },
  Ready,
  Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalState {
  Closed,
  Open { index: usize, phase: Phase },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModalError {
  #[error("item {index} is out of range for a list of {len}")]
  OutOfRange { index: usize, len: usize },
}

/// What a key press asks the modal to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
  Close,
  Prev,
  Next,
  Retry,
}

/// Result of reconciling the modal with a changed list length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSync {
  Unchanged,
  /// The active index pointed past the end and was reset to 0.
  Clamped,
  Closed,
}

struct OpenResources {
  _scroll: ScrollLockGuard,
  _keys: KeyListenerGuard,
}

pub struct VideoModal {
  state: ModalState,
  resources: Option<OpenResources>,
  scroll: ScrollLock,
  keys: KeyListeners,
  load_timeout: Duration,
}

impl VideoModal {
  pub fn new(scroll: ScrollLock, keys: KeyListeners) -> Self {
    Self::with_timeout(scroll, keys, constants().player_load_timeout())
  }

  pub fn with_timeout(scroll: ScrollLock, keys: KeyListeners, load_timeout: Duration) -> Self {
    Self { state: ModalState::Closed, resources: None, scroll, keys, load_timeout }
  }

  pub fn state(&self) -> &ModalState {
    &self.state
  }

  pub fn is_open(&self) -> bool {
    matches!(self.state, ModalState::Open { .. })
  }

  pub fn active_index(&self) -> Option<usize> {
    match self.state {
      ModalState::Open { index, .. } => Some(index),
      ModalState::Closed => None,
    }
  }

  pub fn phase(&self) -> Option<&Phase> {
    match &self.state {
      ModalState::Open { phase, .. } => Some(phase),
      ModalState::Closed => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.phase(), Some(Phase::Loading { .. }))
  }

  /// Open on `index` of a list of `len` items. Re-opening while open jumps to
  /// the new index and keeps the held resources.
  pub fn open(&mut self, index: usize, len: usize) -> Result<(), ModalError> {
    if index >= len {
      return Err(ModalError::OutOfRange { index, len });
    }
    if self.resources.is_none() {
      self.resources = Some(OpenResources { _scroll: self.scroll.acquire(), _keys: self.keys.register(LISTENER_NAME) });
    }
    info!(index, len, "modal: open");
    self.state = ModalState::Open { index, phase: Phase::Loading { since: Instant::now() } };
    Ok(())
  }

  /// Close from any open state. Returns whether the modal was open.
  pub fn close(&mut self) -> bool {
    let was_open = self.is_open();
    self.state = ModalState::Closed;
    self.resources = None;
    if was_open {
      info!("modal: closed");
    }
    was_open
  }

  fn move_to(&mut self, index: usize) {
    self.state = ModalState::Open { index, phase: Phase::Loading { since: Instant::now() } };
  }

  /// Advance with wraparound. No-op when closed or with fewer than two items.
  pub fn next(&mut self, len: usize) -> bool {
    let Some(index) = self.active_index() else { return false };
    if len <= 1 {
      return false;
    }
    let next = (index + 1) % len;
    debug!(from = index, to = next, "modal: next");
    self.move_to(next);
    true
  }

  pub fn prev(&mut self, len: usize) -> bool {
    let Some(index) = self.active_index() else { return false };
    if len <= 1 {
      return false;
    }
    let prev = (index % len + len - 1) % len;
    debug!(from = index, to = prev, "modal: prev");
    self.move_to(prev);
    true
  }

  /// Playback-ready signal from the player.
  pub fn on_ready(&mut self) -> bool {
    if let ModalState::Open { phase, .. } = &mut self.state
      && matches!(phase, Phase::Loading { .. })
    {
      *phase = Phase::Ready;
      return true;
    }
    false
  }

  pub fn on_load_error(&mut self, reason: impl Into<String>) -> bool {
    if let ModalState::Open { phase, index } = &mut self.state
      && matches!(phase, Phase::Loading { .. })
    {
      let reason = reason.into();
      warn!(index = *index, reason = %reason, "modal: player failed to load");
      *phase = Phase::Error(reason);
      return true;
    }
    false
  }

  /// Move a stalled load to `Error`. Returns true when the timeout fired.
  pub fn tick(&mut self, now: Instant) -> bool {
    let stalled = match self.phase() {
      Some(Phase::Loading { since }) => now.saturating_duration_since(*since) >= self.load_timeout,
      _ => false,
    };
    if !stalled {
      return false;
    }
    let secs = self.load_timeout.as_secs();
    self.on_load_error(format!("Player did not start within {}s", secs))
  }

  /// Retry the current item after an error.
  pub fn retry(&mut self) -> bool {
    if let ModalState::Open { index, phase: Phase::Error(_) } = self.state {
      self.move_to(index);
      return true;
    }
    false
  }

  /// Restart loading the current item from any open phase, e.g. after the
  /// device class changed the playback parameters.
  pub fn reload(&mut self) -> bool {
    let Some(index) = self.active_index() else { return false };
    self.move_to(index);
    true
  }

  /// Reconcile with a filtered list that changed length underneath the modal.
  pub fn sync_len(&mut self, len: usize) -> ListSync {
    let Some(index) = self.active_index() else { return ListSync::Unchanged };
    if len == 0 {
      self.close();
      return ListSync::Closed;
    }
    if index >= len {
      self.move_to(0);
      return ListSync::Clamped;
    }
    ListSync::Unchanged
  }

  /// Whether the (prev, next) controls are shown. Navigation wraps, so both
  /// are available whenever there is somewhere else to go.
  pub fn controls_visible(&self, len: usize) -> (bool, bool) {
    let show = self.is_open() && len > 1;
    (show, show)
  }

  /// Map a key to a modal action. Keys are ignored while closed.
  pub fn action_for_key(&self, code: KeyCode) -> Option<ModalAction> {
    if !self.is_open() {
      return None;
    }
    match code {
      KeyCode::Esc => Some(ModalAction::Close),
      KeyCode::Left => Some(ModalAction::Prev),
      KeyCode::Right => Some(ModalAction::Next),
      KeyCode::Char('r') if matches!(self.phase(), Some(Phase::Error(_))) => Some(ModalAction::Retry),
      _ => None,
    }
  }
}

/// Embed page URL for the external video provider.
pub fn embed_url(video_ref: &str, params: &PlaybackParams) -> String {
  let base = &constants().player_embed_base;
  let mut url = format!(
    "{}/{}?quality={}&autoplay=1&loop=0&autopause=0&byline=0&title=0&portrait=0",
    base, video_ref, params.quality
  );
  if params.layout == PlayerLayout::FullBleed {
    url.push_str("&muted=0");
  }
  url
}
