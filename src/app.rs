use anyhow::Result;
use image::DynamicImage;
use ratatui::{layout::Rect, widgets::ListState};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::catalog::{Filter, MediaItem, catalog};
use crate::config::Config;
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::modal::{ListSync, ModalAction, VideoModal, embed_url};
use crate::player::{EmbedPlayer, PlayerSignal, open_in_browser};
use crate::scroll_lock::{KeyListeners, ScrollLock};
use crate::theme::{THEMES, Theme, theme_index};
use crate::thumbnail::{HttpFetcher, ResolverConfig, ThumbnailCache, ThumbnailResolution, fetch_image};
use crate::viewport::{DeviceClass, DeviceOverride, PlaybackParams, Viewport};

// --- Types ---

/// Decoded preview for a resolved thumbnail URL.
pub enum TileImage {
  Loading,
  Loaded(DynamicImage),
  /// The URL did not produce an image (404, decode error). Rendered as a placeholder card.
  Broken,
}

/// Terminal graphics protocol rendering state (Kitty).
#[derive(Default)]
pub struct GraphicsCache {
  pub thumb_area: Option<Rect>,
  /// URL of the tile image placed at `thumb_area`.
  pub thumb_url: Option<String>,
  pub last_sent: Option<(String, Rect)>,
  pub resized_thumb: Option<(String, u16, u16, DynamicImage)>,
}

/// In-flight background work, drained by `check_pending`.
pub(crate) struct AsyncTasks {
  resolved_tx: mpsc::UnboundedSender<(String, ThumbnailResolution)>,
  resolved_rx: mpsc::UnboundedReceiver<(String, ThumbnailResolution)>,
  image_tx: mpsc::UnboundedSender<(String, Result<DynamicImage>)>,
  image_rx: mpsc::UnboundedReceiver<(String, Result<DynamicImage>)>,
  /// Video refs with a resolution task running.
  pending: HashSet<String>,
}

impl Default for AsyncTasks {
  fn default() -> Self {
    let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
    let (image_tx, image_rx) = mpsc::unbounded_channel();
    Self { resolved_tx, resolved_rx, image_tx, image_rx, pending: HashSet::new() }
  }
}

pub struct App {
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub filter: Filter,
  /// Indices into the catalog items visible under `filter`, in catalog order.
  pub visible: Vec<usize>,
  pub list_state: ListState,
  /// Latest resolution per video ref.
  pub thumbnails: HashMap<String, ThumbnailResolution>,
  /// Decoded tile images keyed by thumbnail URL.
  pub images: HashMap<String, TileImage>,
  pub modal: VideoModal,
  pub player: EmbedPlayer,
  pub viewport: Viewport,
  pub scroll: ScrollLock,
  pub keys: KeyListeners,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message, lower priority than status/error.
  pub info_message: Option<String>,
  pub should_quit: bool,
  pub gfx: GraphicsCache,
  pub(crate) tasks: AsyncTasks,
  cache: ThumbnailCache<HttpFetcher>,
  config: Config,
  device_rx: watch::Receiver<DeviceClass>,
  /// Video ref loaded into the modal's player.
  loaded_ref: Option<String>,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(display_mode: DisplayMode, player_enabled: bool, device: Option<DeviceOverride>, width: u16) -> Self {
    Self::with_config(Config::load(), display_mode, player_enabled, device, width)
  }

  /// Build with explicit prefs. A `device` given here wins over the stored one.
  pub fn with_config(
    config: Config,
    display_mode: DisplayMode,
    player_enabled: bool,
    device: Option<DeviceOverride>,
    width: u16,
  ) -> Self {
    let theme_index = config.theme_name.as_deref().map_or(0, theme_index);
    let device = device.unwrap_or_else(|| config.device_override());
    let viewport = Viewport::new(width, device);
    let device_rx = viewport.subscribe();
    let scroll = ScrollLock::new();
    let keys = KeyListeners::new();
    let cache = ThumbnailCache::new(HttpFetcher::default(), ResolverConfig::from_constants(), config.thumbnail_ttl());
    info!(device = device.label(), class = viewport.current().label(), player_enabled, "app: starting");

    let mut app = Self {
      theme_index,
      display_mode,
      filter: Filter::All,
      visible: Vec::new(),
      list_state: ListState::default(),
      thumbnails: HashMap::new(),
      images: HashMap::new(),
      modal: VideoModal::new(scroll.clone(), keys.clone()),
      player: EmbedPlayer::new(player_enabled),
      viewport,
      scroll,
      keys,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      gfx: GraphicsCache::default(),
      tasks: AsyncTasks::default(),
      cache,
      config,
      device_rx,
      loaded_ref: None,
      error_time: None,
    };
    app.recompute_visible();
    if !player_enabled {
      app.info_message = Some("Player disabled: ^o opens videos in the browser".to_string());
    }
    app
  }

  pub fn theme(&self) -> &'static Theme {
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&mut self) {
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_display_secs)
    {
      self.clear_error();
    }
  }

  // --- Gallery ---

  /// Catalog item at position `pos` of the visible list.
  pub fn visible_item(&self, pos: usize) -> Option<&'static MediaItem> {
    self.visible.get(pos).and_then(|&idx| catalog().items.get(idx))
  }

  pub fn selected_item(&self) -> Option<&'static MediaItem> {
    self.list_state.selected().and_then(|pos| self.visible_item(pos))
  }

  pub fn modal_item(&self) -> Option<&'static MediaItem> {
    self.modal.active_index().and_then(|pos| self.visible_item(pos))
  }

  fn recompute_visible(&mut self) {
    self.visible =
      catalog().items.iter().enumerate().filter(|(_, item)| self.filter.matches(item)).map(|(i, _)| i).collect();
    if self.visible.is_empty() {
      self.list_state.select(None);
    } else {
      let sel = self.list_state.selected().unwrap_or(0);
      self.list_state.select(Some(if sel >= self.visible.len() { 0 } else { sel }));
    }
  }

  /// Switch the category filter and reconcile an open modal with the new list.
  pub async fn set_filter(&mut self, filter: Filter) {
    if filter == self.filter {
      return;
    }
    info!(filter = filter.tag(), "gallery: filter changed");
    self.filter = filter;
    self.list_state.select(Some(0));
    self.recompute_visible();

    match self.modal.sync_len(self.visible.len()) {
      ListSync::Closed => self.stop_player().await,
      ListSync::Clamped => self.load_active().await,
      ListSync::Unchanged => {
        // Same position, possibly a different item.
        if self.modal.is_open() && self.modal_item().map(|i| &i.external_video_ref) != self.loaded_ref.as_ref() {
          self.modal.reload();
          self.load_active().await;
        }
      }
    }
  }

  pub async fn next_filter(&mut self) {
    let next = catalog().next_filter(&self.filter);
    self.set_filter(next).await;
  }

  pub async fn prev_filter(&mut self) {
    let prev = catalog().prev_filter(&self.filter);
    self.set_filter(prev).await;
  }

  /// Move the gallery selection, wrapping. Ignored while the scroll lock is held.
  pub fn select_next(&mut self) {
    let count = self.visible.len();
    if count == 0 || self.scroll.is_locked() {
      return;
    }
    let i = self.list_state.selected().map_or(0, |i| (i + 1) % count);
    self.list_state.select(Some(i));
  }

  pub fn select_prev(&mut self) {
    let count = self.visible.len();
    if count == 0 || self.scroll.is_locked() {
      return;
    }
    let i = self.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
    self.list_state.select(Some(i));
  }

  // --- Thumbnails ---

  /// Start resolving previews for visible items that have none, or whose
  /// cached result has expired.
  pub fn request_visible_thumbnails(&mut self) {
    let refs: Vec<&'static str> =
      (0..self.visible.len()).filter_map(|pos| self.visible_item(pos)).map(|i| i.external_video_ref.as_str()).collect();
    for video_ref in refs {
      if self.tasks.pending.contains(video_ref) {
        continue;
      }
      if self.thumbnails.contains_key(video_ref) && self.cache.is_fresh(video_ref) {
        continue;
      }
      self.thumbnails.entry(video_ref.to_string()).or_insert(ThumbnailResolution::Loading);
      self.tasks.pending.insert(video_ref.to_string());

      let resolution = self.cache.resolve(video_ref);
      let tx = self.tasks.resolved_tx.clone();
      let key = video_ref.to_string();
      debug!(video_ref, "thumbnail: resolving");
      tokio::spawn(async move {
        let _ = tx.send((key, resolution.await));
      });
    }
  }

  /// Load the tile image for a freshly resolved URL. A broken image is tried
  /// again, since the resolution behind it has been refreshed.
  fn request_image(&mut self, url: &str) {
    if let Some(image) = self.cache.fetcher().take_decoded(url) {
      self.images.insert(url.to_string(), TileImage::Loaded(image));
      return;
    }
    if matches!(self.images.get(url), Some(TileImage::Loading | TileImage::Loaded(_))) {
      return;
    }
    self.images.insert(url.to_string(), TileImage::Loading);
    let client = self.cache.fetcher().client().clone();
    let tx = self.tasks.image_tx.clone();
    let url = url.to_string();
    tokio::spawn(async move {
      let result = fetch_image(&client, &url).await;
      let _ = tx.send((url, result));
    });
  }

  /// Tile image for an item, if its thumbnail resolved to a URL.
  pub fn tile_image(&self, item: &MediaItem) -> Option<(&str, &TileImage)> {
    let url = self.thumbnails.get(&item.external_video_ref)?.url()?;
    self.images.get(url).map(|img| (url, img))
  }

  // --- Modal ---

  /// Open the modal on the gallery selection and start loading its video.
  pub async fn open_selected(&mut self) {
    let Some(pos) = self.list_state.selected() else { return };
    if let Err(e) = self.modal.open(pos, self.visible.len()) {
      warn!(err = %e, "modal: open rejected");
      return;
    }
    self.clear_error();
    self.load_active().await;
  }

  pub async fn apply_modal_action(&mut self, action: ModalAction) {
    let len = self.visible.len();
    match action {
      ModalAction::Close => {
        if self.modal.close() {
          self.stop_player().await;
        }
      }
      ModalAction::Next => {
        if self.modal.next(len) {
          self.load_active().await;
        }
      }
      ModalAction::Prev => {
        if self.modal.prev(len) {
          self.load_active().await;
        }
      }
      ModalAction::Retry => {
        if self.modal.retry() {
          self.load_active().await;
        }
      }
    }
  }

  pub fn playback_params(&self) -> PlaybackParams {
    PlaybackParams::for_class(self.viewport.current())
  }

  /// Embed URL for the modal item, or the gallery selection when closed.
  pub fn current_embed_url(&self) -> Option<String> {
    let item = self.modal_item().or_else(|| self.selected_item())?;
    Some(embed_url(&item.external_video_ref, &self.playback_params()))
  }

  pub fn open_current_in_browser(&mut self) {
    let Some(url) = self.current_embed_url() else { return };
    if let Err(e) = open_in_browser(&url) {
      self.set_error(format!("Failed to open browser: {:#}", e));
    }
  }

  /// Hand the modal's active item to the player.
  async fn load_active(&mut self) {
    let Some(pos) = self.modal.active_index() else { return };
    let Some(item) = self.visible_item(pos) else { return };
    self.list_state.select(Some(pos));

    let params = self.playback_params();
    let url = embed_url(&item.external_video_ref, &params);
    self.loaded_ref = Some(item.external_video_ref.clone());
    info!(video_ref = %item.external_video_ref, quality = %params.quality, "modal: loading video");

    if let Err(e) = self.player.play(&url, params.max_height).await {
      self.modal.on_load_error(format!("{:#}", e));
    }
  }

  async fn stop_player(&mut self) {
    self.loaded_ref = None;
    if let Err(e) = self.player.stop().await {
      self.set_error(format!("Failed to stop player: {:#}", e));
    }
  }

  // --- Polling ---

  pub async fn check_pending(&mut self) -> Result<()> {
    while let Ok((video_ref, resolution)) = self.tasks.resolved_rx.try_recv() {
      self.tasks.pending.remove(&video_ref);
      if let Some(url) = resolution.url() {
        let url = url.to_string();
        self.request_image(&url);
      }
      self.thumbnails.insert(video_ref, resolution);
    }

    while let Ok((url, result)) = self.tasks.image_rx.try_recv() {
      let tile = match result {
        Ok(image) => TileImage::Loaded(image),
        Err(e) => {
          let err = format!("{:#}", e);
          debug!(url = %url, err = %err, "thumbnail: tile image unavailable");
          TileImage::Broken
        }
      };
      self.images.insert(url, tile);
    }

    if let Some(signal) = self.player.poll() {
      match signal {
        PlayerSignal::Ready => {
          self.modal.on_ready();
        }
        PlayerSignal::Failed(reason) => {
          self.modal.on_load_error(reason);
        }
        PlayerSignal::Ended => {
          self.info_message = Some("Playback ended".to_string());
        }
      }
    }

    if self.modal.tick(Instant::now()) {
      // Stalled load: kill the player but keep the modal open for retry.
      if let Err(e) = self.player.stop().await {
        warn!(err = %e, "player: failed to stop stalled load");
      }
    }

    if self.device_rx.has_changed().unwrap_or(false) {
      let class = *self.device_rx.borrow_and_update();
      debug!(class = class.label(), "app: device class changed");
      if self.modal.is_open() {
        self.modal.reload();
        self.load_active().await;
      }
    }

    self.expire_error();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modal::Phase;
  use crate::thumbnail::{Provider, Thumbnail};
  use anyhow::anyhow;
  use ratatui::{Terminal, backend::TestBackend};

  fn app() -> App {
    App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Auto), 120)
  }

  fn first_category_with(min_items: usize) -> Filter {
    let c = catalog();
    c.filters
      .iter()
      .map(|f| Filter::from_tag(&f.tag))
      .find(|f| *f != Filter::All && c.filter_items(f).len() >= min_items)
      .unwrap_or(Filter::All)
  }

  #[tokio::test]
  async fn starts_with_all_items_selected_first() {
    let app = app();
    assert_eq!(app.visible.len(), catalog().items.len());
    assert_eq!(app.list_state.selected(), Some(0));
    assert!(!app.modal.is_open());
  }

  #[tokio::test]
  async fn gallery_selection_wraps() {
    let mut app = app();
    app.select_prev();
    assert_eq!(app.list_state.selected(), Some(app.visible.len() - 1));
    app.select_next();
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn open_locks_scroll_and_registers_listener() {
    let mut app = app();
    app.open_selected().await;
    assert!(app.modal.is_open());
    assert!(app.scroll.is_locked());
    assert_eq!(app.keys.active(), Some(crate::modal::LISTENER_NAME));

    // Gallery scrolling is ignored while locked.
    app.select_next();
    assert_eq!(app.list_state.selected(), Some(0));

    app.apply_modal_action(ModalAction::Close).await;
    assert!(!app.modal.is_open());
    assert!(!app.scroll.is_locked());
    assert_eq!(app.keys.len(), 0);
  }

  #[tokio::test]
  async fn disabled_player_makes_modal_ready() {
    let mut app = app();
    app.open_selected().await;
    assert!(app.modal.is_loading());
    app.check_pending().await.unwrap();
    assert_eq!(app.modal.phase(), Some(&Phase::Ready));
  }

  #[tokio::test]
  async fn modal_navigation_wraps_and_follows_selection() {
    let mut app = app();
    let len = app.visible.len();
    app.list_state.select(Some(len - 1));
    app.open_selected().await;
    app.apply_modal_action(ModalAction::Next).await;
    assert_eq!(app.modal.active_index(), Some(0));
    assert_eq!(app.list_state.selected(), Some(0));
    app.apply_modal_action(ModalAction::Prev).await;
    assert_eq!(app.modal.active_index(), Some(len - 1));
  }

  #[tokio::test]
  async fn filter_change_clamps_open_modal() {
    let mut app = app();
    let category = first_category_with(1);
    let shrunk = catalog().filter_items(&category).len();
    app.list_state.select(Some(app.visible.len() - 1));
    app.open_selected().await;

    app.set_filter(category).await;
    assert_eq!(app.visible.len(), shrunk);
    if shrunk < catalog().items.len() {
      assert_eq!(app.modal.active_index(), Some(0));
    }
    assert!(app.modal.is_open());
    assert!(app.modal.is_loading());
  }

  #[tokio::test]
  async fn filter_to_empty_closes_modal() {
    let mut app = app();
    app.open_selected().await;
    app.set_filter(Filter::Category("no-such-category".to_string())).await;
    assert!(app.visible.is_empty());
    assert_eq!(app.list_state.selected(), None);
    assert!(!app.modal.is_open());
    assert!(!app.scroll.is_locked());
  }

  #[tokio::test]
  async fn filter_cycle_returns_to_all() {
    let mut app = app();
    for _ in 0..catalog().filters.len() {
      app.next_filter().await;
    }
    assert_eq!(app.filter, Filter::All);
    app.prev_filter().await;
    assert_eq!(app.filter, catalog().prev_filter(&Filter::All));
  }

  #[tokio::test]
  async fn embed_url_follows_device_class() {
    let app = App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Mobile), 200);
    let url = app.current_embed_url().unwrap();
    assert!(url.contains("quality=360p"));
    assert!(url.ends_with("&muted=0"));

    let app = App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Auto), 200);
    assert!(app.current_embed_url().unwrap().contains("quality=720p"));
  }

  #[tokio::test]
  async fn resize_reloads_open_modal() {
    let mut app = app();
    app.open_selected().await;
    app.check_pending().await.unwrap();
    assert_eq!(app.modal.phase(), Some(&Phase::Ready));

    app.viewport.resize(60);
    app.check_pending().await.unwrap();
    assert_eq!(app.viewport.current(), DeviceClass::Mobile);
    assert!(app.player.current_url.as_deref().is_some_and(|u| u.contains("quality=360p")));
  }

  fn cdn_thumbnail(item: &MediaItem) -> Thumbnail {
    let url = ResolverConfig::from_constants().cdn_url(&item.external_video_ref);
    Thumbnail { url, dimensions: None, provider: Provider::Cdn }
  }

  fn draw(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    terminal.draw(|frame| crate::ui::ui(frame, app)).unwrap();
    let buf = terminal.backend().buffer();
    (0..buf.area.height)
      .map(|y| (0..buf.area.width).map(|x| buf[(x, y)].symbol().to_string()).collect::<String>())
      .collect::<Vec<_>>()
      .join("\n")
  }

  #[tokio::test]
  async fn broken_cdn_image_renders_placeholder_card() {
    let mut app = App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Desktop), 120);
    let item = app.selected_item().unwrap();
    let thumb = cdn_thumbnail(item);
    app.thumbnails.insert(item.external_video_ref.clone(), ThumbnailResolution::Ready(thumb.clone()));
    app.images.insert(thumb.url.clone(), TileImage::Loading);
    app.tasks.image_tx.send((thumb.url.clone(), Err(anyhow!("HTTP 404 Not Found")))).unwrap();

    app.check_pending().await.unwrap();
    assert!(matches!(app.images.get(&thumb.url), Some(TileImage::Broken)));

    let text = draw(&mut app);
    assert!(text.contains("No preview available"));
    assert!(text.contains(item.title.split_whitespace().next().unwrap()));
  }

  #[tokio::test]
  async fn failed_resolution_renders_placeholder_card() {
    let mut app = App::with_config(Config::default(), DisplayMode::Ascii, false, Some(DeviceOverride::Desktop), 120);
    let item = app.selected_item().unwrap();
    app.thumbnails.insert(item.external_video_ref.clone(), ThumbnailResolution::Failed("bad ref".to_string()));

    let text = draw(&mut app);
    assert!(text.contains("No preview available"));
    assert!(text.contains("no preview: bad ref"));
    assert!(text.contains(item.title.split_whitespace().next().unwrap()));
  }

  #[tokio::test]
  async fn fast_host_image_is_not_downloaded_twice() {
    let mut app = app();
    let item = app.selected_item().unwrap();
    let url = ResolverConfig::from_constants().fast_url(&item.external_video_ref);
    app.cache.fetcher().keep_decoded(&url, DynamicImage::new_rgb8(16, 9));
    let thumb = Thumbnail { url: url.clone(), dimensions: Some((16, 9)), provider: Provider::Fast };
    app.tasks.resolved_tx.send((item.external_video_ref.clone(), ThumbnailResolution::Ready(thumb))).unwrap();

    app.check_pending().await.unwrap();
    assert!(matches!(app.images.get(&url), Some(TileImage::Loaded(_))));
    assert!(app.cache.fetcher().take_decoded(&url).is_none());
  }

  #[tokio::test]
  async fn refreshed_resolution_retries_broken_image() {
    let mut app = app();
    let item = app.selected_item().unwrap();
    let thumb = cdn_thumbnail(item);
    app.images.insert(thumb.url.clone(), TileImage::Broken);

    // The refreshed URL now serves an image.
    app.cache.fetcher().keep_decoded(&thumb.url, DynamicImage::new_rgb8(16, 9));
    app.tasks.resolved_tx.send((item.external_video_ref.clone(), ThumbnailResolution::Ready(thumb.clone()))).unwrap();
    app.check_pending().await.unwrap();
    assert!(matches!(app.images.get(&thumb.url), Some(TileImage::Loaded(_))));
  }

  #[tokio::test]
  async fn errors_expire() {
    let mut app = app();
    app.set_error("boom".to_string());
    app.error_time = Some(Instant::now() - Duration::from_secs(constants().error_display_secs + 1));
    app.expire_error();
    assert_eq!(app.last_error, None);
  }
}
