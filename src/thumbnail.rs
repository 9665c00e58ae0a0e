//! Thumbnail resolution for externally hosted videos: fast host, then oEmbed,
//! then an unverified CDN URL.

use anyhow::{Context, Result, anyhow};
use futures::future::{BoxFuture, FutureExt, Shared};
use image::DynamicImage;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::constants::constants;

// --- Types ---

/// Which step of the chain produced a thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
  Fast,
  Oembed,
  Cdn,
}

impl Provider {
  pub fn label(self) -> &'static str {
    match self {
      Provider::Fast => "vumbnail",
      Provider::Oembed => "oembed",
      Provider::Cdn => "cdn",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
  pub url: String,
  pub dimensions: Option<(u32, u32)>,
  pub provider: Provider,
}

/// Per-item resolution state shown by a gallery tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailResolution {
  Loading,
  Ready(Thumbnail),
  Failed(String),
}

impl ThumbnailResolution {
  pub fn url(&self) -> Option<&str> {
    match self {
      ThumbnailResolution::Ready(thumb) => Some(&thumb.url),
      _ => None,
    }
  }
}

/// A single provider attempt failing. Always recoverable: the chain moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("request failed: {0}")]
  Request(String),
  #[error("HTTP {0}")]
  Status(u16),
  #[error("image decode failed: {0}")]
  Decode(String),
  #[error("response has no thumbnail_url")]
  MissingThumbnail,
  #[error("timed out after {0:?}")]
  Timeout(Duration),
}

/// Subset of the oEmbed response we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OembedInfo {
  pub thumbnail_url: Option<String>,
  pub thumbnail_width: Option<u32>,
  pub thumbnail_height: Option<u32>,
  pub title: Option<String>,
}

/// Network access used by the chain.
pub trait ThumbnailFetcher: Send + Sync + 'static {
  /// Load `url` as an image and report its pixel dimensions.
  fn probe_image(&self, url: &str) -> impl Future<Output = Result<(u32, u32), ProviderError>> + Send;

  /// GET an oEmbed JSON document.
  fn oembed(&self, url: &str) -> impl Future<Output = Result<OembedInfo, ProviderError>> + Send;
}

// --- Provider URLs ---

#[derive(Debug, Clone)]
pub struct ResolverConfig {
  pub fast_host: String,
  pub oembed_endpoint: String,
  pub canonical_base: String,
  pub cdn_host: String,
  pub timeout: Duration,
  pub preferred_size: (u32, u32),
}

impl ResolverConfig {
  pub fn from_constants() -> Self {
    let c = constants();
    Self {
      fast_host: c.fast_thumb_host.clone(),
      oembed_endpoint: c.oembed_endpoint.clone(),
      canonical_base: c.canonical_video_base.clone(),
      cdn_host: c.cdn_thumb_host.clone(),
      timeout: c.provider_timeout(),
      preferred_size: (c.preferred_thumb_width, c.preferred_thumb_height),
    }
  }

  pub fn fast_url(&self, video_ref: &str) -> String {
    format!("{}/{}.jpg", self.fast_host, video_ref)
  }

  pub fn oembed_url(&self, video_ref: &str) -> String {
    let canonical = format!("{}/{}", self.canonical_base, video_ref);
    format!("{}?url={}", self.oembed_endpoint, urlencoding::encode(&canonical))
  }

  pub fn cdn_url(&self, video_ref: &str) -> String {
    let (w, h) = self.preferred_size;
    format!("{}/video/{}_{}x{}.jpg", self.cdn_host, video_ref, w, h)
  }
}

/// A reference must be usable as a single URL path segment.
fn validate_ref(video_ref: &str) -> Result<(), String> {
  if video_ref.is_empty() {
    return Err("empty video reference".to_string());
  }
  if video_ref.chars().any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#')) {
    return Err(format!("video reference {:?} is not a single path segment", video_ref));
  }
  Ok(())
}

/// Rewrite the last `<W>x<H>` token in the final path segment of `url`.
/// Returns `None` when the URL carries no such token.
pub fn rewrite_resolution_token(url: &str, width: u32, height: u32) -> Option<String> {
  let path_end = url.find(['?', '#']).unwrap_or(url.len());
  let segment_start = url[..path_end].rfind('/').map_or(0, |i| i + 1);
  let bytes = url.as_bytes();

  let mut found = None;
  for x in segment_start..path_end {
    if bytes[x] != b'x' {
      continue;
    }
    let mut start = x;
    while start > segment_start && bytes[start - 1].is_ascii_digit() {
      start -= 1;
    }
    let mut end = x + 1;
    while end < path_end && bytes[end].is_ascii_digit() {
      end += 1;
    }
    if start < x && end > x + 1 {
      found = Some((start, end));
    }
  }

  let (start, end) = found?;
  Some(format!("{}{}x{}{}", &url[..start], width, height, &url[end..]))
}

async fn race<T>(limit: Duration, attempt: impl Future<Output = Result<T, ProviderError>>) -> Result<T, ProviderError> {
  match tokio::time::timeout(limit, attempt).await {
    Ok(result) => result,
    Err(_) => Err(ProviderError::Timeout(limit)),
  }
}

// --- Resolution chain ---

/// Resolve a preview URL for `video_ref`. Always yields exactly one terminal
/// state; `Failed` only when no URL can be built for the reference at all.
/// Network steps run in order, each raced against `config.timeout`.
pub async fn resolve<F: ThumbnailFetcher>(fetcher: &F, config: &ResolverConfig, video_ref: &str) -> ThumbnailResolution {
  if let Err(reason) = validate_ref(video_ref) {
    return ThumbnailResolution::Failed(reason);
  }

  let fast_url = config.fast_url(video_ref);
  match race(config.timeout, fetcher.probe_image(&fast_url)).await {
    Ok(dims) => {
      debug!(video_ref, url = %fast_url, "thumbnail: fast host hit");
      return ThumbnailResolution::Ready(Thumbnail { url: fast_url, dimensions: Some(dims), provider: Provider::Fast });
    }
    Err(e) => debug!(video_ref, err = %e, "thumbnail: fast host failed"),
  }

  let lookup = async {
    let info = fetcher.oembed(&config.oembed_url(video_ref)).await?;
    info.thumbnail_url.filter(|u| !u.trim().is_empty()).ok_or(ProviderError::MissingThumbnail)
  };
  match race(config.timeout, lookup).await {
    Ok(raw) => {
      let (w, h) = config.preferred_size;
      let thumb = match rewrite_resolution_token(&raw, w, h) {
        Some(url) => Thumbnail { url, dimensions: Some((w, h)), provider: Provider::Oembed },
        None => Thumbnail { url: raw, dimensions: None, provider: Provider::Oembed },
      };
      debug!(video_ref, url = %thumb.url, "thumbnail: oembed hit");
      return ThumbnailResolution::Ready(thumb);
    }
    Err(e) => debug!(video_ref, err = %e, "thumbnail: oembed failed"),
  }

  let url = config.cdn_url(video_ref);
  debug!(video_ref, url = %url, "thumbnail: falling back to unverified cdn url");
  ThumbnailResolution::Ready(Thumbnail { url, dimensions: None, provider: Provider::Cdn })
}

// --- Shared memoization ---

type SharedResolution = Shared<BoxFuture<'static, ThumbnailResolution>>;

struct CacheEntry {
  future: SharedResolution,
  created: Instant,
}

/// Resolves each reference once and hands the same in-flight future to every
/// concurrent caller. Completed entries are reused until `ttl` elapses.
pub struct ThumbnailCache<F> {
  fetcher: Arc<F>,
  config: Arc<ResolverConfig>,
  ttl: Option<Duration>,
  entries: Arc<StdMutex<HashMap<String, CacheEntry>>>,
}

impl<F> Clone for ThumbnailCache<F> {
  fn clone(&self) -> Self {
    Self {
      fetcher: Arc::clone(&self.fetcher),
      config: Arc::clone(&self.config),
      ttl: self.ttl,
      entries: Arc::clone(&self.entries),
    }
  }
}

impl<F: ThumbnailFetcher> ThumbnailCache<F> {
  pub fn new(fetcher: F, config: ResolverConfig, ttl: Option<Duration>) -> Self {
    Self { fetcher: Arc::new(fetcher), config: Arc::new(config), ttl, entries: Arc::new(StdMutex::new(HashMap::new())) }
  }

  pub fn fetcher(&self) -> &F {
    &self.fetcher
  }

  fn is_stale(&self, entry: &CacheEntry) -> bool {
    // In-flight entries are never stale; only finished results age out.
    entry.future.peek().is_some() && self.ttl.is_some_and(|ttl| entry.created.elapsed() >= ttl)
  }

  /// Shared future for `video_ref`, starting a resolution if none is cached.
  pub fn resolve(&self, video_ref: &str) -> SharedResolution {
    let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(entry) = entries.get(video_ref)
      && !self.is_stale(entry)
    {
      return entry.future.clone();
    }

    let fetcher = Arc::clone(&self.fetcher);
    let config = Arc::clone(&self.config);
    let key = video_ref.to_string();
    let future = async move { resolve(fetcher.as_ref(), &config, &key).await }.boxed().shared();
    entries.insert(video_ref.to_string(), CacheEntry { future: future.clone(), created: Instant::now() });
    future
  }

  /// Finished result for `video_ref`, if any. In-flight entries report `None`.
  pub fn peek(&self, video_ref: &str) -> Option<ThumbnailResolution> {
    let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    entries.get(video_ref).and_then(|e| e.future.peek().cloned())
  }

  /// Whether `video_ref` has an entry that `resolve` would reuse.
  pub fn is_fresh(&self, video_ref: &str) -> bool {
    let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    entries.get(video_ref).is_some_and(|e| !self.is_stale(e))
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
  }
}

// --- HTTP fetcher ---

#[derive(Clone, Default)]
pub struct HttpFetcher {
  client: Client,
  /// Images decoded while probing the fast host, waiting for the tile loader.
  decoded: Arc<StdMutex<HashMap<String, DynamicImage>>>,
}

impl HttpFetcher {
  pub fn new(client: Client) -> Self {
    Self { client, decoded: Arc::default() }
  }

  pub fn client(&self) -> &Client {
    &self.client
  }

  pub(crate) fn keep_decoded(&self, url: &str, image: DynamicImage) {
    self.decoded.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(url.to_string(), image);
  }

  /// Take the image a probe already downloaded for `url`, so the tile needs no second request.
  pub fn take_decoded(&self, url: &str) -> Option<DynamicImage> {
    self.decoded.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(url)
  }
}

impl ThumbnailFetcher for HttpFetcher {
  async fn probe_image(&self, url: &str) -> Result<(u32, u32), ProviderError> {
    let response = self.client.get(url).send().await.map_err(|e| ProviderError::Request(e.to_string()))?;
    if !response.status().is_success() {
      return Err(ProviderError::Status(response.status().as_u16()));
    }
    let bytes = response.bytes().await.map_err(|e| ProviderError::Request(e.to_string()))?;
    let image = image::load_from_memory(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))?;
    let dims = (image.width(), image.height());
    self.keep_decoded(url, image);
    Ok(dims)
  }

  async fn oembed(&self, url: &str) -> Result<OembedInfo, ProviderError> {
    let response = self.client.get(url).send().await.map_err(|e| ProviderError::Request(e.to_string()))?;
    if !response.status().is_success() {
      return Err(ProviderError::Status(response.status().as_u16()));
    }
    response.json::<OembedInfo>().await.map_err(|e| ProviderError::Request(e.to_string()))
  }
}

/// Download and decode a resolved thumbnail for display.
pub async fn fetch_image(client: &Client, url: &str) -> Result<DynamicImage> {
  let response = client.get(url).send().await.with_context(|| format!("Failed to request thumbnail {}", url))?;
  if !response.status().is_success() {
    return Err(anyhow!("Thumbnail {} returned HTTP {}", url, response.status()));
  }
  let bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?;
  let image =
    image::load_from_memory(&bytes).with_context(|| format!("Failed to decode image from memory (URL: {})", url))?;
  info!(url, width = image.width(), height = image.height(), "thumbnail: image loaded");
  Ok(image)
}
