//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so provider hosts and
//! timeouts are always available without runtime file I/O. Parsed once on
//! first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub business_name: String,
  pub whatsapp_number: String,

  // Thumbnail providers
  pub fast_thumb_host: String,
  pub oembed_endpoint: String,
  pub canonical_video_base: String,
  pub cdn_thumb_host: String,
  pub provider_timeout_ms: u64,
  pub preferred_thumb_width: u32,
  pub preferred_thumb_height: u32,
  pub thumbnail_ttl_secs: u64,

  // Embedded player
  pub player_embed_base: String,
  pub mobile_quality: String,
  pub desktop_quality: String,
  pub player_load_timeout_secs: u64,

  // Device classification
  pub mobile_max_columns: u16,

  pub error_display_secs: u64,
}

impl Constants {
  pub fn provider_timeout(&self) -> Duration {
    Duration::from_millis(self.provider_timeout_ms)
  }

  pub fn player_load_timeout(&self) -> Duration {
    Duration::from_secs(self.player_load_timeout_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // The RON file is embedded at compile time; a malformed file fails the first test run.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
