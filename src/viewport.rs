use clap::ValueEnum;
use tokio::sync::watch;
use tracing::info;

use crate::constants::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
  Mobile,
  Desktop,
}

impl DeviceClass {
  /// Viewports narrower than `mobile_max` columns are Mobile.
  pub fn classify(width: u16, mobile_max: u16) -> Self {
    if width < mobile_max { DeviceClass::Mobile } else { DeviceClass::Desktop }
  }

  pub fn label(self) -> &'static str {
    match self {
      DeviceClass::Mobile => "mobile",
      DeviceClass::Desktop => "desktop",
    }
  }
}

/// User override for the device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeviceOverride {
  #[default]
  Auto,
  Mobile,
  Desktop,
}

impl DeviceOverride {
  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "mobile" => DeviceOverride::Mobile,
      "desktop" => DeviceOverride::Desktop,
      _ => DeviceOverride::Auto,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      DeviceOverride::Auto => "auto",
      DeviceOverride::Mobile => "mobile",
      DeviceOverride::Desktop => "desktop",
    }
  }
}

/// How the video modal lays out the player area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerLayout {
  /// Fill the whole overlay vertically.
  FullBleed,
  /// Fixed 16:9 box centered in the overlay.
  Letterbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPlacement {
  BottomCenter,
  SideEdges,
}

/// Playback parameters selected by device class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackParams {
  pub quality: String,
  pub layout: PlayerLayout,
  pub controls: ControlPlacement,
  /// Vertical resolution cap handed to the external player.
  pub max_height: u32,
}

impl PlaybackParams {
  pub fn for_class(class: DeviceClass) -> Self {
    let c = constants();
    match class {
      DeviceClass::Mobile => Self {
        quality: c.mobile_quality.clone(),
        layout: PlayerLayout::FullBleed,
        controls: ControlPlacement::BottomCenter,
        max_height: quality_height(&c.mobile_quality),
      },
      DeviceClass::Desktop => Self {
        quality: c.desktop_quality.clone(),
        layout: PlayerLayout::Letterbox,
        controls: ControlPlacement::SideEdges,
        max_height: quality_height(&c.desktop_quality),
      },
    }
  }
}

/// `"360p"` -> 360. Unparseable hints fall back to 720.
fn quality_height(quality: &str) -> u32 {
  quality.trim_end_matches('p').parse().unwrap_or(720)
}

/// Current `DeviceClass`, published to subscribers over a `watch` channel.
pub struct Viewport {
  mobile_max: u16,
  forced: Option<DeviceClass>,
  tx: watch::Sender<DeviceClass>,
}

impl Viewport {
  pub fn new(initial_width: u16, device: DeviceOverride) -> Self {
    Self::with_threshold(initial_width, device, constants().mobile_max_columns)
  }

  pub fn with_threshold(initial_width: u16, device: DeviceOverride, mobile_max: u16) -> Self {
    let forced = match device {
      DeviceOverride::Auto => None,
      DeviceOverride::Mobile => Some(DeviceClass::Mobile),
      DeviceOverride::Desktop => Some(DeviceClass::Desktop),
    };
    let initial = forced.unwrap_or_else(|| DeviceClass::classify(initial_width, mobile_max));
    let (tx, _rx) = watch::channel(initial);
    Self { mobile_max, forced, tx }
  }

  /// Feed a new viewport width. Publishes only when the class changes.
  pub fn resize(&self, width: u16) {
    if self.forced.is_some() {
      return;
    }
    let class = DeviceClass::classify(width, self.mobile_max);
    let changed = self.tx.send_if_modified(|current| {
      if *current == class {
        false
      } else {
        *current = class;
        true
      }
    });
    if changed {
      info!(width, class = class.label(), "viewport: device class changed");
    }
  }

  pub fn current(&self) -> DeviceClass {
    *self.tx.borrow()
  }

  pub fn subscribe(&self) -> watch::Receiver<DeviceClass> {
    self.tx.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classify_threshold() {
    assert_eq!(DeviceClass::classify(99, 100), DeviceClass::Mobile);
    assert_eq!(DeviceClass::classify(100, 100), DeviceClass::Desktop);
    assert_eq!(DeviceClass::classify(767, 768), DeviceClass::Mobile);
  }

  #[test]
  fn params_differ_by_class() {
    let mobile = PlaybackParams::for_class(DeviceClass::Mobile);
    let desktop = PlaybackParams::for_class(DeviceClass::Desktop);
    assert_eq!(mobile.quality, "360p");
    assert_eq!(mobile.max_height, 360);
    assert_eq!(mobile.layout, PlayerLayout::FullBleed);
    assert_eq!(mobile.controls, ControlPlacement::BottomCenter);
    assert_eq!(desktop.quality, "720p");
    assert_eq!(desktop.layout, PlayerLayout::Letterbox);
    assert_eq!(desktop.controls, ControlPlacement::SideEdges);
  }

  #[test]
  fn quality_height_parse() {
    assert_eq!(quality_height("1080p"), 1080);
    assert_eq!(quality_height("auto"), 720);
  }

  #[test]
  fn resize_publishes_only_class_changes() {
    let viewport = Viewport::with_threshold(120, DeviceOverride::Auto, 100);
    let mut rx = viewport.subscribe();
    assert_eq!(viewport.current(), DeviceClass::Desktop);

    viewport.resize(110);
    assert!(!rx.has_changed().unwrap_or(true));

    viewport.resize(80);
    assert!(rx.has_changed().unwrap_or(false));
    assert_eq!(*rx.borrow_and_update(), DeviceClass::Mobile);
  }

  #[test]
  fn forced_class_ignores_resize() {
    let viewport = Viewport::with_threshold(200, DeviceOverride::Mobile, 100);
    assert_eq!(viewport.current(), DeviceClass::Mobile);
    viewport.resize(300);
    assert_eq!(viewport.current(), DeviceClass::Mobile);
  }

  #[test]
  fn override_from_config() {
    assert_eq!(DeviceOverride::from_config("Mobile"), DeviceOverride::Mobile);
    assert_eq!(DeviceOverride::from_config("desktop"), DeviceOverride::Desktop);
    assert_eq!(DeviceOverride::from_config("whatever"), DeviceOverride::Auto);
  }
}
