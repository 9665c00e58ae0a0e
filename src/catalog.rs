//! Static media catalog embedded from `catalog.ron`.

use serde::Deserialize;
use std::sync::LazyLock;

/// A catalog entry referencing an externally hosted video.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaItem {
  pub id: String,
  /// Opaque token handed to the video provider.
  pub external_video_ref: String,
  pub title: String,
  pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilterCategory {
  pub tag: String,
  pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct Catalog {
  /// Filter tag that matches every item.
  pub all_tag: String,
  pub filters: Vec<FilterCategory>,
  pub items: Vec<MediaItem>,
  pub effects: Vec<String>,
  pub event_types: Vec<String>,
}

/// The active category filter owned by the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
  All,
  Category(String),
}

impl Filter {
  pub fn from_tag(tag: &str) -> Self {
    if tag.is_empty() || tag == catalog().all_tag {
      Filter::All
    } else {
      Filter::Category(tag.to_string())
    }
  }

  pub fn tag(&self) -> &str {
    match self {
      Filter::All => &catalog().all_tag,
      Filter::Category(tag) => tag,
    }
  }

  pub fn matches(&self, item: &MediaItem) -> bool {
    match self {
      Filter::All => true,
      Filter::Category(tag) => item.category == *tag,
    }
  }
}

impl Catalog {
  /// Items visible under `filter`, in catalog order.
  pub fn filter_items(&self, filter: &Filter) -> Vec<&MediaItem> {
    self.items.iter().filter(|item| filter.matches(item)).collect()
  }

  /// Display label for a tag, falling back to the tag itself.
  pub fn label_for<'a>(&'a self, tag: &'a str) -> &'a str {
    self.filters.iter().find(|f| f.tag == tag).map_or(tag, |f| f.label.as_str())
  }

  /// The filter after `current` in display order, wrapping around.
  pub fn next_filter(&self, current: &Filter) -> Filter {
    self.step_filter(current, 1)
  }

  pub fn prev_filter(&self, current: &Filter) -> Filter {
    self.step_filter(current, self.filters.len().saturating_sub(1))
  }

  fn step_filter(&self, current: &Filter, step: usize) -> Filter {
    if self.filters.is_empty() {
      return Filter::All;
    }
    let idx = self.filters.iter().position(|f| f.tag == current.tag()).unwrap_or(0);
    Filter::from_tag(&self.filters[(idx + step) % self.filters.len()].tag)
  }
}

static CATALOG: LazyLock<Catalog> = LazyLock::new(|| {
  ron::from_str(include_str!("../catalog.ron")).expect("catalog.ron must be valid RON (embedded at compile time)")
});

pub fn catalog() -> &'static Catalog {
  &CATALOG
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_catalog_parses() {
    let c = catalog();
    assert!(!c.items.is_empty());
    assert_eq!(c.filters[0].tag, c.all_tag);
  }

  #[test]
  fn filter_all_keeps_order() {
    let c = catalog();
    let visible = c.filter_items(&Filter::All);
    assert_eq!(visible.len(), c.items.len());
    assert!(visible.iter().zip(&c.items).all(|(a, b)| a.id == b.id));
  }

  #[test]
  fn filter_by_category() {
    let c = catalog();
    let bodas = c.filter_items(&Filter::Category("bodas".to_string()));
    assert!(!bodas.is_empty());
    assert!(bodas.iter().all(|i| i.category == "bodas"));
  }

  #[test]
  fn unknown_category_is_empty() {
    assert!(catalog().filter_items(&Filter::Category("nope".to_string())).is_empty());
  }

  #[test]
  fn from_tag_all() {
    assert_eq!(Filter::from_tag("todos"), Filter::All);
    assert_eq!(Filter::from_tag(""), Filter::All);
    assert_eq!(Filter::from_tag("humo"), Filter::Category("humo".to_string()));
  }

  #[test]
  fn filter_cycle_wraps() {
    let c = catalog();
    let mut f = Filter::All;
    for _ in 0..c.filters.len() {
      f = c.next_filter(&f);
    }
    assert_eq!(f, Filter::All);
    assert_eq!(c.next_filter(&c.prev_filter(&Filter::All)), Filter::All);
  }

  #[test]
  fn label_lookup() {
    let c = catalog();
    assert_eq!(c.label_for("cumpleanos"), "Cumpleaños");
    assert_eq!(c.label_for("unknown"), "unknown");
  }
}
