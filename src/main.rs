mod app;
mod catalog;
mod config;
mod constants;
mod display;
mod graphics;
mod input;
mod modal;
mod player;
mod quote;
mod scroll_lock;
mod theme;
mod thumbnail;
mod ui;
mod viewport;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;

use app::{App, TileImage};
use constants::constants;
use display::{CliDisplayMode, DisplayMode};
use graphics::{kitty_delete_all, kitty_render_image};
use quote::{AdvisoryRequest, QuoteRequest, whatsapp_url};
use thumbnail::{HttpFetcher, ResolverConfig, ThumbnailCache, ThumbnailResolution};
use viewport::DeviceOverride;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Display mode: 'auto', 'kitty', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto", global = true)]
  display_mode: CliDisplayMode,

  /// Never spawn the external player; videos open in the browser with ^o
  #[arg(long, global = true)]
  no_player: bool,

  /// Force the device class instead of deriving it from the terminal width
  #[arg(long, global = true)]
  device: Option<DeviceOverride>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse the video gallery (default)
  Gallery,
  /// Resolve preview thumbnails for video references and print them
  Resolve {
    #[arg(required = true)]
    refs: Vec<String>,
    /// Print one JSON object per reference
    #[arg(long)]
    json: bool,
  },
  /// Build a WhatsApp quote request for an event
  Quote {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    city: Option<String>,
    /// One of the catalog event types (e.g. "Boda")
    #[arg(long)]
    event_type: String,
    /// Event date as YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    guests: Option<String>,
    #[arg(long)]
    comments: Option<String>,
    /// Special effect to include; repeat for several
    #[arg(long = "effect", required = true)]
    effects: Vec<String>,
    /// Open the link instead of only printing it
    #[arg(long)]
    open: bool,
  },
  /// Build a WhatsApp request for a call back from an advisor
  Advise {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    open: bool,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

// --- Logging ---

/// File logging; stdout belongs to the TUI. The guard must outlive the app.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  use tracing_subscriber::{EnvFilter, fmt, prelude::*};

  let logs_dir = config::log_dir();
  std::fs::create_dir_all(&logs_dir).ok()?;

  let file_appender = tracing_appender::rolling::daily(&logs_dir, "fxreel.log");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
  let env_filter = EnvFilter::try_from_env("FXREEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_target(true))
    .try_init()
    .ok()?;
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();

  match args.command {
    None | Some(Command::Gallery) => run_gallery(args.display_mode, args.no_player, args.device).await,
    Some(Command::Resolve { refs, json }) => run_resolve(&refs, json).await,
    Some(Command::Quote {
      name,
      phone,
      email,
      city,
      event_type,
      date,
      time,
      location,
      guests,
      comments,
      effects,
      open,
    }) => {
      let request = QuoteRequest {
        name,
        phone,
        email,
        city,
        event_type,
        event_date: Some(date),
        event_time: time,
        location,
        guests,
        comments,
        effects,
      }
      .validate()
      .context("Invalid quote request")?;
      hand_off(&request.message(), open)
    }
    Some(Command::Advise { name, phone, open }) => {
      let request = AdvisoryRequest { name, phone }.validate().context("Invalid advisory request")?;
      hand_off(&request.message(), open)
    }
    Some(Command::Completions { shell }) => {
      clap_complete::generate(shell, &mut Args::command(), "fxreel", &mut std::io::stdout());
      Ok(())
    }
  }
}

/// Print the message and its WhatsApp link, optionally opening it.
fn hand_off(message: &str, open: bool) -> Result<()> {
  let url = whatsapp_url(&constants().whatsapp_number, message);
  println!("{}\n\n{}", message, url);
  info!(open, "quote: link built");
  if open {
    player::open_in_browser(&url).context("Failed to open WhatsApp link")?;
  }
  Ok(())
}

async fn run_resolve(refs: &[String], json: bool) -> Result<()> {
  let cache = ThumbnailCache::new(HttpFetcher::default(), ResolverConfig::from_constants(), None);
  let results = futures::future::join_all(refs.iter().map(|r| cache.resolve(r))).await;

  for (video_ref, resolution) in refs.iter().zip(results) {
    if json {
      let value = match &resolution {
        ThumbnailResolution::Ready(t) => serde_json::json!({
          "ref": video_ref,
          "url": t.url,
          "provider": t.provider.label(),
          "width": t.dimensions.map(|d| d.0),
          "height": t.dimensions.map(|d| d.1),
        }),
        ThumbnailResolution::Failed(reason) => serde_json::json!({ "ref": video_ref, "error": reason }),
        ThumbnailResolution::Loading => serde_json::json!({ "ref": video_ref }),
      };
      println!("{}", serde_json::to_string(&value).context("Failed to serialize resolution")?);
      continue;
    }
    match resolution {
      ThumbnailResolution::Ready(t) => {
        let dims = t.dimensions.map(|(w, h)| format!(" ({}x{})", w, h)).unwrap_or_default();
        println!("{}\t{}\t{}{}", video_ref, t.provider.label(), t.url, dims);
      }
      ThumbnailResolution::Failed(reason) => println!("{}\tfailed\t{}", video_ref, reason),
      ThumbnailResolution::Loading => println!("{}\tpending", video_ref),
    }
  }
  Ok(())
}

async fn run_gallery(display_mode: CliDisplayMode, no_player: bool, device: Option<DeviceOverride>) -> Result<()> {
  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, display::resolve_display_mode(display_mode), !no_player, device).await;
  ratatui::restore();
  result
}

async fn run(
  terminal: &mut DefaultTerminal,
  display_mode: DisplayMode,
  player_enabled: bool,
  device: Option<DeviceOverride>,
) -> Result<()> {
  let width = terminal.size().context("Failed to read terminal size")?.width;
  let mut app = App::new(display_mode, player_enabled, device, width);
  let uses_graphics_protocol = display_mode.uses_graphics_protocol();
  info!(mode = display_mode.label(), width, "gallery: started");

  loop {
    app.request_visible_thumbnails();
    app.check_pending().await?;

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if uses_graphics_protocol {
      match (app.gfx.thumb_area, app.gfx.thumb_url.clone()) {
        (Some(area), Some(url)) => {
          let key = (url, area);
          if app.gfx.last_sent.as_ref() != Some(&key)
            && let Some(TileImage::Loaded(image)) = app.images.get(&key.0)
          {
            kitty_delete_all()?;
            kitty_render_image(image, area, 1)?;
            app.gfx.last_sent = Some(key);
          }
        }
        _ => {
          if app.gfx.last_sent.is_some() {
            kitty_delete_all()?;
            app.gfx.last_sent = None;
          }
        }
      }
    }

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        Event::Resize(width, _) => {
          app.viewport.resize(width);
          app.gfx.last_sent = None;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  if uses_graphics_protocol {
    kitty_delete_all()?;
  }
  app.player.stop().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_definition_is_valid() {
    Args::command().debug_assert();
  }

  #[test]
  fn no_subcommand_means_gallery() {
    let args = Args::parse_from(["fxreel", "--no-player", "--device", "mobile"]);
    assert!(args.command.is_none());
    assert!(args.no_player);
    assert_eq!(args.device, Some(DeviceOverride::Mobile));
  }

  #[test]
  fn quote_collects_repeated_effects() {
    let args = Args::parse_from([
      "fxreel",
      "quote",
      "--name",
      "Ana",
      "--phone",
      "3137431884",
      "--event-type",
      "Boda",
      "--date",
      "2025-11-23",
      "--effect",
      "Humo",
      "--effect",
      "Niebla Baja",
    ]);
    let Some(Command::Quote { effects, date, open, .. }) = args.command else { panic!("expected quote") };
    assert_eq!(effects, vec!["Humo", "Niebla Baja"]);
    assert_eq!(date, NaiveDate::from_ymd_opt(2025, 11, 23).unwrap());
    assert!(!open);
  }

  #[test]
  fn resolve_requires_a_ref() {
    assert!(Args::try_parse_from(["fxreel", "resolve"]).is_err());
  }
}
