use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::{
  io::{AsyncBufReadExt, BufReader as TokioBufReader},
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{info, warn};

/// Raw output from the mpv monitor task.
#[derive(Debug)]
enum MonitorEvent {
  Status(String),
  Exited,
}

/// What the modal needs to hear from the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerSignal {
  /// First status line: playback has started.
  Ready,
  /// The process went away before playback started.
  Failed(String),
  /// The process exited after playing (window closed or video finished).
  Ended,
}

/// External player for embed URLs. Spawns `mpv` (which resolves the page
/// through yt-dlp) and turns its status output into modal signals.
pub struct EmbedPlayer {
  enabled: bool,
  current_process: Option<TokioChild>,
  monitor_handle: Option<JoinHandle<()>>,
  events_rx: Option<mpsc::Receiver<MonitorEvent>>,
  last_status: Option<String>,
  ready_sent: bool,
  pub current_url: Option<String>,
}

impl EmbedPlayer {
  /// `enabled = false` never spawns a process; every load reports ready
  /// immediately so the modal can show the embed link.
  pub fn new(enabled: bool) -> Self {
    Self {
      enabled,
      current_process: None,
      monitor_handle: None,
      events_rx: None,
      last_status: None,
      ready_sent: false,
      current_url: None,
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn last_status(&self) -> Option<&str> {
    self.last_status.as_deref()
  }

  pub async fn play(&mut self, url: &str, max_height: u32) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;
    self.current_url = Some(url.to_string());
    self.ready_sent = false;

    if !self.enabled {
      return Ok(());
    }

    let ytdl_format = format!("--ytdl-format=bestvideo[height<={h}]+bestaudio/best[height<={h}]", h = max_height);
    let mut cmd = Command::new("mpv");
    cmd.args([
      ytdl_format.as_str(),
      "--force-window=immediate",
      "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | ${media-title} | ${pause}",
      url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // stderr is never drained; piping it would eventually block mpv.
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get mpv stdout")?;
    let (tx, rx) = mpsc::channel::<MonitorEvent>(16);
    self.events_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let mut lines = TokioBufReader::new(stdout).lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
          continue;
        }
        if tx.send(MonitorEvent::Status(line)).await.is_err() {
          return;
        }
      }
      let _ = tx.send(MonitorEvent::Exited).await;
    });

    info!(url, max_height, "player: mpv spawned");
    self.current_process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    Ok(())
  }

  /// Drain monitor output. Returns at most one signal per call.
  pub fn poll(&mut self) -> Option<PlayerSignal> {
    if !self.enabled {
      if self.current_url.is_some() && !self.ready_sent {
        self.ready_sent = true;
        return Some(PlayerSignal::Ready);
      }
      return None;
    }

    let rx = self.events_rx.as_mut()?;
    while let Ok(event) = rx.try_recv() {
      match event {
        MonitorEvent::Status(line) => {
          self.last_status = Some(line);
          if !self.ready_sent {
            self.ready_sent = true;
            return Some(PlayerSignal::Ready);
          }
        }
        MonitorEvent::Exited => {
          self.events_rx = None;
          self.current_process = None;
          self.monitor_handle = None;
          if self.ready_sent {
            info!("player: playback ended");
            return Some(PlayerSignal::Ended);
          }
          warn!("player: mpv exited before playback started");
          return Some(PlayerSignal::Failed("The player exited before the video started".to_string()));
        }
      }
    }
    None
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.events_rx = None;
    self.last_status = None;

    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }

    self.current_url = None;
    self.ready_sent = false;
    Ok(())
  }
}

/// Open `url` with the platform's default handler (browser or messaging app).
pub fn open_in_browser(url: &str) -> Result<()> {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";

  let mut child = std::process::Command::new(cmd)
    .arg(url)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to launch {}", cmd))?;
  // Reap the child in a background thread to avoid zombie processes.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn disabled_player_reports_ready_once() {
    let mut player = EmbedPlayer::new(false);
    assert_eq!(player.poll(), None);
    player.play("https://player.test/video/1", 360).await.unwrap();
    assert!(!player.is_playing());
    assert_eq!(player.poll(), Some(PlayerSignal::Ready));
    assert_eq!(player.poll(), None);
  }

  #[tokio::test]
  async fn stop_clears_state() {
    let mut player = EmbedPlayer::new(false);
    player.play("https://player.test/video/1", 720).await.unwrap();
    player.stop().await.unwrap();
    assert_eq!(player.current_url, None);
    assert_eq!(player.poll(), None);
  }

  #[tokio::test]
  async fn replay_resets_ready() {
    let mut player = EmbedPlayer::new(false);
    player.play("https://player.test/video/1", 720).await.unwrap();
    assert_eq!(player.poll(), Some(PlayerSignal::Ready));
    player.play("https://player.test/video/2", 720).await.unwrap();
    assert_eq!(player.poll(), Some(PlayerSignal::Ready));
  }
}
