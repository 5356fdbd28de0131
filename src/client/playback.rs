use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::audio::wav_duration;

/// Sent by a player when a playback has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackEnded {
    pub playback_id: String,
}

/// Audio output device.
///
/// `play` returns once playback has started; completion is reported on
/// `ended` with the same playback ID.
#[async_trait::async_trait]
pub trait Player: Send + Sync {
    async fn play(
        &self,
        playback_id: &str,
        audio: Vec<u8>,
        content_type: &str,
        ended: mpsc::Sender<PlaybackEnded>,
    ) -> Result<()>;
}

/// Writes each synthesized reply to `{dir}/{playback_id}.{ext}`.
///
/// Playback IDs come from the server; anything outside `[A-Za-z0-9_-]` is
/// replaced so the file always lands directly in `dir`.
///
/// With `realtime` set, completion is delayed by the clip's duration when
/// it is known (WAV), as a speaker would.
pub struct FilePlayer {
    dir: PathBuf,
    realtime: bool,
}

impl FilePlayer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            realtime: false,
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

#[async_trait::async_trait]
impl Player for FilePlayer {
    async fn play(
        &self,
        playback_id: &str,
        audio: Vec<u8>,
        content_type: &str,
        ended: mpsc::Sender<PlaybackEnded>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create playback dir {}", self.dir.display()))?;

        let path = self
            .dir
            .join(format!("{}.{}", file_stem(playback_id), extension_for(content_type)));
        let duration = if self.realtime {
            wav_duration(&audio).unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        };

        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Playing {} ({} bytes) via {}", playback_id, audio.len(), path.display());

        let playback_id = playback_id.to_string();
        tokio::spawn(async move {
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }
            if ended.send(PlaybackEnded { playback_id }).await.is_err() {
                debug!("Playback listener gone");
            }
        });

        Ok(())
    }
}

fn file_stem(playback_id: &str) -> String {
    let stem: String = playback_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "playback".to_string()
    } else {
        stem
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/webm" => "webm",
        _ => "bin",
    }
}
