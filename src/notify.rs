//! Episode notification sinks.
//!
//! A notifier receives each closed episode exactly once. Sinks are one-way
//! and must never fail the pipeline: write errors are logged and swallowed.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::episode::Episode;

pub trait Notifier: Send {
    fn on_episode_closed(&mut self, episode: &Episode);
}

/// Human-readable notifier printing one line per closed episode to stdout.
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn on_episode_closed(&mut self, episode: &Episode) {
        let duration_s = episode
            .duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let artifacts = episode
            .artifacts
            .iter()
            .map(|a| {
                format!(
                    "{} ({}, {} frames)",
                    a.path.display(),
                    a.mode,
                    a.frames_written
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let degraded = if episode.recording_degraded {
            " [recording degraded]"
        } else {
            ""
        };
        println!(
            "Cat finished using sandbox: duration={:.1}s, artifacts=[{}]{}",
            duration_s, artifacts, degraded
        );
    }
}

/// Machine-readable notifier: one JSON object per line to any writer.
pub struct JsonLinesNotifier<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Notifier for JsonLinesNotifier<W> {
    fn on_episode_closed(&mut self, episode: &Episode) {
        let record = json!({
            "episode": episode.id.to_string(),
            "start_s": episode.start_time.as_secs_f64(),
            "end_s": episode.end_time.map(|d| d.as_secs_f64()),
            "duration_s": episode.duration().map(|d| d.as_secs_f64()),
            "mode": episode.mode,
            "recording_degraded": episode.recording_degraded,
            "artifacts": episode.artifacts,
        });
        if let Err(e) = writeln!(self.out, "{}", record) {
            log::warn!("failed to emit episode notification: {}", e);
        }
    }
}

/// Collecting notifier for tests; clones observe the same episode list.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    episodes: Arc<Mutex<Vec<Episode>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed(&self) -> Vec<Episode> {
        self.episodes.lock().unwrap().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn on_episode_closed(&mut self, episode: &Episode) {
        self.episodes.lock().unwrap().push(episode.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::ArtifactMetadata;
    use crate::recording::RecorderMode;
    use crate::tracker::EpisodeId;
    use std::path::PathBuf;
    use std::time::Duration;

    fn closed_episode() -> Episode {
        let mut ep = Episode::open(EpisodeId(3), Duration::from_secs(10), RecorderMode::Video);
        ep.end_time = Some(Duration::from_secs(22));
        ep.artifacts.push(ArtifactMetadata {
            path: PathBuf::from("cat_captures/cat_20260806_120000_1.mp4"),
            mode: RecorderMode::Video,
            frames_written: 180,
            duration_s: 12.0,
            average_confidence: 0.82,
        });
        ep
    }

    #[test]
    fn json_lines_notifier_emits_one_parseable_line() {
        let mut buf = Vec::new();
        {
            let mut notifier = JsonLinesNotifier::new(&mut buf);
            notifier.on_episode_closed(&closed_episode());
        }

        let line = String::from_utf8(buf).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["episode"], "ep-3");
        assert_eq!(value["duration_s"], 12.0);
        assert_eq!(value["recording_degraded"], false);
        assert_eq!(value["artifacts"][0]["frames_written"], 180);
    }

    #[test]
    fn memory_notifier_collects_in_order() {
        let probe = MemoryNotifier::new();
        let mut notifier = probe.clone();
        notifier.on_episode_closed(&closed_episode());
        assert_eq!(probe.closed().len(), 1);
        assert_eq!(probe.closed()[0].id, EpisodeId(3));
    }
}
