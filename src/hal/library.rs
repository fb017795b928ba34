//! Directory-backed media source.
//!
//! [`LocalLibrary`] serves audio files from a directory (usually a USB stick
//! mounted at `/media/usb`). If the directory has a `normalized_tracks/`
//! subdirectory, that is used instead. Files whose name contains `upbeat`
//! form the intro pool; everything else is the playlist pool.
//!
//! Durations are read from the container headers with symphonia and cached.
//! A file whose headers carry no usable duration is still served, timed with
//! the fallback duration.
//! Playback is delegated to an optional external player command, started with
//! the track path as its last argument and `CONDUCTOR_VOLUME` in its
//! environment. Without a command the library only times the show.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use rand::seq::SliceRandom;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use crate::error::MediaError;
use crate::traits::{MediaSource, TrackRef};

/// Subdirectory preferred over the library root when present.
pub const NORMALIZED_DIR: &str = "normalized_tracks";

/// Marker in a file name that puts it in the intro pool.
pub const UPBEAT_MARKER: &str = "upbeat";

/// Environment variable carrying the volume level to the player.
pub const VOLUME_ENV: &str = "CONDUCTOR_VOLUME";

/// Duration assumed for a file whose headers give none.
pub const DEFAULT_FALLBACK: Duration = Duration::from_secs(40);

const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

/// Media source over a directory of audio files.
#[derive(Debug)]
pub struct LocalLibrary {
    dir: PathBuf,
    upbeat: Vec<PathBuf>,
    tracks: Vec<PathBuf>,
    durations: HashMap<PathBuf, Duration>,
    fallback: Duration,
    player_command: Option<String>,
    player: Option<Child>,
    volume: u8,
}

impl LocalLibrary {
    /// Scan `root` (or its `normalized_tracks/` subdirectory).
    pub fn open(root: impl AsRef<Path>) -> Result<Self, MediaError> {
        let root = root.as_ref();
        let normalized = root.join(NORMALIZED_DIR);
        let dir = if normalized.is_dir() {
            normalized
        } else {
            root.to_path_buf()
        };

        let mut library = Self {
            dir,
            upbeat: Vec::new(),
            tracks: Vec::new(),
            durations: HashMap::new(),
            fallback: DEFAULT_FALLBACK,
            player_command: None,
            player: None,
            volume: 0,
        };
        library.rescan()?;
        Ok(library)
    }

    /// Play through this command. The track path is appended as the last
    /// argument.
    pub fn with_player_command(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        self.player_command = (!command.trim().is_empty()).then_some(command);
        self
    }

    /// Time files with unreadable headers as `fallback` long.
    pub fn with_fallback_duration(mut self, fallback: Duration) -> Self {
        self.fallback = fallback;
        self
    }

    /// Directory actually served.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Intro pool, sorted.
    pub fn upbeat_paths(&self) -> &[PathBuf] {
        &self.upbeat
    }

    /// Playlist pool, sorted.
    pub fn track_paths(&self) -> &[PathBuf] {
        &self.tracks
    }

    /// Re-read the directory. Returns the number of audio files found.
    pub fn rescan(&mut self) -> Result<usize, MediaError> {
        let mut upbeat = Vec::new();
        let mut tracks = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_audio_file(&path) {
                continue;
            }
            if is_upbeat(&path) {
                upbeat.push(path);
            } else {
                tracks.push(path);
            }
        }
        upbeat.sort();
        tracks.sort();

        info!(
            dir = %self.dir.display(),
            upbeat = upbeat.len(),
            tracks = tracks.len(),
            "scanned media library"
        );
        self.durations
            .retain(|path, _| upbeat.contains(path) || tracks.contains(path));
        self.upbeat = upbeat;
        self.tracks = tracks;
        Ok(self.upbeat.len() + self.tracks.len())
    }

    fn track_ref(&mut self, path: &Path) -> Result<TrackRef, MediaError> {
        if let Some(&duration) = self.durations.get(path) {
            return Ok(TrackRef {
                path: path.to_path_buf(),
                duration,
            });
        }
        let duration = match probe_duration(path) {
            Ok(duration) => duration,
            Err(e @ MediaError::Duration { .. }) => {
                warn!(
                    error = %e,
                    fallback_secs = self.fallback.as_secs_f64(),
                    "track length unknown, using fallback duration"
                );
                self.fallback
            }
            Err(e) => return Err(e),
        };
        self.durations.insert(path.to_path_buf(), duration);
        Ok(TrackRef {
            path: path.to_path_buf(),
            duration,
        })
    }

    fn stop_player(&mut self) {
        if let Some(mut child) = self.player.take() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "player already exited");
            }
            // Reap so the child does not linger as a zombie
            let _ = child.wait();
        }
    }
}

impl MediaSource for LocalLibrary {
    fn list_tracks(&mut self) -> Result<Vec<TrackRef>, MediaError> {
        let paths: Vec<PathBuf> = self.upbeat.iter().chain(&self.tracks).cloned().collect();
        let mut refs = Vec::with_capacity(paths.len());
        for path in paths {
            match self.track_ref(&path) {
                Ok(track) => refs.push(track),
                Err(e) => warn!(error = %e, "skipping track"),
            }
        }
        Ok(refs)
    }

    fn pick_upbeat_track(&mut self) -> Result<TrackRef, MediaError> {
        let path = self
            .upbeat
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(MediaError::NoTracks("upbeat"))?;
        self.track_ref(&path)
    }

    fn pick_next_track(&mut self, exclude: Option<&TrackRef>) -> Result<TrackRef, MediaError> {
        let candidates: Vec<&PathBuf> = match exclude {
            Some(prev) if self.tracks.len() > 1 => {
                self.tracks.iter().filter(|p| **p != prev.path).collect()
            }
            _ => self.tracks.iter().collect(),
        };
        let path = candidates
            .choose(&mut rand::thread_rng())
            .map(|p| (*p).clone())
            .ok_or(MediaError::NoTracks("playlist"))?;
        self.track_ref(&path)
    }

    fn play(&mut self, track: &TrackRef) -> Result<Duration, MediaError> {
        self.stop_player();
        if !track.path.is_file() {
            return Err(MediaError::NotFound(track.path.clone()));
        }
        let duration = self.track_ref(&track.path)?.duration;

        if let Some(command) = &self.player_command {
            let mut parts = command.split_whitespace();
            let program = parts
                .next()
                .ok_or_else(|| MediaError::Player("empty player command".into()))?;
            let child = Command::new(program)
                .args(parts)
                .arg(&track.path)
                .env(VOLUME_ENV, self.volume.to_string())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| MediaError::Player(format!("{program}: {e}")))?;
            self.player = Some(child);
        }
        Ok(duration)
    }

    fn set_volume(&mut self, level: u8) -> Result<(), MediaError> {
        debug!(level, "volume");
        self.volume = level;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        self.stop_player();
        Ok(())
    }
}

impl Drop for LocalLibrary {
    fn drop(&mut self) {
        self.stop_player();
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn is_upbeat(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase().contains(UPBEAT_MARKER))
        .unwrap_or(false)
}

/// Read a file's playback duration from its headers.
pub fn probe_duration(path: &Path) -> Result<Duration, MediaError> {
    let unknown = |reason: String| MediaError::Duration {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MediaError::NotFound(path.to_path_buf()),
        _ => MediaError::Io(e),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unknown(format!("probe failed: {e}")))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unknown("no audio track".into()))?;
    let params = &track.codec_params;

    let frames = params
        .n_frames
        .ok_or_else(|| unknown("frame count not in header".into()))?;
    let seconds = match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(frames);
            time.seconds as f64 + time.frac
        }
        (None, Some(rate)) if rate > 0 => frames as f64 / rate as f64,
        _ => return Err(unknown("no time base or sample rate".into())),
    };

    if seconds <= 0.0 || !seconds.is_finite() {
        return Err(unknown(format!("non-positive duration {seconds}")));
    }
    Ok(Duration::from_secs_f64(seconds))
}
