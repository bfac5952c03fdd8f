use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::Args;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("--song is required")]
    MissingSong,
    #[error("Audio file not found: {}", .0.display())]
    SongNotFound(PathBuf),
    #[error("Could not resolve path {}: {}", .0.display(), .1)]
    Unresolvable(PathBuf, std::io::Error),
}

/// Everything needed for one render, validated and resolved. Read-only once built.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    song_path: PathBuf,
    style: String,
    output_path: String,
    start_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    fps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<i64>,
    speed_fpm: f64,
    batch_size: i64,
    truncation: f64,
    motion_randomness: f64,
}

/// Keyword arguments for `LucidSonicDream.hallucinate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderParams {
    pub file_name: String,
    pub fps: i64,
    pub resolution: Option<i64>,
    pub start: f64,
    pub duration: Option<f64>,
    pub speed_fpm: i64,
    pub batch_size: i64,
    pub motion_randomness: f64,
    pub truncation: f64,
}

impl RenderRequest {
    /// Builds the request from parsed arguments. The song must exist.
    pub fn from_args(args: &Args) -> Result<Self, RequestError> {
        let song = args.song.as_deref().ok_or(RequestError::MissingSong)?;
        let song_path = resolve_song(song)?;

        for (name, value) in [
            ("truncation", args.truncation),
            ("motion randomness", args.motion_randomness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                warn!("{} {} is outside the expected range 0-1", name, value);
            }
        }

        Ok(Self {
            song_path,
            style: args.style.clone(),
            output_path: args.output.clone(),
            start_seconds: args.start,
            duration_seconds: args.duration,
            fps: args.fps,
            resolution: args.resolution,
            speed_fpm: args.speed_fpm,
            batch_size: args.batch_size,
            truncation: args.truncation,
            motion_randomness: args.motion_randomness,
        })
    }

    pub fn song_path(&self) -> &Path {
        &self.song_path
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn resolution(&self) -> Option<i64> {
        self.resolution
    }

    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }

    pub fn truncation(&self) -> f64 {
        self.truncation
    }

    pub fn motion_randomness(&self) -> f64 {
        self.motion_randomness
    }

    /// Forwarded fps. Truncates toward zero, never rounds.
    pub fn frame_rate(&self) -> i64 {
        self.fps.trunc() as i64
    }

    /// Forwarded speed in frames per minute, truncated like `frame_rate`.
    pub fn speed(&self) -> i64 {
        self.speed_fpm.trunc() as i64
    }

    pub fn params(&self) -> RenderParams {
        RenderParams {
            file_name: self.output_path.clone(),
            fps: self.frame_rate(),
            resolution: self.resolution,
            start: self.start_seconds,
            duration: self.duration_seconds,
            speed_fpm: self.speed(),
            batch_size: self.batch_size,
            motion_randomness: self.motion_randomness,
            truncation: self.truncation,
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Default location for `--write-request`: the output path with a .json extension.
    pub fn default_request_path(&self) -> PathBuf {
        let mut out = PathBuf::from(&self.output_path);
        out.set_extension("json");
        out
    }
}

fn resolve_song(song: &Path) -> Result<PathBuf, RequestError> {
    let resolved = std::path::absolute(song)
        .map_err(|e| RequestError::Unresolvable(song.to_path_buf(), e))?;
    debug!("resolved song path {} -> {}", song.display(), resolved.display());
    if !resolved.exists() {
        return Err(RequestError::SongNotFound(resolved));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args_for(song: &Path, extra: &[&str]) -> Args {
        let song = song.to_str().unwrap();
        let mut argv = vec!["lucid-dream", "--song", song];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_forward_documented_params() {
        let song = tempfile::NamedTempFile::new().unwrap();
        let request = RenderRequest::from_args(&args_for(song.path(), &[])).unwrap();

        assert!(request.song_path.is_absolute());
        assert_eq!(request.style, "abstract photos");
        assert_eq!(
            request.params(),
            RenderParams {
                file_name: "lucid-sonic-dreams.mp4".to_string(),
                fps: 43,
                resolution: None,
                start: 0.0,
                duration: None,
                speed_fpm: 12,
                batch_size: 1,
                motion_randomness: 0.5,
                truncation: 1.0,
            }
        );
    }

    #[test]
    fn fractional_rates_are_truncated() {
        let song = tempfile::NamedTempFile::new().unwrap();
        let args = args_for(song.path(), &["--fps", "29.7", "--speed-fpm", "12.99"]);
        let request = RenderRequest::from_args(&args).unwrap();
        assert_eq!(request.fps, 29.7);
        assert_eq!(request.params().fps, 29);
        assert_eq!(request.params().speed_fpm, 12);

        let args = args_for(song.path(), &["--fps", "0.5"]);
        assert_eq!(RenderRequest::from_args(&args).unwrap().frame_rate(), 0);
    }

    #[test]
    fn missing_song_names_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.wav");
        let err = RenderRequest::from_args(&args_for(&missing, &[])).unwrap_err();
        match &err {
            RequestError::SongNotFound(path) => assert_eq!(path, &missing),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("Audio file not found: "));
        assert!(err.to_string().contains("nope.wav"));
    }

    #[test]
    fn relative_song_is_made_absolute() {
        let missing = Path::new("no-such-dir").join("track.mp3");
        match resolve_song(&missing) {
            Err(RequestError::SongNotFound(path)) => {
                assert!(path.is_absolute());
                assert!(path.ends_with(&missing));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let dir = tempfile::tempdir().unwrap();
        let song = dir.path().join("track.mp3");
        std::fs::write(&song, b"").unwrap();
        let nested = dir.path().join(".").join("track.mp3");
        assert_eq!(resolve_song(&nested).unwrap(), song);
    }

    #[test]
    fn optional_values_pass_through() {
        let song = tempfile::NamedTempFile::new().unwrap();
        let args = args_for(
            song.path(),
            &["--resolution", "512", "--duration", "30", "--start", "12.5", "--output", "out.mp4"],
        );
        let params = RenderRequest::from_args(&args).unwrap().params();
        assert_eq!(params.resolution, Some(512));
        assert_eq!(params.duration, Some(30.0));
        assert_eq!(params.start, 12.5);
        assert_eq!(params.file_name, "out.mp4");
    }

    #[test]
    fn saved_request_round_trips_through_json() {
        let song = tempfile::NamedTempFile::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let request = RenderRequest::from_args(&args_for(song.path(), &["--style", "wavy"])).unwrap();
        let path = dir.path().join("request.json");
        request.save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("duration_seconds"));
        let loaded: RenderRequest = serde_json::from_str(&contents).unwrap();
        assert_eq!(loaded, request);
    }

    #[test]
    fn default_request_path_swaps_extension() {
        let song = tempfile::NamedTempFile::new().unwrap();
        let request = RenderRequest::from_args(&args_for(song.path(), &[])).unwrap();
        assert_eq!(
            request.default_request_path(),
            PathBuf::from("lucid-sonic-dreams.json")
        );
    }
}
