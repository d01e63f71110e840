use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    /// Optional allow-list of directories served paths must live under.
    /// Empty means any regular file on the host may be streamed.
    pub media_roots: Vec<PathBuf>,
    pub thumbnail_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub mission_interval_secs: u64,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            media_roots: env::get_or(EnvKey::MediaRoots, "")
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),
            thumbnail_dir: PathBuf::from(env::get_or(
                EnvKey::ThumbnailDir,
                "/tmp/mediadav/thumbnails",
            )),
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
            ffprobe_bin: env::get_or(EnvKey::FfprobeBin, "ffprobe"),
            mission_interval_secs: env::get_parsed(EnvKey::MissionInterval, 60),
        })
    }
}
