use super::{TransformError, Transcoder};
use crate::config::settings::AppConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// Shells nothing out: every invocation is an explicit argv list.
pub struct FfmpegTranscoder {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Extracts `format.duration` from ffprobe JSON. Zero or unparsable values
/// read as missing.
fn parse_probe_duration(json: &str) -> Option<f64> {
    let output: ProbeOutput = serde_json::from_str(json).ok()?;
    let duration = output.format?.duration?.parse::<f64>().ok()?;
    if duration > 0.0 { Some(duration) } else { None }
}

impl FfmpegTranscoder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
        }
    }

    async fn run_ffmpeg(&self, args: Vec<String>, path: &Path) -> Result<(), TransformError> {
        debug!("command: {} {:?}", self.ffmpeg_bin, args);
        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(TransformError::TransformFailed {
                path: path.to_path_buf(),
                detail: format!("ffmpeg exited with {}", output.status),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, path: &Path) -> Result<f64, TransformError> {
        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(TransformError::DurationUnavailable(path.to_path_buf()));
        }
        let json = String::from_utf8_lossy(&output.stdout);
        parse_probe_duration(&json)
            .ok_or_else(|| TransformError::DurationUnavailable(path.to_path_buf()))
    }

    async fn cut_stream(
        &self,
        input: &Path,
        output: &Path,
        start_sec: f64,
        length_sec: f64,
    ) -> Result<(), TransformError> {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-ss".to_string(),
            start_sec.to_string(),
            "-t".to_string(),
            length_sec.to_string(),
            "-vcodec".to_string(),
            "copy".to_string(),
            "-acodec".to_string(),
            "copy".to_string(),
            output.display().to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
        ];
        self.run_ffmpeg(args, input).await
    }

    async fn reencode(&self, input: &Path, output: &Path, crf: &str) -> Result<(), TransformError> {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-preset".to_string(),
            "slow".to_string(),
            "-crf".to_string(),
            crf.to_string(),
            "-movflags".to_string(),
            "faststart".to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
            output.display().to_string(),
        ];
        self.run_ffmpeg(args, input).await
    }

    fn spawn_live_stream(&self, input: &Path) -> Result<Child, TransformError> {
        // Fragmented MOOV so the client can start playback before the whole
        // file is encoded; timestamp regeneration tolerates odd containers.
        let child = Command::new(&self.ffmpeg_bin)
            .arg("-i")
            .arg(input)
            .arg("-ss")
            .arg("0")
            .arg("-f")
            .arg("mp4")
            .arg("-c:v")
            .arg("libx264")
            .arg("-c:a")
            .arg("aac")
            .arg("-preset")
            .arg("fast")
            .arg("-tune")
            .arg("zerolatency")
            .arg("-movflags")
            .arg("frag_keyframe+empty_moov+default_base_moof+faststart")
            .arg("-reset_timestamps")
            .arg("1")
            .arg("-fflags")
            .arg("+genpts")
            .arg("-avoid_negative_ts")
            .arg("1")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}
