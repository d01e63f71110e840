use super::{TransformError, Transcoder};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};

/// Test double standing in for the ffmpeg binary. Records invocations and
/// fabricates output files on disk.
pub struct MockTranscoder {
    pub duration: Option<f64>,
    pub write_output: bool,
    pub fail_exit: bool,
    pub cuts: Mutex<Vec<(f64, f64)>>,
    pub crfs: Mutex<Vec<String>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self {
            duration: Some(120.0),
            write_output: true,
            fail_exit: false,
            cuts: Mutex::new(Vec::new()),
            crfs: Mutex::new(Vec::new()),
        }
    }
}

impl MockTranscoder {
    pub fn without_duration() -> Self {
        Self {
            duration: None,
            ..Self::default()
        }
    }

    fn fail(&self, path: &Path) -> Result<(), TransformError> {
        if self.fail_exit {
            return Err(TransformError::TransformFailed {
                path: path.to_path_buf(),
                detail: "mock ffmpeg exited with 1".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn probe_duration(&self, path: &Path) -> Result<f64, TransformError> {
        self.duration
            .ok_or_else(|| TransformError::DurationUnavailable(path.to_path_buf()))
    }

    async fn cut_stream(
        &self,
        input: &Path,
        output: &Path,
        start_sec: f64,
        length_sec: f64,
    ) -> Result<(), TransformError> {
        self.fail(input)?;
        self.cuts.lock().unwrap().push((start_sec, length_sec));
        if self.write_output {
            tokio::fs::write(output, b"cut-output").await?;
        }
        Ok(())
    }

    async fn reencode(&self, input: &Path, output: &Path, crf: &str) -> Result<(), TransformError> {
        self.fail(input)?;
        self.crfs.lock().unwrap().push(crf.to_string());
        if self.write_output {
            tokio::fs::write(output, b"transcoded-output").await?;
        }
        Ok(())
    }

    fn spawn_live_stream(&self, _input: &Path) -> Result<Child, TransformError> {
        let child = Command::new("echo")
            .arg("mock-live-stream")
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}
