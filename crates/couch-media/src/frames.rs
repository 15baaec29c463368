//! Streaming frame sampler over FFmpeg rawvideo output.
//!
//! Frames are decoded one at a time so memory stays bounded by a single
//! RGB frame regardless of video length.

use image::RgbImage;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Bytes of FFmpeg stderr kept for error reports; older output is dropped.
const STDERR_TAIL_BYTES: usize = 64 * 1024;

/// A decoded frame and its zero-based index in the source video.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub index: u64,
    pub image: RgbImage,
}

/// Yields every `stride`-th frame (indices 0, stride, 2*stride, ...).
pub struct FrameSampler {
    child: Option<Child>,
    reader: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    info: VideoInfo,
    stride: u64,
    emitted: u64,
}

impl FrameSampler {
    /// Start decoding `video_path`.
    pub async fn open(video_path: impl AsRef<Path>, stride: u64) -> MediaResult<Self> {
        let video_path = video_path.as_ref();
        let stride = stride.max(1);
        let info = probe_video(video_path).await?;

        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-noautorotate", "-i"])
            .arg(video_path)
            .args([
                "-vf",
                &select_filter(stride),
                "-vsync",
                "vfr",
                "-pix_fmt",
                "rgb24",
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            video = %video_path.display(),
            width = info.width,
            height = info.height,
            stride,
            "Starting frame sampler"
        );

        let mut child = cmd.spawn().map_err(|e| {
            MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;
        // Stderr must be drained while stdout is read, or a chatty decoder
        // fills the pipe and FFmpeg stops producing frames.
        let stderr = child.stderr.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stderr", None, None)
        })?;

        Ok(Self {
            child: Some(child),
            reader: BufReader::new(stdout),
            stderr_task: Some(drain_stderr(stderr)),
            info,
            stride,
            emitted: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    /// Probed stream information of the source video.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    /// Next sampled frame, or `None` once the video is exhausted.
    pub async fn next_frame(&mut self) -> MediaResult<Option<SampledFrame>> {
        if self.child.is_none() {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_len()];
        match self.reader.read_exact(&mut buffer).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish().await?;
                return Ok(None);
            }
            Err(e) => {
                return Err(MediaError::ffmpeg_failed(
                    format!("Failed to read FFmpeg output: {}", e),
                    None,
                    None,
                ))
            }
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .ok_or_else(|| MediaError::internal("Failed to create frame buffer"))?;
        let frame = SampledFrame {
            index: self.emitted * self.stride,
            image,
        };
        self.emitted += 1;
        Ok(Some(frame))
    }

    async fn finish(&mut self) -> MediaResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().await.map_err(|e| {
            MediaError::ffmpeg_failed(format!("FFmpeg process error: {}", e), None, None)
        })?;

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            warn!(
                exit_code = ?status.code(),
                "FFmpeg returned non-zero status while sampling frames"
            );
            return Err(MediaError::ffmpeg_failed(
                "Frame sampling failed",
                Some(stderr),
                status.code(),
            ));
        }

        debug!(frames = self.emitted, "Frame sampler finished");
        Ok(())
    }
}

/// Read stderr to EOF in the background, keeping only the tail.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut tail = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL_BYTES {
                        let excess = tail.len() - STDERR_TAIL_BYTES;
                        tail.drain(..excess);
                    }
                }
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

/// FFmpeg `select` filter keeping frames whose index is a multiple of `stride`.
pub fn select_filter(stride: u64) -> String {
    format!("select=not(mod(n\\,{}))", stride.max(1))
}
