//! Driving the Steam Workshop uploader (`ugc_tool`).
//!
//! The uploader is a closed-source binary. All we rely on is its output:
//! a `publisher_id: <digits>` token once the item exists, and a one-time
//! legal agreement prompt that has to be answered with `y`. The matching
//! lives in [`UploaderOutputScanner`] so it can be checked against captured
//! output without spawning anything.

use crate::services::item_cfg::{self, ItemCfgError};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::future::Future;
use std::process::Stdio;
use std::sync::LazyLock;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Uploader executable, relative to the SDK folder.
pub const UPLOADER_EXE: &str = "ugc_uploader/ugc_tool.exe";

/// File beside the uploader holding the target app id.
pub const STEAM_APPID_FILE: &str = "steam_appid.txt";

/// Exit code the uploader uses when it can't reach the Steam client.
pub const STEAM_NOT_RUNNING_EXIT_CODE: i32 = 2;

static PUBLISHED_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"publisher_id:\s*(\d+)").expect("Invalid publisher id regex"));

static EULA_PROMPT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)legal agreement|\beula\b").expect("Invalid EULA prompt regex"));

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Uploader not found at {0}")]
    UploaderNotFound(Utf8PathBuf),

    #[error("Uploader exited with code {code}{}", .hint.map(|h| format!(" ({h})")).unwrap_or_default())]
    UploaderExit { code: i32, hint: Option<&'static str> },

    #[error("Uploader was terminated before finishing")]
    UploaderTerminated,

    #[error("Uploader finished without reporting a published id")]
    NoPublishedId,

    #[error("Failed to write {path}: {source}")]
    AppIdFile {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to run uploader: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Uploader I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ItemCfg(#[from] ItemCfgError),
}

/// Human-readable explanation for known uploader exit codes.
pub fn exit_hint(code: i32) -> Option<&'static str> {
    match code {
        STEAM_NOT_RUNNING_EXIT_CODE => Some("Steam client is not running"),
        _ => None,
    }
}

/// Turn the uploader's exit status and scraped id into a result.
pub fn interpret_exit(code: Option<i32>, published_id: Option<&str>) -> Result<String, UploadError> {
    match code {
        Some(0) => published_id.map(str::to_string).ok_or(UploadError::NoPublishedId),
        Some(code) => Err(UploadError::UploaderExit {
            code,
            hint: exit_hint(code),
        }),
        None => Err(UploadError::UploaderTerminated),
    }
}

/// Accumulates uploader output and picks out the tokens we care about.
///
/// Chunks may split a token anywhere, so matching runs over everything seen
/// so far.
#[derive(Debug, Default)]
pub struct UploaderOutputScanner {
    buffer: String,
    eula_answered: bool,
}

impl UploaderOutputScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk of output. Returns `true` the first time the legal
    /// agreement prompt shows up.
    pub fn feed(&mut self, chunk: &str) -> bool {
        self.buffer.push_str(chunk);

        if !self.eula_answered && EULA_PROMPT_PATTERN.is_match(&self.buffer) {
            self.eula_answered = true;
            return true;
        }

        false
    }

    /// Last id reported so far.
    pub fn published_id(&self) -> Option<String> {
        PUBLISHED_ID_PATTERN
            .captures_iter(&self.buffer)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    pub fn output(&self) -> &str {
        &self.buffer
    }
}

/// Pump uploader stdout until it closes, answering the legal agreement
/// prompt on `stdin`.
pub async fn drive_uploader_io<R, W>(mut stdout: R, mut stdin: Option<W>) -> Result<UploaderOutputScanner, std::io::Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut scanner = UploaderOutputScanner::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        let chunk = String::from_utf8_lossy(&buf[..n]);
        for line in chunk.lines().filter(|line| !line.trim().is_empty()) {
            tracing::info!(target: "ugc_tool", "{}", line.trim_end());
        }

        if scanner.feed(&chunk) {
            tracing::info!("Accepting the Workshop legal agreement");
            // The prompt only comes once; closing stdin keeps a second
            // read from blocking forever.
            if let Some(mut stdin) = stdin.take() {
                stdin.write_all(b"y\n").await?;
                stdin.flush().await?;
            }
        }
    }

    Ok(scanner)
}

/// What to hand the uploader for one mod.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub cfg_path: Utf8PathBuf,
    pub changenote: Option<String>,
    /// `-s`: update the item metadata without uploading content
    pub skip_content: bool,
    pub extra_args: Vec<String>,
}

impl UploadRequest {
    /// Command-line arguments in the order the uploader expects them.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-c".to_string(), self.cfg_path.to_string()];
        if let Some(note) = &self.changenote {
            args.push("-n".to_string());
            args.push(note.clone());
        }
        if self.skip_content {
            args.push("-s".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Narrow seam over the uploader binary.
pub trait UploaderClient {
    /// Run one upload and return the Workshop item id.
    fn upload(&self, request: &UploadRequest) -> impl Future<Output = Result<String, UploadError>>;
}

/// The real `ugc_tool.exe` from the SDK.
#[derive(Debug, Clone)]
pub struct UgcUploader {
    tools_dir: Utf8PathBuf,
    app_id: String,
}

impl UgcUploader {
    pub fn new(tools_dir: impl Into<Utf8PathBuf>, app_id: impl Into<String>) -> Self {
        Self {
            tools_dir: tools_dir.into(),
            app_id: app_id.into(),
        }
    }

    pub fn exe(&self) -> Utf8PathBuf {
        self.tools_dir.join(UPLOADER_EXE)
    }

    fn write_app_id(&self, uploader_dir: &Utf8Path) -> Result<(), UploadError> {
        let path = uploader_dir.join(STEAM_APPID_FILE);
        fs::write(&path, &self.app_id).map_err(|source| UploadError::AppIdFile { path, source })
    }
}

impl UploaderClient for UgcUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadError> {
        let exe = self.exe();
        if !exe.is_file() {
            return Err(UploadError::UploaderNotFound(exe));
        }
        let uploader_dir = exe.parent().unwrap_or(&self.tools_dir);

        self.write_app_id(uploader_dir)?;

        let args = request.args();
        tracing::debug!("Running {} {}", exe, args.join(" "));

        let mut child = Command::new(&exe)
            .args(&args)
            .current_dir(uploader_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(UploadError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| UploadError::Io(std::io::Error::other("uploader stdout was not captured")))?;
        let scanner = drive_uploader_io(stdout, child.stdin.take()).await?;

        let status = child.wait().await?;
        interpret_exit(status.code(), scanner.published_id().as_deref())
    }
}

/// Uploads mods through an [`UploaderClient`] and records the resulting id.
pub struct UploadPipeline<C: UploaderClient> {
    client: C,
    extra_args: Vec<String>,
}

impl<C: UploaderClient> UploadPipeline<C> {
    pub fn new(client: C, extra_args: Vec<String>) -> Self {
        Self { client, extra_args }
    }

    /// Create or update the Workshop item described by `cfg_path`.
    pub async fn upload(
        &self,
        mod_name: &str,
        cfg_path: &Utf8Path,
        changenote: Option<&str>,
        skip_content: bool,
    ) -> Result<String, UploadError> {
        let request = UploadRequest {
            cfg_path: cfg_path.to_path_buf(),
            changenote: changenote.map(str::to_string),
            skip_content,
            extra_args: self.extra_args.clone(),
        };

        tracing::info!("Uploading {}", mod_name);
        let id = self.client.upload(&request).await?;
        item_cfg::record_published_id(cfg_path, &id)?;

        tracing::info!("Uploaded {} as Workshop item {}", mod_name, id);
        Ok(id)
    }
}
