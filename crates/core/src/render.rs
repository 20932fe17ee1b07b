//! HTML to PDF rendering.
//!
//! The renderer is a blocking external process. It has no retry policy and no cache: every call
//! renders from scratch and any failure is returned to the caller, who decides whether to try
//! again. Async callers must run it on a blocking thread.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to render: HTML input is empty")]
    EmptyInput,

    #[error("renderer '{binary}' could not be started: {source}")]
    Unavailable {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("renderer produced no output")]
    EmptyOutput,

    #[error("renderer I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Page and resource options passed to the rendering engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub page_size: String,
    pub margin_top: String,
    pub margin_right: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub encoding: String,
    pub no_outline: bool,

    /// Allow the HTML to reference local files (logos, signatures)
    pub enable_local_file_access: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_size: "A4".into(),
            margin_top: "0.75in".into(),
            margin_right: "0.75in".into(),
            margin_bottom: "0.75in".into(),
            margin_left: "0.75in".into(),
            encoding: "UTF-8".into(),
            no_outline: true,
            enable_local_file_access: true,
        }
    }
}

impl RenderOptions {
    /// Command-line arguments for `wkhtmltopdf`, reading HTML from stdin and writing the PDF to
    /// stdout.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--page-size".into(),
            self.page_size.clone(),
            "--margin-top".into(),
            self.margin_top.clone(),
            "--margin-right".into(),
            self.margin_right.clone(),
            "--margin-bottom".into(),
            self.margin_bottom.clone(),
            "--margin-left".into(),
            self.margin_left.clone(),
            "--encoding".into(),
            self.encoding.clone(),
        ];
        if self.no_outline {
            args.push("--no-outline".into());
        }
        if self.enable_local_file_access {
            args.push("--enable-local-file-access".into());
        }
        args.push("-".into());
        args.push("-".into());
        args
    }
}

/// Converts an HTML document into PDF bytes.
pub trait DocumentRenderer: Send + Sync {
    /// Renders `html` with `options`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the input is empty, the engine cannot be run, or it fails or
    /// produces nothing.
    fn render(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError>;
}

/// [`DocumentRenderer`] that shells out to `wkhtmltopdf`.
#[derive(Clone, Debug)]
pub struct WkhtmltopdfRenderer {
    binary: PathBuf,
}

impl WkhtmltopdfRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl DocumentRenderer for WkhtmltopdfRenderer {
    fn render(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        if html.trim().is_empty() {
            return Err(RenderError::EmptyInput);
        }

        let mut child = Command::new(&self.binary)
            .args(options.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Unavailable {
                binary: self.binary.display().to_string(),
                source,
            })?;

        // Feed stdin from another thread so a large document cannot deadlock against a full
        // stdout pipe.
        let stdin = child.stdin.take();
        let input = html.as_bytes().to_vec();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });

        let output = child.wait_with_output()?;
        let write_result = writer
            .join()
            .map_err(|_| std::io::Error::other("renderer stdin writer panicked"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("wkhtmltopdf failed ({}): {}", output.status, stderr);
            return Err(RenderError::Failed {
                status: output.status,
                stderr,
            });
        }
        // A broken pipe only matters if the process also failed.
        if let Err(e) = write_result {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(RenderError::Io(e));
            }
        }
        if output.stdout.is_empty() {
            return Err(RenderError::EmptyOutput);
        }

        tracing::debug!("rendered {} byte PDF", output.stdout.len());
        Ok(output.stdout)
    }
}
