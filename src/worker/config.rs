//! Transcoding worker configuration

use std::path::Path;

/// Placeholder replaced by the worker's read endpoint
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder replaced by the manifest path inside the session directory
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Default HLS conversion arguments for ffmpeg
const DEFAULT_ARGS: &[&str] = &[
    "-i", "{input}",
    "-c:v", "libx264",
    "-c:a", "aac",
    "-ac", "2",
    "-strict", "-2",
    "-crf", "18",
    "-profile:v", "baseline",
    "-maxrate", "400k",
    "-bufsize", "1835k",
    "-pix_fmt", "yuv420p",
    "-hls_time", "10",
    "-hls_list_size", "6",
    "-start_number", "1",
    "-f", "hls",
    "{output}",
];

/// Worker process configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Executable to launch
    pub program: String,

    /// Argument template; `{input}` and `{output}` are substituted per job
    pub args: Vec<String>,

    /// Base URL of the ingestion read endpoint (publish path is appended)
    pub ingest_url: String,

    /// Manifest file name written into the session directory
    pub manifest_name: String,

    /// Number of trailing stderr lines kept for failure reporting
    pub stderr_tail_lines: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
            ingest_url: "rtmp://127.0.0.1:1935".to_string(),
            manifest_name: "index.m3u8".to_string(),
            stderr_tail_lines: 20,
        }
    }
}

impl WorkerConfig {
    /// Set the program to launch
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the argument template
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the ingestion base URL
    pub fn ingest_url(mut self, url: impl Into<String>) -> Self {
        self.ingest_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the number of stderr lines kept
    pub fn stderr_tail_lines(mut self, lines: usize) -> Self {
        self.stderr_tail_lines = lines.max(1);
        self
    }

    /// Read endpoint for a publish path
    pub fn input_url(&self, publish_path: &str) -> String {
        let path = publish_path.split('?').next().unwrap_or_default();
        if path.starts_with('/') {
            format!("{}{}", self.ingest_url, path)
        } else {
            format!("{}/{}", self.ingest_url, path)
        }
    }

    /// Substitute the template for one job
    pub fn render_args(&self, input: &str, output_dir: &Path) -> Vec<String> {
        let output = output_dir.join(&self.manifest_name);
        let output = output.to_string_lossy();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}
