use crate::{LOG_FILE_NAME, LoggingConfig};
use eyre::Context;
use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Install the global subscriber.
pub fn initialize_logging(config: &LoggingConfig) -> eyre::Result<()> {
    let registry = tracing_subscriber::registry();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .context("Invalid log filter")?;

    let stdout_layer = fmt::Layer::new()
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true);
    let stdout_layer = if config.json {
        stdout_layer.json().boxed()
    } else {
        stdout_layer.boxed()
    };
    let registry = registry.with(stdout_layer);

    let registry = if let Some(log_dir) = config.file_sink() {
        let log_file = RotatingFile::open(log_dir, config.max_file_size, config.max_files)
            .context("Failed to open log file")?;

        let file_layer = fmt::Layer::new()
            .with_ansi(false)
            .with_writer(Mutex::new(log_file));
        let file_layer = if config.json {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        };

        registry.with(Some(file_layer))
    } else {
        registry.with(None)
    };

    registry.with(env_filter).try_init()?;

    Ok(())
}

/// A writer that rotates its file once it reaches a size limit.
///
/// The live file is `<dir>/swap.log`; rotated files are `swap.0.log`
/// (newest) up to `swap.<max_files - 1>.log`.
#[derive(Debug)]
pub struct RotatingFile {
    file: File,
    path: PathBuf,
    max_size: u64,
    max_files: usize,
    current_size: u64,
}

impl RotatingFile {
    /// Open (or create) the live log file in `dir`.
    pub fn open(dir: impl AsRef<Path>, max_size: u64, max_files: usize) -> io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(LOG_FILE_NAME);
        let file = File::options().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            file,
            path,
            max_size,
            max_files,
            current_size,
        })
    }

    /// Path of the live file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.path.with_extension(format!("{index}.log"))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_files > 0 {
            for i in (1..self.max_files).rev() {
                let src = self.rotated_path(i - 1);
                if src.exists() {
                    std::fs::rename(&src, self.rotated_path(i))?;
                }
            }
            std::fs::rename(&self.path, self.rotated_path(0))?;
        }

        self.file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.current_size = 0;

        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let written = self.file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
