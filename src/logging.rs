use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::{ChatError, ChatResult};

const LOG_FILE_NAME: &str = "moodchat.log";

/// Where log lines go. The TUI owns the terminal, so it logs to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `<data_local_dir>/moodchat/logs/moodchat.log`, falling back to the
    /// temp dir.
    pub fn default_file() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("moodchat")
            .join("logs")
            .join(LOG_FILE_NAME)
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `level`.
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init(level: &str, target: LogTarget) -> ChatResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("moodchat={level},warn")))
        .map_err(|e| ChatError::config(format!("invalid log filter: {e}")))?;

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
        LogTarget::File(path) => {
            let (dir, prefix) = split_log_path(&path);
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
    }
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| LOG_FILE_NAME.to_string());
    (dir, prefix)
}

/// Collects formatted log lines in memory for assertions.
#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        /// Routes this thread's events into a fresh buffer until the guard drops.
        pub fn install() -> (Self, DefaultGuard) {
            let capture = LogCapture::default();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(capture.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            (capture, guard)
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Lines logged at ERROR level.
        pub fn errors(&self) -> Vec<String> {
            self.contents()
                .lines()
                .filter(|line| line.contains("ERROR"))
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path(Path::new("/var/log/moodchat/chat.log")),
            (PathBuf::from("/var/log/moodchat"), "chat.log".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("chat.log")),
            (PathBuf::from("."), "chat.log".to_string())
        );
    }

    #[test]
    fn test_capture_keeps_levels() {
        let (capture, _guard) = capture::LogCapture::install();
        tracing::info!("plain line");
        tracing::error!(error = "boom", "broken line");

        let errors = capture.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("broken line"));
        assert!(errors[0].contains("boom"));
        assert!(capture.contents().contains("plain line"));
    }
}
