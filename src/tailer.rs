/// Reads a combat log file and emits its lines; optionally keeps following it.
///
/// Follow mode uses the `notify` crate to detect file modifications, then
/// reads from the last known byte offset. Only complete lines are emitted:
/// a line still being written is picked up on the next change.
///
/// Truncation handling: the game recreates the log when logging is toggled.
/// If the file is now shorter than our position we restart from byte 0.
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender};

pub struct TailerState {
    path:     PathBuf,
    position: u64,
}

impl TailerState {
    pub fn new(path: PathBuf) -> Self {
        Self { path, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Complete lines appended since the previous call (empty lines dropped).
    pub fn read_new_lines(&mut self) -> Result<Vec<String>> {
        let file_len = match std::fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(_) => return Ok(Vec::new()), // not created yet
        };

        if file_len < self.position {
            tracing::info!("Combat log truncated, restarting from byte 0");
            self.position = 0;
        }
        if file_len == self.position {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.position))?;
        let mut buf = Vec::with_capacity((file_len - self.position) as usize);
        file.read_to_end(&mut buf)?;

        let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        self.position += last_newline as u64 + 1;

        Ok(String::from_utf8_lossy(&buf[..last_newline])
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }
}

fn is_log_file(event_path: &Path, log_path: &Path) -> bool {
    event_path == log_path || event_path.file_name() == log_path.file_name()
}

/// Send every line in `path`; with `follow`, keep sending appended lines
/// until the receiver is dropped.
pub async fn run(path: PathBuf, follow: bool, tx: Sender<String>) -> Result<()> {
    tracing::info!("Tailer starting: {:?} (follow={})", path, follow);

    if !follow && !path.exists() {
        anyhow::bail!("Combat log {:?} does not exist", path);
    }

    let mut state = TailerState::new(path.clone());

    for line in state.read_new_lines()? {
        if tx.send(line).await.is_err() {
            return Ok(());
        }
    }
    if !follow {
        tracing::info!("Tailer finished reading {:?}", path);
        return Ok(());
    }

    let watch_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    // The watcher callback runs on notify's own thread.
    let (fs_tx, mut fs_rx) = mpsc::channel::<notify::Result<Event>>(256);
    let config = notify::Config::default().with_poll_interval(Duration::from_millis(500));
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = fs_tx.blocking_send(res);
        },
        config,
    )?;
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Watching {:?}", watch_dir))?;

    while let Some(res) = fs_rx.recv().await {
        match res {
            Ok(Event { kind: EventKind::Modify(_) | EventKind::Create(_), paths, .. }) => {
                if !paths.iter().any(|p| is_log_file(p, &path)) {
                    continue;
                }
                match state.read_new_lines() {
                    Ok(lines) => {
                        for line in lines {
                            if tx.send(line).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Tailer read error: {}", e),
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Watcher error: {}", e),
        }
    }

    tracing::warn!("Watcher channel closed, tailer exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_initial_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "line one").unwrap();
        writeln!(f, "line two").unwrap();
        f.flush().unwrap();

        let mut state = TailerState::new(f.path().to_path_buf());
        assert_eq!(state.read_new_lines().unwrap(), vec!["line one", "line two"]);
        assert!(state.read_new_lines().unwrap().is_empty());
    }

    #[test]
    fn holds_back_partial_line() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "complete\r\npart").unwrap();
        f.flush().unwrap();

        let mut state = TailerState::new(f.path().to_path_buf());
        assert_eq!(state.read_new_lines().unwrap(), vec!["complete"]);

        writeln!(f, "ial").unwrap();
        f.flush().unwrap();
        assert_eq!(state.read_new_lines().unwrap(), vec!["partial"]);
    }

    #[test]
    fn detects_truncation() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "original content").unwrap();
        f.flush().unwrap();

        let mut state = TailerState::new(f.path().to_path_buf());
        state.read_new_lines().unwrap();

        let mut f2 = std::fs::File::create(f.path()).unwrap();
        writeln!(f2, "new").unwrap();
        f2.flush().unwrap();

        assert_eq!(state.read_new_lines().unwrap(), vec!["new"]);
        assert_eq!(state.position(), 4);
    }

    #[test]
    fn missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = TailerState::new(dir.path().join("absent.txt"));
        assert!(state.read_new_lines().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_without_follow_sends_everything_then_stops() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "a").unwrap();
        writeln!(f, "").unwrap();
        writeln!(f, "b").unwrap();
        f.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        run(f.path().to_path_buf(), false, tx).await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn run_without_follow_requires_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        assert!(run(dir.path().join("absent.txt"), false, tx).await.is_err());
    }
}
