//! Incremental log reading with rotation detection.
//!
//! The dashboard's live log view polls the daemon logs by byte offset: the
//! client sends the offset it has consumed up to, and we return every
//! complete line appended since. When the file shrinks below the offset the
//! log was rotated, so we restart from the beginning and tell the client to
//! clear its view.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Poll interval for the follow loop.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lines of context served when a client starts from scratch.
const BACKLOG_LINES: usize = 50;

/// Lines of context printed when the CLI follow mode starts.
const FOLLOW_BACKLOG_LINES: usize = 25;

/// A batch of log lines starting at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogChunk {
    /// Offset the client should send on its next request.
    pub offset: u64,

    pub lines: Vec<String>,

    /// True when the server restarted from the top of the file, either
    /// because the client had no offset or because the log rotated.
    pub reset: bool,
}

/// Stateful tailer used by the CLI follow mode.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    offset: u64,
}

impl LogTailer {
    /// Start tailing from the current end of the file.
    pub fn new(path: &Path) -> io::Result<Self> {
        let offset = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_path_buf(),
            offset,
        })
    }

    /// Read every complete line appended since the last poll.
    ///
    /// A missing file yields no lines; a shrunken file means rotation and
    /// restarts from offset zero.
    pub fn poll(&mut self) -> io::Result<Vec<String>> {
        let len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        if len < self.offset {
            debug!("Log {} rotated, restarting from start", self.path.display());
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let (lines, consumed) = read_complete_lines(&self.path, self.offset)?;
        self.offset += consumed;
        Ok(lines)
    }
}

/// Read complete lines from `offset`, returning them with the number of
/// bytes consumed. A trailing partial line (no newline yet) is left for the
/// next call.
fn read_complete_lines(path: &Path, offset: u64) -> io::Result<(Vec<String>, u64)> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    // Only up to the last newline is stable; the rest is mid-write.
    let Some(end) = buf.iter().rposition(|&b| b == b'\n') else {
        return Ok((Vec::new(), 0));
    };
    let consumed = (end + 1) as u64;

    let lines = buf[..end]
        .split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim_end_matches('\r').to_string())
        .collect();

    Ok((lines, consumed))
}

/// Last `n` lines of a file, oldest first.
pub fn last_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut window: VecDeque<String> = VecDeque::with_capacity(n);
    for line in reader.lines() {
        let line = line?;
        if window.len() == n {
            window.pop_front();
        }
        window.push_back(line);
    }
    Ok(window.into())
}

/// Serve a chunk of log lines for the HTTP log view.
///
/// With `offset == 0` (or after rotation) the client gets the last
/// [`BACKLOG_LINES`] lines and `reset = true`; otherwise only complete lines
/// appended past `offset`.
pub fn fetch_since(path: &Path, offset: u64) -> io::Result<LogChunk> {
    let len = std::fs::metadata(path)?.len();
    let rotated = len < offset;

    if offset == 0 || rotated {
        if rotated {
            debug!("Log {} rotated, serving fresh backlog", path.display());
        }
        return Ok(LogChunk {
            offset: len,
            lines: last_lines(path, BACKLOG_LINES)?,
            reset: true,
        });
    }

    let (lines, consumed) = read_complete_lines(path, offset)?;
    Ok(LogChunk {
        offset: offset + consumed,
        lines,
        reset: false,
    })
}

/// Follow a log file, sending appended lines down `tx` until cancelled.
///
/// Starts by sending the last few lines of context, then polls for new
/// complete lines every [`POLL_INTERVAL`].
pub async fn tail_task(
    path: PathBuf,
    tx: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    info!("Following {}", path.display());

    // Capture the tail offset before serving the backlog so lines appended
    // in between are picked up by the first poll.
    let mut tailer = LogTailer::new(&path)?;

    if path.exists() {
        for line in last_lines(&path, FOLLOW_BACKLOG_LINES)? {
            if tx.send(line).await.is_err() {
                return Ok(());
            }
        }
    }
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for line in tailer.poll()? {
                    if tx.send(line).await.is_err() {
                        return Ok(());
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Follow mode stopping");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_last_lines_shorter_than_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one").unwrap();
        writeln!(file, "two").unwrap();
        file.flush().unwrap();

        let lines = last_lines(file.path(), 50).unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_last_lines_window_cap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..10 {
            writeln!(file, "line-{}", i).unwrap();
        }
        file.flush().unwrap();

        let lines = last_lines(file.path(), 3).unwrap();
        assert_eq!(lines, vec!["line-7", "line-8", "line-9"]);
    }

    #[test]
    fn test_tailer_sees_only_new_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "old").unwrap();
        file.flush().unwrap();

        let mut tailer = LogTailer::new(file.path()).unwrap();
        assert!(tailer.poll().unwrap().is_empty());

        writeln!(file, "new-1").unwrap();
        writeln!(file, "new-2").unwrap();
        file.flush().unwrap();

        assert_eq!(tailer.poll().unwrap(), vec!["new-1", "new-2"]);
        assert!(tailer.poll().unwrap().is_empty());
    }

    #[test]
    fn test_tailer_holds_partial_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = LogTailer::new(file.path()).unwrap();

        write!(file, "incomplete").unwrap();
        file.flush().unwrap();
        assert!(tailer.poll().unwrap().is_empty());

        writeln!(file, " now done").unwrap();
        file.flush().unwrap();
        assert_eq!(tailer.poll().unwrap(), vec!["incomplete now done"]);
    }

    #[test]
    fn test_tailer_rotation_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aprx-rf.log");

        std::fs::write(&path, "a\nb\nc\n").unwrap();
        let mut tailer = LogTailer::new(&path).unwrap();
        assert!(tailer.poll().unwrap().is_empty());

        // Rotation: replaced by a shorter file.
        std::fs::write(&path, "x\n").unwrap();
        assert_eq!(tailer.poll().unwrap(), vec!["x"]);
    }

    #[test]
    fn test_tailer_missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.log");

        let mut tailer = LogTailer::new(&path).unwrap();
        assert!(tailer.poll().unwrap().is_empty());

        std::fs::write(&path, "appeared\n").unwrap();
        assert_eq!(tailer.poll().unwrap(), vec!["appeared"]);
    }

    #[test]
    fn test_fetch_since_initial_backlog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..60 {
            writeln!(file, "line-{}", i).unwrap();
        }
        file.flush().unwrap();

        let chunk = fetch_since(file.path(), 0).unwrap();
        assert!(chunk.reset);
        assert_eq!(chunk.lines.len(), 50);
        assert_eq!(chunk.lines[0], "line-10");
        assert_eq!(chunk.offset, file.as_file().metadata().unwrap().len());
    }

    #[test]
    fn test_fetch_since_incremental() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        file.flush().unwrap();

        let initial = fetch_since(file.path(), 0).unwrap();

        writeln!(file, "second").unwrap();
        file.flush().unwrap();

        let next = fetch_since(file.path(), initial.offset).unwrap();
        assert!(!next.reset);
        assert_eq!(next.lines, vec!["second"]);
    }

    #[test]
    fn test_fetch_since_rotation_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aprx.log");

        std::fs::write(&path, "a\nb\nc\n").unwrap();
        let chunk = fetch_since(&path, 0).unwrap();

        std::fs::write(&path, "x\n").unwrap();
        let after = fetch_since(&path, chunk.offset).unwrap();
        assert!(after.reset);
        assert_eq!(after.lines, vec!["x"]);
    }

    #[test]
    fn test_fetch_since_missing_file_errors() {
        assert!(fetch_since(Path::new("/nonexistent/aprx.log"), 0).is_err());
    }

    #[tokio::test]
    async fn test_tail_task_streams_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aprx-rf.log");
        std::fs::write(&path, "context\n").unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(tail_task(path.clone(), tx, shutdown_rx));

        assert_eq!(rx.recv().await.unwrap(), "context");

        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "appended").unwrap();
        }
        assert_eq!(rx.recv().await.unwrap(), "appended");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
