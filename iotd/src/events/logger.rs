//! Event Logger - persists events to a JSONL file
//!
//! The EventLogger subscribes to the EventBus and appends every event, one
//! JSON object per line, for later inspection.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, IotEvent};

/// Event logger that appends events to a single JSONL file
pub struct EventLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLogger {
    /// Open (or create) the log file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventLogger::open: opening event log");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write one event as a JSON line
    pub fn write_event(&mut self, event: &IotEvent) -> eyre::Result<()> {
        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Run the logger, consuming events from the bus until it closes
    pub async fn run(mut self, mut rx: broadcast::Receiver<IotEvent>) {
        debug!(path = ?self.path, "EventLogger::run: starting event logger");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(error = %e, "EventLogger: failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }
        let _ = self.writer.flush();
    }
}

/// Read every entry from an event log file
pub fn read_events(path: impl AsRef<Path>) -> eyre::Result<Vec<EventLogEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_events: failed to parse line");
            }
        }
    }
    Ok(entries)
}

/// Spawn the event logger as a background task
///
/// The subscription is taken before returning, so no event emitted after this
/// call is missed.
pub fn spawn_event_logger(
    event_bus: &Arc<EventBus>,
    path: impl AsRef<Path>,
) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::open(path)?;
    let rx = event_bus.subscribe();
    Ok(tokio::spawn(logger.run(rx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_and_read_events() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("events.jsonl");
        let mut logger = EventLogger::open(&path).unwrap();

        logger
            .write_event(&IotEvent::GroupStarted {
                group_id: "g".to_string(),
            })
            .unwrap();
        logger
            .write_event(&IotEvent::DeviceStarted {
                group_id: "g".to_string(),
                device_id: "d".to_string(),
            })
            .unwrap();

        let entries = read_events(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "GroupStarted");
        assert_eq!(entries[1].event.event_type(), "DeviceStarted");
    }

    #[test]
    fn test_read_missing_file() {
        let temp = tempdir().unwrap();
        assert!(read_events(temp.path().join("missing.jsonl")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logger_drains_bus() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("events.jsonl");
        let bus = Arc::new(EventBus::new(16));
        let task = spawn_event_logger(&bus, &path).unwrap();

        bus.emit(IotEvent::GroupStopped {
            group_id: "g".to_string(),
        });
        drop(bus);
        task.await.unwrap();

        let entries = read_events(&path).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
