//! Outbound port for "new assignment" intents. Delivery is someone else's job.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::error::NotificationError;
use crate::util::now_utc_string;

pub trait NotificationPort: Send + Sync {
    fn notify_new_assignment(
        &self,
        volunteer_id: &str,
        report_id: &str,
    ) -> Result<(), NotificationError>;
}

/// Emits each intent as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn notify_new_assignment(
        &self,
        volunteer_id: &str,
        report_id: &str,
    ) -> Result<(), NotificationError> {
        info!(volunteer_id, report_id, "new assignment intent");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AssignmentIntent<'a> {
    kind: &'static str,
    volunteer_id: &'a str,
    report_id: &'a str,
    emitted_at: String,
}

/// Appends one JSON line per intent to a local outbox file for a separate
/// delivery process to drain.
#[derive(Debug)]
pub struct OutboxNotifier {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }
}

impl NotificationPort for OutboxNotifier {
    fn notify_new_assignment(
        &self,
        volunteer_id: &str,
        report_id: &str,
    ) -> Result<(), NotificationError> {
        let intent = AssignmentIntent {
            kind: "new_assignment",
            volunteer_id,
            report_id,
            emitted_at: now_utc_string(),
        };
        let mut line = serde_json::to_vec(&intent)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn outbox_appends_one_line_per_intent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("outbox.jsonl");
        let notifier = OutboxNotifier::new(path.clone());

        notifier
            .notify_new_assignment("v-1", "r-1")
            .expect("first intent");
        notifier
            .notify_new_assignment("v-2", "r-1")
            .expect("second intent");

        let raw = fs::read_to_string(&path).expect("outbox readable");
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["volunteer_id"], "v-1");
        assert_eq!(lines[1]["report_id"], "r-1");
        assert_eq!(lines[1]["kind"], "new_assignment");
    }

    #[test]
    fn outbox_in_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let notifier = OutboxNotifier::new(dir.path().join("absent").join("outbox.jsonl"));

        let err = notifier
            .notify_new_assignment("v-1", "r-1")
            .expect_err("parent directory is missing");
        assert!(matches!(err, NotificationError::Io(_)));
    }
}
