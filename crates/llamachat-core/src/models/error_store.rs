use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorLevel {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Local>,
    pub level: ErrorLevel,
    pub message: String,
    pub target: String,
    pub fields: HashMap<String, String>,
}

/// Bounded log of warnings and errors shown in the front-end's error panel
#[derive(Clone)]
pub struct ErrorStore {
    entries: Arc<Mutex<VecDeque<ErrorEntry>>>,
    max_entries: usize,
}

impl ErrorStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
        }
    }

    pub fn add_entry(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);

        // FIFO eviction when exceeding max
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// Move everything the collector layer has sent so far into the store
    pub fn drain_from(&self, receiver: &Receiver<ErrorEntry>) -> usize {
        let mut count = 0;
        while let Ok(entry) = receiver.try_recv() {
            self.add_entry(entry);
            count += 1;
        }
        count
    }

    pub fn get_all_entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn error_count(&self) -> usize {
        self.count_level(ErrorLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count_level(ErrorLevel::Warning)
    }

    fn count_level(&self, level: ErrorLevel) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .count()
    }
}
