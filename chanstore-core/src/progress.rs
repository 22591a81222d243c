//! Progress reporting
//!
//! The engine reports bytes moved after every block; rendering is up to the
//! caller.

/// Receives transfer progress
pub trait Progress: Send {
    /// Transfer of `total` bytes starts with `done` bytes already in place
    fn start(&mut self, total: u64, done: u64);

    /// `bytes` more bytes were transferred
    fn advance(&mut self, bytes: u64);

    /// Transfer finished successfully
    fn finish(&mut self) {}
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _total: u64, _done: u64) {}

    fn advance(&mut self, _bytes: u64) {}
}

/// Keeps a running count, useful for tests and summaries
#[derive(Debug, Default, Clone)]
pub struct ProgressLog {
    pub total: u64,
    pub done: u64,
    /// Cumulative byte count after each advance
    pub steps: Vec<u64>,
    pub finished: bool,
}

impl Progress for ProgressLog {
    fn start(&mut self, total: u64, done: u64) {
        self.total = total;
        self.done = done;
    }

    fn advance(&mut self, bytes: u64) {
        self.done += bytes;
        self.steps.push(self.done);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_log() {
        let mut log = ProgressLog::default();
        log.start(10, 4);
        log.advance(4);
        log.advance(2);
        log.finish();
        assert_eq!(log.steps, vec![8, 10]);
        assert!(log.finished);
    }
}
