use std::fmt;
use std::time::Duration;

/// Lifecycle of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
    /// Terminal. Holds the first error's message.
    Failed(String),
}

impl Status {
    pub fn is_finished(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed(_))
    }

    /// Applies `next` if it is a legal successor of `self`.
    ///
    /// Returns whether the status changed. Finished states never change.
    pub(crate) fn advance(&mut self, next: Status) -> bool {
        let legal = matches!(
            (&*self, &next),
            (Status::NotStarted, Status::InProgress)
                | (Status::InProgress, Status::Completed)
                | (Status::InProgress, Status::Failed(_))
        );
        if legal {
            *self = next;
        }
        legal
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NotStarted => f.write_str("Not started"),
            Status::InProgress => f.write_str("In progress"),
            Status::Completed => f.write_str("Completed"),
            Status::Failed(reason) => f.write_str(reason),
        }
    }
}

/// Point-in-time view of a download, for polling displays.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub status: Status,
    pub total: u64,
    pub downloaded: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Share of the resource written so far, in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64).min(1.0)
    }

    /// Average bytes per second since start.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.downloaded as f64 / secs
        } else {
            0.0
        }
    }
}
