//! Utilities to track the progression of a backup

use std::fmt::{Display, Error, Formatter};

/// A step of the backup pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackupStep {
    Mirroring,
    Archiving,
    Uploading,
    Pruning,
    CleaningUp,
}

impl Display for BackupStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            Self::Mirroring => write!(f, "mirroring"),
            Self::Archiving => write!(f, "archiving"),
            Self::Uploading => write!(f, "uploading"),
            Self::Pruning => write!(f, "pruning"),
            Self::CleaningUp => write!(f, "cleaning up"),
        }
    }
}

/// An event that happens during a backup
#[derive(Clone, Debug, PartialEq)]
pub enum BackupEvent {
    /// Backup has not started
    NotStarted,
    /// Backup has just started
    Started,
    /// Backup is in progress
    InProgress{ step: BackupStep, details: String },
    /// Backup is finished
    Finished{ success: bool },
}

impl Display for BackupEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            BackupEvent::NotStarted => write!(f, "Not started"),
            BackupEvent::Started => write!(f, "Backup has started..."),
            BackupEvent::InProgress{step, details} => write!(f, "[{}] {}...", step, details),
            BackupEvent::Finished{success} => match success {
                true => write!(f, "Backup successfully finished"),
                false => write!(f, "Backup finished with errors"),
            }
        }
    }
}

impl Default for BackupEvent {
    fn default() -> Self {
        Self::NotStarted
    }
}



/// See [`feedback_channel`]
pub type FeedbackSender = tokio::sync::watch::Sender<BackupEvent>;
/// See [`feedback_channel`]
pub type FeedbackReceiver = tokio::sync::watch::Receiver<BackupEvent>;

/// Create a feeback channel, that can be used to retrieve the current progress of a backup
pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    tokio::sync::watch::channel(BackupEvent::default())
}




/// A structure that tracks the progression and the errors that happen during a backup
pub struct Progress {
    n_errors: u32,
    feedback_channel: Option<FeedbackSender>
}
impl Progress {
    pub fn new() -> Self {
        Self { n_errors: 0, feedback_channel: None }
    }
    pub fn new_with_feedback_channel(channel: FeedbackSender) -> Self {
        Self { n_errors: 0, feedback_channel: Some(channel) }
    }


    pub fn is_success(&self) -> bool {
        self.n_errors == 0
    }
    pub fn n_errors(&self) -> u32 {
        self.n_errors
    }

    /// Log an error
    pub fn error(&mut self, text: &str) {
        log::error!("{}", text);
        self.n_errors += 1;
    }
    /// Log a warning
    pub fn warn(&mut self, text: &str) {
        log::warn!("{}", text);
        self.n_errors += 1;
    }
    /// Log an info
    pub fn info(&mut self, text: &str) {
        log::info!("{}", text);
    }
    /// Log a debug message
    pub fn debug(&mut self, text: &str) {
        log::debug!("{}", text);
    }
    /// Send an event as a feedback to the listener (if any).
    pub fn feedback(&mut self, event: BackupEvent) {
        self.feedback_channel
            .as_ref()
            .map(|sender| {
                sender.send(event)
            });
    }
    /// Log and send a feedback that a step starts
    pub fn step(&mut self, step: BackupStep, details: String) {
        self.info(&format!("{}: {}", step, details));
        self.feedback(BackupEvent::InProgress{ step, details });
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_errors_and_sends_feedback() {
        let (sender, receiver) = feedback_channel();
        let mut progress = Progress::new_with_feedback_channel(sender);
        assert_eq!(*receiver.borrow(), BackupEvent::NotStarted);

        progress.step(BackupStep::Archiving, "temp_collectives".to_string());
        assert_eq!(receiver.borrow().to_string(), "[archiving] temp_collectives...");

        progress.info("fine");
        assert!(progress.is_success());
        progress.warn("not so fine");
        progress.error("bad");
        assert_eq!(progress.n_errors(), 2);

        progress.feedback(BackupEvent::Finished{ success: progress.is_success() });
        assert_eq!(*receiver.borrow(), BackupEvent::Finished{ success: false });
    }
}
