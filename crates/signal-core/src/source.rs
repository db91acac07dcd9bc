//! Observation source trait and the in-process implementations.
//!
//! The run loop asks its [`ObservationSource`] for the latest report batch
//! once per tick. How the counts were produced (detection model, frame
//! sampling, OCR for emergency markings) is entirely the source's business.
//!
//! - [`ObservationInbox`] -- a shared mailbox that HTTP handlers and
//!   message-bus subscribers deposit batches into. Used by the engine.
//! - [`StaticObservationSource`] -- replays one fixed batch every tick.
//!   Useful for demos and tests.

use std::sync::{Arc, Mutex, PoisonError};

use signal_types::{IntersectionId, ObservationReport};

/// Errors an observation source may report.
///
/// The run loop treats any error as "no new data" for that tick and logs a
/// warning; it never stops the intersection.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source can no longer produce observations.
    #[error("observation source closed")]
    Closed,

    /// An internal error in the source.
    #[error("observation source error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

/// A provider of lane observations for an intersection.
pub trait ObservationSource: Send {
    /// Return the newest report batch for `intersection_id`, or `Ok(None)`
    /// when nothing new arrived since the previous poll.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source failed or has shut down.
    fn poll_observations(
        &mut self,
        intersection_id: IntersectionId,
    ) -> Result<Option<Vec<ObservationReport>>, SourceError>;
}

/// A single-slot mailbox holding the latest unread report batch.
///
/// Cloning yields another handle to the same slot. Depositing a batch
/// replaces any unread one: only the newest observations matter.
#[derive(Debug, Clone, Default)]
pub struct ObservationInbox {
    slot: Arc<Mutex<Option<Vec<ObservationReport>>>>,
}

impl ObservationInbox {
    /// Create an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit a batch. Returns `true` if an unread batch was replaced.
    pub fn deposit(&self, reports: Vec<ObservationReport>) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.replace(reports).is_some()
    }

    /// Take the unread batch, if any.
    pub fn take(&self) -> Option<Vec<ObservationReport>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether an unread batch is waiting.
    pub fn has_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl ObservationSource for ObservationInbox {
    fn poll_observations(
        &mut self,
        _intersection_id: IntersectionId,
    ) -> Result<Option<Vec<ObservationReport>>, SourceError> {
        Ok(self.take())
    }
}

/// A source that returns the same batch on every poll.
#[derive(Debug, Clone, Default)]
pub struct StaticObservationSource {
    reports: Vec<ObservationReport>,
}

impl StaticObservationSource {
    /// Create a source that always yields `reports`.
    pub const fn new(reports: Vec<ObservationReport>) -> Self {
        Self { reports }
    }
}

impl ObservationSource for StaticObservationSource {
    fn poll_observations(
        &mut self,
        _intersection_id: IntersectionId,
    ) -> Result<Option<Vec<ObservationReport>>, SourceError> {
        Ok(Some(self.reports.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn batch(count: i64) -> Vec<ObservationReport> {
        vec![ObservationReport::new("north", count, false)]
    }

    #[test]
    fn inbox_is_empty_until_deposit() {
        let mut inbox = ObservationInbox::new();
        assert!(!inbox.has_pending());
        assert!(inbox
            .poll_observations(IntersectionId::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn inbox_keeps_only_newest_batch() {
        let inbox = ObservationInbox::new();
        assert!(!inbox.deposit(batch(1)));
        assert!(inbox.deposit(batch(2)));
        assert_eq!(inbox.take(), Some(batch(2)));
        assert_eq!(inbox.take(), None);
    }

    #[test]
    fn inbox_clones_share_one_slot() {
        let writer = ObservationInbox::new();
        let mut reader = writer.clone();
        let _ = writer.deposit(batch(7));
        let polled = reader.poll_observations(IntersectionId::new()).unwrap();
        assert_eq!(polled, Some(batch(7)));
        assert!(!writer.has_pending());
    }

    #[test]
    fn static_source_repeats_its_batch() {
        let mut source = StaticObservationSource::new(batch(4));
        let id = IntersectionId::new();
        assert_eq!(source.poll_observations(id).unwrap(), Some(batch(4)));
        assert_eq!(source.poll_observations(id).unwrap(), Some(batch(4)));
    }
}
