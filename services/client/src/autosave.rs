//! services/client/src/autosave.rs
//!
//! Debounced background saves for notes open in an editor.
//!
//! Every edit restarts a per-note quiet timer. When the timer runs out the
//! latest buffered title/content is written through the [`AutosaveTarget`].
//! At most one write per note is outstanding at any time; what happens to a
//! save that comes due during a write is decided by [`AutosaveOverlap`].
//! Failures are logged and never retried: an explicit save is always
//! available to the user.
//!
//! A note's buffer outlives its writes so later single-field edits still merge
//! onto the last known title and body. It is released only by
//! [`AutosaveScheduler::cancel`] (call it when the editor closes the note) or
//! [`AutosaveScheduler::cancel_all`].

use notes_core::ports::AutosaveTarget;
use notes_core::{AutosaveOverlap, AutosavePayload, EditPatch, RecordId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Default)]
struct DocumentSlot {
    buffer: AutosavePayload,
    timer: Option<JoinHandle<()>>,
    /// Ticket of the most recently scheduled timer. Older timers that wake up
    /// anyway see a mismatch and do nothing.
    ticket: u64,
    in_flight: bool,
    queued: Option<AutosavePayload>,
    /// Cancelled while a write was outstanding; forget the slot once it lands.
    closed: bool,
}

struct SchedulerInner {
    target: Arc<dyn AutosaveTarget>,
    delay: Duration,
    overlap: AutosaveOverlap,
    next_ticket: AtomicU64,
    slots: Mutex<HashMap<RecordId, DocumentSlot>>,
}

#[derive(Clone)]
pub struct AutosaveScheduler {
    inner: Arc<SchedulerInner>,
}

impl AutosaveScheduler {
    pub fn new(target: Arc<dyn AutosaveTarget>, delay: Duration, overlap: AutosaveOverlap) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                target,
                delay,
                overlap,
                next_ticket: AtomicU64::new(0),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Seeds the edit buffer for a note that was just opened. Nothing is
    /// scheduled.
    pub fn track(&self, id: &RecordId, title: impl Into<String>, content: impl Into<String>) {
        let mut slots = self.inner.lock();
        let slot = slots.entry(id.clone()).or_default();
        slot.buffer = AutosavePayload {
            title: title.into(),
            content: content.into(),
        };
        slot.closed = false;
    }

    /// Records an edit and restarts the quiet timer for the note.
    ///
    /// Notes the service has not created yet have no id and are skipped;
    /// returns whether a save was scheduled.
    pub fn on_edit(&self, id: Option<&RecordId>, patch: EditPatch) -> bool {
        let Some(id) = id else {
            debug!("Skipping autosave for an uncommitted note");
            return false;
        };

        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slots = self.inner.lock();
        let slot = slots.entry(id.clone()).or_default();
        patch.apply_to(&mut slot.buffer);
        slot.closed = false;
        if let Some(previous) = slot.timer.take() {
            previous.abort();
        }
        slot.ticket = ticket;

        let inner = Arc::clone(&self.inner);
        let note_id = id.clone();
        slot.timer = Some(tokio::spawn(async move {
            inner.fire(note_id, ticket).await;
        }));
        true
    }

    /// Drops any pending save for the note. A write already on the wire is
    /// left to finish, but nothing queued behind it is sent.
    pub fn cancel(&self, id: &RecordId) {
        let mut slots = self.inner.lock();
        let forget = match slots.get_mut(id) {
            Some(slot) => {
                slot.close();
                !slot.in_flight
            }
            None => false,
        };
        if forget {
            slots.remove(id);
        }
        debug!("Cancelled autosave for note {}", id);
    }

    /// Teardown: cancels every note.
    pub fn cancel_all(&self) {
        let mut slots = self.inner.lock();
        for slot in slots.values_mut() {
            slot.close();
        }
        slots.retain(|_, slot| slot.in_flight);
        info!("Cancelled all pending autosaves");
    }

    /// A save is scheduled and its timer has not run out yet.
    pub fn is_pending(&self, id: &RecordId) -> bool {
        self.inner
            .lock()
            .get(id)
            .is_some_and(|slot| slot.timer.is_some())
    }

    pub fn is_writing(&self, id: &RecordId) -> bool {
        self.inner.lock().get(id).is_some_and(|slot| slot.in_flight)
    }

    /// The scheduler still holds an edit buffer for the note.
    pub fn is_tracked(&self, id: &RecordId) -> bool {
        self.inner.lock().contains_key(id)
    }
}

impl DocumentSlot {
    fn close(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.queued = None;
        self.closed = true;
    }
}

impl SchedulerInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<RecordId, DocumentSlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fire(self: Arc<Self>, id: RecordId, ticket: u64) {
        tokio::time::sleep(self.delay).await;

        let payload = {
            let mut slots = self.lock();
            let Some(slot) = slots.get_mut(&id) else {
                return;
            };
            if slot.ticket != ticket {
                return;
            }
            // Woke up just as the note was cancelled.
            if slot.closed {
                return;
            }
            slot.timer = None;

            let payload = slot.buffer.clone();
            if !payload.is_saveable() {
                debug!("Note {} has a blank title or body; not autosaving", id);
                return;
            }
            if slot.in_flight {
                match self.overlap {
                    AutosaveOverlap::Queue => {
                        debug!("Autosave for note {} queued behind the outstanding write", id);
                        slot.queued = Some(payload);
                    }
                    AutosaveOverlap::Drop => {
                        debug!("Autosave for note {} dropped; a write is outstanding", id);
                    }
                }
                return;
            }
            slot.in_flight = true;
            payload
        };

        self.write_loop(id, payload).await;
    }

    /// Writes `payload`, then anything that was queued meanwhile, until the
    /// queue is empty.
    async fn write_loop(&self, id: RecordId, mut payload: AutosavePayload) {
        loop {
            match self.target.autosave(&id, &payload).await {
                Ok(()) => debug!("Autosaved note {}", id),
                Err(e) => warn!("Autosave failed for note {}: {}", id, e),
            }

            let next = {
                let mut slots = self.lock();
                let Some(slot) = slots.get_mut(&id) else {
                    return;
                };
                match slot.queued.take() {
                    Some(next) => next,
                    None => {
                        slot.in_flight = false;
                        if slot.closed && slot.timer.is_none() {
                            slots.remove(&id);
                        }
                        return;
                    }
                }
            };
            payload = next;
        }
    }
}
