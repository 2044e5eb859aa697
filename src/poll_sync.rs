//! Live poll synchronization.
//!
//! A poll widget can go "live": its record is published on a [`PollChannel`]
//! and students vote from their own devices. The channel is an external
//! collaborator (a realtime database in production); [`MemoryPollChannel`]
//! is the in-process implementation, with an availability switch to
//! simulate an outage.
//!
//! ```text
//!  PollWidget ──go_live──► PollChannel ◄──write_merge── PollSync (voter)
//!                             │
//!                             └──subscribe──► every PollSync of that poll
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::storage::Storage;
use crate::widget::PollState;

/// Shared state of one live poll
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollRecord {
    pub title: String,
    pub options: Vec<String>,
    /// Option -> number of votes
    pub votes: BTreeMap<String, u64>,
    /// Voter id -> chosen option
    pub voters: BTreeMap<String, String>,
    /// Creation time, ms since the epoch
    pub created: i64,
    pub is_live: bool,
}

impl PollRecord {
    /// A live poll with every option at zero votes
    pub fn new(title: &str, options: &[String], created: i64) -> Self {
        Self {
            title: title.to_string(),
            options: options.to_vec(),
            votes: options.iter().map(|o| (o.clone(), 0)).collect(),
            voters: BTreeMap::new(),
            created,
            is_live: true,
        }
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.values().sum()
    }

    pub fn vote_of(&self, voter_id: &str) -> Option<&str> {
        self.voters.get(voter_id).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("poll not found or not live yet: {0}")]
    NotFound(String),
    #[error("poll service unavailable")]
    Unavailable,
    #[error("poll is closed")]
    NotLive,
    #[error("already voted")]
    AlreadyVoted,
    #[error("not an option of this poll: {0}")]
    UnknownOption(String),
    #[error("no option selected")]
    NoSelection,
}

/// Receives `(data, error)`; data is `None` when the poll does not exist
pub type UpdateCallback = Box<dyn FnMut(Option<&PollRecord>, Option<&ChannelError>)>;

/// Computes the new record from the current one
pub type Updater<'a> = &'a dyn Fn(Option<&PollRecord>) -> Result<PollRecord, ChannelError>;

/// Realtime key-value channel for poll records
pub trait PollChannel {
    /// Watch a poll. The callback fires once right away with the current
    /// state, then after every change, until the subscription is dropped.
    fn subscribe(&self, poll_id: &str, on_update: UpdateCallback) -> Subscription;

    /// Read, compute and write back a record; last write wins
    fn write_merge(&self, poll_id: &str, updater: Updater<'_>) -> Result<PollRecord, ChannelError>;
}

/// Keeps a subscription alive; dropping it unsubscribes
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// =============================================================================
// In-memory channel
// =============================================================================

type SharedCallback = Rc<RefCell<UpdateCallback>>;

struct Subscriber {
    id: u64,
    callback: SharedCallback,
}

#[derive(Default)]
struct ChannelInner {
    polls: HashMap<String, PollRecord>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    next_subscriber: u64,
    unavailable: bool,
}

/// In-process poll channel; clones share the same polls
#[derive(Clone, Default)]
pub struct MemoryPollChannel {
    inner: Rc<RefCell<ChannelInner>>,
}

impl MemoryPollChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the remote going away (or coming back). Every subscriber is
    /// told about the change.
    pub fn set_available(&self, available: bool) {
        let poll_ids: Vec<String> = {
            let mut inner = self.inner.borrow_mut();
            if inner.unavailable == !available {
                return;
            }
            inner.unavailable = !available;
            inner.subscribers.keys().cloned().collect()
        };
        log::info!("Poll channel {}", if available { "available" } else { "unavailable" });
        for poll_id in poll_ids {
            self.notify(&poll_id);
        }
    }

    pub fn is_available(&self) -> bool {
        !self.inner.borrow().unavailable
    }

    /// Current record of a poll, ignoring availability
    pub fn get(&self, poll_id: &str) -> Option<PollRecord> {
        self.inner.borrow().polls.get(poll_id).cloned()
    }

    pub fn subscriber_count(&self, poll_id: &str) -> usize {
        self.inner
            .borrow()
            .subscribers
            .get(poll_id)
            .map_or(0, Vec::len)
    }

    /// Call every subscriber of a poll with its current state. Callbacks are
    /// cloned out first so they may subscribe or write re-entrantly.
    fn notify(&self, poll_id: &str) {
        let (record, error, callbacks) = {
            let inner = self.inner.borrow();
            let callbacks: Vec<SharedCallback> = inner
                .subscribers
                .get(poll_id)
                .map(|subs| subs.iter().map(|s| Rc::clone(&s.callback)).collect())
                .unwrap_or_default();
            let (record, error) = inner.snapshot(poll_id);
            (record, error, callbacks)
        };
        for callback in callbacks {
            deliver(&callback, record.as_ref(), error.as_ref());
        }
    }
}

impl ChannelInner {
    fn snapshot(&self, poll_id: &str) -> (Option<PollRecord>, Option<ChannelError>) {
        if self.unavailable {
            (None, Some(ChannelError::Unavailable))
        } else {
            (self.polls.get(poll_id).cloned(), None)
        }
    }
}

fn deliver(callback: &SharedCallback, record: Option<&PollRecord>, error: Option<&ChannelError>) {
    // A callback already running further up the stack misses this round
    match callback.try_borrow_mut() {
        Ok(mut callback) => {
            let callback = &mut *callback;
            callback(record, error)
        }
        Err(_) => log::debug!("Skipping re-entrant poll update"),
    }
}

impl PollChannel for MemoryPollChannel {
    fn subscribe(&self, poll_id: &str, on_update: UpdateCallback) -> Subscription {
        let callback: SharedCallback = Rc::new(RefCell::new(on_update));
        let (id, record, error) = {
            let mut inner = self.inner.borrow_mut();
            inner.next_subscriber += 1;
            let id = inner.next_subscriber;
            inner
                .subscribers
                .entry(poll_id.to_string())
                .or_default()
                .push(Subscriber { id, callback: Rc::clone(&callback) });
            let (record, error) = inner.snapshot(poll_id);
            (id, record, error)
        };
        log::debug!("Subscribed to poll {} ({})", poll_id, id);
        deliver(&callback, record.as_ref(), error.as_ref());

        let weak: Weak<RefCell<ChannelInner>> = Rc::downgrade(&self.inner);
        let poll_id = poll_id.to_string();
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.borrow_mut();
            if let Some(subs) = inner.subscribers.get_mut(&poll_id) {
                subs.retain(|s| s.id != id);
                if subs.is_empty() {
                    inner.subscribers.remove(&poll_id);
                }
            }
            log::debug!("Unsubscribed from poll {} ({})", poll_id, id);
        })
    }

    fn write_merge(&self, poll_id: &str, updater: Updater<'_>) -> Result<PollRecord, ChannelError> {
        let current = {
            let inner = self.inner.borrow();
            if inner.unavailable {
                return Err(ChannelError::Unavailable);
            }
            inner.polls.get(poll_id).cloned()
        };
        let next = updater(current.as_ref())?;
        self.inner
            .borrow_mut()
            .polls
            .insert(poll_id.to_string(), next.clone());
        self.notify(poll_id);
        Ok(next)
    }
}

// =============================================================================
// Teacher side
// =============================================================================

/// Publish a poll widget's question and options as a fresh live poll.
/// Replaces any earlier record under the same id, votes included.
pub fn go_live(
    channel: &dyn PollChannel,
    poll_id: &str,
    poll: &PollState,
    now_ms: i64,
) -> Result<PollRecord, ChannelError> {
    let record = PollRecord::new(&poll.title, &poll.options, now_ms);
    let published = channel.write_merge(poll_id, &|_: Option<&PollRecord>| Ok(record.clone()))?;
    log::info!("Poll {} is live with {} options", poll_id, published.options.len());
    Ok(published)
}

/// Stop accepting votes; results stay readable
pub fn end_poll(channel: &dyn PollChannel, poll_id: &str) -> Result<PollRecord, ChannelError> {
    channel.write_merge(poll_id, &|current: Option<&PollRecord>| {
        let mut record = current
            .cloned()
            .ok_or_else(|| ChannelError::NotFound(poll_id.to_string()))?;
        record.is_live = false;
        Ok(record)
    })
}

// =============================================================================
// Voter side
// =============================================================================

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random characters after the timestamp in a voter id
pub const VOTER_SUFFIX_LEN: usize = 6;

/// Voter id for a poll, created and persisted on first use.
///
/// Format: `voter_<unix ms>_<6 base-36 chars>`.
pub fn voter_id<S: Storage + ?Sized>(storage: &mut S, poll_id: &str) -> Result<String> {
    let key = format!("voter_{}", poll_id);
    if let Some(existing) = storage.get_item(&key)? {
        return Ok(existing);
    }
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut rng = rand::rng();
    let suffix: String = (0..VOTER_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    let id = format!("voter_{}_{}", now_ms, suffix);
    storage.set_item(&key, &id)?;
    log::info!("Created voter id {} for poll {}", id, poll_id);
    Ok(id)
}

#[derive(Debug, Default)]
struct SyncState {
    data: Option<PollRecord>,
    error: Option<ChannelError>,
}

/// One voter's live view of a poll
#[derive(Debug)]
pub struct PollSync {
    poll_id: String,
    voter_id: String,
    state: Rc<RefCell<SyncState>>,
    selected: Option<String>,
    voted_locally: bool,
    _subscription: Subscription,
}

impl PollSync {
    /// Subscribe to a poll as the voter stored for it in `storage`
    pub fn connect<S: Storage + ?Sized>(
        channel: &dyn PollChannel,
        storage: &mut S,
        poll_id: &str,
    ) -> Result<Self> {
        let voter_id = voter_id(storage, poll_id)?;
        let voted_locally = storage.get_item(&voted_key(poll_id))?.as_deref() == Some("true");
        let state = Rc::new(RefCell::new(SyncState::default()));

        let sink = Rc::clone(&state);
        let subscription = channel.subscribe(
            poll_id,
            Box::new(move |data: Option<&PollRecord>, error: Option<&ChannelError>| {
                let mut state = sink.borrow_mut();
                state.data = data.cloned();
                state.error = error.cloned();
            }),
        );

        Ok(Self {
            poll_id: poll_id.to_string(),
            voter_id,
            state,
            selected: None,
            voted_locally,
            _subscription: subscription,
        })
    }

    pub fn poll_id(&self) -> &str {
        &self.poll_id
    }

    pub fn voter_id(&self) -> &str {
        &self.voter_id
    }

    /// Last record received from the channel
    pub fn data(&self) -> Option<PollRecord> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ChannelError> {
        self.state.borrow().error.clone()
    }

    pub fn has_voted(&self) -> bool {
        self.voted_locally
            || self
                .state
                .borrow()
                .data
                .as_ref()
                .is_some_and(|d| d.voters.contains_key(&self.voter_id))
    }

    /// Choose an option locally; nothing is sent until [`submit`](Self::submit)
    pub fn select(&mut self, option: &str) {
        self.selected = Some(option.to_string());
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Cast the selected vote
    pub fn submit<S: Storage + ?Sized>(
        &mut self,
        channel: &dyn PollChannel,
        storage: &mut S,
    ) -> Result<PollRecord, ChannelError> {
        self.check_can_submit()?;
        let option = self.selected.clone().ok_or(ChannelError::NoSelection)?;
        let voter = self.voter_id.clone();
        let poll_id = self.poll_id.clone();

        let result = channel.write_merge(&poll_id, &|current: Option<&PollRecord>| {
            let mut record = current
                .cloned()
                .ok_or_else(|| ChannelError::NotFound(poll_id.clone()))?;
            if record.voters.contains_key(&voter) {
                return Err(ChannelError::AlreadyVoted);
            }
            *record.votes.entry(option.clone()).or_insert(0) += 1;
            record.voters.insert(voter.clone(), option.clone());
            Ok(record)
        });

        match result {
            Ok(record) => {
                self.voted_locally = true;
                if let Err(e) = storage.set_item(&voted_key(&self.poll_id), "true") {
                    log::warn!("Failed to remember vote on poll {}: {:#}", self.poll_id, e);
                }
                log::info!("Vote for {:?} submitted to poll {}", option, self.poll_id);
                Ok(record)
            }
            Err(e) => {
                log::warn!("Vote submission to poll {} failed: {}", self.poll_id, e);
                if matches!(e, ChannelError::Unavailable | ChannelError::NotFound(_)) {
                    self.state.borrow_mut().error = Some(e.clone());
                }
                Err(e)
            }
        }
    }

    fn check_can_submit(&self) -> Result<(), ChannelError> {
        let state = self.state.borrow();
        if let Some(error) = &state.error {
            return Err(error.clone());
        }
        let data = state
            .data
            .as_ref()
            .ok_or_else(|| ChannelError::NotFound(self.poll_id.clone()))?;
        if !data.is_live {
            return Err(ChannelError::NotLive);
        }
        let option = self.selected.as_deref().ok_or(ChannelError::NoSelection)?;
        if !data.options.iter().any(|o| o == option) {
            return Err(ChannelError::UnknownOption(option.to_string()));
        }
        if self.voted_locally || data.voters.contains_key(&self.voter_id) {
            return Err(ChannelError::AlreadyVoted);
        }
        Ok(())
    }
}

fn voted_key(poll_id: &str) -> String {
    format!("voted_{}", poll_id)
}
