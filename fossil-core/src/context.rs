//! The process-scoped [`Context`] handle (§3.4): owns the open storage
//! handle, user identity, configuration, a parsed-deck cache, a small
//! fixed pool of scratch buffers, structured error state, and the
//! crosslink listener registry. Exactly one storage root per context,
//! and — per §5 — a context is bound to a single thread for its whole
//! lifetime, so every cache here is a plain `RefCell`, never a `Mutex`.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use fossil_deck::Deck;
use fossil_storage::Database;

use crate::config::Config;
use crate::error::{Error, ErrorKind};

const DECK_CACHE_CAPACITY: usize = 256;
const SCRATCH_SLOTS: usize = 4;

/// A fixed-capacity, count-bounded LRU of parsed decks keyed by hash.
/// Bounded "by count" per §5 — the byte-size-bounded blob cache lives in
/// `fossil-storage` instead, next to the content it caches.
struct DeckCache {
    capacity: usize,
    entries: HashMap<String, Rc<Deck>>,
    order: VecDeque<String>,
}

impl DeckCache {
    fn new(capacity: usize) -> Self {
        Self { capacity, entries: HashMap::new(), order: VecDeque::new() }
    }

    fn get(&mut self, hash: &str) -> Option<Rc<Deck>> {
        if let Some(deck) = self.entries.get(hash).cloned() {
            self.touch(hash);
            Some(deck)
        } else {
            None
        }
    }

    fn insert(&mut self, hash: String, deck: Rc<Deck>) {
        if self.entries.insert(hash.clone(), deck).is_none() {
            self.order.push_back(hash.clone());
        }
        self.touch(&hash);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    fn invalidate(&mut self, hash: &str) {
        self.entries.remove(hash);
        self.order.retain(|h| h != hash);
    }

    fn touch(&mut self, hash: &str) {
        self.order.retain(|h| h != hash);
        self.order.push_back(hash.to_string());
    }
}

/// The scratch-buffer pool: a fixed number of reusable `Vec<u8>` slots,
/// single-owner at a time. A checkout hands back both a slot index and
/// the buffer; the caller must yield the same index back when done.
struct ScratchPool {
    slots: Vec<Option<Vec<u8>>>,
}

impl ScratchPool {
    fn new(n: usize) -> Self {
        Self { slots: (0..n).map(|_| Some(Vec::new())).collect() }
    }

    fn checkout(&mut self) -> Option<(usize, Vec<u8>)> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(buf) = slot.take() {
                return Some((idx, buf));
            }
        }
        None
    }

    fn yield_back(&mut self, idx: usize, mut buf: Vec<u8>) {
        buf.clear();
        self.slots[idx] = Some(buf);
    }
}

/// Structured error state latched on the context (§7): a cheap `kind`
/// plus the human-readable message from the error that produced it.
#[derive(Debug, Clone)]
pub struct ErrorState {
    pub kind: ErrorKind,
    pub message: String,
}

/// A listener notified after an artifact has been inserted into a
/// transaction, in registration order (§5). `fossil-crosslink` is the
/// concrete consumer of this trait; it lives here so that crate (which
/// depends on `fossil-core`) can register against it without a cycle.
pub trait CrosslinkListener {
    fn on_artifact_inserted(&mut self, rid: i64, artifact_type: &str) -> Result<(), Error>;
}

/// One entry in the verify-before-commit queue (§4.3 ambient addition):
/// a blob whose content hash must be re-checked before the enclosing
/// transaction is allowed to commit.
#[derive(Debug, Clone)]
pub struct PendingVerify {
    pub rid: i64,
    pub expected_hash: String,
}

pub struct Context {
    pub config: Config,
    pub user: Option<String>,
    storage: Option<Database>,
    deck_cache: RefCell<DeckCache>,
    scratch: RefCell<ScratchPool>,
    last_error: RefCell<Option<ErrorState>>,
    listeners: RefCell<Vec<(String, Box<dyn CrosslinkListener>)>>,
    pending_verify: RefCell<Vec<PendingVerify>>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self {
            user: config.user.clone(),
            config,
            storage: None,
            deck_cache: RefCell::new(DeckCache::new(DECK_CACHE_CAPACITY)),
            scratch: RefCell::new(ScratchPool::new(SCRATCH_SLOTS)),
            last_error: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            pending_verify: RefCell::new(Vec::new()),
        }
    }

    pub fn attach_storage(&mut self, db: Database) {
        self.storage = Some(db);
    }

    pub fn storage(&self) -> Result<&Database, Error> {
        self.storage.as_ref().ok_or(Error::NotARepo)
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    // -- deck cache -----------------------------------------------------

    pub fn cached_deck(&self, hash: &str) -> Option<Rc<Deck>> {
        self.deck_cache.borrow_mut().get(hash)
    }

    pub fn cache_deck(&self, hash: String, deck: Rc<Deck>) {
        self.deck_cache.borrow_mut().insert(hash, deck);
    }

    pub fn invalidate_deck(&self, hash: &str) {
        self.deck_cache.borrow_mut().invalidate(hash);
    }

    // -- scratch buffer pool ---------------------------------------------

    /// Check out one scratch buffer. Fails with [`Error::Misuse`] if all
    /// slots are currently checked out — callers are expected to yield
    /// promptly, one checkout per logical operation.
    pub fn checkout_scratch(&self) -> Result<(usize, Vec<u8>), Error> {
        self.scratch
            .borrow_mut()
            .checkout()
            .ok_or_else(|| Error::Misuse("no scratch buffer slots available".into()))
    }

    pub fn yield_scratch(&self, idx: usize, buf: Vec<u8>) {
        self.scratch.borrow_mut().yield_back(idx, buf);
    }

    // -- error state ------------------------------------------------------

    pub fn record_error(&self, err: &Error) {
        *self.last_error.borrow_mut() = Some(ErrorState { kind: err.kind(), message: err.to_string() });
    }

    pub fn clear_error(&self) {
        *self.last_error.borrow_mut() = None;
    }

    pub fn last_error(&self) -> Option<ErrorState> {
        self.last_error.borrow().clone()
    }

    // -- crosslink listener registry ---------------------------------------

    /// Register (or, by name, replace) a listener. A replacement keeps
    /// the original registration-order position rather than moving to
    /// the end, matching §5's ordering guarantee.
    pub fn register_listener(&self, name: impl Into<String>, listener: Box<dyn CrosslinkListener>) {
        let name = name.into();
        let mut listeners = self.listeners.borrow_mut();
        if let Some(slot) = listeners.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = listener;
        } else {
            listeners.push((name, listener));
        }
    }

    pub fn unregister_listener(&self, name: &str) {
        self.listeners.borrow_mut().retain(|(n, _)| n != name);
    }

    /// Fire every registered listener, in registration order, stopping
    /// at the first failure.
    pub fn notify_artifact_inserted(&self, rid: i64, artifact_type: &str) -> Result<(), Error> {
        for (_, listener) in self.listeners.borrow_mut().iter_mut() {
            listener.on_artifact_inserted(rid, artifact_type)?;
        }
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    // -- verify-before-commit queue -----------------------------------------

    pub fn queue_verify(&self, rid: i64, expected_hash: String) {
        self.pending_verify.borrow_mut().push(PendingVerify { rid, expected_hash });
    }

    /// Drain and run `check` over every queued verification. The first
    /// failure aborts the drain (callers then roll back the enclosing
    /// transaction); entries already checked are not re-queued.
    pub fn drain_pending_verify(
        &self,
        mut check: impl FnMut(&PendingVerify) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let pending = std::mem::take(&mut *self.pending_verify.borrow_mut());
        for entry in &pending {
            check(entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_pool_enforces_single_owner_per_slot() {
        let ctx = Context::new(Config::new("/tmp/does-not-exist".into()));
        let mut checked_out = Vec::new();
        for _ in 0..SCRATCH_SLOTS {
            checked_out.push(ctx.checkout_scratch().unwrap());
        }
        assert!(ctx.checkout_scratch().is_err());
        let (idx, buf) = checked_out.pop().unwrap();
        ctx.yield_scratch(idx, buf);
        assert!(ctx.checkout_scratch().is_ok());
    }

    #[test]
    fn deck_cache_evicts_oldest_past_capacity() {
        let ctx = Context::new(Config::new("/tmp/does-not-exist".into()));
        for i in 0..(DECK_CACHE_CAPACITY + 1) {
            let deck = Rc::new(fossil_deck::Deck::new(fossil_deck::ArtifactType::Cluster));
            ctx.cache_deck(format!("hash-{i}"), deck);
        }
        assert!(ctx.cached_deck("hash-0").is_none());
        assert!(ctx.cached_deck(&format!("hash-{DECK_CACHE_CAPACITY}")).is_some());
    }

    struct CountingListener(Rc<RefCell<u32>>);
    impl CrosslinkListener for CountingListener {
        fn on_artifact_inserted(&mut self, _rid: i64, _artifact_type: &str) -> Result<(), Error> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn listener_replacement_preserves_registration_position() {
        let ctx = Context::new(Config::new("/tmp/does-not-exist".into()));
        let first = Rc::new(RefCell::new(0));
        let second = Rc::new(RefCell::new(0));
        ctx.register_listener("a", Box::new(CountingListener(first.clone())));
        ctx.register_listener("b", Box::new(CountingListener(second.clone())));
        // replace "a" with a fresh counter; position 0 is retained
        let replaced = Rc::new(RefCell::new(0));
        ctx.register_listener("a", Box::new(CountingListener(replaced.clone())));

        ctx.notify_artifact_inserted(1, "checkin").unwrap();
        assert_eq!(*replaced.borrow(), 1);
        assert_eq!(*first.borrow(), 0);
        assert_eq!(*second.borrow(), 1);
        assert_eq!(ctx.listener_count(), 2);
    }
}
