use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::Protocol;

// addresses and ids

/// Line address, the unit of coherence.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Addr(pub u64);

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct CacheId(pub u32);

impl CacheId {
    /// Source id of data supplied by main memory.
    pub const MEMORY: CacheId = CacheId(u32::MAX);
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MEMORY {
            f.write_str("mem")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// MESSAGE TYPES

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MsgKind {
    // processor -> own cache
    Load,
    Store,
    // bus, seen by every cache including the sender
    Gets,
    Getm,
    Data,
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MsgKind::Load => "LOAD",
            MsgKind::Store => "STORE",
            MsgKind::Gets => "GETS",
            MsgKind::Getm => "GETM",
            MsgKind::Data => "DATA",
        })
    }
}

/// One coherence event. `src` is the cache that originated it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Message {
    pub kind: MsgKind,
    pub addr: Addr,
    pub src: CacheId,
}

impl Message {
    pub fn new(kind: MsgKind, addr: Addr, src: CacheId) -> Self {
        Message { kind, addr, src }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} from {}", self.kind, self.addr, self.src)
    }
}

// line states

/// Variant-independent view of a line's coherence state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LineState {
    Invalid,
    Shared,
    Exclusive,
    Owned,
    Modified,
    // transient: one request outstanding
    IS,
    ISE,
    IM,
    SM,
    OM,
}

impl LineState {
    pub fn label(self) -> &'static str {
        match self {
            LineState::Invalid => "I",
            LineState::Shared => "S",
            LineState::Exclusive => "E",
            LineState::Owned => "O",
            LineState::Modified => "M",
            LineState::IS => "IS",
            LineState::ISE => "ISE",
            LineState::IM => "IM",
            LineState::SM => "SM",
            LineState::OM => "OM",
        }
    }
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            LineState::IS | LineState::ISE | LineState::IM | LineState::SM | LineState::OM
        )
    }
    /// M, E or O: at most one cache may be in one of these per line.
    pub fn is_owner(self) -> bool {
        matches!(self, LineState::Modified | LineState::Exclusive | LineState::Owned)
    }
    /// Local stores hit without a bus transaction.
    pub fn grants_write(self) -> bool {
        matches!(self, LineState::Modified | LineState::Exclusive)
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// shared-line signal

/// Wired-OR signal of one bus transaction. Allocated fresh per transaction.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct SharedLine(bool);

impl SharedLine {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set(&mut self) {
        self.0 = true;
    }
    pub fn get(&self) -> bool {
        self.0
    }
}

// outgoing actions

/// What an engine asks its collaborators to do.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Action {
    SendGets(Addr),
    SendGetm(Addr),
    DataOnBus { addr: Addr, dest: CacheId },
    DataToProc(Addr),
}

// statistics

pub trait StatsSink {
    fn cache_miss(&self);
    fn silent_upgrade(&self);
    fn cache_to_cache_transfer(&self);
}

/// Counters shared by every cache of one run.
#[derive(Default, Debug)]
pub struct Stats {
    pub cache_misses: AtomicU64,
    pub silent_upgrades: AtomicU64,
    pub c2c_transfers: AtomicU64,
}

impl Stats {
    pub fn misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }
    pub fn upgrades(&self) -> u64 {
        self.silent_upgrades.load(Ordering::Relaxed)
    }
    pub fn transfers(&self) -> u64 {
        self.c2c_transfers.load(Ordering::Relaxed)
    }
}

impl StatsSink for Stats {
    fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }
    fn silent_upgrade(&self) {
        self.silent_upgrades.fetch_add(1, Ordering::Relaxed);
    }
    fn cache_to_cache_transfer(&self) {
        self.c2c_transfers.fetch_add(1, Ordering::Relaxed);
    }
}

// per-call context

/// Everything an engine may touch while handling one message.
pub struct Context<'a> {
    id: CacheId,
    shared_line: &'a mut SharedLine,
    stats: &'a dyn StatsSink,
    outbox: Vec<Action>,
}

impl<'a> Context<'a> {
    pub fn new(id: CacheId, shared_line: &'a mut SharedLine, stats: &'a dyn StatsSink) -> Self {
        Context {
            id,
            shared_line,
            stats,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> CacheId {
        self.id
    }
    pub fn into_actions(self) -> Vec<Action> {
        self.outbox
    }

    pub fn send_gets(&mut self, addr: Addr) {
        self.outbox.push(Action::SendGets(addr));
    }
    pub fn send_getm(&mut self, addr: Addr) {
        self.outbox.push(Action::SendGetm(addr));
    }
    /// Intervention. The bus decides whether this copy is the one delivered.
    pub fn send_data_on_bus(&mut self, addr: Addr, dest: CacheId) {
        self.outbox.push(Action::DataOnBus { addr, dest });
    }
    pub fn send_data_to_proc(&mut self, addr: Addr) {
        self.outbox.push(Action::DataToProc(addr));
    }

    pub fn set_shared_line(&mut self) {
        self.shared_line.set();
    }
    pub fn get_shared_line(&self) -> bool {
        self.shared_line.get()
    }

    pub fn record_miss(&self) {
        self.stats.cache_miss();
    }
    pub fn record_silent_upgrade(&self) {
        self.stats.silent_upgrade();
    }
}

// errors

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Violation {
    /// a second LOAD/STORE while a request is outstanding
    OutstandingRequest,
    /// DATA for a line that is already held
    UnexpectedData,
    /// processor kind snooped, or bus kind sent by the processor
    WrongChannel,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::OutstandingRequest => "only one outstanding request per processor",
            Violation::UnexpectedData => "data for a line this cache already holds",
            Violation::WrongChannel => "message kind not valid on this channel",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{protocol} cache {cache} in state {state} cannot handle {msg}: {violation}")]
    IllegalEvent {
        protocol: Protocol,
        cache: CacheId,
        state: LineState,
        msg: Message,
        violation: Violation,
    },
}

impl ProtocolError {
    pub fn illegal(
        protocol: Protocol,
        ctx: &Context<'_>,
        state: LineState,
        msg: &Message,
        violation: Violation,
    ) -> Self {
        ProtocolError::IllegalEvent {
            protocol,
            cache: ctx.id(),
            state,
            msg: *msg,
            violation,
        }
    }
}
