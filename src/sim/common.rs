use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::protocol::{Addr, CacheId, LineState, Protocol, ProtocolError, Stats};

#[derive(Clone, Copy, Debug)]
pub struct SystemSpec {         // reasonable defaults
    pub protocol: Protocol,     // MESI
    pub max_cycles: u64,        // 10_000_000
}

impl Default for SystemSpec {
    fn default() -> Self {
        SystemSpec {
            protocol: Protocol::Mesi,
            max_cycles: 10_000_000,
        }
    }
}

// instructions

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Load(Addr),
    Store(Addr),
    Other(u32),     // cycles of non-memory work
}

pub type Insts = VecDeque<Instr>;

// MESSAGE TYPES

#[derive(Clone, Copy, Debug)]
pub enum CacheProcResp {
    RequestResolved(Addr),
}

/// A cache's answer to a snooped bus request.
#[derive(Clone, Copy, Debug)]
pub struct SnoopReply {
    pub cache: CacheId,
    pub shared: bool,           // raised the shared line
    pub supplied: bool,         // put data on the bus
    pub state: LineState,       // state after the snoop
}

// errors

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("coherence violated on line {addr}: owners {owners:?}")]
    Coherence {
        addr: Addr,
        owners: Vec<(CacheId, LineState)>,
    },
    #[error("no cache {0} attached to the bus")]
    UnknownCache(CacheId),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("no traces found in {}", .0.display())]
    NoTraces(PathBuf),
    #[error("simulation did not finish within {0} cycles")]
    CycleLimit(u64),
}

/// First fatal error raised by any model. The runner stops once it is set.
#[derive(Clone, Default, Debug)]
pub struct Halt(Arc<Mutex<Option<SimError>>>);

impl Halt {
    pub fn raise(&self, err: SimError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
    pub fn take(&self) -> Option<SimError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

// statistics

#[derive(Default, Debug)]
pub struct SimStats {
    pub protocol: Stats,
    pub loads: AtomicU64,
    pub stores: AtomicU64,
    pub transactions: AtomicU64,
    pub memory_fetches: AtomicU64,
}

impl SimStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Latest known state of every (cache, line), written by the caches.
#[derive(Clone, Default, Debug)]
pub struct Snapshot(Arc<Mutex<BTreeMap<(Addr, CacheId), LineState>>>);

impl Snapshot {
    pub fn record(&self, cache: CacheId, addr: Addr, state: LineState) {
        let mut lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        lines.insert((addr, cache), state);
    }
    pub fn lines(&self) -> Vec<(Addr, CacheId, LineState)> {
        let lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().map(|(&(a, c), &s)| (a, c, s)).collect()
    }
}

/// At most one cache may hold a line in M, E or O.
pub fn check_single_owner(
    addr: Addr,
    states: impl IntoIterator<Item = (CacheId, LineState)>,
) -> Result<(), SimError> {
    let owners: Vec<_> = states.into_iter().filter(|(_, s)| s.is_owner()).collect();
    if owners.len() > 1 {
        return Err(SimError::Coherence { addr, owners });
    }
    Ok(())
}
