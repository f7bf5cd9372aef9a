use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use asynchronix::model::{Model, Requestor};

use super::common::*;
use crate::protocol::{Addr, CacheId, LineState, Message, MsgKind, SharedLine, StatsSink};

// transactions

/// One GETS/GETM in flight: collects the snoop replies of every cache and
/// decides who answers with DATA.
#[derive(Debug)]
pub struct Transaction {
    request: Message,
    shared_line: SharedLine,
    supplier: Option<CacheId>,
    states: BTreeMap<CacheId, LineState>,
}

impl Transaction {
    pub fn new(request: Message) -> Self {
        Transaction {
            request,
            shared_line: SharedLine::new(),
            supplier: None,
            states: BTreeMap::new(),
        }
    }

    pub fn addr(&self) -> Addr {
        self.request.addr
    }
    pub fn shared_line(&self) -> bool {
        self.shared_line.get()
    }
    pub fn supplier(&self) -> Option<CacheId> {
        self.supplier
    }

    pub fn absorb(&mut self, reply: SnoopReply) {
        if reply.shared {
            self.shared_line.set();
        }
        if reply.supplied {
            match self.supplier {
                None => self.supplier = Some(reply.cache),
                // the bus carries one data response per transaction
                Some(first) => debug!(
                    "dropping data from cache {} on line {}, cache {} already supplied",
                    reply.cache, self.request.addr, first
                ),
            }
        }
        self.states.insert(reply.cache, reply.state);
    }

    /// Memory answers when no cache intervened.
    pub fn from_memory(&self) -> bool {
        self.supplier.is_none()
    }

    /// The DATA message for the requester, with the accumulated shared line.
    pub fn data(&self) -> (Message, SharedLine) {
        let src = self.supplier.unwrap_or(CacheId::MEMORY);
        (
            Message::new(MsgKind::Data, self.request.addr, src),
            self.shared_line,
        )
    }

    /// Records the requester's state after DATA and checks the line. Data
    /// that came from a cache counts one cache-to-cache transfer, however many
    /// caches offered it.
    pub fn resolve(&mut self, state: LineState, stats: &dyn StatsSink) -> Result<(), SimError> {
        if self.supplier.is_some() {
            stats.cache_to_cache_transfer();
        }
        self.states.insert(self.request.src, state);
        check_single_owner(self.request.addr, self.states.iter().map(|(&c, &s)| (c, s)))
    }
}

// bus

/// Atomic snooping bus: one request per cycle, snoop and data phase complete
/// before the next request is granted.
pub struct Bus {
    queue: VecDeque<Message>,
    stats: Arc<SimStats>,
    halt: Halt,
    pub r_snoop: Requestor<Message, SnoopReply>,
    pub r_data: HashMap<CacheId, Requestor<(Message, SharedLine), LineState>>,
}

impl Bus {
    pub fn new(stats: Arc<SimStats>, halt: Halt) -> Self {
        Bus {
            queue: VecDeque::new(),
            stats,
            halt,
            r_snoop: Requestor::new(),
            r_data: HashMap::new(),
        }
    }

    // inputs

    pub fn on_bus_req(&mut self, msg: Message) {
        trace!("bus queued {}", msg);
        self.queue.push_back(msg);
    }

    pub async fn on_tick(&mut self) {
        let Some(req) = self.queue.pop_front() else {
            return;
        };
        SimStats::bump(&self.stats.transactions);
        debug!("bus granted {}", req);

        // snoop phase: everyone, the requester included
        let mut tx = Transaction::new(req);
        for reply in self.r_snoop.send(req).await {
            tx.absorb(reply);
        }
        if tx.from_memory() {
            SimStats::bump(&self.stats.memory_fetches);
        }

        // data phase
        let (data, line) = tx.data();
        let Some(port) = self.r_data.get_mut(&req.src) else {
            self.halt.raise(SimError::UnknownCache(req.src));
            return;
        };
        let state = port.send((data, line)).await.next();
        if let Some(state) = state {
            if let Err(e) = tx.resolve(state, &self.stats.protocol) {
                error!("{}", e);
                self.halt.raise(e);
            }
        }
    }
}

impl Model for Bus {}
