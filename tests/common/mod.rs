// A synchronous stand-in for the simulated bus: requests are queued and
// served one full transaction at a time, in FIFO order.

#![allow(dead_code)]

use std::collections::VecDeque;

use cachesim::protocol::*;
use cachesim::sim::{check_single_owner, LineTable, SimError, SnoopReply, Transaction};

pub struct System {
    pub caches: Vec<LineTable>,
    pub stats: Stats,
    queue: VecDeque<Message>,
    /// every request granted on the bus, in order
    pub bus_log: Vec<Message>,
    outstanding: Vec<bool>,
    pub resolved: Vec<u64>,
    pub issued: Vec<u64>,
}

impl System {
    pub fn new(protocol: Protocol, n: u32) -> Self {
        System {
            caches: (0..n).map(|i| LineTable::new(CacheId(i), protocol)).collect(),
            stats: Stats::default(),
            queue: VecDeque::new(),
            bus_log: Vec::new(),
            outstanding: vec![false; n as usize],
            resolved: vec![0; n as usize],
            issued: vec![0; n as usize],
        }
    }

    pub fn is_busy(&self, cache: u32) -> bool {
        self.outstanding[cache as usize]
    }

    pub fn load(&mut self, cache: u32, addr: u64) -> Result<(), SimError> {
        self.access(cache, MsgKind::Load, addr)
    }
    pub fn store(&mut self, cache: u32, addr: u64) -> Result<(), SimError> {
        self.access(cache, MsgKind::Store, addr)
    }

    pub fn access(&mut self, cache: u32, kind: MsgKind, addr: u64) -> Result<(), SimError> {
        let id = CacheId(cache);
        let msg = Message::new(kind, Addr(addr), id);
        self.outstanding[cache as usize] = true;
        self.issued[cache as usize] += 1;
        let actions = self.caches[cache as usize].local(&msg, &self.stats)?;
        self.apply(id, actions);
        Ok(())
    }

    fn apply(&mut self, id: CacheId, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SendGets(addr) => self.queue.push_back(Message::new(MsgKind::Gets, addr, id)),
                Action::SendGetm(addr) => self.queue.push_back(Message::new(MsgKind::Getm, addr, id)),
                Action::DataToProc(_) => {
                    self.outstanding[id.0 as usize] = false;
                    self.resolved[id.0 as usize] += 1;
                }
                Action::DataOnBus { .. } => {}
            }
        }
    }

    /// Serves the oldest queued request.
    pub fn step(&mut self) -> Result<Option<Transaction>, SimError> {
        let Some(req) = self.queue.pop_front() else {
            return Ok(None);
        };
        self.bus_log.push(req);

        let mut tx = Transaction::new(req);
        for i in 0..self.caches.len() {
            let mut line = SharedLine::new();
            let actions = self.caches[i].snoop(&req, &mut line, &self.stats)?;
            let id = self.caches[i].id();
            tx.absorb(SnoopReply {
                cache: id,
                shared: line.get(),
                supplied: actions.iter().any(|a| matches!(a, Action::DataOnBus { .. })),
                state: self.caches[i].state_of(req.addr),
            });
            self.apply(id, actions);
        }

        let (data, mut line) = tx.data();
        let r = req.src.0 as usize;
        let actions = self.caches[r].snoop(&data, &mut line, &self.stats)?;
        let state = self.caches[r].state_of(req.addr);
        self.apply(req.src, actions);
        tx.resolve(state, &self.stats)?;
        Ok(Some(tx))
    }

    pub fn drain(&mut self) -> Result<Vec<Transaction>, SimError> {
        let mut done = Vec::new();
        while let Some(tx) = self.step()? {
            done.push(tx);
        }
        Ok(done)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self, cache: u32, addr: u64) -> LineState {
        self.caches[cache as usize].state_of(Addr(addr))
    }

    pub fn check(&self, addr: u64) -> Result<(), SimError> {
        check_single_owner(
            Addr(addr),
            self.caches.iter().map(|c| (c.id(), c.state_of(Addr(addr)))),
        )
    }
}
