use std::collections::HashMap;
use std::sync::Arc;

use asynchronix::model::{Model, Output};

use super::common::*;
use crate::protocol::*;

// line storage

/// One cache's lines. Engines are created at Invalid on first reference and
/// never evicted.
#[derive(Debug)]
pub struct LineTable {
    id: CacheId,
    protocol: Protocol,
    lines: HashMap<Addr, Box<dyn CoherenceEngine>>,
}

impl LineTable {
    pub fn new(id: CacheId, protocol: Protocol) -> Self {
        LineTable {
            id,
            protocol,
            lines: HashMap::new(),
        }
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    fn engine(&mut self, addr: Addr) -> &mut Box<dyn CoherenceEngine> {
        let protocol = self.protocol;
        self.lines.entry(addr).or_insert_with(|| protocol.new_engine())
    }

    /// Runs a LOAD/STORE from this cache's processor.
    pub fn local(&mut self, msg: &Message, stats: &dyn StatsSink) -> Result<Vec<Action>, ProtocolError> {
        // local hits and misses are not part of any bus transaction
        let mut line = SharedLine::new();
        self.handle(msg, &mut line, stats, true)
    }

    /// Runs a bus message; `line` is the transaction's shared-line signal.
    pub fn snoop(
        &mut self,
        msg: &Message,
        line: &mut SharedLine,
        stats: &dyn StatsSink,
    ) -> Result<Vec<Action>, ProtocolError> {
        self.handle(msg, line, stats, false)
    }

    fn handle(
        &mut self,
        msg: &Message,
        line: &mut SharedLine,
        stats: &dyn StatsSink,
        local: bool,
    ) -> Result<Vec<Action>, ProtocolError> {
        let id = self.id;
        let engine = self.engine(msg.addr);
        let before = engine.state();
        let mut ctx = Context::new(id, line, stats);
        let res = if local {
            engine.on_local(msg, &mut ctx)
        } else {
            engine.on_snoop(msg, &mut ctx)
        };
        if let Err(e) = res {
            error!("cache {}: {}", id, engine.dump());
            return Err(e);
        }
        if before != engine.state() {
            trace!("cache {} line {}: {} -> {} on {}", id, msg.addr, before, engine.state(), msg.kind);
        }
        Ok(ctx.into_actions())
    }

    pub fn state_of(&self, addr: Addr) -> LineState {
        self.lines
            .get(&addr)
            .map_or(LineState::Invalid, |e| e.state())
    }
}

// cache

pub struct Cache {
    pub id: CacheId,
    lines: LineTable,
    stats: Arc<SimStats>,
    snapshot: Snapshot,
    halt: Halt,
    pub o_proc_resp: Output<CacheProcResp>,
    pub o_bus_req: Output<Message>,
}

impl Cache {
    pub fn new(id: CacheId, protocol: Protocol, stats: Arc<SimStats>, snapshot: Snapshot, halt: Halt) -> Self {
        Self {
            id,
            lines: LineTable::new(id, protocol),
            stats,
            snapshot,
            halt,
            o_proc_resp: Output::new(),
            o_bus_req: Output::new(),
        }
    }

    // helper functions

    async fn dispatch(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::SendGets(addr) => {
                    self.o_bus_req.send(Message::new(MsgKind::Gets, addr, self.id)).await
                }
                Action::SendGetm(addr) => {
                    self.o_bus_req.send(Message::new(MsgKind::Getm, addr, self.id)).await
                }
                Action::DataToProc(addr) => {
                    self.o_proc_resp.send(CacheProcResp::RequestResolved(addr)).await
                }
                // travels back to the bus in the snoop reply
                Action::DataOnBus { .. } => {}
            }
        }
    }
    fn record(&self, addr: Addr) {
        self.snapshot.record(self.id, addr, self.lines.state_of(addr));
    }

    // inputs

    pub async fn on_proc_req(&mut self, msg: Message) {
        debug!("cache {} received {}", self.id, msg);
        let res = self.lines.local(&msg, &self.stats.protocol);
        self.record(msg.addr);
        match res {
            Ok(actions) => self.dispatch(actions).await,
            Err(e) => self.halt.raise(e.into()),
        }
    }

    /// replier: bus broadcast of GETS/GETM
    pub async fn on_snoop(&mut self, msg: Message) -> SnoopReply {
        let mut line = SharedLine::new();
        let res = self.lines.snoop(&msg, &mut line, &self.stats.protocol);
        self.record(msg.addr);
        let mut supplied = false;
        match res {
            Ok(actions) => {
                supplied = actions.iter().any(|a| matches!(a, Action::DataOnBus { .. }));
                self.dispatch(actions).await;
            }
            Err(e) => self.halt.raise(e.into()),
        }
        SnoopReply {
            cache: self.id,
            shared: line.get(),
            supplied,
            state: self.lines.state_of(msg.addr),
        }
    }

    /// replier: DATA for a request this cache issued
    pub async fn on_data(&mut self, (msg, mut line): (Message, SharedLine)) -> LineState {
        let res = self.lines.snoop(&msg, &mut line, &self.stats.protocol);
        self.record(msg.addr);
        match res {
            Ok(actions) => self.dispatch(actions).await,
            Err(e) => self.halt.raise(e.into()),
        }
        self.lines.state_of(msg.addr)
    }
}

impl Model for Cache {}
