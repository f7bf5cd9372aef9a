use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use asynchronix::model::{Model, Output};

use super::common::*;
use crate::protocol::{CacheId, Message, MsgKind};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ProcState {
    #[default]
    Idle,
    ExecutingOther(u32),
    WaitingForCache,
    ContinueNext,
    Done,
}

/// Replays one trace against its private cache, one access at a time.
pub struct Processor {
    pub id: CacheId,
    pub state: ProcState,
    pub o_cache_req: Output<Message>,
    insts: Insts,
    stats: Arc<SimStats>,
    done: Arc<AtomicBool>,
}

impl Processor {
    pub fn new(id: CacheId, insts: Insts, stats: Arc<SimStats>, done: Arc<AtomicBool>) -> Self {
        let mut proc = Processor {
            id,
            state: ProcState::Idle,
            o_cache_req: Output::new(),
            insts,
            stats,
            done,
        };
        if proc.insts.is_empty() {
            proc.finish();
        }
        proc
    }

    fn finish(&mut self) {
        self.state = ProcState::Done;
        self.done.store(true, Ordering::Relaxed);
    }

    async fn send_cache_req(&mut self, msg: Message) {
        self.state = ProcState::WaitingForCache;
        self.o_cache_req.send(msg).await;
    }

    pub async fn on_tick(&mut self) {
        match self.state {
            ProcState::Idle => match self.insts.pop_front() {
                Some(Instr::Load(addr)) => {
                    SimStats::bump(&self.stats.loads);
                    self.send_cache_req(Message::new(MsgKind::Load, addr, self.id)).await;
                }
                Some(Instr::Store(addr)) => {
                    SimStats::bump(&self.stats.stores);
                    self.send_cache_req(Message::new(MsgKind::Store, addr, self.id)).await;
                }
                Some(Instr::Other(d)) if d > 1 => self.state = ProcState::ExecutingOther(d - 1),
                Some(Instr::Other(_)) => self.state = ProcState::ContinueNext,
                None => self.finish(),
            },
            ProcState::ExecutingOther(d) if d > 1 => self.state = ProcState::ExecutingOther(d - 1),
            ProcState::ExecutingOther(_) => self.state = ProcState::ContinueNext,
            _ => (),
        }
    }

    pub fn on_post_tick(&mut self) {
        if self.state == ProcState::ContinueNext {
            if self.insts.is_empty() {
                self.finish();
            } else {
                self.state = ProcState::Idle;
            }
        }
    }

    pub async fn on_cache_resp(&mut self, resp: CacheProcResp) {
        match self.state {
            ProcState::WaitingForCache => {
                trace!("proc {} got {:?}", self.id, resp);
                self.state = ProcState::ContinueNext;
            }
            state => warn!("proc {} got {:?} while {:?}", self.id, resp, state),
        }
    }
}

impl Model for Processor {}
