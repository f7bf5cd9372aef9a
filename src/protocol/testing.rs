// helpers for driving a single engine in unit tests

use super::common::*;
use super::CoherenceEngine;

pub const A: CacheId = CacheId(0);
pub const B: CacheId = CacheId(1);
pub const ADDR: Addr = Addr(0x40);

pub struct Outcome {
    pub result: Result<(), ProtocolError>,
    pub actions: Vec<Action>,
    pub shared: bool,
    pub stats: Stats,
}

fn drive(
    e: &mut dyn CoherenceEngine,
    msg: Message,
    me: CacheId,
    mut line: SharedLine,
    local: bool,
) -> Outcome {
    let stats = Stats::default();
    let (result, actions) = {
        let mut ctx = Context::new(me, &mut line, &stats);
        let result = if local {
            e.on_local(&msg, &mut ctx)
        } else {
            e.on_snoop(&msg, &mut ctx)
        };
        (result, ctx.into_actions())
    };
    Outcome {
        result,
        actions,
        shared: line.get(),
        stats,
    }
}

/// processor request from cache A's own processor
pub fn local(e: &mut dyn CoherenceEngine, kind: MsgKind, me: CacheId) -> Outcome {
    drive(e, Message::new(kind, ADDR, me), me, SharedLine::new(), true)
}

/// `me` snoops `kind` sent by `src`
pub fn snoop(e: &mut dyn CoherenceEngine, kind: MsgKind, me: CacheId, src: CacheId) -> Outcome {
    drive(e, Message::new(kind, ADDR, src), me, SharedLine::new(), false)
}

/// DATA arriving at A, with the transaction's shared line already in `shared`
pub fn data(e: &mut dyn CoherenceEngine, shared: bool) -> Outcome {
    let mut line = SharedLine::new();
    if shared {
        line.set();
    }
    drive(e, Message::new(MsgKind::Data, ADDR, CacheId::MEMORY), A, line, false)
}
