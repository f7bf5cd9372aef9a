use super::common::*;
use super::{CoherenceEngine, Protocol};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum MesiState {
    #[default]
    I,
    S,
    E,
    M,
    ISE,
    IM,
    SM,
}

/// Four-state protocol. A load miss nobody else shares finishes in E, and a
/// store to E upgrades silently.
#[derive(Debug, Default)]
pub struct Mesi {
    state: MesiState,
}

impl Mesi {
    pub fn new() -> Self {
        Self::default()
    }

    fn illegal(&self, ctx: &Context<'_>, msg: &Message, v: Violation) -> ProtocolError {
        ProtocolError::illegal(Protocol::Mesi, ctx, self.state(), msg, v)
    }
}

impl CoherenceEngine for Mesi {
    fn on_local(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MesiState::*;
        use MsgKind::*;

        match (self.state, msg.kind) {
            (_, Gets | Getm | Data) => return Err(self.illegal(ctx, msg, Violation::WrongChannel)),
            (I, Load) => {
                ctx.send_gets(msg.addr);
                ctx.record_miss();
                self.state = ISE;
            }
            (I, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = IM;
            }
            (S | E, Load) | (M, _) => ctx.send_data_to_proc(msg.addr),
            (S, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = SM;
            }
            (E, _) => {
                // clean and exclusive: no bus traffic, not a miss
                ctx.send_data_to_proc(msg.addr);
                ctx.record_silent_upgrade();
                self.state = M;
            }
            (ISE | IM | SM, _) => return Err(self.illegal(ctx, msg, Violation::OutstandingRequest)),
        }
        Ok(())
    }

    fn on_snoop(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MesiState::*;
        use MsgKind::*;

        let own = msg.src == ctx.id();
        match (self.state, msg.kind) {
            (_, Load | Store) => return Err(self.illegal(ctx, msg, Violation::WrongChannel)),
            (I, _) => {}
            (S, Gets) => ctx.set_shared_line(),
            (S, Getm) => {
                ctx.set_shared_line();
                self.state = I;
            }
            (E | M, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = S;
            }
            (E | M, Getm) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = I;
            }
            (S | E | M, Data) => return Err(self.illegal(ctx, msg, Violation::UnexpectedData)),
            (ISE | IM, Gets | Getm) => {}
            (ISE, Data) => {
                ctx.send_data_to_proc(msg.addr);
                self.state = if ctx.get_shared_line() { S } else { E };
            }
            (IM | SM, Data) => {
                ctx.send_data_to_proc(msg.addr);
                self.state = M;
            }
            (SM, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
            }
            (SM, Getm) if own => {}
            (SM, Getm) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = IM;
            }
        }
        Ok(())
    }

    fn state(&self) -> LineState {
        match self.state {
            MesiState::I => LineState::Invalid,
            MesiState::S => LineState::Shared,
            MesiState::E => LineState::Exclusive,
            MesiState::M => LineState::Modified,
            MesiState::ISE => LineState::ISE,
            MesiState::IM => LineState::IM,
            MesiState::SM => LineState::SM,
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::Mesi
    }
}
