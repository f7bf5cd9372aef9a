use super::common::*;
use super::{CoherenceEngine, Protocol};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum MosiState {
    #[default]
    I,
    S,
    O,
    M,
    IS,
    IM,
    SM,
    OM,
}

/// Five-state protocol with Owned and no Exclusive. A snooped GETS moves M
/// to O: the owner keeps supplying the dirty line until a GETM takes it.
#[derive(Debug, Default)]
pub struct Mosi {
    state: MosiState,
}

impl Mosi {
    pub fn new() -> Self {
        Self::default()
    }

    fn illegal(&self, ctx: &Context<'_>, msg: &Message, v: Violation) -> ProtocolError {
        ProtocolError::illegal(Protocol::Mosi, ctx, self.state(), msg, v)
    }
}

impl CoherenceEngine for Mosi {
    fn on_local(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MosiState::*;
        use MsgKind::*;

        match (self.state, msg.kind) {
            (_, Gets | Getm | Data) => return Err(self.illegal(ctx, msg, Violation::WrongChannel)),
            (I, Load) => {
                ctx.send_gets(msg.addr);
                ctx.record_miss();
                self.state = IS;
            }
            (I, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = IM;
            }
            (S | O, Load) | (M, _) => ctx.send_data_to_proc(msg.addr),
            (S, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = SM;
            }
            (O, _) => {
                // O is readable only; the sharers must be invalidated first
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = OM;
            }
            (IS | IM | SM | OM, _) => {
                return Err(self.illegal(ctx, msg, Violation::OutstandingRequest))
            }
        }
        Ok(())
    }

    fn on_snoop(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MosiState::*;
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
            (O | M, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = O;
            }
            (O | M, Getm) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = I;
            }
            (S | O | M, Data) => return Err(self.illegal(ctx, msg, Violation::UnexpectedData)),
            (IS | IM, Gets | Getm) => {}
            (IS, Data) => {
                ctx.send_data_to_proc(msg.addr);
                self.state = S;
            }
            (IM | SM | OM, Data) => {
                ctx.send_data_to_proc(msg.addr);
                self.state = M;
            }
            (SM | OM, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
            }
            (SM | OM, Getm) if own => {}
            (SM | OM, Getm) => {
                // another GETM won: supply, then re-race from IM
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = IM;
            }
        }
        Ok(())
    }

    fn state(&self) -> LineState {
        match self.state {
            MosiState::I => LineState::Invalid,
            MosiState::S => LineState::Shared,
            MosiState::O => LineState::Owned,
            MosiState::M => LineState::Modified,
            MosiState::IS => LineState::IS,
            MosiState::IM => LineState::IM,
            MosiState::SM => LineState::SM,
            MosiState::OM => LineState::OM,
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::Mosi
    }
}
