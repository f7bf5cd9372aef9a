use super::common::*;
use super::{CoherenceEngine, Protocol};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum MoesiState {
    #[default]
    I,
    S,
    E,
    O,
    M,
    ISE,
    IM,
    SM,
    OM,
}

/// Five-state protocol with both Exclusive and Owned.
///
/// Clean lines behave as in MESI (E -> S on a snooped GETS), dirty lines as
/// in MOSI (M -> O on a snooped GETS).
#[derive(Debug, Default)]
pub struct Moesi {
    state: MoesiState,
}

impl Moesi {
    pub fn new() -> Self {
        Self::default()
    }

    fn illegal(&self, ctx: &Context<'_>, msg: &Message, v: Violation) -> ProtocolError {
        ProtocolError::illegal(Protocol::Moesi, ctx, self.state(), msg, v)
    }
}

impl CoherenceEngine for Moesi {
    fn on_local(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MoesiState::*;
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
            (S | E | O, Load) | (M, _) => ctx.send_data_to_proc(msg.addr),
            (S, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = SM;
            }
            (E, _) => {
                ctx.send_data_to_proc(msg.addr);
                ctx.record_silent_upgrade();
                self.state = M;
            }
            (O, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = OM;
            }
            (ISE | IM | SM | OM, _) => {
                return Err(self.illegal(ctx, msg, Violation::OutstandingRequest))
            }
        }
        Ok(())
    }

    fn on_snoop(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MoesiState::*;
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
            (E, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = S;
            }
            (O | M, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = O;
            }
            (E | O | M, Getm) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = I;
            }
            (S | E | O | M, Data) => {
                return Err(self.illegal(ctx, msg, Violation::UnexpectedData))
            }
            (ISE | IM, Gets | Getm) => {}
            (ISE, Data) => {
                ctx.send_data_to_proc(msg.addr);
                self.state = if ctx.get_shared_line() { S } else { E };
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
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = IM;
            }
        }
        Ok(())
    }

    fn state(&self) -> LineState {
        match self.state {
            MoesiState::I => LineState::Invalid,
            MoesiState::S => LineState::Shared,
            MoesiState::E => LineState::Exclusive,
            MoesiState::O => LineState::Owned,
            MoesiState::M => LineState::Modified,
            MoesiState::ISE => LineState::ISE,
            MoesiState::IM => LineState::IM,
            MoesiState::SM => LineState::SM,
            MoesiState::OM => LineState::OM,
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::Moesi
    }
}
