use super::common::*;
use super::{CoherenceEngine, Protocol};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
enum MsiState {
    #[default]
    I,
    S,
    M,
    IS,
    IM,
    SM,
}

/// Three-state protocol. Every store to a line not already in M takes a
/// GETM round trip.
#[derive(Debug, Default)]
pub struct Msi {
    state: MsiState,
}

impl Msi {
    pub fn new() -> Self {
        Self::default()
    }

    fn illegal(&self, ctx: &Context<'_>, msg: &Message, v: Violation) -> ProtocolError {
        ProtocolError::illegal(Protocol::Msi, ctx, self.state(), msg, v)
    }
}

impl CoherenceEngine for Msi {
    fn on_local(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MsgKind::*;
        use MsiState::*;

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
            (S, Load) | (M, _) => ctx.send_data_to_proc(msg.addr),
            (S, _) => {
                ctx.send_getm(msg.addr);
                ctx.record_miss();
                self.state = SM;
            }
            (IS | IM | SM, _) => return Err(self.illegal(ctx, msg, Violation::OutstandingRequest)),
        }
        Ok(())
    }

    fn on_snoop(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError> {
        use MsgKind::*;
        use MsiState::*;

        let own = msg.src == ctx.id();
        match (self.state, msg.kind) {
            (_, Load | Store) => return Err(self.illegal(ctx, msg, Violation::WrongChannel)),
            (I, _) => {}
            (S, Gets) => ctx.set_shared_line(),
            (S, Getm) => {
                ctx.set_shared_line();
                self.state = I;
            }
            (M, Gets) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = S;
            }
            (M, Getm) => {
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = I;
            }
            (S | M, Data) => return Err(self.illegal(ctx, msg, Violation::UnexpectedData)),
            (IS | IM, Gets | Getm) => {}
            (IS, Data) => {
                ctx.send_data_to_proc(msg.addr);
                self.state = S;
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
                // lost the race: hand our copy over, finish from IM
                ctx.set_shared_line();
                ctx.send_data_on_bus(msg.addr, msg.src);
                self.state = IM;
            }
        }
        Ok(())
    }

    fn state(&self) -> LineState {
        match self.state {
            MsiState::I => LineState::Invalid,
            MsiState::S => LineState::Shared,
            MsiState::M => LineState::Modified,
            MsiState::IS => LineState::IS,
            MsiState::IM => LineState::IM,
            MsiState::SM => LineState::SM,
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::Msi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::*;

    #[test]
    fn load_miss_resolves_shared_even_without_sharers() {
        let mut e = Msi::new();
        let out = local(&mut e, MsgKind::Load, A);
        assert_eq!(out.actions, vec![Action::SendGets(ADDR)]);
        assert_eq!(out.stats.misses(), 1);
        assert_eq!(e.state(), LineState::IS);

        let out = snoop(&mut e, MsgKind::Gets, A, A);
        assert!(out.actions.is_empty());
        let out = data(&mut e, false);
        assert_eq!(out.actions, vec![Action::DataToProc(ADDR)]);
        assert_eq!(e.state(), LineState::Shared);
    }

    #[test]
    fn store_from_shared_needs_getm() {
        let mut e = Msi::new();
        let _ = local(&mut e, MsgKind::Load, A);
        let _ = data(&mut e, false);
        let out = local(&mut e, MsgKind::Store, A);
        assert_eq!(out.actions, vec![Action::SendGetm(ADDR)]);
        assert_eq!(out.stats.misses(), 1);
        assert_eq!(out.stats.upgrades(), 0);
        assert_eq!(e.state(), LineState::SM);
    }

    #[test]
    fn modified_supplies_and_downgrades() {
        let mut e = Msi::new();
        let _ = local(&mut e, MsgKind::Store, A);
        let _ = data(&mut e, false);
        assert_eq!(e.state(), LineState::Modified);

        let out = local(&mut e, MsgKind::Store, A);
        assert_eq!(out.actions, vec![Action::DataToProc(ADDR)]);
        assert_eq!(out.stats.misses(), 0);

        let out = snoop(&mut e, MsgKind::Gets, A, B);
        assert!(out.shared);
        assert_eq!(out.actions, vec![Action::DataOnBus { addr: ADDR, dest: B }]);
        assert_eq!(e.state(), LineState::Shared);

        let out = snoop(&mut e, MsgKind::Getm, A, B);
        assert!(out.shared);
        assert!(out.actions.is_empty());
        assert_eq!(e.state(), LineState::Invalid);
    }

    #[test]
    fn racing_getm_rearms_through_im() {
        let mut e = Msi::new();
        let _ = local(&mut e, MsgKind::Load, A);
        let _ = data(&mut e, false);
        let _ = local(&mut e, MsgKind::Store, A);

        let out = snoop(&mut e, MsgKind::Getm, A, A);
        assert!(out.actions.is_empty());
        assert!(!out.shared);
        assert_eq!(e.state(), LineState::SM);

        let out = snoop(&mut e, MsgKind::Getm, A, B);
        assert!(out.shared);
        assert_eq!(out.actions, vec![Action::DataOnBus { addr: ADDR, dest: B }]);
        assert_eq!(e.state(), LineState::IM);

        let _ = data(&mut e, true);
        assert_eq!(e.state(), LineState::Modified);
    }

    #[test]
    fn second_request_while_transient_is_fatal() {
        let mut e = Msi::new();
        let _ = local(&mut e, MsgKind::Load, A);
        let out = local(&mut e, MsgKind::Store, A);
        assert_eq!(
            out.result,
            Err(ProtocolError::IllegalEvent {
                protocol: Protocol::Msi,
                cache: A,
                state: LineState::IS,
                msg: Message::new(MsgKind::Store, ADDR, A),
                violation: Violation::OutstandingRequest,
            })
        );
        assert_eq!(e.state(), LineState::IS);
    }

    #[test]
    fn data_while_holding_is_fatal() {
        let mut e = Msi::new();
        let _ = local(&mut e, MsgKind::Load, A);
        let _ = data(&mut e, false);
        let out = data(&mut e, false);
        assert!(matches!(
            out.result,
            Err(ProtocolError::IllegalEvent { violation: Violation::UnexpectedData, .. })
        ));
    }

    #[test]
    fn invalid_ignores_the_bus() {
        let mut e = Msi::new();
        for kind in [MsgKind::Gets, MsgKind::Getm, MsgKind::Data] {
            let out = snoop(&mut e, kind, A, B);
            assert_eq!(out.result, Ok(()));
            assert!(out.actions.is_empty());
            assert!(!out.shared);
        }
        assert_eq!(e.state(), LineState::Invalid);
    }
}
