//! Snooping coherence protocols.
//!
//! Every variant is one [`CoherenceEngine`] per (cache, line). Engines are
//! driven by exactly one message at a time and talk to the outside world only
//! through the [`Context`] passed into each call.

mod common;
mod mesi;
mod moesi;
mod mosi;
mod msi;
#[cfg(test)]
mod testing;

use std::fmt;
use std::str::FromStr;

pub use common::*;
pub use mesi::Mesi;
pub use moesi::Moesi;
pub use mosi::Mosi;
pub use msi::Msi;

pub trait CoherenceEngine: fmt::Debug + Send {
    /// A LOAD or STORE from this cache's processor.
    fn on_local(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError>;
    /// A GETS, GETM or DATA seen on the bus, own requests included.
    fn on_snoop(&mut self, msg: &Message, ctx: &mut Context<'_>) -> Result<(), ProtocolError>;
    fn state(&self) -> LineState;
    fn protocol(&self) -> Protocol;

    fn dump(&self) -> String {
        format!("{} - state: {}", self.protocol(), self.state())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Protocol {
    Msi,
    #[default]
    Mesi,
    Mosi,
    Moesi,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Msi, Protocol::Mesi, Protocol::Mosi, Protocol::Moesi];

    /// Fresh engine for a line seen for the first time, starting at Invalid.
    pub fn new_engine(self) -> Box<dyn CoherenceEngine> {
        match self {
            Protocol::Msi => Box::new(Msi::new()),
            Protocol::Mesi => Box::new(Mesi::new()),
            Protocol::Mosi => Box::new(Mosi::new()),
            Protocol::Moesi => Box::new(Moesi::new()),
        }
    }
    pub fn has_exclusive(self) -> bool {
        matches!(self, Protocol::Mesi | Protocol::Moesi)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Msi => "MSI",
            Protocol::Mesi => "MESI",
            Protocol::Mosi => "MOSI",
            Protocol::Moesi => "MOESI",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol `{0}` (expected MSI, MESI, MOSI or MOESI)")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MSI" => Ok(Protocol::Msi),
            "MESI" => Ok(Protocol::Mesi),
            "MOSI" => Ok(Protocol::Mosi),
            "MOESI" => Ok(Protocol::Moesi),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_protocol_names() {
        assert_eq!("msi".parse::<Protocol>(), Ok(Protocol::Msi));
        assert_eq!("MOESI".parse::<Protocol>(), Ok(Protocol::Moesi));
        assert!("dragon".parse::<Protocol>().is_err());
        for p in Protocol::ALL {
            assert_eq!(p.to_string().parse::<Protocol>(), Ok(p));
        }
    }

    #[test]
    fn new_engines_start_invalid() {
        for p in Protocol::ALL {
            let e = p.new_engine();
            assert_eq!(e.state(), LineState::Invalid);
            assert_eq!(e.protocol(), p);
            assert_eq!(e.dump(), format!("{p} - state: I"));
        }
    }
}
