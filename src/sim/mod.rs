//! Reference multiprocessor around the coherence engines: trace-driven
//! processors, private caches and an atomic snooping bus, stepped one cycle at
//! a time on an asynchronix simulation.

mod bus;
mod cache;
mod common;
mod processor;
mod trace;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asynchronix::model::Requestor;
use asynchronix::simulation::{Mailbox, SimInit};
use asynchronix::time::MonotonicTime;

pub use bus::{Bus, Transaction};
pub use cache::{Cache, LineTable};
pub use common::*;
pub use processor::{ProcState, Processor};
pub use trace::{parse_trace, read_trace_dir};

use crate::protocol::{Addr, CacheId, LineState, Message, Protocol, SharedLine};

#[derive(Clone, Debug)]
pub struct Report {
    pub protocol: Protocol,
    pub procs: usize,
    pub cycles: u64,
    pub loads: u64,
    pub stores: u64,
    pub cache_misses: u64,
    pub silent_upgrades: u64,
    pub c2c_transfers: u64,
    pub memory_fetches: u64,
    pub bus_transactions: u64,
    pub lines: Vec<(Addr, CacheId, LineState)>,
}

impl Report {
    pub fn accesses(&self) -> u64 {
        self.loads + self.stores
    }
    pub fn state_of(&self, cache: CacheId, addr: Addr) -> LineState {
        self.lines
            .iter()
            .find(|(a, c, _)| *a == addr && *c == cache)
            .map_or(LineState::Invalid, |&(_, _, s)| s)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Protocol: {} ({} processors)", self.protocol, self.procs)?;
        writeln!(f, "Run Time: {} cycles", self.cycles)?;
        writeln!(f, "Cache Accesses: {}", self.accesses())?;
        writeln!(f, "Cache Misses: {}", self.cache_misses)?;
        writeln!(f, "Silent Upgrades: {}", self.silent_upgrades)?;
        writeln!(f, "$-to-$ Transfers: {}", self.c2c_transfers)?;
        writeln!(f, "Memory Fetches: {}", self.memory_fetches)?;
        write!(f, "Bus Transactions: {}", self.bus_transactions)
    }
}

/// Runs one trace per processor to completion.
pub fn simulate(specs: SystemSpec, insts: Vec<Insts>) -> Result<Report, SimError> {
    let n = insts.len();
    let stats = Arc::new(SimStats::default());
    let snapshot = Snapshot::default();
    let halt = Halt::default();
    let done = (0..n).map(|_| Arc::new(AtomicBool::new(false))).collect::<Vec<_>>();

    // create models
    let mut procs = insts
        .into_iter()
        .enumerate()
        .map(|(i, insts)| Processor::new(CacheId(i as u32), insts, stats.clone(), done[i].clone()))
        .collect::<Vec<_>>();
    let mut caches = (0..n)
        .map(|i| Cache::new(CacheId(i as u32), specs.protocol, stats.clone(), snapshot.clone(), halt.clone()))
        .collect::<Vec<_>>();
    let mut bus = Bus::new(stats.clone(), halt.clone());

    // create mailboxes
    let mut procs_mbox = (0..n).map(|_| Mailbox::<Processor>::new()).collect::<Vec<_>>();
    let mut caches_mbox = (0..n).map(|_| Mailbox::<Cache>::new()).collect::<Vec<_>>();
    let bus_mbox = Mailbox::<Bus>::new();

    // addresses
    let tick_addr_bus = bus_mbox.address();
    let tick_addr_procs = procs_mbox.iter().map(|mb| mb.address()).collect::<Vec<_>>();

    // connect models
    for i in 0..n {
        procs[i].o_cache_req.connect(Cache::on_proc_req, &caches_mbox[i]);
        caches[i].o_proc_resp.connect(Processor::on_cache_resp, &procs_mbox[i]);
        caches[i].o_bus_req.connect(Bus::on_bus_req, &bus_mbox);
        bus.r_snoop.connect(Cache::on_snoop, &caches_mbox[i]);
        let mut r_data: Requestor<(Message, SharedLine), LineState> = Requestor::new();
        r_data.connect(Cache::on_data, &caches_mbox[i]);
        bus.r_data.insert(caches[i].id, r_data);
    }

    // initialize simulation
    let mut simi = SimInit::new().add_model(bus, bus_mbox);
    for _ in 0..n {
        simi = simi.add_model(procs.remove(0), procs_mbox.remove(0));
        simi = simi.add_model(caches.remove(0), caches_mbox.remove(0));
    }
    let mut sim = simi.init(MonotonicTime::EPOCH);

    info!("simulating {} processors with {}", n, specs.protocol);
    let all_done = || done.iter().all(|d| d.load(Ordering::Relaxed));
    while !all_done() {
        if let Some(err) = halt.take() {
            return Err(err);
        }
        if sim.time().as_secs() as u64 >= specs.max_cycles {
            return Err(SimError::CycleLimit(specs.max_cycles));
        }

        // tick
        sim.send_event(Bus::on_tick, (), &tick_addr_bus);
        for addr in &tick_addr_procs {
            sim.send_event(Processor::on_tick, (), addr);
        }

        // post-tick
        for addr in &tick_addr_procs {
            sim.send_event(Processor::on_post_tick, (), addr);
        }

        sim.step_by(Duration::from_secs(1));
    }
    if let Some(err) = halt.take() {
        return Err(err);
    }

    let lines = snapshot.lines();
    let mut addrs = lines.iter().map(|&(a, _, _)| a).collect::<Vec<_>>();
    addrs.dedup();
    for addr in addrs {
        check_single_owner(
            addr,
            lines.iter().filter(|(a, _, _)| *a == addr).map(|&(_, c, s)| (c, s)),
        )?;
    }

    let report = Report {
        protocol: specs.protocol,
        procs: n,
        cycles: sim.time().as_secs() as u64,
        loads: SimStats::get(&stats.loads),
        stores: SimStats::get(&stats.stores),
        cache_misses: stats.protocol.misses(),
        silent_upgrades: stats.protocol.upgrades(),
        c2c_transfers: stats.protocol.transfers(),
        memory_fetches: SimStats::get(&stats.memory_fetches),
        bus_transactions: SimStats::get(&stats.transactions),
        lines,
    };
    info!("finished simulation in {} cycles", report.cycles);
    Ok(report)
}
