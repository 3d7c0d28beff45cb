//! Facility assembly: a waiting system wired to the discipline that serves
//! it.
//!
//! ```text
//!   non-preemptive:  upstream -> waiting system <-> server -> downstream
//!   preemptive:      upstream -> server <-> waiting system
//!                                  `-> downstream
//! ```
//!
//! In both layouts the server reaches the waiting system on `Port::Queue`
//! and the waiting system reaches the server on `Port::Downstream`. Callers
//! link the upstream to [`FacilityHandle::entry`] and the facility's
//! downstream with [`FacilityHandle::connect_downstream`].

use crate::config::{DisciplineKind, FacilityConfig};
use crate::engine::Simulation;
use crate::error::{ConfigError, SimError};
use crate::id::{ComponentId, Port};
use crate::preemption::PreemptionPolicy;
use crate::queue::Buffer;
use crate::service::{PreemptiveServer, Server, ServiceCounters};
use crate::waiting::WaitingSystem;

/// Waiting system over a configured buffer.
pub type DynWaitingSystem = WaitingSystem<Box<dyn Buffer>>;

/// Preemptive server with a configured policy.
pub type DynPreemptiveServer = PreemptiveServer<Box<dyn PreemptionPolicy>>;

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("invalid facility config: {0}")]
    Config(#[from] ConfigError),
    #[error("wiring facility: {0}")]
    Sim(#[from] SimError),
}

/// Component ids of an installed facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilityHandle {
    /// Where upstream components send arrivals.
    pub entry: ComponentId,
    pub waiting: ComponentId,
    pub server: ComponentId,
    pub preemptive: bool,
}

impl FacilityHandle {
    /// Route finished jobs to `to`.
    pub fn connect_downstream(&self, sim: &mut Simulation, to: ComponentId) -> Result<(), SimError> {
        sim.connect(self.server, Port::Downstream, to)
    }

    /// Route jobs the buffer has no room for to `to` (with
    /// `OverflowPolicy::Divert`).
    pub fn connect_overflow(&self, sim: &mut Simulation, to: ComponentId) -> Result<(), SimError> {
        sim.connect(self.waiting, Port::Overflow, to)
    }

    pub fn waiting_system<'a>(&self, sim: &'a Simulation) -> Option<&'a DynWaitingSystem> {
        sim.component::<DynWaitingSystem>(self.waiting)
    }

    pub fn service_counters(&self, sim: &Simulation) -> Option<ServiceCounters> {
        if self.preemptive {
            sim.component::<DynPreemptiveServer>(self.server)
                .map(|s| s.counters().clone())
        } else {
            sim.component::<Server>(self.server).map(|s| s.counters().clone())
        }
    }
}

/// Add a facility named `name` to `sim`.
///
/// The waiting system is named `"{name}.queue"` and the server
/// `"{name}.server"`.
pub fn install(
    sim: &mut Simulation,
    name: &str,
    config: &FacilityConfig,
) -> Result<FacilityHandle, InstallError> {
    let buffer = config.buffer.build()?;
    let queue_name = format!("{name}.queue");
    let server_name = format!("{name}.server");

    let handle = match config.discipline {
        DisciplineKind::NonPreemptive => {
            let waiting =
                sim.add(WaitingSystem::new(queue_name, buffer).with_overflow(config.overflow));
            let server = sim.add(Server::new(server_name));
            FacilityHandle {
                entry: waiting,
                waiting,
                server,
                preemptive: false,
            }
        }
        DisciplineKind::Preemptive { policy } => {
            let waiting = sim.add(
                WaitingSystem::preemptive(queue_name, buffer).with_overflow(config.overflow),
            );
            let server = sim.add(PreemptiveServer::new(server_name, policy.build()));
            FacilityHandle {
                entry: server,
                waiting,
                server,
                preemptive: true,
            }
        }
    };
    sim.connect(handle.waiting, Port::Downstream, handle.server)?;
    sim.connect(handle.server, Port::Queue, handle.waiting)?;
    Ok(handle)
}
