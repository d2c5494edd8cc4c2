//! RRC Task Implementation
//!
//! Runs a [`Registry`] inside a tokio task. Registry time is the wall clock
//! since the task was created, in milliseconds; the task sleeps until the
//! next timer is due and fires every due timer before it handles a message.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use nextgsim_common::{CellId, GnbConfig, Rnti, SimTime};
use nextgsim_rrc::RrcChannel;

use crate::tasks::{RrcMessage, RrcOutput, Task, TaskHandle, TaskMessage, TaskState};

use super::bearer::{BearerRecord, PdcpStatus};
use super::connection::RrcAdmission;
use super::error::RrcError;
use super::registry::Registry;
use super::sap::{
    BearerDataPath, Collaborators, CoreNetwork, CoreNetworkEvent, RadioAccess, X2Transport,
};
use super::x2::X2Message;

/// Collaborator turning every outward call into an [`RrcOutput`].
///
/// PDCP SN state is kept locally so SN status transfers round-trip.
#[derive(Clone)]
pub struct ChannelCollaborator {
    output: TaskHandle<RrcOutput>,
    pdcp: HashMap<(Rnti, u8), PdcpStatus>,
}

impl ChannelCollaborator {
    pub fn new(output: TaskHandle<RrcOutput>) -> Self {
        Self {
            output,
            pdcp: HashMap::new(),
        }
    }

    fn emit(&self, event: RrcOutput) {
        let name = event.name();
        if let Err(e) = self.output.try_send(event) {
            error!("Failed to deliver RRC output {}: {}", name, e);
        }
    }
}

impl RadioAccess for ChannelCollaborator {
    fn add_ue(&mut self, rnti: Rnti, cell_id: CellId) {
        self.emit(RrcOutput::UeAdded { rnti, cell_id });
    }

    fn remove_ue(&mut self, rnti: Rnti) {
        self.pdcp.retain(|(owner, _), _| *owner != rnti);
        self.emit(RrcOutput::UeRemoved { rnti });
    }

    fn send_rrc(&mut self, rnti: Rnti, channel: RrcChannel, data: Bytes) {
        self.emit(RrcOutput::Downlink { rnti, channel, data });
    }

    fn broadcast(&mut self, cell_id: CellId, data: Bytes) {
        self.emit(RrcOutput::Broadcast { cell_id, data });
    }

    fn page(&mut self, rnti: Rnti) {
        self.emit(RrcOutput::Paging { rnti });
    }
}

impl BearerDataPath for ChannelCollaborator {
    fn attach_bearer(&mut self, rnti: Rnti, bearer: &BearerRecord) {
        self.emit(RrcOutput::BearerAttached { rnti, bearer: bearer.id });
    }

    fn start_bearer(&mut self, rnti: Rnti, drb_id: u8) {
        self.emit(RrcOutput::BearerStarted { rnti, drb_id });
    }

    fn detach_bearer(&mut self, rnti: Rnti, bearer: &BearerRecord) {
        if let Some(drb_id) = bearer.drb_id() {
            self.pdcp.remove(&(rnti, drb_id));
        }
        self.emit(RrcOutput::BearerDetached { rnti, bearer: bearer.id });
    }

    fn send_pdu(&mut self, rnti: Rnti, drb_id: u8, data: Bytes) {
        self.emit(RrcOutput::DownlinkPdu { rnti, drb_id, data });
    }

    fn forward_up(&mut self, rnti: Rnti, drb_id: u8, data: Bytes) {
        self.emit(RrcOutput::UplinkData { rnti, drb_id, data });
    }

    fn pdcp_status(&self, rnti: Rnti, drb_id: u8) -> PdcpStatus {
        self.pdcp.get(&(rnti, drb_id)).copied().unwrap_or_default()
    }

    fn set_pdcp_status(&mut self, rnti: Rnti, drb_id: u8, status: PdcpStatus) {
        self.pdcp.insert((rnti, drb_id), status);
    }
}

impl CoreNetwork for ChannelCollaborator {
    fn notify(&mut self, event: CoreNetworkEvent) {
        self.emit(RrcOutput::Core(event));
    }
}

impl X2Transport for ChannelCollaborator {
    fn send(&mut self, message: X2Message) {
        self.emit(RrcOutput::X2(message));
    }
}

/// Builds collaborators that report everything on `output`, with
/// config-driven admission control. A core network collaborator is
/// attached only when the configuration enables one.
pub fn channel_collaborators(config: &GnbConfig, output: TaskHandle<RrcOutput>) -> Collaborators {
    let channel = ChannelCollaborator::new(output);
    Collaborators {
        admission: Box::new(RrcAdmission::new(&config.rrc)),
        data_path: Box::new(channel.clone()),
        radio: Box::new(channel.clone()),
        core: config
            .rrc
            .core_network_enabled
            .then(|| Box::new(channel.clone()) as Box<dyn CoreNetwork>),
        x2: Box::new(channel),
    }
}

/// RRC Task owning the UE context registry
pub struct RrcTask {
    registry: Registry,
    epoch: Instant,
    state: TaskState,
}

impl RrcTask {
    pub fn new(config: GnbConfig, collab: Collaborators) -> Self {
        Self {
            registry: Registry::new(config, collab),
            epoch: Instant::now(),
            state: TaskState::Created,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn sim_now(&self) -> SimTime {
        SimTime::from_millis(u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX))
    }

    /// Wall-clock instant of the next registry timer.
    fn next_wakeup(&self) -> Option<Instant> {
        self.registry
            .next_deadline()
            .map(|due| self.epoch + Duration::from_millis(due.as_millis()))
    }

    /// Fires every timer due by now.
    fn catch_up(&mut self) {
        let now = self.sim_now();
        for err in self.registry.run_until(now) {
            debug!("Timer: {}", err);
        }
    }

    fn report(result: Result<(), RrcError>, what: &str) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_protocol_violation() => {}
            Err(e) => warn!("{} failed: {}", what, e),
        }
    }

    fn handle_message(&mut self, msg: RrcMessage) {
        match msg {
            RrcMessage::RadioAttempt { cell_id } => match self.registry.on_radio_attempt(cell_id) {
                Ok(rnti) => debug!("Random access in cell {}: UE[{}]", cell_id, rnti),
                Err(e) => warn!("Random access in cell {} failed: {}", cell_id, e),
            },
            RrcMessage::UplinkRrc { rnti, channel, data } => {
                let result = self.registry.on_inbound_message(rnti, channel, &data);
                Self::report(result, "Uplink RRC");
            }
            RrcMessage::DataArrival { rnti, drb_id, data } => {
                let result = self.registry.on_data_arrival(rnti, drb_id, data);
                Self::report(result, "Data arrival");
            }
            RrcMessage::X2(message) => {
                let result = self.registry.on_x2_message(message);
                Self::report(result, "X2 message");
            }
            RrcMessage::CoreNetwork(message) => {
                let result = self.registry.on_core_network(message);
                Self::report(result, "Core network message");
            }
            RrcMessage::TriggerHandover { rnti, target_cell } => {
                let result = self.registry.trigger_handover(rnti, target_cell);
                Self::report(result, "Handover");
            }
            RrcMessage::TriggerRelease { rnti } => {
                let result = self.registry.trigger_release(rnti);
                Self::report(result, "Release");
            }
            RrcMessage::Stats { reply } => {
                if reply.send(self.registry.stats()).is_err() {
                    debug!("Stats requester went away");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for RrcTask {
    type Message = RrcMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("RRC task started");
        self.state = TaskState::Running;
        self.catch_up();
        if let Err(e) = self.registry.start() {
            error!("System information broadcast failed: {}", e);
        }

        loop {
            let wakeup = self.next_wakeup();
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(rrc_msg)) => {
                        self.catch_up();
                        self.handle_message(rrc_msg);
                    }
                    Some(TaskMessage::Shutdown) => {
                        info!("RRC task received shutdown signal");
                        break;
                    }
                    None => {
                        info!("RRC task channel closed");
                        break;
                    }
                },
                _ = sleep_until(wakeup.unwrap_or_else(Instant::now)), if wakeup.is_some() => {
                    self.catch_up();
                }
            }
        }

        self.state = TaskState::Stopped;
        info!("RRC task stopped with {} UE contexts", self.registry.len());
    }
}
