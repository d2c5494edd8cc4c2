//! Mock collaborators for driving a [`Registry`](nextgsim_gnb::Registry)
//!
//! One [`MockEnv`] stands in for the admission control, the data path, the
//! radio, the core network and the X2 transport of a gNB. Every call the
//! RRC layer makes is recorded so tests can assert on it, and admission
//! decisions can be flipped while a test runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use nextgsim_common::{CellId, Rnti};
use nextgsim_gnb::rrc::{
    AdmissionControl, AdmissionRequest, BearerDataPath, BearerId, BearerRecord, Collaborators,
    CoreNetwork, CoreNetworkEvent, PdcpStatus, RadioAccess, X2Message, X2Transport,
};
use nextgsim_rrc::{decode_rrc, DlCcchMessage, DlDcchMessage, RrcChannel};

/// Everything the RRC layer handed to its collaborators.
#[derive(Debug, Default)]
pub struct Recorder {
    pub downlink: Vec<(Rnti, RrcChannel, Bytes)>,
    pub broadcasts: Vec<(CellId, Bytes)>,
    pub added: Vec<(Rnti, CellId)>,
    pub removed: Vec<Rnti>,
    pub pages: Vec<Rnti>,
    pub attached: Vec<(Rnti, BearerId)>,
    pub started: Vec<(Rnti, u8)>,
    pub detached: Vec<(Rnti, BearerId)>,
    pub pdus: Vec<(Rnti, u8, Bytes)>,
    pub uplink: Vec<(Rnti, u8, Bytes)>,
    pub pdcp: HashMap<(Rnti, u8), PdcpStatus>,
    pub core: Vec<CoreNetworkEvent>,
    pub x2: Vec<X2Message>,
    pub deny_connections: bool,
    pub deny_handovers: bool,
}

/// Shared handle on a [`Recorder`], cloned into every collaborator slot.
#[derive(Debug, Clone, Default)]
pub struct MockEnv(Arc<Mutex<Recorder>>);

impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, Recorder> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Collaborators for a registry, with or without a core network.
    pub fn collaborators(&self, core: bool) -> Collaborators {
        Collaborators {
            admission: Box::new(self.clone()),
            data_path: Box::new(self.clone()),
            radio: Box::new(self.clone()),
            core: core.then(|| Box::new(self.clone()) as Box<dyn CoreNetwork>),
            x2: Box::new(self.clone()),
        }
    }

    pub fn deny_connections(&self, deny: bool) {
        self.lock().deny_connections = deny;
    }

    pub fn deny_handovers(&self, deny: bool) {
        self.lock().deny_handovers = deny;
    }

    /// Drains the X2 messages sent so far.
    pub fn take_x2(&self) -> Vec<X2Message> {
        std::mem::take(&mut self.lock().x2)
    }

    /// Drains the core network events sent so far.
    pub fn take_core(&self) -> Vec<CoreNetworkEvent> {
        std::mem::take(&mut self.lock().core)
    }

    pub fn removed(&self) -> Vec<Rnti> {
        self.lock().removed.clone()
    }

    pub fn pages(&self) -> Vec<Rnti> {
        self.lock().pages.clone()
    }

    /// Number of RRC messages sent to `rnti`.
    pub fn downlink_count(&self, rnti: Rnti) -> usize {
        self.lock().downlink.iter().filter(|(to, _, _)| *to == rnti).count()
    }

    fn last_on(&self, rnti: Rnti, channel: RrcChannel) -> Option<Bytes> {
        self.lock()
            .downlink
            .iter()
            .rev()
            .find(|(to, ch, _)| *to == rnti && *ch == channel)
            .map(|(_, _, data)| data.clone())
    }

    /// Last DL-CCCH message sent to `rnti`, decoded.
    pub fn last_ccch(&self, rnti: Rnti) -> Option<DlCcchMessage> {
        let bytes = self.last_on(rnti, RrcChannel::DlCcch)?;
        decode_rrc(&bytes).ok()
    }

    /// Last DL-DCCH message sent to `rnti`, decoded.
    pub fn last_dcch(&self, rnti: Rnti) -> Option<DlDcchMessage> {
        let bytes = self.last_on(rnti, RrcChannel::DlDcch)?;
        decode_rrc(&bytes).ok()
    }

    /// Transaction identifier of the last DL-DCCH message sent to `rnti`.
    pub fn last_transaction_id(&self, rnti: Rnti) -> Option<u8> {
        match self.last_dcch(rnti)? {
            DlDcchMessage::RrcReconfiguration(m) => Some(m.rrc_transaction_id),
            DlDcchMessage::RrcRelease(m) => Some(m.rrc_transaction_id),
            DlDcchMessage::RrcResume(m) => Some(m.rrc_transaction_id),
        }
    }

    /// PDUs delivered on the downlink data path of `rnti`.
    pub fn pdus_for(&self, rnti: Rnti) -> Vec<(u8, Bytes)> {
        self.lock()
            .pdus
            .iter()
            .filter(|(to, _, _)| *to == rnti)
            .map(|(_, drb, data)| (*drb, data.clone()))
            .collect()
    }
}

impl AdmissionControl for MockEnv {
    fn admit_connection(&mut self, _request: &AdmissionRequest) -> bool {
        !self.lock().deny_connections
    }

    fn admit_handover(&mut self, _request: &AdmissionRequest) -> bool {
        !self.lock().deny_handovers
    }
}

impl RadioAccess for MockEnv {
    fn add_ue(&mut self, rnti: Rnti, cell_id: CellId) {
        self.lock().added.push((rnti, cell_id));
    }

    fn remove_ue(&mut self, rnti: Rnti) {
        self.lock().removed.push(rnti);
    }

    fn send_rrc(&mut self, rnti: Rnti, channel: RrcChannel, data: Bytes) {
        self.lock().downlink.push((rnti, channel, data));
    }

    fn broadcast(&mut self, cell_id: CellId, data: Bytes) {
        self.lock().broadcasts.push((cell_id, data));
    }

    fn page(&mut self, rnti: Rnti) {
        self.lock().pages.push(rnti);
    }
}

impl BearerDataPath for MockEnv {
    fn attach_bearer(&mut self, rnti: Rnti, bearer: &BearerRecord) {
        self.lock().attached.push((rnti, bearer.id));
    }

    fn start_bearer(&mut self, rnti: Rnti, drb_id: u8) {
        self.lock().started.push((rnti, drb_id));
    }

    fn detach_bearer(&mut self, rnti: Rnti, bearer: &BearerRecord) {
        self.lock().detached.push((rnti, bearer.id));
    }

    fn send_pdu(&mut self, rnti: Rnti, drb_id: u8, data: Bytes) {
        self.lock().pdus.push((rnti, drb_id, data));
    }

    fn forward_up(&mut self, rnti: Rnti, drb_id: u8, data: Bytes) {
        self.lock().uplink.push((rnti, drb_id, data));
    }

    fn pdcp_status(&self, rnti: Rnti, drb_id: u8) -> PdcpStatus {
        self.lock().pdcp.get(&(rnti, drb_id)).copied().unwrap_or_default()
    }

    fn set_pdcp_status(&mut self, rnti: Rnti, drb_id: u8, status: PdcpStatus) {
        self.lock().pdcp.insert((rnti, drb_id), status);
    }
}

impl CoreNetwork for MockEnv {
    fn notify(&mut self, event: CoreNetworkEvent) {
        self.lock().core.push(event);
    }
}

impl X2Transport for MockEnv {
    fn send(&mut self, message: X2Message) {
        self.lock().x2.push(message);
    }
}
