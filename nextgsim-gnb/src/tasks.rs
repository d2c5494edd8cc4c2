//! gNB Task Framework
//!
//! The RRC registry runs inside an async task that owns it exclusively.
//! Other parts of the gNB talk to it through typed message channels: they
//! send [`RrcMessage`]s in and receive [`RrcOutput`]s from the channel
//! collaborators.
//!
//! # Task Lifecycle
//!
//! 1. **Created**: Task is instantiated but not yet running
//! 2. **Running**: Task is processing messages and timers
//! 3. **Stopped**: Task received a shutdown signal or its channel closed

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use nextgsim_common::{CellId, Rnti};
use nextgsim_rrc::RrcChannel;

use crate::rrc::{BearerId, CoreNetworkEvent, CoreNetworkMessage, RegistryStats, X2Message};

// ============================================================================
// Task Message Envelope
// ============================================================================

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    pub fn shutdown() -> Self {
        TaskMessage::Shutdown
    }

    /// Returns true if this is a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Created,
    Running,
    Stopped,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Created => write!(f, "Created"),
            TaskState::Running => write!(f, "Running"),
            TaskState::Stopped => write!(f, "Stopped"),
        }
    }
}

// ============================================================================
// Task Trait
// ============================================================================

/// A long-running task driven by a message channel.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop until shutdown or until every sender is
    /// dropped.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

// ============================================================================
// Task Handle
// ============================================================================

/// Sending side of a task channel.
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Creates a channel and returns its handle and receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TaskMessage<T>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends a message to the task.
    ///
    /// Returns an error if the task has been dropped.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends a message to the task without waiting.
    ///
    /// Returns an error if the channel is full or the task has been dropped.
    pub fn try_send(&self, msg: T) -> Result<(), mpsc::error::TrySendError<TaskMessage<T>>> {
        self.tx.try_send(TaskMessage::Message(msg))
    }

    /// Sends a shutdown signal to the task.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    /// Returns true if the task channel is closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// RRC Task Messages
// ============================================================================

/// Messages handled by the RRC task.
#[derive(Debug)]
pub enum RrcMessage {
    /// Random access detected in a cell
    RadioAttempt { cell_id: CellId },
    /// Uplink RRC message from a UE
    UplinkRrc {
        rnti: Rnti,
        channel: RrcChannel,
        data: Bytes,
    },
    /// Downlink user data for a DRB
    DataArrival { rnti: Rnti, drb_id: u8, data: Bytes },
    /// Message from a peer gNB
    X2(X2Message),
    /// Message from the core network
    CoreNetwork(CoreNetworkMessage),
    /// Operator-triggered handover
    TriggerHandover { rnti: Rnti, target_cell: CellId },
    /// Operator-triggered release
    TriggerRelease { rnti: Rnti },
    /// Status query
    Stats { reply: oneshot::Sender<RegistryStats> },
}

/// Events emitted by the RRC task's channel collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum RrcOutput {
    UeAdded { rnti: Rnti, cell_id: CellId },
    UeRemoved { rnti: Rnti },
    /// Encoded RRC message for one UE
    Downlink {
        rnti: Rnti,
        channel: RrcChannel,
        data: Bytes,
    },
    /// Encoded BCCH message for a cell
    Broadcast { cell_id: CellId, data: Bytes },
    Paging { rnti: Rnti },
    BearerAttached { rnti: Rnti, bearer: BearerId },
    BearerStarted { rnti: Rnti, drb_id: u8 },
    BearerDetached { rnti: Rnti, bearer: BearerId },
    /// Downlink PDU over the air
    DownlinkPdu { rnti: Rnti, drb_id: u8, data: Bytes },
    /// Uplink data towards the core network
    UplinkData { rnti: Rnti, drb_id: u8, data: Bytes },
    Core(CoreNetworkEvent),
    X2(X2Message),
}

impl RrcOutput {
    pub fn name(&self) -> &'static str {
        match self {
            RrcOutput::UeAdded { .. } => "UeAdded",
            RrcOutput::UeRemoved { .. } => "UeRemoved",
            RrcOutput::Downlink { .. } => "Downlink",
            RrcOutput::Broadcast { .. } => "Broadcast",
            RrcOutput::Paging { .. } => "Paging",
            RrcOutput::BearerAttached { .. } => "BearerAttached",
            RrcOutput::BearerStarted { .. } => "BearerStarted",
            RrcOutput::BearerDetached { .. } => "BearerDetached",
            RrcOutput::DownlinkPdu { .. } => "DownlinkPdu",
            RrcOutput::UplinkData { .. } => "UplinkData",
            RrcOutput::Core(_) => "Core",
            RrcOutput::X2(_) => "X2",
        }
    }
}

/// Default channel capacity for task message queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
