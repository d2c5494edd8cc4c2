//! RRC containers carried inside inter-gNB messages
//!
//! In `real` protocol mode a container is the bit-packed RRC message. In
//! `ideal` mode the sending registry parks the decoded value in its own
//! arena and sends a token instead; the token can be redeemed exactly once,
//! and only at the arena that issued it.

use std::collections::HashMap;

use nextgsim_common::RrcProtocolMode;
use nextgsim_rrc::procedures::{
    decode_handover_command, decode_handover_preparation_info, encode_handover_command,
    encode_handover_preparation_info, HandoverPreparationInfo, RrcReconfiguration,
};

use super::error::RrcError;

/// Single-use handle to an arena entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerToken {
    owner: u32,
    id: u64,
}

impl ContainerToken {
    /// Identifier of the arena that issued the token
    pub fn owner(self) -> u32 {
        self.owner
    }
}

/// RRC container of an inter-gNB message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RrcContainer {
    /// Bit-packed RRC message
    Encoded(Vec<u8>),
    /// Token into the sender's arena
    Token(ContainerToken),
}

/// Decoded container contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerPayload {
    /// Source → target, in the handover request
    PreparationInfo(HandoverPreparationInfo),
    /// Target → source, in the handover request acknowledge
    HandoverCommand(RrcReconfiguration),
}

/// Arena of containers issued by one registry.
#[derive(Debug)]
pub struct ContainerArena {
    owner: u32,
    next_id: u64,
    entries: HashMap<u64, ContainerPayload>,
}

impl ContainerArena {
    pub fn new(owner: u32) -> Self {
        Self {
            owner,
            next_id: 0,
            entries: HashMap::new(),
        }
    }

    /// Parks a payload and returns its token.
    pub fn store(&mut self, payload: ContainerPayload) -> ContainerToken {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, payload);
        ContainerToken {
            owner: self.owner,
            id,
        }
    }

    /// Redeems a token. Fails for tokens of other arenas and for tokens
    /// already redeemed.
    pub fn take(&mut self, token: ContainerToken) -> Result<ContainerPayload, RrcError> {
        if token.owner != self.owner {
            return Err(RrcError::InvalidContainer);
        }
        self.entries.remove(&token.id).ok_or(RrcError::InvalidContainer)
    }

    /// Entries not yet redeemed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wraps `payload` for transmission in the given protocol mode.
    pub fn pack(&mut self, mode: RrcProtocolMode, payload: ContainerPayload) -> Result<RrcContainer, RrcError> {
        match mode {
            RrcProtocolMode::Ideal => Ok(RrcContainer::Token(self.store(payload))),
            RrcProtocolMode::Real => {
                let bytes = match &payload {
                    ContainerPayload::PreparationInfo(info) => encode_handover_preparation_info(info)?,
                    ContainerPayload::HandoverCommand(command) => encode_handover_command(command)?,
                };
                Ok(RrcContainer::Encoded(bytes))
            }
        }
    }

    /// Opens a handover preparation information container.
    pub fn unpack_preparation_info(&mut self, container: &RrcContainer) -> Result<HandoverPreparationInfo, RrcError> {
        match container {
            RrcContainer::Encoded(bytes) => Ok(decode_handover_preparation_info(bytes)?),
            RrcContainer::Token(token) => match self.take(*token)? {
                ContainerPayload::PreparationInfo(info) => Ok(info),
                ContainerPayload::HandoverCommand(_) => Err(RrcError::InvalidContainer),
            },
        }
    }

    /// Opens a handover command container. Returns the command and the
    /// DL-DCCH bytes to send to the UE; encoded containers are passed on
    /// verbatim.
    pub fn unpack_handover_command(
        &mut self,
        container: &RrcContainer,
    ) -> Result<(RrcReconfiguration, Vec<u8>), RrcError> {
        match container {
            RrcContainer::Encoded(bytes) => {
                let command = decode_handover_command(bytes)?;
                Ok((command, bytes.clone()))
            }
            RrcContainer::Token(token) => match self.take(*token)? {
                ContainerPayload::HandoverCommand(command) => {
                    let bytes = encode_handover_command(&command)?;
                    Ok((command, bytes))
                }
                ContainerPayload::PreparationInfo(_) => Err(RrcError::InvalidContainer),
            },
        }
    }
}

/// Moves an ideal-mode container from the arena that issued it into
/// another arena, returning the new token. Encoded containers are returned
/// unchanged.
pub fn relay_container(
    from: &mut ContainerArena,
    to: &mut ContainerArena,
    container: RrcContainer,
) -> Result<RrcContainer, RrcError> {
    match container {
        RrcContainer::Encoded(bytes) => Ok(RrcContainer::Encoded(bytes)),
        RrcContainer::Token(token) => {
            let payload = from.take(token)?;
            Ok(RrcContainer::Token(to.store(payload)))
        }
    }
}
