//! Information elements shared by several RRC messages
//!
//! Radio bearer configuration, logical channel configuration and the
//! dedicated physical configuration are carried by Setup, Reconfiguration,
//! Resume, Reestablishment and the handover preparation container.

use nextgsim_common::Plmn;

use crate::codec::{DecodeError, EncodeError, PerCodec, PerDecoder, PerEncoder};
use crate::per_enumerated;

/// Highest data radio bearer identity.
pub const MAX_DRB_ID: u8 = 32;

/// Highest NR ARFCN value.
pub const MAX_ARFCN: u32 = 3_279_165;

/// Highest physical cell identity.
pub const MAX_PCI: u16 = 1007;

/// Writes an RRC transaction identifier (0-3).
pub fn encode_transaction_id(enc: &mut PerEncoder, id: u8) -> Result<(), EncodeError> {
    enc.integer(id as i64, 0, 3)
}

/// Reads an RRC transaction identifier (0-3).
pub fn decode_transaction_id(dec: &mut PerDecoder<'_>) -> Result<u8, DecodeError> {
    Ok(dec.integer(0, 3)? as u8)
}

per_enumerated! {
    /// RLC entity mode of a radio bearer.
    pub enum RlcMode {
        /// Transparent mode
        Tm,
        /// Unacknowledged mode
        Um,
        /// Acknowledged mode
        Am,
    }
}

per_enumerated! {
    /// Prioritised bit rate of a logical channel.
    pub enum PrioritisedBitRate {
        Kbps0,
        Kbps8,
        Kbps16,
        Kbps32,
        Kbps64,
        Kbps128,
        Kbps256,
        Infinity,
    }
}

impl PrioritisedBitRate {
    /// Smallest rate that is at least `kbps`.
    pub fn from_kbps(kbps: u64) -> Self {
        match kbps {
            0 => Self::Kbps0,
            1..=8 => Self::Kbps8,
            9..=16 => Self::Kbps16,
            17..=32 => Self::Kbps32,
            33..=64 => Self::Kbps64,
            65..=128 => Self::Kbps128,
            129..=256 => Self::Kbps256,
            _ => Self::Infinity,
        }
    }

    /// Rate in kbps, `None` for infinity.
    pub fn kbps(self) -> Option<u64> {
        match self {
            Self::Kbps0 => Some(0),
            Self::Kbps8 => Some(8),
            Self::Kbps16 => Some(16),
            Self::Kbps32 => Some(32),
            Self::Kbps64 => Some(64),
            Self::Kbps128 => Some(128),
            Self::Kbps256 => Some(256),
            Self::Infinity => None,
        }
    }
}

per_enumerated! {
    /// Token bucket size duration of a logical channel.
    pub enum BucketSizeDuration {
        Ms50,
        Ms100,
        Ms150,
        Ms300,
        Ms500,
        Ms1000,
    }
}

impl BucketSizeDuration {
    /// Smallest duration that is at least `ms`, saturating at 1000 ms.
    pub fn from_millis(ms: u64) -> Self {
        match ms {
            0..=50 => Self::Ms50,
            51..=100 => Self::Ms100,
            101..=150 => Self::Ms150,
            151..=300 => Self::Ms300,
            301..=500 => Self::Ms500,
            _ => Self::Ms1000,
        }
    }

    /// Duration in milliseconds.
    pub fn millis(self) -> u64 {
        match self {
            Self::Ms50 => 50,
            Self::Ms100 => 100,
            Self::Ms150 => 150,
            Self::Ms300 => 300,
            Self::Ms500 => 500,
            Self::Ms1000 => 1000,
        }
    }
}

/// Uplink logical channel parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalChannelConfig {
    /// Priority, 1 (highest) to 16
    pub priority: u8,
    /// Prioritised bit rate
    pub prioritised_bit_rate: PrioritisedBitRate,
    /// Bucket size duration
    pub bucket_size_duration: BucketSizeDuration,
    /// Logical channel group (0-3)
    pub logical_channel_group: Option<u8>,
}

impl PerCodec for LogicalChannelConfig {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, [self.logical_channel_group.is_some()]);
        enc.integer(self.priority as i64, 1, 16)?;
        self.prioritised_bit_rate.encode(enc)?;
        self.bucket_size_duration.encode(enc)?;
        if let Some(lcg) = self.logical_channel_group {
            enc.integer(lcg as i64, 0, 3)?;
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_lcg] = dec.sequence(true)?;
        let priority = dec.integer(1, 16)? as u8;
        let prioritised_bit_rate = PrioritisedBitRate::decode(dec)?;
        let bucket_size_duration = BucketSizeDuration::decode(dec)?;
        let logical_channel_group = if has_lcg {
            Some(dec.integer(0, 3)? as u8)
        } else {
            None
        };
        Ok(Self {
            priority,
            prioritised_bit_rate,
            bucket_size_duration,
            logical_channel_group,
        })
    }
}

/// Signalling radio bearer to add or modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrbToAddMod {
    /// SRB identity (1-2)
    pub srb_identity: u8,
    /// RLC mode
    pub rlc_mode: RlcMode,
    /// Logical channel configuration
    pub logical_channel_config: LogicalChannelConfig,
}

impl PerCodec for SrbToAddMod {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, []);
        enc.integer(self.srb_identity as i64, 1, 2)?;
        self.rlc_mode.encode(enc)?;
        self.logical_channel_config.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [] = dec.sequence(true)?;
        Ok(Self {
            srb_identity: dec.integer(1, 2)? as u8,
            rlc_mode: RlcMode::decode(dec)?,
            logical_channel_config: LogicalChannelConfig::decode(dec)?,
        })
    }
}

/// Data radio bearer to add or modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrbToAddMod {
    /// DRB identity (1-32)
    pub drb_identity: u8,
    /// QoS flow / EPS bearer identity bound to the DRB (0-63)
    pub bearer_identity: Option<u8>,
    /// Logical channel identity (3-34)
    pub logical_channel_identity: u8,
    /// RLC mode
    pub rlc_mode: RlcMode,
    /// Logical channel configuration
    pub logical_channel_config: LogicalChannelConfig,
}

impl PerCodec for DrbToAddMod {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, [self.bearer_identity.is_some()]);
        enc.integer(self.drb_identity as i64, 1, MAX_DRB_ID as i64)?;
        if let Some(id) = self.bearer_identity {
            enc.integer(id as i64, 0, 63)?;
        }
        enc.integer(self.logical_channel_identity as i64, 3, 34)?;
        self.rlc_mode.encode(enc)?;
        self.logical_channel_config.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_bearer_id] = dec.sequence(true)?;
        let drb_identity = dec.integer(1, MAX_DRB_ID as i64)? as u8;
        let bearer_identity = if has_bearer_id {
            Some(dec.integer(0, 63)? as u8)
        } else {
            None
        };
        Ok(Self {
            drb_identity,
            bearer_identity,
            logical_channel_identity: dec.integer(3, 34)? as u8,
            rlc_mode: RlcMode::decode(dec)?,
            logical_channel_config: LogicalChannelConfig::decode(dec)?,
        })
    }
}

/// Radio bearer configuration. Empty lists are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioBearerConfig {
    /// SRBs to add or modify (at most 2)
    pub srb_to_add_mod_list: Vec<SrbToAddMod>,
    /// DRBs to add or modify (at most 32)
    pub drb_to_add_mod_list: Vec<DrbToAddMod>,
    /// DRB identities to release (at most 32)
    pub drb_to_release_list: Vec<u8>,
}

impl RadioBearerConfig {
    /// Returns true if nothing is added, modified or released.
    pub fn is_empty(&self) -> bool {
        self.srb_to_add_mod_list.is_empty()
            && self.drb_to_add_mod_list.is_empty()
            && self.drb_to_release_list.is_empty()
    }
}

impl PerCodec for RadioBearerConfig {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(
            true,
            [
                !self.srb_to_add_mod_list.is_empty(),
                !self.drb_to_add_mod_list.is_empty(),
                !self.drb_to_release_list.is_empty(),
            ],
        );
        if !self.srb_to_add_mod_list.is_empty() {
            enc.list(&self.srb_to_add_mod_list, 1, 2)?;
        }
        if !self.drb_to_add_mod_list.is_empty() {
            enc.list(&self.drb_to_add_mod_list, 1, MAX_DRB_ID as usize)?;
        }
        if !self.drb_to_release_list.is_empty() {
            enc.sequence_of(self.drb_to_release_list.len(), 1, MAX_DRB_ID as usize)?;
            for id in &self.drb_to_release_list {
                enc.integer(*id as i64, 1, MAX_DRB_ID as i64)?;
            }
        }
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [has_srbs, has_drbs, has_releases] = dec.sequence(true)?;
        let mut config = Self::default();
        if has_srbs {
            config.srb_to_add_mod_list = dec.list(1, 2)?;
        }
        if has_drbs {
            config.drb_to_add_mod_list = dec.list(1, MAX_DRB_ID as usize)?;
        }
        if has_releases {
            let len = dec.sequence_of(1, MAX_DRB_ID as usize)?;
            for _ in 0..len {
                config
                    .drb_to_release_list
                    .push(dec.integer(1, MAX_DRB_ID as i64)? as u8);
            }
        }
        Ok(config)
    }
}

per_enumerated! {
    /// Downlink antenna transmission mode.
    pub enum AntennaTransmissionMode {
        Tm1,
        Tm2,
        Tm3,
        Tm4,
        Tm5,
        Tm6,
        Tm7,
        Tm8,
    }
}

/// Dedicated physical layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalConfigDedicated {
    /// SRS configuration index (0-1023)
    pub srs_config_index: u16,
    /// Antenna transmission mode
    pub antenna_transmission_mode: AntennaTransmissionMode,
}

impl PerCodec for PhysicalConfigDedicated {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.sequence(true, []);
        enc.integer(self.srs_config_index as i64, 0, 1023)?;
        self.antenna_transmission_mode.encode(enc)
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        let [] = dec.sequence(true)?;
        Ok(Self {
            srs_config_index: dec.integer(0, 1023)? as u16,
            antenna_transmission_mode: AntennaTransmissionMode::decode(dec)?,
        })
    }
}

/// PLMN identity: MCC and MNC as 0-999, with the 2/3-digit MNC flag.
impl PerCodec for Plmn {
    fn encode(&self, enc: &mut PerEncoder) -> Result<(), EncodeError> {
        enc.integer(self.mcc as i64, 0, 999)?;
        enc.integer(self.mnc as i64, 0, 999)?;
        enc.boolean(self.long_mnc);
        Ok(())
    }

    fn decode(dec: &mut PerDecoder<'_>) -> Result<Self, DecodeError> {
        Ok(Plmn {
            mcc: dec.integer(0, 999)? as u16,
            mnc: dec.integer(0, 999)? as u16,
            long_mnc: dec.boolean()?,
        })
    }
}
