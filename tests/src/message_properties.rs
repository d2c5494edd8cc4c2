//! Property tests for the RRC message catalog
//!
//! Every message the gNB sends or accepts is generated with random field
//! values, optional parts present or absent and list lengths across their
//! bounds, then encoded and decoded on its logical channel.

use std::fmt::Debug;

use nextgsim_common::Plmn;
use nextgsim_rrc::ies::{
    AntennaTransmissionMode, BucketSizeDuration, DrbToAddMod, LogicalChannelConfig,
    PhysicalConfigDedicated, PrioritisedBitRate, RadioBearerConfig, RlcMode, SrbToAddMod,
    MAX_ARFCN, MAX_DRB_ID, MAX_PCI,
};
use nextgsim_rrc::procedures::*;
use nextgsim_rrc::{
    decode_rrc, encode_rrc, BcchMessage, DlCcchMessage, DlDcchMessage, PerCodec, UlCcchMessage,
    UlDcchMessage,
};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use proptest::sample::select;

fn over_the_air<T: PerCodec>(msg: &T) -> T {
    let bytes = encode_rrc(msg).unwrap();
    decode_rrc(&bytes).unwrap()
}

fn variant<T: Copy + Debug + 'static>(variants: &'static [T]) -> impl Strategy<Value = T> {
    select(variants)
}

fn transaction_id() -> impl Strategy<Value = u8> {
    0u8..=3
}

// ============================================================================
// Information elements
// ============================================================================

fn logical_channel_config() -> impl Strategy<Value = LogicalChannelConfig> {
    (
        1u8..=16,
        variant(PrioritisedBitRate::VARIANTS),
        variant(BucketSizeDuration::VARIANTS),
        option::of(0u8..=3),
    )
        .prop_map(|(priority, prioritised_bit_rate, bucket_size_duration, logical_channel_group)| {
            LogicalChannelConfig {
                priority,
                prioritised_bit_rate,
                bucket_size_duration,
                logical_channel_group,
            }
        })
}

fn srb_to_add_mod() -> impl Strategy<Value = SrbToAddMod> {
    (1u8..=2, variant(RlcMode::VARIANTS), logical_channel_config()).prop_map(
        |(srb_identity, rlc_mode, logical_channel_config)| SrbToAddMod {
            srb_identity,
            rlc_mode,
            logical_channel_config,
        },
    )
}

fn drb_to_add_mod() -> impl Strategy<Value = DrbToAddMod> {
    (
        1u8..=MAX_DRB_ID,
        option::of(0u8..=63),
        3u8..=34,
        variant(RlcMode::VARIANTS),
        logical_channel_config(),
    )
        .prop_map(
            |(drb_identity, bearer_identity, logical_channel_identity, rlc_mode, logical_channel_config)| {
                DrbToAddMod {
                    drb_identity,
                    bearer_identity,
                    logical_channel_identity,
                    rlc_mode,
                    logical_channel_config,
                }
            },
        )
}

fn radio_bearer_config() -> impl Strategy<Value = RadioBearerConfig> {
    let max = usize::from(MAX_DRB_ID);
    (
        vec(srb_to_add_mod(), 0..=2),
        vec(drb_to_add_mod(), 0..=max),
        vec(1u8..=MAX_DRB_ID, 0..=max),
    )
        .prop_map(|(srb_to_add_mod_list, drb_to_add_mod_list, drb_to_release_list)| {
            RadioBearerConfig {
                srb_to_add_mod_list,
                drb_to_add_mod_list,
                drb_to_release_list,
            }
        })
}

fn physical_config_dedicated() -> impl Strategy<Value = PhysicalConfigDedicated> {
    (0u16..=1023, variant(AntennaTransmissionMode::VARIANTS)).prop_map(
        |(srs_config_index, antenna_transmission_mode)| PhysicalConfigDedicated {
            srs_config_index,
            antenna_transmission_mode,
        },
    )
}

fn meas_config() -> impl Strategy<Value = MeasConfig> {
    let meas_object = (1u8..=32, 0..=MAX_ARFCN).prop_map(|(meas_object_id, carrier_freq)| MeasObject {
        meas_object_id,
        carrier_freq,
    });
    let report_config = (1u8..=32, -30i8..=30, 0u8..=30, variant(TimeToTrigger::VARIANTS)).prop_map(
        |(report_config_id, a3_offset, hysteresis, time_to_trigger)| ReportConfig {
            report_config_id,
            a3_offset,
            hysteresis,
            time_to_trigger,
        },
    );
    let meas_id = (1u8..=32, 1u8..=32, 1u8..=32).prop_map(|(meas_id, meas_object_id, report_config_id)| {
        MeasIdToAddMod {
            meas_id,
            meas_object_id,
            report_config_id,
        }
    });
    (
        vec(meas_object, 0..=MAX_MEAS_ENTRIES),
        vec(report_config, 0..=MAX_MEAS_ENTRIES),
        vec(meas_id, 0..=MAX_MEAS_ENTRIES),
    )
        .prop_map(|(meas_objects, report_configs, meas_ids)| MeasConfig {
            meas_objects,
            report_configs,
            meas_ids,
        })
}

fn mobility_control_info() -> impl Strategy<Value = MobilityControlInfo> {
    let rach = (0u8..=63, 0u8..=15).prop_map(|(preamble_index, prach_mask_index)| RachConfigDedicated {
        preamble_index,
        prach_mask_index,
    });
    (
        0..=MAX_PCI,
        option::of(0..=MAX_ARFCN),
        any::<u16>(),
        variant(T304::VARIANTS),
        option::of(rach),
    )
        .prop_map(
            |(target_physical_cell_id, carrier_freq, new_ue_identity, t304, rach_config_dedicated)| {
                MobilityControlInfo {
                    target_physical_cell_id,
                    carrier_freq,
                    new_ue_identity,
                    t304,
                    rach_config_dedicated,
                }
            },
        )
}

fn suspend_config() -> impl Strategy<Value = SuspendConfig> {
    let sdt = vec(1u8..=MAX_DRB_ID, 0..=usize::from(MAX_DRB_ID))
        .prop_map(|sdt_drb_list| SdtConfig { sdt_drb_list });
    (
        0u64..(1 << 40),
        0u32..(1 << 24),
        variant(PagingCycle::VARIANTS),
        variant(PeriodicRnaUpdateTimer::VARIANTS),
        option::of(variant(ExtendedPagingCycle::VARIANTS)),
        option::of(sdt),
    )
        .prop_map(
            |(full_i_rnti, short_i_rnti, ran_paging_cycle, t380, ran_extended_paging_cycle, sdt_config)| {
                SuspendConfig {
                    full_i_rnti,
                    short_i_rnti,
                    ran_paging_cycle,
                    t380,
                    ran_extended_paging_cycle,
                    sdt_config,
                }
            },
        )
}

fn master_information_block() -> impl Strategy<Value = MasterInformationBlock> {
    (
        0u16..1024,
        1..=MAX_BANDWIDTH_PRBS,
        variant(SubCarrierSpacingCommon::VARIANTS),
    )
        .prop_map(|(system_frame_number, dl_bandwidth_prbs, sub_carrier_spacing_common)| {
            MasterInformationBlock {
                system_frame_number,
                dl_bandwidth_prbs,
                sub_carrier_spacing_common,
            }
        })
}

fn sib1() -> impl Strategy<Value = Sib1> {
    (
        (0u16..=999, 0u16..=999, any::<bool>()),
        0u32..(1 << 24),
        0u64..(1 << 36),
        any::<bool>(),
        option::of(-70i8..=-22),
        option::of(any::<u16>()),
    )
        .prop_map(
            |((mcc, mnc, long_mnc), tracking_area_code, cell_identity, cell_barred, q_rx_lev_min, threshold)| {
                Sib1 {
                    plmn: Plmn::new(mcc, mnc, long_mnc),
                    tracking_area_code,
                    cell_identity,
                    cell_barred,
                    cell_selection_info: q_rx_lev_min.map(|q_rx_lev_min| CellSelectionInfo { q_rx_lev_min }),
                    sdt_data_volume_threshold: threshold,
                }
            },
        )
}

fn sib2() -> impl Strategy<Value = Sib2> {
    (
        1u8..=64,
        variant(PreambleTransMax::VARIANTS),
        2u8..=10,
        1u8..=4,
        0..=MAX_ARFCN,
        1..=MAX_BANDWIDTH_PRBS,
    )
        .prop_map(
            |(
                number_of_ra_preambles,
                preamble_trans_max,
                ra_response_window_size,
                conn_est_fail_count,
                ul_carrier_freq,
                ul_bandwidth_prbs,
            )| Sib2 {
                rach_config_common: RachConfigCommon {
                    number_of_ra_preambles,
                    preamble_trans_max,
                    ra_response_window_size,
                    conn_est_fail_count,
                },
                ul_carrier_freq,
                ul_bandwidth_prbs,
            },
        )
}

// ============================================================================
// Messages
// ============================================================================

fn ul_ccch_message() -> impl Strategy<Value = UlCcchMessage> {
    let request = (any::<u8>(), any::<u32>(), variant(EstablishmentCause::VARIANTS), any::<bool>())
        .prop_map(|(mmec, m_tmsi, establishment_cause, reduced_capability)| {
            UlCcchMessage::RrcConnectionRequest(RrcConnectionRequest {
                ue_identity: InitialUeIdentity { mmec, m_tmsi },
                establishment_cause,
                reduced_capability,
            })
        });
    let reestablishment = (
        any::<u16>(),
        0..=MAX_PCI,
        any::<u16>(),
        variant(ReestablishmentCause::VARIANTS),
    )
        .prop_map(|(c_rnti, physical_cell_id, short_mac_i, reestablishment_cause)| {
            UlCcchMessage::RrcReestablishmentRequest(RrcReestablishmentRequest {
                c_rnti,
                physical_cell_id,
                short_mac_i,
                reestablishment_cause,
            })
        });
    let resume = (
        0u32..(1 << 24),
        variant(ResumeCause::VARIANTS),
        vec(vec(any::<u8>(), 0..64), 0..=MAX_SDT_PAYLOADS),
    )
        .prop_map(|(resume_identity, resume_cause, sdt_payload)| {
            UlCcchMessage::RrcResumeRequest(RrcResumeRequest {
                resume_identity,
                resume_cause,
                sdt_payload,
            })
        });
    prop_oneof![request, reestablishment, resume]
}

fn measurement_report() -> impl Strategy<Value = MeasurementReport> {
    let neighbour = (
        0..=MAX_PCI,
        option::of(0..=MAX_MEAS_QUANTITY),
        option::of(0..=MAX_MEAS_QUANTITY),
    )
        .prop_map(|(physical_cell_id, rsrp, rsrq)| NeighbourMeasResult {
            physical_cell_id,
            rsrp,
            rsrq,
        });
    (
        1u8..=32,
        0..=MAX_MEAS_QUANTITY,
        0..=MAX_MEAS_QUANTITY,
        vec(neighbour, 0..=MAX_NEIGHBOUR_RESULTS),
    )
        .prop_map(|(meas_id, rsrp, rsrq, neighbours)| MeasurementReport {
            meas_id,
            pcell: PCellMeasResult { rsrp, rsrq },
            neighbours,
        })
}

fn ul_dcch_message() -> impl Strategy<Value = UlDcchMessage> {
    let setup_complete = (
        transaction_id(),
        1u8..=6,
        option::of(vec(any::<u8>(), 1..=MAX_NAS_MESSAGE_SIZE)),
    )
        .prop_map(|(rrc_transaction_id, selected_plmn_identity, dedicated_nas_message)| {
            UlDcchMessage::RrcSetupComplete(RrcSetupComplete {
                rrc_transaction_id,
                selected_plmn_identity,
                dedicated_nas_message,
            })
        });
    prop_oneof![
        setup_complete,
        transaction_id().prop_map(|rrc_transaction_id| {
            UlDcchMessage::RrcReconfigurationComplete(RrcReconfigurationComplete { rrc_transaction_id })
        }),
        transaction_id().prop_map(|rrc_transaction_id| {
            UlDcchMessage::RrcResumeComplete(RrcResumeComplete { rrc_transaction_id })
        }),
        transaction_id().prop_map(|rrc_transaction_id| {
            UlDcchMessage::RrcReestablishmentComplete(RrcReestablishmentComplete { rrc_transaction_id })
        }),
        measurement_report().prop_map(UlDcchMessage::MeasurementReport),
    ]
}

fn dl_ccch_message() -> impl Strategy<Value = DlCcchMessage> {
    prop_oneof![
        (transaction_id(), radio_bearer_config(), physical_config_dedicated()).prop_map(
            |(rrc_transaction_id, radio_bearer_config, physical_config_dedicated)| {
                DlCcchMessage::RrcSetup(RrcSetup {
                    rrc_transaction_id,
                    radio_bearer_config,
                    physical_config_dedicated,
                })
            }
        ),
        (1u8..=16).prop_map(|wait_time| DlCcchMessage::RrcReject(RrcReject { wait_time })),
        (transaction_id(), radio_bearer_config()).prop_map(|(rrc_transaction_id, radio_bearer_config)| {
            DlCcchMessage::RrcReestablishment(RrcReestablishment {
                rrc_transaction_id,
                radio_bearer_config,
            })
        }),
        Just(DlCcchMessage::RrcReestablishmentReject(RrcReestablishmentReject)),
    ]
}

fn rrc_reconfiguration() -> impl Strategy<Value = RrcReconfiguration> {
    (
        transaction_id(),
        option::of(meas_config()),
        option::of(mobility_control_info()),
        option::of(radio_bearer_config()),
        option::of(physical_config_dedicated()),
    )
        .prop_map(
            |(rrc_transaction_id, meas_config, mobility_control_info, radio_bearer_config, physical_config_dedicated)| {
                RrcReconfiguration {
                    rrc_transaction_id,
                    meas_config,
                    mobility_control_info,
                    radio_bearer_config,
                    physical_config_dedicated,
                }
            },
        )
}

fn dl_dcch_message() -> impl Strategy<Value = DlDcchMessage> {
    prop_oneof![
        rrc_reconfiguration().prop_map(DlDcchMessage::RrcReconfiguration),
        (transaction_id(), option::of(suspend_config())).prop_map(|(rrc_transaction_id, suspend_config)| {
            DlDcchMessage::RrcRelease(RrcRelease {
                rrc_transaction_id,
                suspend_config,
            })
        }),
        (transaction_id(), option::of(radio_bearer_config())).prop_map(
            |(rrc_transaction_id, radio_bearer_config)| {
                DlDcchMessage::RrcResume(RrcResume {
                    rrc_transaction_id,
                    radio_bearer_config,
                })
            }
        ),
    ]
}

fn bcch_message() -> impl Strategy<Value = BcchMessage> {
    prop_oneof![
        master_information_block().prop_map(BcchMessage::Mib),
        (sib1(), option::of(sib2()))
            .prop_map(|(sib1, sib2)| BcchMessage::SystemInformation(SystemInformation { sib1, sib2 })),
    ]
}

fn handover_preparation_info() -> impl Strategy<Value = HandoverPreparationInfo> {
    (
        any::<u16>(),
        radio_bearer_config(),
        master_information_block(),
        sib1(),
        0..=MAX_ARFCN,
    )
        .prop_map(
            |(source_ue_identity, source_radio_bearer_config, source_mib, source_sib1, source_dl_carrier_freq)| {
                HandoverPreparationInfo {
                    source_ue_identity,
                    source_radio_bearer_config,
                    source_mib,
                    source_sib1,
                    source_dl_carrier_freq,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_ul_ccch_round_trip(msg in ul_ccch_message()) {
        prop_assert_eq!(over_the_air(&msg), msg);
    }

    #[test]
    fn prop_ul_dcch_round_trip(msg in ul_dcch_message()) {
        prop_assert_eq!(over_the_air(&msg), msg);
    }

    #[test]
    fn prop_dl_ccch_round_trip(msg in dl_ccch_message()) {
        prop_assert_eq!(over_the_air(&msg), msg);
    }

    #[test]
    fn prop_dl_dcch_round_trip(msg in dl_dcch_message()) {
        prop_assert_eq!(over_the_air(&msg), msg);
    }

    #[test]
    fn prop_bcch_round_trip(msg in bcch_message()) {
        prop_assert_eq!(over_the_air(&msg), msg);
    }

    /// Handover commands travel inside X2 containers and always carry
    /// mobility control information.
    #[test]
    fn prop_handover_command_round_trip(
        mut command in rrc_reconfiguration(),
        mobility in mobility_control_info(),
    ) {
        command.mobility_control_info = Some(mobility);
        let bytes = encode_handover_command(&command).unwrap();
        prop_assert_eq!(decode_handover_command(&bytes).unwrap(), command);
    }

    #[test]
    fn prop_handover_preparation_info_round_trip(info in handover_preparation_info()) {
        let bytes = encode_handover_preparation_info(&info).unwrap();
        prop_assert_eq!(decode_handover_preparation_info(&bytes).unwrap(), info);
    }

    /// Re-encoding a decoded message reproduces the original bits.
    #[test]
    fn prop_encoding_is_deterministic(msg in dl_dcch_message()) {
        prop_assert_eq!(encode_rrc(&msg).unwrap(), encode_rrc(&over_the_air(&msg)).unwrap());
    }
}
