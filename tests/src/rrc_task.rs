//! The RRC registry driven through its tokio task and message channels

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use integration_tests::ue_emulator::{connection_request, reconfiguration_complete, setup_complete};
use integration_tests::{
    init_test_logging, single_cell_config, wait_for, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};
use nextgsim_common::{GnbConfig, Rnti};
use nextgsim_gnb::{
    channel_collaborators, RegistryStats, RrcMessage, RrcOutput, RrcState, RrcTask, Task,
    TaskHandle, TaskMessage, TaskState,
};
use nextgsim_rrc::{decode_rrc, DlCcchMessage, DlDcchMessage, RrcChannel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Outputs = Arc<Mutex<Vec<RrcOutput>>>;

struct RunningGnb {
    handle: TaskHandle<RrcMessage>,
    outputs: Outputs,
    join: JoinHandle<RrcTask>,
}

impl RunningGnb {
    fn start(config: GnbConfig) -> Self {
        let (output, mut out_rx) = TaskHandle::channel(256);
        let collab = channel_collaborators(&config, output);
        let mut task = RrcTask::new(config, collab);
        let (handle, rx) = TaskHandle::channel(64);
        let join = tokio::spawn(async move {
            task.run(rx).await;
            task
        });

        let outputs = Outputs::default();
        let sink = outputs.clone();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                match msg.into_message() {
                    Some(RrcOutput::Broadcast { .. }) | None => {}
                    Some(output) => sink.lock().unwrap().push(output),
                }
            }
        });

        Self { handle, outputs, join }
    }

    async fn send(&self, msg: RrcMessage) -> TestResult {
        self.handle.send(msg).await.map_err(|_| "RRC task is gone")?;
        Ok(())
    }

    async fn uplink(&self, rnti: Rnti, channel: RrcChannel, data: Vec<u8>) -> TestResult {
        self.send(RrcMessage::UplinkRrc {
            rnti,
            channel,
            data: Bytes::from(data),
        })
        .await
    }

    /// Waits for the first output matching `pick` and returns what it
    /// extracted.
    async fn expect<T>(&self, pick: impl Fn(&RrcOutput) -> Option<T>) -> TestResult<T> {
        wait_for(
            || self.outputs.lock().unwrap().iter().find_map(&pick),
            DEFAULT_TEST_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
        )
        .await
    }

    fn clear(&self) {
        self.outputs.lock().unwrap().clear();
    }

    async fn stats(&self) -> TestResult<RegistryStats> {
        let (reply, rx) = oneshot::channel();
        self.send(RrcMessage::Stats { reply }).await?;
        Ok(rx.await?)
    }

    async fn stop(self) -> TestResult<RrcTask> {
        self.handle.shutdown().await.map_err(|_| "RRC task is gone")?;
        Ok(self.join.await?)
    }
}

fn downlink_ccch(rnti: Rnti) -> impl Fn(&RrcOutput) -> Option<DlCcchMessage> {
    move |output| match output {
        RrcOutput::Downlink {
            rnti: to,
            channel: RrcChannel::DlCcch,
            data,
        } if *to == rnti => decode_rrc::<DlCcchMessage>(data).ok(),
        _ => None,
    }
}

fn downlink_dcch(rnti: Rnti) -> impl Fn(&RrcOutput) -> Option<DlDcchMessage> {
    move |output| match output {
        RrcOutput::Downlink {
            rnti: to,
            channel: RrcChannel::DlDcch,
            data,
        } if *to == rnti => decode_rrc::<DlDcchMessage>(data).ok(),
        _ => None,
    }
}

async fn connect(gnb: &RunningGnb, m_tmsi: u32) -> TestResult<Rnti> {
    gnb.clear();
    gnb.send(RrcMessage::RadioAttempt { cell_id: 1 }).await?;
    let rnti = gnb
        .expect(|output| match output {
            RrcOutput::UeAdded { rnti, cell_id: 1 } => Some(*rnti),
            _ => None,
        })
        .await?;

    gnb.uplink(rnti, RrcChannel::UlCcch, connection_request(m_tmsi, false)).await?;
    let setup = match gnb.expect(downlink_ccch(rnti)).await? {
        DlCcchMessage::RrcSetup(setup) => setup,
        other => return Err(format!("expected RRCSetup, got {other:?}").into()),
    };

    gnb.uplink(rnti, RrcChannel::UlDcch, setup_complete(setup.rrc_transaction_id, None))
        .await?;
    let reconfiguration = match gnb.expect(downlink_dcch(rnti)).await? {
        DlDcchMessage::RrcReconfiguration(reconf) => reconf,
        other => return Err(format!("expected RRCReconfiguration, got {other:?}").into()),
    };
    gnb.uplink(
        rnti,
        RrcChannel::UlDcch,
        reconfiguration_complete(reconfiguration.rrc_transaction_id),
    )
    .await?;
    Ok(rnti)
}

#[tokio::test(start_paused = true)]
async fn test_connection_and_release_through_task() -> TestResult {
    init_test_logging();
    let gnb = RunningGnb::start(single_cell_config());

    let rnti = connect(&gnb, 7).await?;
    let stats = gnb.stats().await?;
    assert_eq!(stats.live, 1);
    assert_eq!(stats.per_state.get(&RrcState::ConnectedNormally), Some(&1));

    gnb.send(RrcMessage::TriggerRelease { rnti }).await?;
    let release = gnb
        .expect(|output| match downlink_dcch(rnti)(output) {
            Some(DlDcchMessage::RrcRelease(release)) => Some(release),
            _ => None,
        })
        .await?;
    assert!(release.suspend_config.is_none());
    gnb.expect(|output| match output {
        RrcOutput::UeRemoved { rnti: removed } if *removed == rnti => Some(()),
        _ => None,
    })
    .await?;

    let stats = gnb.stats().await?;
    assert_eq!((stats.created, stats.removed, stats.live), (1, 1, 0));

    let task = gnb.stop().await?;
    assert_eq!(task.state(), TaskState::Stopped);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_bad_input_does_not_stop_task() -> TestResult {
    init_test_logging();
    let gnb = RunningGnb::start(single_cell_config());
    let rnti = connect(&gnb, 9).await?;

    gnb.uplink(rnti, RrcChannel::UlDcch, vec![0xff, 0xff, 0xff]).await?;
    gnb.uplink(Rnti::new(0x7777).ok_or("bad RNTI")?, RrcChannel::UlCcch, connection_request(1, false))
        .await?;
    gnb.send(RrcMessage::RadioAttempt { cell_id: 42 }).await?;
    gnb.send(RrcMessage::DataArrival {
        rnti,
        drb_id: 3,
        data: Bytes::from_static(b"nowhere"),
    })
    .await?;

    let stats = gnb.stats().await?;
    assert_eq!(stats.live, 1);
    assert_eq!(stats.per_state.get(&RrcState::ConnectedNormally), Some(&1));

    let task = gnb.stop().await?;
    assert_eq!(task.registry().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_task_fires_registry_timers() -> TestResult {
    init_test_logging();
    let gnb = RunningGnb::start(single_cell_config());

    gnb.send(RrcMessage::RadioAttempt { cell_id: 1 }).await?;
    let rnti = gnb
        .expect(|output| match output {
            RrcOutput::UeAdded { rnti, .. } => Some(*rnti),
            _ => None,
        })
        .await?;
    gnb.uplink(rnti, RrcChannel::UlCcch, connection_request(5, false)).await?;
    gnb.expect(downlink_ccch(rnti)).await?;

    // no setup complete follows
    gnb.expect(|output| match output {
        RrcOutput::UeRemoved { rnti: removed } if *removed == rnti => Some(()),
        _ => None,
    })
    .await?;
    assert_eq!(gnb.stats().await?.live, 0);

    drop(gnb.stop().await?);
    Ok(())
}

#[test]
fn test_task_message_envelope() {
    let msg = TaskMessage::message(RrcMessage::RadioAttempt { cell_id: 1 });
    assert!(!msg.is_shutdown());
    assert!(matches!(
        msg.into_message(),
        Some(RrcMessage::RadioAttempt { cell_id: 1 })
    ));
    assert!(TaskMessage::<RrcMessage>::shutdown().is_shutdown());
}
