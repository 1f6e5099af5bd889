//! Lockstep progress reporting.
//!
//! The producer reports every K processed units and then stops until the
//! client acknowledges. No work happens while a report is unacknowledged, so
//! the producer can never run more than K units ahead of the client.
//!
//! ```text
//! Idle -> Running -> AwaitingAck -> Running -> ... -> Completed
//!            \______________\_____________________-> Aborted
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use emolysis_models::{ProgressMessage, ProgressToken, ResultPaths, Stage};

use crate::error::{WorkerError, WorkerResult};

/// Carries messages to the client and acknowledgments back.
#[async_trait]
pub trait ProgressTransport: Send {
    async fn send(&mut self, message: &ProgressMessage) -> WorkerResult<()>;

    /// Wait for the next acknowledgment; `Disconnected` when the peer is gone.
    async fn recv_ack(&mut self) -> WorkerResult<()>;

    /// Drop acknowledgments that are already queued and return how many.
    ///
    /// Called before every send so an early or duplicate ack can never stand
    /// in for the answer to a message the client has not seen yet.
    fn discard_pending_acks(&mut self) -> usize {
        0
    }
}

#[async_trait]
impl<T: ProgressTransport + ?Sized> ProgressTransport for &mut T {
    async fn send(&mut self, message: &ProgressMessage) -> WorkerResult<()> {
        (**self).send(message).await
    }

    async fn recv_ack(&mut self) -> WorkerResult<()> {
        (**self).recv_ack().await
    }

    fn discard_pending_acks(&mut self) -> usize {
        (**self).discard_pending_acks()
    }
}

/// Transport over a pair of channels, bridged to a socket elsewhere.
pub struct ChannelTransport {
    outbound: mpsc::Sender<ProgressMessage>,
    acks: mpsc::Receiver<String>,
}

/// Client side of a [`ChannelTransport`].
pub struct ClientEnd {
    pub messages: mpsc::Receiver<ProgressMessage>,
    pub acks: mpsc::Sender<String>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::Sender<ProgressMessage>, acks: mpsc::Receiver<String>) -> Self {
        Self { outbound, acks }
    }

    /// Connected transport/client pair with `buffer` slots each way.
    pub fn pair(buffer: usize) -> (Self, ClientEnd) {
        let (msg_tx, msg_rx) = mpsc::channel(buffer);
        let (ack_tx, ack_rx) = mpsc::channel(buffer);
        (
            Self::new(msg_tx, ack_rx),
            ClientEnd {
                messages: msg_rx,
                acks: ack_tx,
            },
        )
    }
}

#[async_trait]
impl ProgressTransport for ChannelTransport {
    async fn send(&mut self, message: &ProgressMessage) -> WorkerResult<()> {
        self.outbound
            .send(message.clone())
            .await
            .map_err(|_| WorkerError::Disconnected)
    }

    async fn recv_ack(&mut self) -> WorkerResult<()> {
        self.acks
            .recv()
            .await
            .map(|_| ())
            .ok_or(WorkerError::Disconnected)
    }

    fn discard_pending_acks(&mut self) -> usize {
        let mut discarded = 0;
        // A closed channel is left for `recv_ack` to report.
        while self.acks.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Transport that acknowledges everything immediately and logs the traffic.
///
/// Used for offline runs where nobody is on the other end.
#[derive(Debug, Default)]
pub struct AutoAckTransport {
    sent: Vec<ProgressMessage>,
}

impl AutoAckTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ProgressMessage] {
        &self.sent
    }
}

#[async_trait]
impl ProgressTransport for AutoAckTransport {
    async fn send(&mut self, message: &ProgressMessage) -> WorkerResult<()> {
        info!(status = %message.status, "{}", serde_json::to_string(&message.data).unwrap_or_default());
        self.sent.push(message.clone());
        Ok(())
    }

    async fn recv_ack(&mut self) -> WorkerResult<()> {
        Ok(())
    }
}

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Idle,
    Running,
    AwaitingAck,
    Completed,
    Aborted,
}

impl ProtocolState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolState::Completed | ProtocolState::Aborted)
    }
}

/// Counts processed units of one stage and decides when to report.
#[derive(Debug, Clone)]
pub struct StageCursor {
    stage: Stage,
    step: u64,
    total: Option<u64>,
    processed: u64,
}

impl StageCursor {
    /// `step` of 0 is treated as 1.
    pub fn new(stage: Stage, step: u64, total: Option<u64>) -> Self {
        Self {
            stage,
            step: step.max(1),
            total,
            processed: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Record one processed unit; returns a token every `step` units.
    pub fn advance(&mut self) -> Option<ProgressToken> {
        self.processed += 1;
        (self.processed % self.step == 0).then(|| ProgressToken {
            current: self.processed - 1,
            total: self.total,
        })
    }
}

/// Producer side of the progress channel.
pub struct ProgressProtocol<T: ProgressTransport> {
    transport: T,
    state: ProtocolState,
    ack_timeout: Duration,
    peer_gone: bool,
    messages_sent: u64,
}

impl<T: ProgressTransport> ProgressProtocol<T> {
    pub fn new(transport: T, ack_timeout: Duration) -> Self {
        Self {
            transport,
            state: ProtocolState::Idle,
            ack_timeout,
            peer_gone: false,
            messages_sent: 0,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send an announcement and wait for its acknowledgment.
    pub async fn announce(&mut self, message: ProgressMessage) -> WorkerResult<()> {
        self.exchange(message).await
    }

    /// Record one processed unit, reporting and blocking every K units.
    pub async fn advance(&mut self, cursor: &mut StageCursor) -> WorkerResult<()> {
        self.ensure_active()?;
        match cursor.advance() {
            Some(token) => {
                self.exchange(ProgressMessage::progress(cursor.stage(), token))
                    .await
            }
            None => Ok(()),
        }
    }

    /// Send the final `done` message. No acknowledgment is expected.
    pub async fn finish(&mut self, paths: ResultPaths) -> WorkerResult<()> {
        self.ensure_active()?;
        let message = ProgressMessage::done(paths);
        if let Err(e) = self.transport.send(&message).await {
            return Err(self.fail(e));
        }
        self.messages_sent += 1;
        self.state = ProtocolState::Completed;
        Ok(())
    }

    /// Tell the client (if still there) why the session stops.
    pub async fn abort(&mut self, reason: &str) {
        if self.state == ProtocolState::Completed {
            return;
        }
        self.state = ProtocolState::Aborted;
        if self.peer_gone {
            debug!("Client gone, not sending error message");
            return;
        }
        if let Err(e) = self.transport.send(&ProgressMessage::error(reason)).await {
            warn!("Failed to deliver error message: {}", e);
        } else {
            self.messages_sent += 1;
        }
    }

    async fn exchange(&mut self, message: ProgressMessage) -> WorkerResult<()> {
        self.ensure_active()?;
        let stale = self.transport.discard_pending_acks();
        if stale > 0 {
            warn!(stale, status = %message.status, "Discarding acknowledgments sent ahead of the message");
        }
        if let Err(e) = self.transport.send(&message).await {
            return Err(self.fail(e));
        }
        self.messages_sent += 1;

        if !message.expects_ack() {
            self.state = ProtocolState::Running;
            return Ok(());
        }

        self.state = ProtocolState::AwaitingAck;
        match tokio::time::timeout(self.ack_timeout, self.transport.recv_ack()).await {
            Ok(Ok(())) => {
                self.state = ProtocolState::Running;
                Ok(())
            }
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => Err(self.fail(WorkerError::AckTimeout(self.ack_timeout))),
        }
    }

    fn ensure_active(&self) -> WorkerResult<()> {
        if self.state.is_terminal() {
            return Err(WorkerError::protocol(format!(
                "session already {:?}",
                self.state
            )));
        }
        if self.state == ProtocolState::AwaitingAck {
            return Err(WorkerError::protocol("previous report not acknowledged"));
        }
        Ok(())
    }

    fn fail(&mut self, error: WorkerError) -> WorkerError {
        self.state = ProtocolState::Aborted;
        if error.is_disconnect() {
            self.peer_gone = true;
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emolysis_models::{MessageData, SessionId};
    use tokio_test::{assert_err, assert_ok};

    fn paths() -> ResultPaths {
        ResultPaths {
            id: SessionId(1),
            audio: "data/1/audio.csv".to_string(),
            text: "data/1/text.csv".to_string(),
            visual: "data/1/faces.csv".to_string(),
        }
    }

    #[test]
    fn test_cursor_reports_every_step() {
        let mut cursor = StageCursor::new(Stage::Audio, 10, Some(25));
        let tokens: Vec<ProgressToken> = (0..25).filter_map(|_| cursor.advance()).collect();
        assert_eq!(
            tokens,
            vec![
                ProgressToken {
                    current: 9,
                    total: Some(25)
                },
                ProgressToken {
                    current: 19,
                    total: Some(25)
                },
            ]
        );
        assert_eq!(cursor.processed(), 25);
    }

    #[tokio::test]
    async fn test_lifecycle_with_auto_ack() {
        let mut protocol = ProgressProtocol::new(AutoAckTransport::new(), Duration::from_secs(1));
        assert_eq!(protocol.state(), ProtocolState::Idle);

        assert_ok!(protocol.announce(ProgressMessage::uploaded()).await);
        assert_eq!(protocol.state(), ProtocolState::Running);

        let mut cursor = StageCursor::new(Stage::Text, 2, None);
        for _ in 0..5 {
            assert_ok!(protocol.advance(&mut cursor).await);
        }
        assert_ok!(protocol.finish(paths()).await);
        assert_eq!(protocol.state(), ProtocolState::Completed);

        let statuses: Vec<String> = protocol
            .into_transport()
            .messages()
            .iter()
            .map(|m| m.status.clone())
            .collect();
        assert_eq!(statuses, vec!["uploaded", "text", "text", "done"]);
    }

    #[tokio::test]
    async fn test_blocks_until_ack() {
        let (transport, mut client) = ChannelTransport::pair(4);
        let mut protocol = ProgressProtocol::new(transport, Duration::from_secs(5));

        let task = tokio::spawn(async move {
            protocol.announce(ProgressMessage::uploaded()).await?;
            Ok::<_, WorkerError>(protocol)
        });

        let msg = client.messages.recv().await.unwrap();
        assert_eq!(msg.status, "uploaded");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        client.acks.send("ok".to_string()).await.unwrap();
        let protocol = task.await.unwrap().unwrap();
        assert_eq!(protocol.state(), ProtocolState::Running);
    }

    #[tokio::test]
    async fn test_early_acks_do_not_release_units() {
        let (transport, mut client) = ChannelTransport::pair(4);
        for _ in 0..3 {
            client.acks.send("ok".to_string()).await.unwrap();
        }

        let task = tokio::spawn(async move {
            let mut protocol = ProgressProtocol::new(transport, Duration::from_secs(5));
            let mut cursor = StageCursor::new(Stage::Audio, 10, Some(30));
            for _ in 0..30 {
                protocol.advance(&mut cursor).await?;
            }
            Ok::<_, WorkerError>(protocol)
        });

        for expected in [9, 19, 29] {
            let msg = client.messages.recv().await.unwrap();
            assert!(matches!(
                msg.data,
                MessageData::Progress(ProgressToken { current, .. }) if current == expected
            ));
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!task.is_finished());
            assert!(client.messages.try_recv().is_err());
            client.acks.send("ok".to_string()).await.unwrap();
        }

        let protocol = task.await.unwrap().unwrap();
        assert_eq!(protocol.messages_sent(), 3);
        assert_eq!(protocol.state(), ProtocolState::Running);
    }

    #[tokio::test]
    async fn test_duplicate_ack_is_not_carried_forward() {
        let (transport, mut client) = ChannelTransport::pair(4);
        let task = tokio::spawn(async move {
            let mut protocol = ProgressProtocol::new(transport, Duration::from_secs(5));
            protocol.announce(ProgressMessage::uploaded()).await?;
            protocol
                .announce(ProgressMessage::stage_done(Stage::Transcription))
                .await?;
            Ok::<_, WorkerError>(protocol)
        });

        assert_eq!(client.messages.recv().await.unwrap().status, "uploaded");
        client.acks.try_send("ok".to_string()).unwrap();
        client.acks.try_send("ok again".to_string()).unwrap();

        assert_eq!(
            client.messages.recv().await.unwrap().status,
            "transcription done"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        client.acks.send("ok".to_string()).await.unwrap();
        let protocol = task.await.unwrap().unwrap();
        assert_eq!(protocol.messages_sent(), 2);
    }

    #[test]
    fn test_discard_pending_acks_counts_queue() {
        let (mut transport, client) = ChannelTransport::pair(4);
        client.acks.try_send("a".to_string()).unwrap();
        client.acks.try_send("b".to_string()).unwrap();
        assert_eq!(transport.discard_pending_acks(), 2);
        assert_eq!(transport.discard_pending_acks(), 0);
    }

    #[tokio::test]
    async fn test_ack_timeout_aborts() {
        let (transport, mut client) = ChannelTransport::pair(4);
        let mut protocol = ProgressProtocol::new(transport, Duration::from_millis(30));

        let err = assert_err!(protocol.announce(ProgressMessage::uploaded()).await);
        assert!(matches!(err, WorkerError::AckTimeout(_)));
        assert_eq!(protocol.state(), ProtocolState::Aborted);

        // The client is still connected, so it hears why.
        protocol.abort(&err.to_string()).await;
        let _uploaded = client.messages.recv().await.unwrap();
        let error = client.messages.recv().await.unwrap();
        assert_eq!(error.status, "error");
        assert!(matches!(error.data, MessageData::Error { .. }));

        // Nothing else can be sent afterwards.
        assert!(matches!(
            protocol.finish(paths()).await,
            Err(WorkerError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_aborts_without_error_message() {
        let (transport, client) = ChannelTransport::pair(4);
        let mut protocol = ProgressProtocol::new(transport, Duration::from_secs(5));
        drop(client);

        let err = protocol
            .announce(ProgressMessage::uploaded())
            .await
            .unwrap_err();
        assert!(err.is_disconnect());
        protocol.abort("client left").await;
        assert_eq!(protocol.state(), ProtocolState::Aborted);
        assert_eq!(protocol.messages_sent(), 0);
    }

    #[tokio::test]
    async fn test_done_does_not_wait() {
        let (transport, mut client) = ChannelTransport::pair(4);
        let mut protocol = ProgressProtocol::new(transport, Duration::from_secs(5));
        protocol.finish(paths()).await.unwrap();
        assert_eq!(protocol.state(), ProtocolState::Completed);
        assert_eq!(client.messages.recv().await.unwrap().status, "done");
    }
}
