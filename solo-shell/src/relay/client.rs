//! Secondary side of the relay: hand the launch over and wait for the reply

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use solo_protocol::{ClientCodec, Command, Response, MAX_START_URL_CHARS};
use solo_utils::{Result, SoloError};

use crate::collaborators::ProcessActivator;

/// Commands describing what this launch wanted to do
///
/// Every path becomes a `SEND:`; a start URL becomes a closing `OPEN:`,
/// otherwise the primary is simply asked to show itself.
pub fn build_intent(send_paths: &[String], start_url: Option<&str>) -> Vec<Command> {
    let mut intent: Vec<Command> = send_paths.iter().cloned().map(Command::Send).collect();
    match start_url.filter(|url| !url.is_empty()) {
        Some(url) => intent.push(Command::Open(url.chars().take(MAX_START_URL_CHARS).collect())),
        None => intent.push(Command::Show),
    }
    intent
}

/// Connection from a secondary launch to the primary
pub struct SecondaryClient<S> {
    framed: Framed<S, ClientCodec>,
    timeout: Option<Duration>,
}

impl<S> SecondaryClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream; `timeout` of `None` waits forever
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            framed: Framed::new(stream, ClientCodec::new()),
            timeout,
        }
    }

    /// Send `intent` in one write, then wait for the primary's reply
    pub async fn run(mut self, intent: Vec<Command>, activator: &dyn ProcessActivator) -> Result<Response> {
        for command in intent {
            debug!("Relaying {}", command);
            self.framed
                .feed(command)
                .await
                .map_err(|e| SoloError::protocol(e.to_string()))?;
        }
        self.framed
            .flush()
            .await
            .map_err(|e| SoloError::connection(format!("failed to write commands: {}", e)))?;
        info!("Commands written, waiting for response...");

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.framed.next())
                .await
                .map_err(|_| SoloError::ResponseTimeout {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })?,
            None => self.framed.next().await,
        };

        let response = match response {
            Some(Ok(response)) => response,
            Some(Err(e)) => return Err(SoloError::protocol(e.to_string())),
            None => return Err(SoloError::ConnectionClosed),
        };

        if response.requires_activation() {
            info!("Response received, pid = {}, activating and quitting", response.pid);
            activator.activate_process(response.pid);
        } else {
            info!("Response received, nothing to activate, quitting");
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct RecordingActivator {
        pids: RefCell<Vec<u64>>,
    }

    impl ProcessActivator for RecordingActivator {
        fn activate_process(&self, pid: u64) {
            self.pids.borrow_mut().push(pid);
        }
    }

    #[test]
    fn test_intent_without_url_shows() {
        let intent = build_intent(&["/a".into(), "/b".into()], None);
        assert_eq!(
            intent,
            vec![
                Command::Send("/a".into()),
                Command::Send("/b".into()),
                Command::Show
            ]
        );
    }

    #[test]
    fn test_intent_with_url_opens() {
        let intent = build_intent(&[], Some("tg://x"));
        assert_eq!(intent, vec![Command::Open("tg://x".into())]);
        assert_eq!(build_intent(&[], Some("")), vec![Command::Show]);
    }

    #[test]
    fn test_intent_truncates_long_url() {
        let url = "é".repeat(MAX_START_URL_CHARS + 10);
        match &build_intent(&[], Some(&url))[0] {
            Command::Open(sent) => assert_eq!(sent.chars().count(), MAX_START_URL_CHARS),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_activates_returned_pid() {
        let (client, mut server) = tokio::io::duplex(1024);
        let primary = tokio::spawn(async move {
            let mut buf = vec![0u8; 64];
            let n = server.read(&mut buf).await.unwrap();
            server.write_all(b"RES:4321;").await.unwrap();
            buf.truncate(n);
            buf
        });

        let activator = RecordingActivator::default();
        let response = SecondaryClient::new(client, Some(Duration::from_secs(5)))
            .run(vec![Command::Show], &activator)
            .await
            .unwrap();

        assert_eq!(response.pid, 4321);
        assert_eq!(*activator.pids.borrow(), vec![4321]);
        assert_eq!(primary.await.unwrap(), b"CMD:show;");
    }

    #[tokio::test]
    async fn test_sentinel_skips_activation() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"RES:0;").await.unwrap();

        let activator = RecordingActivator::default();
        let response = SecondaryClient::new(client, None)
            .run(build_intent(&[], Some("tg://x")), &activator)
            .await
            .unwrap();

        assert!(!response.requires_activation());
        assert!(activator.pids.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_eof_before_response_is_fatal() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);

        let result = SecondaryClient::new(client, None)
            .run(vec![Command::Show], &RecordingActivator::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_silent_primary_times_out() {
        let (client, _server) = tokio::io::duplex(1024);

        let result = SecondaryClient::new(client, Some(Duration::from_millis(50)))
            .run(vec![Command::Show], &RecordingActivator::default())
            .await;
        assert!(matches!(result, Err(SoloError::ResponseTimeout { millis: 50 })));
    }
}
