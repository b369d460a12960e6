use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ChatService, FetchOutcome};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    ChatsChanged { count: usize },
}

/// Background refresh of the chat list. Each tick is a silent fetch; only
/// changes are reported.
pub struct ChatPoller {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ChatPoller {
    /// The first tick fires one `period` from now; callers fetch once
    /// themselves before starting the poller.
    pub fn spawn(service: ChatService, period: Duration) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Ok(FetchOutcome::Changed(count)) = service.fetch_chats(true).await {
                            if tx.send(PollEvent::ChatsChanged { count }).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            debug!("Chat poller stopped");
        });

        (
            Self {
                cancel,
                handle: Some(handle),
            },
            rx,
        )
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ChatPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{sample_chat, FakeBackend, StaticCredentials};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn reports_changed_list_and_stops() {
        let backend = FakeBackend::new();
        backend.push_chat_list(vec![sample_chat("a", &[])]);
        backend.push_chat_list(vec![sample_chat("b", &[]), sample_chat("a", &[])]);
        let service = ChatService::new(
            backend.clone(),
            Arc::new(StaticCredentials(Some("t".to_string()))),
        );
        service.fetch_chats(false).await.unwrap();

        let (poller, mut events) = ChatPoller::spawn(service.clone(), Duration::from_millis(10));
        let event = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("poll event should arrive")
            .expect("channel open");

        assert_eq!(event, PollEvent::ChatsChanged { count: 2 });
        assert_eq!(service.snapshot().chats()[0].chat_id, "b");
        poller.stop().await;
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn unchanged_lists_stay_quiet() {
        let backend = FakeBackend::new();
        backend.push_chat_list(vec![sample_chat("a", &[])]);
        let service = ChatService::new(
            backend.clone(),
            Arc::new(StaticCredentials(Some("t".to_string()))),
        );
        service.fetch_chats(false).await.unwrap();

        let (poller, mut events) = ChatPoller::spawn(service, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(events.try_recv().is_err());
        assert!(backend.list_calls.load(Ordering::SeqCst) >= 2);
        poller.stop().await;
    }
}
