//! Progress observers
//!
//! The orchestrator calls [`ProgressObserver::notify`] after every state
//! transition. Observers must return immediately: the call sits on the
//! research task itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::session::ResearchSession;
use super::stage::ResearchStage;

/// Read-only view of a session at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub query: String,
    pub stage: ResearchStage,
    pub status: String,
    pub current_round: usize,
    pub depth: usize,
    pub breadth: usize,
    pub subqueries_count: usize,
    /// Discovery events so far, duplicates included
    pub sources_discovered: usize,
    pub ledger_entries: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub last_thought: Option<String>,
}

impl SessionSnapshot {
    pub fn capture(session: &ResearchSession) -> Self {
        Self {
            session_id: session.id,
            query: session.query.clone(),
            stage: session.stage,
            status: session.status.clone(),
            current_round: session.current_round,
            depth: session.depth,
            breadth: session.breadth,
            subqueries_count: session.subqueries.len(),
            sources_discovered: session.sources.len(),
            ledger_entries: session.ledger.len(),
            elapsed: session.elapsed(),
            last_thought: session.trace.last().map(|e| e.message.clone()),
        }
    }
}

/// Receives a snapshot after each transition. Must never block.
pub trait ProgressObserver: Send + Sync {
    fn notify(&self, snapshot: &SessionSnapshot);
}

/// Logs each snapshot through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn notify(&self, snapshot: &SessionSnapshot) {
        info!(
            stage = %snapshot.stage,
            round = snapshot.current_round,
            depth = snapshot.depth,
            subqueries = snapshot.subqueries_count,
            sources = snapshot.sources_discovered,
            "{}",
            snapshot.status
        );
    }
}

/// Forwards snapshots into a bounded channel, dropping them when it is full
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<SessionSnapshot>,
}

impl ChannelObserver {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn notify(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.tx.try_send(snapshot.clone()) {
            debug!(error = %e, "Progress snapshot dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture() {
        let mut session = ResearchSession::new("q", 2, 3);
        session.log("Created research plan");
        session.enter(ResearchStage::GeneratingQueries);

        let snap = SessionSnapshot::capture(&session);
        assert_eq!(snap.stage, ResearchStage::GeneratingQueries);
        assert_eq!(snap.status, "Generating research queries");
        assert_eq!(snap.depth, 2);
        assert_eq!(snap.breadth, 3);
        assert_eq!(snap.last_thought.as_deref(), Some("Created research plan"));
    }

    #[tokio::test]
    async fn test_channel_observer_drops_when_full() {
        let (observer, mut rx) = ChannelObserver::channel(1);
        let snap = SessionSnapshot::capture(&ResearchSession::new("q", 1, 1));

        observer.notify(&snap);
        observer.notify(&snap);

        assert_eq!(rx.recv().await, Some(snap));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_closed_receiver() {
        let (observer, rx) = ChannelObserver::channel(4);
        drop(rx);
        observer.notify(&SessionSnapshot::capture(&ResearchSession::new("q", 1, 1)));
    }
}
