//! Per-host purge queue
//!
//! A backlog of zero means the queue is unbounded. Pushing never waits: a
//! full queue rejects the request immediately.

use tokio::sync::mpsc;

use crate::host::PurgeRequest;

/// Why a request could not be queued
#[derive(Debug)]
pub enum EnqueueError {
    /// The queue already holds `backlog` requests
    Full(PurgeRequest),
    /// The worker consuming the queue has terminated
    Closed(PurgeRequest),
}

#[derive(Debug, Clone)]
enum Sender {
    Bounded(mpsc::Sender<PurgeRequest>),
    Unbounded(mpsc::UnboundedSender<PurgeRequest>),
}

/// Producer side of a host's queue, shared by every caller
#[derive(Debug, Clone)]
pub struct HostQueue {
    sender: Sender,
}

/// Consumer side of a host's queue, owned by exactly one worker
#[derive(Debug)]
pub(crate) enum QueueReceiver {
    Bounded(mpsc::Receiver<PurgeRequest>),
    Unbounded(mpsc::UnboundedReceiver<PurgeRequest>),
}

impl HostQueue {
    /// Create a queue holding at most `backlog` requests (0 = unbounded)
    pub(crate) fn channel(backlog: usize) -> (HostQueue, QueueReceiver) {
        if backlog == 0 {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                HostQueue {
                    sender: Sender::Unbounded(tx),
                },
                QueueReceiver::Unbounded(rx),
            )
        } else {
            let (tx, rx) = mpsc::channel(backlog);
            (
                HostQueue {
                    sender: Sender::Bounded(tx),
                },
                QueueReceiver::Bounded(rx),
            )
        }
    }

    /// Push without waiting
    pub fn try_push(&self, request: PurgeRequest) -> Result<(), EnqueueError> {
        match &self.sender {
            Sender::Bounded(tx) => tx.try_send(request).map_err(|e| match e {
                mpsc::error::TrySendError::Full(r) => EnqueueError::Full(r),
                mpsc::error::TrySendError::Closed(r) => EnqueueError::Closed(r),
            }),
            Sender::Unbounded(tx) => tx
                .send(request)
                .map_err(|mpsc::error::SendError(r)| EnqueueError::Closed(r)),
        }
    }

    /// Maximum number of pending requests, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        match &self.sender {
            Sender::Bounded(tx) => Some(tx.max_capacity()),
            Sender::Unbounded(_) => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.sender {
            Sender::Bounded(tx) => tx.is_closed(),
            Sender::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl QueueReceiver {
    /// Wait for the next request; `None` once every producer is gone
    pub(crate) async fn recv(&mut self) -> Option<PurgeRequest> {
        match self {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_queue_rejects_when_full() {
        let (queue, _rx) = HostQueue::channel(1);
        assert_eq!(queue.capacity(), Some(1));

        assert!(queue.try_push(PurgeRequest::new("http://a/1", "PURGE")).is_ok());
        match queue.try_push(PurgeRequest::new("http://a/2", "PURGE")) {
            Err(EnqueueError::Full(request)) => assert_eq!(request.url, "http://a/2"),
            other => panic!("expected full queue, got {:?}", other),
        }
    }

    #[test]
    fn test_unbounded_queue() {
        let (queue, _rx) = HostQueue::channel(0);
        assert_eq!(queue.capacity(), None);

        for i in 0..1000 {
            assert!(queue.try_push(PurgeRequest::new(format!("http://a/{}", i), "PURGE")).is_ok());
        }
    }

    #[test]
    fn test_closed_queue() {
        let (queue, rx) = HostQueue::channel(4);
        drop(rx);

        assert!(queue.is_closed());
        assert!(matches!(
            queue.try_push(PurgeRequest::new("http://a/1", "PURGE")),
            Err(EnqueueError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut rx) = HostQueue::channel(0);
        for i in 0..5 {
            queue.try_push(PurgeRequest::new(format!("http://a/{}", i), "PURGE")).unwrap();
        }

        for i in 0..5 {
            let request = rx.recv().await.unwrap();
            assert_eq!(request.url, format!("http://a/{}", i));
        }
    }
}
