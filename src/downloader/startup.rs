use crate::downloader::coordinator::{DownloadCoordinator, DownloadRequest};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{info, warn};

/// Holds download requests that arrive before the engine has restored its
/// durable state. Bounded so a misbehaving caller cannot grow it without
/// limit; overflow is rejected, not silently dropped.
pub struct StartupQueue {
    capacity: usize,
    buffer: Mutex<VecDeque<DownloadRequest>>,
}

impl StartupQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Buffers one request. Returns `false` when the queue is full.
    pub fn push(&self, request: DownloadRequest) -> bool {
        let mut buffer = match self.buffer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if buffer.len() >= self.capacity {
            warn!(
                item_id = %request.item_id,
                capacity = self.capacity,
                "Startup queue full, request rejected"
            );
            return false;
        }

        buffer.push_back(request);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.buffer.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replays every buffered request through the coordinator in arrival
    /// order. Failures are logged per request and do not stop the drain.
    pub async fn drain(&self, coordinator: &DownloadCoordinator) -> usize {
        let requests: Vec<DownloadRequest> = {
            let mut buffer = match self.buffer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            buffer.drain(..).collect()
        };

        if requests.is_empty() {
            return 0;
        }

        info!(buffered = requests.len(), "Draining startup download queue");

        let mut admitted = 0;
        for request in requests {
            match coordinator.start_download(&request).await {
                Ok(count) => admitted += count,
                Err(e) => {
                    warn!(item_id = %request.item_id, error = %e, "Buffered download failed");
                }
            }
        }

        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_capacity() {
        let queue = StartupQueue::new(2);
        assert!(queue.push(DownloadRequest::new("a")));
        assert!(queue.push(DownloadRequest::new("b")));
        assert!(!queue.push(DownloadRequest::new("c")));
        assert_eq!(queue.len(), 2);
    }
}
