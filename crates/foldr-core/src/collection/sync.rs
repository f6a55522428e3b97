//! Serialized application of external changes to one collection.
//!
//! Watchers and live search results report changes from arbitrary threads.
//! A [`ChangeSynchronizer`] queues each report as a job and a single tokio
//! task applies the jobs one at a time, in arrival order.

use std::path::PathBuf;
use std::sync::Weak;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::CoreResult;
use crate::event::FsChange;

/// Something that accepts filesystem changes, one at a time.
#[async_trait]
pub trait ChangeTarget: Send + Sync {
    async fn apply_change(&self, change: FsChange) -> CoreResult<()>;
}

/// Cheap, cloneable handle that enqueues change jobs.
///
/// The worker stops once every handle is dropped or the target is gone.
#[derive(Debug, Clone)]
pub struct ChangeSynchronizer {
    jobs: mpsc::UnboundedSender<FsChange>,
}

impl ChangeSynchronizer {
    /// Starts the worker for `target` on the current tokio runtime.
    pub fn spawn(target: Weak<dyn ChangeTarget>) -> (Self, JoinHandle<()>) {
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = tokio::spawn(drain(target, queue));
        (Self { jobs }, worker)
    }

    pub fn request_create(&self, path: PathBuf) {
        self.request(FsChange::Created(path));
    }

    pub fn request_delete(&self, path: PathBuf) {
        self.request(FsChange::Deleted(path));
    }

    pub fn request_rename(&self, from: PathBuf, to: PathBuf) {
        self.request(FsChange::Renamed { from, to });
    }

    /// Enqueues `change`. Callable from any thread.
    pub fn request(&self, change: FsChange) {
        if let Err(e) = self.jobs.send(change) {
            tracing::debug!("synchronizer stopped, dropping {:?}", e.0);
        }
    }
}

async fn drain(target: Weak<dyn ChangeTarget>, mut queue: mpsc::UnboundedReceiver<FsChange>) {
    while let Some(job) = queue.recv().await {
        let Some(target) = target.upgrade() else {
            break;
        };
        let description = format!("{job:?}");
        if let Err(e) = target.apply_change(job).await {
            tracing::warn!("change {description} not applied: {e}");
        }
    }
    tracing::debug!("synchronizer worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<FsChange>>,
    }

    #[async_trait]
    impl ChangeTarget for Recorder {
        async fn apply_change(&self, change: FsChange) -> CoreResult<()> {
            if let FsChange::Deleted(path) = &change {
                if path.ends_with("bad") {
                    return Err(CoreError::NotFound(path.clone()));
                }
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.applied.lock().unwrap().push(change);
            Ok(())
        }
    }

    async fn settle(recorder: &Recorder, expected: usize) {
        for _ in 0..200 {
            if recorder.applied.lock().unwrap().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn jobs_apply_in_arrival_order() {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn ChangeTarget> = recorder.clone();
        let (sync, _worker) = ChangeSynchronizer::spawn(Arc::downgrade(&target));

        sync.request_create(PathBuf::from("/d/a"));
        sync.request_rename(PathBuf::from("/d/a"), PathBuf::from("/d/b"));
        sync.request_delete(PathBuf::from("/d/b"));
        settle(&recorder, 3).await;

        assert_eq!(
            *recorder.applied.lock().unwrap(),
            vec![
                FsChange::Created(PathBuf::from("/d/a")),
                FsChange::Renamed {
                    from: PathBuf::from("/d/a"),
                    to: PathBuf::from("/d/b"),
                },
                FsChange::Deleted(PathBuf::from("/d/b")),
            ]
        );
    }

    #[tokio::test]
    async fn failing_job_does_not_stop_worker() {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn ChangeTarget> = recorder.clone();
        let (sync, worker) = ChangeSynchronizer::spawn(Arc::downgrade(&target));

        sync.request_delete(PathBuf::from("/d/bad"));
        sync.request_create(PathBuf::from("/d/good"));
        settle(&recorder, 1).await;

        assert_eq!(
            *recorder.applied.lock().unwrap(),
            vec![FsChange::Created(PathBuf::from("/d/good"))]
        );
        assert!(!worker.is_finished());
    }

    #[tokio::test]
    async fn requests_from_other_threads_are_serialized() {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn ChangeTarget> = recorder.clone();
        let (sync, _worker) = ChangeSynchronizer::spawn(Arc::downgrade(&target));

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let sync = sync.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        sync.request_create(PathBuf::from(format!("/d/{t}-{i}")));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        settle(&recorder, 40).await;
        assert_eq!(recorder.applied.lock().unwrap().len(), 40);
    }

    #[tokio::test]
    async fn worker_stops_when_handles_drop() {
        let recorder = Arc::new(Recorder::default());
        let target: Arc<dyn ChangeTarget> = recorder.clone();
        let (sync, worker) = ChangeSynchronizer::spawn(Arc::downgrade(&target));
        drop(sync);
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
    }
}
