use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{GroupSnapshot, GroupSource};

pub const DEFAULT_SYNC_WINDOW: Duration = Duration::from_millis(150);

/// 成员同步器：收到结构变更后防抖，然后重新拉取整个群组状态。
///
/// 窗口内的多次请求合并为一次；拉取进行中到达的请求会在之后再触发
/// 恰好一次拉取。拉取失败只记日志。
pub struct MembershipSync {
    trigger: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl MembershipSync {
    pub fn spawn(
        source: Arc<dyn GroupSource>,
        group_id: i64,
        window: Duration,
        out: mpsc::Sender<GroupSnapshot>,
    ) -> Self {
        // 容量为 1：最多记住一个待处理请求
        let (trigger, mut requests) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            while requests.recv().await.is_some() {
                tokio::time::sleep(window).await;
                while requests.try_recv().is_ok() {}

                match source.snapshot(group_id).await {
                    Ok(snapshot) => {
                        if out.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Resync of group {} failed: {}", group_id, e);
                    }
                }
            }
            tracing::debug!("Membership sync for group {} stopped", group_id);
        });

        Self { trigger, task }
    }

    pub fn request(&self) {
        // 已有待处理请求时直接合并
        let _ = self.trigger.try_send(());
    }
}

impl Drop for MembershipSync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::client::ClientError;
    use crate::models::{Group, Member};

    struct CountingSource {
        fetches: AtomicUsize,
        latency: Duration,
        fail: bool,
    }

    impl CountingSource {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                latency,
                fail: false,
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GroupSource for CountingSource {
        async fn fetch_group(&self, group_id: i64) -> Result<Group, ClientError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) as i64;
            tokio::time::sleep(self.latency).await;
            if self.fail {
                return Err(ClientError::NotFound("Group not found".into()));
            }
            Ok(Group {
                id: group_id,
                group_name: "Office Commute".into(),
                start_location: "A".into(),
                end_location: "B".into(),
                total_cost: 0.0,
                time_range_start: None,
                time_range_end: None,
                number_of_members: n,
                created_at: Utc::now(),
            })
        }

        async fn fetch_members(&self, _group_id: i64) -> Result<Vec<Member>, ClientError> {
            Ok(Vec::new())
        }
    }

    async fn assert_quiet(rx: &mut mpsc::Receiver<GroupSnapshot>) {
        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(next.is_err(), "unexpected extra resync");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_requests_collapses_into_one_fetch() {
        let source = CountingSource::new(Duration::ZERO);
        let (tx, mut rx) = mpsc::channel(8);
        let sync = MembershipSync::spawn(source.clone(), 1, DEFAULT_SYNC_WINDOW, tx);

        for _ in 0..5 {
            sync.request();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.group.id, 1);
        assert_quiet(&mut rx).await;
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_fetch_triggers_exactly_one_more() {
        let source = CountingSource::new(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::channel(8);
        let sync = MembershipSync::spawn(source.clone(), 1, DEFAULT_SYNC_WINDOW, tx);

        sync.request();
        // 窗口结束，拉取进行中
        tokio::time::sleep(Duration::from_millis(180)).await;
        assert_eq!(source.fetches(), 1);
        sync.request();
        sync.request();
        sync.request();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.group.number_of_members, 0);
        assert_eq!(second.group.number_of_members, 1);
        assert_quiet(&mut rx).await;
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_swallowed() {
        let source = Arc::new(CountingSource {
            fetches: AtomicUsize::new(0),
            latency: Duration::ZERO,
            fail: true,
        });
        let (tx, mut rx) = mpsc::channel(8);
        let sync = MembershipSync::spawn(source.clone(), 1, DEFAULT_SYNC_WINDOW, tx);

        sync.request();
        assert_quiet(&mut rx).await;
        sync.request();
        assert_quiet(&mut rx).await;
        // 失败后同步器仍在工作
        assert_eq!(source.fetches(), 2);
    }
}
