use dashmap::DashMap;
use derive_new::new;
use futures::{pin_mut, StreamExt as _};
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::Notification;

use crate::database::{Database, Table as _};
use crate::feed::{DbFeedResolver, FeedKind, FeedStory};
use crate::model::{Story, UserId};
use crate::task::BackgroundTask;

#[derive(Debug, Snafu)]
pub enum SubscribeError {
    /// Failed to open a change stream on the story collection.
    Subscription {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A live, cancellable feed: yields a fresh snapshot of the resolved feed
/// every time the story collection changes.
///
/// The stream ends when the subscription is stopped (or the watcher shuts
/// down); re-subscribing is the only way to restart it. Dropping the receiver
/// also tears the pump task down on its next delivery.
#[derive(Debug)]
pub struct FeedSubscription {
    rx: tokio::sync::mpsc::Receiver<Vec<FeedStory>>,
}

impl FeedSubscription {
    /// Wait for the next snapshot. `None` means the subscription ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<FeedStory>> {
        self.rx.recv().await
    }
}

impl futures::Stream for FeedSubscription {
    type Item = Vec<FeedStory>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Manages live feed subscriptions, one pump task per `(viewer, feed)` pair.
///
/// Subscribing again for the same pair replaces the previous pump, so a
/// screen that re-subscribes never leaks its old task.
#[derive(Debug, new)]
pub struct FeedWatcher {
    #[new(default)]
    tasks: DashMap<(UserId, FeedKind), BackgroundTask>,
    resolver: DbFeedResolver,
    database: Database,
}

impl FeedWatcher {
    /// Open a live feed for the viewer. The first snapshot is delivered
    /// immediately; later ones follow every story-collection change.
    pub async fn subscribe(
        &self,
        viewer: &UserId,
        kind: FeedKind,
    ) -> Result<FeedSubscription, SubscribeError> {
        let stream = self
            .database
            .select(Story::table())
            .live()
            .into_owned()
            .await
            .context(SubscriptionSnafu)?;

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let resolver = self.resolver.clone();
        let viewer = viewer.clone();
        let watched = viewer.clone();

        let task = BackgroundTask::spawn(|mut quit| async move {
            pin_mut!(stream);

            let snapshot = resolver.feed(kind, &viewer).await;
            if tx.send(snapshot).await.is_err() {
                return;
            }

            loop {
                tokio::select! {
                    event = stream.next() => {
                        let Some(event) = event else { break };
                        let event: Result<Notification<Story>, surrealdb::Error> = event;
                        if let Err(err) = event {
                            tracing::warn!(error = %err, "dropped a malformed story notification");
                            continue;
                        }

                        let snapshot = resolver.feed(kind, &viewer).await;
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    _ = &mut quit => break,
                }
            }
        });

        if let Some((_, previous)) = self.tasks.remove(&(watched.clone(), kind)) {
            previous.quit();
        }
        self.tasks.insert((watched, kind), task);

        Ok(FeedSubscription { rx })
    }

    /// Stop one viewer's live feed, ending its [FeedSubscription] stream.
    pub fn stop(&self, viewer: &UserId, kind: FeedKind) {
        if let Some((_, task)) = self.tasks.remove(&(viewer.clone(), kind)) {
            task.quit();
        }
    }

    /// Stop every live feed and wait for the pump tasks to wind down.
    pub async fn shutdown(&self) {
        let keys: Vec<(UserId, FeedKind)> =
            self.tasks.iter().map(|entry| entry.key().clone()).collect();

        for key in keys {
            if let Some((_, task)) = self.tasks.remove(&key) {
                task.shutdown().await;
            }
        }
    }
}
