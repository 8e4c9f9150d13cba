use futures::Future;

pub(crate) type QuitSignal = tokio::sync::oneshot::Receiver<Quit>;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Quit;

/// A detached background task that can be asked to quit through a oneshot
/// signal, or awaited to completion on shutdown.
#[derive(Debug)]
pub struct BackgroundTask {
    tx: tokio::sync::oneshot::Sender<Quit>,
    handle: tokio::task::JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn spawn<F>(f: impl FnOnce(QuitSignal) -> F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = tokio::task::spawn(f(rx));
        Self { tx, handle }
    }

    /// Signal the task to stop without waiting for it.
    pub fn quit(self) {
        let _ = self.tx.send(Quit);
    }

    /// Signal the task to stop and wait until it has wound down.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Quit);
        let _ = self.handle.await;
    }
}
