use thiserror::Error;
use tokio::sync::oneshot;

/// Creates the command channel connecting a queue handle to the worker that
/// owns one bar's state. Every command carries a reply slot so callers get a
/// typed response without sharing any state with the worker.
pub(crate) fn mailbox<C, R>() -> (MailboxSender<C, R>, MailboxReceiver<C, R>) {
    let (tx, rx) = flume::unbounded();
    (MailboxSender { tx }, MailboxReceiver { rx })
}

#[derive(Debug, Error)]
pub(crate) enum MailboxError {
    #[error("mailbox closed")]
    Closed,
}

#[derive(Debug)]
pub(crate) struct Envelope<C, R> {
    command: C,
    reply: oneshot::Sender<R>,
}

impl<C, R> Envelope<C, R> {
    pub(crate) fn split(self) -> (C, Responder<R>) {
        (self.command, Responder(self.reply))
    }
}

#[derive(Debug)]
pub(crate) struct Responder<R>(oneshot::Sender<R>);

impl<R> Responder<R> {
    pub(crate) fn respond(self, response: R) {
        // The asker may have gone away; that only means nobody is waiting.
        let _ = self.0.send(response);
    }
}

#[derive(Debug)]
pub(crate) struct MailboxSender<C, R> {
    tx: flume::Sender<Envelope<C, R>>,
}

impl<C, R> Clone for MailboxSender<C, R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C, R> MailboxSender<C, R> {
    pub(crate) async fn ask(&self, command: C) -> Result<R, MailboxError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send_async(Envelope {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MailboxError::Closed)?;
        reply_rx.await.map_err(|_| MailboxError::Closed)
    }
}

#[derive(Debug)]
pub(crate) struct MailboxReceiver<C, R> {
    rx: flume::Receiver<Envelope<C, R>>,
}

impl<C, R> MailboxReceiver<C, R> {
    pub(crate) async fn recv_async(&mut self) -> Result<Envelope<C, R>, MailboxError> {
        self.rx.recv_async().await.map_err(|_| MailboxError::Closed)
    }
}
