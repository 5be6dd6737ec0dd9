use crate::event::AppEvent;
use std::sync::mpsc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl Scheduler {
    pub fn new(tx: mpsc::Sender<AppEvent>, runtime_handle: Handle) -> Self {
        Self { tx, runtime_handle }
    }

    pub fn post(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn after(&self, delay: Duration, event: AppEvent) {
        if delay.is_zero() {
            self.post(event);
            return;
        }
        let tx = self.tx.clone();
        self.runtime_handle.spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(?delay, "delayed event due");
            let _ = tx.send(event);
        });
    }

    pub fn runtime_handle(&self) -> &Handle {
        &self.runtime_handle
    }

    pub fn sender(&self) -> mpsc::Sender<AppEvent> {
        self.tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn delayed_events_arrive_in_due_order() {
        let (tx, rx) = mpsc::channel();
        let scheduler = Scheduler::new(tx, Handle::current());

        scheduler.after(Duration::from_millis(80), AppEvent::FlushTemplates { ticket: 2 });
        scheduler.after(Duration::from_millis(10), AppEvent::FlushTemplates { ticket: 1 });
        scheduler.after(Duration::ZERO, AppEvent::Diagnostic("now".to_string()));

        let received = tokio::task::spawn_blocking(move || {
            (0..3)
                .map(|_| rx.recv_timeout(Duration::from_secs(2)).expect("event arrives"))
                .collect::<Vec<_>>()
        })
        .await
        .expect("receiver task");

        assert!(matches!(&received[0], AppEvent::Diagnostic(text) if text == "now"));
        assert!(matches!(received[1], AppEvent::FlushTemplates { ticket: 1 }));
        assert!(matches!(received[2], AppEvent::FlushTemplates { ticket: 2 }));
    }
}
