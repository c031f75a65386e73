use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread::JoinHandle,
    time::Duration,
};

use crate::{Error, Result};

/// A background thread that can be stopped.
///
/// Used for auto polling and for the max init wait timer. The thread waits on a stop channel
/// between runs, so stopping never has to wait for a full interval.
pub(crate) struct PollerThread {
    join_handle: JoinHandle<()>,

    /// Used to send a stop command to the thread.
    stop_sender: mpsc::Sender<()>,
}

impl PollerThread {
    /// Run `task` immediately and then every `interval`, until stopped or until `task` returns
    /// `false`.
    pub fn start_periodic(
        name: &str,
        interval: Duration,
        mut task: impl FnMut() -> bool + Send + 'static,
    ) -> Result<PollerThread> {
        PollerThread::spawn(name, move |stop_receiver| loop {
            if !task() {
                return;
            }
            if !wait(&stop_receiver, interval) {
                log::debug!(target: "configcat", "poller thread received stop command");
                return;
            }
        })
    }

    /// Run `task` once after `delay`, unless stopped first.
    pub fn start_delayed(
        name: &str,
        delay: Duration,
        task: impl FnOnce() + Send + 'static,
    ) -> Result<PollerThread> {
        PollerThread::spawn(name, move |stop_receiver| {
            if wait(&stop_receiver, delay) {
                task();
            }
        })
    }

    fn spawn(
        name: &str,
        body: impl FnOnce(mpsc::Receiver<()>) + Send + 'static,
    ) -> Result<PollerThread> {
        let (stop_sender, stop_receiver) = mpsc::channel::<()>();
        let join_handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || body(stop_receiver))?;
        Ok(PollerThread {
            join_handle,
            stop_sender,
        })
    }

    /// Stop the thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited).
        let _ = self.stop_sender.send(());
    }

    /// Stop the thread and block waiting for it to exit.
    ///
    /// Called from the thread itself (e.g. a hook dropping the client), it only sends the stop
    /// command: a thread cannot join itself.
    pub fn shutdown(self) -> Result<()> {
        self.stop();

        if self.join_handle.thread().id() == std::thread::current().id() {
            return Ok(());
        }

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Sleep for `timeout` unless a stop command arrives. Returns `false` if the thread should stop.
fn wait(stop_receiver: &mpsc::Receiver<()>, timeout: Duration) -> bool {
    match stop_receiver.recv_timeout(timeout) {
        Err(RecvTimeoutError::Timeout) => true,
        // Stop command, or the owner is gone.
        Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn periodic_task_runs_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let poller = {
            let runs = runs.clone();
            PollerThread::start_periodic("test-poller", Duration::from_millis(10), move || {
                runs.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap()
        };
        std::thread::sleep(Duration::from_millis(100));
        poller.shutdown().unwrap();

        let after_shutdown = runs.load(Ordering::SeqCst);
        assert!(after_shutdown >= 2, "ran {after_shutdown} times");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
    }

    #[test]
    fn periodic_task_can_stop_itself() {
        let runs = Arc::new(AtomicUsize::new(0));
        let poller = {
            let runs = runs.clone();
            PollerThread::start_periodic("test-poller", Duration::from_millis(1), move || {
                runs.fetch_add(1, Ordering::SeqCst) < 2
            })
            .unwrap()
        };
        poller.join_handle.join().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delayed_task_is_cancelled_by_stop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let timer = {
            let runs = runs.clone();
            PollerThread::start_delayed("test-timer", Duration::from_secs(10), move || {
                runs.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };
        timer.shutdown().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delayed_task_runs_after_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let timer = {
            let runs = runs.clone();
            PollerThread::start_delayed("test-timer", Duration::from_millis(10), move || {
                runs.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };
        std::thread::sleep(Duration::from_millis(100));
        timer.shutdown().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
