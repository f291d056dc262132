//! Named worker threads that run a job on a fixed interval.
//!
//! Each [`PeriodicTask`] owns one thread that waits on a tick channel and a
//! control channel. The interval can be changed or paused while the thread
//! runs, and the thread is stopped and joined when the task is dropped.

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

enum Control {
    /// Restart the timer with a new interval; `None` pauses the task.
    Reschedule(Option<Duration>),
    Stop,
}

/// A job run every `interval` on its own thread.
///
/// A job in progress is never interrupted: stopping waits for it to finish.
pub struct PeriodicTask {
    name: String,
    control: Sender<Control>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns the worker thread. With `interval = None` the task starts paused.
    ///
    /// # Errors
    ///
    /// Returns the io error if the OS refuses to spawn the thread.
    pub fn spawn<F>(name: &str, interval: Option<Duration>, job: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (control, control_receiver) = unbounded();
        let thread_name = name.to_owned();

        let handle = thread::Builder::new().name(name.to_owned()).spawn(move || {
            trace!(task = %thread_name, "Task thread started");
            Self::main_task(&control_receiver, interval, job);
            trace!(task = %thread_name, "Task thread stopped");
        })?;

        Ok(Self {
            name: name.to_owned(),
            control,
            handle: Some(handle),
        })
    }

    /// Changes the interval, restarting the timer. `None` pauses the task.
    pub fn reschedule(&self, interval: Option<Duration>) {
        debug!(task = %self.name, ?interval, "Rescheduling task");
        let _ = self.control.send(Control::Reschedule(interval));
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.control.send(Control::Stop);
        if handle.join().is_err() && !thread::panicking() {
            tracing::error!(task = %self.name, "Task thread panicked");
        }
    }

    fn main_task<F: FnMut()>(control: &Receiver<Control>, interval: Option<Duration>, mut job: F) {
        let mut ticker = ticker_for(interval);

        loop {
            select! {
                recv(control) -> message => match message {
                    Ok(Control::Reschedule(interval)) => ticker = ticker_for(interval),
                    Ok(Control::Stop) | Err(_) => break,
                },
                recv(ticker) -> _ => job(),
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.join();
    }
}

fn ticker_for(interval: Option<Duration>) -> Receiver<Instant> {
    match interval {
        Some(every) if !every.is_zero() => crossbeam_channel::tick(every),
        _ => crossbeam_channel::never(),
    }
}
