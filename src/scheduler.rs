use log::debug;
use std::io;
use std::thread::{self, JoinHandle};

/// Spawns the long-running workers (clock loop, mesh receiver, display,
/// console input) on named threads so they show up in logs and debuggers.
pub trait Scheduler {
    fn spawn<F>(&self, name: &str, f: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static;
}

#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler
    }
}

impl Scheduler for ThreadScheduler {
    fn spawn<F>(&self, name: &str, f: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        debug!("Spawning thread '{}'", name);
        thread::Builder::new().name(name.to_string()).spawn(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_thread_scheduler_spawn() {
        let scheduler = ThreadScheduler::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let handle = scheduler
            .spawn("worker", move || {
                *seen_clone.lock().unwrap() = thread::current().name().map(str::to_string);
            })
            .unwrap();
        handle.join().unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("worker"));
    }
}
