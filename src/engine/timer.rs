use std::time::Duration;

use log::{debug, warn};
use tokio::{
  runtime::Handle,
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};

/// A callback running on a fixed interval on the tokio runtime.
///
/// The first tick fires immediately. The task is aborted when the handle is cancelled or
/// dropped, so a timer can never outlive the object owning it.
#[derive(Debug)]
pub struct RepeatingTask {
  name: String,
  handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
  /// Spawns `tick` every `period`. Without a runtime nothing is scheduled.
  pub fn spawn<F>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
  where
    F: FnMut() + Send + 'static,
  {
    let name = name.into();
    let period = period.max(Duration::from_millis(1));
    let handle = match Handle::try_current() {
      Ok(runtime) => Some(runtime.spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
          interval.tick().await;
          tick();
        }
      })),
      Err(e) => {
        warn!("Cannot start timer {name}: {e}");
        None
      }
    };
    Self { name, handle }
  }

  #[must_use]
  pub fn is_running(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn cancel(mut self) {
    self.abort();
  }

  fn abort(&mut self) {
    if let Some(handle) = self.handle.take() {
      debug!("Stopping timer {}.", self.name);
      handle.abort();
    }
  }
}

impl Drop for RepeatingTask {
  fn drop(&mut self) {
    self.abort();
  }
}
