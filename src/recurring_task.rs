use std::future::Future;

use rocket::tokio::{
    self,
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};

/// A background job that runs once immediately and then on a fixed period,
/// until cancelled.
///
/// Runs never overlap: if one run overruns the period, the next starts late.
pub struct RecurringTask {
    task_handle: JoinHandle<()>,
}

impl RecurringTask {
    /// Spawn `job` to run every `period`.
    pub fn new<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // `interval` panics on a zero period.
        let period = period.max(Duration::from_millis(1));
        let task_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                job().await;
            }
        });

        Self { task_handle }
    }

    /// Stop the task. Returns true iff it was still running.
    pub async fn cancel(self) -> bool {
        self.task_handle.abort();
        match self.task_handle.await {
            Ok(()) => false,
            Err(e) => e.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use rocket::tokio::time::sleep;

    fn counting_task(period: Duration) -> (RecurringTask, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = runs.clone();
        let task = RecurringTask::new(period, move || {
            let runs = task_runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, runs)
    }

    #[rocket::async_test]
    async fn runs_immediately_then_periodically() {
        let (task, runs) = counting_task(Duration::from_millis(50));
        sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(200)).await;
        assert!(runs.load(Ordering::SeqCst) >= 3);
        assert!(task.cancel().await);
    }

    #[rocket::async_test]
    async fn overrunning_job_delays_the_next_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = runs.clone();
        let task = RecurringTask::new(Duration::from_millis(10), move || {
            let runs = task_runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(100)).await;
            }
        });
        sleep(Duration::from_millis(150)).await;
        // Runs never overlap, so at most two have started.
        assert!(runs.load(Ordering::SeqCst) <= 2);
        task.cancel().await;
    }

    #[rocket::async_test]
    async fn cancelled_task_stops() {
        let (task, runs) = counting_task(Duration::from_millis(10));
        sleep(Duration::from_millis(15)).await;
        task.cancel().await;
        let after_cancel = runs.load(Ordering::SeqCst);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
    }
}
