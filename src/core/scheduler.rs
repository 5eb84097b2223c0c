//! 固定周期的 tick 任务
//!
//! 任务线程独占 tick 闭包（以及其中的引擎），tick 之间不会重叠。
//! 超时的 tick 不补跑，下一次紧接着开始。

use log::{info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 每秒分析 5 帧
pub const SAMPLING_RATE_HZ: u64 = 5;

pub fn tick_period() -> Duration {
    Duration::from_millis(1000 / SAMPLING_RATE_HZ)
}

pub struct TaskHandle {
    name: String,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
            && self.join.as_ref().map_or(false, |join| !join.is_finished())
    }

    /// Halts the timer and waits for the in-flight tick, if any, to finish.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            join.thread().unpark();
            if join.join().is_err() {
                warn!("⚠️ {}: tick loop panicked", self.name);
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `tick(period)` every `period` on a dedicated thread until the handle
/// is stopped or dropped.
pub fn spawn_periodic<F>(name: &str, period: Duration, mut tick: F) -> io::Result<TaskHandle>
where
    F: FnMut(Duration) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let loop_name = name.to_string();

    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            info!("▶️ {}: started ({:?} period)", loop_name, period);
            let mut deadline = Instant::now();

            while !stop_flag.load(Ordering::Acquire) {
                let started = Instant::now();
                tick(period);
                let elapsed = started.elapsed();

                deadline += period;
                let now = Instant::now();
                if elapsed >= period {
                    warn!("⚠️ {}: tick took {:?}, skipping ahead", loop_name, elapsed);
                    deadline = now;
                } else if deadline < now {
                    deadline = now;
                }

                while !stop_flag.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
            }

            info!("⏹️ {}: stopped", loop_name);
        })?;

    Ok(TaskHandle {
        name: name.to_string(),
        stop,
        join: Some(join),
    })
}
