use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Roughly one display frame at 30 fps.
pub const FRAME_PERIOD: Duration = Duration::from_millis(33);

/// Paces the scan loop. Each `tick` resolves when the next frame is due.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        // a slow tick must not be followed by a burst of catch-up ticks
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn frame_paced() -> Self {
        Self::new(FRAME_PERIOD)
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
