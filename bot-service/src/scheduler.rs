use crate::cycle::{Bot, CycleSummary};
use repostbot_core::{BotConfig, Clock, CoreError, ErrorExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Runs cycles back to back: `wait_time` after a good cycle, `error_backoff`
/// after a failed one. A failed cycle never stops the loop.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    wait_time: Duration,
    error_backoff: Duration,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, config: &BotConfig) -> Self {
        Self {
            clock,
            wait_time: config.wait_time(),
            error_backoff: config.error_backoff(),
        }
    }

    pub async fn run(&self, bot: &mut Bot) {
        loop {
            self.tick(bot).await;
        }
    }

    /// Run exactly `cycles` cycles, including their trailing waits.
    pub async fn run_cycles(
        &self,
        bot: &mut Bot,
        cycles: usize,
    ) -> Vec<Result<CycleSummary, CoreError>> {
        let mut results = Vec::with_capacity(cycles);
        for _ in 0..cycles {
            results.push(self.tick(bot).await);
        }
        results
    }

    async fn tick(&self, bot: &mut Bot) -> Result<CycleSummary, CoreError> {
        let result = bot.run_cycle().await;
        match &result {
            Ok(_) => {
                info!("Waiting {}s before the next cycle", self.wait_time.as_secs());
                self.clock.sleep(self.wait_time).await;
            }
            Err(e) => {
                error!(
                    "Cycle failed ({}), retrying in {}s: {}",
                    e.error_code(),
                    self.error_backoff.as_secs(),
                    e.user_friendly_message()
                );
                e.log_error();
                self.clock.sleep(self.error_backoff).await;
            }
        }
        result
    }
}
