//! Expired-escrow sweep
//!
//! Cron-driven job that refunds escrows past their expiry. The sweep
//! itself lives on [`EscrowService::sweep_expired`]; this module only
//! owns the schedule.

use crate::errors::{PaymentsError, Result};
use crate::escrow::EscrowService;
use crate::metrics;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

pub struct EscrowSweeper {
    scheduler: JobScheduler,
    escrow: Arc<EscrowService>,
    schedule: String,
}

impl EscrowSweeper {
    pub async fn new(escrow: Arc<EscrowService>, schedule: String) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| PaymentsError::Internal(format!("scheduler: {}", e)))?;

        Ok(EscrowSweeper {
            scheduler,
            escrow,
            schedule,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Starting escrow expiry sweeper ({})", self.schedule);

        let escrow = self.escrow.clone();
        let sweep_job = Job::new_async(self.schedule.as_str(), move |_uuid, _lock| {
            let escrow = escrow.clone();
            Box::pin(async move {
                match escrow.sweep_expired().await {
                    Ok(report) => {
                        if report.swept > 0 {
                            metrics::ESCROWS_EXPIRED.inc_by(report.swept as u64);
                            metrics::ESCROWS_REFUNDED.inc_by(report.swept as u64);
                        }
                    }
                    Err(e) => {
                        error!("Escrow expiry sweep failed: {:?}", e);
                    }
                }
            })
        })
        .map_err(|e| PaymentsError::Internal(format!("scheduler: {}", e)))?;

        self.scheduler
            .add(sweep_job)
            .await
            .map_err(|e| PaymentsError::Internal(format!("scheduler: {}", e)))?;

        self.scheduler
            .start()
            .await
            .map_err(|e| PaymentsError::Internal(format!("scheduler: {}", e)))?;

        Ok(())
    }
}
