/// Master process: cron table and sync jobs
pub mod cron;
pub mod jobs;

pub use self::cron::{default_cron_table, CronEntry, CronRegistrar};
pub use jobs::{report_abnormal, run_job, JobKind, JobOutcomes};
