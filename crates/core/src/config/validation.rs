use crate::SchedulerResult;

/// Implemented by every configuration section; run after loading.
pub trait ConfigValidator {
    fn validate(&self) -> SchedulerResult<()>;
}
