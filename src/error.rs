use thiserror::Error;

use crate::api::ApiError;
use crate::job::JobId;

#[derive(Debug, Error)]
pub enum JobtrackError {
    #[error("Invalid filter `{0}`: expected KEY=VALUE")]
    InvalidFilter(String),

    #[error("No items selected. Use --pick or --all.")]
    NothingSelected,

    #[error("Job {0} has no technical failures to retry (or is still running).")]
    NotRetryable(JobId),

    #[error("Could not load the status of job {job_id}: {message}")]
    Tracking { job_id: JobId, message: String },

    #[error("Tracking of job {0} was stopped before it finished")]
    Stopped(JobId),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = JobtrackError::NotRetryable(JobId::new("J1"));
        assert_eq!(
            err.to_string(),
            "Job J1 has no technical failures to retry (or is still running)."
        );

        let err = JobtrackError::Tracking {
            job_id: JobId::new("7"),
            message: "not found: Job não encontrado".into(),
        };
        assert_eq!(
            err.to_string(),
            "Could not load the status of job 7: not found: Job não encontrado"
        );
    }

    #[test]
    fn api_errors_convert() {
        let err: JobtrackError = ApiError::Unauthorized.into();
        assert!(matches!(err, JobtrackError::Api(ApiError::Unauthorized)));
    }
}
