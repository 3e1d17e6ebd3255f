pub mod client;
pub mod error;
pub mod types;

pub use client::{DEFAULT_BASE_URL, HttpJobApi, JobApi};
pub use error::ApiError;
pub use types::{
    CandidateItem, DailyJobs, DashboardStats, ErrorBody, JobCreated, KindStats, StatusResponse,
};
