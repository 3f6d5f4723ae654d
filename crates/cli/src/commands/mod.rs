pub mod access;
pub mod ingest;
pub mod maintenance;
pub mod review;
pub mod sessions;
pub mod status;
