/// End-to-end ingestion tests: delimited files into the raw tier and REST
/// endpoints (served by wiremock) through retries and pagination.

mod api_job;
mod file_job;
mod helpers;
