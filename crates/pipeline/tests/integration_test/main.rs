/// Orchestrator runs against mock ingesters, and the built-in scheduled jobs
/// against a scratch lake.

mod helpers;
mod orchestrator;
mod scheduled_jobs;
