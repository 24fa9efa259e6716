/// Scheduler behaviour with mock jobs: dispatch, overlap protection,
/// outcome recording and shutdown.

mod scheduling;
