/// Integration tests for the partitioned lake: organize + latest pointer,
/// and retention over a populated tree.

mod helpers;
mod organize;
mod retention;
