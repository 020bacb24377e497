pub const MESSAGES_RECEIVED: &str = "login_ingester_messages_received";
pub const EMPTY_RECEIVES: &str = "login_ingester_empty_receives";
pub const RECEIVE_FAILURES: &str = "login_ingester_receive_failures";
pub const RECEIVE_BATCH_SIZE: &str = "login_ingester_receive_batch_size";

pub const DECODE_FAILURES: &str = "login_ingester_decode_failures";
pub const DEAD_LETTERED: &str = "login_ingester_dead_lettered";

pub const ROWS_INSERTED: &str = "login_ingester_rows_inserted";
pub const DUPLICATES_SKIPPED: &str = "login_ingester_duplicates_skipped";
pub const WRITE_FAILURES: &str = "login_ingester_write_failures";
pub const WRITE_TIME: &str = "login_ingester_write_time_ms";

pub const DELETE_FAILURES: &str = "login_ingester_delete_failures";
pub const BACKOFF_APPLIED: &str = "login_ingester_backoff_applied";
