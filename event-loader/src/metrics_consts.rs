pub const INGESTIONS: &str = "event_loader_ingestions";
pub const FETCH_FAILED: &str = "event_loader_fetch_failed";
pub const TOKENS_SEEN: &str = "event_loader_tokens_seen";
pub const EVENTS_DECODED: &str = "event_loader_events_decoded";
pub const DECODE_FAILED: &str = "event_loader_decode_failed";
pub const BATCH_LOAD_ATTEMPT: &str = "event_loader_batch_load_attempt";
pub const ROWS_COMMITTED: &str = "event_loader_rows_committed";
pub const BATCH_SIZE: &str = "event_loader_batch_size";
pub const BATCH_LOAD_TIME: &str = "event_loader_batch_load_time_ms";
