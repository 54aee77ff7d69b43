/// Counts SET requests processed by the service
pub const SERVICE_SET_COUNTER: &str = "service.set_count";
/// Counts SET requests that returned an error
pub const SERVICE_SET_ERROR_COUNT_COUNTER: &str = "service.set_error_count";

/// Counts GET requests processed by the service
pub const SERVICE_GET_COUNTER: &str = "service.get_count";
/// Counts GET requests that returned an error
pub const SERVICE_GET_ERROR_COUNT_COUNTER: &str = "service.get_error_count";

/// Counts DELETE requests processed by the service
pub const SERVICE_DELETE_COUNTER: &str = "service.delete_count";
/// Counts DELETE requests that returned an error
pub const SERVICE_DELETE_ERROR_COUNT_COUNTER: &str = "service.delete_error_count";

/// Counts EXPIRE requests processed by the service
pub const SERVICE_EXPIRE_COUNTER: &str = "service.expire_count";
/// Counts EXPIRE requests that returned an error
pub const SERVICE_EXPIRE_ERROR_COUNT_COUNTER: &str = "service.expire_error_count";

/// Counts EXISTS requests processed by the service
pub const SERVICE_EXISTS_COUNTER: &str = "service.exists_count";
/// Counts EXISTS requests that returned an error
pub const SERVICE_EXISTS_ERROR_COUNT_COUNTER: &str = "service.exists_error_count";

/// Counts GETTTL requests processed by the service
pub const SERVICE_GET_TTL_COUNTER: &str = "service.get_ttl_count";
/// Counts GETTTL requests that returned an error
pub const SERVICE_GET_TTL_ERROR_COUNT_COUNTER: &str = "service.get_ttl_error_count";

/// Counts LOCK requests processed by the service
pub const SERVICE_LOCK_COUNTER: &str = "service.lock_count";
/// Counts LOCK requests that returned an error
pub const SERVICE_LOCK_ERROR_COUNT_COUNTER: &str = "service.lock_error_count";

/// Counts UNLOCK requests processed by the service
pub const SERVICE_UNLOCK_COUNTER: &str = "service.unlock_count";
/// Counts UNLOCK requests that returned an error
pub const SERVICE_UNLOCK_ERROR_COUNT_COUNTER: &str = "service.unlock_error_count";

/// Counts FLUSHDB requests processed by the service
pub const SERVICE_FLUSH_DB_COUNTER: &str = "service.flush_db_count";
/// Counts FLUSHDB requests that returned an error
pub const SERVICE_FLUSH_DB_ERROR_COUNT_COUNTER: &str = "service.flush_db_error_count";

/// Counts read-repair rounds started by the engine
pub const ENGINE_REPAIR_COUNTER: &str = "engine.repair_count";
/// Counts rollback rounds started by the engine
pub const ENGINE_ROLLBACK_COUNTER: &str = "engine.rollback_count";

pub fn init_counters() {
    describe_counter!(SERVICE_SET_COUNTER, "Counts SET requests");
    describe_counter!(SERVICE_SET_ERROR_COUNT_COUNTER, "Counts failed SET requests");
    describe_counter!(SERVICE_GET_COUNTER, "Counts GET requests");
    describe_counter!(SERVICE_GET_ERROR_COUNT_COUNTER, "Counts failed GET requests");
    describe_counter!(SERVICE_DELETE_COUNTER, "Counts DELETE requests");
    describe_counter!(
        SERVICE_DELETE_ERROR_COUNT_COUNTER,
        "Counts failed DELETE requests"
    );
    describe_counter!(SERVICE_EXPIRE_COUNTER, "Counts EXPIRE requests");
    describe_counter!(
        SERVICE_EXPIRE_ERROR_COUNT_COUNTER,
        "Counts failed EXPIRE requests"
    );
    describe_counter!(SERVICE_EXISTS_COUNTER, "Counts EXISTS requests");
    describe_counter!(
        SERVICE_EXISTS_ERROR_COUNT_COUNTER,
        "Counts failed EXISTS requests"
    );
    describe_counter!(SERVICE_GET_TTL_COUNTER, "Counts GETTTL requests");
    describe_counter!(
        SERVICE_GET_TTL_ERROR_COUNT_COUNTER,
        "Counts failed GETTTL requests"
    );
    describe_counter!(SERVICE_LOCK_COUNTER, "Counts LOCK requests");
    describe_counter!(
        SERVICE_LOCK_ERROR_COUNT_COUNTER,
        "Counts failed LOCK requests"
    );
    describe_counter!(SERVICE_UNLOCK_COUNTER, "Counts UNLOCK requests");
    describe_counter!(
        SERVICE_UNLOCK_ERROR_COUNT_COUNTER,
        "Counts failed UNLOCK requests"
    );
    describe_counter!(SERVICE_FLUSH_DB_COUNTER, "Counts FLUSHDB requests");
    describe_counter!(
        SERVICE_FLUSH_DB_ERROR_COUNT_COUNTER,
        "Counts failed FLUSHDB requests"
    );
    describe_counter!(ENGINE_REPAIR_COUNTER, "Counts read-repair rounds");
    describe_counter!(ENGINE_ROLLBACK_COUNTER, "Counts rollback rounds");
}
