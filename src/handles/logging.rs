use super::{Diagnostics, Record};
use log::{Level, warn};

/// Upper bound for the number of records logged for a single call. Batched executes and fetches
/// may easily produce one record per row.
const MAX_LOGGED_RECORDS: usize = i16::MAX as usize;

/// This function inspects all the diagnostics of a statement and logs each of them as a warning.
pub fn log_diagnostics(handle: &(impl Diagnostics + ?Sized)) {
    if log::max_level() < Level::Warn {
        // Early return to safe work creating all these log records in case we would not log
        // anything.
        return;
    }

    let mut rec_number = 1;
    while let Some(record) = handle.diagnostic_record(rec_number) {
        log_record(record);
        if rec_number == MAX_LOGGED_RECORDS {
            warn!("Too many diagnostic records were generated. Not all could be logged.");
            break;
        }
        rec_number += 1;
    }
}

#[cfg(not(feature = "structured_logging"))]
fn log_record(record: &Record) {
    warn!("{record}");
}

#[cfg(feature = "structured_logging")]
fn log_record(record: &Record) {
    warn!(
        state = record.state.as_str(),
        native_error = record.native_error;
        "{}",
        record.message
    );
}
