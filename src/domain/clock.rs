//! Process-wide timestamp source.
//!
//! Every backend stamps records through [`now`]. Values are truncated to whole
//! microseconds, the finest resolution PostgreSQL `TIMESTAMPTZ` keeps, and are
//! strictly increasing within the process.

use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time at microsecond precision, strictly after any value
/// previously returned in this process.
pub fn now() -> OffsetDateTime {
    let wall = micros_since_epoch(OffsetDateTime::now_utc());
    let mut observed = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let next = if wall > observed { wall } else { observed + 1 };
        match LAST_MICROS.compare_exchange_weak(observed, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return from_micros(next),
            Err(current) => observed = current,
        }
    }
}

fn micros_since_epoch(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000) as i64
}

fn from_micros(micros: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
