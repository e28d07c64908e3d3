use snowflake::SnowflakeIdGenerator;
use std::sync::Mutex;
use std::time::{Duration, UNIX_EPOCH};

// service launch epoch, 2023-03-01T00:00:00Z
const SNOWFLAKE_EPOCH: u64 = 1677628800000;

static GENERATOR: once_cell::sync::OnceCell<Mutex<SnowflakeIdGenerator>> = once_cell::sync::OnceCell::new();

fn new() -> Mutex<SnowflakeIdGenerator> {
    let epoch = UNIX_EPOCH + Duration::from_millis(SNOWFLAKE_EPOCH);
    let node_id = fastrand::i32(0..32);
    Mutex::new(SnowflakeIdGenerator::with_epoch(0, node_id, epoch))
}

// time-ordered ids, the audit trail sorts by id within one process
pub fn next() -> i64 {
    GENERATOR.get_or_init(new).lock().unwrap().generate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_is_increasing() {
        let mut prev = 0;
        for idx in 0..10000 {
            let id = next();
            assert!(id > prev, "id: {}, prev: {}, idx: {}", id, prev, idx);
            prev = id;
        }
    }
}
