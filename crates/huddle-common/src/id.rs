use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random suffix length appended to generated room ids.
const SUFFIX_LEN: usize = 6;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Strategy for producing room identifiers.
///
/// Room creators claim the generated id on the relay, so the generator only
/// has to make collisions unlikely. A collision surfaces as a room id
/// conflict and the user starts over with a fresh id.
pub trait RoomIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Base-36 millisecond timestamp plus a random base-36 suffix,
/// e.g. `m1x3k9q2-4fz0ab`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampRoomIds;

impl RoomIdGenerator for TimestampRoomIds {
    fn generate(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        format!("{}-{suffix}", to_base36(millis))
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn room_id_has_timestamp_and_suffix() {
        let id = TimestampRoomIds.generate();
        let (prefix, suffix) = id.split_once('-').unwrap();
        assert!(!prefix.is_empty());
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(id
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn room_ids_differ() {
        let a = TimestampRoomIds.generate();
        let b = TimestampRoomIds.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generator_is_object_safe() {
        struct Fixed;
        impl RoomIdGenerator for Fixed {
            fn generate(&self) -> String {
                "r1-ab12cd".into()
            }
        }
        let gen: Box<dyn RoomIdGenerator> = Box::new(Fixed);
        assert_eq!(gen.generate(), "r1-ab12cd");
    }
}
