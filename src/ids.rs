use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;

/// Opaque correlation id: 8 random bytes as lowercase hex.
///
/// Falls back to the hex of the current UTC nanosecond timestamp if the OS
/// random source is unavailable.
pub fn generate_id() -> String {
    let mut buf = [0u8; 8];
    match OsRng.try_fill_bytes(&mut buf) {
        Ok(()) => hex::encode(buf),
        Err(_) => timestamp_id(),
    }
}

fn timestamp_id() -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros().saturating_mul(1_000));
    format!("{:x}", nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_hex_of_eight_bytes() {
        let id = generate_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_id_varies() {
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_timestamp_fallback_is_hex() {
        let id = timestamp_id();
        assert!(!id.is_empty());
        assert!(i64::from_str_radix(&id, 16).is_ok());
    }
}
