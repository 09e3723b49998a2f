use crate::detect::Event;

/// Number of features produced per event. Training and scoring must agree
/// on this shape for the lifetime of the process.
pub const FEATURE_ARITY: usize = 4;

/// Fixed-width numeric encoding of an event.
pub type FeatureVector = Vec<f64>;

/// Deterministic event-to-vector encoder.
///
/// Categorical fields (IP address, username) are reduced to a bounded
/// numeric range by hashing with CRC32 and taking the remainder modulo
/// `buckets`. CRC32 is stable across processes and platforms, so the same
/// event always encodes to the same vector, including after a restart.
/// Distinct strings may collide in a bucket; that is an accepted trade-off
/// for keeping the feature space bounded while new IPs and usernames
/// appear continuously.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    buckets: u32,
}

impl FeatureEncoder {
    pub fn new(buckets: u32) -> Self {
        // A zero bucket count would make the modulo undefined.
        Self {
            buckets: buckets.max(1),
        }
    }

    /// Encode an event as `[timestamp_secs, ip_bucket, user_bucket, event_value]`.
    ///
    /// Pure and total: never fails on a well-formed event, including empty
    /// strings and zero values. The event's timestamp is always concrete by
    /// the time it reaches the encoder -- the ingestion boundary substitutes
    /// the submission time when a caller omits it, which shifts the score
    /// distribution toward "now" for such events.
    pub fn encode(&self, event: &Event) -> FeatureVector {
        vec![
            event.timestamp.timestamp() as f64,
            self.bucket(&event.ip_address),
            self.bucket(&event.username),
            event.event_value,
        ]
    }

    fn bucket(&self, value: &str) -> f64 {
        (crc32fast::hash(value.as_bytes()) % self.buckets) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(ip: &str, user: &str, value: f64) -> Event {
        Event {
            ip_address: ip.to_string(),
            username: user.to_string(),
            event_type: "login_attempt".to_string(),
            event_value: value,
            timestamp: Utc.with_ymd_and_hms(2025, 2, 5, 12, 34, 56).unwrap(),
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = FeatureEncoder::new(1000);
        let e = event("192.168.1.100", "jdoe", 1.0);
        assert_eq!(encoder.encode(&e), encoder.encode(&e));
    }

    #[test]
    fn test_encode_fixed_arity() {
        let encoder = FeatureEncoder::new(1000);
        assert_eq!(encoder.encode(&event("10.0.0.1", "root", 0.0)).len(), FEATURE_ARITY);
    }

    #[test]
    fn test_encode_is_total_on_boundary_input() {
        let encoder = FeatureEncoder::new(1000);
        // Empty strings and zero values must still produce a full vector.
        let v = encoder.encode(&event("", "", 0.0));
        assert_eq!(v.len(), FEATURE_ARITY);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_buckets_are_bounded() {
        let encoder = FeatureEncoder::new(1000);
        for ip in ["1.2.3.4", "255.255.255.255", "::1", "not-an-ip"] {
            let v = encoder.encode(&event(ip, "user", 1.0));
            assert!(v[1] >= 0.0 && v[1] < 1000.0);
            assert!(v[2] >= 0.0 && v[2] < 1000.0);
        }
    }

    #[test]
    fn test_collisions_are_tolerated_not_forbidden() {
        // With more distinct values than buckets, collisions are guaranteed.
        // The encoder must keep producing valid vectors regardless.
        let encoder = FeatureEncoder::new(16);
        let mut seen = std::collections::HashSet::new();
        for i in 0..256 {
            let v = encoder.encode(&event(&format!("10.0.0.{i}"), "user", 1.0));
            assert!(v[1] >= 0.0 && v[1] < 16.0);
            seen.insert(v[1] as u32);
        }
        assert!(seen.len() <= 16);
    }

    #[test]
    fn test_zero_bucket_count_is_clamped() {
        let encoder = FeatureEncoder::new(0);
        let v = encoder.encode(&event("1.2.3.4", "user", 1.0));
        assert_eq!(v[1], 0.0);
    }
}
