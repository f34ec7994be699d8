use std::env;

/// Startup configuration for the cache server. Every field has a
/// default matching the protocol overview; each is overridable via a
/// `LEASECACHED_*` environment variable, read once at process start.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,

    pub num_processors: usize,
    pub buffer_size: usize,
    pub max_result_package_size: usize,

    pub big_command_store_size: usize,
    pub max_batch_size: usize,

    pub num_buckets: u32,
    pub lease_list_size: u32,
    pub lease_timeout_secs: u32,

    pub num_value_segments: usize,
    pub segment_capacity_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7000".to_string(),

            num_processors: 4,
            buffer_size: 2 * 1024 * 1024,
            max_result_package_size: 32 * 1024,

            big_command_store_size: 8 * 1024 * 1024,
            max_batch_size: 1024 * 1024,

            num_buckets: 1024,
            lease_list_size: 16,
            lease_timeout_secs: 30,

            num_value_segments: 8,
            segment_capacity_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut c = Self::default();

        if let Ok(v) = env::var("LEASECACHED_BIND_ADDR") {
            c.bind_addr = v;
        }
        if let Ok(v) = env::var("LEASECACHED_NUM_PROCESSORS") {
            c.num_processors = v.parse().unwrap_or(c.num_processors);
        }
        if let Ok(v) = env::var("LEASECACHED_BUFFER_SIZE") {
            c.buffer_size = v.parse().unwrap_or(c.buffer_size);
        }
        if let Ok(v) = env::var("LEASECACHED_MAX_RESULT_PACKAGE_SIZE") {
            c.max_result_package_size = v.parse().unwrap_or(c.max_result_package_size);
        }
        if let Ok(v) = env::var("LEASECACHED_BIG_COMMAND_STORE_SIZE") {
            c.big_command_store_size = v.parse().unwrap_or(c.big_command_store_size);
        }
        if let Ok(v) = env::var("LEASECACHED_MAX_BATCH_SIZE") {
            c.max_batch_size = v.parse().unwrap_or(c.max_batch_size);
        }
        if let Ok(v) = env::var("LEASECACHED_NUM_BUCKETS") {
            c.num_buckets = v.parse().unwrap_or(c.num_buckets);
        }
        if let Ok(v) = env::var("LEASECACHED_LEASE_LIST_SIZE") {
            c.lease_list_size = v.parse().unwrap_or(c.lease_list_size);
        }
        if let Ok(v) = env::var("LEASECACHED_LEASE_TIMEOUT_SECS") {
            c.lease_timeout_secs = v.parse().unwrap_or(c.lease_timeout_secs);
        }
        if let Ok(v) = env::var("LEASECACHED_NUM_VALUE_SEGMENTS") {
            c.num_value_segments = v.parse().unwrap_or(c.num_value_segments);
        }
        if let Ok(v) = env::var("LEASECACHED_SEGMENT_CAPACITY_BYTES") {
            c.segment_capacity_bytes = v.parse().unwrap_or(c.segment_capacity_bytes);
        }

        c.num_buckets = ceil_power_of_two(c.num_buckets);
        c.lease_list_size = ceil_power_of_two(c.lease_list_size);
        c
    }
}

/// Round `n` up to the next power of two (`0` and `1` both round to `1`).
pub fn ceil_power_of_two(n: u32) -> u32 {
    if n <= 1 {
        return 1;
    }
    1u32 << (32 - (n - 1).leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_power_of_two_rounds_up() {
        assert_eq!(ceil_power_of_two(100), 128);
        assert_eq!(ceil_power_of_two(16), 16);
        assert_eq!(ceil_power_of_two(255), 256);
        assert_eq!(ceil_power_of_two(0), 1);
    }

    #[test]
    fn defaults_match_overview() {
        let c = Config::default();
        assert_eq!(c.num_processors, 4);
        assert_eq!(c.buffer_size, 2 * 1024 * 1024);
        assert_eq!(c.max_result_package_size, 32 * 1024);
        assert_eq!(c.num_buckets, 1024);
        assert_eq!(c.lease_list_size, 16);
        assert_eq!(c.lease_timeout_secs, 30);
        assert_eq!(c.bind_addr, "0.0.0.0:7000");
    }

    #[test]
    fn from_env_applies_overrides() {
        env::set_var("LEASECACHED_NUM_BUCKETS", "100");
        let c = Config::from_env();
        assert_eq!(c.num_buckets, 128);
        env::remove_var("LEASECACHED_NUM_BUCKETS");
    }
}
