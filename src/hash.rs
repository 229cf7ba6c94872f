/// Fast 2-value hash with xorshift, used to derive per-entity seeds for
/// the deterministic mock feed
#[inline(always)]
pub fn hash2(a: u64, b: u64) -> u64 {
    let mut seed = a
        .wrapping_mul(2654435761)
        .wrapping_add(b.wrapping_mul(2246822519));
    seed ^= seed << 13;
    seed ^= seed >> 7;
    seed ^= seed << 17;
    seed
}

/// Fast deterministic random in [0, 1) using splitmix64 - handles small
/// seeds properly
#[inline(always)]
pub fn rand_simple(seed: u64) -> f64 {
    let mut x = seed.wrapping_mul(0x9e3779b97f4a7c15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    (x >> 11) as f64 / 9007199254740992.0
}

/// Normally distributed deviate via Box-Muller, deterministic in `seed`
pub fn rand_normal(seed: u64, mean: f64, std_dev: f64) -> f64 {
    // shift into (0, 1] so the log stays finite
    let u1 = 1.0 - rand_simple(seed);
    let u2 = rand_simple(hash2(seed, 1));
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = std::f64::consts::TAU * u2;
    mean + std_dev * r * theta.cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rand_is_deterministic_and_unit_range() {
        for seed in 0..1000u64 {
            let v = rand_simple(seed);
            assert_eq!(v, rand_simple(seed));
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_normal_deviates_center_on_mean() {
        let n = 2000;
        let sum: f64 = (0..n).map(|i| rand_normal(hash2(42, i), 10.0, 0.5)).sum();
        let mean = sum / n as f64;
        assert!((mean - 10.0).abs() < 0.1, "sample mean {mean}");
    }
}
