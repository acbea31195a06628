//! Configuration access port trait.

/// Section/key lookup over a flat configuration source. Numeric getters
/// fall back to `default` when the key is absent or malformed.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
}
