//! Shared utility functions

use std::thread;
use std::time::Duration;
use tracing::warn;

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
/// Returns the first success, or the error from the final attempt.
/// `attempts` of zero is treated as one.
pub fn retry<T, E, F>(label: &str, attempts: usize, delay: Duration, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {}ms",
                    label,
                    attempt,
                    attempts,
                    e,
                    delay.as_millis()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
