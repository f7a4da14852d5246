//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
///
/// There is deliberately no cap on concurrent job executions: every claimed
/// job runs as its own task. Resource pressure is bounded by job submission
/// volume, which is external to this process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for capture output and scratch files
    pub work_dir: String,
    /// Poll interval for the expression engine's job state
    pub poll_interval: Duration,
    /// Confidence threshold below which emotions are truncated
    pub confidence_threshold: f64,
    /// Poll interval for a camera's stopRequested flag
    pub camera_stop_poll_interval: Duration,
    /// Graceful shutdown timeout for in-flight executions
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: "/tmp/roarscore".to_string(),
            poll_interval: Duration::from_secs(10),
            confidence_threshold: 0.25,
            camera_stop_poll_interval: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORKER_DATA_DIR")
                .unwrap_or_else(|_| "/tmp/roarscore".to_string()),
            poll_interval: Duration::from_secs(
                std::env::var("WORKER_ENGINE_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            confidence_threshold: std::env::var("EMOTION_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.25),
            camera_stop_poll_interval: Duration::from_secs(
                std::env::var("WORKER_STOP_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!((config.confidence_threshold - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("WORKER_ENGINE_POLL_SECS", "3");
        std::env::set_var("EMOTION_CONFIDENCE_THRESHOLD", "0.5");
        let config = WorkerConfig::from_env();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert!((config.confidence_threshold - 0.5).abs() < f64::EPSILON);
        std::env::remove_var("WORKER_ENGINE_POLL_SECS");
        std::env::remove_var("EMOTION_CONFIDENCE_THRESHOLD");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        std::env::set_var("EMOTION_CONFIDENCE_THRESHOLD", "very confident");
        let config = WorkerConfig::from_env();
        assert!((config.confidence_threshold - 0.25).abs() < f64::EPSILON);
        std::env::remove_var("EMOTION_CONFIDENCE_THRESHOLD");
    }
}
