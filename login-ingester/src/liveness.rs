use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::http::StatusCode;

/// Heartbeat-based liveness for the worker loops. Each worker reports on
/// every loop iteration; a worker that has not reported within its deadline
/// flips the `/_liveness` probe to unhealthy so the orchestrator restarts
/// the process.
#[derive(Clone, Default)]
pub struct LivenessRegistry {
    components: Arc<RwLock<HashMap<String, Heartbeat>>>,
}

struct Heartbeat {
    deadline: Duration,
    last_report: Instant,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, deadline: Duration) -> LivenessHandle {
        let mut components = self.components.write().expect("liveness lock poisoned");
        components.insert(
            name.to_string(),
            Heartbeat {
                deadline,
                last_report: Instant::now(),
            },
        );
        LivenessHandle {
            name: name.to_string(),
            registry: self.clone(),
        }
    }

    pub fn get_status(&self) -> (StatusCode, String) {
        let components = self.components.read().expect("liveness lock poisoned");
        let mut healthy = true;
        let mut lines = Vec::with_capacity(components.len());
        for (name, heartbeat) in components.iter() {
            let alive = heartbeat.last_report.elapsed() < heartbeat.deadline;
            healthy &= alive;
            lines.push(format!(
                "{name}: {}",
                if alive { "healthy" } else { "stalled" }
            ));
        }
        lines.sort();
        let status = if healthy {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, lines.join("\n"))
    }

    fn report(&self, name: &str) {
        let mut components = self.components.write().expect("liveness lock poisoned");
        if let Some(heartbeat) = components.get_mut(name) {
            heartbeat.last_report = Instant::now();
        }
    }
}

#[derive(Clone)]
pub struct LivenessHandle {
    name: String,
    registry: LivenessRegistry,
}

impl LivenessHandle {
    /// Must be called more frequently than the registered deadline.
    pub fn report_healthy(&self) {
        self.registry.report(&self.name);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_fresh_heartbeats_are_healthy() {
        let registry = LivenessRegistry::new();
        let handle = registry.register("worker-0", Duration::from_secs(60));
        handle.report_healthy();
        let (status, body) = registry.get_status();
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("worker-0: healthy"));
    }

    #[test]
    fn stalled_heartbeat_fails_the_probe() {
        let registry = LivenessRegistry::new();
        let _handle = registry.register("worker-0", Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(5));
        let (status, body) = registry.get_status();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("worker-0: stalled"));
    }
}
