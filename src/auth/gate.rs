use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Serializes login attempts per IP.
///
/// An attempt holds its IP's gate from the block check until its outcome
/// is recorded, so concurrent requests from one address are judged one
/// after another. Gates are dropped once nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct IpGates {
    gates: Arc<Mutex<HashMap<String, Gate>>>,
}

pub struct IpGuard {
    gates: Arc<Mutex<HashMap<String, Gate>>>,
    ip: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IpGates {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, ip: &str) -> IpGuard {
        let gate = {
            let mut map = self.gates.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(ip.to_string()).or_default().clone()
        };
        let guard = gate.lock_owned().await;
        IpGuard {
            gates: self.gates.clone(),
            ip: ip.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.gates.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for IpGuard {
    fn drop(&mut self) {
        // Release first so the map's count only sees waiters.
        self.guard.take();
        let mut map = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        if map.get(&self.ip).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            map.remove(&self.ip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_gate_removed_after_release() {
        let gates = IpGates::new();
        {
            let _guard = gates.acquire("10.0.0.1").await;
            assert_eq!(gates.len(), 1);
        }
        assert_eq!(gates.len(), 0);
    }

    #[tokio::test]
    async fn test_different_ips_do_not_wait_on_each_other() {
        let gates = IpGates::new();
        let _a = gates.acquire("10.0.0.1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), gates.acquire("10.0.0.2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_ip_is_serialized() {
        let gates = IpGates::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let gates = gates.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = gates.acquire("6.6.6.6").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(gates.len(), 0);
    }
}
