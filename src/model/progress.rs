use std::sync::Arc;

/// Transfer progress reported by the transport, zero or more times before
/// the terminal completion. The sink runs on the transport task; callers
/// needing a specific execution context should bounce through a channel.
pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    pub transferred: u64,
    /// Expected total, when the transport knows it.
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(transferred: u64, total: Option<u64>) -> Self {
        Progress { transferred, total }
    }

    /// Completed fraction in `0.0..=1.0`, when the total is known and non-zero.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.transferred as f64 / total as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        assert_eq!(Progress::new(50, Some(200)).fraction(), Some(0.25));
        assert_eq!(Progress::new(50, None).fraction(), None);
        assert_eq!(Progress::new(0, Some(0)).fraction(), None);
    }
}
