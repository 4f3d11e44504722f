use domain::Timestamp;

/// 时间来源抽象，便于在测试中固定时间。
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

#[cfg(test)]
pub mod fixed {
    use super::*;
    use std::sync::Mutex;

    /// 固定时钟，每次读取递增一毫秒，保证测试内时间单调。
    pub struct FixedClock {
        current: Mutex<Timestamp>,
    }

    impl FixedClock {
        pub fn starting_at(start: Timestamp) -> Self {
            Self {
                current: Mutex::new(start),
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            let mut current = self.current.lock().unwrap();
            let now = *current;
            *current += chrono::Duration::milliseconds(1);
            now
        }
    }
}
