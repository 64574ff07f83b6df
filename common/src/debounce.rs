/// Drops a decoded code that repeats the last forwarded one inside the
/// repeat window. Suppressed repeats do not move the window.
#[derive(Debug, Clone, Default)]
pub struct DebounceFilter {
    last: Option<(u32, u64)>,
}

impl DebounceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, code: u32, now_ms: u64, window_ms: u64) -> bool {
        if let Some((last_code, last_ms)) = self.last {
            if last_code == code && now_ms.saturating_sub(last_ms) < window_ms {
                return false;
            }
        }

        self.last = Some((code, now_ms));
        true
    }

    pub fn last_code(&self) -> Option<u32> {
        self.last.map(|(code, _)| code)
    }
}
