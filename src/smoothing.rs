use std::collections::{HashMap, VecDeque};

/// Filter state for a single beacon identity.
#[derive(Debug, Clone)]
struct FilterState {
    /// Most recent raw samples, oldest evicted on overflow.
    window: VecDeque<i32>,
    ema: Option<f64>,
}

impl FilterState {
    fn new(capacity: usize) -> Self {
        FilterState {
            window: VecDeque::with_capacity(capacity),
            ema: None,
        }
    }
}

/// Per-identity RSSI smoothing: a bounded sample window plus an exponential
/// moving average seeded from the window mean.
///
/// The windowed mean bootstraps a stable seed on first observation so a
/// single noisy sample does not spike the filter; after that the EMA tracks
/// with low latency. State for an identity must be discarded when the
/// registry evicts that beacon, otherwise a reappearing beacon would seed
/// from minutes-old samples.
#[derive(Debug)]
pub struct RssiSmoother {
    window_size: usize,
    alpha: f64,
    states: HashMap<String, FilterState>,
}

impl RssiSmoother {
    pub fn new(window_size: usize, alpha: f64) -> Self {
        RssiSmoother {
            window_size: window_size.max(1),
            alpha,
            states: HashMap::new(),
        }
    }

    /// Feed one raw sample for `identity` and return the smoothed value.
    pub fn smooth(&mut self, identity: &str, raw_rssi: i32) -> i32 {
        let state = self
            .states
            .entry(identity.to_string())
            .or_insert_with(|| FilterState::new(self.window_size));

        state.window.push_back(raw_rssi);
        while state.window.len() > self.window_size {
            state.window.pop_front();
        }

        let seed_average =
            state.window.iter().sum::<i32>() as f64 / state.window.len() as f64;

        let ema = match state.ema {
            None => seed_average,
            Some(previous) => self.alpha * raw_rssi as f64 + (1.0 - self.alpha) * previous,
        };
        state.ema = Some(ema);

        ema.round() as i32
    }

    /// Drop all filter state for an identity. Called on registry eviction.
    pub fn forget(&mut self, identity: &str) {
        self.states.remove(identity);
    }

    /// Drop every identity's state.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }
}
