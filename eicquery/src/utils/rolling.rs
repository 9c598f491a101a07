use arrayvec::ArrayVec;
use tracing::warn;

const MAX_WINDOW_SIZE: usize = 100;

/// Streaming median over a sliding window.
///
/// Keeps the window contents sorted with an insertion-sort step per
/// value, which is faster than re-sorting for the window sizes used by
/// baseline estimation (typically < 25).
pub struct RollingMedianCalculator<T: PartialOrd + Copy> {
    window_size: usize,
    data: ArrayVec<(T, usize), MAX_WINDOW_SIZE>,
    index: usize,
}

impl<T: PartialOrd + Copy> RollingMedianCalculator<T> {
    pub fn new(window_size: usize) -> Self {
        let mut window_size_use = window_size.max(1);
        if window_size > MAX_WINDOW_SIZE {
            warn!(
                "Window size {} is larger than max size {}. Clamping to max size.",
                window_size, MAX_WINDOW_SIZE
            );
            window_size_use = MAX_WINDOW_SIZE;
        }
        Self {
            window_size: window_size_use,
            data: ArrayVec::new(),
            index: 0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn add(&mut self, value: T) {
        if self.data.len() > (self.window_size - 1) {
            let min_index_keep = (self.index - self.window_size) + 1;
            self.data.retain(|x| x.1 >= min_index_keep);
        }
        self.insert_in_position((value, self.index));
        self.index += 1;
    }

    fn insert_in_position(&mut self, last: (T, usize)) {
        let mut pos = self.data.len();
        while pos > 0 && last.0 < self.data[pos - 1].0 {
            pos -= 1;
        }
        self.data.insert(pos, last);
    }

    pub fn median(&self) -> Option<T> {
        if self.data.len() < self.window_size {
            None
        } else {
            Some(self.data[self.data.len() / 2].0)
        }
    }
}

/// Rolling median of `values`, padded with `pad_value` where the window
/// does not fit.
pub fn rolling_median<T: PartialOrd + Copy>(
    values: &[T],
    window_size: usize,
    pad_value: T,
) -> Vec<T> {
    let mut out = vec![pad_value; values.len()];
    if values.is_empty() {
        return out;
    }
    let mut rolling = RollingMedianCalculator::new(window_size);
    let window_size = rolling.window_size();
    let offset = window_size / 2;
    for (i, value) in values.iter().enumerate() {
        rolling.add(*value);
        if i >= (window_size - 1) {
            out[i - offset] = rolling.median().unwrap_or(pad_value);
        }
    }
    out
}
