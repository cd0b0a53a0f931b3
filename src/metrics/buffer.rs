use std::collections::HashMap;

/// Raw samples accumulated per series name since the last flush.
///
/// Not synchronised; the owning aggregator wraps it in a mutex. A name,
/// once seen, keeps its slot for the process lifetime so that an idle
/// series still shows up (zeroed) in the next snapshot.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    series: HashMap<String, Vec<f64>>,
    max_series: Option<usize>,
}

/// Outcome of [`SampleBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Stored,
    /// A new name would exceed `max_series`; the sample was dropped.
    OverCapacity,
}

impl SampleBuffer {
    pub fn new(max_series: Option<usize>) -> Self {
        Self {
            series: HashMap::new(),
            max_series,
        }
    }

    pub fn push(&mut self, name: &str, value: f64) -> Push {
        if let Some(samples) = self.series.get_mut(name) {
            samples.push(value);
            return Push::Stored;
        }
        if self.max_series.is_some_and(|max| self.series.len() >= max) {
            return Push::OverCapacity;
        }
        self.series.insert(name.to_owned(), vec![value]);
        Push::Stored
    }

    /// Move every series' samples out, leaving an empty buffer per name.
    pub fn take(&mut self) -> Vec<(String, Vec<f64>)> {
        self.series
            .iter_mut()
            .map(|(name, samples)| (name.clone(), std::mem::take(samples)))
            .collect()
    }

    /// Number of distinct series names ever seen.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Samples currently buffered for `name`.
    pub fn pending(&self, name: &str) -> usize {
        self.series.get(name).map_or(0, Vec::len)
    }
}
