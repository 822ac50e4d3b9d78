use std::sync::Arc;

/// Immutable snapshot of the simulation state relevant to decision making.
///
/// Cloning is cheap: all clones of one snapshot share the same feature
/// allocation, which is what lets the host hand the same snapshot to every
/// waiter of a collapsed reset.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    features: Arc<[f32]>,
    terminal: bool,
    frame: u64,
}

impl Observation {
    pub fn new(features: Vec<f32>, terminal: bool) -> Self {
        Observation {
            features: features.into(),
            terminal,
            frame: 0,
        }
    }

    /// Stamp the host frame counter at which the snapshot was taken.
    pub(crate) fn at_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    /// Feature at `index`. Panics when out of range.
    pub fn feature(&self, index: usize) -> f32 {
        self.features[index]
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Number of ticks the host had executed when this snapshot was taken.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// True when both observations are the very same snapshot.
    pub fn same_snapshot(&self, other: &Observation) -> bool {
        Arc::ptr_eq(&self.features, &other.features) && self.frame == other.frame
    }
}
