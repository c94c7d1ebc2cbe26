//! Scripted random source for exact-draw tests.

use std::collections::VecDeque;

use super::clock::RandomSource;

/// Replays a fixed list of uniforms and counts how many were consumed.
///
/// Panics when the script runs out so a test notices an unexpected draw.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    values: VecDeque<f64>,
    draws: usize,
}

impl ScriptedRng {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            draws: 0,
        }
    }

    /// Number of uniforms consumed so far.
    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for ScriptedRng {
    fn random(&mut self) -> f64 {
        self.draws += 1;
        match self.values.pop_front() {
            Some(value) => value,
            None => panic!("scripted rng exhausted after {} draws", self.draws - 1),
        }
    }
}
