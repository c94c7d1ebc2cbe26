//! Website pages and weighted page transitions.

use std::collections::BTreeMap;

use clickstream_core::config::SiteGraphConfig;

use crate::deterministic::{RandomSource, SimulationError};

/// One weighted outgoing edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub target: String,
    pub weight: f64,
}

/// A page of the simulated site. Immutable once the graph is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub name: String,
    pub dropoff_p: f64,
    /// Ordered as configured
    pub transitions: Vec<Transition>,
}

impl Page {
    /// A page with no transitions or only zero weights ends every session.
    pub fn is_terminal(&self) -> bool {
        self.transitions.iter().map(|t| t.weight).sum::<f64>() <= 0.0
    }
}

/// Page lookups the session engine relies on.
pub trait PageGraph {
    fn page(&self, name: &str) -> Option<&Page>;

    /// Draws the page following `current`, or `None` for a terminal or
    /// unknown page. No uniform is consumed when there is nothing to pick.
    fn next_page<'a>(&'a self, current: &str, rng: &mut dyn RandomSource) -> Option<&'a str>;
}

/// Site graph built from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteGraph {
    pages: BTreeMap<String, Page>,
}

impl SiteGraph {
    /// Builds the graph, rejecting out-of-range probabilities and weights.
    /// Strict graphs also reject transitions to undefined pages.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidModel` - If any page or transition is invalid
    pub fn from_config(config: &SiteGraphConfig) -> Result<Self, SimulationError> {
        let invalid = |reason: String| SimulationError::InvalidModel {
            component: "site_graph",
            reason,
        };

        let mut pages = BTreeMap::new();
        for (name, page) in &config.pages {
            if name.is_empty() {
                return Err(invalid("page names must be non-empty".to_string()));
            }
            if !(0.0..=1.0).contains(&page.dropoff_p) {
                return Err(invalid(format!("{name}.dropoff_p must be in [0, 1]")));
            }

            let mut transitions = Vec::with_capacity(page.transitions.len());
            for (idx, (target, weight)) in page.transitions.iter().enumerate() {
                if target.is_empty() {
                    return Err(invalid(format!("{name}.transitions[{idx}] has an empty target")));
                }
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(invalid(format!("{name}.transitions[{idx}] weight must be >= 0")));
                }
                transitions.push(Transition {
                    target: target.clone(),
                    weight: *weight,
                });
            }

            pages.insert(
                name.clone(),
                Page {
                    name: name.clone(),
                    dropoff_p: page.dropoff_p,
                    transitions,
                },
            );
        }

        if config.strict {
            for page in pages.values() {
                if let Some(missing) = page
                    .transitions
                    .iter()
                    .find(|t| !pages.contains_key(&t.target))
                {
                    return Err(invalid(format!(
                        "{}.transitions references unknown page {:?}",
                        page.name, missing.target
                    )));
                }
            }
        }

        Ok(Self { pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageGraph for SiteGraph {
    fn page(&self, name: &str) -> Option<&Page> {
        self.pages.get(name)
    }

    fn next_page<'a>(&'a self, current: &str, rng: &mut dyn RandomSource) -> Option<&'a str> {
        let page = self.pages.get(current)?;
        let total: f64 = page.transitions.iter().map(|t| t.weight).sum();
        if page.transitions.is_empty() || total <= 0.0 {
            return None;
        }

        let normalized: Vec<f64> = page.transitions.iter().map(|t| t.weight / total).collect();
        let idx = rng.weighted_index(&normalized)?;
        Some(page.transitions[idx].target.as_str())
    }
}
