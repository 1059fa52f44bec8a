//! Picks the single offering to realise for a resource request.
//!
//! Candidates are filtered by requirement compatibility and minimum
//! resources, ordered by their cheapest compatible available offering (name
//! breaks ties), and the first candidate's cheapest offering wins. Offerings
//! tied on price prefer the zone with the most free addresses; remaining ties
//! go to a [`TieBreaker`]. [`RandomTieBreaker`] spreads launches across zones
//! when no capacity signal exists; tests inject [`LexicalTieBreaker`].

use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::offering::{InstanceType, Offering, Requirements, compare_prices};

/// Minimum resources a node must provide.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResourceRequest {
    /// vCPUs.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mib: u64,
    /// Boot disk in GiB.
    pub disk_gib: u64,
}

/// What the caller asks for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionRequest {
    /// Label constraints (zone, capacity type, platform, ...).
    pub requirements: Requirements,
    /// Resource minimums.
    pub resources: ResourceRequest,
}

/// The chosen instance type and offering.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Chosen instance type, with all its offerings.
    pub instance_type: InstanceType,
    /// Chosen offering.
    pub offering: Offering,
}

/// Raised when nothing satisfies the request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SelectionError {
    /// No candidate has a compatible, available offering meeting the minimums.
    /// Terminal for the attempt; retrying with the same inputs cannot succeed.
    #[error(
        "insufficient capacity: none of {candidates} instance types has a compatible available offering"
    )]
    NoCompatibleOffering {
        /// Number of candidates considered.
        candidates: usize,
    },
}

/// Chooses among offerings tied on price and headroom.
pub trait TieBreaker: Send + Sync {
    /// Returns the index of the chosen offering. `tied` is never empty.
    fn choose(&self, tied: &[&Offering]) -> usize;
}

/// Uniform random choice.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTieBreaker;

impl TieBreaker for RandomTieBreaker {
    fn choose(&self, tied: &[&Offering]) -> usize {
        if tied.is_empty() {
            return 0;
        }
        rand::thread_rng().gen_range(0..tied.len())
    }
}

/// Deterministic choice of the lexically smallest zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexicalTieBreaker;

impl TieBreaker for LexicalTieBreaker {
    fn choose(&self, tied: &[&Offering]) -> usize {
        tied.iter()
            .enumerate()
            .min_by(|(_, left), (_, right)| left.zone.cmp(&right.zone))
            .map_or(0, |(index, _)| index)
    }
}

/// Selection policy parameterised by its tie-breaker.
#[derive(Clone, Debug, Default)]
pub struct SelectionPolicy<T = RandomTieBreaker> {
    tie_breaker: T,
}

impl<T: TieBreaker> SelectionPolicy<T> {
    /// Builds a policy with the given tie-breaker.
    #[must_use]
    pub const fn new(tie_breaker: T) -> Self {
        Self { tie_breaker }
    }

    /// Picks one offering.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::NoCompatibleOffering`] when no candidate
    /// qualifies.
    pub fn select(
        &self,
        candidates: &[InstanceType],
        request: &SelectionRequest,
    ) -> Result<Selection, SelectionError> {
        let offering_fits = |offering: &Offering| {
            offering.available
                && offering.price.is_some()
                && offering.requirements().compatible(&request.requirements)
        };

        let mut eligible: Vec<(&InstanceType, Option<f64>)> = candidates
            .iter()
            .filter(|candidate| {
                candidate.requirements.compatible(&request.requirements)
                    && satisfies(candidate, &request.resources)
            })
            .map(|candidate| (candidate, candidate.cheapest_available(offering_fits)))
            .filter(|(_, price)| price.is_some())
            .collect();
        eligible.sort_by(|(left, left_price), (right, right_price)| {
            compare_prices(*left_price, *right_price).then_with(|| left.name.cmp(&right.name))
        });

        let no_offering = || SelectionError::NoCompatibleOffering {
            candidates: candidates.len(),
        };
        let (chosen, cheapest) = eligible.first().copied().ok_or_else(no_offering)?;

        let tied: Vec<&Offering> = chosen
            .offerings
            .iter()
            .filter(|&offering| offering_fits(offering) && same_price(offering.price, cheapest))
            .collect();
        let offering = self.break_tie(&tied).ok_or_else(no_offering)?;

        info!(
            instance_type = %chosen.name,
            zone = %offering.zone,
            capacity_type = %offering.capacity_type,
            price = ?offering.price,
            "selected offering"
        );
        Ok(Selection {
            instance_type: chosen.clone(),
            offering: offering.clone(),
        })
    }

    fn break_tie<'a>(&self, tied: &[&'a Offering]) -> Option<&'a Offering> {
        let best_headroom = tied
            .iter()
            .filter_map(|offering| offering.available_ips)
            .max();
        let preferred: Vec<&Offering> = match best_headroom {
            Some(best) => tied
                .iter()
                .copied()
                .filter(|offering| offering.available_ips == Some(best))
                .collect(),
            None => tied.to_vec(),
        };
        match preferred.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => many
                .get(self.tie_breaker.choose(many))
                .or_else(|| many.first())
                .copied(),
        }
    }
}

fn same_price(left: Option<f64>, right: Option<f64>) -> bool {
    compare_prices(left, right).is_eq() && left.is_some()
}

fn satisfies(candidate: &InstanceType, minimums: &ResourceRequest) -> bool {
    candidate.capacity.cpu >= minimums.cpu
        && candidate.capacity.memory_mib >= minimums.memory_mib
        && candidate.capacity.disk_gib >= minimums.disk_gib
}
