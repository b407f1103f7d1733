use crate::{ValidatorId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// An immutable ordered set of weighted validators. The position of a validator
/// in the set is its branch index in DAG vectors and validator state arrays
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(ValidatorId, Weight)>", into = "Vec<(ValidatorId, Weight)>")]
pub struct Validators {
    ids: Vec<ValidatorId>,
    weights: Vec<Weight>,
    positions: HashMap<ValidatorId, usize>,
    total_weight: Weight,
}

impl Validators {
    /// Builds a set ordered by descending weight, then ascending id. Zero-weight entries are dropped
    pub fn new(weights: impl IntoIterator<Item = (ValidatorId, Weight)>) -> Self {
        let mut sorted = weights.into_iter().filter(|(_, w)| *w > 0).collect::<BTreeMap<_, _>>().into_iter().collect::<Vec<_>>();
        sorted.sort_by(|(a_id, a_w), (b_id, b_w)| b_w.cmp(a_w).then(a_id.cmp(b_id)));
        sorted.into()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// Minimal weight strictly greater than 2/3 of the total
    pub fn quorum(&self) -> Weight {
        self.total_weight * 2 / 3 + 1
    }

    pub fn exists(&self, id: ValidatorId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get_idx(&self, id: ValidatorId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get_id(&self, idx: usize) -> ValidatorId {
        self.ids[idx]
    }

    pub fn get_weight(&self, id: ValidatorId) -> Weight {
        self.get_idx(id).map_or(0, |idx| self.weights[idx])
    }

    pub fn get_weight_by_idx(&self, idx: usize) -> Weight {
        self.weights[idx]
    }

    pub fn ids(&self) -> &[ValidatorId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (ValidatorId, Weight)> + '_ {
        self.ids.iter().copied().zip(self.weights.iter().copied())
    }
}

impl From<Vec<(ValidatorId, Weight)>> for Validators {
    fn from(ordered: Vec<(ValidatorId, Weight)>) -> Self {
        let positions = ordered.iter().enumerate().map(|(i, (id, _))| (*id, i)).collect();
        let total_weight = ordered.iter().map(|(_, w)| *w).sum();
        let (ids, weights) = ordered.into_iter().unzip();
        Self { ids, weights, positions, total_weight }
    }
}

impl From<Validators> for Vec<(ValidatorId, Weight)> {
    fn from(validators: Validators) -> Self {
        validators.ids.into_iter().zip(validators.weights).collect()
    }
}

/// Registration data of a validator as maintained by the validators driver
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorProfile {
    pub weight: Weight,
    /// X-only schnorr public key
    pub pubkey: Vec<u8>,
}

pub type ValidatorProfiles = BTreeMap<ValidatorId, ValidatorProfile>;

/// Builds the validator set out of the active profiles
pub fn validators_from_profiles(profiles: &ValidatorProfiles) -> Validators {
    Validators::new(profiles.iter().map(|(id, profile)| (*id, profile.weight)))
}
