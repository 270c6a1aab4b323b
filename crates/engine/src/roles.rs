//! Validator selection and quorum.

use meshsim_types::{bft_quorum, PeerId};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Partition of the peer set into validators and seeds.
///
/// Validators evaluate the quorum condition and may propose blocks; seed
/// peers are the injection targets for new transactions. The quorum size is
/// fixed at selection time.
#[derive(Debug, Clone, Default)]
pub struct Roles {
    /// Validator flag indexed by `peer.0 - 1`.
    is_validator: Vec<bool>,
    /// Validator peers, sorted by id.
    validators: Vec<PeerId>,
    /// Seed peers, sorted by id.
    seeds: Vec<PeerId>,
    /// BFT quorum over the validator set.
    quorum: usize,
}

impl Roles {
    /// Mark `validator_count` peers, chosen uniformly at random, as
    /// validators; the rest become seeds.
    pub fn select(num_peers: u32, validator_count: u32, rng: &mut ChaCha8Rng) -> Self {
        let mut peers: Vec<PeerId> = (1..=num_peers).map(PeerId).collect();
        peers.shuffle(rng);
        let k = validator_count.min(num_peers) as usize;
        Self::from_validators(num_peers, &peers[..k])
    }

    /// Build a role assignment from an explicit validator list.
    pub fn from_validators(num_peers: u32, validators: &[PeerId]) -> Self {
        let mut is_validator = vec![false; num_peers as usize];
        for peer in validators {
            is_validator[(peer.0 - 1) as usize] = true;
        }
        let (validators, seeds): (Vec<PeerId>, Vec<PeerId>) =
            (1..=num_peers).map(PeerId).partition(|p| is_validator[(p.0 - 1) as usize]);
        let quorum = bft_quorum(validators.len());
        Self {
            is_validator,
            validators,
            seeds,
            quorum,
        }
    }

    /// Whether the peer is a validator.
    pub fn is_validator(&self, peer: PeerId) -> bool {
        self.is_validator
            .get((peer.0 - 1) as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Validator peers, sorted by id.
    pub fn validators(&self) -> &[PeerId] {
        &self.validators
    }

    /// Seed peers, sorted by id.
    pub fn seeds(&self) -> &[PeerId] {
        &self.seeds
    }

    /// The BFT quorum over the validator set.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Number of validators.
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Number of seed peers.
    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_select_partitions_validators_and_seeds() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let roles = Roles::select(10, 4, &mut rng);

        assert_eq!(roles.validator_count(), 4);
        assert_eq!(roles.seed_count(), 6);
        assert_eq!(roles.quorum(), 3);
        for &v in roles.validators() {
            assert!(roles.is_validator(v));
        }
        for &s in roles.seeds() {
            assert!(!roles.is_validator(s));
        }
    }

    #[test]
    fn test_quorum_boundaries() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(Roles::select(10, 1, &mut rng).quorum(), 1);
        assert_eq!(Roles::select(10, 4, &mut rng).quorum(), 3);
        assert_eq!(Roles::select(10, 7, &mut rng).quorum(), 5);
    }

    #[test]
    fn test_validator_count_capped_at_peer_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let roles = Roles::select(3, 10, &mut rng);

        assert_eq!(roles.validator_count(), 3);
        assert_eq!(roles.seed_count(), 0);
    }

    #[test]
    fn test_from_validators() {
        let roles = Roles::from_validators(5, &[PeerId(2), PeerId(4)]);

        assert_eq!(roles.validators(), &[PeerId(2), PeerId(4)]);
        assert_eq!(roles.seeds(), &[PeerId(1), PeerId(3), PeerId(5)]);
        assert_eq!(roles.quorum(), 1);
    }

    #[test]
    fn test_selection_deterministic() {
        let a = Roles::select(20, 7, &mut ChaCha8Rng::seed_from_u64(42));
        let b = Roles::select(20, 7, &mut ChaCha8Rng::seed_from_u64(42));

        assert_eq!(a.validators(), b.validators());
    }
}
