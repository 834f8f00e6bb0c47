use crate::codec::Codec;
use crate::error::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Candidate solution: a fixed-length bit string plus its memoized objectives
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// Gray-coded genotype, one bit (0 or 1) per entry
    pub genes: Vec<u8>,
    /// Cached objective vector; `None` until evaluated or after any bit changed
    pub fitness: Option<Vec<f64>>,

    /// Generation that produced this genotype
    pub epoch: usize,
    /// Parents of the individual in the generation context
    pub parents: Option<Vec<u64>>,
    /// Identifier hash of the genotype
    pub hash: u64,
}

impl Individual {
    pub fn new(genes: Vec<u8>) -> Individual {
        let mut individual = Individual {
            genes,
            fitness: None,
            epoch: 0,
            parents: None,
            hash: 0,
        };
        individual.compute_hash();
        individual
    }

    /// Random genotype drawn through the codec.
    pub fn random<R: Rng>(codec: &Codec, rng: &mut R) -> Individual {
        Individual::new(codec.encode(rng))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.fitness.is_some()
    }

    pub fn objectives(&self) -> Option<&[f64]> {
        self.fitness.as_deref()
    }

    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// Flips one bit and drops the cached objectives. The hash is left stale.
    pub fn flip(&mut self, position: usize) {
        self.genes[position] ^= 1;
        self.invalidate();
    }

    pub fn compute_hash(&mut self) {
        let mut hasher = DefaultHasher::new();
        self.genes.hash(&mut hasher);
        self.hash = hasher.finish();
    }

    pub fn decode(&self, codec: &Codec) -> Result<Vec<f64>> {
        codec.decode(&self.genes)
    }

    pub fn display(&self, codec: &Codec) -> String {
        let params = match self.decode(codec) {
            Ok(values) => values
                .iter()
                .map(|p| format!("{:.5}", p))
                .collect::<Vec<String>>()
                .join(", "),
            Err(e) => e.to_string(),
        };
        let objectives = match self.objectives() {
            Some(values) => values
                .iter()
                .map(|o| format!("{:.5}", o))
                .collect::<Vec<String>>()
                .join(", "),
            None => "not evaluated".to_string(),
        };
        format!("parameters = [{}]  objectives = [{}]", params, objectives)
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.genes.iter().map(|b| if *b == 0 { '0' } else { '1' }).collect();
        f.debug_struct("Individual")
            .field("genes", &bits)
            .field("fitness", &self.fitness)
            .field("epoch", &self.epoch)
            .field("hash", &format!("{:016x}", self.hash))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Encoding;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_flip_invalidates_cache() {
        let mut individual = Individual::new(vec![0, 1, 0, 1]);
        individual.fitness = Some(vec![1.0, 2.0]);
        assert!(individual.is_valid());

        individual.flip(2);
        assert_eq!(individual.genes, vec![0, 1, 1, 1]);
        assert!(!individual.is_valid());
        assert!(individual.objectives().is_none());
    }

    #[test]
    fn test_random_individual_has_codec_length() {
        let codec = Codec::new(&Encoding::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let individual = Individual::random(&codec, &mut rng);
        assert_eq!(individual.len(), codec.genome_len());
        assert!(!individual.is_valid());
        assert_eq!(individual.decode(&codec).unwrap().len(), codec.n_params);
    }

    #[test]
    fn test_hash_depends_on_genes_only() {
        let mut a = Individual::new(vec![1, 0, 1, 1]);
        let b = Individual::new(vec![1, 0, 1, 1]);
        a.fitness = Some(vec![3.0]);
        a.epoch = 9;
        a.compute_hash();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_display_mentions_missing_evaluation() {
        let codec = Codec::new(&Encoding::default()).unwrap();
        let individual = Individual::new(vec![0; codec.genome_len()]);
        let text = individual.display(&codec);
        assert!(text.contains("-1.00000"));
        assert!(text.contains("not evaluated"));
    }

    #[test]
    fn test_display_reports_wrong_length() {
        let codec = Codec::new(&Encoding::default()).unwrap();
        let individual = Individual::new(vec![0; 5]);
        assert!(individual.display(&codec).contains("Genotype length mismatch"));
    }
}
