use crate::error::{OptError, Result};
use crate::gray::{gray_to_int, int_to_gray};
use crate::param::{Encoding, ParamRange};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Widest segment we accept, so that raw codes and their rescaling stay exact in u64/f64.
pub const MAX_BITS_PER_PARAM: usize = 52;

/// Fixed-width Gray-code layout of a parameter vector.
///
/// Each parameter owns `bits_per_param` consecutive bits of the genotype,
/// in declared order. Sizing is computed once from the configured grid.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Codec {
    pub n_params: usize,
    pub range: ParamRange,
    /// Grid points in `[low, high]` at spacing `step`, both ends included
    pub step_count: u64,
    pub bits_per_param: usize,
}

impl Codec {
    pub fn new(encoding: &Encoding) -> Result<Codec> {
        let range = encoding.param_range;
        let step_count = step_count(&range)?;
        let bits_per_param = bits_for(step_count);

        if bits_per_param == 0 {
            return Err(OptError::Configuration(format!(
                "param_range ({}, {}, {}) holds a single grid point: derived bit width is 0.",
                range.low, range.high, range.step
            )));
        }
        if bits_per_param > MAX_BITS_PER_PARAM {
            return Err(OptError::Configuration(format!(
                "param_range ({}, {}, {}) needs {} bits per parameter (max {}).",
                range.low, range.high, range.step, bits_per_param, MAX_BITS_PER_PARAM
            )));
        }

        Ok(Codec {
            n_params: encoding.n_params,
            range,
            step_count,
            bits_per_param,
        })
    }

    /// Total genotype length.
    pub fn genome_len(&self) -> usize {
        self.n_params * self.bits_per_param
    }

    /// Number of distinct codes per segment, `2^bits_per_param`.
    pub fn code_count(&self) -> u64 {
        1u64 << self.bits_per_param
    }

    /// Draws a random genotype: one uniform code per parameter, Gray-encoded.
    ///
    /// Codes are drawn over the whole `2^bits_per_param` space, which is
    /// larger than `step_count` whenever the grid size is not a power of two.
    pub fn encode<R: Rng>(&self, rng: &mut R) -> Vec<u8> {
        let mut genes = Vec::with_capacity(self.genome_len());
        for _ in 0..self.n_params {
            let code = rng.gen_range(0..self.code_count());
            genes.extend(int_to_gray(code, self.bits_per_param));
        }
        genes
    }

    /// Maps a genotype of exactly `genome_len()` bits onto the parameter grid.
    ///
    /// The raw code is rescaled by `step_count / 2^bits_per_param` and rounded
    /// half to even. Values are not clamped to `high`.
    pub fn decode(&self, genes: &[u8]) -> Result<Vec<f64>> {
        if genes.len() != self.genome_len() {
            return Err(OptError::GenotypeLength {
                expected: self.genome_len(),
                got: genes.len(),
            });
        }
        Ok(genes
            .chunks(self.bits_per_param)
            .map(|segment| self.value_of(gray_to_int(segment)))
            .collect())
    }

    /// Grid index of a raw segment code.
    pub fn index_of(&self, raw: u64) -> u64 {
        let scaled = self.step_count as f64 * raw as f64 / self.code_count() as f64;
        scaled.round_ties_even() as u64
    }

    fn value_of(&self, raw: u64) -> f64 {
        self.range.low + self.range.step * self.index_of(raw) as f64
    }
}

/// Inclusive count of grid points; tolerates float noise such as 2.0 / 0.01 = 199.99999999999997.
///
/// Grids wider than `2^MAX_BITS_PER_PARAM` points, and spans that are negative
/// or not finite (a zero step for instance), are configuration errors.
pub fn step_count(range: &ParamRange) -> Result<u64> {
    let spans = (range.high - range.low) / range.step;
    let max_spans = (1u64 << MAX_BITS_PER_PARAM) as f64;
    if !spans.is_finite() || spans < 0.0 || spans > max_spans {
        return Err(OptError::Configuration(format!(
            "param_range ({}, {}, {}) does not describe a grid of at most 2^{} points.",
            range.low, range.high, range.step, MAX_BITS_PER_PARAM
        )));
    }
    ((spans + 1e-9).floor() as u64).checked_add(1).ok_or_else(|| {
        OptError::Configuration(format!(
            "param_range ({}, {}, {}) holds too many grid points.",
            range.low, range.high, range.step
        ))
    })
}

/// Smallest `b` with `2^b >= count`.
pub fn bits_for(count: u64) -> usize {
    if count <= 1 {
        return 0;
    }
    (u64::BITS - (count - 1).leading_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn reference_encoding() -> Encoding {
        Encoding {
            n_params: 3,
            param_range: ParamRange { low: -1.0, high: 1.0, step: 0.01 },
        }
    }

    #[test]
    fn test_sizing_reference_range() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        assert_eq!(codec.step_count, 201);
        assert_eq!(codec.bits_per_param, 8);
        assert_eq!(codec.code_count(), 256);
        assert_eq!(codec.genome_len(), 24);
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(201), 8);
        assert_eq!(bits_for(256), 8);
        assert_eq!(bits_for(257), 9);
    }

    #[test]
    fn test_step_count_non_divisible_range() {
        // 0.0, 0.3, 0.6, 0.9
        let range = ParamRange { low: 0.0, high: 1.0, step: 0.3 };
        assert_eq!(step_count(&range).unwrap(), 4);
        let range = ParamRange { low: 0.0, high: 1.0, step: 0.25 };
        assert_eq!(step_count(&range).unwrap(), 5);
    }

    #[test]
    fn test_tiny_step_is_rejected() {
        let encoding = Encoding {
            n_params: 1,
            param_range: ParamRange { low: 0.0, high: 1.0, step: 1e-300 },
        };
        assert!(Codec::new(&encoding).unwrap_err().is_configuration());
    }

    #[test]
    fn test_zero_or_negative_step_is_rejected() {
        for step in [0.0, -0.1, f64::NAN] {
            let encoding = Encoding {
                n_params: 1,
                param_range: ParamRange { low: 0.0, high: 1.0, step },
            };
            assert!(Codec::new(&encoding).unwrap_err().is_configuration());
        }
    }

    #[test]
    fn test_widest_accepted_grid() {
        // 2^52 spans need 53 bits, one more than accepted
        let range = ParamRange { low: 0.0, high: (1u64 << 52) as f64, step: 1.0 };
        assert_eq!(step_count(&range).unwrap(), (1u64 << 52) + 1);
        let encoding = Encoding { n_params: 1, param_range: range };
        assert!(Codec::new(&encoding).unwrap_err().is_configuration());

        let range = ParamRange { low: 0.0, high: ((1u64 << 52) - 1) as f64, step: 1.0 };
        let codec = Codec::new(&Encoding { n_params: 1, param_range: range }).unwrap();
        assert_eq!(codec.bits_per_param, 52);
    }

    #[test]
    fn test_single_point_grid_is_rejected() {
        let encoding = Encoding {
            n_params: 2,
            param_range: ParamRange { low: 0.0, high: 0.5, step: 1.0 },
        };
        assert!(Codec::new(&encoding).unwrap_err().is_configuration());
    }

    #[test]
    fn test_encode_has_fixed_length() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            let genes = codec.encode(&mut rng);
            assert_eq!(genes.len(), codec.genome_len());
            assert!(genes.iter().all(|&b| b <= 1));
        }
    }

    #[test]
    fn test_decode_returns_n_params_values() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let params = codec.decode(&codec.encode(&mut rng)).unwrap();
            assert_eq!(params.len(), codec.n_params);
            for p in params {
                assert!(p >= -1.0 - 1e-9 && p <= 1.0 + 1e-9, "decoded value {} off grid", p);
            }
        }
    }

    #[test]
    fn test_decode_extremes() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        let zeros = vec![0u8; codec.genome_len()];
        assert_eq!(codec.decode(&zeros).unwrap(), vec![-1.0, -1.0, -1.0]);

        // all-ones Gray segment is code 170, not 255
        let ones = vec![1u8; codec.genome_len()];
        assert_eq!(gray_to_int(&ones[..8]), 170);

        // the largest raw code lands on index round(201 * 255 / 256) = 200
        let top = int_to_gray(255, 8);
        assert_eq!(codec.index_of(255), 200);
        let genes: Vec<u8> = top.iter().chain(top.iter()).chain(top.iter()).copied().collect();
        for p in codec.decode(&genes).unwrap() {
            assert!((p - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_index_rounds_half_to_even() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        // 201 * 128 / 256 = 100.5
        assert_eq!(codec.index_of(128), 100);
        // 201 * 64 / 256 = 50.25
        assert_eq!(codec.index_of(64), 50);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let genes = codec.encode(&mut rng);
        assert_eq!(codec.decode(&genes).unwrap(), codec.decode(&genes).unwrap());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let codec = Codec::new(&reference_encoding()).unwrap();
        let short = vec![0u8; codec.genome_len() - 3];
        assert!(matches!(
            codec.decode(&short),
            Err(OptError::GenotypeLength { expected: 24, got: 21 })
        ));
        let long = vec![0u8; codec.genome_len() + 8];
        assert!(codec.decode(&long).is_err());
    }
}
