//! Integration tests for tenrso-core
//!
//! These tests check that synthetic tensors and grid blocks agree with each
//! other the way the distributed engine relies on.

use scirs2_core::ndarray_ext::{array, Array2};
use tenrso_core::synthetic::{low_rank_tensor, random_low_rank};
use tenrso_core::{BlockPartition, DenseND};

#[test]
fn test_block_of_low_rank_is_low_rank_of_factor_blocks() {
    let (global, factors) = random_low_rank(&[4, 6, 2], 2, 3).unwrap();
    let part = BlockPartition::new(&[4, 6, 2], &[2, 3, 1]).unwrap();
    let coords = [1, 2, 0];

    let block = part.extract(&global, &coords).unwrap();
    let offsets = part.offsets(&coords).unwrap();
    let local = part.local_dims();

    // the block is generated by the matching row ranges of the factors
    let sub: Vec<Array2<f64>> = factors
        .iter()
        .enumerate()
        .map(|(mode, f)| {
            f.slice(scirs2_core::ndarray_ext::s![offsets[mode]..offsets[mode] + local[mode], ..])
                .to_owned()
        })
        .collect();
    let expected = low_rank_tensor(&sub, None).unwrap();

    for (a, b) in block.as_slice().iter().zip(expected.as_slice()) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_norm_of_blocks_adds_up() {
    let (global, _) = random_low_rank(&[4, 4, 4], 3, 9).unwrap();
    let part = BlockPartition::new(&[4, 4, 4], &[2, 2, 1]).unwrap();

    let mut sum = 0.0;
    for c0 in 0..2 {
        for c1 in 0..2 {
            sum += part.extract(&global, &[c0, c1, 0]).unwrap().norm_squared();
        }
    }
    assert!((sum - global.norm_squared()).abs() < 1e-9 * global.norm_squared());
}

#[test]
fn test_two_by_two_rank_one() {
    let ones = array![[1.0], [1.0]];
    let x = low_rank_tensor(&[ones.clone(), ones.clone(), ones], None).unwrap();
    assert_eq!(x, DenseND::ones(&[2, 2, 2]));
    assert_eq!(x.norm_squared(), 8.0);
}
