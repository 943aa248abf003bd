//! End-to-end behavior of the distributed engine

use scirs2_core::ndarray_ext::{array, s, Array2};
use tenrso_comm::{CommError, LocalComm, NtfCommunicator, ProcessGrid, SelfComm};
use tenrso_core::synthetic::{low_rank_tensor, random_factors, random_low_rank};
use tenrso_core::{BlockPartition, DenseND};
use tenrso_kernels::approx_equal;
use tenrso_ntf::{DistAuntf, NtfConfig, NtfError, NtfOutcome, Phase, UpdateAlgorithm};

fn single(modes: usize) -> NtfCommunicator<SelfComm> {
    NtfCommunicator::new(SelfComm, ProcessGrid::new(&[1].repeat(modes)).unwrap()).unwrap()
}

fn run_single(x: &DenseND<f64>, init: &[Array2<f64>], config: NtfConfig) -> NtfOutcome {
    let dims = x.dimensions().to_vec();
    let mut engine = DistAuntf::new(x.clone(), &dims, single(dims.len()), config).unwrap();
    engine.set_initial_factors(init.to_vec()).unwrap();
    engine.compute_ntf().unwrap()
}

/// Rows of each global factor owned by the process at `coords`
fn shards_for(
    partition: &BlockPartition,
    init: &[Array2<f64>],
    coords: &[usize],
    slice_rank: impl Fn(usize) -> usize,
) -> Vec<Array2<f64>> {
    let rows = partition.factor_shard_dims().unwrap();
    init.iter()
        .enumerate()
        .map(|(m, f)| {
            let off = partition.factor_shard_offset(m, coords, slice_rank(m)).unwrap();
            f.slice(s![off..off + rows[m], ..]).to_owned()
        })
        .collect()
}

fn run_grid(
    x: &DenseND<f64>,
    grid: &[usize],
    init: &[Array2<f64>],
    config: NtfConfig,
) -> Vec<NtfOutcome> {
    let dims = x.dimensions().to_vec();
    let partition = BlockPartition::new(&dims, grid).unwrap();
    LocalComm::run(grid.iter().product(), |world| {
        let comm = NtfCommunicator::new(world, ProcessGrid::new(grid).unwrap()).unwrap();
        let block = partition.extract(x, comm.coords()).unwrap();
        let shards = shards_for(&partition, init, comm.coords(), |m| comm.slice_rank(m));
        let mut engine = DistAuntf::new(block, &dims, comm, config.clone()).unwrap();
        engine.set_initial_factors(shards).unwrap();
        engine.compute_ntf().unwrap()
    })
}

fn separated_factors() -> Vec<Array2<f64>> {
    vec![
        array![[1.0, 0.1], [0.9, 0.0], [0.1, 1.0], [0.0, 0.8]],
        array![[0.2, 1.0], [1.0, 0.1], [0.8, 0.0], [0.0, 0.9]],
        array![[1.0, 0.0], [0.1, 0.7], [0.0, 1.0], [0.6, 0.2]],
    ]
}

#[test]
fn test_rank_one_ones_converges() {
    let x = DenseND::<f64>::ones(&[2, 2, 2]);
    let config = NtfConfig::new(1, UpdateAlgorithm::AnlsBpp)
        .with_iterations(50)
        .with_error(true);
    let engine = DistAuntf::new(x, &[2, 2, 2], single(3), config).unwrap();
    let outcome = engine.compute_ntf().unwrap();

    assert_eq!(outcome.errors.len(), 50);
    assert!(*outcome.errors.last().unwrap() < 1e-4);
    assert!(outcome.factors.iter().flatten().all(|&v| v >= 0.0));
}

#[test]
fn test_exact_rank_two_error_decreases() {
    let x = low_rank_tensor(&separated_factors(), None).unwrap();
    let init = random_factors(&[4, 4, 4], 2, 17);
    let config = NtfConfig::new(2, UpdateAlgorithm::AnlsBpp)
        .with_iterations(300)
        .with_error(true);
    let outcome = run_single(&x, &init, config);

    for pair in outcome.errors.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-7, "error rose from {} to {}", pair[0], pair[1]);
    }
    assert!(outcome.errors.iter().all(|&e| e >= 0.0));
    assert!(*outcome.errors.last().unwrap() < 1e-6);
}

#[test]
fn test_reported_error_matches_reconstruction() {
    let (x, _) = random_low_rank(&[3, 4, 5], 3, 2).unwrap();
    let init = random_factors(&[3, 4, 5], 2, 9);
    let config = NtfConfig::new(2, UpdateAlgorithm::CpAls)
        .with_iterations(4)
        .with_error(true);
    let outcome = run_single(&x, &init, config);

    let model = low_rank_tensor(&outcome.factors, Some(&outcome.lambda)).unwrap();
    let residual: f64 = x
        .as_slice()
        .iter()
        .zip(model.as_slice())
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    let direct = (residual / x.norm_squared()).sqrt();
    assert!((direct - outcome.errors[3]).abs() < 1e-6);
}

#[test]
fn test_distributed_matches_single_process() {
    let (x, _) = random_low_rank(&[4, 4, 4], 2, 5).unwrap();
    let init = random_factors(&[4, 4, 4], 2, 6);
    let config = NtfConfig::new(2, UpdateAlgorithm::AnlsBpp)
        .with_iterations(8)
        .with_error(true);

    let reference = run_single(&x, &init, config.clone());
    let outcomes = run_grid(&x, &[2, 2, 1], &init, config);

    assert_eq!(outcomes.len(), 4);
    for outcome in &outcomes {
        for (d, s) in outcome.errors.iter().zip(&reference.errors) {
            assert!((d - s).abs() < 1e-7, "distributed {d} vs single {s}");
        }
        assert_eq!(outcome.report.processes, 4);
    }
}

#[test]
fn test_dim_tree_matches_direct() {
    let (x, _) = random_low_rank(&[3, 4, 2, 5], 2, 21).unwrap();
    let init = random_factors(&[3, 4, 2, 5], 3, 22);
    let config = NtfConfig::new(3, UpdateAlgorithm::Hals)
        .with_iterations(6)
        .with_error(true);

    let direct = run_single(&x, &init, config.clone());
    let tree = run_single(&x, &init, config.with_dim_tree(true));
    for (a, b) in direct.errors.iter().zip(&tree.errors) {
        assert!((a - b).abs() < 1e-8);
    }
    for (a, b) in direct.factors.iter().zip(&tree.factors) {
        assert!(approx_equal(&a.view(), &b.view(), 1e-6));
    }
}

#[test]
fn test_distributed_mttkrp_owns_global_rows() {
    let dims = [4, 4, 4];
    let (x, _) = random_low_rank(&dims, 2, 8).unwrap();
    let partition = BlockPartition::new(&dims, &[2, 1, 2]).unwrap();
    let config = NtfConfig::new(2, UpdateAlgorithm::Mu);

    let ok = LocalComm::run(4, |world| {
        let comm = NtfCommunicator::new(world, ProcessGrid::new(&[2, 1, 2]).unwrap()).unwrap();
        let block = partition.extract(&x, comm.coords()).unwrap();
        let coords = comm.coords().to_vec();
        let slice_ranks: Vec<usize> = (0..3).map(|m| comm.slice_rank(m)).collect();
        let mut engine = DistAuntf::new(block, &dims, comm, config.clone()).unwrap();

        for m in 0..3 {
            engine.gather_ncp_factor(m).unwrap();
        }
        let globals: Vec<Array2<f64>> = (0..3)
            .map(|m| engine.factors().gather_global(m, engine.comm()).unwrap())
            .collect();
        let views: Vec<_> = globals.iter().map(|g| g.view()).collect();

        let mut all = true;
        for m in 0..3 {
            // the transposed gathered buffer is a view of the same rows
            all &= engine.engine().gathered_t(m).t() == engine.engine().gathered(m);

            engine.distmttkrp(m).unwrap();
            let full = tenrso_kernels::mttkrp(&x.view(), &views, m).unwrap();
            let n = engine.factors().factor(m).nrows();
            let off = partition.factor_shard_offset(m, &coords, slice_ranks[m]).unwrap();
            let owned = full.slice(s![off..off + n, ..]);
            all &= approx_equal(&engine.engine().local_mttkrp(m), &owned, 1e-10);
        }
        all
    });
    assert_eq!(ok, vec![true; 4]);
}

#[test]
fn test_reduce_scatter_partitions_block_mttkrp() {
    let dims = [4, 4, 4];
    let (x, _) = random_low_rank(&dims, 2, 13).unwrap();
    let partition = BlockPartition::new(&dims, &[2, 2, 1]).unwrap();
    let config = NtfConfig::new(2, UpdateAlgorithm::Mu);
    let mode = 0;

    let out = LocalComm::run(4, |world| {
        let comm = NtfCommunicator::new(world, ProcessGrid::new(&[2, 2, 1]).unwrap()).unwrap();
        let block = partition.extract(&x, comm.coords()).unwrap();
        let coord = comm.coords()[mode];
        let mut engine = DistAuntf::new(block, &dims, comm, config.clone()).unwrap();
        for m in 0..3 {
            engine.gather_ncp_factor(m).unwrap();
        }
        engine.distmttkrp(mode).unwrap();
        (
            coord,
            engine.engine().mttkrp(mode).to_owned(),
            engine.engine().local_mttkrp(mode).to_owned(),
        )
    });

    // slices of mode 0 are {0, 1} and {2, 3}; slice rank j owns row j of the block
    for members in [[0, 1], [2, 3]] {
        let summed = &out[members[0]].1 + &out[members[1]].1;
        assert_eq!(out[members[0]].0, out[members[1]].0);
        for (pos, &r) in members.iter().enumerate() {
            let owned = summed.slice(s![pos..pos + 1, ..]);
            assert!(approx_equal(&out[r].2.view(), &owned, 1e-12));
        }
    }
}

#[test]
fn test_mu_improves_fit() {
    let (x, _) = random_low_rank(&[4, 6, 5], 3, 31).unwrap();
    let config = NtfConfig::new(3, UpdateAlgorithm::Mu)
        .with_iterations(20)
        .with_error(true)
        .with_seed(4);
    let engine = DistAuntf::new(x, &[4, 6, 5], single(3), config).unwrap();
    let outcome = engine.compute_ntf().unwrap();
    let last = *outcome.errors.last().unwrap();
    assert!(outcome.errors.iter().all(|e| e.is_finite()));
    assert!(last < outcome.errors[0]);
}

#[test]
fn test_hals_improves_fit() {
    let (x, _) = random_low_rank(&[5, 4, 6], 2, 41).unwrap();
    let config = NtfConfig::new(2, UpdateAlgorithm::Hals)
        .with_iterations(30)
        .with_error(true);
    let engine = DistAuntf::new(x, &[5, 4, 6], single(3), config).unwrap();
    let outcome = engine.compute_ntf().unwrap();
    let first = outcome.errors[0];
    let last = *outcome.errors.last().unwrap();
    assert!(last.is_finite());
    assert!(last < first);
    assert!(outcome.factors.iter().flatten().all(|&v| v >= 0.0));
}

#[test]
fn test_regularization_shrinks_factors() {
    let (x, _) = random_low_rank(&[4, 4, 4], 2, 51).unwrap();
    let init = random_factors(&[4, 4, 4], 2, 52);
    let base = NtfConfig::new(2, UpdateAlgorithm::AnlsBpp).with_iterations(5);

    let plain = run_single(&x, &init, base.clone());
    let reg = run_single(&x, &init, base.with_regularizers(vec![50.0, 0.0, 50.0, 0.0, 50.0, 0.0]));
    // a heavy L2 penalty pulls the last mode's scale down
    assert!(reg.lambda.sum() < plain.lambda.sum());
}

#[test]
fn test_timing_report_without_error_rows() {
    let (x, _) = random_low_rank(&[4, 4], 2, 61).unwrap();
    let init = random_factors(&[4, 4], 2, 62);
    let outcomes = run_grid(&x, &[2, 2], &init, NtfConfig::new(2, UpdateAlgorithm::Hals).with_iterations(2));

    for outcome in &outcomes {
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.report.rows.len(), 10);
        let total = outcome.report.row(Phase::Total).unwrap();
        assert!(total.min <= total.avg && total.avg <= total.max);
    }
    let text = outcomes[0].report.to_string();
    assert!(text.starts_with("total_d::k::2::SIZE::4::algo::hals::root::"));
    assert_eq!(text.lines().count(), 10);
}

#[test]
fn test_bad_block_on_one_rank_aborts_peers() {
    let out = LocalComm::run(2, |world| {
        let comm = NtfCommunicator::new(world, ProcessGrid::new(&[2, 1]).unwrap()).unwrap();
        let local = if comm.rank() == 1 { [3, 4] } else { [2, 4] };
        let block = DenseND::<f64>::ones(&local);
        let config = NtfConfig::new(1, UpdateAlgorithm::Mu);
        DistAuntf::new(block, &[4, 4], comm, config).map(|_| ())
    });
    assert!(matches!(out[0], Err(NtfError::Comm(CommError::Aborted))));
    assert!(matches!(out[1], Err(NtfError::DimensionMismatch { mode: 0, .. })));
}

#[test]
fn test_indivisible_by_process_count() {
    let out = LocalComm::run(4, |world| {
        let comm = NtfCommunicator::new(world, ProcessGrid::new(&[2, 2]).unwrap()).unwrap();
        let block = DenseND::<f64>::ones(&[3, 1]);
        DistAuntf::new(block, &[6, 2], comm, NtfConfig::new(1, UpdateAlgorithm::Mu)).map(|_| ())
    });
    for res in out {
        assert!(matches!(res, Err(NtfError::IndivisibleDimension { mode: 0, parts: 4, .. })));
    }
}
