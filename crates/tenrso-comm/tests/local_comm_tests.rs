//! Multi-rank behavior of the thread-backed communicator

use tenrso_comm::{
    Collective, CommError, Communicator, LocalComm, NtfCommunicator, ProcessGrid, ReduceOp,
};

#[test]
fn test_all_gather_rank_order() {
    let out = LocalComm::run(3, |comm| {
        let r = comm.rank() as f64;
        let mut recv = vec![0.0; 6];
        comm.all_gather(&[r, 10.0 * r], &mut recv).unwrap();
        recv
    });
    for recv in out {
        assert_eq!(recv, vec![0.0, 0.0, 1.0, 10.0, 2.0, 20.0]);
    }
}

#[test]
fn test_reduce_scatter_block() {
    let out = LocalComm::run(2, |comm| {
        let r = comm.rank() as f64;
        let send = [1.0 + r, 2.0 + r, 3.0 + r, 4.0 + r];
        let mut recv = [0.0; 2];
        comm.reduce_scatter_block(&send, &mut recv).unwrap();
        recv
    });
    assert_eq!(out[0], [3.0, 5.0]);
    assert_eq!(out[1], [7.0, 9.0]);
}

#[test]
fn test_reduce_scatter_partitions_all_reduce() {
    // the blocks received across ranks concatenate to the full all-reduce
    let out = LocalComm::run(4, |comm| {
        let r = comm.rank();
        let send: Vec<f64> = (0..8).map(|i| ((i * 3 + r * 5) % 7) as f64).collect();
        let mut block = vec![0.0; 2];
        comm.reduce_scatter_block(&send, &mut block).unwrap();
        let mut full = send.clone();
        comm.all_reduce(&mut full, ReduceOp::Sum).unwrap();
        (block, full)
    });
    let concatenated: Vec<f64> = out.iter().flat_map(|(b, _)| b.clone()).collect();
    assert_eq!(concatenated, out[0].1);
}

#[test]
fn test_count_mismatch_is_reported_everywhere() {
    let out = LocalComm::run(2, |comm| {
        let mut buf = vec![1.0; 1 + comm.rank()];
        comm.all_reduce(&mut buf, ReduceOp::Sum)
    });
    for res in out {
        assert!(matches!(res, Err(CommError::CountMismatch { .. })));
    }
}

#[test]
fn test_departed_peer_aborts_collective() {
    let out = LocalComm::run(3, |comm| {
        if comm.rank() == 1 {
            return None;
        }
        Some(comm.barrier())
    });
    assert_eq!(out[0], Some(Err(CommError::Aborted)));
    assert_eq!(out[1], None);
    assert_eq!(out[2], Some(Err(CommError::Aborted)));
}

#[test]
#[should_panic(expected = "rank 2 failed")]
fn test_panic_is_resumed() {
    LocalComm::run(3, |comm| {
        if comm.rank() == 2 {
            panic!("rank 2 failed");
        }
        // peers must not hang on the missing rank
        assert_eq!(comm.barrier(), Err(CommError::Aborted));
    });
}

#[test]
fn test_ntf_communicator_groups() {
    let out = LocalComm::run(4, |world| {
        let grid = ProcessGrid::new(&[2, 2, 1]).unwrap();
        let comm = NtfCommunicator::new(world, grid).unwrap();
        comm.verify_topology().unwrap();

        let slice_sizes: Vec<usize> = (0..3).map(|m| comm.slice(m).size()).collect();
        let fiber_sizes: Vec<usize> = (0..3).map(|m| comm.fiber(m).size()).collect();

        // sum of world ranks within the slice of mode 0
        let slice_sum = comm
            .scope(Collective::MttkrpReduceScatter, 0)
            .all_reduce_scalar(comm.rank() as f64, ReduceOp::Sum)
            .unwrap();
        let world_sum = comm
            .scope(Collective::GramAllReduce, 0)
            .all_reduce_scalar(comm.rank() as f64, ReduceOp::Sum)
            .unwrap();
        (comm.coords().to_vec(), slice_sizes, fiber_sizes, slice_sum, world_sum, comm.slice_rank(0))
    });

    assert_eq!(out[3].0, vec![1, 1, 0]);
    for (_, slices, fibers, _, world_sum, _) in &out {
        assert_eq!(slices, &vec![2, 2, 4]);
        assert_eq!(fibers, &vec![2, 2, 1]);
        assert_eq!(*world_sum, 6.0);
    }
    // slice of c0 = 0 holds ranks {0, 1}, of c0 = 1 holds {2, 3}
    assert_eq!(out[0].3, 1.0);
    assert_eq!(out[3].3, 5.0);
    assert_eq!(out[2].5, 0);
    assert_eq!(out[3].5, 1);
}

#[test]
fn test_grid_must_cover_world() {
    let out = LocalComm::run(3, |world| {
        let grid = ProcessGrid::new(&[2, 2]).unwrap();
        NtfCommunicator::new(world, grid).map(|_| ())
    });
    for res in out {
        assert!(matches!(res, Err(CommError::GridMismatch { .. })));
    }
}
