use approx::assert_abs_diff_eq;
use gm_algo::{Algorithm, DnsTrace, RunConfig, Runner, Trace};
use gm_block::{BlockLayout, CpuKernel};

#[test]
fn test_seed_and_reduce_trace() {
    let n = 4;
    let config = RunConfig::new(n, 8, Algorithm::Dns3D);
    let (a, b) = config.seeded_operands();
    let outcome = Runner::new().run(&config, &a, &b).unwrap();

    let reference = a
        .materialize(n)
        .unwrap()
        .matmul(&b.materialize(n).unwrap(), &CpuKernel::new())
        .unwrap();
    let layout = BlockLayout::new(n, 2).unwrap();

    let mut owners = 0;
    let mut a_seeds = 0;
    let mut b_seeds = 0;
    for product in &outcome.products {
        let coords = product.coords.as_ref().unwrap();
        let (i, j, k) = (coords[0], coords[1], coords[2]);
        let trace = match product.trace {
            Trace::Dns(trace) => trace,
            ref other => panic!("unexpected trace {:?}", other),
        };
        assert_eq!(
            trace,
            DnsTrace {
                holds_a_seed: j == k,
                holds_b_seed: i == k,
                stray_seeds: 0,
                reduce_contributions: if k == 0 { Some(2) } else { None },
            },
            "worker {:?}",
            coords
        );
        a_seeds += usize::from(trace.holds_a_seed);
        b_seeds += usize::from(trace.holds_b_seed);

        match &product.block {
            Some(block) => {
                assert_eq!(k, 0);
                owners += 1;
                let want = reference.extract(&layout.region(i, j)).unwrap();
                for (g, w) in block.as_slice().iter().zip(want.as_slice()) {
                    assert_abs_diff_eq!(g, w, epsilon = 1e-3);
                }
            }
            None => assert_ne!(k, 0),
        }
    }
    assert_eq!(owners, 4);
    // One seed per (i, j) block of each operand.
    assert_eq!(a_seeds, 4);
    assert_eq!(b_seeds, 4);
}

#[test]
fn test_grid_rank_layout() {
    let config = RunConfig::new(3, 27, Algorithm::Dns3D).with_gather(false);
    let (a, b) = config.seeded_operands();
    let outcome = Runner::new().run(&config, &a, &b).unwrap();
    assert!(outcome.result.is_none());
    for product in &outcome.products {
        let c = product.coords.as_ref().unwrap();
        assert_eq!(product.rank, c[0] * 9 + c[1] * 3 + c[2]);
    }
}
