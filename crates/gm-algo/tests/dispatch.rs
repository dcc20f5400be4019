use std::collections::HashSet;

use gm_algo::{Algorithm, DispatchPolicy, DispatchReport, Product, RunConfig, Runner, Trace};

fn run(config: &RunConfig) -> Vec<Product> {
    let (a, b) = config.seeded_operands();
    Runner::new().run(config, &a, &b).unwrap().products
}

fn dispatch_report(products: &[Product]) -> &DispatchReport {
    match &products[0].trace {
        Trace::Dispatch(report) => report,
        other => panic!("rank 0 is not the coordinator: {:?}", other),
    }
}

fn completed(product: &Product) -> usize {
    match product.trace {
        Trace::TaskWorker { completed } => completed,
        ref other => panic!("rank {} is not a task worker: {:?}", product.rank, other),
    }
}

#[test]
fn test_nine_tasks_two_workers() {
    let config = RunConfig::new(3, 3, Algorithm::Mesh2D).with_block_size(1);
    let products = run(&config);
    let report = dispatch_report(&products);

    assert_eq!(report.tasks, 9);
    assert_eq!(report.results, 9);
    assert_eq!(report.blocks_written, 9);
    assert!(report.max_in_flight <= 2);

    let sent: HashSet<usize> = report.assignments.iter().map(|&(task, _)| task).collect();
    assert_eq!(sent, (0..9).collect());
    assert!(report.assignments.iter().all(|&(_, w)| w == 1 || w == 2));
    assert_eq!(report.terminated, vec![1, 2]);

    let done: usize = products[1..].iter().map(completed).sum();
    assert_eq!(done, 9);
}

#[test]
fn test_tasks_follow_row_major_order() {
    let config = RunConfig::new(4, 3, Algorithm::Mesh2D).with_block_size(2);
    let products = run(&config);
    let report = dispatch_report(&products);
    let order: Vec<usize> = report.assignments.iter().map(|&(task, _)| task).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_excess_workers_get_no_task() {
    // N = 2 with the default block size of 1 gives 4 tasks for 6 task workers.
    let config = RunConfig::new(2, 7, Algorithm::Mesh2D);
    let products = run(&config);
    let report = dispatch_report(&products);

    assert_eq!(report.tasks, 4);
    assert_eq!(report.max_in_flight, 4);
    assert_eq!(report.terminated, vec![1, 2, 3, 4]);
    for product in &products[1..=4] {
        assert_eq!(completed(product), 1);
    }
    for product in &products[5..] {
        assert_eq!(completed(product), 0);
    }
}

#[test]
fn test_cyclic_rounds() {
    let config = RunConfig::new(3, 3, Algorithm::Mesh2D)
        .with_block_size(1)
        .with_dispatch(DispatchPolicy::Cyclic);
    let products = run(&config);
    let report = dispatch_report(&products);

    let expected: Vec<(usize, usize)> = (0..9).map(|t| (t, 1 + t % 2)).collect();
    assert_eq!(report.assignments, expected);
    assert_eq!(report.policy, DispatchPolicy::Cyclic);
    assert_eq!(report.blocks_written, 9);
    assert_eq!(completed(&products[1]), 5);
    assert_eq!(completed(&products[2]), 4);
}
