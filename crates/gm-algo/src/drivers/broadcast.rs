use gm_block::{Kernel, Matrix};
use gm_comm::{CartGrid, Communicator, GridShape, Source, Status, TagMatch};
use tracing::{debug, trace};

use crate::algorithm::Algorithm;
use crate::config::DispatchPolicy;
use crate::coordinator::{Coordinator, Role, COORDINATOR_RANK};
use crate::drivers::{plan_mismatch, Driver, Job};
use crate::error::{AlgoError, Result};
use crate::plan::Plan;
use crate::product::{DispatchReport, Product, Trace};
use crate::tasks::TaskGrid;

/// One-pass block distribution: the coordinator owns A, B and C and hands
/// out one C block per task; workers multiply and send the block back.
#[derive(Debug, Default, Clone, Copy)]
pub struct Broadcast2D;

impl Driver for Broadcast2D {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Mesh2D
    }

    fn run(&self, world: &Communicator, job: &Job<'_>) -> Result<Product> {
        let (tasks, task_workers) = match job.plan {
            Plan::Mesh2D {
                tasks,
                task_workers,
            } => (*tasks, *task_workers),
            other => return Err(plan_mismatch(self.algorithm(), other)),
        };

        let shape = GridShape::new(vec![world.size()], vec![false])?;
        let grid = CartGrid::new(world, shape)?;
        let comm = grid.comm();

        match Role::of(comm.rank()) {
            Role::Coordinator => {
                let coordinator = Coordinator::load(tasks.n(), job.a, job.b)?;
                let mut dispatcher =
                    Dispatcher::new(comm, tasks, coordinator, job.config.dispatch);
                let active = tasks.initial_assignments(task_workers);
                match job.config.dispatch {
                    DispatchPolicy::OnDemand => dispatcher.on_demand(active)?,
                    DispatchPolicy::Cyclic => dispatcher.cyclic(active)?,
                }
                let (report, result) = dispatcher.finish(active)?;
                Ok(Product::new(world.world_rank(), Trace::Dispatch(report))
                    .with_coords(grid.coords())
                    .with_result(Some(result)))
            }
            Role::Worker => {
                let completed = if comm.rank() <= tasks.initial_assignments(task_workers) {
                    serve_tasks(comm, &tasks, job.kernel)?
                } else {
                    debug!("no task for this worker");
                    0
                };
                Ok(Product::new(world.world_rank(), Trace::TaskWorker { completed })
                    .with_coords(grid.coords()))
            }
        }
    }
}

/// Coordinator-side dispatch state.
///
/// At most one task is outstanding per worker, and each C block is
/// written exactly once.
struct Dispatcher<'c> {
    comm: &'c Communicator,
    tasks: TaskGrid,
    coordinator: Coordinator,
    /// Task outstanding at each worker, indexed by rank.
    in_flight: Vec<Option<usize>>,
    written: Vec<bool>,
    next: usize,
    message: Vec<f32>,
    report: DispatchReport,
}

impl<'c> Dispatcher<'c> {
    fn new(
        comm: &'c Communicator,
        tasks: TaskGrid,
        coordinator: Coordinator,
        policy: DispatchPolicy,
    ) -> Self {
        Dispatcher {
            comm,
            tasks,
            coordinator,
            in_flight: vec![None; comm.size()],
            written: vec![false; tasks.count()],
            next: 0,
            message: Vec::with_capacity(tasks.message_len()),
            report: DispatchReport {
                policy,
                tasks: tasks.count(),
                assignments: Vec::with_capacity(tasks.count()),
                results: 0,
                blocks_written: 0,
                max_in_flight: 0,
                terminated: Vec::new(),
            },
        }
    }

    fn remaining(&self) -> bool {
        self.next < self.tasks.count()
    }

    fn outstanding(&self) -> usize {
        self.in_flight.iter().filter(|t| t.is_some()).count()
    }

    /// Saturate workers `1..=active`, then hand the next task to whichever
    /// worker reports first.
    fn on_demand(&mut self, active: usize) -> Result<()> {
        for worker in 1..=active {
            self.send_next(worker)?;
        }
        while self.outstanding() > 0 {
            let worker = self.collect(Source::Any)?;
            if self.remaining() {
                self.send_next(worker)?;
            }
        }
        Ok(())
    }

    /// Rounds of one task per worker in rank order, each round fully
    /// collected before the next one starts.
    fn cyclic(&mut self, active: usize) -> Result<()> {
        while self.remaining() {
            let mut round = Vec::with_capacity(active);
            for worker in 1..=active {
                if !self.remaining() {
                    break;
                }
                self.send_next(worker)?;
                round.push(worker);
            }
            for worker in round {
                self.collect(Source::Rank(worker))?;
            }
        }
        Ok(())
    }

    fn send_next(&mut self, worker: usize) -> Result<()> {
        let task = self.next;
        if let Some(pending) = self.in_flight[worker] {
            return Err(AlgoError::Protocol(format!(
                "worker {} already holds task {}",
                worker, pending
            )));
        }
        self.tasks.build_message(
            &self.coordinator.a,
            &self.coordinator.b,
            task,
            &mut self.message,
        )?;
        self.comm.send(worker, task as u32, &self.message)?;
        self.in_flight[worker] = Some(task);
        self.next += 1;
        self.report.assignments.push((task, worker));
        self.report.max_in_flight = self.report.max_in_flight.max(self.outstanding());
        trace!(task, worker, "task sent");
        Ok(())
    }

    /// Receive one result and write its block. Returns the sender.
    fn collect(&mut self, source: Source) -> Result<usize> {
        let (block, status) = self.comm.recv(source, TagMatch::Any)?;
        let task = self.accept(&status)?;
        self.tasks.check_task(task)?;
        let region = self.tasks.region(task);
        if block.len() != self.tasks.result_len() {
            return Err(AlgoError::Protocol(format!(
                "result for task {} has {} elements, expected {}",
                task,
                block.len(),
                self.tasks.result_len()
            )));
        }
        self.coordinator.c.place(&region, &block)?;
        self.written[task] = true;
        self.report.results += 1;
        self.report.blocks_written += 1;
        trace!(task, worker = status.source, %region, "result written");
        Ok(status.source)
    }

    /// Check that a result matches the task its sender holds.
    fn accept(&mut self, status: &Status) -> Result<usize> {
        let task = status.tag as usize;
        let expected = self.in_flight.get(status.source).copied().flatten();
        if expected != Some(task) {
            return Err(AlgoError::Protocol(format!(
                "unexpected result for task {} from worker {} (holds {:?})",
                task, status.source, expected
            )));
        }
        if self.written.get(task).copied().unwrap_or(false) {
            return Err(AlgoError::Protocol(format!("duplicate result for task {}", task)));
        }
        self.in_flight[status.source] = None;
        Ok(task)
    }

    /// Send the termination tag to every worker that got a task.
    fn finish(mut self, active: usize) -> Result<(DispatchReport, Matrix)> {
        if let Some(missing) = self.written.iter().position(|w| !w) {
            return Err(AlgoError::Protocol(format!("task {} never completed", missing)));
        }
        let end = self.tasks.termination_tag();
        for worker in 1..=active {
            self.comm.send(worker, end, &[])?;
            self.report.terminated.push(worker);
        }
        debug!(
            tasks = self.report.tasks,
            max_in_flight = self.report.max_in_flight,
            "dispatch finished"
        );
        Ok((self.report, self.coordinator.into_result()))
    }
}

/// Worker loop: multiply each task until the termination tag arrives.
fn serve_tasks(comm: &Communicator, tasks: &TaskGrid, kernel: &dyn Kernel) -> Result<usize> {
    let size = tasks.block_size();
    let end = tasks.termination_tag();
    let mut block = Matrix::zeros(size, size);
    let mut completed = 0;
    loop {
        let (message, status) = comm.recv(Source::Rank(COORDINATOR_RANK), TagMatch::Any)?;
        if status.tag == end {
            break;
        }
        let (rows, cols) = tasks.split_message(&message)?;
        block.clear();
        kernel.multiply_accumulate(rows, cols, block.as_mut_slice(), size, tasks.n(), size)?;
        comm.send(COORDINATOR_RANK, status.tag, block.as_slice())?;
        completed += 1;
        trace!(task = status.tag, "task done");
    }
    debug!(completed, "worker finished");
    Ok(completed)
}
