//! One reconciliation pass over a distributed AMR block set.

use crate::algs::communicator::Communicator;
use crate::algs::degenerate::{DegenerateQueue, process_degenerate_queue};
use crate::algs::distribute::share_blocks;
use crate::algs::faces::create_faces;
use crate::algs::metadata::{GlobalMetadata, compute_global_metadata};
use crate::algs::shared_regions::assign_shared_regions;
use crate::amr_error::AmrError;
use crate::config::ReconcileConfig;
use crate::data::raw_block::RawBlock;
use crate::debug_invariants::DebugInvariants;
use crate::report::ReconcileReport;
use crate::topology::block::Block;
use crate::topology::registry::BlockRegistry;

/// Drives the phases of a pass in order: metadata, local registration,
/// skeleton exchange, ownership resolution, ghost exchange and, optionally,
/// face seeding.
///
/// Every phase is collective. All ranks must call [`DualGridHelper::reconcile`]
/// with the same configuration; a rank that fails or stops early leaves its
/// peers blocked.
pub struct DualGridHelper<C: Communicator> {
    comm: C,
    config: ReconcileConfig,
    registry: BlockRegistry,
    queue: DegenerateQueue,
    report: ReconcileReport,
}

impl<C: Communicator> DualGridHelper<C> {
    pub fn new(comm: C, config: ReconcileConfig) -> Self {
        let rank = comm.rank();
        Self {
            comm,
            config,
            registry: BlockRegistry::new(rank),
            queue: DegenerateQueue::new(),
            report: ReconcileReport::default(),
        }
    }

    /// Run a full pass over this rank's blocks, replacing any earlier result.
    pub fn reconcile(&mut self, blocks: Vec<RawBlock>) -> Result<&ReconcileReport, AmrError> {
        let rank = self.comm.rank();
        self.registry = BlockRegistry::new(rank);
        self.queue.clear();
        self.report = ReconcileReport::default();

        let (blocks, skipped): (Vec<_>, Vec<_>) = blocks
            .into_iter()
            .partition(|b| self.config.accepts(&b.array_name));
        for b in &skipped {
            let err = AmrError::MissingArray {
                level: b.level,
                name: self.config.array_name.clone(),
            };
            log::error!("[reconcile] rank {rank}: {err}; block skipped");
        }
        self.report.skipped_blocks = skipped.len();

        let metadata = compute_global_metadata(&blocks, &self.comm)?;
        self.registry.set_metadata(metadata);
        for block in blocks {
            self.registry.add_block(block)?;
        }
        log::info!(
            "[reconcile] rank {rank}: {} local blocks in {} levels",
            self.registry.number_of_blocks(),
            self.registry.number_of_levels()
        );

        share_blocks(&mut self.registry, &self.comm)?;
        crate::debug_invariants!(self.registry.validate_invariants(), "registry after skeleton exchange");

        assign_shared_regions(
            &mut self.registry,
            &self.config,
            &mut self.queue,
            &mut self.report,
        )?;
        process_degenerate_queue(
            &mut self.registry,
            &self.queue,
            &self.comm,
            &self.config,
            &mut self.report,
        )?;
        if self.config.create_faces {
            self.report.faces_created = create_faces(&mut self.registry)?;
        }
        if self.report.is_degraded() {
            log::warn!("[reconcile] rank {rank}: pass degraded: {:?}", self.report);
        }
        Ok(&self.report)
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> BlockRegistry {
        self.registry
    }

    pub fn metadata(&self) -> Result<&GlobalMetadata, AmrError> {
        self.registry.metadata()
    }

    /// Copies left for the cross-rank exchange by the last pass.
    pub fn queue(&self) -> &DegenerateQueue {
        &self.queue
    }

    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    pub fn number_of_levels(&self) -> usize {
        self.registry.number_of_levels()
    }

    pub fn number_of_blocks_in_level(&self, level: usize) -> usize {
        self.registry.number_of_blocks_in_level(level)
    }

    /// Blocks this rank contributed to the pass.
    pub fn number_of_blocks_in_this_process(&self) -> usize {
        self.registry.number_of_local_blocks()
    }

    pub fn block(&self, level: usize, index: usize) -> Option<&Block> {
        self.registry.block_in_level(level, index)
    }

    pub fn block_at(&self, level: usize, grid_index: [i64; 3]) -> Option<&Block> {
        self.registry.block_at(level, grid_index)
    }
}
