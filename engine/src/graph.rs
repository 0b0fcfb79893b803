//! Ordered offscreen passes with declared target dependencies.
//!
//! Passes are declared with a builder, validated and ordered once by [`RenderGraph::compile`],
//! then executed front to back by [`RenderGraph::run_frame`] once per tick.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::api::{PassExecutor, PassOutcome, TargetProvider, TerrainError};
use crate::target::{RenderTarget, TargetDesc, TargetFormat, TargetId, TargetSizing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutput {
    Target(TargetDesc),
    Screen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDesc {
    pub name: &'static str,
    /// Targets produced earlier in the same tick.
    pub reads: Vec<TargetId>,
    /// Targets read as they were left by the previous tick (feedback).
    pub reads_previous: Vec<TargetId>,
    pub output: PassOutput,
}

impl PassDesc {
    pub fn output_target(&self) -> Option<TargetId> {
        match self.output {
            PassOutput::Target(desc) => Some(desc.id),
            PassOutput::Screen => None,
        }
    }
}

pub struct PassBuilder {
    desc: PassDesc,
}

impl PassBuilder {
    fn new(name: &'static str) -> Self {
        Self { desc: PassDesc { name, reads: Vec::new(), reads_previous: Vec::new(), output: PassOutput::Screen } }
    }

    pub fn read(&mut self, target: TargetId) -> &mut Self {
        if !self.desc.reads.contains(&target) {
            self.desc.reads.push(target);
        }
        self
    }

    pub fn read_previous(&mut self, target: TargetId) -> &mut Self {
        if !self.desc.reads_previous.contains(&target) {
            self.desc.reads_previous.push(target);
        }
        self
    }

    /// Declare the single output target. The pass becomes its only writer.
    pub fn write(&mut self, target: TargetId, sizing: TargetSizing, format: TargetFormat) -> &mut Self {
        self.desc.output = PassOutput::Target(TargetDesc { id: target, sizing, format });
        self
    }

    pub fn to_screen(&mut self) -> &mut Self {
        self.desc.output = PassOutput::Screen;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub frame_index: u64,
    /// Position of the pass in the compiled order.
    pub order_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub executed: Vec<&'static str>,
    pub rendered: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct RenderGraph {
    passes: Vec<PassDesc>,
    order: Option<Vec<usize>>,
    targets: BTreeMap<TargetId, RenderTarget>,
    viewport: (u32, u32),
    frame_index: u64,
}

impl RenderGraph {
    pub fn new(viewport: (u32, u32)) -> Self {
        Self {
            passes: Vec::new(),
            order: None,
            targets: BTreeMap::new(),
            viewport: (viewport.0.max(1), viewport.1.max(1)),
            frame_index: 0,
        }
    }

    /// Declare a pass. Invalidates any previous compilation.
    pub fn add_pass<F>(&mut self, name: &'static str, setup: F) -> &mut Self
    where
        F: FnOnce(&mut PassBuilder),
    {
        let mut builder = PassBuilder::new(name);
        setup(&mut builder);
        self.passes.push(builder.desc);
        self.order = None;
        self
    }

    pub fn compile(&mut self) -> Result<(), TerrainError> {
        let mut writers: HashMap<TargetId, usize> = HashMap::new();
        for (i, pass) in self.passes.iter().enumerate() {
            if let Some(target) = pass.output_target() {
                if let Some(&first) = writers.get(&target) {
                    return Err(TerrainError::DuplicateWriter {
                        target: target.as_str(),
                        first: self.passes[first].name,
                        second: pass.name,
                    });
                }
                writers.insert(target, i);
            }
        }

        let mut dag: StableDiGraph<usize, TargetId> = StableDiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.passes.len()).map(|i| dag.add_node(i)).collect();
        for (i, pass) in self.passes.iter().enumerate() {
            for target in pass.reads.iter().chain(&pass.reads_previous) {
                let Some(&writer) = writers.get(target) else {
                    return Err(TerrainError::UnknownTarget(target.as_str()));
                };
                // 上一帧的反馈读取不构成本帧依赖
                if pass.reads.contains(target) {
                    dag.add_edge(nodes[writer], nodes[i], *target);
                }
            }
        }

        let order = stable_toposort(&dag, &nodes).map_err(|i| TerrainError::GraphCycle(self.passes[i].name))?;

        let last = order.last().map(|&i| &self.passes[i]);
        let screens = self.passes.iter().filter(|p| p.output == PassOutput::Screen).count();
        match last {
            Some(pass) if pass.output == PassOutput::Screen && screens == 1 => {}
            Some(pass) => return Err(TerrainError::ScreenNotLast(pass.name)),
            None => return Err(TerrainError::ScreenNotLast("<empty>")),
        }

        let mut targets = BTreeMap::new();
        for pass in &self.passes {
            if let PassOutput::Target(desc) = pass.output {
                let target = match self.targets.get(&desc.id) {
                    Some(old) if old.desc == desc => old.clone(),
                    _ => RenderTarget::new(desc, self.viewport),
                };
                targets.insert(desc.id, target);
            }
        }

        log::debug!("render graph order: {:?}", order.iter().map(|&i| self.passes[i].name).collect::<Vec<_>>());
        self.targets = targets;
        self.order = Some(order);
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.order.is_some()
    }

    /// Pass names in execution order.
    pub fn order(&self) -> Result<Vec<&'static str>, TerrainError> {
        let order = self.order.as_ref().ok_or(TerrainError::NotCompiled)?;
        Ok(order.iter().map(|&i| self.passes[i].name).collect())
    }

    pub fn pass(&self, name: &str) -> Result<&PassDesc, TerrainError> {
        self.passes.iter().find(|p| p.name == name).ok_or_else(|| TerrainError::UnknownPass(name.to_string()))
    }

    pub fn passes(&self) -> &[PassDesc] {
        &self.passes
    }

    pub fn target(&self, id: TargetId) -> Option<&RenderTarget> {
        self.targets.get(&id)
    }

    pub fn targets(&self) -> impl Iterator<Item = &RenderTarget> {
        self.targets.values()
    }

    pub fn is_rendered(&self, id: TargetId) -> bool {
        self.targets.get(&id).is_some_and(|t| t.rendered)
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Create every declared target through `provider` at its current size.
    pub fn allocate(&mut self, provider: &mut impl TargetProvider) -> Result<(), TerrainError> {
        if self.order.is_none() {
            return Err(TerrainError::NotCompiled);
        }
        for target in self.targets.values_mut() {
            provider.create_target(&target.desc, target.width, target.height)?;
            target.rendered = false;
        }
        Ok(())
    }

    /// Reallocate viewport-sized targets. Fixed targets are untouched. Returns the resized ids.
    pub fn resize_viewport(
        &mut self,
        width: u32,
        height: u32,
        provider: &mut impl TargetProvider,
    ) -> Result<Vec<TargetId>, TerrainError> {
        let (width, height) = (width.max(1), height.max(1));
        self.viewport = (width, height);
        let mut resized = Vec::new();
        for target in self.targets.values_mut().filter(|t| t.follows_viewport()) {
            if (target.width, target.height) == (width, height) {
                continue;
            }
            provider.resize(target.desc.id, width, height)?;
            target.width = width;
            target.height = height;
            target.rendered = false;
            target.generation += 1;
            resized.push(target.desc.id);
        }
        if !resized.is_empty() {
            log::debug!("viewport {width}x{height}: reallocated {resized:?}");
        }
        Ok(resized)
    }

    /// Execute every pass once, in compiled order.
    pub fn run_frame(&mut self, executor: &mut impl PassExecutor) -> Result<FrameReport, TerrainError> {
        let order = self.order.as_ref().ok_or(TerrainError::NotCompiled)?;
        let mut report = FrameReport { frame_index: self.frame_index, ..Default::default() };
        for (order_index, &i) in order.iter().enumerate() {
            let pass = &self.passes[i];
            let frame = FrameContext { frame_index: self.frame_index, order_index };
            let outcome = executor.execute(pass, &frame)?;
            report.executed.push(pass.name);
            if outcome == PassOutcome::Rendered {
                report.rendered.push(pass.name);
                if let Some(target) = pass.output_target().and_then(|id| self.targets.get_mut(&id)) {
                    target.rendered = true;
                }
            }
        }
        self.frame_index += 1;
        Ok(report)
    }
}

/// Kahn's algorithm, always taking the earliest-declared ready pass.
/// On a cycle, returns the declaration index of a pass that could not be ordered.
fn stable_toposort(dag: &StableDiGraph<usize, TargetId>, nodes: &[NodeIndex]) -> Result<Vec<usize>, usize> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|&n| dag.edges_directed(n, Direction::Incoming).count()).collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for edge in dag.edges_directed(nodes[i], Direction::Outgoing) {
            let next = dag[edge.target()];
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }
    if order.len() < nodes.len() {
        let stuck = (0..nodes.len()).find(|&i| in_degree[i] > 0).unwrap_or(0);
        return Err(stuck);
    }
    Ok(order)
}
