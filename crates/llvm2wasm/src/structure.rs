//! Flow graph construction and control flow structuring.
//!
//! Every basic block becomes one node whose code is the quoted block number
//! (`"3";`). Conditional branches get a quoted placeholder guard (`"7"`) whose
//! number maps back to the branch condition in [`FlowGraph::conditions`].
//! Placeholder numbers start after the last block number so they never collide
//! with leaf statements.

use crate::ir::{FunctionBody, InstrKind, ValueId};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNode {
    /// Diagnostic label, emitted as a comment.
    pub label: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: usize,
    pub to: usize,
    /// Placeholder expression; `None` for the fallthrough edge.
    pub guard: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    /// Placeholder number to branch condition value.
    pub conditions: BTreeMap<u32, ValueId>,
}

impl FlowGraph {
    /// Outgoing edges of `node` in insertion order.
    pub fn edges_from(&self, node: usize) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(move |e| e.from == node)
    }
}

/// Build the unstructured flow graph of one function body.
pub fn build_flow_graph(body: &FunctionBody) -> FlowGraph {
    let mut graph = FlowGraph {
        nodes: (0..body.blocks.len())
            .map(|i| FlowNode {
                label: format!("// Block {}", i),
                code: format!("\"{}\";", i),
            })
            .collect(),
        ..FlowGraph::default()
    };
    let mut next_placeholder = body.blocks.len() as u32;

    for (index, block) in body.blocks.iter().enumerate() {
        let Some(terminator) = block.terminator() else {
            continue;
        };
        match &terminator.kind {
            InstrKind::Br { target } => graph.edges.push(FlowEdge {
                from: index,
                to: target.index(),
                guard: None,
            }),
            InstrKind::CondBr {
                if_true,
                if_false,
                cond,
            } => {
                let placeholder = next_placeholder;
                next_placeholder += 1;
                graph.conditions.insert(placeholder, cond.value);
                graph.edges.push(FlowEdge {
                    from: index,
                    to: if_true.index(),
                    guard: Some(format!("\"{}\"", placeholder)),
                });
                graph.edges.push(FlowEdge {
                    from: index,
                    to: if_false.index(),
                    guard: None,
                });
            }
            _ => {}
        }
    }
    graph
}

/// Turns a flow graph into structured control flow text.
///
/// Implementations answer in the grammar read by
/// [`parse_shapes`](crate::relooper::parse_shapes).
pub trait Structurer {
    fn structure(&self, graph: &FlowGraph) -> Result<String>;
}

/// Structurer that handles any graph with a `label` dispatch loop.
///
/// A lone block without edges is emitted bare. Everything else becomes
///
/// ```text
/// label = 0;
/// L1: while(1) {
///   switch (label|0) {
///     case 0: { "0"; if ("2") { label = 1; continue L1; } label = 2; continue L1; }
///     case 1: { "1"; break L1; }
///     ...
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchStructurer;

impl DispatchStructurer {
    pub fn new() -> Self {
        DispatchStructurer
    }
}

const LOOP_LABEL: &str = "L1";

impl Structurer for DispatchStructurer {
    fn structure(&self, graph: &FlowGraph) -> Result<String> {
        let mut out = String::new();
        if graph.nodes.is_empty() {
            return Ok(out);
        }
        if graph.nodes.len() == 1 && graph.edges.is_empty() {
            let node = &graph.nodes[0];
            writeln!(out, "{}", node.label)?;
            writeln!(out, "{}", node.code)?;
            return Ok(out);
        }

        writeln!(out, "label = 0;")?;
        writeln!(out, "{}: while(1) {{", LOOP_LABEL)?;
        writeln!(out, "  switch (label|0) {{")?;
        for (index, node) in graph.nodes.iter().enumerate() {
            writeln!(out, "    case {}: {{", index)?;
            writeln!(out, "      {}", node.label)?;
            writeln!(out, "      {}", node.code)?;
            let mut falls_out = true;
            for edge in graph.edges_from(index) {
                match &edge.guard {
                    Some(guard) => writeln!(
                        out,
                        "      if ({}) {{ label = {}; continue {}; }}",
                        guard, edge.to, LOOP_LABEL
                    )?,
                    None => {
                        writeln!(out, "      label = {}; continue {};", edge.to, LOOP_LABEL)?;
                        falls_out = false;
                        break;
                    }
                }
            }
            if falls_out {
                writeln!(out, "      break {};", LOOP_LABEL)?;
            }
            writeln!(out, "    }}")?;
        }
        writeln!(out, "  }}")?;
        writeln!(out, "}}")?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, BlockId, Instruction, Operand, TypeId};
    use crate::relooper::{parse_shapes, Condition, Shape};

    fn block(kind: InstrKind) -> BasicBlock {
        BasicBlock {
            name: None,
            instructions: vec![Instruction { kind, result: None }],
        }
    }

    fn ret() -> BasicBlock {
        block(InstrKind::Ret { value: None })
    }

    fn body(blocks: Vec<BasicBlock>) -> FunctionBody {
        FunctionBody {
            function: 0,
            values: Vec::new(),
            first_local: 0,
            blocks,
        }
    }

    fn cond_br(if_true: u32, if_false: u32, cond: u32) -> BasicBlock {
        block(InstrKind::CondBr {
            if_true: BlockId(if_true),
            if_false: BlockId(if_false),
            cond: Operand {
                ty: Some(TypeId(0)),
                value: ValueId(cond),
                forward: false,
            },
        })
    }

    #[test]
    fn conditional_branch_adds_guarded_then_fallthrough_edge() {
        let graph = build_flow_graph(&body(vec![cond_br(1, 2, 7), ret(), ret()]));
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[1].code, "\"1\";");
        assert_eq!(graph.nodes[1].label, "// Block 1");
        assert_eq!(
            graph.edges,
            vec![
                FlowEdge {
                    from: 0,
                    to: 1,
                    guard: Some("\"3\"".to_string()),
                },
                FlowEdge {
                    from: 0,
                    to: 2,
                    guard: None,
                },
            ]
        );
        assert_eq!(graph.conditions.get(&3), Some(&ValueId(7)));
    }

    #[test]
    fn single_return_block_is_one_leaf() {
        let graph = build_flow_graph(&body(vec![ret()]));
        let text = DispatchStructurer::new().structure(&graph).unwrap();
        assert_eq!(parse_shapes(&text).unwrap(), vec![Shape::Leaf(0)]);
    }

    #[test]
    fn dispatch_output_parses_back() {
        // bb0: br %7 ? bb1 : bb2; bb1: br bb0; bb2: ret
        let graph = build_flow_graph(&body(vec![
            cond_br(1, 2, 7),
            block(InstrKind::Br {
                target: BlockId(0),
            }),
            ret(),
        ]));
        let text = DispatchStructurer::new().structure(&graph).unwrap();
        let shapes = parse_shapes(&text).unwrap();

        assert_eq!(shapes[0], Shape::SetLabel(0));
        let Shape::Labeled { label: 1, shape } = &shapes[1] else {
            panic!("expected labeled loop, got {:?}", shapes[1]);
        };
        let Shape::Loop(body) = shape.as_ref() else {
            panic!("expected loop, got {:?}", shape);
        };
        let Shape::Switch { selector, arms } = &body[0] else {
            panic!("expected switch, got {:?}", body[0]);
        };
        assert_eq!(*selector, Condition::Label);
        assert_eq!(arms.len(), 3);
        assert_eq!(
            arms[0].body,
            vec![
                Shape::Leaf(0),
                Shape::If {
                    cond: Condition::Expr(3),
                    then: vec![Shape::SetLabel(1), Shape::Continue(Some(1))],
                    otherwise: None,
                },
                Shape::SetLabel(2),
                Shape::Continue(Some(1)),
            ]
        );
        assert_eq!(
            arms[1].body,
            vec![Shape::Leaf(1), Shape::SetLabel(0), Shape::Continue(Some(1))]
        );
        assert_eq!(arms[2].body, vec![Shape::Leaf(2), Shape::Break(Some(1))]);
    }
}
