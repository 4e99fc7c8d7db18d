use colored::Colorize;
use itertools::Itertools;

use crate::{
    frontend::intern::Interner,
    index::Index,
    middle::{
        graph::{Graph, NodeId, NodeKind},
        scope::Binding,
    },
};

fn render_id(id: NodeId) -> String {
    format!("%{}", id.slot().index()).yellow().to_string()
}

/// One line describing `id`, e.g. `%4 = add(%2, %3) : int:bot`
pub fn render_node(graph: &Graph, id: NodeId) -> String {
    let node = &graph[id];

    let name = match node.kind {
        NodeKind::Constant => {
            return format!(
                "{} {} {}",
                render_id(id),
                "=".white(),
                node.ty.to_string().purple()
            );
        }
        NodeKind::Projection { index, .. } => match node.label {
            Some(label) => format!("proj.{index} {label}"),
            None => format!("proj.{index}"),
        },
        kind => kind.name(),
    };

    let name = match node.kind.is_control() {
        true => name.cyan(),
        false => name.bright_green(),
    };

    format!(
        "{} {} {}{}{}{} {} {}",
        render_id(id),
        "=".white(),
        name,
        "(".white(),
        node.kind
            .inputs()
            .into_iter()
            .flatten()
            .map(render_id)
            .join(", "),
        ")".white(),
        ":".white(),
        node.ty.to_string().purple()
    )
}

/// Every node reachable from `end`, in allocation order
pub fn render_graph(graph: &Graph, end: NodeId) -> String {
    graph
        .reachable_from([end])
        .into_iter()
        .sorted_by_key(|&id| graph[id].uid)
        .map(|id| format!("    {}", render_node(graph, id)))
        .join("\n")
}

pub fn render_bindings(graph: &Graph, bindings: &[Binding], interner: &Interner) -> String {
    bindings
        .iter()
        .map(|binding| {
            format!(
                "    {} {} {}",
                interner.resolve(binding.name).blue(),
                "->".white(),
                render_node(graph, binding.value)
            )
        })
        .join("\n")
}

pub fn pretty_print_routine(name: &str, graph: &Graph, end: NodeId) {
    println!("{} {} {}", "routine".magenta(), name.blue(), "{".white());
    println!("{}", render_graph(graph, end));
    println!("{}", "}".white());
}
