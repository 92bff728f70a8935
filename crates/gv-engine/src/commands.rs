//! Undo/Redo command stack.
//!
//! Every mutation is wrapped in a reversible `Command` that can be undone.
//! The inverse is captured against the state the mutation is applied to, so
//! undo never needs to re-query the graph service. A removal stores the full
//! payload of everything it took out, including cascaded edges, selection
//! membership, pins and instance styles.

use crate::state::{Mutation, ViewState};
use std::collections::HashSet;

/// A forward mutation paired with the mutation that reverts it.
#[derive(Debug, Clone)]
pub struct Command {
    forward: Mutation,
    inverse: Mutation,
    description: String,
}

impl Command {
    pub fn forward(&self) -> &Mutation {
        &self.forward
    }

    pub fn inverse(&self) -> &Mutation {
        &self.inverse
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn changes_topology(&self) -> bool {
        self.forward.changes_topology()
    }
}

/// Manages undo/redo stacks with a bounded depth.
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Maximum undo depth; the oldest command is dropped beyond it.
    max_depth: usize,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(256)),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Apply `mutation` to `state` and push it to the undo stack.
    pub fn execute(&mut self, state: &mut ViewState, mutation: Mutation, description: &str) -> &Command {
        let inverse = apply_recorded(state, mutation.clone());
        log::trace!("execute `{description}`: {mutation:?}");

        self.undo_stack.push(Command {
            forward: mutation,
            inverse,
            description: description.to_string(),
        });
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }

        // Clear redo stack on new action
        self.redo_stack.clear();
        &self.undo_stack[self.undo_stack.len() - 1]
    }

    /// Undo the last command. `None` when there is nothing to undo.
    pub fn undo(&mut self, state: &mut ViewState) -> Option<&Command> {
        let cmd = self.undo_stack.pop()?;
        state.apply_mutation(cmd.inverse.clone());
        self.redo_stack.push(cmd);
        self.redo_stack.last()
    }

    /// Redo the last undone command. `None` when there is nothing to redo.
    pub fn redo(&mut self, state: &mut ViewState) -> Option<&Command> {
        let cmd = self.redo_stack.pop()?;
        state.apply_mutation(cmd.forward.clone());
        self.undo_stack.push(cmd);
        self.undo_stack.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Tooltip text for the undo control.
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(Command::description)
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(Command::description)
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Apply `mutation` and return its inverse.
///
/// Removals capture their payload while applying; batches record each step
/// against the state the previous steps left behind and invert in reverse.
fn apply_recorded(state: &mut ViewState, mutation: Mutation) -> Mutation {
    match mutation {
        Mutation::RemoveEntities { ids } => {
            let removed = state.take_entities(&ids);
            Mutation::RestoreEntities(Box::new(removed))
        }
        Mutation::Batch(steps) => {
            let mut inverses: Vec<Mutation> = steps.into_iter().map(|step| apply_recorded(state, step)).collect();
            inverses.reverse();
            Mutation::Batch(inverses)
        }
        other => {
            let inverse = compute_inverse(state, &other);
            state.apply_mutation(other);
            inverse
        }
    }
}

/// Compute the inverse mutation needed to undo `mutation`, before it is applied.
fn compute_inverse(state: &ViewState, mutation: &Mutation) -> Mutation {
    match mutation {
        Mutation::AddEntities { nodes, edges } => {
            let mut new_nodes = HashSet::new();
            for node in nodes {
                if !state.graph.contains_node(node.id) {
                    new_nodes.insert(node.id);
                }
            }
            let present = |id| state.graph.contains_node(id) || new_nodes.contains(&id);
            let mut new_edges = HashSet::new();
            for edge in edges {
                if !state.graph.contains_edge(edge.id) && present(edge.src) && present(edge.dst) {
                    new_edges.insert(edge.id);
                }
            }
            let mut ids: Vec<_> = new_edges.into_iter().chain(new_nodes).collect();
            ids.sort();
            Mutation::RemoveEntities { ids }
        }
        Mutation::RemoveEntities { ids } => {
            // `apply_recorded` captures removals in place; this works on a copy.
            let mut scratch = state.clone();
            Mutation::RestoreEntities(Box::new(scratch.take_entities(ids)))
        }
        Mutation::RestoreEntities(removed) => Mutation::RemoveEntities { ids: removed.ids() },
        Mutation::SetSelection { .. } => Mutation::SetSelection {
            ids: state.selection.ids(),
            mode: crate::selection::SelectionMode::Replace,
        },
        Mutation::TogglePin { id } => {
            if state.graph.contains_node(*id) {
                Mutation::TogglePin { id: *id }
            } else {
                Mutation::Batch(Vec::new())
            }
        }
        Mutation::SetInstanceStyle { id, .. } | Mutation::ClearInstanceStyle { id } => {
            if !state.graph.contains(*id) {
                return Mutation::Batch(Vec::new());
            }
            match state.styles.instance_style(*id) {
                Some(prev) => Mutation::SetInstanceStyle { id: *id, style: *prev },
                None => Mutation::ClearInstanceStyle { id: *id },
            }
        }
        Mutation::SetTypeStyle { key, .. } | Mutation::ClearTypeStyle { key } => match state.styles.type_style(key) {
            Some(prev) => Mutation::SetTypeStyle {
                key: key.clone(),
                style: *prev,
            },
            None => Mutation::ClearTypeStyle { key: key.clone() },
        },
        Mutation::Batch(steps) => {
            let mut scratch = state.clone();
            let mut inverses: Vec<Mutation> = steps
                .iter()
                .map(|step| apply_recorded(&mut scratch, step.clone()))
                .collect();
            inverses.reverse();
            Mutation::Batch(inverses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionMode;
    use gv_core::{Color, Edge, EntityId, EntityStyle, Node, Position, Properties, StyleKey};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> EntityId {
        EntityId::intern(s)
    }

    fn add_triangle() -> Mutation {
        Mutation::AddEntities {
            nodes: vec![
                Node::new("Ben").with_type("Person"),
                Node::new("Hamza").with_type("Person"),
                Node::new("Pedro").with_type("Person").with_property("age", 28),
            ],
            edges: vec![
                Edge::new("Ben", "Hamza").with_event(1671667200000, "meets", Properties::new()),
                Edge::new("Ben", "Pedro").with_event(1679356800000, "meets", Properties::new()),
                Edge::new("Hamza", "Pedro").with_event(1689734400000, "meets", Properties::new()),
            ],
        }
    }

    #[test]
    fn undo_redo_add() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(100);

        stack.execute(&mut state, add_triangle(), "Expand Pedro");
        assert_eq!(state.graph.node_count(), 3);
        let after = state.clone();

        let desc = stack.undo(&mut state).map(|c| c.description().to_string());
        assert_eq!(desc, Some("Expand Pedro".to_string()));
        assert_eq!(state, ViewState::new());

        stack.redo(&mut state);
        assert_eq!(state, after);
    }

    #[test]
    fn undo_of_add_keeps_entities_that_were_already_present() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(100);
        stack.execute(
            &mut state,
            Mutation::AddEntities {
                nodes: vec![Node::new("Pedro").with_type("Person")],
                edges: vec![],
            },
            "seed",
        );
        let before = state.clone();
        stack.execute(&mut state, add_triangle(), "Expand Pedro");
        stack.undo(&mut state);
        assert_eq!(state, before);
    }

    #[test]
    fn remove_node_undo_restores_edges_styles_pins_and_selection() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut state, add_triangle(), "seed");
        stack.execute(&mut state, Mutation::TogglePin { id: id("Pedro") }, "pin");
        state.positions.insert(id("Pedro"), Position::new(40.0, 50.0));
        stack.execute(
            &mut state,
            Mutation::SetInstanceStyle {
                id: id("Hamza->Pedro"),
                style: EntityStyle::color(Color::rgb(255, 0, 0)),
            },
            "style",
        );
        stack.execute(
            &mut state,
            Mutation::SetSelection {
                ids: vec![id("Pedro"), id("Ben")],
                mode: SelectionMode::Replace,
            },
            "select",
        );
        let before = state.clone();

        stack.execute(&mut state, Mutation::RemoveEntities { ids: vec![id("Pedro")] }, "Delete");
        assert_eq!(state.graph.node_count(), 2);
        assert_eq!(state.graph.edge_count(), 1);
        assert_eq!(state.selection.ids(), vec![id("Ben")]);

        // One undo step restores the node and both incident edges
        stack.undo(&mut state);
        assert_eq!(state, before);
        assert_eq!(state.positions.get(&id("Pedro")), Some(&Position::new(40.0, 50.0)));

        stack.redo(&mut state);
        assert!(!state.graph.contains_node(id("Pedro")));
    }

    #[test]
    fn undo_n_times_returns_to_initial_state() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(100);
        let initial = state.clone();

        stack.execute(&mut state, add_triangle(), "add");
        stack.execute(
            &mut state,
            Mutation::SetTypeStyle {
                key: StyleKey::NodeType("Person".into()),
                style: EntityStyle::default().with_size(30.0),
            },
            "type style",
        );
        stack.execute(
            &mut state,
            Mutation::SetSelection {
                ids: vec![id("Ben")],
                mode: SelectionMode::Add,
            },
            "select",
        );
        stack.execute(&mut state, Mutation::TogglePin { id: id("Ben") }, "pin");
        stack.execute(&mut state, Mutation::RemoveEntities { ids: vec![id("Ben")] }, "delete");
        stack.execute(
            &mut state,
            Mutation::ClearTypeStyle {
                key: StyleKey::NodeType("Person".into()),
            },
            "reset type style",
        );

        while stack.undo(&mut state).is_some() {}
        assert_eq!(state, initial);
        assert_eq!(stack.redo_len(), 6);
    }

    #[test]
    fn redo_clears_on_new_action() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(100);
        stack.execute(&mut state, add_triangle(), "add");
        stack.undo(&mut state);
        assert!(stack.can_redo());

        stack.execute(
            &mut state,
            Mutation::AddEntities {
                nodes: vec![Node::new("Pometry")],
                edges: vec![],
            },
            "add company",
        );
        assert!(!stack.can_redo());
        assert_eq!(stack.undo_description(), Some("add company"));
    }

    #[test]
    fn batch_is_one_step_and_inverts_in_reverse() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(100);
        let batch = Mutation::Batch(vec![
            add_triangle(),
            Mutation::SetSelection {
                ids: vec![id("Ben"), id("Hamza"), id("Pedro")],
                mode: SelectionMode::Replace,
            },
        ]);
        stack.execute(&mut state, batch, "Select similar");
        assert_eq!(stack.undo_len(), 1);
        assert_eq!(state.selection.len(), 3);

        stack.undo(&mut state);
        assert_eq!(state, ViewState::new());
    }

    #[test]
    fn depth_is_bounded() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(2);
        for name in ["a", "b", "c"] {
            stack.execute(
                &mut state,
                Mutation::AddEntities {
                    nodes: vec![Node::new(name)],
                    edges: vec![],
                },
                name,
            );
        }
        assert_eq!(stack.undo_len(), 2);
        stack.undo(&mut state);
        stack.undo(&mut state);
        assert!(stack.undo(&mut state).is_none());
        // The oldest step was trimmed and stays applied
        assert!(state.graph.contains_node(id("a")));
    }

    #[test]
    fn instance_style_inverse_restores_previous_value() {
        let mut state = ViewState::new();
        let mut stack = CommandStack::new(10);
        stack.execute(&mut state, add_triangle(), "add");
        let red = EntityStyle::color(Color::rgb(255, 0, 0));
        let blue = EntityStyle::color(Color::rgb(0, 0, 255));

        stack.execute(&mut state, Mutation::SetInstanceStyle { id: id("Ben"), style: red }, "red");
        stack.execute(&mut state, Mutation::SetInstanceStyle { id: id("Ben"), style: blue }, "blue");
        stack.execute(&mut state, Mutation::ClearInstanceStyle { id: id("Ben") }, "clear");
        assert!(state.styles.instance_style(id("Ben")).is_none());

        stack.undo(&mut state);
        assert_eq!(state.styles.instance_style(id("Ben")), Some(&blue));
        stack.undo(&mut state);
        assert_eq!(state.styles.instance_style(id("Ben")), Some(&red));
        stack.undo(&mut state);
        assert!(state.styles.instance_style(id("Ben")).is_none());
    }
}
