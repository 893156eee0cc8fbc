//! Optional execution-trace recorder ("Note"), spec §6: a tree mirroring
//! the call graph, one node per frame, walkable by a host that wants to
//! inspect or render how a transaction executed without re-deriving it
//! from the staged [`crate::storage::ResultCache`].
//!
//! Recording is opt-in (`Evm::execute_with_trace`) and costs an extra
//! clone of the frame's inputs/outputs per CALL/CREATE; the interpreter
//! loop itself never touches this module.

use crate::call_frame::CallKind;
use bytes::Bytes;
use ethereum_types::{Address, U256};
use serde::Serialize;

/// One activation in the call tree, with its completed children already
/// attached. Mirrors spec §6's `Note` node: `{type, from, to, gas, value,
/// input, executionError?, returnData, subNotes}`.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub kind: NoteKind,
    pub from: Address,
    pub to: Address,
    pub gas: u64,
    pub gas_used: u64,
    pub value: U256,
    #[serde(with = "bytes_as_hex")]
    pub input: Bytes,
    #[serde(with = "bytes_as_hex")]
    pub return_data: Bytes,
    pub success: bool,
    pub execution_error: Option<String>,
    pub sub_notes: Vec<Note>,
}

/// The frame kind a [`Note`] records, one variant per spec component K
/// closure opcode plus the outermost transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteKind {
    External,
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
}

impl From<CallKind> for NoteKind {
    fn from(kind: CallKind) -> Self {
        match kind {
            CallKind::External => NoteKind::External,
            CallKind::Call => NoteKind::Call,
            CallKind::CallCode => NoteKind::CallCode,
            CallKind::DelegateCall => NoteKind::DelegateCall,
            CallKind::StaticCall => NoteKind::StaticCall,
            CallKind::Create => NoteKind::Create,
            CallKind::Create2 => NoteKind::Create2,
        }
    }
}

impl Note {
    /// Depth-first walk of this node and every descendant, shallowest
    /// first, each visited with its nesting depth (0 = this node).
    pub fn walk(&self, visit: &mut impl FnMut(&Note, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at(&self, depth: usize, visit: &mut impl FnMut(&Note, usize)) {
        visit(self, depth);
        for child in &self.sub_notes {
            child.walk_at(depth + 1, visit);
        }
    }

    /// Total number of nodes in the tree rooted at `self`, including
    /// `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .sub_notes
            .iter()
            .map(Note::node_count)
            .sum::<usize>()
    }
}

/// A growable, append-only call stack used while an execution is in
/// flight: [`crate::vm::VM`]'s closure machinery pushes a partially built
/// `Note` on frame entry and pops+attaches it to its parent on frame exit.
/// `None` when the host did not request tracing, so the bookkeeping costs
/// nothing on the hot path.
#[derive(Debug, Default)]
pub struct NoteRecorder {
    stack: Vec<Note>,
}

impl NoteRecorder {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn enter(&mut self, kind: CallKind, from: Address, to: Address, gas: u64, value: U256, input: Bytes) {
        self.stack.push(Note {
            kind: kind.into(),
            from,
            to,
            gas,
            gas_used: 0,
            value,
            input,
            return_data: Bytes::new(),
            success: false,
            execution_error: None,
            sub_notes: Vec::new(),
        });
    }

    /// Closes the most recently opened frame and attaches it to its
    /// parent, or returns it as the finished root if it was the outermost
    /// frame.
    pub fn exit(
        &mut self,
        gas_used: u64,
        success: bool,
        return_data: Bytes,
        execution_error: Option<String>,
    ) -> Option<Note> {
        let mut note = self.stack.pop()?;
        note.gas_used = gas_used;
        note.success = success;
        note.return_data = return_data;
        note.execution_error = execution_error;

        match self.stack.last_mut() {
            Some(parent) => {
                parent.sub_notes.push(note);
                None
            }
            None => Some(note),
        }
    }
}

mod bytes_as_hex {
    use bytes::Bytes;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_without_matching_enter_returns_none() {
        let mut recorder = NoteRecorder::new();
        assert!(recorder.exit(0, true, Bytes::new(), None).is_none());
    }

    #[test]
    fn nested_frame_attaches_to_parent_on_exit() {
        let mut recorder = NoteRecorder::new();
        recorder.enter(CallKind::External, Address::zero(), Address::repeat_byte(1), 100, U256::zero(), Bytes::new());
        recorder.enter(CallKind::Call, Address::repeat_byte(1), Address::repeat_byte(2), 50, U256::zero(), Bytes::new());
        let inner_done = recorder.exit(10, true, Bytes::from_static(b"ok"), None);
        assert!(inner_done.is_none());

        let root = recorder.exit(20, true, Bytes::new(), None).expect("root frame");
        assert_eq!(root.sub_notes.len(), 1);
        assert_eq!(root.sub_notes[0].gas_used, 10);
        assert_eq!(root.node_count(), 2);
    }

    #[test]
    fn walk_visits_depth_first_with_correct_depths() {
        let mut recorder = NoteRecorder::new();
        recorder.enter(CallKind::External, Address::zero(), Address::zero(), 0, U256::zero(), Bytes::new());
        recorder.enter(CallKind::Call, Address::zero(), Address::zero(), 0, U256::zero(), Bytes::new());
        recorder.exit(0, true, Bytes::new(), None);
        let root = recorder.exit(0, true, Bytes::new(), None).unwrap();

        let mut depths = Vec::new();
        root.walk(&mut |_, depth| depths.push(depth));
        assert_eq!(depths, vec![0, 1]);
    }
}
