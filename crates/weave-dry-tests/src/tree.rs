// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Component-tree builders.
use weave_core::{ComponentIdx, ComponentRecord, ComponentTree, Core, StateValue};

use crate::doc_types::document_registry;

/// Fluent builder over [`ComponentTree`] with dense index assignment.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: ComponentTree,
    next: u32,
}

impl TreeBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parentless component.
    pub fn root(&mut self, component_type: &'static str) -> ComponentIdx {
        self.push(ComponentRecord::new(component_type))
    }

    /// Adds a child of `parent`.
    pub fn child(&mut self, parent: ComponentIdx, component_type: &'static str) -> ComponentIdx {
        self.push(ComponentRecord::new(component_type).with_parent(parent))
    }

    /// Adds a child with extra record configuration (attributes, source
    /// composite).
    pub fn child_with(
        &mut self,
        parent: ComponentIdx,
        component_type: &'static str,
        configure: impl FnOnce(ComponentRecord) -> ComponentRecord,
    ) -> ComponentIdx {
        self.push(configure(
            ComponentRecord::new(component_type).with_parent(parent),
        ))
    }

    /// Finishes the tree.
    #[must_use]
    pub fn build(self) -> ComponentTree {
        self.tree
    }

    fn push(&mut self, record: ComponentRecord) -> ComponentIdx {
        let idx = ComponentIdx(self.next);
        self.next += 1;
        self.tree.insert(idx, record);
        idx
    }
}

/// Indices of the single-award grading document.
#[derive(Debug, Clone, Copy)]
pub struct GradingDoc {
    /// The document root.
    pub document: ComponentIdx,
    /// The answer.
    pub answer: ComponentIdx,
    /// The answer's one award.
    pub award: ComponentIdx,
    /// The answer's one text input.
    pub input: ComponentIdx,
}

/// Builds a `document > answer > (award, textInput)` core: credit 1 iff the
/// input's value equals `match_text`.
///
/// `answer_attributes` land on the answer record (e.g. `maxNumAttempts`,
/// `creditByAttempt`, `nAwardsCredited`).
#[must_use]
pub fn grading_core(
    match_text: &str,
    answer_attributes: &[(&'static str, StateValue)],
) -> (Core, GradingDoc) {
    let mut builder = TreeBuilder::new();
    let document = builder.root("document");
    let answer = builder.child_with(document, "answer", |mut record| {
        for (name, value) in answer_attributes {
            record = record.with_attribute(name, value.clone());
        }
        record
    });
    let match_text = StateValue::from(match_text);
    let award = builder.child_with(answer, "award", |record| {
        record.with_attribute("matchText", match_text)
    });
    let input = builder.child(answer, "textInput");
    let core = Core::new(document_registry(), builder.build());
    (
        core,
        GradingDoc {
            document,
            answer,
            award,
            input,
        },
    )
}
