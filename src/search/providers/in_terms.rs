//! Provider over an explicit list of terms.

use std::sync::Arc;

use crate::error::Result;
use crate::index::names;
use crate::search::inspect::QueryInspectionNode;
use crate::search::providers::{TermContext, TermProvider};
use crate::storage::{TermTree, TermTreeValue};

/// The terms of a candidate list that exist in the field, in ascending
/// term order.
#[derive(Debug)]
pub struct InTermProvider {
    context: TermContext,
    tree: Option<Arc<TermTree<Vec<u8>>>>,
    terms: Vec<Vec<u8>>,
    position: usize,
}

impl InTermProvider {
    pub fn new(context: TermContext, mut terms: Vec<Vec<u8>>) -> Self {
        terms.sort_unstable();
        terms.dedup();
        let tree = context
            .snapshot()
            .tree::<Vec<u8>>(&names::terms(context.field()));
        InTermProvider {
            context,
            tree,
            terms,
            position: 0,
        }
    }
}

impl TermProvider for InTermProvider {
    fn reset(&mut self) {
        self.position = 0;
    }

    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>> {
        let Some(tree) = self.tree.as_ref() else {
            return Ok(None);
        };
        while self.position < self.terms.len() {
            let term = &self.terms[self.position];
            self.position += 1;
            if let Some(value) = tree.get(term.as_slice()) {
                return Ok(Some((term.clone(), value)));
            }
        }
        Ok(None)
    }

    fn context(&self) -> &TermContext {
        &self.context
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("In")
            .with_parameter("field", self.context.field())
            .with_parameter("terms", self.terms.len())
    }
}
