//! Existence provider.

use crate::error::Result;
use crate::index::names;
use crate::search::inspect::QueryInspectionNode;
use crate::search::providers::{TermContext, TermProvider};
use crate::storage::{Forward, TermTreeValue, TreeIterator};

/// Every term of a field, reserved null/empty terms included, ascending.
#[derive(Debug)]
pub struct ExistsTermProvider {
    context: TermContext,
    iterator: Option<TreeIterator<Vec<u8>, Forward>>,
}

impl ExistsTermProvider {
    pub fn new(context: TermContext) -> Self {
        let iterator = context
            .snapshot()
            .tree::<Vec<u8>>(&names::terms(context.field()))
            .map(TreeIterator::new);
        ExistsTermProvider { context, iterator }
    }

    /// Next term with a single trailing zero padding byte removed.
    pub fn next_raw_term(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.next_term()?.map(|(mut term, _)| {
            if term.last() == Some(&0) {
                term.pop();
            }
            term
        }))
    }
}

impl TermProvider for ExistsTermProvider {
    fn reset(&mut self) {
        if let Some(iterator) = self.iterator.as_mut() {
            iterator.reset();
        }
    }

    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>> {
        Ok(self.iterator.as_mut().and_then(|it| it.move_next()))
    }

    fn context(&self) -> &TermContext {
        &self.context
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("Exists").with_parameter("field", self.context.field())
    }
}
