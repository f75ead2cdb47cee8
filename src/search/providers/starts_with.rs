//! Prefix provider.

use crate::error::Result;
use crate::index::{is_reserved_term, names};
use crate::search::inspect::{QueryInspectionNode, display_term};
use crate::search::providers::{TermContext, TermProvider};
use crate::storage::{Forward, TermTreeValue, TreeIterator};

/// Terms starting with a prefix, ascending.
#[derive(Debug)]
pub struct StartsWithTermProvider {
    context: TermContext,
    iterator: Option<TreeIterator<Vec<u8>, Forward>>,
    prefix: Vec<u8>,
    started: bool,
    done: bool,
}

impl StartsWithTermProvider {
    pub fn new(context: TermContext, prefix: Vec<u8>) -> Self {
        let iterator = context
            .snapshot()
            .tree::<Vec<u8>>(&names::terms(context.field()))
            .map(TreeIterator::new);
        StartsWithTermProvider {
            context,
            iterator,
            prefix,
            started: false,
            done: false,
        }
    }
}

impl TermProvider for StartsWithTermProvider {
    fn reset(&mut self) {
        self.started = false;
        self.done = false;
    }

    fn next_term(&mut self) -> Result<Option<(Vec<u8>, TermTreeValue)>> {
        if self.done {
            return Ok(None);
        }
        let Some(iterator) = self.iterator.as_mut() else {
            self.done = true;
            return Ok(None);
        };
        if !self.started {
            self.started = true;
            iterator.seek(self.prefix.clone());
        }

        while let Some((term, value)) = iterator.move_next() {
            if !term.starts_with(&self.prefix) {
                break;
            }
            if is_reserved_term(&term) {
                continue;
            }
            return Ok(Some((term, value)));
        }
        self.done = true;
        Ok(None)
    }

    fn context(&self) -> &TermContext {
        &self.context
    }

    fn inspect(&self) -> QueryInspectionNode {
        QueryInspectionNode::new("StartsWith")
            .with_parameter("field", self.context.field())
            .with_parameter("prefix", display_term(&self.prefix))
    }
}
