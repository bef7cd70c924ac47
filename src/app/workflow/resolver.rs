use std::fmt;

use crate::app::error::AppError;

use super::model::{ElementSpec, SelectorKind, DEFAULT_MAX_DEPTH};
use super::store::ConfigStore;

/// A query against the live UI tree built from an [`ElementSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub value: String,
    pub clickable: Option<bool>,
    pub scrollable: Option<bool>,
    pub ancestor: Option<Relation>,
    pub descendant: Option<Relation>,
    /// More than one node may match; the caller picks.
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub selector: Box<Selector>,
    pub max_depth: u32,
}

impl Selector {
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            clickable: None,
            scrollable: None,
            ancestor: None,
            descendant: None,
            multiple: false,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.kind, self.value)?;
        if let Some(clickable) = self.clickable {
            write!(f, " CLICKABLE={clickable}")?;
        }
        if let Some(scrollable) = self.scrollable {
            write!(f, " SCROLLABLE={scrollable}")?;
        }
        if let Some(relation) = &self.ancestor {
            write!(f, " ANCESTOR(depth<={})[{}]", relation.max_depth, relation.selector)?;
        }
        if let Some(relation) = &self.descendant {
            write!(f, " DESCENDANT(depth<={})[{}]", relation.max_depth, relation.selector)?;
        }
        if self.multiple {
            f.write_str(" MULTIPLE")?;
        }
        Ok(())
    }
}

/// Builds a fresh selector for `spec`. Nothing is cached: the UI tree changes
/// between calls.
pub fn resolve(spec: &ElementSpec) -> Selector {
    let max_depth = spec.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
    let relation = |nested: &ElementSpec| Relation {
        selector: Box::new(resolve(nested)),
        max_depth,
    };
    Selector {
        kind: spec.kind,
        value: spec.value.clone(),
        clickable: spec.clickable,
        scrollable: spec.scrollable,
        ancestor: spec.ancestor.as_deref().map(relation),
        descendant: spec.descendant.as_deref().map(relation),
        multiple: spec.multiple,
    }
}

pub fn resolve_named(store: &ConfigStore, name: &str, trace_id: &str) -> Result<Selector, AppError> {
    store.ui_element(name, trace_id).map(resolve)
}
