//! Variable resolution with lexical scoping.
//!
//! A walk starts from a [`GlobalContext`] over the root data map. Every
//! loop iteration layers a [`LoopContext`] on top; inner scopes win and
//! unshadowed names stay reachable through the parent chain.

use crate::path::resolve_path;
use crate::value::Value;

/// The resolution capability handed to the visitors.
pub trait EvaluationContext {
    /// Resolve a name to a value, or `None` when it is not bound here or
    /// in any enclosing scope.
    fn try_resolve(&self, name: &str) -> Option<Value>;

    /// The root data the outermost scope wraps.
    fn root_data(&self) -> &Value;
}

/// The outermost scope: direct keys of the root map, then property-path
/// navigation from the root.
pub struct GlobalContext<'a> {
    data: &'a Value,
}

impl<'a> GlobalContext<'a> {
    pub fn new(data: &'a Value) -> Self {
        GlobalContext { data }
    }
}

impl EvaluationContext for GlobalContext<'_> {
    fn try_resolve(&self, name: &str) -> Option<Value> {
        if let Value::Map(map) = self.data {
            if let Some(value) = map.get(name) {
                return Some(value.clone());
            }
        }
        resolve_path(self.data, name)
    }

    fn root_data(&self) -> &Value {
        self.data
    }
}

/// Per-iteration loop state.
#[derive(Debug, Clone)]
pub struct LoopScope {
    pub item: Value,
    pub index: usize,
    pub count: usize,
    pub collection_name: String,
    pub iteration_var: Option<String>,
}

impl LoopScope {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }
}

/// A loop iteration's scope chained onto the enclosing context.
pub struct LoopContext<'a> {
    scope: &'a LoopScope,
    parent: &'a dyn EvaluationContext,
}

impl<'a> LoopContext<'a> {
    pub fn new(scope: &'a LoopScope, parent: &'a dyn EvaluationContext) -> Self {
        LoopContext { scope, parent }
    }

    fn resolve_in_item(&self, name: &str) -> Option<Value> {
        if name == "." || name == "this" {
            return Some(self.scope.item.clone());
        }
        let name = name
            .strip_prefix("this.")
            .or_else(|| name.strip_prefix('.').filter(|rest| !rest.is_empty()))
            .unwrap_or(name);
        if let Value::Map(map) = &self.scope.item {
            if let Some(value) = map.get(name) {
                return Some(value.clone());
            }
        }
        resolve_path(&self.scope.item, name)
    }
}

impl EvaluationContext for LoopContext<'_> {
    fn try_resolve(&self, name: &str) -> Option<Value> {
        // loop metadata; unknown @names fail without consulting parents
        if name.starts_with('@') {
            return match name {
                "@index" => Some(Value::Int(self.scope.index as i64)),
                "@first" => Some(Value::Bool(self.scope.is_first())),
                "@last" => Some(Value::Bool(self.scope.is_last())),
                "@count" => Some(Value::Int(self.scope.count as i64)),
                _ => None,
            };
        }

        // the declared iteration variable shadows everything else
        if let Some(var) = &self.scope.iteration_var {
            if name == var {
                return Some(self.scope.item.clone());
            }
            if let Some(rest) = name.strip_prefix(var.as_str()) {
                if let Some(rest) = rest.strip_prefix('.') {
                    return self.resolve_in_item(rest);
                }
            }
        }

        // the implicit scope of the current item
        if let Some(value) = self.resolve_in_item(name) {
            return Some(value);
        }

        self.parent.try_resolve(name)
    }

    fn root_data(&self) -> &Value {
        self.parent.root_data()
    }
}
