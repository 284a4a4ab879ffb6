//! Hierarchical variable namespaces.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::variable::Variable;

/// Shared handle to a variable living in a scope.
pub type VarHandle = Arc<RwLock<Variable>>;

/// A namespace of variables with an optional parent.
///
/// Lookups walk up to the root; creation always happens locally, so a child
/// shadows its parent without touching it. Kids are owned by their parent
/// until [`Scope::drop_kids`] or [`Scope::delete_scope`].
#[derive(Default)]
pub struct Scope {
    vars: RwLock<HashMap<String, VarHandle>>,
    kids: Mutex<Vec<Arc<Scope>>>,
    parent: Option<Weak<Scope>>,
}

impl Scope {
    /// A new root scope.
    pub fn new() -> Arc<Scope> {
        Arc::new(Scope::default())
    }

    /// Create a child scope owned by this one.
    pub fn new_scope(self: &Arc<Self>) -> Arc<Scope> {
        let kid = Arc::new(Scope {
            vars: RwLock::new(HashMap::new()),
            kids: Mutex::new(Vec::new()),
            parent: Some(Arc::downgrade(self)),
        });
        self.kids.lock().push(Arc::clone(&kid));
        kid
    }

    /// Get the local variable `name`, creating an empty one if needed.
    pub fn var(&self, name: &str) -> VarHandle {
        if let Some(var) = self.vars.read().get(name) {
            return Arc::clone(var);
        }
        let mut vars = self.vars.write();
        Arc::clone(
            vars.entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(Variable::new()))),
        )
    }

    /// Look `name` up here, then in each ancestor.
    pub fn find_var(&self, name: &str) -> Option<VarHandle> {
        if let Some(var) = self.find_local_var(name) {
            return Some(var);
        }
        self.parent().and_then(|p| p.find_var(name))
    }

    pub fn find_local_var(&self, name: &str) -> Option<VarHandle> {
        self.vars.read().get(name).cloned()
    }

    /// Names of variables created in this scope, sorted.
    pub fn local_var_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn kids(&self) -> Vec<Arc<Scope>> {
        self.kids.lock().clone()
    }

    pub fn drop_kids(&self) {
        self.kids.lock().clear();
    }

    /// Release one kid scope.
    pub fn delete_scope(&self, kid: &Arc<Scope>) {
        self.kids.lock().retain(|k| !Arc::ptr_eq(k, kid));
    }

    pub fn parent(&self) -> Option<Arc<Scope>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_is_create_or_get() {
        let scope = Scope::new();
        let a = scope.var("a");
        let b = scope.var("a");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(scope.local_var_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_child_shadows_parent() {
        let root = Scope::new();
        let x = root.var("x");
        let kid = root.new_scope();

        assert!(Arc::ptr_eq(&kid.find_var("x").unwrap(), &x));
        assert!(kid.find_local_var("x").is_none());

        let shadow = kid.var("x");
        assert!(!Arc::ptr_eq(&shadow, &x));
        assert!(Arc::ptr_eq(&kid.find_var("x").unwrap(), &shadow));
        assert!(Arc::ptr_eq(&root.find_var("x").unwrap(), &x));
        assert!(root.find_var("missing").is_none());
    }

    #[test]
    fn test_kids_lifecycle() {
        let root = Scope::new();
        let a = root.new_scope();
        let _b = root.new_scope();
        assert_eq!(root.kids().len(), 2);
        assert!(Arc::ptr_eq(&a.parent().unwrap(), &root));

        root.delete_scope(&a);
        assert_eq!(root.kids().len(), 1);
        root.drop_kids();
        assert!(root.kids().is_empty());
    }
}
