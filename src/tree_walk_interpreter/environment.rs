use std::{cell::RefCell, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

use super::Value;

/// One frame of variable bindings, chained to the frame it was created in.
#[derive(Default)]
pub struct Environment {
    values: FxHashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn boxed(enclosing: Option<Rc<RefCell<Environment>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            values: FxHashMap::default(),
            enclosing,
        }))
    }

    /// Binds `name` in this frame, replacing any previous binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Looks `name` up in this frame and then outward.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(value) => Some(value.clone()),
            None => self.enclosing.as_ref()?.borrow().get(name),
        }
    }

    /// Rebinds an existing `name` in this frame or the nearest enclosing one
    /// that has it. Returns `None` when no frame binds the name.
    pub fn assign(&mut self, name: &str, value: Value) -> Option<()> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Some(())
            }
            None => self.enclosing.as_ref()?.borrow_mut().assign(name, value),
        }
    }

    fn ancestor(mut environment: Rc<RefCell<Self>>, distance: usize) -> Option<Rc<RefCell<Self>>> {
        for _ in 0..distance {
            let enclosing = environment.borrow().enclosing.clone()?;
            environment = enclosing;
        }
        Some(environment)
    }

    /// Reads `name` from exactly the frame `distance` hops out.
    pub fn get_at(environment: &Rc<RefCell<Self>>, distance: usize, name: &str) -> Option<Value> {
        let frame = Self::ancestor(environment.clone(), distance)?;
        let value = frame.borrow().values.get(name).cloned();
        value
    }

    /// Rebinds `name` in exactly the frame `distance` hops out.
    pub fn assign_at(
        environment: &Rc<RefCell<Self>>,
        distance: usize,
        name: &str,
        value: Value,
    ) -> Option<()> {
        let frame = Self::ancestor(environment.clone(), distance)?;
        let mut frame = frame.borrow_mut();
        let slot = frame.values.get_mut(name)?;
        *slot = value;
        Some(())
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("enclosing", &self.enclosing.as_ref().map(|e| e.as_ptr()))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let globals = Environment::boxed(None);
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::boxed(Some(globals.clone()));
        inner.borrow_mut().define("b", Value::Number(2.0));

        assert_eq!(inner.borrow().get("a"), Some(Value::Number(1.0)));
        assert_eq!(inner.borrow().get("b"), Some(Value::Number(2.0)));
        assert_eq!(globals.borrow().get("b"), None);
    }

    #[test]
    fn test_resolved_access_uses_exact_frame() {
        let outer = Environment::boxed(None);
        outer.borrow_mut().define("x", Value::Number(1.0));
        let inner = Environment::boxed(Some(outer.clone()));
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(Environment::get_at(&inner, 0, "x"), Some(Value::Number(2.0)));
        assert_eq!(Environment::get_at(&inner, 1, "x"), Some(Value::Number(1.0)));

        assert_eq!(Environment::assign_at(&inner, 1, "x", Value::Nil), Some(()));
        assert_eq!(outer.borrow().get("x"), Some(Value::Nil));
        assert_eq!(inner.borrow().get("x"), Some(Value::Number(2.0)));

        assert_eq!(Environment::get_at(&inner, 0, "missing"), None);
        assert_eq!(Environment::assign_at(&inner, 5, "x", Value::Nil), None);
    }

    #[test]
    fn test_assign_requires_existing_binding() {
        let globals = Environment::boxed(None);
        assert_eq!(globals.borrow_mut().assign("nope", Value::Nil), None);
        globals.borrow_mut().define("yes", Value::Nil);
        assert_eq!(
            globals.borrow_mut().assign("yes", Value::Boolean(true)),
            Some(())
        );
        assert_eq!(globals.borrow().get("yes"), Some(Value::Boolean(true)));
    }
}
