use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use super::{ExecutionErrorKind, Value};

thread_local! {
    /// Storage of the arrays whose elements are being rendered right now.
    static RENDERING: RefCell<Vec<*const RefCell<Vec<Value>>>> = const { RefCell::new(Vec::new()) };
}

/// A growable, shared list of values. Clones alias the same storage.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn get(&self, index: f64) -> Result<Value, ExecutionErrorKind> {
        let index = self.index(index)?;
        Ok(self.0.borrow()[index].clone())
    }

    pub fn set(&self, index: f64, value: Value) -> Result<(), ExecutionErrorKind> {
        let index = self.index(index)?;
        self.0.borrow_mut()[index] = value;
        Ok(())
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn index(&self, index: f64) -> Result<usize, ExecutionErrorKind> {
        let len = self.len();
        if index.fract() != 0.0 || index < 0.0 || index >= len as f64 {
            return Err(ExecutionErrorKind::IndexOutOfRange { index, len });
        }
        Ok(index as usize)
    }
}

/// An array nested inside itself renders as `[...]`.
impl Display for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = Rc::as_ptr(&self.0);
        if RENDERING.with(|rendering| rendering.borrow().contains(&storage)) {
            return write!(f, "[...]");
        }

        RENDERING.with(|rendering| rendering.borrow_mut().push(storage));
        let result = self.fmt_elements(f);
        RENDERING.with(|rendering| rendering.borrow_mut().pop());
        result
    }
}

impl Array {
    fn fmt_elements(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.borrow().iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Array({})", self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_get_set() {
        let array = Array::new();
        assert!(array.is_empty());
        array.push(Value::Number(1.0));
        array.push(Value::String("two".to_string()));
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(1.0).unwrap(), Value::String("two".to_string()));

        array.set(0.0, Value::Boolean(true)).unwrap();
        assert_eq!(array.to_string(), "[true, two]");
    }

    #[test]
    fn test_out_of_range() {
        let array = Array::new();
        array.push(Value::Nil);
        for index in [-1.0, 1.0, 0.5, f64::NAN] {
            assert!(matches!(
                array.get(index),
                Err(ExecutionErrorKind::IndexOutOfRange { len: 1, .. })
            ));
        }
        assert!(array.set(3.0, Value::Nil).is_err());
    }

    #[test]
    fn test_self_containing_array_renders() {
        let array = Array::new();
        array.push(Value::Number(1.0));
        array.push(Value::Array(array.clone()));
        assert_eq!(array.to_string(), "[1, [...]]");
        assert_eq!(format!("{:?}", array), "Array([1, [...]])");

        let inner = Array::new();
        inner.push(Value::Nil);
        let outer = Array::new();
        outer.push(Value::Array(inner.clone()));
        outer.push(Value::Array(inner));
        assert_eq!(outer.to_string(), "[[nil], [nil]]");
    }

    #[test]
    fn test_clones_share_storage() {
        let array = Array::new();
        let alias = array.clone();
        alias.push(Value::Nil);
        assert_eq!(array.len(), 1);
        assert!(array.ptr_eq(&alias));
        assert!(!array.ptr_eq(&Array::new()));
    }
}
