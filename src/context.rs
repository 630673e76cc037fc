//! Per-request context map: typed extension storage middleware use to
//! pass data to downstream middleware and the final handler (`spec.md`
//! §4.5).

use std::any::{Any, TypeId};
use std::collections::HashMap;

#[derive(Default)]
pub struct Context {
    values: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Context {
    pub fn new() -> Self {
        Context {
            values: HashMap::new(),
        }
    }

    pub fn insert<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast::<T>().ok().map(|b| *b))
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok().map(|b| *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct UserId(u64);

    #[test]
    fn insert_and_get_round_trips() {
        let mut ctx = Context::new();
        assert!(ctx.insert(UserId(42)).is_none());
        assert_eq!(ctx.get::<UserId>(), Some(&UserId(42)));
    }

    #[test]
    fn distinct_types_do_not_collide() {
        let mut ctx = Context::new();
        ctx.insert(UserId(1));
        ctx.insert("a string".to_string());
        assert_eq!(ctx.get::<UserId>(), Some(&UserId(1)));
        assert_eq!(ctx.get::<String>(), Some(&"a string".to_string()));
    }

    #[test]
    fn remove_returns_owned_value() {
        let mut ctx = Context::new();
        ctx.insert(UserId(7));
        assert_eq!(ctx.remove::<UserId>(), Some(UserId(7)));
        assert!(ctx.get::<UserId>().is_none());
    }
}
