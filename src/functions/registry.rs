use crate::functions::primitives::{
    Abs, Add, Cos, Cube, Div, Exp, Inv, Log, Mul, Neg, Sin, Sqrt, Square, Sub, Tan, Tanh,
};
use std::{collections::HashMap, sync::Arc};

use super::traits::Primitive;

/// Alias-keyed catalog of every primitive a library may draw from.
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Primitive>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register_primitives();
        registry
    }

    pub fn get_primitive(&self, name: &str) -> Option<Arc<dyn Primitive>> {
        self.functions.get(name).cloned()
    }

    /// Registered aliases, sorted
    pub fn aliases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Add or replace a primitive under its alias.
    pub fn register(&mut self, primitive: Arc<dyn Primitive>) {
        self.functions.insert(primitive.alias().to_string(), primitive);
    }

    fn register_primitives(&mut self) {
        let primitives: Vec<Arc<dyn Primitive>> = vec![
            Arc::new(Add),
            Arc::new(Sub),
            Arc::new(Mul),
            Arc::new(Div),
            Arc::new(Sin),
            Arc::new(Cos),
            Arc::new(Tan),
            Arc::new(Exp),
            Arc::new(Log),
            Arc::new(Sqrt),
            Arc::new(Square),
            Arc::new(Cube),
            Arc::new(Neg),
            Arc::new(Abs),
            Arc::new(Inv),
            Arc::new(Tanh),
        ];
        for primitive in primitives {
            self.register(primitive);
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
