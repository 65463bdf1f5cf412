pub mod ast;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod span;
pub mod tokenizer;
pub mod tree_walk_interpreter;
