pub mod parser;
pub mod terms;
pub mod triple;
pub mod triple_node;
