pub mod args;
pub mod array_literal;
pub mod report;
