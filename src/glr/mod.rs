//! Generalized LR parsing: a graph-structured stack over all concurrent
//! parses and a shared packed parse forest holding every derivation.

mod gss;
mod parser;

pub use gss::Forest;
pub(crate) use gss::{GssGraph, GssHead, SppfPack, SppfTree};
pub(crate) use parser::GlrParser;
