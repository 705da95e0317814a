pub mod collector;
pub mod rewriter;

use std::collections::BTreeSet;

use crate::ir::types::Module;

/// Collects ORM variable names from the compiled tree, then rewrites it back to source form.
/// Every call works on its own tree and registry.
pub fn run_all_passes(mut module: Module) -> (Module, BTreeSet<String>) {
    // collection runs first, on the compiled names
    let orm_variables = collector::run(&module);
    rewriter::run(&mut module);

    (module, orm_variables)
}
