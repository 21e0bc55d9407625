//! Transition stub generator
//!
//! Development tool that writes a Rust module with one [`Transition`]
//! implementation per declared edge, ready to be filled in with the
//! product's console commands. Nothing at runtime depends on it.
//!
//! [`Transition`]: crate::transition::Transition

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::graph::ModeGraph;
use crate::models::Mode;

/// Rust source declaring a stub per edge and a `register` function
pub fn generate(graph: &ModeGraph) -> String {
    let mut out = String::new();
    let edges = unique_edges(graph);

    out.push_str("use async_trait::async_trait;\n");
    out.push_str("use modepilot::console::Console;\n");
    out.push_str("use modepilot::transition::{HopContext, HopOutcome, Transition, TransitionRegistry};\n");
    out.push_str("use modepilot::{Error, Mode, Result};\n");

    for (from, to) in &edges {
        let name = struct_name(from, to);
        // Writing to a String cannot fail
        let _ = write!(
            out,
            r#"
/// {from} -> {to}
pub struct {name};

#[async_trait]
impl Transition for {name} {{
    async fn execute(
        &self,
        from: &Mode,
        to: &Mode,
        _console: &mut dyn Console,
        _ctx: &HopContext<'_>,
    ) -> Result<HopOutcome> {{
        Err(Error::Other(format!("transition {{}} -> {{}} not implemented", from, to)))
    }}

    fn describe(&self) -> String {{
        "{from} -> {to}".to_string()
    }}
}}
"#
        );
    }

    out.push_str("\n/// Register every transition of this product\n");
    out.push_str("pub fn register(registry: &mut TransitionRegistry) {\n");
    for (from, to) in &edges {
        let _ = writeln!(
            out,
            "    registry.register({:?}, {:?}, {});",
            from.to_string(),
            to.to_string(),
            struct_name(from, to)
        );
    }
    out.push_str("}\n");
    out
}

/// Declared edges without parallel duplicates, in declaration order
fn unique_edges(graph: &ModeGraph) -> Vec<(Mode, Mode)> {
    let mut seen = BTreeSet::new();
    graph
        .edges()
        .iter()
        .filter(|e| seen.insert((e.from.clone(), e.to.clone())))
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect()
}

/// `linux#diag` -> `uboot` becomes `LinuxDiagToUboot`
pub fn struct_name(from: &Mode, to: &Mode) -> String {
    format!("{}To{}", camel_case(&from.to_string()), camel_case(&to.to_string()))
}

fn camel_case(key: &str) -> String {
    let mut name = String::new();
    for word in key.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.push_str(chars.as_str());
        }
    }
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'M');
    }
    name
}
