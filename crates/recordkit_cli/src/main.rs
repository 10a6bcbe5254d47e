//! Inspector entry point.
//!
//! # Responsibility
//! - Verify `recordkit_core` linkage with a deterministic version line.
//! - Summarize a data file: root element and element counts per name.

use log::error;
use recordkit_core::XmlElement;
use std::collections::BTreeMap;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("recordkit_core version={}", recordkit_core::core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match XmlElement::read_file(&path) {
        Ok(root) => {
            println!("root={} items={}", root.name(), root.children().len());
            for (name, count) in element_counts(&root) {
                println!("{name}={count}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=inspect module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn element_counts(root: &XmlElement) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    let mut pending: Vec<&XmlElement> = root.children().iter().collect();
    while let Some(element) = pending.pop() {
        *counts.entry(element.name().to_string()).or_insert(0) += 1;
        pending.extend(element.children());
    }
    counts
}
