// src/validate/mod.rs
pub mod input;
pub mod output;

pub use input::validate_raw_data;
pub use output::validate_converted_data;

use serde::Serialize;
use std::collections::BTreeMap;

/// Itemized messages kept per category before collapsing into a summary line.
pub const MAX_ITEMS_PER_CATEGORY: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }
}

/// Collects messages for one category, keeping only the first few verbatim.
#[derive(Debug)]
struct Capped {
    label: &'static str,
    items: Vec<String>,
    overflow: usize,
}

impl Capped {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            items: Vec::new(),
            overflow: 0,
        }
    }

    fn push(&mut self, message: String) {
        if self.items.len() < MAX_ITEMS_PER_CATEGORY {
            self.items.push(message);
        } else {
            self.overflow += 1;
        }
    }

    fn count(&self) -> usize {
        self.items.len() + self.overflow
    }

    fn drain_into(self, out: &mut Vec<String>) {
        out.extend(self.items);
        if self.overflow > 0 {
            out.push(format!("...and {} more {}", self.overflow, self.label));
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 10_000.0).round() / 100.0
    }
}
