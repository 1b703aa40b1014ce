//! Opcode counters
//!
//! Disabled unless the VM was built with [`super::VM::with_profiling`].

use crate::bytecode::Opcode;
use std::collections::HashMap;

/// Per-opcode execution counts
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    enabled: bool,
    total_instructions: u64,
    instruction_counts: HashMap<u8, u64>,
    failed_redirects: u64,
    max_stack_depth: usize,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reset(&mut self) {
        self.total_instructions = 0;
        self.instruction_counts.clear();
        self.failed_redirects = 0;
        self.max_stack_depth = 0;
    }

    pub fn record(&mut self, opcode: Opcode, stack_depth: usize) {
        if !self.enabled {
            return;
        }
        self.total_instructions += 1;
        *self.instruction_counts.entry(opcode as u8).or_insert(0) += 1;
        self.max_stack_depth = self.max_stack_depth.max(stack_depth);
    }

    pub fn record_failed_redirect(&mut self) {
        if self.enabled {
            self.failed_redirects += 1;
        }
    }

    pub fn total_instructions(&self) -> u64 {
        self.total_instructions
    }

    pub fn instruction_count(&self, opcode: Opcode) -> u64 {
        self.instruction_counts
            .get(&(opcode as u8))
            .copied()
            .unwrap_or(0)
    }

    pub fn failed_redirects(&self) -> u64 {
        self.failed_redirects
    }

    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    /// Counts sorted by frequency, ties by opcode byte
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("instructions: {}\n", self.total_instructions));
        report.push_str(&format!("max stack depth: {}\n", self.max_stack_depth));
        report.push_str(&format!("failed redirects: {}\n", self.failed_redirects));

        let mut counts: Vec<_> = self.instruction_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (byte, count) in counts {
            let name = Opcode::try_from(*byte)
                .map(|op| format!("{:?}", op))
                .unwrap_or_else(|_| format!("{:#04x}", byte));
            let share = *count as f64 / self.total_instructions as f64 * 100.0;
            report.push_str(&format!("  {:<16} {:>8} ({:>5.1}%)\n", name, count, share));
        }
        report
    }
}
