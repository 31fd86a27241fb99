//! Generation statistics — what was emitted, what was throttled.
//!
//! Recoverable validation failures never abort the run, so the only place
//! they become visible is this summary. Every exclusion increments a
//! per-category throttled count.

use std::collections::BTreeMap;

use tracing::info;

#[derive(Debug, Default)]
pub struct Statistics {
    pub enums: usize,
    pub objects: usize,
    pub interfaces: usize,
    pub structs: usize,
    pub boxed: usize,
    pub opaques: usize,
    pub callbacks: usize,
    pub methods: usize,
    pub constructors: usize,
    pub properties: usize,
    pub fields: usize,
    pub signals: usize,
    pub virtual_methods: usize,
    throttled: BTreeMap<&'static str, usize>,
}

impl Statistics {
    pub fn throttle(&mut self, category: &'static str) {
        *self.throttled.entry(category).or_insert(0) += 1;
    }

    pub fn throttled_count(&self, category: &str) -> usize {
        self.throttled.get(category).copied().unwrap_or(0)
    }

    pub fn total_throttled(&self) -> usize {
        self.throttled.values().sum()
    }

    /// Log the end-of-run summary.
    pub fn report(&self) {
        info!(
            enums = self.enums,
            objects = self.objects,
            interfaces = self.interfaces,
            structs = self.structs,
            boxed = self.boxed,
            opaques = self.opaques,
            callbacks = self.callbacks,
            "generated types"
        );
        info!(
            methods = self.methods,
            constructors = self.constructors,
            properties = self.properties,
            fields = self.fields,
            signals = self.signals,
            virtual_methods = self.virtual_methods,
            "generated members"
        );
        if self.total_throttled() == 0 {
            info!("no members were throttled");
        } else {
            for (category, count) in &self.throttled {
                info!(category = *category, count = *count, "throttled members");
            }
        }
    }
}
