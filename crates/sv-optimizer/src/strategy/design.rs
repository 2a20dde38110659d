use serde::{Deserialize, Serialize};

use sv_types::{Candidate, SvResult};

use super::{check_batch_size, default_batch_size, SearchStrategy};
use crate::instance::SearchInstance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignPointsConfig {
    pub design: Vec<Candidate>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Replays a fixed table of candidates in order.
#[derive(Debug, Clone)]
pub struct DesignPoints {
    design: Vec<Candidate>,
    batch_size: usize,
    cursor: usize,
}

impl DesignPoints {
    pub fn new(config: DesignPointsConfig) -> SvResult<Self> {
        check_batch_size(config.batch_size)?;
        Ok(Self {
            design: config.design,
            batch_size: config.batch_size,
            cursor: 0,
        })
    }
}

impl SearchStrategy for DesignPoints {
    fn name(&self) -> &str {
        "design_points"
    }

    fn is_bounded(&self) -> bool {
        true
    }

    fn propose(&mut self, instance: &SearchInstance) -> SvResult<Option<Vec<Candidate>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size && self.cursor < self.design.len() {
            let row = &self.design[self.cursor];
            self.cursor += 1;
            match instance.space().check(row) {
                Ok(()) => batch.push(row.clone()),
                Err(err) => instance.log().rejected(row, &err.to_string()),
            }
        }
        Ok((!batch.is_empty()).then_some(batch))
    }
}
