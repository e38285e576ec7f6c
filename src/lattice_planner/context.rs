//! Planning context and its optional JSON dump

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::{ContinuousState, GoalId, PlannerResult};

/// Start and candidate goals of the next search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlannerContext {
    pub start: ContinuousState,
    /// Goal id (index into the caller's target list) and pose
    pub goals: Vec<(GoalId, ContinuousState)>,
    pub force_replan_from_scratch: bool,
}

impl PlannerContext {
    pub fn goal(&self, id: GoalId) -> Option<&ContinuousState> {
        self.goals.iter().find(|(gid, _)| *gid == id).map(|(_, g)| g)
    }
}

#[derive(Serialize)]
struct ContextDump<'a> {
    search_num: u32,
    context: &'a PlannerContext,
    environment: serde_json::Value,
}

/// Writes one `context_<n>.json` file per search for offline diagnosis
#[derive(Debug, Clone)]
pub struct ContextDumper {
    dir: PathBuf,
}

impl ContextDumper {
    pub fn new(dir: &Path) -> PlannerResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, search_num: u32) -> PathBuf {
        self.dir.join(format!("context_{}.json", search_num))
    }

    pub fn dump(
        &self,
        search_num: u32,
        context: &PlannerContext,
        environment: serde_json::Value,
    ) -> PlannerResult<PathBuf> {
        let path = self.path_for(search_num);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(
            writer,
            &ContextDump {
                search_num,
                context,
                environment,
            },
        )?;
        Ok(path)
    }
}
