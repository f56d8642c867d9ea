//! Tournament entrants and where their moves come from.

use std::{fmt, hash::Hash, path::PathBuf, sync::Arc};

use crate::game_interface::{AgentKind, MovePolicy};

/// How an agent is made to play.
#[derive(Clone)]
pub enum AgentSource {
    /// An executable started in its own process for each match.
    Executable(PathBuf),
    /// A policy run on a worker thread for each move.
    InProcess(Arc<dyn MovePolicy>),
    /// The submission could not be turned into a runnable agent. The message says why.
    Missing(String),
}

impl fmt::Debug for AgentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentSource::Executable(path) => f.debug_tuple("Executable").field(path).finish(),
            AgentSource::InProcess(_) => f.write_str("InProcess"),
            AgentSource::Missing(msg) => f.debug_tuple("Missing").field(msg).finish(),
        }
    }
}

/// An entrant: its identity plus the handle used to make it play.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Entrant id (submission folder name). Unique within a tournament.
    pub name: String,
    /// Declared type, decides which capability the opponent is asked for.
    pub kind: AgentKind,
    /// Extra command line arguments for process agents.
    pub args: Vec<String>,
    /// Where the moves come from.
    pub source: AgentSource,
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Agent {}

impl Hash for Agent {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Agent {
    /// A process agent.
    pub fn executable(
        name: impl Into<String>,
        path: PathBuf,
        kind: AgentKind,
        args: Vec<String>,
    ) -> Agent {
        Agent {
            name: name.into(),
            kind,
            args,
            source: AgentSource::Executable(path),
        }
    }

    /// An in-process agent.
    pub fn in_process(
        name: impl Into<String>,
        kind: AgentKind,
        policy: Arc<dyn MovePolicy>,
    ) -> Agent {
        Agent {
            name: name.into(),
            kind,
            args: vec![],
            source: AgentSource::InProcess(policy),
        }
    }

    /// An entrant whose code could not be loaded. It forfeits its first match.
    pub fn with_error(name: impl Into<String>, msg: impl Into<String>) -> Agent {
        Agent {
            name: name.into(),
            kind: AgentKind::default(),
            args: vec![],
            source: AgentSource::Missing(msg.into()),
        }
    }

    /// Error message of a missing agent.
    pub fn error_message(&self) -> Option<&str> {
        match &self.source {
            AgentSource::Missing(msg) => Some(msg),
            _ => None,
        }
    }
}
