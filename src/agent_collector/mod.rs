use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use tracing::{error, info, instrument, warn};

use crate::{
    agent::Agent,
    agent_collector::config_file_utils::{check_dir_integrity, is_yaml, read_descriptor},
    configuration::Configuration,
};

mod agent_compiler;

mod config_file_utils;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// One entrant per sub-directory of `directory`, sorted by folder name.
///
/// Folders that cannot be collected are left out. When compiling, a crate that fails to build
/// is kept as a missing agent so that it forfeits its first match.
#[instrument(skip(config))]
pub fn collect_agents(directory: &Path, config: &Configuration) -> anyhow::Result<Vec<Arc<Agent>>> {
    let verbose = config.verbose;
    let compile = config.compile_agents;

    if !directory.is_dir() {
        bail!("'{}' is not a valid directory", directory.display());
    }

    let mut subdirs = std::fs::read_dir(directory)
        .with_context(|| format!("could not read '{}'", directory.display()))?
        .filter_map(|item| item.ok().map(|item| item.path()))
        .collect::<Vec<_>>();
    subdirs.sort();
    info!(agent_directories = ?subdirs);

    let longest_name = subdirs
        .iter()
        .filter_map(|path| path.file_name())
        .fold(0, |acu, name| acu.max(name.len()))
        + 3; // at least 3 dots

    if verbose {
        if compile {
            println!("Compiling agents...");
        } else {
            println!("Collecting agents...");
        }
    }

    let mut agents: Vec<Arc<Agent>> = Vec::new();
    for subdir in subdirs {
        let Some(name) = subdir.file_name().and_then(|name| name.to_str()).map(String::from) else {
            warn!("Skipping non UTF-8 entry {subdir:?}");
            continue;
        };

        if verbose {
            let action = if compile { "Compiling" } else { "Collecting" };
            print!("{action} {name:·<longest_name$} ");
            let _ = std::io::stdout().flush(); // try to flush stdout
        }

        if !subdir.is_dir() {
            warn!("Not a directory: '{name}'");
            if verbose {
                println!("{RED}Not a directory{RESET}");
            }
            continue;
        }

        let descriptor = match read_descriptor(&subdir) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!("Invalid descriptor for '{name}': {e:#}");
                if verbose {
                    println!("{RED}Invalid descriptor: {e:#}{RESET}");
                }
                continue;
            }
        };

        let executable = if compile {
            agent_compiler::compile_single_agent(&subdir)
        } else {
            collect_binary(&subdir)
        };

        let agent = match executable {
            Ok(path) => {
                if verbose {
                    println!("{GREEN}Ok{RESET}");
                }
                Agent::executable(name, path, descriptor.kind, descriptor.args)
            }
            Err(e) if compile => {
                // already logged by the compiler
                if verbose {
                    println!("{YELLOW}{e}{RESET}");
                }
                Agent::with_error(name, e.to_string())
            }
            Err(e) => {
                error!("agent collection failed for '{name}': {e:#}");
                if verbose {
                    println!("{RED}{e}{RESET}");
                }
                continue;
            }
        };
        agents.push(Arc::new(agent));
    }

    Ok(agents)
}

/// The single executable of a pre-built submission folder.
#[instrument]
fn collect_binary(dir: &Path) -> anyhow::Result<PathBuf> {
    check_dir_integrity(dir)?;

    let mut binary: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir).context("error reading directory")? {
        let Ok(entry) = entry else {
            bail!("one entry cannot be read in directory");
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            bail!("{:?} is not a file", entry.file_name());
        }
        let Ok(name) = entry.file_name().into_string() else {
            bail!("name error: {:?}", entry.file_name());
        };
        if is_yaml(&name) {
            continue;
        }
        if let Some(first) = &binary {
            bail!("two candidate binaries: {} and {name}", first.display());
        }
        binary = Some(entry.path());
    }
    binary.context("binary not found")
}

#[cfg(test)]
mod collector_tests {
    use super::*;
    use crate::agent::AgentSource;
    use crate::game_interface::AgentKind;
    use std::fs;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ai_knockout_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn prebuilt_submissions() {
        let root = scratch_dir("collect");
        // "b" has a binary and a descriptor
        fs::create_dir(root.join("b")).unwrap();
        fs::write(root.join("b").join("agent"), "").unwrap();
        fs::write(root.join("b").join("agent.yaml"), "kind: random\nargs: \"-x\"").unwrap();
        // "a" only has a binary
        fs::create_dir(root.join("a")).unwrap();
        fs::write(root.join("a").join("run"), "").unwrap();
        // "c" has two candidate binaries
        fs::create_dir(root.join("c")).unwrap();
        fs::write(root.join("c").join("one"), "").unwrap();
        fs::write(root.join("c").join("two"), "").unwrap();
        // "d" is empty
        fs::create_dir(root.join("d")).unwrap();
        // a stray file
        fs::write(root.join("notes.txt"), "").unwrap();

        let config = Configuration::new()
            .with_verbose(false)
            .with_compile_agents(false);
        let agents = collect_agents(&root, &config).unwrap();

        let names = agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(agents[0].kind, AgentKind::Ai);
        assert_eq!(agents[1].kind, AgentKind::Random);
        assert_eq!(agents[1].args, vec!["-x"]);
        assert!(matches!(&agents[1].source, AgentSource::Executable(p) if p.ends_with("agent")));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn missing_directory_is_an_error() {
        let config = Configuration::new().with_verbose(false);
        assert!(collect_agents(Path::new("/this/does/not/exist"), &config).is_err());
    }
}
