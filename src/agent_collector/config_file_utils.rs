use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{error, instrument};

use crate::game_interface::AgentKind;

/// Contents of an entrant's YAML descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptor {
    pub kind: AgentKind,
    pub args: Vec<String>,
}

/// Descriptor found in `dir`, or the default one if the folder has none.
pub fn read_descriptor(dir: &Path) -> anyhow::Result<Descriptor> {
    match collect_yaml(dir)? {
        Some(file) => {
            let yaml = std::fs::read_to_string(&file)
                .with_context(|| format!("could not read {}", file.display()))?;
            parse_yaml(&yaml)
        }
        None => Ok(Descriptor::default()),
    }
}

pub fn get_args_from_config(config: &str) -> anyhow::Result<Vec<String>> {
    if config.contains('"') || config.contains('\'') || config.contains('`') {
        bail!("arguments should not contain any quote")
    }
    Ok(config.split_whitespace().map(String::from).collect())
}

/// Parse the supported YAML subset:
///
/// ```yaml
/// # comment
/// kind: random
/// args: "--depth 4"
/// ```
fn parse_yaml(yaml: &str) -> anyhow::Result<Descriptor> {
    let mut descriptor = Descriptor::default();

    for (i, line) in yaml.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .with_context(|| format!("Line {}: Missing ':'", i + 1))?;
        let value = value.trim();
        match key.trim() {
            "kind" => {
                descriptor.kind = value
                    .parse()
                    .with_context(|| format!("Line {}: invalid kind", i + 1))?;
            }
            "args" => {
                let Some(inner) = value
                    .strip_prefix('"')
                    .and_then(|rest| rest.strip_suffix('"'))
                else {
                    bail!("Line {}: Value must be quoted with double quotes", i + 1);
                };
                descriptor.args = get_args_from_config(inner)
                    .with_context(|| format!("Line {}: invalid args", i + 1))?;
            }
            other => bail!("Line {}: Expected 'kind:' or 'args:' key, got '{other}'", i + 1),
        }
    }

    Ok(descriptor)
}

#[instrument]
pub(super) fn check_dir_integrity(dir: &Path) -> anyhow::Result<()> {
    let metadata = match dir.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            error!("Error reading directory: {}", e);
            bail!("error reading directory: {}", e);
        }
    };
    if !metadata.is_dir() {
        error!("Not a directory");
        bail!("not a directory");
    }
    Ok(())
}

pub(super) fn is_yaml(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

fn collect_yaml(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    check_dir_integrity(dir)?;

    let mut result: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir).context("error reading directory")? {
        let Ok(entry) = entry else {
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            bail!("name error: {:?}", entry.file_name());
        };
        if is_yaml(&name) {
            if let Some(first) = &result {
                bail!("two YAML files found: {} and {name}", first.display());
            }
            result = Some(entry.path());
        }
    }
    Ok(result)
}

#[cfg(test)]
mod config_file_tests {
    use super::*;

    #[test]
    fn full_descriptor() {
        let yaml = "# my agent\nkind: random\n\nargs: \"--depth 4  --fast\"\n";
        let descriptor = parse_yaml(yaml).unwrap();
        assert_eq!(descriptor.kind, AgentKind::Random);
        assert_eq!(descriptor.args, vec!["--depth", "4", "--fast"]);
    }

    #[test]
    fn empty_descriptor_is_default() {
        assert_eq!(parse_yaml("# nothing\n").unwrap(), Descriptor::default());
        assert_eq!(parse_yaml("args: \"\"").unwrap().args, Vec::<String>::new());
    }

    #[test]
    fn invalid_descriptors() {
        assert!(parse_yaml("kind: human").is_err());
        assert!(parse_yaml("args: --depth 4").is_err());
        assert!(parse_yaml("args: \"it's\"").is_err());
        assert!(parse_yaml("eval: baseline").is_err());
        assert!(parse_yaml("kind").is_err());
    }
}
