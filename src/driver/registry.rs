//! Driver registry (`dbmscap`): maps driver names to startup commands.
//!
//! One entry per line, `name:startup command:comment`. Blank lines and
//! lines starting with `#` are skipped; the comment is ignored.

use crate::error::{DbmiError, DbmiResult};
use std::path::Path;

/// One registered driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub comment: String,
}

impl RegistryEntry {
    /// Startup command as written in the registry.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parsed registry, read once and never modified.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn parse(text: &str) -> DbmiResult<Self> {
        let mut entries: Vec<RegistryEntry> = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |message: &str| DbmiError::Registry {
                line: i + 1,
                message: message.to_string(),
            };

            let mut fields = line.splitn(3, ':');
            let name = fields.next().unwrap_or("").trim();
            let startup = fields.next().ok_or_else(|| err("missing startup command"))?;
            let comment = fields.next().unwrap_or("").trim();
            if name.is_empty() {
                return Err(err("empty driver name"));
            }
            let mut words = startup.split_whitespace().map(str::to_string);
            let program = words.next().ok_or_else(|| err("empty startup command"))?;
            if entries.iter().any(|e| e.name == name) {
                return Err(err(&format!("driver '{}' registered twice", name)));
            }
            entries.push(RegistryEntry {
                name: name.to_string(),
                program,
                args: words.collect(),
                comment: comment.to_string(),
            });
        }
        Ok(Self { entries })
    }

    pub fn load(path: impl AsRef<Path>) -> DbmiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbmiError::Config(format!("cannot read registry {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn lookup(&self, name: &str) -> DbmiResult<&RegistryEntry> {
        self.get(name)
            .ok_or_else(|| DbmiError::DriverNotFound(name.to_string()))
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
