//! Management-command catalog parsed from `manage.py help` output.
//!
//! The help text lists commands under bracketed app labels:
//!
//! ```text
//! Type 'manage.py help <subcommand>' for help on a specific subcommand.
//!
//! Available subcommands:
//!
//! [auth]
//!     changepassword
//!     createsuperuser
//!
//! [django]
//!     check
//! ```
//!
//! The format is not a stable contract, so parsing never fails: anything it
//! does not recognise is skipped and the worst case is an empty catalog.

use serde::{Deserialize, Serialize};

/// Group name → ordered command names, in the order groups first appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    groups: Vec<(String, Vec<String>)>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a group. An existing group of the same name is emptied but keeps
    /// its position.
    pub fn open_group(&mut self, name: &str) {
        match self.groups.iter_mut().find(|(group, _)| group == name) {
            Some((_, commands)) => commands.clear(),
            None => self.groups.push((name.to_string(), Vec::new())),
        }
    }

    fn push_command(&mut self, group: &str, command: &str) {
        if let Some((_, commands)) = self.groups.iter_mut().find(|(g, _)| g == group) {
            commands.push(command.to_string());
        }
    }

    pub fn get(&self, group: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, commands)| commands.as_slice())
    }

    /// Groups in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|(name, commands)| (name.as_str(), commands.as_slice()))
    }

    /// Whether any group lists `command`.
    pub fn contains_command(&self, command: &str) -> bool {
        self.groups
            .iter()
            .any(|(_, commands)| commands.iter().any(|c| c == command))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn command_count(&self) -> usize {
        self.groups.iter().map(|(_, commands)| commands.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Parse raw help output into a [`Catalog`].
pub fn parse(raw: &str) -> Catalog {
    let mut catalog = Catalog::new();
    let Some(start) = raw.find('[') else {
        return catalog;
    };

    let mut current: Option<String> = None;
    for line in raw[start..].lines() {
        let line = line.trim();
        if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
            let name = &line[1..line.len() - 1];
            catalog.open_group(name);
            // An unnamed group is listed but collects nothing.
            current = (!name.is_empty()).then(|| name.to_string());
        } else if !line.is_empty()
            && let Some(group) = current.as_deref()
        {
            catalog.push_command(group, line);
        }
    }

    tracing::debug!(
        groups = catalog.group_count(),
        commands = catalog.command_count(),
        "parsed command catalog"
    );
    catalog
}
