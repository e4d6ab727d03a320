//! Builds the picker list from the recency list and the catalog, and turns the
//! picker's answer back into a command name.

use crate::catalog::Catalog;
use crate::host::{PickItem, Picker};

pub const RECENT_GROUP: &str = "recent";
pub const PICKER_PLACEHOLDER: &str = "Select a Django management command";

fn separator(title: &str) -> PickItem {
    PickItem::Separator {
        label: format!("── {} ──", title.to_uppercase()),
    }
}

/// Flat picker list: optionally the recent section (most-recent-first), then
/// one section per catalog group in catalog order.
pub fn build_items(catalog: &Catalog, recents: &[String], show_recent: bool) -> Vec<PickItem> {
    let mut items = Vec::with_capacity(catalog.command_count() + catalog.group_count() + recents.len() + 1);

    if show_recent {
        items.push(separator(RECENT_GROUP));
        items.extend(recents.iter().map(|name| PickItem::Command {
            label: name.clone(),
            group: RECENT_GROUP.to_string(),
        }));
    }

    for (group, commands) in catalog.groups() {
        items.push(separator(group));
        items.extend(commands.iter().map(|name| PickItem::Command {
            label: name.clone(),
            group: group.to_string(),
        }));
    }

    items
}

/// Ask `picker` for a command. `Ok(None)` covers both cancellation and a
/// separator coming back from the picker.
pub fn present(
    picker: &mut dyn Picker,
    catalog: &Catalog,
    recents: &[String],
    show_recent: bool,
) -> Result<Option<String>, String> {
    let items = build_items(catalog, recents, show_recent);
    let choice = picker.pick(&items, PICKER_PLACEHOLDER)?;

    Ok(match choice.and_then(|index| items.get(index)) {
        Some(PickItem::Command { label, .. }) => Some(label.clone()),
        Some(PickItem::Separator { .. }) | None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse;

    /// Picks the first item whose label matches, or cancels.
    struct ScriptedPicker {
        choose: Option<String>,
        seen: Vec<PickItem>,
    }

    impl Picker for ScriptedPicker {
        fn pick(&mut self, items: &[PickItem], placeholder: &str) -> Result<Option<usize>, String> {
            assert_eq!(placeholder, PICKER_PLACEHOLDER);
            self.seen = items.to_vec();
            Ok(self
                .choose
                .as_deref()
                .and_then(|label| items.iter().position(|item| item.label() == label)))
        }
    }

    fn picker(choose: Option<&str>) -> ScriptedPicker {
        ScriptedPicker { choose: choose.map(str::to_string), seen: Vec::new() }
    }

    fn command(label: &str, group: &str) -> PickItem {
        PickItem::Command { label: label.to_string(), group: group.to_string() }
    }

    fn sep(label: &str) -> PickItem {
        PickItem::Separator { label: label.to_string() }
    }

    #[test]
    fn recent_and_group_sections_both_list_the_command() {
        let catalog = parse("[A]\nx\ny\n");
        let items = build_items(&catalog, &["x".to_string()], true);
        assert_eq!(
            items,
            vec![
                sep("── RECENT ──"),
                command("x", "recent"),
                sep("── A ──"),
                command("x", "A"),
                command("y", "A"),
            ]
        );
    }

    #[test]
    fn recent_section_can_be_hidden() {
        let catalog = parse("[auth]\nchangepassword\n");
        let items = build_items(&catalog, &["migrate".to_string()], false);
        assert_eq!(items, vec![sep("── AUTH ──"), command("changepassword", "auth")]);
    }

    #[test]
    fn recent_section_shown_even_when_empty() {
        let items = build_items(&Catalog::new(), &[], true);
        assert_eq!(items, vec![sep("── RECENT ──")]);
    }

    #[test]
    fn choosing_a_command_returns_its_name() {
        let catalog = parse("[A]\nx\ny\n");
        let mut p = picker(Some("x"));
        let chosen = present(&mut p, &catalog, &["x".to_string()], true).unwrap();
        assert_eq!(chosen.as_deref(), Some("x"));
    }

    #[test]
    fn choosing_a_separator_is_no_selection() {
        let catalog = parse("[A]\nx\n");
        let mut p = picker(Some("── A ──"));
        assert_eq!(present(&mut p, &catalog, &[], true).unwrap(), None);
    }

    #[test]
    fn cancelling_is_no_selection() {
        let catalog = parse("[A]\nx\n");
        let mut p = picker(None);
        assert_eq!(present(&mut p, &catalog, &[], true).unwrap(), None);
        assert_eq!(p.seen.len(), 3);
    }

    #[test]
    fn out_of_range_index_is_no_selection() {
        struct Bogus;
        impl Picker for Bogus {
            fn pick(&mut self, _: &[PickItem], _: &str) -> Result<Option<usize>, String> {
                Ok(Some(99))
            }
        }
        let catalog = parse("[A]\nx\n");
        assert_eq!(present(&mut Bogus, &catalog, &[], false).unwrap(), None);
    }

    #[test]
    fn picker_errors_propagate() {
        struct Broken;
        impl Picker for Broken {
            fn pick(&mut self, _: &[PickItem], _: &str) -> Result<Option<usize>, String> {
                Err("no tty".to_string())
            }
        }
        assert_eq!(
            present(&mut Broken, &Catalog::new(), &[], true).unwrap_err(),
            "no tty"
        );
    }
}
