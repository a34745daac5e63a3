/// Prompt commands and autocomplete

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Export,
  Reload,
  ClearFilters,
  Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "export",
    aliases: &["e", "csv"],
    description: "Export filtered rows to CSV",
    action: Action::Export,
  },
  Command {
    name: "reload",
    aliases: &["r", "refresh"],
    description: "Fetch again, bypassing the cache",
    action: Action::Reload,
  },
  Command {
    name: "clear",
    aliases: &["c", "reset"],
    description: "Clear all filters",
    action: Action::ClearFilters,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit tabview",
    action: Action::Quit,
  },
];

/// Resolve typed input to a command by name or alias.
pub fn lookup(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}

/// Suggestions for `input`, best match first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| {
      let rank = if cmd.name == input_lower {
        0
      } else if cmd.aliases.contains(&input_lower.as_str()) {
        1
      } else if cmd.name.starts_with(&input_lower) {
        2
      } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
        3
      } else if cmd.name.contains(&input_lower) {
        4
      } else {
        return None;
      };
      Some((cmd, rank))
    })
    .collect();

  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
