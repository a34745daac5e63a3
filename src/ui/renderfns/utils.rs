use ratatui::prelude::{Alignment, Color};
use tabview::{SemanticType, SortDirection};

/// Truncate to `max_chars` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
  if s.chars().count() <= max_chars {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn sort_indicator(direction: Option<SortDirection>) -> &'static str {
  match direction {
    Some(SortDirection::Ascending) => " ▲",
    Some(SortDirection::Descending) => " ▼",
    None => "",
  }
}

/// Numbers line up on the right; everything else on the left.
pub fn cell_alignment(semantic_type: SemanticType) -> Alignment {
  match semantic_type {
    SemanticType::Number => Alignment::Right,
    _ => Alignment::Left,
  }
}

pub fn type_color(semantic_type: SemanticType) -> Color {
  match semantic_type {
    SemanticType::Number => Color::Cyan,
    SemanticType::Date => Color::Magenta,
    SemanticType::Boolean => Color::Yellow,
    SemanticType::String => Color::White,
  }
}
