//! Autocomplete handlers for Discord slash command parameters.

use crate::bot::Context;

/// Suggests configured skill groups (plus `Combined`) matching the partial input.
pub async fn autocomplete_skill_group(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    ctx.data()
        .config
        .skill_group_choices()
        .into_iter()
        .filter(|group| group.to_lowercase().contains(&partial_lower))
        .take(25) // Discord autocomplete limit
        .collect()
}
