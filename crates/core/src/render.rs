//! Contract every display surface must honor.
//!
//! Renderers consume a prepared [`ViewModel`] and nothing else: no cache
//! queries, no re-sorting, no re-selection. Both surfaces resolve the
//! featured event through [`featured_event`], which is what keeps the web
//! page and the e-paper panel showing the same meeting at the same instant.

use crate::view::{EventView, ViewModel};

/// A display surface fed by the view-model builder.
///
/// Implementations may truncate strings for their geometry (see
/// [`truncate_title`]) but must not alter semantic fields such as start,
/// end, or identity. An empty view model is valid input and renders the
/// "no meetings" surface.
pub trait Renderer {
    type Output;

    /// Renders exactly the events in the view model.
    fn render(&self, view: &ViewModel) -> Self::Output;

    /// Renders a failure surface, optionally with the last known model.
    fn render_error(&self, message: &str, view: Option<&ViewModel>) -> Self::Output;
}

/// The event a renderer must present most prominently.
///
/// The builder guarantees `current_events` is non-empty only when nothing
/// is upcoming, so this resolves to the same event the selection engine
/// featured.
pub fn featured_event(view: &ViewModel) -> Option<&EventView> {
    view.current_events.first().or_else(|| view.next_events.first())
}

/// Truncates a title to at most `max_chars` characters, ending with an
/// ellipsis when anything was cut. Counts characters, not bytes, so
/// multi-byte subjects survive small displays.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let mut truncated: String = title.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
