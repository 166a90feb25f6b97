//! Which views may be shown, derived from what data the session currently holds.

use shared::domain::{SessionView, ViewLayout};

pub fn is_enabled(
    layout: ViewLayout,
    view: SessionView,
    has_image: bool,
    has_result: bool,
) -> bool {
    match view {
        SessionView::Overview => layout == ViewLayout::Sidebar,
        SessionView::Upload => true,
        SessionView::Results | SessionView::Details => has_result,
        SessionView::Explainability => has_image,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledViews {
    layout: ViewLayout,
    has_image: bool,
    has_result: bool,
}

impl EnabledViews {
    pub fn contains(&self, view: SessionView) -> bool {
        is_enabled(self.layout, view, self.has_image, self.has_result)
    }

    pub fn iter(&self) -> impl Iterator<Item = SessionView> + '_ {
        SessionView::ALL
            .into_iter()
            .filter(move |view| self.contains(*view))
    }

    pub fn to_vec(&self) -> Vec<SessionView> {
        self.iter().collect()
    }
}

pub fn enabled_views(layout: ViewLayout, has_image: bool, has_result: bool) -> EnabledViews {
    EnabledViews {
        layout,
        has_image,
        has_result,
    }
}
