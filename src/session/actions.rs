//! Keyboard action dispatch.

use super::Session;
use crate::keybindings::Action;
use crate::model::StatusFilter;

/// What the front-end still has to do after [`Session::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The session handled the action.
    Handled,
    /// Nothing to act on (no selection, wrong filter, already pending).
    Ignored,
    FocusSearch,
    /// Open this URL in a browser.
    OpenLink(String),
    /// Scroll the content pane: 1 forward, -1 backward.
    Scroll(i8),
    Quit,
}

impl Session {
    pub fn dispatch(&mut self, action: Action) -> Dispatch {
        tracing::debug!(?action, "Dispatching action");
        match action {
            Action::NextItem => {
                self.navigate_item(1);
                Dispatch::Handled
            }
            Action::PreviousItem => {
                self.navigate_item(-1);
                Dispatch::Handled
            }
            Action::NextFeed => {
                self.navigate_feed(1);
                Dispatch::Handled
            }
            Action::PreviousFeed => {
                self.navigate_feed(-1);
                Dispatch::Handled
            }
            Action::ToggleRead => self.toggle_selected(Self::toggle_item_read),
            Action::ToggleStarred => self.toggle_selected(Self::toggle_item_starred),
            Action::MarkAllRead => {
                if self.filter != StatusFilter::Unread || self.feed_selected.is_none() {
                    return Dispatch::Ignored;
                }
                self.mark_items_read();
                Dispatch::Handled
            }
            Action::ShowUnread => self.show(StatusFilter::Unread),
            Action::ShowStarred => self.show(StatusFilter::Starred),
            Action::ShowAll => self.show(StatusFilter::All),
            Action::OpenLink => match self.selected_link() {
                Some(link) => Dispatch::OpenLink(link),
                None => Dispatch::Ignored,
            },
            Action::FocusSearch => Dispatch::FocusSearch,
            Action::ScrollForward => Dispatch::Scroll(1),
            Action::ScrollBackward => Dispatch::Scroll(-1),
            Action::Quit => Dispatch::Quit,
        }
    }

    fn toggle_selected(&mut self, toggle: fn(&mut Self, i64) -> bool) -> Dispatch {
        let selected = self.item_selected;
        match selected {
            Some(id) if toggle(self, id) => Dispatch::Handled,
            _ => Dispatch::Ignored,
        }
    }

    fn show(&mut self, filter: StatusFilter) -> Dispatch {
        self.set_filter(filter);
        Dispatch::Handled
    }

    fn selected_link(&self) -> Option<String> {
        let id = self.item_selected?;
        let link = match self.item_details.as_ref().filter(|d| d.id == id) {
            Some(details) => &details.link,
            None => &self.store.item(id)?.link,
        };
        (!link.is_empty()).then(|| link.clone())
    }
}
