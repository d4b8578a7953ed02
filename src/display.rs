//! Plain-text rendering of session state for the command line.
//!
//! Titles come from remote feeds, so every string is stripped of control
//! characters before it reaches the terminal.

use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::model::{Feed, Item, ItemStatus, Selection};
use crate::session::Session;

const ELLIPSIS: char = '…';

/// Drop control characters (and the escape sequences they introduce)
/// so untrusted titles cannot drive the terminal.
pub fn sanitize(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_control()) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: ESC [ params final-byte
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            continue;
        }
        if c.is_control() {
            if c == '\t' || c == '\n' {
                out.push(' ');
            }
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Cut `s` to at most `width` terminal columns, marking the cut with `…`.
pub fn fit(s: &str, width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= width {
        return Cow::Borrowed(s);
    }
    if width == 0 {
        return Cow::Borrowed("");
    }
    let budget = width - 1;
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push(ELLIPSIS);
    Cow::Owned(out)
}

fn counter(count: Option<i64>) -> String {
    match count {
        Some(n) if n > 0 => format!(" ({})", n),
        _ => String::new(),
    }
}

fn status_marker(status: ItemStatus) -> char {
    match status {
        ItemStatus::Unread => '●',
        ItemStatus::Starred => '★',
        ItemStatus::Read => ' ',
    }
}

/// Folder and feed tree, one line per row, counters under the active
/// filter. The selected row is prefixed with `>`.
pub fn tree_lines(session: &Session, width: usize) -> Vec<String> {
    let selected = session.feed_selected();
    let filtered = session.filtered_stats();
    let mark = |key: Selection| if selected == Some(key) { '>' } else { ' ' };

    let mut lines = vec![format!(
        "{} All feeds{}",
        mark(Selection::AllFeeds),
        counter(filtered.map(|f| f.total))
    )];

    let feed_line = |feed: &Feed, indent: &str| {
        let error = if session.feed_errors().contains_key(&feed.id) {
            " !"
        } else {
            ""
        };
        let text = format!(
            "{} {}{}{}{}",
            mark(Selection::Feed(feed.id)),
            indent,
            sanitize(&feed.title),
            counter(filtered.and_then(|f| f.feed(feed.id))),
            error
        );
        fit(&text, width).into_owned()
    };

    for group in session.store().folders_with_feeds() {
        match group.folder {
            Some(folder) => {
                let arrow = if folder.is_expanded { '▾' } else { '▸' };
                let text = format!(
                    "{} {} {}{}",
                    mark(Selection::Folder(folder.id)),
                    arrow,
                    sanitize(&folder.title),
                    counter(filtered.and_then(|f| f.folder(Some(folder.id))))
                );
                lines.push(fit(&text, width).into_owned());
                if folder.is_expanded {
                    lines.extend(group.feeds.iter().map(|f| feed_line(f, "    ")));
                }
            }
            None => lines.extend(group.feeds.iter().map(|f| feed_line(f, ""))),
        }
    }
    lines
}

/// One item row: status marker, date, title and feed.
pub fn item_line(item: &Item, feed: Option<&Feed>, selected: bool, width: usize) -> String {
    let date = item
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    let feed_title = feed.map(|f| sanitize(&f.title)).unwrap_or_default();
    let text = format!(
        "{}{} {} {} · {}",
        if selected { '>' } else { ' ' },
        status_marker(item.status),
        date,
        sanitize(&item.title),
        feed_title
    );
    fit(&text, width).into_owned()
}

/// Current selection, filter and loading state on one line.
pub fn status_line(session: &Session, width: usize) -> String {
    let place = match session.feed_selected() {
        None => "nothing selected".to_string(),
        Some(Selection::AllFeeds) => "all feeds".to_string(),
        Some(Selection::Folder(id)) => session
            .store()
            .folder(id)
            .map_or_else(|| format!("folder {}", id), |f| sanitize(&f.title).into_owned()),
        Some(Selection::Feed(id)) => session
            .store()
            .feed(id)
            .map_or_else(|| format!("feed {}", id), |f| sanitize(&f.title).into_owned()),
    };
    let item = session
        .item_selected()
        .and_then(|id| session.store().item(id))
        .map(|i| format!(" | {}", sanitize(&i.title)))
        .unwrap_or_default();
    let filter = session.filter().status().map_or("all", ItemStatus::as_str);
    let mut text = format!(
        "{} [{}] {} items{}",
        place,
        filter,
        session.items().len(),
        if session.has_more_items() { "+" } else { "" }
    );
    if session.is_refreshing() {
        text.push_str(" (refreshing)");
    }
    text.push_str(&item);
    fit(&text, width).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{feed, item};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fit_keeps_short_text_borrowed() {
        assert!(matches!(fit("short", 10), Cow::Borrowed("short")));
        assert_eq!(fit("exact", 5), "exact");
    }

    #[test]
    fn test_fit_truncates_by_columns() {
        assert_eq!(fit("Hello World", 8), "Hello W…");
        // CJK is two columns per character
        assert_eq!(fit("你好世界", 5), "你好…");
        assert_eq!(fit("abc", 0), "");
    }

    #[test]
    fn test_sanitize_strips_escapes_and_controls() {
        assert!(matches!(sanitize("plain"), Cow::Borrowed("plain")));
        assert_eq!(sanitize("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(sanitize("a\tb\x07c"), "a bc");
    }

    #[test]
    fn test_item_line() {
        let mut it = item(1, 10, ItemStatus::Unread);
        it.title = "Breaking\x1b[2J news".to_string();
        let f = feed(10, None);
        assert_eq!(item_line(&it, Some(&f), true, 80), ">● ---------- Breaking news · Feed 10");
        assert_eq!(item_line(&it, Some(&f), false, 12), " ● --------…");
    }
}
