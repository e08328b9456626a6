//! The rendered conversation.
//!
//! `MessageList` is the view model every front end draws from: an ordered list
//! of bubbles plus transient typing placeholders. Nothing outside it keeps
//! history.

use crate::format::{escape_attr, escape_text, format_text};
use crate::state::{Role, SourceCitation};

/// Identifies one typing placeholder. Never reused within a `MessageList`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypingId(u64);

/// Collapsible citation list attached to a bot answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePanel {
    cards: Vec<SourceCitation>,
    expanded: bool,
}

impl SourcePanel {
    fn new(cards: Vec<SourceCitation>) -> Self {
        Self {
            cards,
            expanded: false,
        }
    }

    pub fn cards(&self) -> &[SourceCitation] {
        &self.cards
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }

    pub fn toggle_label(&self) -> String {
        if self.expanded {
            "📄 Hide sources ▴".to_string()
        } else {
            let n = self.cards.len();
            let plural = if n > 1 { "s" } else { "" };
            format!("📄 View {} source{} ▾", n, plural)
        }
    }

    fn to_html(&self) -> String {
        let hidden = if self.expanded { "" } else { " hidden" };
        let mut html = format!(
            r#"<button class="sources-toggle">{}</button><div class="sources-list{}">"#,
            escape_text(&self.toggle_label()),
            hidden
        );
        for card in &self.cards {
            html.push_str(&card_html(card));
        }
        html.push_str("</div>");
        html
    }
}

/// Web link for a citation, if it has one worth rendering as a link.
pub fn safe_link(source: &SourceCitation) -> Option<&str> {
    source.link().filter(|url| {
        let lower = url.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    })
}

fn card_html(source: &SourceCitation) -> String {
    let link = safe_link(source)
        .map(|url| {
            format!(
                r#" · <a href="{}" target="_blank" rel="noopener noreferrer">link</a>"#,
                escape_attr(url)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<div class="source-card"><div class="src-name">{}</div><div class="src-type">{}{}</div><div class="src-snippet">{}…</div></div>"#,
        escape_text(&source.name),
        escape_text(&source.kind),
        link,
        escape_text(&source.snippet)
    )
}

/// One rendered chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    role: Role,
    text: String,
    markup: String,
    sources: Option<SourcePanel>,
}

impl Bubble {
    fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
            markup: format_text(text),
            sources: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Raw text as received, markers included
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `format_text` output, computed once at append time
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn sources(&self) -> Option<&SourcePanel> {
        self.sources.as_ref()
    }

    fn to_html(&self) -> String {
        let sources = self
            .sources
            .as_ref()
            .map(SourcePanel::to_html)
            .unwrap_or_default();
        format!(
            r#"<div class="message {}"><div class="avatar">{}</div><div class="bubble"><p>{}</p>{}</div></div>"#,
            self.role.as_str(),
            self.role.avatar(),
            self.markup,
            sources
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Bubble(Bubble),
    Typing(TypingId),
}

#[derive(Debug, Clone, Default)]
pub struct MessageList {
    entries: Vec<Entry>,
    next_typing: u64,
    follow_latest: bool,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: &str) -> Self {
        let mut list = Self::new();
        list.append_message(Role::Bot, greeting);
        list
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Bubble(b) => Some(b),
            Entry::Typing(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn typing_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Typing(_)))
            .count()
    }

    /// Append a bubble and return its entry index.
    pub fn append_message(&mut self, role: Role, text: &str) -> usize {
        self.push(Entry::Bubble(Bubble::new(role, text)))
    }

    /// Append a bot answer, with a collapsed source panel when there are sources.
    pub fn append_bot_response(&mut self, answer: &str, sources: Vec<SourceCitation>) -> usize {
        let mut bubble = Bubble::new(Role::Bot, answer);
        if !sources.is_empty() {
            bubble.sources = Some(SourcePanel::new(sources));
        }
        self.push(Entry::Bubble(bubble))
    }

    pub fn show_typing(&mut self) -> TypingId {
        let id = TypingId(self.next_typing);
        self.next_typing += 1;
        self.push(Entry::Typing(id));
        id
    }

    /// Remove a typing placeholder. Returns false if it was already gone.
    pub fn remove_typing(&mut self, id: TypingId) -> bool {
        match self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Typing(t) if *t == id))
        {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Flip the source panel of the entry at `idx`. Returns false if it has none.
    pub fn toggle_sources(&mut self, idx: usize) -> bool {
        match self.entries.get_mut(idx) {
            Some(Entry::Bubble(Bubble {
                sources: Some(panel),
                ..
            })) => {
                panel.toggle();
                true
            }
            _ => false,
        }
    }

    /// Drop everything and start over from a single greeting bubble.
    pub fn replace_with_greeting(&mut self, greeting: &str) {
        self.entries.clear();
        self.append_message(Role::Bot, greeting);
    }

    /// Whether the viewer should be showing the newest entry
    pub fn follows_latest(&self) -> bool {
        self.follow_latest
    }

    pub fn set_follow_latest(&mut self, follow: bool) {
        self.follow_latest = follow;
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from(r#"<div id="messages">"#);
        for entry in &self.entries {
            match entry {
                Entry::Bubble(b) => html.push_str(&b.to_html()),
                Entry::Typing(id) => html.push_str(&format!(
                    r#"<div class="message bot" id="typing-{}"><div class="avatar">🤖</div><div class="bubble typing-bubble"><span></span><span></span><span></span></div></div>"#,
                    id.0
                )),
            }
        }
        html.push_str("</div>");
        html
    }

    fn push(&mut self, entry: Entry) -> usize {
        self.entries.push(entry);
        self.follow_latest = true;
        self.entries.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, url: Option<&str>) -> SourceCitation {
        SourceCitation {
            name: name.to_string(),
            kind: "technique".to_string(),
            url: url.map(str::to_string),
            snippet: "Adversaries may".to_string(),
        }
    }

    #[test]
    fn test_append_message_formats_once() {
        let mut list = MessageList::new();
        list.append_message(Role::User, "a < b");
        let bubble = list.bubbles().next().unwrap();
        assert_eq!(bubble.text(), "a < b");
        assert_eq!(bubble.markup(), "a &lt; b");
        assert!(list.follows_latest());
    }

    #[test]
    fn test_bot_response_without_sources_has_no_toggle() {
        let mut list = MessageList::new();
        list.append_bot_response("nothing cited", Vec::new());
        assert!(list.bubbles().next().unwrap().sources().is_none());
        assert!(!list.to_html().contains("sources-toggle"));
    }

    #[test]
    fn test_source_toggle_cycle() {
        let mut list = MessageList::new();
        let idx = list.append_bot_response(
            "answer",
            vec![source("T1059", None), source("T1003", None), source("G0016", None)],
        );

        let label = |list: &MessageList| {
            list.bubbles()
                .next()
                .and_then(|b| b.sources())
                .map(|p| (p.toggle_label(), p.is_expanded(), p.cards().len()))
                .unwrap()
        };

        assert_eq!(label(&list), ("📄 View 3 sources ▾".to_string(), false, 3));
        assert!(list.toggle_sources(idx));
        assert_eq!(label(&list), ("📄 Hide sources ▴".to_string(), true, 3));
        assert!(list.toggle_sources(idx));
        assert_eq!(label(&list), ("📄 View 3 sources ▾".to_string(), false, 3));
    }

    #[test]
    fn test_single_source_label_is_singular() {
        let mut list = MessageList::new();
        list.append_bot_response("answer", vec![source("T1059", None)]);
        let panel = list.bubbles().next().unwrap().sources().unwrap();
        assert_eq!(panel.toggle_label(), "📄 View 1 source ▾");
    }

    #[test]
    fn test_toggle_on_plain_bubble_is_rejected() {
        let mut list = MessageList::new();
        let idx = list.append_message(Role::Bot, "hello");
        assert!(!list.toggle_sources(idx));
        assert!(!list.toggle_sources(99));
    }

    #[test]
    fn test_typing_ids_are_unique_and_removal_is_idempotent() {
        let mut list = MessageList::new();
        let a = list.show_typing();
        let b = list.show_typing();
        assert_ne!(a, b);
        assert_eq!(list.typing_count(), 2);

        assert!(list.remove_typing(a));
        assert!(!list.remove_typing(a));
        assert_eq!(list.typing_count(), 1);
    }

    #[test]
    fn test_typing_ids_survive_reset() {
        let mut list = MessageList::new();
        let before = list.show_typing();
        list.replace_with_greeting("hi");
        let after = list.show_typing();
        assert_ne!(before, after);
        assert!(!list.remove_typing(before));
    }

    #[test]
    fn test_replace_with_greeting_leaves_one_bubble() {
        let mut list = MessageList::with_greeting("welcome");
        list.append_message(Role::User, "q");
        list.show_typing();
        list.replace_with_greeting("Chat reset!");

        assert_eq!(list.len(), 1);
        let bubble = list.bubbles().next().unwrap();
        assert_eq!(bubble.role(), Role::Bot);
        assert_eq!(bubble.text(), "Chat reset!");
    }

    #[test]
    fn test_citation_fields_are_escaped() {
        let mut list = MessageList::new();
        list.append_bot_response(
            "see sources",
            vec![SourceCitation {
                name: "<img src=x onerror=alert(1)>".to_string(),
                kind: "<b>group</b>".to_string(),
                url: Some(r#"https://example.com/" onmouseover="x"#.to_string()),
                snippet: "a & b".to_string(),
            }],
        );
        let html = list.to_html();
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("&lt;b&gt;group&lt;/b&gt;"));
        assert!(html.contains("&quot; onmouseover=&quot;x"));
        assert!(html.contains("a &amp; b…"));
    }

    #[test]
    fn test_non_http_urls_are_not_linked() {
        let js = source("evil", Some("javascript:alert(1)"));
        let web = source("ok", Some("https://attack.mitre.org/"));
        assert_eq!(safe_link(&js), None);
        assert_eq!(safe_link(&web), Some("https://attack.mitre.org/"));

        let mut list = MessageList::new();
        list.append_bot_response("x", vec![js]);
        assert!(!list.to_html().contains("javascript:"));
    }

    #[test]
    fn test_html_marks_hidden_list() {
        let mut list = MessageList::new();
        let idx = list.append_bot_response("x", vec![source("T1059", None)]);
        assert!(list.to_html().contains(r#"class="sources-list hidden""#));
        list.toggle_sources(idx);
        assert!(list.to_html().contains(r#"class="sources-list""#));
    }
}
