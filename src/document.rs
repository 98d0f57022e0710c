use serde::{Deserialize, Serialize};

const PROJECT_NAME: &str = "React";
const PROJECT_DESCRIPTION: &str = "By codetree";
const PROJECT_ICON: &str = "/icons/reactjs.svg";

/// Editor tab a committed block is written into. Never inferred from content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    #[default]
    Javascript,
    Html,
    Css,
}

impl TabKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "jsx" => Some(TabKind::Javascript),
            "html" => Some(TabKind::Html),
            "css" => Some(TabKind::Css),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TabKind::Javascript => "javascript",
            TabKind::Html => "html",
            TabKind::Css => "css",
        }
    }

    fn empty_tab(self) -> Tab {
        let (title, entry_points) = match self {
            TabKind::Javascript => ("JS/JSX", "index.js"),
            TabKind::Html => ("index.html", "index.html"),
            TabKind::Css => ("main.css", "main.css"),
        };
        Tab {
            title: title.to_string(),
            entry_points: entry_points.to_string(),
            monaco_language: self.as_str().to_string(),
            data: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub title: String,
    pub entry_points: String,
    pub monaco_language: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tabs {
    pub javascript: Tab,
    pub html: Tab,
    pub css: Tab,
}

impl Tabs {
    pub fn get(&self, kind: TabKind) -> &Tab {
        match kind {
            TabKind::Javascript => &self.javascript,
            TabKind::Html => &self.html,
            TabKind::Css => &self.css,
        }
    }

    fn get_mut(&mut self, kind: TabKind) -> &mut Tab {
        match kind {
            TabKind::Javascript => &mut self.javascript,
            TabKind::Html => &mut self.html,
            TabKind::Css => &mut self.css,
        }
    }
}

/// Outbound payload for the editor: which tab, and what goes in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitEvent {
    pub language: String,
    pub entry_file: String,
    pub title: String,
    pub content: String,
}

impl CommitEvent {
    pub fn for_tab(kind: TabKind, content: impl Into<String>) -> Self {
        let tab = kind.empty_tab();
        Self {
            language: tab.monaco_language,
            entry_file: tab.entry_points,
            title: tab.title,
            content: content.into(),
        }
    }
}

/// Editor project value handed to the downstream editor/compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaygroundDocument {
    pub name: String,
    pub description: String,
    pub public: bool,
    pub icon_src: String,
    pub tabs: Tabs,
}

impl Default for PlaygroundDocument {
    fn default() -> Self {
        Self {
            name: PROJECT_NAME.to_string(),
            description: PROJECT_DESCRIPTION.to_string(),
            public: true,
            icon_src: PROJECT_ICON.to_string(),
            tabs: Tabs {
                javascript: TabKind::Javascript.empty_tab(),
                html: TabKind::Html.empty_tab(),
                css: TabKind::Css.empty_tab(),
            },
        }
    }
}

impl PlaygroundDocument {
    /// The fixed template with only `kind`'s tab populated from `event`.
    pub fn populated(kind: TabKind, event: &CommitEvent) -> Self {
        let mut document = Self::default();
        let tab = document.tabs.get_mut(kind);
        tab.title = event.title.clone();
        tab.entry_points = event.entry_file.clone();
        tab.monaco_language = event.language.clone();
        tab.data = event.content.clone();
        document
    }
}

/// A delivered (or about to be delivered) commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    /// 1-based position within the session.
    pub sequence: u64,
    pub generation: u64,
    pub event: CommitEvent,
    pub document: PlaygroundDocument,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_populated_fills_only_the_selected_tab() {
        let event = CommitEvent::for_tab(TabKind::Javascript, "render(<App />);\n");
        let document = PlaygroundDocument::populated(TabKind::Javascript, &event);

        assert_eq!(document.tabs.javascript.data, "render(<App />);\n");
        assert!(document.tabs.html.data.is_empty());
        assert!(document.tabs.css.data.is_empty());
    }

    #[test]
    fn test_commit_event_uses_fixed_tab_metadata() {
        let event = CommitEvent::for_tab(TabKind::Css, "body { margin: 0; }\n");
        assert_eq!(event.language, "css");
        assert_eq!(event.entry_file, "main.css");
        assert_eq!(event.title, "main.css");

        let document = PlaygroundDocument::populated(TabKind::Css, &event);
        assert_eq!(document.tabs.get(TabKind::Css).data, "body { margin: 0; }\n");
        assert!(document.tabs.get(TabKind::Javascript).data.is_empty());
    }

    #[test]
    fn test_document_serializes_in_editor_shape() {
        let event = CommitEvent::for_tab(TabKind::Javascript, "x();\n");
        let value = serde_json::to_value(PlaygroundDocument::populated(TabKind::Javascript, &event))
            .expect("document serializes");

        assert_eq!(value["name"], json!("React"));
        assert_eq!(value["iconSrc"], json!("/icons/reactjs.svg"));
        assert_eq!(
            value["tabs"]["javascript"],
            json!({
                "title": "JS/JSX",
                "entryPoints": "index.js",
                "monacoLanguage": "javascript",
                "data": "x();\n"
            })
        );
        assert_eq!(value["tabs"]["html"]["entryPoints"], json!("index.html"));
    }

    #[test]
    fn test_tab_kind_parse() {
        assert_eq!(TabKind::parse("JSX"), Some(TabKind::Javascript));
        assert_eq!(TabKind::parse(" html "), Some(TabKind::Html));
        assert_eq!(TabKind::parse("python"), None);
    }
}
