//! Meta-tag and OpenGraph lookups

use scraper::{Html, Selector};

/// All `<meta>` tags of a document plus its `<title>`, parsed once.
#[derive(Debug, Default)]
pub struct MetaTags {
    /// (lowercased name/property/itemprop, content) in document order
    entries: Vec<(String, String)>,
    title: Option<String>,
}

impl MetaTags {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut tags = Self::default();

        if let Ok(selector) = Selector::parse("meta[content]") {
            for element in document.select(&selector) {
                let attrs = element.value();
                let Some(content) = attrs.attr("content") else {
                    continue;
                };
                for key in ["name", "property", "itemprop"] {
                    if let Some(name) = attrs.attr(key) {
                        tags.entries
                            .push((name.trim().to_ascii_lowercase(), content.trim().to_string()));
                    }
                }
            }
        }

        if let Ok(selector) = Selector::parse("title") {
            tags.title = document
                .select(&selector)
                .next()
                .map(|t| t.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty());
        }

        tags
    }

    /// First non-empty `content` of a meta tag named `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(key, content)| *key == name && !content.is_empty())
            .map(|(_, content)| content.as_str())
    }

    /// `<meta name=...>` with the `og:` variant as fallback
    pub fn get_or_og(&self, name: &str) -> Option<&str> {
        self.get(name).or_else(|| self.get(&format!("og:{}", name)))
    }

    /// Page title: `title` meta, `og:title`, then `<title>`
    pub fn title(&self) -> Option<&str> {
        self.get_or_og("title").or(self.title.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        self.get_or_og("description")
    }
}

/// Protocol-relative URLs (`//host/x`) become `https://host/x`
pub fn absolutize_protocol(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>  页面标题 - 央视网  </title>
        <meta name="description" content="2月4日，蒙特泽莫罗透露了关于“车王”舒马赫恢复情况">
        <meta property="og:title" content="OG Title">
        <meta property="og:image" content="//p1.img.cctvpic.com/a.jpg">
        <meta name="keywords" content="">
    </head><body></body></html>"#;

    #[test]
    fn test_named_meta() {
        let tags = MetaTags::parse(PAGE);
        assert_eq!(
            tags.description(),
            Some("2月4日，蒙特泽莫罗透露了关于“车王”舒马赫恢复情况")
        );
        assert_eq!(tags.get("keywords"), None);
    }

    #[test]
    fn test_title_prefers_og_over_document_title() {
        let tags = MetaTags::parse(PAGE);
        assert_eq!(tags.title(), Some("OG Title"));
    }

    #[test]
    fn test_title_falls_back_to_title_element() {
        let tags = MetaTags::parse("<html><head><title>Only Title</title></head></html>");
        assert_eq!(tags.title(), Some("Only Title"));
    }

    #[test]
    fn test_entities_decoded() {
        let tags = MetaTags::parse(r#"<meta name="title" content="A &amp; B">"#);
        assert_eq!(tags.get("title"), Some("A & B"));
    }

    #[test]
    fn test_absolutize_protocol() {
        assert_eq!(
            absolutize_protocol("//p1.img.cctvpic.com/a.jpg"),
            "https://p1.img.cctvpic.com/a.jpg"
        );
        assert_eq!(absolutize_protocol("http://x/a.jpg"), "http://x/a.jpg");
    }
}
