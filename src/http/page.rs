//! Welcome page rendering.

use std::path::PathBuf;

/// Placeholder replaced by the visit count.
pub const COUNT_PLACEHOLDER: &str = "@@COUNT@@";

/// HTML template read from disk on every render, so edits show up
/// without a restart.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    path: PathBuf,
}

impl PageTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Render with the given count, or `None` if the template is unreadable.
    pub async fn render(&self, count: i32) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Some(fill(&content, count)),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to read page template");
                None
            }
        }
    }
}

/// Replace the first placeholder only.
fn fill(template: &str, count: i32) -> String {
    template.replacen(COUNT_PLACEHOLDER, &count.to_string(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_first_placeholder() {
        assert_eq!(fill("<p>@@COUNT@@</p>", 7), "<p>7</p>");
        assert_eq!(fill("@@COUNT@@ @@COUNT@@", 3), "3 @@COUNT@@");
        assert_eq!(fill("no placeholder", 3), "no placeholder");
    }

    #[tokio::test]
    async fn test_render_missing_file() {
        let page = PageTemplate::new("does/not/exist.tmpl");
        assert!(page.render(1).await.is_none());
    }

    #[tokio::test]
    async fn test_render_from_disk() {
        let path = std::env::temp_dir().join(format!("welcome-page-{}.tmpl", std::process::id()));
        tokio::fs::write(&path, "Visits: @@COUNT@@").await.unwrap();

        let page = PageTemplate::new(&path);
        assert_eq!(page.render(42).await.as_deref(), Some("Visits: 42"));

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
