//! Per-file processing for the build.
//!
//! - **pandoc**: convert documents to HTML
//! - **links**: pull URLs out of link files
//! - **title**: first-heading title fallback
//!
//! The build looks up a [`Handler`] for every content file by extension:
//!
//! ```text
//! md markdown txt docx odt ipynb ──► Convert   (converter + template)
//! html htm                       ──► Copy      (verbatim + template)
//! webloc lnk                     ──► Link      (log URL, no output)
//! anything else                  ──► Skip
//! ```

pub mod links;
pub mod pandoc;
pub mod title;

use rustc_hash::FxHashMap;
use std::path::Path;

pub use pandoc::{Converter, Pandoc};

/// Link file flavours with a URL extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Webloc,
    Shortcut,
}

/// What the build does with a content file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Convert,
    Copy,
    Link(LinkKind),
    Skip,
}

impl Handler {
    /// Whether this handler produces a page.
    pub const fn emits_page(self) -> bool {
        matches!(self, Self::Convert | Self::Copy)
    }
}

/// Extension → handler table. Extensions are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct HandlerTable {
    handlers: FxHashMap<String, Handler>,
}

impl Default for HandlerTable {
    fn default() -> Self {
        let mut table = Self {
            handlers: FxHashMap::default(),
        };
        for ext in ["md", "markdown", "txt", "docx", "odt", "ipynb"] {
            table.register(ext, Handler::Convert);
        }
        for ext in ["html", "htm"] {
            table.register(ext, Handler::Copy);
        }
        table.register("webloc", Handler::Link(LinkKind::Webloc));
        table.register("lnk", Handler::Link(LinkKind::Shortcut));
        table
    }
}

impl HandlerTable {
    /// Add or replace the handler for `ext` (without the dot).
    pub fn register(&mut self, ext: &str, handler: Handler) {
        self.handlers.insert(ext.to_ascii_lowercase(), handler);
    }

    pub fn handler_for(&self, path: &Path) -> Handler {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.handlers.get(&ext.to_ascii_lowercase()))
            .copied()
            .unwrap_or(Handler::Skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handlers() {
        let table = HandlerTable::default();

        assert_eq!(table.handler_for(Path::new("a/b.md")), Handler::Convert);
        assert_eq!(table.handler_for(Path::new("nb.ipynb")), Handler::Convert);
        assert_eq!(table.handler_for(Path::new("page.HTML")), Handler::Copy);
        assert_eq!(
            table.handler_for(Path::new("link.webloc")),
            Handler::Link(LinkKind::Webloc)
        );
        assert_eq!(
            table.handler_for(Path::new("link.lnk")),
            Handler::Link(LinkKind::Shortcut)
        );
    }

    #[test]
    fn test_unknown_is_skip() {
        let table = HandlerTable::default();
        assert_eq!(table.handler_for(Path::new("archive.zip")), Handler::Skip);
        assert_eq!(table.handler_for(Path::new("Makefile")), Handler::Skip);
    }

    #[test]
    fn test_register_overrides() {
        let mut table = HandlerTable::default();
        table.register("RST", Handler::Convert);
        table.register("txt", Handler::Skip);

        assert_eq!(table.handler_for(Path::new("x.rst")), Handler::Convert);
        assert_eq!(table.handler_for(Path::new("x.txt")), Handler::Skip);
    }

    #[test]
    fn test_emits_page() {
        assert!(Handler::Convert.emits_page());
        assert!(Handler::Copy.emits_page());
        assert!(!Handler::Link(LinkKind::Webloc).emits_page());
        assert!(!Handler::Skip.emits_page());
    }
}
