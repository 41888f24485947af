//! Terminal stand-in for the browser page.

use tracing::debug;
use tripshare_core::{Page, Shell};

/// Tracks the "current page" a command runs on and prints notices to stderr.
#[derive(Debug)]
pub struct TerminalShell {
    page: Page,
}

impl TerminalShell {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl Shell for TerminalShell {
    fn current_page(&self) -> Page {
        self.page.clone()
    }

    fn navigate(&mut self, page: Page) {
        debug!(from = self.page.path(), to = page.path(), "navigate");
        self.page = page;
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_replaces_the_page() {
        let mut shell = TerminalShell::new(Page::Dashboard);
        assert_eq!(shell.current_page(), Page::Dashboard);
        shell.navigate(Page::Entry);
        assert_eq!(shell.page(), &Page::Entry);
    }
}
