//! Operation options threaded through every component.

/// Immutable per-invocation settings.
///
/// Constructed once from the command line and passed by reference; no
/// component mutates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Keep scratch directories on exit instead of removing them.
    pub keep_scratch: bool,

    /// Spend extra effort in the compressor search (pbzip2 block-size
    /// sweep). Off by default because the sweep can run the compressor
    /// close to a hundred times.
    pub try_harder: bool,
}

impl Options {
    /// Returns options with `keep_scratch` enabled.
    #[must_use]
    pub fn with_keep_scratch(mut self) -> Self {
        self.keep_scratch = true;
        self
    }

    /// Returns options with `try_harder` enabled.
    #[must_use]
    pub fn with_try_harder(mut self) -> Self {
        self.try_harder = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_off() {
        let opts = Options::default();
        assert!(!opts.keep_scratch);
        assert!(!opts.try_harder);
    }

    #[test]
    fn test_builders() {
        let opts = Options::default().with_keep_scratch().with_try_harder();
        assert!(opts.keep_scratch);
        assert!(opts.try_harder);
    }
}
