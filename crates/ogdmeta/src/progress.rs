use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct ProgressBarBuilder {
    template: &'static str,
    quiet: bool,
}

impl ProgressBarBuilder {
    pub(crate) fn new(template: &'static str, quiet: bool) -> Self {
        Self { template, quiet }
    }

    /// Builds a spinner; hidden if `quiet` is set.
    pub(crate) fn build(self) -> ProgressBar {
        let pbar = ProgressBar::new_spinner();
        if self.quiet {
            pbar.set_draw_target(ProgressDrawTarget::hidden());
        }

        let style = ProgressStyle::with_template(self.template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        pbar.with_style(style)
    }
}
