use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, Report};

const RENDER_WIDTH: usize = 120;

/// Renders a report with miette's graphical handler and echoes it to stderr.
pub fn print_report(report: &Report) -> Result<String, std::fmt::Error> {
    let output = render_diagnostic(report.as_ref())?;
    eprintln!("{output}");
    Ok(output)
}

/// Renders a diagnostic without colors, e.g. for logs and tests.
pub fn render_diagnostic(diag: &dyn Diagnostic) -> Result<String, std::fmt::Error> {
    let mut output = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .with_width(RENDER_WIDTH)
        .render_report(&mut output, diag)?;
    Ok(output)
}
