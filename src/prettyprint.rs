use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        self,
        format::{Format, FormatEvent, FormatFields, Writer},
        FmtContext,
    },
    registry::LookupSpan,
};

/// Human oriented event format: events nest under their spans so a request
/// reads as one indented block.
pub struct PrettyFormatter {
    inner: Format,
}

impl PrettyFormatter {
    pub fn new(ansi: bool) -> Self {
        Self {
            inner: fmt::format()
                .with_ansi(ansi)
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_level(true)
                .with_source_location(false),
        }
    }
}

impl Default for PrettyFormatter {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Depth 0 gets no prefix, everything below it a tree branch indented two
/// spaces per level.
fn indent_prefix(depth: usize) -> String {
    match depth {
        0 => String::new(),
        depth => format!("{}└─ ", "  ".repeat(depth - 1)),
    }
}

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let depth = ctx.event_scope().map(|scope| scope.count()).unwrap_or(0);
        write!(writer, "{}", indent_prefix(depth))?;
        self.inner.format_event(ctx, writer, event)
    }
}
