use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Formatter that wraps each field in brackets.
/// Format: [TIMESTAMP] [LEVEL] [THREAD] [SPAN] [TARGET: FILE:LINE]: MESSAGE
///
/// Checks run on the rayon pool, so the thread name is part of every line.
pub struct BracketedFormatter;

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let now = chrono::Local::now();
        write!(writer, "[{}] ", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))?;
        write!(writer, "[{:5}] ", metadata.level())?;

        let current = std::thread::current();
        write!(writer, "[{}] ", current.name().unwrap_or("worker"))?;

        // Innermost span (e.g. the running check), else the last target segment
        let scope_name = ctx
            .event_scope()
            .and_then(|scope| scope.from_root().last().map(|span| span.name()))
            .unwrap_or_else(|| metadata.target().rsplit("::").next().unwrap_or("unknown"));
        write!(writer, "[{}] ", scope_name)?;

        match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => {
                write!(writer, "[{}: {}:{}]: ", metadata.target(), file, line)?
            }
            _ => write!(writer, "[{}]: ", metadata.target())?,
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
