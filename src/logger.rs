//!
//! Log output stamped with the simulated time.
//!

use crate::time::SimTime;
use nu_ansi_term::{Color, Style};
use std::fmt::Write as _;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    filter::{LevelFilter, ParseError},
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields},
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// The log level that will be used if `RUST_LOG` is not defined.
pub const FALLBACK_LOG_LEVEL: Level = Level::WARN;

/// Failure to install the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// The filter expression could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

///
/// Installs a global subscriber with a sim formatter.
///
/// The filter is taken from `filter` if given, from `RUST_LOG` otherwise,
/// falling back to [`FALLBACK_LOG_LEVEL`].
///
/// # Errors
///
/// Fails if `filter` does not parse or a subscriber was already installed.
///
pub fn init(filter: Option<&str>) -> Result<(), LoggerError> {
    let filter = match filter {
        Some(filter) => EnvFilter::try_new(filter)?,
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(FALLBACK_LOG_LEVEL).into())
            .from_env_lossy(),
    };

    tracing_subscriber::fmt()
        .event_format(SimFormat)
        .with_env_filter(filter)
        .finish()
        .try_init()?;
    Ok(())
}

macro_rules! maybe_ansi {
    ($style:ident, $ansi:ident, $writer:ident: $($t:tt)*) => {
        MaybeAnsi(format!($($t)*), $style, $ansi).write(&mut $writer)
    };
}

/// A formatter that prefixes every record with the current simulation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimFormat;

impl<S, N> FormatEvent<S, N> for SimFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        let dimmed = Style::new().dimmed();
        let bold = Style::new().bold();

        maybe_ansi!(dimmed, ansi, writer: "[ {:?} ] ", SimTime::now())?;

        let style = match *meta.level() {
            Level::TRACE => Style::new().fg(Color::Cyan),
            Level::DEBUG => Style::new().fg(Color::Purple),
            Level::INFO => Style::new().fg(Color::Green),
            Level::WARN => Style::new().fg(Color::Yellow),
            Level::ERROR => Style::new().fg(Color::Red),
        };
        maybe_ansi!(style, ansi, writer: "{:>5} ", meta.level().as_str())?;

        if let Some(scope) = ctx.event_scope() {
            let mut seen = false;
            for span in scope.from_root() {
                maybe_ansi!(bold, ansi, writer: "{}", span.metadata().name())?;
                seen = true;
                let ext = span.extensions();
                if let Some(fields) = &ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        maybe_ansi!(bold, ansi, writer: "{{")?;
                        write!(writer, "{fields}")?;
                        maybe_ansi!(bold, ansi, writer: "}}")?;
                    }
                }
                maybe_ansi!(dimmed, ansi, writer: ":")?;
            }

            if seen {
                writer.write_char(' ')?;
            }
        }

        maybe_ansi!(dimmed, ansi, writer: "{}: ", meta.target())?;

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct MaybeAnsi(String, Style, bool);

impl MaybeAnsi {
    fn write(self, writer: &mut Writer<'_>) -> std::fmt::Result {
        if self.2 {
            write!(writer, "{}", self.1.prefix())?;
            write!(writer, "{}", self.0)?;
            write!(writer, "{}", self.1.suffix())
        } else {
            write!(writer, "{}", self.0)
        }
    }
}
