use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use termcolor::ColorChoice;
use tracing::{field::Visit, Level, Metadata};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::FormatEvent,
    prelude::*,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Minimum level per module path prefix. For every event, the entry with
    /// the longest prefix of the event's target decides. Events whose target
    /// matches no entry are dropped. Levels: "off", "error", "warn", "info",
    /// "debug" and "trace".
    ///
    /// Example:
    ///
    ///    [log]
    ///    filters.projman = "info"
    ///    filters."projman::store" = "trace"
    ///    filters.hyper = "warn"
    #[config(default = { "projman": "debug" })]
    pub(crate) filters: Filters,

    /// Optional file to append log output to. `${cmd}` is replaced by the
    /// subcommand, e.g. "/var/log/projman-${cmd}.log".
    pub(crate) file: Option<PathBuf>,

    /// Whether to log to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;

    fn try_from(raw: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut out = HashMap::with_capacity(raw.len());
        for (prefix, level) in raw {
            out.insert(prefix, parse_level_filter(&level)?);
        }
        Ok(Self(out))
    }
}

impl Filters {
    fn allows(&self, target: &str, level: &Level) -> bool {
        let mut best: Option<(usize, LevelFilter)> = None;
        for (prefix, filter) in &self.0 {
            let longer = best.map_or(true, |(len, _)| prefix.len() > len);
            if longer && target.starts_with(prefix.as_str()) {
                best = Some((prefix.len(), *filter));
            }
        }
        best.is_some_and(|(_, filter)| level <= &filter)
    }

    fn max_level(&self) -> LevelFilter {
        self.0.values().copied().max().unwrap_or(LevelFilter::OFF)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    let level = match s {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "info" => LevelFilter::INFO,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        other => return Err(format!("invalid log level '{other}'")),
    };
    Ok(level)
}

/// Sets up the global `tracing` subscriber (which also captures `log`
/// records). May only be called once per process.
pub(crate) fn init(config: &LogConfig, color: ColorChoice, cmd: &str) -> Result<()> {
    let filters = config.filters.clone();
    let max_level = filters.max_level();
    let filter = FilterFn::new(move |meta: &Metadata<'_>| filters.allows(meta.target(), meta.level()))
        .with_max_level_hint(max_level);

    // A macro as every layer has a different subscriber type parameter.
    macro_rules! layer {
        ($ansi:expr) => {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(color))
                .with_ansi($ansi)
        };
    }

    let stdout_layer = config.stdout
        .then(|| layer!(color != ColorChoice::Never).with_writer(std::io::stdout));

    let file_layer = match &config.file {
        Some(path) => {
            let file = open_log_file(path, cmd)?;
            Some(layer!(color == ColorChoice::Always).with_writer(file))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(())
}

fn open_log_file(path: &Path, cmd: &str) -> Result<File> {
    use std::io::Write;

    let Some(template) = path.to_str() else {
        bail!("log file path '{}' is not valid UTF-8", path.display());
    };
    let path = template.replace("${cmd}", cmd);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .context(format!("failed to open log file '{path}'"))?;

    // Blank line between runs.
    file.write_all(b"\n").context(format!("failed to write to log file '{path}'"))?;

    Ok(file)
}

type TracingWriter<'a> = tracing_subscriber::fmt::format::Writer<'a>;

#[derive(Clone, Copy)]
struct EventFormatter(ColorChoice);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: TracingWriter<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let use_ansi = self.0 == ColorChoice::Always
            || (writer.has_ansi_escapes() && self.0 != ColorChoice::Never);
        macro_rules! wr {
            ($style:expr, $fmt:literal $($args:tt)*) => {{
                with_style(&mut writer, use_ansi, $style, |w| {
                    write!(w, $fmt $($args)*)
                })?;
            }};
        }

        // Events coming from `log` carry their real metadata in fields.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        let dim_style = Style::new().dimmed();
        let (level_style, body_style) = styles(metadata.level());

        wr!(dim_style, "{} ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f"));
        wr!(level_style, "{:5}", metadata.level());
        wr!(dim_style, " {} >  ", metadata.target());

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        // Continuation lines of multi-line messages are aligned with the
        // first line.
        let padding = "2021-05-04 19:40:18.270 DEBUG ".len() + 2 + metadata.target().len();
        let mut lines = fields.message.as_deref().unwrap_or("").lines();
        wr!(body_style, "{}", lines.next().unwrap_or(""));
        for line in lines {
            write!(writer, "\n{:padding$}", "", padding = padding - 1)?;
            wr!(dim_style, ">");
            wr!(body_style, "  {}", line);
        }

        if !fields.others.is_empty() {
            if fields.message.is_some() {
                wr!(level_style, " ~~");
            }
            for (name, value) in &fields.others {
                wr!(body_style.italic(), " {}", name);
                wr!(body_style, "={}", value);
            }
        }

        writeln!(writer)
    }
}

fn styles(level: &Level) -> (Style, Style) {
    match *level {
        Level::ERROR => (Style::new().fg(Color::Red).bold(), Style::new().fg(Color::Red)),
        Level::WARN => (Style::new().fg(Color::Yellow).bold(), Style::new().fg(Color::Yellow)),
        Level::INFO => (Style::new().fg(Color::Green), Style::new()),
        Level::DEBUG => (Style::new().fg(Color::Blue), Style::new().dimmed()),
        Level::TRACE => (Style::new().fg(Color::Magenta), Style::new().fg(Color::DarkGray)),
    }
}

/// Collects the message and all other fields of an event, skipping the `log.*`
/// fields that `tracing-log` adds.
#[derive(Debug, Default)]
struct FieldCollector {
    message: Option<String>,
    others: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            name if name.starts_with("log.") => {}
            name => self.others.push((name, format!("{value:?}"))),
        }
    }
}

fn with_style(
    out: &mut TracingWriter<'_>,
    use_ansi: bool,
    style: Style,
    f: impl FnOnce(&mut TracingWriter<'_>) -> std::fmt::Result,
) -> std::fmt::Result {
    if use_ansi {
        write!(out, "{}", style.prefix())?;
    }
    f(out)?;
    if use_ansi {
        write!(out, "{}", style.suffix())?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use tracing::Level;
    use tracing_subscriber::filter::LevelFilter;

    use super::{Filters, parse_level_filter};

    fn filters(entries: &[(&str, &str)]) -> Filters {
        let raw = entries.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Filters::try_from(raw).unwrap()
    }

    #[test]
    fn level_names() {
        assert_eq!(parse_level_filter("off"), Ok(LevelFilter::OFF));
        assert_eq!(parse_level_filter("trace"), Ok(LevelFilter::TRACE));
        assert_eq!(parse_level_filter("warn"), Ok(LevelFilter::WARN));
        assert!(parse_level_filter("WARN").is_err());
        assert!(parse_level_filter("verbose").is_err());
    }

    #[test]
    fn longest_prefix_decides() {
        let f = filters(&[
            ("projman", "info"),
            ("projman::store", "trace"),
            ("projman::http", "off"),
        ]);

        assert!(f.allows("projman::api", &Level::INFO));
        assert!(!f.allows("projman::api", &Level::DEBUG));
        assert!(f.allows("projman::store::memory", &Level::TRACE));
        assert!(!f.allows("projman::http", &Level::ERROR));
        assert!(!f.allows("hyper::proto", &Level::ERROR));
        assert_eq!(f.max_level(), LevelFilter::TRACE);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let raw = HashMap::from([("projman".to_string(), "loud".to_string())]);
        assert_eq!(
            Filters::try_from(raw).unwrap_err(),
            "invalid log level 'loud'",
        );
    }
}
