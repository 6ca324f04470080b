//! Format layer construction

use tracing_subscriber::{Layer, Registry, fmt};

use crate::config::DisplayConfig;

pub(super) type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

pub(super) fn pretty(display: &DisplayConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .pretty()
        .with_ansi(display.colors)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_writer(std::io::stderr);

    if display.time {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}

pub(super) fn compact(display: &DisplayConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .compact()
        .with_ansi(display.colors)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_writer(std::io::stderr);

    if display.time {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}

pub(super) fn json(display: &DisplayConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .json()
        .flatten_event(display.flatten)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_writer(std::io::stderr);

    if display.time {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}
