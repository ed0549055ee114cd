use jobdag::cli::LogLevel;
use jobdag::logging::build_filter;
use tracing::level_filters::LevelFilter;

#[test]
fn cli_level_sets_the_maximum_level() {
    let filter = build_filter(Some(LogLevel::Debug));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

    let filter = build_filter(Some(LogLevel::Trace));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
}

#[test]
fn log_levels_map_onto_level_filters() {
    assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
    assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
    assert_eq!(LevelFilter::from(LogLevel::Info), LevelFilter::INFO);
}
