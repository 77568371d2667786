use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

const DEFAULT_FILTER: &str = "warn,lecture_subs=info";

pub fn init_logger() {
    // Базовый фильтр, переопределяется через RUST_LOG
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);

    let mut builder = Builder::from_env(env);

    // Явно подавляем логи HTTP-стека
    builder
        .filter_module("hyper", LevelFilter::Error)
        .filter_module("hyper_util", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("tokio_util", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        // stdout остаётся для переведённых субтитров
        .target(env_logger::Target::Stderr);

    if let Err(e) = builder.try_init() {
        eprintln!("Logger already initialized: {}", e);
    }
}
