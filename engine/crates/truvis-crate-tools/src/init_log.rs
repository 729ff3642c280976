use std::io::Write;

/// 彩色日志格式：`[时间] 等级: 内容`，下一行灰色显示模块和代码位置
fn colored_builder(default_level: log::LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let info_style = buf
                .default_level_style(log::Level::Info)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
            let warn_style = buf
                .default_level_style(log::Level::Warn)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
            let error_style = buf
                .default_level_style(log::Level::Error)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

            let level_style = match record.level() {
                log::Level::Info => info_style,
                log::Level::Warn => warn_style,
                log::Level::Error => error_style,
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let line = record.line().unwrap_or(!0);
            let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
            let time = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
            let level = record.level();
            let module = record.module_path().unwrap_or("");

            writeln!(
                buf,
                "{level_style}[{time}] {level}: {}{level_style:#}\n\t {grey_style}In {module} At {file}:{line}{grey_style:#}",
                record.args()
            )
        })
        .filter(None, default_level)
        // RUST_LOG 可以覆盖默认等级，例如 RUST_LOG=truvis_render_graph=trace
        .parse_default_env();
    builder
}

/// 初始化全局 logger，默认等级为 Info
pub fn init_log() {
    colored_builder(log::LevelFilter::Info).init();
}

/// 测试中使用：输出交给 test harness 捕获，重复初始化不会 panic
pub fn init_test_log() {
    let _ = colored_builder(log::LevelFilter::Debug).is_test(true).try_init();
}
